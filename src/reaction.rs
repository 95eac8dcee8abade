use std::mem;
use std::ops::ControlFlow;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cancel::Scope;
use crate::context;
use crate::track::Registration;

/// Where re-triggered cycles run. The initial cycle always runs
/// synchronously on the starting thread; every firing after that goes
/// through the dispatcher captured at start.
pub trait Dispatch: Send + Sync {
	fn dispatch(&self, task: Box<dyn FnOnce() + Send>);
}

/// Runs cycles directly on whichever thread performed the write that
/// fired the observation.
pub struct Inline;

impl Dispatch for Inline {
	fn dispatch(&self, task: Box<dyn FnOnce() + Send>) {
		task();
	}
}

/// Redirects cycles onto a captured tokio runtime, keeping writer
/// threads free of observer work.
#[cfg(feature = "tokio")]
pub struct Tokio {
	handle: tokio::runtime::Handle,
}

#[cfg(feature = "tokio")]
impl Tokio {
	#[must_use]
	pub fn new(handle: tokio::runtime::Handle) -> Tokio {
		Tokio { handle }
	}

	/// Captures the ambient runtime. Panics when called outside one.
	#[must_use]
	pub fn current() -> Tokio {
		Tokio {
			handle: tokio::runtime::Handle::current(),
		}
	}
}

#[cfg(feature = "tokio")]
impl Dispatch for Tokio {
	fn dispatch(&self, task: Box<dyn FnOnce() + Send>) {
		self.handle.spawn(async move { task() });
	}
}

type ApplyFn = Box<dyn FnMut() + Send>;
type DecideFn = Box<dyn FnMut() -> ControlFlow<()> + Send>;

/// Handle to a continuous observation. `apply` runs tracked; each time
/// one of the nodes it read mutates, `decide` chooses whether to run
/// it again, re-arming the observation, or to stop for good. The
/// observation stays alive while a handle or an ancestor scope holds
/// it; dropping the last of those abandons it.
pub struct Reaction {
	body: Arc<ReactionBody>,
	scope: Scope,
}

impl Clone for Reaction {
	fn clone(&self) -> Reaction {
		Reaction {
			body: self.body.clone(),
			scope: self.scope.clone(),
		}
	}
}

struct ReactionBody {
	state: Mutex<ReactionState>,
}

enum ReactionState {
	/// Armed, waiting for a registration to fire.
	Idle(Box<ReactionInner>),
	/// A cycle owns the inner right now; a firing that lands in the
	/// meantime just asks for one more pass.
	Busy { rerun: bool },
	Stopped,
}

struct ReactionInner {
	apply: ApplyFn,
	decide: DecideFn,
	dispatch: Arc<dyn Dispatch>,
}

impl Reaction {
	/// Starts with the inline dispatcher, under the thread's current
	/// scope if one is active.
	pub fn start<A, D>(apply: A, decide: D) -> Reaction
	where
		A: FnMut() + Send + 'static,
		D: FnMut() -> ControlFlow<()> + Send + 'static,
	{
		Reaction::start_on(Inline, apply, decide)
	}

	pub fn start_on<A, D>(dispatch: impl Dispatch + 'static, apply: A, decide: D) -> Reaction
	where
		A: FnMut() + Send + 'static,
		D: FnMut() -> ControlFlow<()> + Send + 'static,
	{
		let scope = match Scope::current() {
			Some(parent) => parent.child(),
			None => Scope::root(),
		};
		Reaction::start_in(scope, dispatch, apply, decide)
	}

	/// Starts under an explicit scope node. Cancelling that scope
	/// stops the observation.
	pub fn start_in<A, D>(
		scope: Scope,
		dispatch: impl Dispatch + 'static,
		apply: A,
		decide: D,
	) -> Reaction
	where
		A: FnMut() + Send + 'static,
		D: FnMut() -> ControlFlow<()> + Send + 'static,
	{
		let inner = Box::new(ReactionInner {
			apply: Box::new(apply),
			decide: Box::new(decide),
			dispatch: Arc::new(dispatch),
		});

		let body = Arc::new(ReactionBody {
			state: Mutex::new(ReactionState::Busy { rerun: false }),
		});

		scope.on_cancel({
			let body = body.clone();
			move || body.stop()
		});

		// The first cycle runs right here, arming the initial
		// registration in the caller's own context.
		cycle(body.clone(), inner, false);

		Reaction { body, scope }
	}

	/// Stops the observation and tears down everything nested under
	/// its scope. Idempotent.
	pub fn cancel(&self) {
		self.scope.cancel();
		self.body.stop();
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(*self.body.state.lock(), ReactionState::Stopped)
	}
}

impl ReactionBody {
	fn stop(&self) {
		let previous = {
			let mut state = self.state.lock();
			mem::replace(&mut *state, ReactionState::Stopped)
		};
		// Closures drop outside the lock; they may own arbitrary
		// user state.
		drop(previous);
	}

	fn fire(self: &Arc<Self>) {
		let inner = {
			let mut state = self.state.lock();
			match &mut *state {
				ReactionState::Stopped => return,
				ReactionState::Busy { rerun } => {
					*rerun = true;
					return;
				}
				ReactionState::Idle(_) => {
					let ReactionState::Idle(inner) =
						mem::replace(&mut *state, ReactionState::Busy { rerun: false })
					else {
						unreachable!()
					};
					inner
				}
			}
		};

		let body = self.clone();
		let dispatch = inner.dispatch.clone();
		dispatch.dispatch(Box::new(move || cycle(body, inner, true)));
	}
}

/// One checked-out pass of the driver: consult `decide` (when a
/// firing brought us here), run `apply` with a fresh registration
/// armed, then either park the inner back to `Idle` or loop once more
/// if a write landed mid-cycle. Looping instead of recursing keeps
/// the stack flat no matter how often the observation re-arms.
fn cycle(body: Arc<ReactionBody>, mut inner: Box<ReactionInner>, mut fired: bool) {
	loop {
		if fired {
			let flow = context::with_clean(|| (inner.decide)());
			if flow.is_break() {
				body.stop();
				return;
			}
		}

		let registration = Registration::new({
			let body = Arc::downgrade(&body);
			move || {
				if let Some(body) = body.upgrade() {
					body.fire();
				}
			}
		});

		context::with_clean(|| {
			context::with_performing(registration.clone(), || {
				context::with_tracking(registration.clone(), || (inner.apply)());
			})
		});

		fired = true;

		let mut state = body.state.lock();
		match &mut *state {
			ReactionState::Busy { rerun: true } => {
				*state = ReactionState::Busy { rerun: false };
				drop(state);
			}
			ReactionState::Busy { rerun: false } => {
				*state = ReactionState::Idle(inner);
				return;
			}
			ReactionState::Stopped => return,
			ReactionState::Idle(_) => unreachable!("a running cycle owns the inner"),
		}
	}
}
