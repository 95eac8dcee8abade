use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::context;

type CancelFn = Box<dyn FnOnce() + Send>;

/// A node in the cancellation tree. Cancelling runs depth-first:
/// children go down before the node's own callback runs, and the node
/// detaches from its parent afterwards. Idempotent at every level.
#[derive(Clone)]
pub struct Scope {
	body: Arc<ScopeBody>,
}

struct ScopeBody {
	inner: Mutex<ScopeInner>,
}

struct ScopeInner {
	cancelled: bool,
	on_cancel: Option<CancelFn>,
	children: Vec<Arc<ScopeBody>>,
	parent: Weak<ScopeBody>,
}

impl Scope {
	/// A detached root scope.
	#[must_use]
	pub fn root() -> Scope {
		Scope {
			body: ScopeBody::new(Weak::new()),
		}
	}

	/// A new child under this scope. A child asked of an already
	/// cancelled scope is born cancelled: nobody would ever tear it
	/// down otherwise.
	#[must_use]
	pub fn child(&self) -> Scope {
		let child = ScopeBody::new(Arc::downgrade(&self.body));

		let adopted = {
			let mut inner = self.body.inner.lock();
			if inner.cancelled {
				false
			} else {
				inner.children.push(child.clone());
				true
			}
		};

		if !adopted {
			child.inner.lock().cancelled = true;
		}

		Scope { body: child }
	}

	/// Registers the callback that `cancel` runs once this scope's
	/// children are done. Replaces a previously registered callback.
	/// Registering against an already cancelled scope runs `f` at
	/// once.
	pub fn on_cancel(&self, f: impl FnOnce() + Send + 'static) {
		{
			let mut inner = self.body.inner.lock();
			if !inner.cancelled {
				inner.on_cancel = Some(Box::new(f));
				return;
			}
		}
		f();
	}

	pub fn is_cancelled(&self) -> bool {
		self.body.inner.lock().cancelled
	}

	pub fn cancel(&self) {
		cancel_body(&self.body);
	}

	/// Tears the subtree down while keeping this scope itself alive.
	/// A group re-execution resets with this before re-running its
	/// body.
	pub fn cancel_children(&self) {
		let children = mem::take(&mut self.body.inner.lock().children);
		for child in &children {
			cancel_body(child);
		}
	}

	/// Runs `f` with this scope current on the thread, so tracking
	/// primitives started inside adopt it as their parent.
	pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
		context::with_scope(self.clone(), f)
	}

	/// The innermost scope current on this thread.
	#[must_use]
	pub fn current() -> Option<Scope> {
		context::current_scope()
	}

	pub(crate) fn downgrade(&self) -> WeakScope {
		WeakScope {
			body: Arc::downgrade(&self.body),
		}
	}
}

#[derive(Clone)]
pub(crate) struct WeakScope {
	body: Weak<ScopeBody>,
}

impl WeakScope {
	pub(crate) fn upgrade(&self) -> Option<Scope> {
		self.body.upgrade().map(|body| Scope { body })
	}
}

impl ScopeBody {
	fn new(parent: Weak<ScopeBody>) -> Arc<ScopeBody> {
		Arc::new(ScopeBody {
			inner: Mutex::new(ScopeInner {
				cancelled: false,
				on_cancel: None,
				children: Vec::new(),
				parent,
			}),
		})
	}

	fn remove_child(&self, child: &Arc<ScopeBody>) {
		let mut inner = self.inner.lock();
		inner.children.retain(|c| !Arc::ptr_eq(c, child));
	}
}

fn cancel_body(body: &Arc<ScopeBody>) {
	let (children, on_cancel, parent) = {
		let mut inner = body.inner.lock();
		if inner.cancelled {
			return;
		}
		inner.cancelled = true;
		(
			mem::take(&mut inner.children),
			inner.on_cancel.take(),
			mem::replace(&mut inner.parent, Weak::new()),
		)
	};

	for child in &children {
		cancel_body(child);
	}

	if let Some(on_cancel) = on_cancel {
		on_cancel();
	}

	if let Some(parent) = parent.upgrade() {
		parent.remove_child(body);
	}
}
