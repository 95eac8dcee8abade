use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use futures::Stream;
use fxhash::FxHashMap;
use parking_lot::Mutex;

use crate::reaction::Reaction;

/// A multi-consumer async view over a tracked projection. Every pull
/// resolves with the first emission at or after its creation: a pull
/// made while an unconsumed emission is latched resolves immediately,
/// later ones wait for the next change.
pub struct Changes<T> {
	shared: Arc<Shared<T>>,
	reaction: Reaction,
}

struct Shared<T> {
	state: Mutex<SequenceState<T>>,
}

struct SequenceState<T> {
	current: Option<T>,
	/// Latched when an emission arrives while nobody waits, so the
	/// next pull to show up resolves without another change.
	dirty: bool,
	/// Generation counter for pulls. A pull's absence from the waiter
	/// map after it registered means an emission woke it.
	next_pull: u64,
	waiters: FxHashMap<u64, Waker>,
}

impl<T: Clone + Send + 'static> Changes<T> {
	/// Starts tracking `project`. The initial projection runs
	/// synchronously and is latched, so the very first pull resolves
	/// immediately with it.
	#[must_use]
	pub fn new(mut project: impl FnMut() -> T + Send + 'static) -> Changes<T> {
		let shared = Arc::new(Shared {
			state: Mutex::new(SequenceState {
				current: None,
				dirty: false,
				next_pull: 0,
				waiters: FxHashMap::default(),
			}),
		});

		let reaction = Reaction::start(
			{
				let shared = shared.clone();
				move || {
					let value = project();
					shared.publish(value);
				}
			},
			|| ControlFlow::Continue(()),
		);

		Changes { shared, reaction }
	}

	/// One pull of the sequence.
	pub fn next(&self) -> NextChange<T> {
		NextChange {
			shared: self.shared.clone(),
			pull: None,
		}
	}

	/// An independent, never-ending consumer cursor.
	pub fn stream(&self) -> ChangesStream<T> {
		ChangesStream {
			shared: self.shared.clone(),
			pull: None,
		}
	}

	/// Stops tracking. Pulls already waiting stay pending forever;
	/// drop them to clean up.
	pub fn cancel(&self) {
		self.reaction.cancel();
	}
}

impl<T> Drop for Changes<T> {
	fn drop(&mut self) {
		self.reaction.cancel();
	}
}

impl<T> Shared<T> {
	fn publish(&self, value: T) {
		let woken: Vec<Waker> = {
			let mut state = self.state.lock();
			state.current = Some(value);
			if state.waiters.is_empty() {
				state.dirty = true;
				Vec::new()
			} else {
				state.waiters.drain().map(|(_, waker)| waker).collect()
			}
		};

		for waker in woken {
			waker.wake();
		}
	}

	fn abandon(&self, pull: Option<u64>) {
		if let Some(id) = pull {
			self.state.lock().waiters.remove(&id);
		}
	}
}

impl<T: Clone> Shared<T> {
	fn poll_pull(&self, pull: &mut Option<u64>, cx: &mut Context<'_>) -> Poll<T> {
		let mut state = self.state.lock();

		match *pull {
			None => {
				if state.dirty {
					state.dirty = false;
					return Poll::Ready(state.current.clone().unwrap());
				}
				let id = state.next_pull;
				state.next_pull += 1;
				state.waiters.insert(id, cx.waker().clone());
				*pull = Some(id);
				Poll::Pending
			}
			Some(id) => {
				if state.waiters.contains_key(&id) {
					state.waiters.insert(id, cx.waker().clone());
					Poll::Pending
				} else {
					*pull = None;
					Poll::Ready(state.current.clone().unwrap())
				}
			}
		}
	}
}

/// Future for a single pull. Dropping it abandons only this pull;
/// other consumers keep waiting undisturbed.
pub struct NextChange<T> {
	shared: Arc<Shared<T>>,
	pull: Option<u64>,
}

impl<T: Clone> Future for NextChange<T> {
	type Output = T;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
		let this = self.get_mut();
		this.shared.poll_pull(&mut this.pull, cx)
	}
}

impl<T> Drop for NextChange<T> {
	fn drop(&mut self) {
		self.shared.abandon(self.pull);
	}
}

/// Per-consumer cursor: each item goes through the same pull
/// discipline as [`Changes::next`]. Never yields `None`.
pub struct ChangesStream<T> {
	shared: Arc<Shared<T>>,
	pull: Option<u64>,
}

impl<T: Clone> Stream for ChangesStream<T> {
	type Item = T;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
		let this = self.get_mut();
		this.shared.poll_pull(&mut this.pull, cx).map(Some)
	}
}

impl<T> Drop for ChangesStream<T> {
	fn drop(&mut self) {
		self.shared.abandon(self.pull);
	}
}
