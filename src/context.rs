use std::cell::RefCell;
use std::mem;
use std::sync::Weak;
use std::thread::LocalKey;

use crate::cancel::Scope;
use crate::track::Registration;
use crate::{Dependent, NodeId};

thread_local! {
	static COMPUTING: RefCell<Vec<Weak<dyn Dependent>>> = RefCell::new(Vec::new());
	static TRACKING: RefCell<Vec<Registration>> = RefCell::new(Vec::new());
	static PERFORMING: RefCell<Vec<Registration>> = RefCell::new(Vec::new());
	static SCOPES: RefCell<Vec<Scope>> = RefCell::new(Vec::new());
}

struct PopGuard<T: 'static>(&'static LocalKey<RefCell<Vec<T>>>);

impl<T> Drop for PopGuard<T> {
	fn drop(&mut self) {
		self.0.with(|stack| {
			stack.borrow_mut().pop();
		});
	}
}

/// Runs `f` with `node` as the innermost computing dependent. Reads
/// made by `f` wire their edges towards this node.
pub(crate) fn with_computing<R>(node: Weak<dyn Dependent>, f: impl FnOnce() -> R) -> R {
	COMPUTING.with(|stack| stack.borrow_mut().push(node));
	let _guard = PopGuard(&COMPUTING);
	f()
}

pub(crate) fn computing() -> Option<Weak<dyn Dependent>> {
	COMPUTING.with(|stack| stack.borrow().last().cloned())
}

/// True when the node is anywhere on this thread's computing stack,
/// meaning a pull of that very node is what triggered the caller.
pub(crate) fn computing_includes(id: NodeId) -> bool {
	COMPUTING.with(|stack| {
		stack
			.borrow()
			.iter()
			.any(|node| node.upgrade().is_some_and(|node| node.id() == id))
	})
}

/// Runs `f` with empty computing and tracking stacks. Change handlers
/// are not part of any rule or tracked block, so reads they make must
/// not be recorded against whatever happened to trigger them. The
/// performing stack is left alone: it guards writes made by handlers.
pub(crate) fn with_clean<R>(f: impl FnOnce() -> R) -> R {
	let computing = COMPUTING.with(|stack| mem::take(&mut *stack.borrow_mut()));
	let tracking = TRACKING.with(|stack| mem::take(&mut *stack.borrow_mut()));
	let _restore = RestoreGuard {
		computing: Some(computing),
		tracking: Some(tracking),
	};
	f()
}

/// Runs `f` with the tracking stack suspended. A compute rule's reads
/// belong to the recomputing node, not to whatever tracked block
/// happened to trigger the pull.
pub(crate) fn without_tracking<R>(f: impl FnOnce() -> R) -> R {
	let tracking = TRACKING.with(|stack| mem::take(&mut *stack.borrow_mut()));
	let _restore = RestoreGuard {
		computing: None,
		tracking: Some(tracking),
	};
	f()
}

struct RestoreGuard {
	computing: Option<Vec<Weak<dyn Dependent>>>,
	tracking: Option<Vec<Registration>>,
}

impl Drop for RestoreGuard {
	fn drop(&mut self) {
		if let Some(computing) = self.computing.take() {
			COMPUTING.with(|stack| *stack.borrow_mut() = computing);
		}
		if let Some(tracking) = self.tracking.take() {
			TRACKING.with(|stack| *stack.borrow_mut() = tracking);
		}
	}
}

/// Runs `f` with `registration` armed: every node read by `f`
/// attaches it.
pub(crate) fn with_tracking<R>(registration: Registration, f: impl FnOnce() -> R) -> R {
	TRACKING.with(|stack| stack.borrow_mut().push(registration));
	let _guard = PopGuard(&TRACKING);
	f()
}

pub(crate) fn tracking() -> Option<Registration> {
	TRACKING.with(|stack| stack.borrow().last().cloned())
}

pub(crate) fn with_performing<R>(registration: Registration, f: impl FnOnce() -> R) -> R {
	PERFORMING.with(|stack| stack.borrow_mut().push(registration));
	let _guard = PopGuard(&PERFORMING);
	f()
}

/// True when `registration` is anywhere on this thread's performing
/// stack. A write made from inside a tracked block must leave that
/// block's own registration attached instead of firing it, otherwise
/// a handler writing its own dependency would loop.
pub(crate) fn is_performing(registration: &Registration) -> bool {
	PERFORMING.with(|stack| stack.borrow().iter().any(|r| r.ptr_eq(registration)))
}

pub(crate) fn with_scope<R>(scope: Scope, f: impl FnOnce() -> R) -> R {
	SCOPES.with(|stack| stack.borrow_mut().push(scope));
	let _guard = PopGuard(&SCOPES);
	f()
}

pub(crate) fn current_scope() -> Option<Scope> {
	SCOPES.with(|stack| stack.borrow().last().cloned())
}
