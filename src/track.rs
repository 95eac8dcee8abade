use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::context;
use crate::edge::RegistrationList;

type FireFn = Box<dyn FnOnce() + Send>;

struct RegistrationBody {
	on_fire: Mutex<Option<FireFn>>,
}

/// A one-shot observation: armed against every node a tracked block
/// reads, fired by the first of those nodes to mutate afterwards.
#[derive(Clone)]
pub struct Registration {
	body: Arc<RegistrationBody>,
}

impl Registration {
	pub(crate) fn new(on_fire: impl FnOnce() + Send + 'static) -> Registration {
		Registration {
			body: Arc::new(RegistrationBody {
				on_fire: Mutex::new(Some(Box::new(on_fire))),
			}),
		}
	}

	/// Runs the handler if it has not run yet. Several nodes usually
	/// hold the same registration; taking the closure out under the
	/// lock makes the first caller win and every later call a no-op.
	pub(crate) fn fire(&self) {
		let on_fire = self.body.on_fire.lock().take();
		if let Some(on_fire) = on_fire {
			trace!("registration fired");
			on_fire();
		}
	}

	/// A spent registration is skipped at attach time and shed from
	/// node lists by the next capture.
	pub(crate) fn is_spent(&self) -> bool {
		self.body.on_fire.lock().is_none()
	}

	pub(crate) fn ptr_eq(&self, other: &Registration) -> bool {
		Arc::ptr_eq(&self.body, &other.body)
	}
}

/// Splits a node's registration list for the write path: everything
/// goes into the returned capture except registrations whose tracked
/// block is running on this thread right now, which stay attached.
pub(crate) fn capture_registrations(registrations: &mut RegistrationList) -> Vec<Registration> {
	let mut captured = Vec::new();
	let mut kept = RegistrationList::new();

	for registration in registrations.drain(..) {
		if context::is_performing(&registration) {
			kept.push(registration);
		} else {
			captured.push(registration);
		}
	}

	*registrations = kept;
	captured
}

/// Evaluates `apply` with a fresh one-shot registration armed, so that
/// every node `apply` reads attaches it, and returns `apply`'s value.
/// The first of those nodes to mutate afterwards calls `on_change`
/// exactly once; the other copies go stale and are skipped. A write
/// `apply` makes to a node it also reads does not count: the
/// registration stays armed for a real, later mutation.
pub fn track<R>(apply: impl FnOnce() -> R, on_change: impl FnOnce() + Send + 'static) -> R {
	let registration = Registration::new(on_change);
	context::with_performing(registration.clone(), || {
		context::with_tracking(registration, apply)
	})
}
