use std::sync::Weak;

use parking_lot::RwLock;

/// Storage seam for source nodes. Implementations decide where the
/// value actually lives; the graph drives them through this trait
/// only and never assumes in-memory storage.
pub trait Container<T>: Send + Sync {
	fn get(&self) -> T;

	fn set(&self, value: T);

	/// Called once when the owning source comes alive, handing the
	/// container a way to push externally observed changes into the
	/// graph.
	fn on_loaded(&self, notifier: ChangeNotifier);

	/// Called when the owning source goes away.
	fn on_unloaded(&self);
}

pub(crate) trait Notify: Send + Sync {
	fn external_write(&self);
}

/// Lets a container announce that its stored value changed behind the
/// graph's back (another process touched a shared store, a file
/// changed on disk). `notify` runs the owning source's full write
/// protocol without re-entering [`Container::set`]. The handle is
/// weak: notifications arriving after the source was dropped are
/// no-ops.
#[derive(Clone)]
pub struct ChangeNotifier {
	node: Weak<dyn Notify>,
}

impl ChangeNotifier {
	pub(crate) fn new(node: Weak<dyn Notify>) -> ChangeNotifier {
		ChangeNotifier { node }
	}

	pub fn notify(&self) {
		if let Some(node) = self.node.upgrade() {
			node.external_write();
		}
	}
}

/// The built-in in-memory container.
pub struct Memory<T> {
	value: RwLock<T>,
}

impl<T> Memory<T> {
	pub fn new(value: T) -> Memory<T> {
		Memory {
			value: RwLock::new(value),
		}
	}
}

impl<T: Clone + Send + Sync> Container<T> for Memory<T> {
	fn get(&self) -> T {
		self.value.read().clone()
	}

	fn set(&self, value: T) {
		*self.value.write() = value;
	}

	fn on_loaded(&self, _notifier: ChangeNotifier) {}

	fn on_unloaded(&self) {}
}
