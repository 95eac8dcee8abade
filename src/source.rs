use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::container::{ChangeNotifier, Container, Memory, Notify};
use crate::context;
use crate::derived::Derived;
use crate::edge::{record_read, Edge, EdgeList, RegistrationList};
use crate::export;
use crate::track::capture_registrations;
use crate::{NodeId, NodeKind, Observable};

/// A root node of the graph, written to directly. A write always
/// signals observers, even when the new value compares equal to the
/// old one; equality suppression belongs to derived nodes.
pub struct Source<T> {
	pub(crate) body: Arc<SourceBody<T>>,
}

impl<T> Clone for Source<T> {
	fn clone(&self) -> Source<T> {
		Source {
			body: self.body.clone(),
		}
	}
}

pub(crate) struct SourceBody<T> {
	id: NodeId,
	name: Option<&'static str>,
	container: Box<dyn Container<T>>,
	this: Weak<SourceBody<T>>,
	inner: Mutex<SourceInner>,
}

/// Graph state only. Sources have no incoming edges and no dirty
/// flag; the types rule both out instead of a runtime check.
struct SourceInner {
	outgoing: EdgeList,
	registrations: RegistrationList,
}

impl<T: Clone + Send + Sync + 'static> Source<T> {
	#[must_use]
	pub fn new(value: T) -> Source<T> {
		Source::build(Box::new(Memory::new(value)), None)
	}

	#[must_use]
	pub fn new_named(name: &'static str, value: T) -> Source<T> {
		Source::build(Box::new(Memory::new(value)), Some(name))
	}

	#[must_use]
	pub fn with_container(container: impl Container<T> + 'static) -> Source<T> {
		Source::build(Box::new(container), None)
	}

	#[must_use]
	pub fn with_container_named(
		name: &'static str,
		container: impl Container<T> + 'static,
	) -> Source<T> {
		Source::build(Box::new(container), Some(name))
	}

	fn build(container: Box<dyn Container<T>>, name: Option<&'static str>) -> Source<T> {
		let id = NodeId::fresh();
		let body = Arc::new_cyclic(|this: &Weak<SourceBody<T>>| SourceBody {
			id,
			name,
			container,
			this: this.clone(),
			inner: Mutex::new(SourceInner {
				outgoing: EdgeList::new(),
				registrations: RegistrationList::new(),
			}),
		});

		body.container
			.on_loaded(ChangeNotifier::new(body.this.clone() as Weak<dyn Notify>));
		export::register(id, Arc::downgrade(&body) as Weak<dyn Observable>);

		Source { body }
	}

	/// Reads the current value, recording the read against the active
	/// tracking registration and the computing dependent, if any.
	pub fn get(&self) -> T {
		self.body.get()
	}

	/// Reads the current value without recording anything.
	pub fn get_once(&self) -> T {
		self.body.get_once()
	}

	pub fn set(&self, value: T) {
		self.body.set(value)
	}

	/// Read-modify-write against the container: one get, one set, one
	/// signal.
	pub fn update(&self, f: impl FnOnce(&mut T)) {
		self.body.update(f)
	}

	/// Convenience for a derived node projecting this source.
	pub fn map<U, F>(&self, f: F) -> Derived<U>
	where
		U: Clone + Send + Sync + 'static,
		F: Fn(T) -> U + Send + Sync + 'static,
	{
		let source = self.clone();
		Derived::new(move || f(source.get()))
	}

	pub fn id(&self) -> NodeId {
		self.body.id
	}

	pub fn name(&self) -> Option<&'static str> {
		self.body.name
	}
}

impl<T: Clone + Send + Sync + 'static> SourceBody<T> {
	pub(crate) fn get(&self) -> T {
		let mirror = {
			let mut inner = self.inner.lock();
			let inner = &mut *inner;
			record_read(
				self.id,
				self.this.clone() as Weak<dyn Observable>,
				&mut inner.outgoing,
				&mut inner.registrations,
			)
		};

		if let Some((edge, parent)) = &mirror {
			parent.add_incoming(edge.clone());
		}

		// The new edge starts out unpended. A writer marks it only
		// after its store, so a read that misses the store always
		// leaves the mark in place for the next pull.
		self.container.get()
	}

	pub(crate) fn get_once(&self) -> T {
		self.container.get()
	}

	fn set(&self, value: T) {
		self.container.set(value);
		self.did_write();
	}

	fn update(&self, f: impl FnOnce(&mut T)) {
		let mut value = self.container.get();
		f(&mut value);
		self.container.set(value);
		self.did_write();
	}

	/// Push phase. Captures observers under the lock, then marks and
	/// cascades outside of it, and only then fires registrations, so
	/// a handler that immediately re-reads the graph sees a fully
	/// invalidated picture. Own registrations fire before downstream
	/// ones, each in capture order.
	fn did_write(&self) {
		let (edges, mut fired) = {
			let mut inner = self.inner.lock();
			let edges = mem::take(&mut inner.outgoing);
			let fired = capture_registrations(&mut inner.registrations);
			(edges, fired)
		};

		trace!(id = self.id.as_u64(), edges = edges.len(), "source write");

		for edge in &edges {
			edge.mark_pending();
			if let Some(to) = edge.to.upgrade() {
				to.invalidate(&mut fired);
			}
		}

		context::with_clean(|| {
			for registration in fired {
				registration.fire();
			}
		});
	}
}

impl<T: Clone + Send + Sync + 'static> Observable for SourceBody<T> {
	fn id(&self) -> NodeId {
		self.id
	}

	fn name(&self) -> Option<&'static str> {
		self.name
	}

	fn kind(&self) -> NodeKind {
		NodeKind::Source
	}

	/// Sources are always current; the pull phase stops here.
	fn refresh(&self) {}

	fn remove_outgoing(&self, edge: &Arc<Edge>) {
		let mut inner = self.inner.lock();
		inner.outgoing.retain(|e| !Arc::ptr_eq(e, edge));
	}

	fn outgoing(&self) -> Vec<Arc<Edge>> {
		self.inner.lock().outgoing.iter().cloned().collect()
	}
}

impl<T: Clone + Send + Sync + 'static> Notify for SourceBody<T> {
	fn external_write(&self) {
		self.did_write();
	}
}

impl<T> Drop for SourceBody<T> {
	fn drop(&mut self) {
		export::unregister(self.id);
		self.container.on_unloaded();

		let edges = mem::take(&mut self.inner.get_mut().outgoing);
		for edge in edges {
			if let Some(to) = edge.to.upgrade() {
				to.remove_incoming(&edge);
			}
		}
	}
}
