use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::context;
use crate::edge::{record_read, Edge, EdgeList, RegistrationList};
use crate::export;
use crate::track::{capture_registrations, Registration};
use crate::{Dependent, NodeId, NodeKind, Observable};

type ComputeFn<T> = Box<dyn Fn() -> T + Send + Sync>;
type EqualityFn<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// A node whose value is produced by a compute rule over other nodes.
/// A write upstream only marks it potentially dirty; the next read
/// decides whether the rule actually has to run again.
pub struct Derived<T> {
	pub(crate) body: Arc<DerivedBody<T>>,
}

impl<T> Clone for Derived<T> {
	fn clone(&self) -> Derived<T> {
		Derived {
			body: self.body.clone(),
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
	Valid,
	/// Upstream signalled a possible change; edge pendingness decides.
	Doubted,
	/// The last run of the rule unwound, so the cache is untrusted
	/// and the next read recomputes unconditionally.
	Interrupted,
}

pub(crate) struct DerivedBody<T> {
	id: NodeId,
	name: Option<&'static str>,
	func: ComputeFn<T>,
	equality: Option<EqualityFn<T>>,
	/// Cached value, kept apart from the graph state so cache readers
	/// never contend with edge maintenance. Goes `Some` on the first
	/// completed recomputation and stays `Some` from then on.
	value: RwLock<Option<T>>,
	this: Weak<DerivedBody<T>>,
	inner: Mutex<DerivedInner>,
}

struct DerivedInner {
	state: State,
	incoming: EdgeList,
	outgoing: EdgeList,
	registrations: RegistrationList,
}

impl<T: Clone + Send + Sync + 'static> Derived<T> {
	#[must_use]
	pub fn new(func: impl Fn() -> T + Send + Sync + 'static) -> Derived<T> {
		Derived::build(Box::new(func), None, None)
	}

	#[must_use]
	pub fn new_named(
		name: &'static str,
		func: impl Fn() -> T + Send + Sync + 'static,
	) -> Derived<T> {
		Derived::build(Box::new(func), None, Some(name))
	}

	/// Recomputations whose result the rule considers equal to the
	/// cached value do not signal dependents.
	#[must_use]
	pub fn with_equality(
		func: impl Fn() -> T + Send + Sync + 'static,
		equality: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
	) -> Derived<T> {
		Derived::build(Box::new(func), Some(Box::new(equality)), None)
	}

	fn build(
		func: ComputeFn<T>,
		equality: Option<EqualityFn<T>>,
		name: Option<&'static str>,
	) -> Derived<T> {
		let id = NodeId::fresh();
		let body = Arc::new_cyclic(|this: &Weak<DerivedBody<T>>| DerivedBody {
			id,
			name,
			func,
			equality,
			value: RwLock::new(None),
			this: this.clone(),
			inner: Mutex::new(DerivedInner {
				state: State::Doubted,
				incoming: EdgeList::new(),
				outgoing: EdgeList::new(),
				registrations: RegistrationList::new(),
			}),
		});

		export::register(id, Arc::downgrade(&body) as Weak<dyn Observable>);

		Derived { body }
	}

	/// Reads the value, recomputing first if necessary, and records
	/// the read against the active tracking registration and the
	/// computing dependent, if any.
	#[inline]
	pub fn get(&self) -> T {
		self.body.get()
	}

	/// Reads the value, recomputing first if necessary, without
	/// recording anything.
	#[inline]
	pub fn get_once(&self) -> T {
		self.body.get_once()
	}

	pub fn id(&self) -> NodeId {
		self.body.id
	}

	pub fn name(&self) -> Option<&'static str> {
		self.body.name
	}
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Derived<T> {
	/// [`Derived::with_equality`] specialized to `==`.
	#[must_use]
	pub fn distinct(func: impl Fn() -> T + Send + Sync + 'static) -> Derived<T> {
		Derived::with_equality(func, |a, b| a == b)
	}
}

impl<T: Clone + Send + Sync + 'static> DerivedBody<T> {
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

		self.revalidate();

		// Whatever this read returns is what the dependent consumes;
		// pendingness accumulated up to this point is satisfied. Marks
		// arriving later (a concurrent write) stay untouched.
		if let Some((edge, _)) = &mirror {
			edge.clear_pending();
		}

		self.read_cache()
	}

	pub(crate) fn get_once(&self) -> T {
		self.revalidate();
		self.read_cache()
	}

	fn read_cache(&self) -> T {
		self.value.read().clone().unwrap()
	}

	/// Pull phase. Consumes the doubt on this node and runs the rule
	/// only if an upstream value definitely changed. The whole pull
	/// runs with this node as the innermost computing dependent, so
	/// invalidations the pull itself triggers on this thread are
	/// recognized and left to the pull to absorb. Ambient tracking is
	/// suspended for the duration: the rule's reads belong to this
	/// node, not to whatever tracked block triggered the pull.
	fn revalidate(&self) {
		let (incoming, prior) = {
			let has_cache = self.value.read().is_some();
			let mut inner = self.inner.lock();
			if inner.state == State::Valid && has_cache {
				return;
			}
			// NOTE: consumed before recomputing. A write landing while
			// the rule runs re-marks the node and the next read starts
			// over instead of trusting this run's result.
			let prior = mem::replace(&mut inner.state, State::Valid);
			(inner.incoming.clone(), prior)
		};

		let this = self.this.clone() as Weak<dyn Dependent>;
		context::without_tracking(|| {
			context::with_computing(this, || self.pull(incoming, prior));
		});
	}

	fn pull(&self, incoming: EdgeList, prior: State) {
		for edge in &incoming {
			if let Some(from) = edge.from.upgrade() {
				from.refresh();
			}
		}

		let stale = {
			let has_cache = self.value.read().is_some();
			let inner = self.inner.lock();
			prior == State::Interrupted
				|| !has_cache
				|| inner.incoming.iter().any(|edge| edge.is_pending())
		};

		if !stale {
			return;
		}

		self.recompute();
	}

	fn recompute(&self) {
		let drained = {
			let mut inner = self.inner.lock();
			mem::take(&mut inner.incoming)
		};

		// Pendingness on a drained edge is consumed by the removal
		// itself; the rule re-reads whatever it still needs and wires
		// fresh edges as it goes.
		for edge in &drained {
			if let Some(from) = edge.from.upgrade() {
				from.remove_outgoing(edge);
			}
		}

		trace!(id = self.id.as_u64(), "recompute");

		let mut reset = ResetOnUnwind { body: self, armed: true };
		let value = (self.func)();
		reset.armed = false;

		let changed = {
			let mut cache = self.value.write();
			let changed = match (cache.as_ref(), self.equality.as_ref()) {
				(Some(previous), Some(equality)) => !equality(previous, &value),
				_ => true,
			};
			*cache = Some(value);
			changed
		};

		if changed {
			self.propagate();
		}
	}

	/// The value definitely changed: mark every outgoing edge pending,
	/// run the potentially-dirty cascade downstream and only then fire
	/// the registrations the cascade captured.
	fn propagate(&self) {
		let outgoing = {
			let inner = self.inner.lock();
			inner.outgoing.clone()
		};

		let mut fired = Vec::new();
		for edge in &outgoing {
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

struct ResetOnUnwind<'a, T> {
	body: &'a DerivedBody<T>,
	armed: bool,
}

impl<T> Drop for ResetOnUnwind<'_, T> {
	fn drop(&mut self) {
		if self.armed {
			self.body.inner.lock().state = State::Interrupted;
		}
	}
}

impl<T: Clone + Send + Sync + 'static> Observable for DerivedBody<T> {
	fn id(&self) -> NodeId {
		self.id
	}

	fn name(&self) -> Option<&'static str> {
		self.name
	}

	fn kind(&self) -> NodeKind {
		NodeKind::Derived
	}

	fn refresh(&self) {
		self.revalidate();
	}

	fn remove_outgoing(&self, edge: &Arc<Edge>) {
		let mut inner = self.inner.lock();
		inner.outgoing.retain(|e| !Arc::ptr_eq(e, edge));
	}

	fn outgoing(&self) -> Vec<Arc<Edge>> {
		self.inner.lock().outgoing.iter().cloned().collect()
	}
}

impl<T: Clone + Send + Sync + 'static> Dependent for DerivedBody<T> {
	fn id(&self) -> NodeId {
		self.id
	}

	fn invalidate(&self, fired: &mut Vec<Registration>) {
		// A pull in progress on this thread absorbs the change itself;
		// marking here would fire registrations armed by the very read
		// that is doing the pulling.
		if context::computing_includes(self.id) {
			return;
		}

		let (registrations, outgoing) = {
			let mut inner = self.inner.lock();
			let registrations = capture_registrations(&mut inner.registrations);
			if inner.state == State::Valid {
				inner.state = State::Doubted;
				(registrations, inner.outgoing.clone())
			} else {
				// Already marked: everything below is marked too.
				(registrations, EdgeList::new())
			}
		};

		if !outgoing.is_empty() || !registrations.is_empty() {
			trace!(id = self.id.as_u64(), "potentially dirty");
		}

		fired.extend(registrations);

		for edge in &outgoing {
			if let Some(to) = edge.to.upgrade() {
				to.invalidate(fired);
			}
		}
	}

	fn add_incoming(&self, edge: Arc<Edge>) {
		let mut inner = self.inner.lock();
		inner.incoming.push(edge);
	}

	fn remove_incoming(&self, edge: &Arc<Edge>) {
		let mut inner = self.inner.lock();
		inner.incoming.retain(|e| !Arc::ptr_eq(e, edge));
	}
}

impl<T> Drop for DerivedBody<T> {
	fn drop(&mut self) {
		export::unregister(self.id);

		let inner = self.inner.get_mut();
		let incoming = mem::take(&mut inner.incoming);
		let outgoing = mem::take(&mut inner.outgoing);

		for edge in incoming {
			if let Some(from) = edge.from.upgrade() {
				from.remove_outgoing(&edge);
			}
		}

		for edge in outgoing {
			if let Some(to) = edge.to.upgrade() {
				to.remove_incoming(&edge);
			}
		}
	}
}
