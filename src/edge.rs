use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use smallvec::SmallVec;

use crate::context;
use crate::track::Registration;
use crate::{Dependent, NodeId, Observable};

pub(crate) type EdgeList = SmallVec<[Arc<Edge>; 4]>;
pub(crate) type RegistrationList = SmallVec<[Registration; 2]>;

/// A dependency relationship between two nodes. Both adjacency lists
/// share the same allocation; neither endpoint owns the other, so a
/// dropped node never keeps its neighbors alive.
pub struct Edge {
	pub(crate) from_id: NodeId,
	pub(crate) to_id: NodeId,
	pub(crate) from: Weak<dyn Observable>,
	pub(crate) to: Weak<dyn Dependent>,
	pending: AtomicBool,
}

impl Edge {
	pub(crate) fn new(
		from_id: NodeId,
		from: Weak<dyn Observable>,
		to_id: NodeId,
		to: Weak<dyn Dependent>,
	) -> Arc<Edge> {
		Arc::new(Edge {
			from_id,
			to_id,
			from,
			to,
			pending: AtomicBool::new(false),
		})
	}

	#[inline]
	pub fn from_id(&self) -> NodeId {
		self.from_id
	}

	#[inline]
	pub fn to_id(&self) -> NodeId {
		self.to_id
	}

	/// A pending edge means the upstream value definitely changed
	/// since the dependent last consumed it. Potential dirtiness on
	/// the dependent alone is not enough to force a recomputation.
	pub fn is_pending(&self) -> bool {
		self.pending.load(Ordering::Acquire)
	}

	pub(crate) fn mark_pending(&self) {
		self.pending.store(true, Ordering::Release);
	}

	pub(crate) fn clear_pending(&self) {
		self.pending.store(false, Ordering::Release);
	}
}

/// Records the read effects for the node currently being read: attach
/// the active tracking registration and wire an edge towards the
/// computing dependent. Runs under the reading node's lock; the
/// returned edge still has to be mirrored into the dependent's
/// incoming list once that lock is released.
pub(crate) fn record_read(
	self_id: NodeId,
	this: Weak<dyn Observable>,
	outgoing: &mut EdgeList,
	registrations: &mut RegistrationList,
) -> Option<(Arc<Edge>, Arc<dyn Dependent>)> {
	if let Some(registration) = context::tracking() {
		if !registration.is_spent() && !registrations.iter().any(|r| r.ptr_eq(&registration)) {
			registrations.push(registration);
		}
	}

	let parent = context::computing()?.upgrade()?;
	let to_id = parent.id();

	// NOTE: a node read while its own rule runs must not depend on itself.
	if to_id == self_id {
		return None;
	}

	if outgoing.iter().any(|edge| edge.to_id == to_id) {
		return None;
	}

	let edge = Edge::new(self_id, this, to_id, Arc::downgrade(&parent));
	outgoing.push(edge.clone());

	Some((edge, parent))
}
