pub mod macros;

mod cancel;
mod container;
mod context;
mod derived;
mod edge;
mod export;
mod group;
mod reaction;
mod sequence;
mod source;
mod track;
mod value;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use cancel::Scope;
pub use container::{ChangeNotifier, Container, Memory};
pub use derived::Derived;
pub use edge::Edge;
pub use export::dot;
pub use group::{autorun, watch, watch_with};
#[cfg(feature = "tokio")]
pub use reaction::Tokio;
pub use reaction::{Dispatch, Inline, Reaction};
pub use sequence::{Changes, ChangesStream, NextChange};
pub use source::Source;
pub use track::{track, Registration};
pub use value::{Access, Value};

/// Process-unique node identifier, allocated from a global counter.
/// Identity comparisons, edge dedup and the debug export all key on it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(u64);

impl NodeId {
	pub(crate) fn fresh() -> NodeId {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		NodeId(NEXT.fetch_add(1, Ordering::Relaxed))
	}

	pub fn as_u64(&self) -> u64 {
		self.0
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeKind {
	Source,
	Derived,
}

/// The "from" side of an edge: a node whose value others can read
/// and depend on.
pub trait Observable: Send + Sync + 'static {
	fn id(&self) -> NodeId;

	fn name(&self) -> Option<&'static str>;

	fn kind(&self) -> NodeKind;

	/// This function is called during the pull phase when a
	/// downstream node wants this observable to bring its own
	/// value up to date before edge pendingness is inspected.
	fn refresh(&self);

	/// Notify this observable that `edge` no longer points at a
	/// live dependent and should leave its outgoing list.
	fn remove_outgoing(&self, edge: &Arc<Edge>);

	/// Snapshot of the current outgoing edges.
	fn outgoing(&self) -> Vec<Arc<Edge>>;
}

/// The "to" side of an edge: a node that consumes other values and
/// participates in the potentially-dirty cascade.
pub trait Dependent: Send + Sync + 'static {
	fn id(&self) -> NodeId;

	/// This function is called during the push phase to mark this
	/// node potentially dirty. Captured registrations are appended
	/// to `fired`; the initiating write runs them after the whole
	/// cascade has finished marking.
	fn invalidate(&self, fired: &mut Vec<Registration>);

	fn add_incoming(&self, edge: Arc<Edge>);

	fn remove_incoming(&self, edge: &Arc<Edge>);
}
