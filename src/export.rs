use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Weak;

use parking_lot::Mutex;

use crate::{NodeId, NodeKind, Observable};

static NODES: Mutex<BTreeMap<u64, Weak<dyn Observable>>> = Mutex::new(BTreeMap::new());

pub(crate) fn register(id: NodeId, node: Weak<dyn Observable>) {
	NODES.lock().insert(id.as_u64(), node);
}

pub(crate) fn unregister(id: NodeId) {
	NODES.lock().remove(&id.as_u64());
}

/// Renders the live graph in Graphviz dot form: sources as boxes,
/// derived nodes as ellipses, pending edges dashed, labels from the
/// node name or the numeric id. Made for eyes and logs; the exact
/// text is not a stable contract and reading it has no effect on the
/// graph.
pub fn dot() -> String {
	let nodes: Vec<_> = {
		let nodes = NODES.lock();
		nodes.values().filter_map(Weak::upgrade).collect()
	};

	let mut out = String::from("digraph stategraph {\n");

	for node in &nodes {
		let id = node.id().as_u64();
		let shape = match node.kind() {
			NodeKind::Source => "box",
			NodeKind::Derived => "ellipse",
		};
		let label = match node.name() {
			Some(name) => name.replace('"', "\\\""),
			None => format!("#{id}"),
		};
		let _ = writeln!(out, "\tn{id} [label=\"{label}\", shape={shape}];");
	}

	for node in &nodes {
		for edge in node.outgoing() {
			if edge.to.upgrade().is_none() {
				continue;
			}
			let style = if edge.is_pending() {
				" [style=dashed]"
			} else {
				""
			};
			let _ = writeln!(
				out,
				"\tn{} -> n{}{};",
				edge.from_id().as_u64(),
				edge.to_id().as_u64(),
				style
			);
		}
	}

	out.push_str("}\n");
	out
}
