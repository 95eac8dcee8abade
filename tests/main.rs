use std::ops::ControlFlow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use stategraph::{
	autorun, derived, dot, track, watch, watch_with, ChangeNotifier, Changes, Container, Derived,
	Reaction, Scope, Source, Value,
};


use mock::Spy;

#[test]
fn derived_computes_lazily_and_caches() {
	let runs = Arc::new(AtomicU64::new(0));
	let a = Source::new(10u64);
	assert_eq!(a.get_once(), 10);

	let b = Derived::new({
		let a = a.clone();
		let runs = runs.clone();
		move || {
			runs.fetch_add(1, Ordering::SeqCst);
			a.get() * 2
		}
	});

	assert_eq!(runs.load(Ordering::SeqCst), 0);
	assert_eq!(b.get_once(), 20);
	assert_eq!(b.get_once(), 20);
	assert_eq!(runs.load(Ordering::SeqCst), 1);

	a.set(11);
	assert_eq!(runs.load(Ordering::SeqCst), 1);
	assert_eq!(b.get_once(), 22);
	assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn sum_tracks_both_producers() {
	let a = Source::new(2u64);
	let b = Source::new(3u64);

	let sum = Derived::new({
		let a = a.clone();
		let b = b.clone();
		move || a.get() + b.get()
	});

	assert_eq!(sum.get_once(), 5);

	a.set(10);
	assert_eq!(sum.get_once(), 13);

	b.set(4);
	assert_eq!(sum.get_once(), 14);
}

#[test]
fn diamond_recomputes_each_node_once() {
	let left_runs = Arc::new(AtomicU64::new(0));
	let right_runs = Arc::new(AtomicU64::new(0));
	let top_runs = Arc::new(AtomicU64::new(0));

	let base = Source::new(1u64);

	let left = Derived::new({
		let base = base.clone();
		let left_runs = left_runs.clone();
		move || {
			left_runs.fetch_add(1, Ordering::SeqCst);
			base.get() + 1
		}
	});

	let right = Derived::new({
		let base = base.clone();
		let right_runs = right_runs.clone();
		move || {
			right_runs.fetch_add(1, Ordering::SeqCst);
			base.get() * 10
		}
	});

	let top = Derived::new({
		let left = left.clone();
		let right = right.clone();
		let top_runs = top_runs.clone();
		move || {
			top_runs.fetch_add(1, Ordering::SeqCst);
			left.get() + right.get()
		}
	});

	assert_eq!(top.get_once(), 12);
	assert_eq!(left_runs.load(Ordering::SeqCst), 1);
	assert_eq!(right_runs.load(Ordering::SeqCst), 1);
	assert_eq!(top_runs.load(Ordering::SeqCst), 1);

	base.set(2);
	assert_eq!(top.get_once(), 23);
	assert_eq!(left_runs.load(Ordering::SeqCst), 2);
	assert_eq!(right_runs.load(Ordering::SeqCst), 2);
	assert_eq!(top_runs.load(Ordering::SeqCst), 2);

	assert_eq!(top.get_once(), 23);
	assert_eq!(top_runs.load(Ordering::SeqCst), 2);
}

#[test]
fn equal_recomputation_does_not_signal_downstream() {
	let parity_runs = Arc::new(AtomicU64::new(0));
	let label_runs = Arc::new(AtomicU64::new(0));

	let base = Source::new(4u64);

	let parity = Derived::distinct({
		let base = base.clone();
		let parity_runs = parity_runs.clone();
		move || {
			parity_runs.fetch_add(1, Ordering::SeqCst);
			base.get() % 2
		}
	});

	let label = Derived::new({
		let parity = parity.clone();
		let label_runs = label_runs.clone();
		move || {
			label_runs.fetch_add(1, Ordering::SeqCst);
			if parity.get() == 0 { "even" } else { "odd" }
		}
	});

	assert_eq!(label.get_once(), "even");
	assert_eq!(parity_runs.load(Ordering::SeqCst), 1);
	assert_eq!(label_runs.load(Ordering::SeqCst), 1);

	base.set(6);
	assert_eq!(label.get_once(), "even");
	assert_eq!(parity_runs.load(Ordering::SeqCst), 2);
	assert_eq!(label_runs.load(Ordering::SeqCst), 1);

	base.set(7);
	assert_eq!(label.get_once(), "odd");
	assert_eq!(parity_runs.load(Ordering::SeqCst), 3);
	assert_eq!(label_runs.load(Ordering::SeqCst), 2);
}

#[test]
fn writes_signal_even_when_the_value_is_unchanged() {
	let runs = Arc::new(AtomicU64::new(0));
	let a = Source::new(5u64);

	let b = Derived::new({
		let a = a.clone();
		let runs = runs.clone();
		move || {
			runs.fetch_add(1, Ordering::SeqCst);
			a.get()
		}
	});

	assert_eq!(b.get_once(), 5);
	assert_eq!(runs.load(Ordering::SeqCst), 1);

	a.set(5);
	assert_eq!(b.get_once(), 5);
	assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn equal_write_still_fires_registrations() {
	let mock = mock::SharedMock::new();
	mock.get().expect_notice().times(1).return_const(());

	let a = Source::new(5u64);

	track(
		{
			let a = a.clone();
			move || a.get()
		},
		{
			let mock = mock.clone();
			move || mock.get().notice()
		},
	);

	a.set(5);
	mock.get().checkpoint();
}

#[test]
fn dependencies_rewire_to_the_branch_actually_read() {
	let runs = Arc::new(AtomicU64::new(0));

	let gate = Source::new(true);
	let a = Source::new(1u64);
	let b = Source::new(10u64);

	let pick = Derived::new({
		let gate = gate.clone();
		let a = a.clone();
		let b = b.clone();
		let runs = runs.clone();
		move || {
			runs.fetch_add(1, Ordering::SeqCst);
			if gate.get() { a.get() } else { b.get() }
		}
	});

	assert_eq!(pick.get_once(), 1);
	assert_eq!(runs.load(Ordering::SeqCst), 1);

	// the branch nobody read is not a dependency
	b.set(20);
	assert_eq!(pick.get_once(), 1);
	assert_eq!(runs.load(Ordering::SeqCst), 1);

	gate.set(false);
	assert_eq!(pick.get_once(), 20);
	assert_eq!(runs.load(Ordering::SeqCst), 2);

	a.set(100);
	assert_eq!(pick.get_once(), 20);
	assert_eq!(runs.load(Ordering::SeqCst), 2);

	b.set(30);
	assert_eq!(pick.get_once(), 30);
	assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[test]
fn one_shot_registration_fires_once() {
	let mock = mock::SharedMock::new();
	mock.get().expect_notice().times(1).return_const(());

	let a = Source::new(1u64);

	let value = track(
		{
			let a = a.clone();
			move || a.get()
		},
		{
			let mock = mock.clone();
			move || mock.get().notice()
		},
	);
	assert_eq!(value, 1);

	a.set(2);
	a.set(3);

	mock.get().checkpoint();
}

#[test]
fn registration_attaches_to_every_node_read() {
	let mock = mock::SharedMock::new();
	mock.get().expect_notice().times(1).return_const(());

	let a = Source::new(1u64);
	let b = Source::new(2u64);

	track(
		{
			let a = a.clone();
			let b = b.clone();
			move || a.get() + b.get()
		},
		{
			let mock = mock.clone();
			move || mock.get().notice()
		},
	);

	b.set(5);
	mock.get().checkpoint();

	// the copy left on the other node is spent
	mock.get().expect_notice().times(0).return_const(());
	a.set(9);
	mock.get().checkpoint();
}

#[test]
fn handler_runs_after_the_graph_is_marked() {
	let a = Source::new(1u64);

	let double = Derived::new({
		let a = a.clone();
		move || a.get() * 2
	});
	assert_eq!(double.get_once(), 2);

	let seen = Arc::new(Mutex::new(None));
	track(
		{
			let a = a.clone();
			move || a.get()
		},
		{
			let double = double.clone();
			let seen = seen.clone();
			move || {
				*seen.lock().unwrap() = Some(double.get_once());
			}
		},
	);

	a.set(21);
	assert_eq!(*seen.lock().unwrap(), Some(42));
}

#[test]
fn tracked_read_of_a_chain_fires_from_the_root_write() {
	let mock = mock::SharedMock::new();
	mock.get().expect_notice().times(1).return_const(());

	let a = Source::new(1u64);

	let b = Derived::new({
		let a = a.clone();
		move || a.get() * 2
	});

	let c = Derived::new({
		let b = b.clone();
		move || b.get() + 1
	});

	let value = track(
		{
			let c = c.clone();
			move || c.get()
		},
		{
			let mock = mock.clone();
			move || mock.get().notice()
		},
	);
	assert_eq!(value, 3);

	a.set(5);
	mock.get().checkpoint();
	assert_eq!(c.get_once(), 11);
}

#[test]
fn each_consumer_fires_for_one_write() {
	let mock = mock::SharedMock::new();
	mock.get().expect_notice().times(2).return_const(());

	let a = Source::new(1u64);

	track(
		{
			let a = a.clone();
			move || a.get()
		},
		{
			let mock = mock.clone();
			move || mock.get().notice()
		},
	);
	track(
		{
			let a = a.clone();
			move || a.get()
		},
		{
			let mock = mock.clone();
			move || mock.get().notice()
		},
	);

	a.set(2);
	mock.get().checkpoint();
}

#[test]
fn untracked_reads_attach_nothing() {
	let mock = mock::SharedMock::new();
	mock.get().expect_notice().times(0).return_const(());

	let a = Source::new(1u64);

	let b = Derived::new({
		let a = a.clone();
		move || a.get()
	});

	track(
		{
			let a = a.clone();
			let b = b.clone();
			move || a.get_once() + b.get_once()
		},
		{
			let mock = mock.clone();
			move || mock.get().notice()
		},
	);

	a.set(2);
	mock.get().checkpoint();
}

#[test]
fn write_inside_a_tracked_block_does_not_self_fire() {
	let mock = mock::SharedMock::new();
	mock.get().expect_notice().times(0).return_const(());

	let a = Source::new(1u64);

	let value = track(
		{
			let a = a.clone();
			move || {
				let v = a.get();
				a.set(v + 1);
				v
			}
		},
		{
			let mock = mock.clone();
			move || mock.get().notice()
		},
	);
	assert_eq!(value, 1);
	assert_eq!(a.get_once(), 2);
	mock.get().checkpoint();

	// still armed for a genuine write from outside
	mock.get().expect_notice().times(1).return_const(());
	a.set(10);
	mock.get().checkpoint();
}

#[test]
fn group_reruns_on_change() {
	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(1).return_const(());

	let a = Source::new(1u64);

	let r = autorun({
		let a = a.clone();
		let mock = mock.clone();
		move || mock.get().trigger(a.get())
	});
	mock.get().checkpoint();

	mock.get().expect_trigger().times(2).return_const(());
	a.set(2);
	a.set(3);
	mock.get().checkpoint();

	r.cancel();
	mock.get().expect_trigger().times(0).return_const(());
	a.set(4);
	mock.get().checkpoint();
}

#[test]
fn group_writing_its_own_dependency_settles() {
	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(1).return_const(());

	let a = Source::new(1u64);

	let r = autorun({
		let a = a.clone();
		let mock = mock.clone();
		move || {
			let v = a.get();
			a.set(v);
			mock.get().trigger(v);
		}
	});
	mock.get().checkpoint();

	mock.get().expect_trigger().times(1).return_const(());
	a.set(8);
	mock.get().checkpoint();
	assert!(!r.is_cancelled());
	r.cancel();
}

#[test]
fn nested_groups_tear_down_before_rerun() {
	let outer = Source::new(1u64);
	let inner = Source::new(10u64);
	let mock = mock::SharedMock::new();

	mock.get().expect_trigger().times(1).return_const(());
	let r = autorun({
		let outer = outer.clone();
		let inner = inner.clone();
		let mock = mock.clone();
		move || {
			outer.get();
			autorun({
				let inner = inner.clone();
				let mock = mock.clone();
				move || mock.get().trigger(inner.get())
			});
		}
	});
	mock.get().checkpoint();

	// rerun cancels the previous inner group, then builds its successor
	mock.get().expect_trigger().times(1).return_const(());
	outer.set(2);
	mock.get().checkpoint();

	// exactly one inner group is live, so one fire per write
	mock.get().expect_trigger().times(1).return_const(());
	inner.set(11);
	mock.get().checkpoint();

	r.cancel();
	mock.get().expect_trigger().times(0).return_const(());
	inner.set(12);
	mock.get().checkpoint();
}

#[test]
fn conditional_nested_groups_follow_their_condition() {
	let enabled = Source::new(true);
	let inner = Source::new(0u64);
	let mock = mock::SharedMock::new();

	mock.get().expect_trigger().times(1).return_const(());
	let r = autorun({
		let enabled = enabled.clone();
		let inner = inner.clone();
		let mock = mock.clone();
		move || {
			if enabled.get() {
				autorun({
					let inner = inner.clone();
					let mock = mock.clone();
					move || mock.get().trigger(inner.get())
				});
			}
		}
	});
	mock.get().checkpoint();

	// condition off: the nested group dies and nothing replaces it
	mock.get().expect_trigger().times(0).return_const(());
	enabled.set(false);
	inner.set(1);
	mock.get().checkpoint();

	// condition back on: a fresh nested group picks the value up
	mock.get().expect_trigger().times(1).return_const(());
	enabled.set(true);
	mock.get().checkpoint();

	mock.get().expect_trigger().times(1).return_const(());
	inner.set(2);
	mock.get().checkpoint();

	r.cancel();
}

#[test]
fn groups_started_in_a_scope_die_with_it() {
	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(1).return_const(());

	let a = Source::new(1u64);
	let scope = Scope::root();

	scope.run({
		let a = a.clone();
		let mock = mock.clone();
		move || {
			autorun({
				let a = a.clone();
				let mock = mock.clone();
				move || mock.get().trigger(a.get())
			});
		}
	});
	mock.get().checkpoint();

	scope.cancel();
	mock.get().expect_trigger().times(0).return_const(());
	a.set(2);
	mock.get().checkpoint();
}

#[test]
fn watch_emits_initial_and_distinct_values() {
	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(1).return_const(());

	let a = Source::new(3u64);

	let r = watch(
		{
			let a = a.clone();
			move || a.get() % 2
		},
		{
			let mock = mock.clone();
			move |parity: &u64| mock.get().trigger(*parity)
		},
	);
	mock.get().checkpoint();

	mock.get().expect_trigger().times(0).return_const(());
	a.set(5);
	mock.get().checkpoint();

	mock.get().expect_trigger().times(1).return_const(());
	a.set(6);
	mock.get().checkpoint();

	r.cancel();
}

#[test]
fn watch_with_applies_a_custom_filter() {
	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(0).return_const(());

	let level = Source::new(0u64);

	let r = watch_with(
		{
			let level = level.clone();
			move || level.get()
		},
		|level| *level > 10,
		{
			let mock = mock.clone();
			move |level: &u64| mock.get().trigger(*level)
		},
	);
	mock.get().checkpoint();

	mock.get().expect_trigger().times(1).return_const(());
	level.set(3);
	level.set(11);
	mock.get().checkpoint();

	r.cancel();
}

#[test]
fn reaction_decide_can_stop_the_cycle() {
	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(1).return_const(());

	let a = Source::new(1u64);

	let r = Reaction::start(
		{
			let a = a.clone();
			let mock = mock.clone();
			move || mock.get().trigger(a.get())
		},
		|| ControlFlow::Break(()),
	);
	mock.get().checkpoint();

	mock.get().expect_trigger().times(0).return_const(());
	a.set(2);
	assert!(r.is_cancelled());
	a.set(3);
	mock.get().checkpoint();
}

#[test]
fn cancelling_a_reaction_twice_is_harmless() {
	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(1).return_const(());

	let a = Source::new(1u64);

	let r = Reaction::start(
		{
			let a = a.clone();
			let mock = mock.clone();
			move || mock.get().trigger(a.get())
		},
		|| ControlFlow::Continue(()),
	);
	mock.get().checkpoint();

	r.cancel();
	r.cancel();
	assert!(r.is_cancelled());

	mock.get().expect_trigger().times(0).return_const(());
	a.set(2);
	mock.get().checkpoint();
}

#[test]
fn scope_cancels_children_before_itself() {
	let order = Arc::new(Mutex::new(Vec::new()));

	let root = Scope::root();
	let child = root.child();
	let grandchild = child.child();

	root.on_cancel({
		let order = order.clone();
		move || order.lock().unwrap().push("root")
	});
	child.on_cancel({
		let order = order.clone();
		move || order.lock().unwrap().push("child")
	});
	grandchild.on_cancel({
		let order = order.clone();
		move || order.lock().unwrap().push("grandchild")
	});

	root.cancel();
	assert_eq!(*order.lock().unwrap(), ["grandchild", "child", "root"]);

	root.cancel();
	assert_eq!(order.lock().unwrap().len(), 3);
}

#[test]
fn cancelled_scope_runs_late_callbacks_at_once() {
	let root = Scope::root();
	root.cancel();

	let child = root.child();
	assert!(child.is_cancelled());

	let ran = Arc::new(AtomicBool::new(false));
	child.on_cancel({
		let ran = ran.clone();
		move || ran.store(true, Ordering::SeqCst)
	});
	assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn scope_run_sets_the_current_scope() {
	assert!(Scope::current().is_none());

	let scope = Scope::root();
	scope.run(|| {
		assert!(Scope::current().is_some());
	});

	assert!(Scope::current().is_none());
}

struct SharedCell {
	store: Arc<Mutex<u64>>,
	notifier: Arc<Mutex<Option<ChangeNotifier>>>,
	sets: Arc<AtomicU64>,
}

impl Container<u64> for SharedCell {
	fn get(&self) -> u64 {
		*self.store.lock().unwrap()
	}

	fn set(&self, value: u64) {
		self.sets.fetch_add(1, Ordering::SeqCst);
		*self.store.lock().unwrap() = value;
	}

	fn on_loaded(&self, notifier: ChangeNotifier) {
		*self.notifier.lock().unwrap() = Some(notifier);
	}

	fn on_unloaded(&self) {
		self.notifier.lock().unwrap().take();
	}
}

#[test]
fn external_container_changes_reach_the_graph() {
	let store = Arc::new(Mutex::new(1u64));
	let slot = Arc::new(Mutex::new(None));
	let sets = Arc::new(AtomicU64::new(0));

	let a = Source::with_container(SharedCell {
		store: store.clone(),
		notifier: slot.clone(),
		sets: sets.clone(),
	});

	let double = Derived::new({
		let a = a.clone();
		move || a.get() * 2
	});
	assert_eq!(double.get_once(), 2);

	// the store mutates behind the graph's back
	*store.lock().unwrap() = 7;
	let notifier = slot.lock().unwrap().clone().unwrap();
	notifier.notify();

	assert_eq!(double.get_once(), 14);
	assert_eq!(sets.load(Ordering::SeqCst), 0);

	a.set(3);
	assert_eq!(sets.load(Ordering::SeqCst), 1);
	assert_eq!(double.get_once(), 6);

	drop(double);
	drop(a);
	assert!(slot.lock().unwrap().is_none());
}

#[test]
fn dropping_a_dependent_detaches_its_edges() {
	let a = Source::new(1u64);

	let b = Derived::new({
		let a = a.clone();
		move || a.get() + 1
	});
	assert_eq!(b.get_once(), 2);

	drop(b);
	a.set(5);
	assert_eq!(a.get_once(), 5);
}

#[test]
fn dropping_a_tracked_source_silences_its_registration() {
	let mock = mock::SharedMock::new();
	mock.get().expect_notice().times(0).return_const(());

	let a = Source::new(1u64);

	let value = track(
		{
			let a = a.clone();
			move || a.get()
		},
		{
			let mock = mock.clone();
			move || mock.get().notice()
		},
	);
	assert_eq!(value, 1);

	// the node takes its armed registration down with it
	drop(a);
	mock.get().checkpoint();
}

#[test]
fn panicking_rule_leaves_the_node_recoverable() {
	let explode = Arc::new(AtomicBool::new(true));
	let runs = Arc::new(AtomicU64::new(0));

	let a = Source::new(1u64);

	let b = Derived::new({
		let a = a.clone();
		let explode = explode.clone();
		let runs = runs.clone();
		move || {
			runs.fetch_add(1, Ordering::SeqCst);
			if explode.load(Ordering::SeqCst) {
				panic!("rule under test");
			}
			a.get() + 1
		}
	});

	assert!(catch_unwind(AssertUnwindSafe(|| b.get_once())).is_err());

	explode.store(false, Ordering::SeqCst);
	assert_eq!(b.get_once(), 2);
	assert_eq!(runs.load(Ordering::SeqCst), 2);

	// an interrupted run with a cache behind it recomputes as well
	explode.store(true, Ordering::SeqCst);
	a.set(10);
	assert!(catch_unwind(AssertUnwindSafe(|| b.get_once())).is_err());

	explode.store(false, Ordering::SeqCst);
	assert_eq!(b.get_once(), 11);
	assert_eq!(runs.load(Ordering::SeqCst), 4);
}

#[test]
fn update_applies_in_place_and_signals() {
	let mock = mock::SharedMock::new();
	mock.get().expect_notice().times(1).return_const(());

	let a = Source::new(10u64);

	track(
		{
			let a = a.clone();
			move || a.get()
		},
		{
			let mock = mock.clone();
			move || mock.get().notice()
		},
	);

	a.update(|v| *v += 5);
	assert_eq!(a.get_once(), 15);
	mock.get().checkpoint();
}

#[test]
fn map_projects_through_a_derived_node() {
	let a = Source::new(3u64);

	let tripled = a.map(|v| v * 3);
	assert_eq!(tripled.get_once(), 9);

	a.set(4);
	assert_eq!(tripled.get_once(), 12);
}

#[test]
fn value_handles_erase_the_node_kind() {
	let a = Source::new(7u64);

	let b = Derived::new({
		let a = a.clone();
		move || a.get() + 1
	});

	let values: Vec<Value<u64>> = vec![Value::from(a.clone()), Value::from(b.clone())];
	assert_eq!(values[0].get_once(), 7);
	assert_eq!(values[1].get_once(), 8);

	// reads through the erased handle still track
	let mock = mock::SharedMock::new();
	mock.get().expect_notice().times(1).return_const(());

	track(
		{
			let value = values[0].clone();
			move || value.get()
		},
		{
			let mock = mock.clone();
			move || mock.get().notice()
		},
	);

	a.set(9);
	mock.get().checkpoint();
	assert_eq!(values[1].get_once(), 10);
}

#[test]
fn named_nodes_render_in_the_dot_export() {
	let a = Source::new_named("speed", 1u64);
	let b = Derived::new_named("speed-label", {
		let a = a.clone();
		move || a.get() * 3
	});
	assert_eq!(b.get_once(), 3);
	assert_eq!(a.name(), Some("speed"));
	assert_eq!(b.name(), Some("speed-label"));
	assert_ne!(a.id(), b.id());

	let graph = dot();
	assert!(graph.starts_with("digraph"));
	assert!(graph.contains("label=\"speed\", shape=box"));
	assert!(graph.contains("label=\"speed-label\", shape=ellipse"));
	assert!(graph.contains(&format!("n{} -> n{};", a.id().as_u64(), b.id().as_u64())));
}

#[test]
fn pending_edges_render_dashed() {
	let a = Source::new(1u64);

	let b = Derived::new({
		let a = a.clone();
		move || a.get()
	});
	let c = Derived::new({
		let b = b.clone();
		move || b.get()
	});
	assert_eq!(c.get_once(), 1);

	a.set(2);
	assert_eq!(b.get_once(), 2);

	let graph = dot();
	let dashed = format!("n{} -> n{} [style=dashed];", b.id().as_u64(), c.id().as_u64());
	assert!(graph.contains(&dashed));

	assert_eq!(c.get_once(), 2);
	let graph = dot();
	let solid = format!("n{} -> n{};", b.id().as_u64(), c.id().as_u64());
	assert!(graph.contains(&solid));
}

#[test]
fn dropped_nodes_leave_the_dot_export() {
	let a = Source::new_named("ephemeral", 1u64);
	let id = a.id().as_u64();

	assert!(dot().contains(&format!("n{id} [")));
	drop(a);
	assert!(!dot().contains(&format!("n{id} [")));
}

#[test]
fn macros_capture_their_handles() {
	let a = Source::new(2u64);
	let b = Source::new(3u64);

	let sum = derived!((a, b) => a.get() + b.get());
	assert_eq!(sum.get_once(), 5);

	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(1).return_const(());

	let r = autorun!((sum, mock) => mock.get().trigger(sum.get()));
	mock.get().checkpoint();

	mock.get().expect_trigger().times(1).return_const(());
	a.set(4);
	mock.get().checkpoint();

	r.cancel();
}

#[tokio::test]
async fn change_stream_yields_each_settled_value() {
	let a = Source::new(0u64);

	let changes = Changes::new({
		let a = a.clone();
		move || a.get()
	});
	let mut stream = changes.stream();

	assert_eq!(stream.next().await, Some(0));

	a.set(1);
	assert_eq!(stream.next().await, Some(1));

	a.set(2);
	a.set(3);
	assert_eq!(stream.next().await, Some(3));
}
