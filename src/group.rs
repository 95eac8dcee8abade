use std::ops::ControlFlow;

use crate::cancel::Scope;
use crate::context;
use crate::reaction::{Inline, Reaction};

/// Continuous group tracking: runs `body` once now and again after
/// any node it read mutates. Every re-execution first tears down the
/// subscriptions the previous run created (nested groups, watches,
/// sequences), then runs `body` with this group's scope current so
/// replacements attach in their place. Nesting a group inside another
/// group body parents it automatically.
pub fn autorun(mut body: impl FnMut() + Send + 'static) -> Reaction {
	let scope = match Scope::current() {
		Some(parent) => parent.child(),
		None => Scope::root(),
	};

	let weak = scope.downgrade();
	Reaction::start_in(
		scope,
		Inline,
		move || {
			let Some(scope) = weak.upgrade() else {
				return;
			};
			if scope.is_cancelled() {
				return;
			}
			scope.cancel_children();
			scope.run(|| body());
		},
		|| ControlFlow::Continue(()),
	)
}

/// Map tracking with the distinct filter: runs `project` tracked and
/// hands the result to `on_change` whenever it differs from the
/// previous emission. The first projection always passes, so the
/// handler sees the initial value.
pub fn watch<T, P, F>(project: P, on_change: F) -> Reaction
where
	T: Clone + PartialEq + Send + 'static,
	P: FnMut() -> T + Send + 'static,
	F: FnMut(&T) + Send + 'static,
{
	let mut previous: Option<T> = None;
	watch_with(
		project,
		move |value| {
			let pass = previous.as_ref() != Some(value);
			if pass {
				previous = Some(value.clone());
			}
			pass
		},
		on_change,
	)
}

/// Map tracking with an explicit stateful filter between projection
/// and handler. The handler runs untracked: nodes it reads do not
/// join the projection's dependency set.
pub fn watch_with<T, P, Fi, F>(mut project: P, mut filter: Fi, mut on_change: F) -> Reaction
where
	T: Send + 'static,
	P: FnMut() -> T + Send + 'static,
	Fi: FnMut(&T) -> bool + Send + 'static,
	F: FnMut(&T) + Send + 'static,
{
	Reaction::start(
		move || {
			let value = project();
			if filter(&value) {
				context::with_clean(|| on_change(&value));
			}
		},
		|| ControlFlow::Continue(()),
	)
}
