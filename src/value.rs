use std::sync::Arc;

use crate::derived::{Derived, DerivedBody};
use crate::source::{Source, SourceBody};
use crate::{NodeId, Observable};

/// Object-safe read surface shared by both node kinds.
pub trait Access<T>: Observable {
	fn get(&self) -> T;
	fn get_once(&self) -> T;
}

impl<T: Clone + Send + Sync + 'static> Access<T> for SourceBody<T> {
	fn get(&self) -> T {
		SourceBody::get(self)
	}

	fn get_once(&self) -> T {
		SourceBody::get_once(self)
	}
}

impl<T: Clone + Send + Sync + 'static> Access<T> for DerivedBody<T> {
	fn get(&self) -> T {
		DerivedBody::get(self)
	}

	fn get_once(&self) -> T {
		DerivedBody::get_once(self)
	}
}

/// A type-erased, read-only handle over any node holding `T`, for
/// collaborators that do not care whether the value is a root or a
/// computation.
pub struct Value<T> {
	value: Arc<dyn Access<T>>,
}

impl<T> Clone for Value<T> {
	fn clone(&self) -> Self {
		Value {
			value: self.value.clone(),
		}
	}
}

impl<T: 'static> Value<T> {
	pub fn new(value: Arc<dyn Access<T>>) -> Value<T> {
		Value { value }
	}

	#[inline]
	pub fn get(&self) -> T {
		self.value.get()
	}

	#[inline]
	pub fn get_once(&self) -> T {
		self.value.get_once()
	}

	pub fn id(&self) -> NodeId {
		self.value.id()
	}

	pub fn name(&self) -> Option<&'static str> {
		self.value.name()
	}
}

impl<T: Clone + Send + Sync + 'static> From<Source<T>> for Value<T> {
	fn from(source: Source<T>) -> Value<T> {
		Value { value: source.body }
	}
}

impl<T: Clone + Send + Sync + 'static> From<Derived<T>> for Value<T> {
	fn from(derived: Derived<T>) -> Value<T> {
		Value { value: derived.body }
	}
}
