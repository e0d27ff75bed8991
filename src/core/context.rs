//! Request-scoped context, merged onto a request before routing.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// A typed map of request-scoped values. Each type is one "key"; merging a
/// context onto a request replaces entries of the same type.
#[derive(Default)]
pub struct Context {
  map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Context {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder form of [`Context::insert`].
  pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
    self.insert(value);
    self
  }

  pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
    self
      .map
      .insert(TypeId::of::<T>(), Box::new(value))
      .and_then(|old| old.downcast::<T>().ok())
      .map(|old| *old)
  }

  pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
    self
      .map
      .get(&TypeId::of::<T>())
      .and_then(|v| v.downcast_ref::<T>())
  }

  pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
    self.map.contains_key(&TypeId::of::<T>())
  }

  pub fn len(&self) -> usize {
    self.map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }

  /// Shallow merge: every entry of `other` overwrites the same type here.
  pub fn merge(&mut self, other: Context) {
    self.map.extend(other.map);
  }
}

impl fmt::Debug for Context {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Context").field("entries", &self.map.len()).finish()
  }
}
