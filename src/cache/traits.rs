//! Core traits and types for the caching system.

use serde::{de::DeserializeOwned, Serialize};

/// Trait for values that can be stored in a slot.
///
/// The entity type and schema version are written next to the value, so a
/// record written by a different type or an older layout reads as corrupt
/// instead of deserializing into something wrong.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Entity type name recorded in the slot (e.g., "observation", "forecast")
  fn entity_type() -> &'static str;

  /// Bump whenever the serialized shape changes.
  fn schema_version() -> u32 {
    1
  }
}

/// Outcome of one fetch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult<T> {
  /// The remote operation succeeded in this call
  Fresh(T),
  /// The remote operation failed, served from the slot
  Stale(T),
  /// The remote operation failed and the slot holds nothing usable
  Unavailable,
}

impl<T> FetchResult<T> {
  /// The value regardless of provenance, `None` when unavailable.
  pub fn into_value(self) -> Option<T> {
    match self {
      Self::Fresh(value) | Self::Stale(value) => Some(value),
      Self::Unavailable => None,
    }
  }

  pub fn is_fresh(&self) -> bool {
    matches!(self, Self::Fresh(_))
  }

  pub fn is_stale(&self) -> bool {
    matches!(self, Self::Stale(_))
  }

  pub fn is_unavailable(&self) -> bool {
    matches!(self, Self::Unavailable)
  }

  /// Short provenance label for logs and status output.
  pub fn provenance(&self) -> &'static str {
    match self {
      Self::Fresh(_) => "fresh",
      Self::Stale(_) => "stale",
      Self::Unavailable => "unavailable",
    }
  }
}
