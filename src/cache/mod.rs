//! Last-known-good caching for remote operations.
//!
//! This module is independent of any particular weather service:
//! - One persistent slot per named remote operation, stored as a versioned,
//!   checksummed JSON record under `<root>/cache/<name>`
//! - Atomic overwrite (temp file + rename), corrupt records read as empty
//! - `fetch_with_fallback` serves the fresh value, the stored value, or
//!   `Unavailable`, and never returns an error

mod error;
mod layer;
mod storage;
mod traits;

pub use error::{RemoteError, SlotError};
pub use layer::fetch_with_fallback;
pub use storage::{CachedValue, Slot, SlotStore, StoreConfig};
pub use traits::{Cacheable, FetchResult};
