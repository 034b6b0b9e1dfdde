//! Fallback layer that decides between fresh, stale and unavailable results.

use chrono::Utc;
use std::future::Future;
use tracing::{error, info, warn};

use super::error::RemoteError;
use super::storage::Slot;
use super::traits::{Cacheable, FetchResult};

/// Run a remote operation and fall back to the slot's last good value.
///
/// 1. Await `fetcher`
/// 2. On success, persist the value and return `Fresh`
/// 3. On failure, return `Stale` with the stored value, or `Unavailable` if the
///    slot is empty or corrupt
///
/// Never returns an error. Retries and timeouts belong to `fetcher`; the slot
/// lock is not held while it runs.
pub async fn fetch_with_fallback<T, E, F, Fut>(slot: &Slot<T>, fetcher: F) -> FetchResult<T>
where
  T: Cacheable,
  E: Into<RemoteError>,
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<T, E>>,
{
  match fetcher().await {
    Ok(value) => FetchResult::Fresh(slot.write(value)),
    Err(e) => {
      let e: RemoteError = e.into();
      if e.is_transient() {
        warn!(slot = %slot.name(), error = %e, "remote fetch failed");
      } else {
        error!(slot = %slot.name(), error = %e, "remote fetch failed, check configuration");
      }

      match slot.read_entry() {
        Some(cached) => {
          let age = Utc::now() - cached.cached_at;
          info!(
            slot = %slot.name(),
            age_secs = age.num_seconds(),
            "serving cached value"
          );
          FetchResult::Stale(cached.value)
        }
        None => {
          warn!(slot = %slot.name(), "no cached value to fall back on");
          FetchResult::Unavailable
        }
      }
    }
  }
}
