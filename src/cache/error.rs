//! Error types for slot storage and remote operations.

use std::path::PathBuf;

/// Why a remote operation could not produce a value.
///
/// The fetcher never surfaces these to its caller; they only decide the log
/// severity before falling back to the cache.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
  /// The client could not be constructed (missing key, bad base URL, ...)
  #[error("client unavailable: {0}")]
  ClientUnavailable(String),
  /// Connection, DNS or timeout failure
  #[error("request failed: {0}")]
  Transport(String),
  /// The service rejected our credentials
  #[error("authentication rejected: {0}")]
  Unauthorized(String),
  /// Non-success HTTP status other than an auth failure
  #[error("upstream returned status {status}: {message}")]
  Upstream { status: u16, message: String },
  /// The response did not match the expected schema
  #[error("malformed response: {0}")]
  Malformed(String),
}

impl RemoteError {
  /// Whether a later attempt may succeed without anyone changing the setup.
  ///
  /// Client construction and credential failures are misconfiguration; they are
  /// still served from cache, but logged louder.
  pub fn is_transient(&self) -> bool {
    match self {
      Self::ClientUnavailable(_) | Self::Unauthorized(_) => false,
      Self::Transport(_) | Self::Upstream { .. } | Self::Malformed(_) => true,
    }
  }
}

/// Failure inside the slot store.
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
  #[error("invalid slot name '{0}'")]
  InvalidName(String),

  #[error("I/O error on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Stored bytes exist but are not a valid record for the requested type.
  #[error("corrupt slot record {}: {reason}", path.display())]
  Corrupt { path: PathBuf, reason: String },

  #[error("failed to serialize slot value: {0}")]
  Serialize(#[from] serde_json::Error),
}
