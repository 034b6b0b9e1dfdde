//! File-backed slot storage.
//!
//! Each slot is a single JSON record at `<root>/cache/<name>`. Writes go to a
//! uniquely named `.<name>.*.tmp` file in the same directory and are renamed
//! into place, so a reader sees either the previous record or the new one,
//! even with several processes writing the same slot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

use super::error::SlotError;
use super::traits::Cacheable;

/// Subdirectory of the storage root that holds slot files.
const CACHE_DIR: &str = "cache";

const TEMP_SUFFIX: &str = ".tmp";

/// Where a [`SlotStore`] keeps its files.
#[derive(Debug, Clone)]
pub struct StoreConfig {
  pub root: PathBuf,
}

impl StoreConfig {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }
}

/// On-disk form of a slot.
#[derive(Debug, Serialize, Deserialize)]
struct SlotRecord {
  kind: String,
  version: u32,
  cached_at: DateTime<Utc>,
  /// Hex SHA-256 of the compact JSON encoding of `value`
  checksum: String,
  value: serde_json::Value,
}

/// A value read back from a slot.
#[derive(Debug, Clone)]
pub struct CachedValue<T> {
  pub value: T,
  /// When the value was written
  pub cached_at: DateTime<Utc>,
}

/// Opens slots under one storage root.
///
/// Handles for the same slot name obtained from the same store share a lock,
/// so concurrent readers never interleave with a write in progress.
#[derive(Clone)]
pub struct SlotStore {
  dir: PathBuf,
  locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SlotStore {
  /// Open the store, creating `<root>/cache` if needed.
  pub fn open(config: StoreConfig) -> Result<Self, SlotError> {
    let dir = config.root.join(CACHE_DIR);
    fs::create_dir_all(&dir).map_err(|source| SlotError::Io {
      path: dir.clone(),
      source,
    })?;

    debug!(dir = %dir.display(), "opened slot store");

    Ok(Self {
      dir,
      locks: Arc::new(Mutex::new(HashMap::new())),
    })
  }

  /// Directory holding the slot files.
  pub fn dir(&self) -> &Path {
    &self.dir
  }

  /// Get a handle to the slot `name`. Does not touch the filesystem.
  pub fn slot<T: Cacheable>(&self, name: &str) -> Result<Slot<T>, SlotError> {
    validate_name(name)?;

    let lock = {
      let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
      Arc::clone(locks.entry(name.to_string()).or_default())
    };

    Ok(Slot {
      name: name.to_string(),
      dir: self.dir.clone(),
      path: self.dir.join(name),
      lock,
      _marker: PhantomData,
    })
  }
}

/// Slot names become file names directly, so anything that could leave the
/// cache directory or collide with a temp file is refused. Temp files always
/// start with a dot.
fn validate_name(name: &str) -> Result<(), SlotError> {
  let invalid = name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\0']);

  if invalid {
    return Err(SlotError::InvalidName(name.to_string()));
  }
  Ok(())
}

/// Handle to one named slot holding values of type `T`.
pub struct Slot<T> {
  name: String,
  dir: PathBuf,
  path: PathBuf,
  lock: Arc<Mutex<()>>,
  _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Slot<T> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      dir: self.dir.clone(),
      path: self.path.clone(),
      lock: Arc::clone(&self.lock),
      _marker: PhantomData,
    }
  }
}

impl<T: Cacheable> Slot<T> {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// The stored value, or `None` if the slot is empty or its record is corrupt.
  pub fn read(&self) -> Option<T> {
    self.read_entry().map(|cached| cached.value)
  }

  /// Like [`Slot::read`], but also returns when the value was written.
  pub fn read_entry(&self) -> Option<CachedValue<T>> {
    let _guard = self.guard();

    match self.load() {
      Ok(Some(cached)) => Some(cached),
      Ok(None) => {
        debug!(slot = %self.name, "slot is empty");
        None
      }
      Err(e @ SlotError::Corrupt { .. }) => {
        info!(slot = %self.name, error = %e, "ignoring corrupt slot record");
        None
      }
      Err(e) => {
        warn!(slot = %self.name, error = %e, "failed to read slot");
        None
      }
    }
  }

  /// True iff the slot holds a readable, non-corrupt value.
  pub fn exists(&self) -> bool {
    self.read_entry().is_some()
  }

  /// When the stored value was written, if there is a readable one.
  pub fn cached_at(&self) -> Option<DateTime<Utc>> {
    self.read_entry().map(|cached| cached.cached_at)
  }

  /// Persist `value` and hand it back.
  ///
  /// A failed write is logged and the previous record is left in place; the
  /// caller still gets its value.
  pub fn write(&self, value: T) -> T {
    if let Err(e) = self.try_write(&value) {
      error!(slot = %self.name, error = %e, "failed to persist slot");
    }
    value
  }

  /// Persist `value`, reporting failure to the caller.
  pub fn try_write(&self, value: &T) -> Result<(), SlotError> {
    let _guard = self.guard();
    self.persist(value)
  }

  fn guard(&self) -> MutexGuard<'_, ()> {
    self.lock.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn persist(&self, value: &T) -> Result<(), SlotError> {
    let value = serde_json::to_value(value)?;
    let record = SlotRecord {
      kind: T::entity_type().to_string(),
      version: T::schema_version(),
      cached_at: Utc::now(),
      checksum: checksum(&value)?,
      value,
    };
    let bytes = serde_json::to_vec_pretty(&record)?;

    // Dropping the temp file on any error path deletes it
    let mut temp = tempfile::Builder::new()
      .prefix(&format!(".{}.", self.name))
      .suffix(TEMP_SUFFIX)
      .tempfile_in(&self.dir)
      .map_err(|source| SlotError::Io {
        path: self.dir.clone(),
        source,
      })?;

    let written = temp.write_all(&bytes).and_then(|()| temp.as_file().sync_all());
    if let Err(source) = written {
      return Err(SlotError::Io {
        path: temp.path().to_path_buf(),
        source,
      });
    }

    temp.persist(&self.path).map_err(|e| SlotError::Io {
      path: self.path.clone(),
      source: e.error,
    })?;

    // The new record is already visible at this point
    if let Err(e) = sync_dir(&self.dir) {
      warn!(slot = %self.name, error = %e, "failed to sync cache directory");
    }

    debug!(slot = %self.name, bytes = bytes.len(), "persisted slot");
    Ok(())
  }

  fn load(&self) -> Result<Option<CachedValue<T>>, SlotError> {
    let bytes = match fs::read(&self.path) {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
      Err(source) => {
        return Err(SlotError::Io {
          path: self.path.clone(),
          source,
        })
      }
    };

    let record: SlotRecord = serde_json::from_slice(&bytes)
      .map_err(|e| self.corrupt(format!("unparseable record: {}", e)))?;

    if record.kind != T::entity_type() {
      return Err(self.corrupt(format!(
        "holds '{}' but '{}' was requested",
        record.kind,
        T::entity_type()
      )));
    }

    if record.version != T::schema_version() {
      return Err(self.corrupt(format!(
        "schema version {} does not match {}",
        record.version,
        T::schema_version()
      )));
    }

    if checksum(&record.value)? != record.checksum {
      return Err(self.corrupt("checksum mismatch".to_string()));
    }

    let value = serde_json::from_value(record.value)
      .map_err(|e| self.corrupt(format!("value does not match schema: {}", e)))?;

    Ok(Some(CachedValue {
      value,
      cached_at: record.cached_at,
    }))
  }

  fn corrupt(&self, reason: String) -> SlotError {
    SlotError::Corrupt {
      path: self.path.clone(),
      reason,
    }
  }
}

fn checksum(value: &serde_json::Value) -> Result<String, serde_json::Error> {
  let bytes = serde_json::to_vec(value)?;
  Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Flush the directory entry created by a rename.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
  fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;
  use tempfile::TempDir;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Reading {
    celsius: f64,
    station: String,
  }

  impl Cacheable for Reading {
    fn entity_type() -> &'static str {
      "reading"
    }
  }

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Counter(u32);

  impl Cacheable for Counter {
    fn entity_type() -> &'static str {
      "counter"
    }
  }

  fn reading(celsius: f64) -> Reading {
    Reading {
      celsius,
      station: "paris-montsouris".to_string(),
    }
  }

  /// Serializes only while empty: JSON object keys must be strings.
  #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
  struct Labels(BTreeMap<Vec<u8>, u32>);

  impl Cacheable for Labels {
    fn entity_type() -> &'static str {
      "labels"
    }
  }

  fn open_store() -> (TempDir, SlotStore) {
    let tmp = TempDir::new().unwrap();
    let store = SlotStore::open(StoreConfig::new(tmp.path())).unwrap();
    (tmp, store)
  }

  fn dir_entries(store: &SlotStore) -> Vec<String> {
    let mut entries: Vec<_> = fs::read_dir(store.dir())
      .unwrap()
      .map(|e| e.unwrap().file_name().into_string().unwrap())
      .collect();
    entries.sort();
    entries
  }

  #[test]
  fn test_open_creates_cache_dir() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("nested").join("root");

    let store = SlotStore::open(StoreConfig::new(&root)).unwrap();

    assert!(root.join("cache").is_dir());
    assert_eq!(store.dir(), root.join("cache"));
  }

  #[test]
  fn test_slot_construction_does_not_touch_filesystem() {
    let (_tmp, store) = open_store();

    let slot = store.slot::<Reading>("outdoor").unwrap();

    assert!(!slot.path().exists());
    assert_eq!(slot.path(), store.dir().join("outdoor"));
  }

  #[test]
  fn test_read_missing_slot_is_absent() {
    let (_tmp, store) = open_store();
    let slot = store.slot::<Reading>("outdoor").unwrap();

    assert_eq!(slot.read(), None);
    assert!(!slot.exists());
    assert!(slot.cached_at().is_none());
  }

  #[test]
  fn test_write_returns_value_and_reads_back() {
    let (_tmp, store) = open_store();
    let slot = store.slot::<Reading>("outdoor").unwrap();

    let returned = slot.write(reading(21.5));

    assert_eq!(returned, reading(21.5));
    assert_eq!(slot.read(), Some(reading(21.5)));
    assert!(slot.exists());
    assert!(slot.cached_at().is_some());
  }

  #[test]
  fn test_overwrite_keeps_only_latest_and_no_temp_file() {
    let (_tmp, store) = open_store();
    let slot = store.slot::<Reading>("outdoor").unwrap();

    slot.write(reading(10.0));
    slot.write(reading(12.5));

    assert_eq!(slot.read(), Some(reading(12.5)));
    assert_eq!(dir_entries(&store), vec!["outdoor".to_string()]);
  }

  #[test]
  fn test_full_precision_floats_read_back_exactly() {
    let (_tmp, store) = open_store();
    let slot = store.slot::<Reading>("outdoor").unwrap();

    for celsius in [
      0.1 + 0.2,
      12.882254552920351,
      1.3643119163960193,
      -31.552637190318862,
      3.6432601004960716,
    ] {
      slot.write(reading(celsius));

      let back = slot.read().expect("record should not read as corrupt");
      assert_eq!(back.celsius.to_bits(), celsius.to_bits());
    }
  }

  #[test]
  fn test_handles_share_storage() {
    let (_tmp, store) = open_store();
    let writer = store.slot::<Reading>("outdoor").unwrap();
    let reader = store.slot::<Reading>("outdoor").unwrap();

    writer.write(reading(3.0));

    assert_eq!(reader.read(), Some(reading(3.0)));
  }

  #[test]
  fn test_garbage_bytes_read_as_absent() {
    let (_tmp, store) = open_store();
    let slot = store.slot::<Reading>("outdoor").unwrap();
    fs::write(slot.path(), b"\x80\x04\x95 not json").unwrap();

    assert!(!slot.exists());
    assert_eq!(slot.read(), None);
  }

  #[test]
  fn test_truncated_record_reads_as_absent() {
    let (_tmp, store) = open_store();
    let slot = store.slot::<Reading>("outdoor").unwrap();
    slot.write(reading(8.0));

    let bytes = fs::read(slot.path()).unwrap();
    fs::write(slot.path(), &bytes[..bytes.len() / 2]).unwrap();

    assert_eq!(slot.read(), None);
  }

  #[test]
  fn test_kind_mismatch_is_corrupt() {
    let (_tmp, store) = open_store();
    store.slot::<Counter>("shared").unwrap().write(Counter(7));

    let slot = store.slot::<Reading>("shared").unwrap();

    assert!(!slot.exists());
    assert_eq!(slot.read(), None);
  }

  #[test]
  fn test_checksum_mismatch_is_corrupt() {
    let (_tmp, store) = open_store();
    let slot = store.slot::<Reading>("outdoor").unwrap();
    slot.write(reading(8.0));

    let mut record: serde_json::Value =
      serde_json::from_slice(&fs::read(slot.path()).unwrap()).unwrap();
    record["value"]["celsius"] = serde_json::json!(99.0);
    fs::write(slot.path(), serde_json::to_vec(&record).unwrap()).unwrap();

    assert_eq!(slot.read(), None);
  }

  #[test]
  fn test_version_mismatch_is_corrupt() {
    let (_tmp, store) = open_store();
    let slot = store.slot::<Reading>("outdoor").unwrap();
    slot.write(reading(8.0));

    let mut record: serde_json::Value =
      serde_json::from_slice(&fs::read(slot.path()).unwrap()).unwrap();
    record["version"] = serde_json::json!(Reading::schema_version() + 1);
    fs::write(slot.path(), serde_json::to_vec(&record).unwrap()).unwrap();

    assert_eq!(slot.read(), None);
  }

  #[test]
  fn test_failed_write_returns_value_and_keeps_previous() {
    let (_tmp, store) = open_store();
    let slot = store.slot::<Labels>("labels").unwrap();
    slot.write(Labels::default());

    let unserializable = Labels(BTreeMap::from([(vec![1, 2], 3)]));

    assert!(matches!(
      slot.try_write(&unserializable),
      Err(SlotError::Serialize(_))
    ));
    assert_eq!(slot.write(unserializable.clone()), unserializable);
    assert_eq!(slot.read(), Some(Labels::default()));
    assert_eq!(dir_entries(&store), vec!["labels".to_string()]);
  }

  #[test]
  fn test_failed_rename_returns_value_and_removes_temp_file() {
    let (_tmp, store) = open_store();
    let slot = store.slot::<Reading>("outdoor").unwrap();

    // A non-empty directory at the slot path cannot be replaced by a rename
    fs::create_dir(slot.path()).unwrap();
    fs::write(slot.path().join("keep"), b"x").unwrap();

    assert!(matches!(
      slot.try_write(&reading(2.0)),
      Err(SlotError::Io { .. })
    ));
    assert_eq!(slot.write(reading(2.0)), reading(2.0));
    assert_eq!(dir_entries(&store), vec!["outdoor".to_string()]);
  }

  #[test]
  fn test_unreadable_slot_path_reads_as_absent() {
    let (_tmp, store) = open_store();
    let slot = store.slot::<Reading>("outdoor").unwrap();
    fs::create_dir(slot.path()).unwrap();

    assert_eq!(slot.read(), None);
    assert!(!slot.exists());
    assert!(slot.cached_at().is_none());
  }

  #[test]
  fn test_write_leaves_other_writers_temp_files_alone() {
    let (_tmp, store) = open_store();
    let slot = store.slot::<Reading>("outdoor").unwrap();

    // Half-written temp files of a concurrent process, old and new naming
    let pending = store.dir().join(".outdoor.a1b2c3.tmp");
    fs::write(&pending, b"{ \"kind\": \"rea").unwrap();
    fs::create_dir(store.dir().join("outdoor.tmp")).unwrap();

    slot.write(reading(6.0));

    assert_eq!(slot.read(), Some(reading(6.0)));
    assert_eq!(fs::read(&pending).unwrap(), b"{ \"kind\": \"rea");
    assert_eq!(
      dir_entries(&store),
      vec![
        ".outdoor.a1b2c3.tmp".to_string(),
        "outdoor".to_string(),
        "outdoor.tmp".to_string(),
      ]
    );
  }

  #[test]
  fn test_invalid_names_rejected() {
    let (_tmp, store) = open_store();

    for name in ["", ".", "..", "../escape", "a/b", "a\\b", ".hidden", ".outdoor.x1.tmp"] {
      assert!(
        matches!(
          store.slot::<Reading>(name),
          Err(SlotError::InvalidName(_))
        ),
        "expected '{}' to be rejected",
        name
      );
    }
  }

  #[test]
  fn test_separate_roots_are_independent() {
    let (_tmp_a, store_a) = open_store();
    let (_tmp_b, store_b) = open_store();

    store_a.slot::<Reading>("outdoor").unwrap().write(reading(5.0));

    assert_eq!(store_b.slot::<Reading>("outdoor").unwrap().read(), None);
  }

  #[test]
  fn test_concurrent_writers_leave_a_complete_record() {
    let (_tmp, store) = open_store();

    let handles: Vec<_> = (0..8u32)
      .map(|i| {
        let slot = store.slot::<Reading>("outdoor").unwrap();
        std::thread::spawn(move || {
          for j in 0..10u32 {
            slot.write(reading(f64::from(i * 10 + j)));
            assert!(slot.read().is_some());
          }
        })
      })
      .collect();

    for handle in handles {
      handle.join().unwrap();
    }

    assert!(store.slot::<Reading>("outdoor").unwrap().exists());
  }
}
