//! Key-value persistence collaborator.
//!
//! The worksheet originally lived against a browser localStorage; the
//! backend keeps the same contract: opaque string cells addressed by key,
//! enumerable by prefix. Payloads are small (a few KB of free-text answers
//! per student), so the file store rewrites the whole cell map on set.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

/// Contract expected by the report store. Keys in use:
/// `student-{id}-{name}` for submissions, `evaluation-{id}-{name}` for the
/// last computed evaluation.
pub trait KeyValueStore: Send + Sync {
  fn get(&self, key: &str) -> Option<String>;
  fn set(&self, key: &str, value: &str) -> Result<(), String>;
  fn remove(&self, key: &str) -> Result<(), String>;
  fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
}

/// Single-JSON-file store: one object mapping keys to string cells.
/// Loaded once at open; every mutation rewrites the file.
pub struct FileStore {
  path: PathBuf,
  cells: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
  /// Open (or create) the store at `path`. An unreadable or malformed
  /// file degrades to an empty store with a warning, never an error.
  pub fn open(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let cells = match std::fs::read_to_string(&path) {
      Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
        Ok(map) => {
          info!(target: "tamgu_backend", path = %path.display(), cells = map.len(), "Loaded persistence file");
          map
        }
        Err(e) => {
          warn!(target: "tamgu_backend", path = %path.display(), error = %e, "Malformed persistence file; starting empty");
          BTreeMap::new()
        }
      },
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
      Err(e) => {
        warn!(target: "tamgu_backend", path = %path.display(), error = %e, "Cannot read persistence file; starting empty");
        BTreeMap::new()
      }
    };
    Self { path, cells: Mutex::new(cells) }
  }

  /// Path from DATA_PATH env or the default next to the binary.
  pub fn from_env() -> Self {
    let path = std::env::var("DATA_PATH").unwrap_or_else(|_| "./data/worksheet.json".into());
    Self::open(path)
  }

  fn flush(&self, cells: &BTreeMap<String, String>) -> Result<(), String> {
    if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
      std::fs::create_dir_all(dir).map_err(|e| format!("create {}: {}", dir.display(), e))?;
    }
    let body = serde_json::to_string_pretty(cells).map_err(|e| e.to_string())?;
    std::fs::write(&self.path, body).map_err(|e| format!("write {}: {}", self.path.display(), e))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl KeyValueStore for FileStore {
  fn get(&self, key: &str) -> Option<String> {
    self.cells.lock().expect("persist lock").get(key).cloned()
  }

  fn set(&self, key: &str, value: &str) -> Result<(), String> {
    let mut cells = self.cells.lock().expect("persist lock");
    cells.insert(key.to_string(), value.to_string());
    self.flush(&cells)
  }

  fn remove(&self, key: &str) -> Result<(), String> {
    let mut cells = self.cells.lock().expect("persist lock");
    if cells.remove(key).is_some() {
      self.flush(&cells)?;
    }
    Ok(())
  }

  fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
    self
      .cells
      .lock()
      .expect("persist lock")
      .keys()
      .filter(|k| k.starts_with(prefix))
      .cloned()
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::{SystemTime, UNIX_EPOCH};

  fn temp_store(prefix: &str) -> FileStore {
    let nanos = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .expect("clock")
      .as_nanos();
    FileStore::open(std::env::temp_dir().join(format!("{}-{}.json", prefix, nanos)))
  }

  #[test]
  fn set_get_remove_roundtrip() {
    let store = temp_store("tamgu-kv");
    assert!(store.get("student-101-김철수").is_none());
    store.set("student-101-김철수", "{\"a\":1}").expect("set");
    assert_eq!(store.get("student-101-김철수").as_deref(), Some("{\"a\":1}"));
    store.remove("student-101-김철수").expect("remove");
    assert!(store.get("student-101-김철수").is_none());
  }

  #[test]
  fn cells_survive_a_reopen() {
    let store = temp_store("tamgu-reopen");
    store.set("student-1-가", "x").expect("set");
    store.set("evaluation-1-가", "y").expect("set");
    let path = store.path().to_path_buf();
    drop(store);

    let reopened = FileStore::open(path);
    assert_eq!(reopened.get("student-1-가").as_deref(), Some("x"));
    assert_eq!(reopened.get("evaluation-1-가").as_deref(), Some("y"));
  }

  #[test]
  fn prefix_enumeration_only_matches_the_prefix() {
    let store = temp_store("tamgu-prefix");
    store.set("student-1-가", "x").expect("set");
    store.set("student-2-나", "y").expect("set");
    store.set("evaluation-1-가", "z").expect("set");
    let mut keys = store.keys_with_prefix("student-");
    keys.sort();
    assert_eq!(keys, vec!["student-1-가", "student-2-나"]);
  }

  #[test]
  fn malformed_file_degrades_to_empty() {
    let nanos = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .expect("clock")
      .as_nanos();
    let path = std::env::temp_dir().join(format!("tamgu-bad-{}.json", nanos));
    std::fs::write(&path, "not json at all").expect("write");
    let store = FileStore::open(path);
    assert!(store.keys_with_prefix("").is_empty());
  }
}
