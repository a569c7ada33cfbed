//! Durable key-value slots and the persisted record layout.
//!
//! The whole durable state lives in one record under [`STORAGE_KEY`]. Only
//! notes, folders, dark mode and the first-run flag are written; selection and
//! filter state never leave memory.
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::{Folder, Note, NotesError, Result};

/// Name of the slot holding the persisted state
pub const STORAGE_KEY: &str = "notes-storage";

/// Version stamped into the record envelope
pub const STATE_VERSION: u32 = 0;

/// A named, durable string slot store
pub trait StateStorage {
    /// Returns the slot contents, or `None` if nothing was ever written
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replaces the slot contents. A failed write must leave the previous
    /// contents readable.
    fn write(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// The durable subset of store state, as loaded
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    pub notes: Vec<Note>,
    pub folders: Vec<Folder>,
    pub dark_mode: bool,
    pub has_visited_before: bool,
}

/// Borrowed view of the durable subset, as written
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedView<'a> {
    pub notes: &'a [Note],
    pub folders: &'a [Folder],
    pub dark_mode: bool,
    pub has_visited_before: bool,
}

#[derive(Serialize)]
struct Envelope<T> {
    state: T,
    version: u32,
}

/// Serializes the durable state into its record form
pub fn encode_state(view: &PersistedView<'_>) -> Result<String> {
    let record = Envelope {
        state: view,
        version: STATE_VERSION,
    };
    serde_json::to_string(&record).map_err(|e| {
        error!("Failed to serialize state: {}", e);
        NotesError::Serialization(e)
    })
}

/// Parses a record. Accepts both the enveloped form and a bare state object.
/// `createdAt`/`updatedAt` strings are revived into UTC timestamps by the
/// record types; every other field passes through as stored.
pub fn decode_state(raw: &str) -> Result<PersistedState> {
    let value: Value = serde_json::from_str(raw).map_err(|e| NotesError::InvalidFormat {
        message: format!("persisted state is not valid JSON: {}", e),
    })?;

    let state = match value {
        Value::Object(mut map) if map.contains_key("state") => {
            if let Some(version) = map.get("version").and_then(Value::as_u64) {
                if version != u64::from(STATE_VERSION) {
                    warn!(
                        "Persisted state version {} differs from {}, loading anyway",
                        version, STATE_VERSION
                    );
                }
            }
            map.remove("state").unwrap_or(Value::Null)
        }
        other => other,
    };

    serde_json::from_value(state).map_err(|e| NotesError::InvalidFormat {
        message: format!("persisted state has an unexpected shape: {}", e),
    })
}

/// Loads the durable state from `storage`, or the empty default when the slot
/// has never been written
pub fn load_state<S: StateStorage + ?Sized>(storage: &S) -> Result<PersistedState> {
    match storage.read(STORAGE_KEY)? {
        Some(raw) => {
            let state = decode_state(&raw).map_err(|e| {
                error!("Failed to load persisted state: {}", e);
                e
            })?;
            info!(
                "Loaded {} notes and {} folders",
                state.notes.len(),
                state.folders.len()
            );
            Ok(state)
        }
        None => {
            debug!("No persisted state under '{}', starting empty", STORAGE_KEY);
            Ok(PersistedState::default())
        }
    }
}

pub fn save_state<S: StateStorage + ?Sized>(storage: &S, view: &PersistedView<'_>) -> Result<()> {
    let record = encode_state(view)?;
    trace!("Writing {} bytes to '{}'", record.len(), STORAGE_KEY);
    storage.write(STORAGE_KEY, &record)
}

/// Stores each slot as `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            debug!("Creating data directory: {}", self.dir.display());
            fs::create_dir_all(&self.dir).map_err(|e| {
                error!("Failed to create directory {}: {}", self.dir.display(), e);
                NotesError::DirectoryError {
                    path: self.dir.clone(),
                }
            })?;
        }
        Ok(())
    }
}

impl StateStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.slot_path(key);
        if !path.exists() {
            return Ok(None);
        }

        debug!("Reading slot from file: {}", path.display());
        let content = fs::read_to_string(&path).map_err(|e| {
            error!("Failed to open slot file {}: {}", path.display(), e);
            NotesError::Io(e)
        })?;
        Ok(Some(content))
    }

    /// Writes through a temp file in the same directory and renames it over
    /// the target, so readers see either the old or the new record
    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_dir()?;
        let path = self.slot_path(key);

        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            NotesError::Io(e)
        })?;

        temp_file.write_all(value.as_bytes()).map_err(|e| {
            error!("Failed to write to temporary file: {}", e);
            NotesError::Io(e)
        })?;

        temp_file.as_file().sync_all().map_err(|e| {
            error!("Failed to flush temporary file: {}", e);
            NotesError::Io(e)
        })?;

        temp_file.persist(&path).map_err(|e| {
            error!("Failed to persist file {}: {}", path.display(), e.error);
            NotesError::Io(e.error)
        })?;

        debug!("Slot '{}' saved to {}", key, path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.slot_path(key);
        if path.exists() {
            fs::remove_file(&path)?;
            debug!("Removed slot file {}", path.display());
        }
        Ok(())
    }
}

/// In-process slots. Clones share the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.slots
            .lock()
            .map_err(|_| NotesError::LockAcquisitionFailed {
                message: "Failed to acquire lock on memory slots".to_string(),
            })
    }
}

impl StateStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
