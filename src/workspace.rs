//! The store handle handed to UI collaborators.
//!
//! `Workspace` owns a [`NoteStore`] and a [`StateStorage`] slot. Every
//! mutation is forwarded to the store; when the store reports a durable
//! change the durable subset is written back to the slot.
use log::{debug, error, info};

use crate::{
    load_state, save_state, Change, Folder, Note, NoteDraft, NoteStore, NoteUpdate, Result,
    StateStorage,
};

pub struct Workspace<S: StateStorage> {
    store: NoteStore,
    storage: S,
    last_persist_error: Option<String>,
}

impl<S: StateStorage> Workspace<S> {
    /// Loads the persisted state from `storage`, or starts empty if the slot
    /// was never written. An unreadable record is an error and is left
    /// untouched.
    pub fn open(storage: S) -> Result<Self> {
        let state = load_state(&storage)?;
        let store = NoteStore::from_persisted(state);
        info!(
            "Workspace opened with {} notes and {} folders",
            store.notes().len(),
            store.folders().len()
        );

        Ok(Self {
            store,
            storage,
            last_persist_error: None,
        })
    }

    /// Read access to the current state
    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Message of the most recent failed write, cleared by the next success
    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    /// Writes the durable state now and reports the outcome
    pub fn flush(&mut self) -> Result<()> {
        let result = save_state(&self.storage, &self.store.persisted_view());
        match &result {
            Ok(()) => self.last_persist_error = None,
            Err(e) => self.last_persist_error = Some(e.to_string()),
        }
        result
    }

    /// Persists after a durable change. Write failures are logged and kept;
    /// the in-memory state stays as mutated.
    fn observe(&mut self, change: Change) -> Change {
        if change.is_durable() {
            if let Err(e) = self.flush() {
                error!("Failed to persist state, previous record kept: {}", e);
            } else {
                debug!("State persisted");
            }
        }
        change
    }

    pub fn add_note(&mut self, draft: NoteDraft) -> Note {
        let note = self.store.add_note(draft).clone();
        self.observe(Change::Durable);
        note
    }

    pub fn update_note(&mut self, id: &str, update: NoteUpdate) -> Change {
        let change = self.store.update_note(id, update);
        self.observe(change)
    }

    pub fn delete_note(&mut self, id: &str) -> Change {
        let change = self.store.delete_note(id);
        self.observe(change)
    }

    pub fn set_active_note(&mut self, id: Option<String>) -> Change {
        let change = self.store.set_active_note(id);
        self.observe(change)
    }

    pub fn toggle_dark_mode(&mut self) -> Change {
        let change = self.store.toggle_dark_mode();
        self.observe(change)
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) -> Change {
        let change = self.store.set_search_query(query);
        self.observe(change)
    }

    pub fn set_selected_tag(&mut self, tag: Option<String>) -> Change {
        let change = self.store.set_selected_tag(tag);
        self.observe(change)
    }

    pub fn add_folder(&mut self, name: impl Into<String>, parent_id: Option<String>) -> Folder {
        let folder = self.store.add_folder(name, parent_id).clone();
        self.observe(Change::Durable);
        folder
    }

    pub fn delete_folder(&mut self, id: &str) -> Change {
        let change = self.store.delete_folder(id);
        self.observe(change)
    }

    pub fn update_folder(&mut self, id: &str, name: impl Into<String>) -> Change {
        let change = self.store.update_folder(id, name);
        self.observe(change)
    }

    pub fn set_has_visited_before(&mut self, value: bool) -> Change {
        let change = self.store.set_has_visited_before(value);
        self.observe(change)
    }

    pub fn reset_has_visited_before(&mut self) -> Change {
        let change = self.store.reset_has_visited_before();
        self.observe(change)
    }

    pub fn toggle_pin(&mut self, id: &str) -> Change {
        let change = self.store.toggle_pin(id);
        self.observe(change)
    }

    pub fn add_tag(&mut self, id: &str, tag: &str) -> Change {
        let change = self.store.add_tag(id, tag);
        self.observe(change)
    }

    pub fn remove_tag(&mut self, id: &str, tag: &str) -> Change {
        let change = self.store.remove_tag(id, tag);
        self.observe(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        FileStorage, MemoryStorage, NoteType, NotesError, PersistedState, SortMode, STORAGE_KEY,
    };
    use serde_json::Value;
    use std::cell::Cell;
    use tempfile::tempdir;

    /// Slot whose writes fail while `failing` is set
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        failing: Cell<bool>,
    }

    impl FlakyStorage {
        fn failing() -> Self {
            Self {
                failing: Cell::new(true),
                ..Default::default()
            }
        }
    }

    impl StateStorage for FlakyStorage {
        fn read(&self, key: &str) -> Result<Option<String>> {
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<()> {
            if self.failing.get() {
                return Err(NotesError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "quota exceeded",
                )));
            }
            self.inner.write(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    fn stored_record(storage: &MemoryStorage) -> Value {
        let raw = storage.read(STORAGE_KEY).unwrap().expect("record written");
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn test_empty_slot_defaults() {
        let ws = Workspace::open(MemoryStorage::new()).unwrap();
        assert!(ws.store().notes().is_empty());
        assert!(ws.store().folders().is_empty());
        assert!(!ws.store().dark_mode());
        assert!(!ws.store().has_visited_before());
    }

    #[test]
    fn test_durable_mutations_are_written() {
        let storage = MemoryStorage::new();
        let mut ws = Workspace::open(storage.clone()).unwrap();

        let note = ws.add_note(NoteDraft::new("First", NoteType::Markdown));
        let record = stored_record(&storage);
        assert_eq!(record["state"]["notes"][0]["id"], note.id.as_str());

        ws.toggle_dark_mode();
        assert_eq!(stored_record(&storage)["state"]["darkMode"], true);
    }

    #[test]
    fn test_session_state_is_never_written() {
        let storage = MemoryStorage::new();
        let mut ws = Workspace::open(storage.clone()).unwrap();
        let note = ws.add_note(NoteDraft::new("a", NoteType::Text));

        ws.set_active_note(Some(note.id.clone()));
        ws.set_search_query("secret query");
        ws.set_selected_tag(Some("tag".into()));
        ws.toggle_pin(&note.id);

        let raw = storage.read(STORAGE_KEY).unwrap().unwrap();
        assert!(!raw.contains("secret query"));
        assert!(!raw.contains("activeNote"));
        assert!(!raw.contains("selectedTag"));
    }

    #[test]
    fn test_transient_changes_do_not_write() {
        let storage = MemoryStorage::new();
        let mut ws = Workspace::open(storage.clone()).unwrap();
        ws.set_search_query("x");
        ws.set_selected_tag(Some("y".into()));
        ws.set_active_note(None);
        assert_eq!(storage.read(STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_reload_restores_state() {
        let dir = tempdir().unwrap();
        let (note, folder) = {
            let mut ws = Workspace::open(FileStorage::new(dir.path())).unwrap();
            let folder = ws.add_folder("Work", None);
            let mut note = ws.add_note(
                NoteDraft::new("Invoice", NoteType::Code)
                    .with_tags(vec!["work".into()])
                    .in_folder(Some(folder.id.clone())),
            );
            ws.update_note(&note.id, NoteUpdate::content("fn main() {}"));
            note = ws.store().note(&note.id).unwrap().clone();
            ws.set_has_visited_before(true);
            ws.set_active_note(Some(note.id.clone()));
            (note, folder)
        };

        let ws = Workspace::open(FileStorage::new(dir.path())).unwrap();
        assert_eq!(ws.store().notes(), &[note]);
        assert_eq!(ws.store().folders(), &[folder]);
        assert!(ws.store().has_visited_before());
        assert_eq!(ws.store().active_note_id(), None);
        assert_eq!(ws.store().visible_notes(SortMode::Recent).len(), 1);
    }

    #[test]
    fn test_failed_write_keeps_memory_state_and_reports() {
        let mut ws = Workspace::open(FlakyStorage::failing()).unwrap();
        let note = ws.add_note(NoteDraft::new("kept", NoteType::Text));

        assert!(ws.store().note(&note.id).is_some());
        assert!(ws.last_persist_error().unwrap().contains("quota exceeded"));
        assert!(ws.flush().is_err());
    }

    #[test]
    fn test_failed_write_keeps_previous_record() {
        let slots = MemoryStorage::new();
        let mut ws = Workspace::open(FlakyStorage {
            inner: slots.clone(),
            ..Default::default()
        })
        .unwrap();
        let first = ws.add_note(NoteDraft::new("first", NoteType::Text));
        let before = slots.read(STORAGE_KEY).unwrap().unwrap();

        ws.storage().failing.set(true);
        ws.add_note(NoteDraft::new("second", NoteType::Text));
        ws.toggle_dark_mode();
        assert_eq!(ws.store().notes().len(), 2);
        assert!(ws.last_persist_error().is_some());
        assert_eq!(slots.read(STORAGE_KEY).unwrap().unwrap(), before);

        let reloaded = Workspace::open(slots.clone()).unwrap();
        assert_eq!(reloaded.store().notes(), &[first]);
        assert!(!reloaded.store().dark_mode());

        ws.storage().failing.set(false);
        ws.flush().unwrap();
        assert_eq!(ws.last_persist_error(), None);
        assert_eq!(Workspace::open(slots).unwrap().store().notes().len(), 2);
    }

    #[test]
    fn test_unreadable_record_is_an_error_and_untouched() {
        let storage = MemoryStorage::new();
        storage.write(STORAGE_KEY, "{broken").unwrap();

        assert!(matches!(
            Workspace::open(storage.clone()),
            Err(NotesError::InvalidFormat { .. })
        ));
        assert_eq!(storage.read(STORAGE_KEY).unwrap().as_deref(), Some("{broken"));
    }

    #[test]
    fn test_delete_folder_persists_unfiled_notes() {
        let storage = MemoryStorage::new();
        let mut ws = Workspace::open(storage.clone()).unwrap();
        let folder = ws.add_folder("Tmp", None);
        ws.add_note(NoteDraft::new("a", NoteType::Text).in_folder(Some(folder.id.clone())));
        ws.delete_folder(&folder.id);

        let reloaded = Workspace::open(storage).unwrap();
        assert!(reloaded.store().folders().is_empty());
        assert_eq!(reloaded.store().notes()[0].folder_id, None);
        assert_eq!(
            crate::load_state(reloaded.storage()).unwrap(),
            PersistedState {
                notes: reloaded.store().notes().to_vec(),
                ..Default::default()
            }
        );
    }
}
