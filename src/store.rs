//! The note/folder state store.
//!
//! `NoteStore` holds every note and folder plus the selection and filter
//! state, and implements the state transitions. It never touches storage:
//! each mutation reports a [`Change`] and the owning
//! [`Workspace`](crate::Workspace) decides whether to persist.
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use log::{debug, trace, warn};

use crate::{
    all_tags, visible_notes, Folder, FolderIndex, Note, NoteDraft, NoteUpdate, PersistedState,
    PersistedView, SortMode,
};

/// What a mutation touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Nothing changed (unknown id, blank or duplicate tag, ...)
    None,
    /// Only session state changed: selection, search query, tag filter
    Transient,
    /// Notes, folders, dark mode or the first-run flag changed
    Durable,
}

impl Change {
    pub fn is_durable(self) -> bool {
        self == Change::Durable
    }
}

/// Detaches folders with a missing parent, then breaks every parent cycle by
/// promoting the first folder of the cycle found in list order
fn repair_folder_parents(folders: &mut [Folder]) {
    let ids: HashSet<String> = folders.iter().map(|f| f.id.clone()).collect();
    for folder in folders.iter_mut() {
        if let Some(parent) = &folder.parent_id {
            if !ids.contains(parent) {
                warn!(
                    "Folder {} points at missing parent {}, moving it to the root",
                    folder.id, parent
                );
                folder.parent_id = None;
            }
        }
    }

    let mut parents: HashMap<String, Option<String>> = folders
        .iter()
        .map(|f| (f.id.clone(), f.parent_id.clone()))
        .collect();

    for folder in folders.iter_mut() {
        let mut seen = HashSet::new();
        let mut cursor = folder.parent_id.clone();
        while let Some(id) = cursor {
            if id == folder.id {
                warn!("Folder {} is its own ancestor, moving it to the root", folder.id);
                folder.parent_id = None;
                parents.insert(folder.id.clone(), None);
                break;
            }
            if !seen.insert(id.clone()) {
                break;
            }
            cursor = parents.get(&id).cloned().flatten();
        }
    }
}

/// Single source of truth for notes, folders and UI state
#[derive(Debug, Clone, Default)]
pub struct NoteStore {
    notes: Vec<Note>,
    folders: Vec<Folder>,
    folder_index: FolderIndex,
    active_note: Option<String>,
    dark_mode: bool,
    search_query: String,
    selected_tag: Option<String>,
    has_visited_before: bool,
}

impl NoteStore {
    /// An empty store with default flags
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from persisted state. Session state starts cleared.
    /// Folders pointing at a parent that no longer exists, or whose parent
    /// chain loops back on itself, are moved to the root level.
    pub fn from_persisted(state: PersistedState) -> Self {
        let PersistedState {
            notes,
            mut folders,
            dark_mode,
            has_visited_before,
        } = state;

        repair_folder_parents(&mut folders);
        let folder_index = FolderIndex::build(&folders);
        Self {
            notes,
            folders,
            folder_index,
            dark_mode,
            has_visited_before,
            ..Default::default()
        }
    }

    /// Borrowed view of the state that gets persisted
    pub fn persisted_view(&self) -> PersistedView<'_> {
        PersistedView {
            notes: &self.notes,
            folders: &self.folders,
            dark_mode: self.dark_mode,
            has_visited_before: self.has_visited_before,
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn folder(&self, id: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == id)
    }

    pub fn folder_index(&self) -> &FolderIndex {
        &self.folder_index
    }

    pub fn active_note_id(&self) -> Option<&str> {
        self.active_note.as_deref()
    }

    /// The selected note, if the selection points at an existing note
    pub fn active_note(&self) -> Option<&Note> {
        self.active_note.as_deref().and_then(|id| self.note(id))
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn selected_tag(&self) -> Option<&str> {
        self.selected_tag.as_deref()
    }

    pub fn has_visited_before(&self) -> bool {
        self.has_visited_before
    }

    /// Notes for the list view under the current tag filter and search query
    pub fn visible_notes(&self, sort: SortMode) -> Vec<&Note> {
        visible_notes(
            &self.notes,
            self.selected_tag.as_deref(),
            &self.search_query,
            sort,
        )
    }

    pub fn all_tags(&self) -> Vec<&str> {
        all_tags(&self.notes)
    }

    pub fn add_note(&mut self, draft: NoteDraft) -> &Note {
        let note = Note::from_draft(draft, Utc::now());
        debug!("Adding note {} ({})", note.id, note.note_type);
        let idx = self.notes.len();
        self.notes.push(note);
        &self.notes[idx]
    }

    /// Merges `update` into the note and refreshes `updated_at`. Unknown ids
    /// are ignored.
    pub fn update_note(&mut self, id: &str, update: NoteUpdate) -> Change {
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            debug!("Ignoring update for unknown note {}", id);
            return Change::None;
        };

        update.apply_to(note);
        note.updated_at = next_timestamp(note.updated_at);
        trace!("Note {} updated at {}", id, note.updated_at);
        Change::Durable
    }

    pub fn delete_note(&mut self, id: &str) -> Change {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        if self.notes.len() == before {
            debug!("Ignoring delete for unknown note {}", id);
            return Change::None;
        }

        if self.active_note.as_deref() == Some(id) {
            self.active_note = None;
        }
        debug!("Deleted note {}", id);
        Change::Durable
    }

    /// Selection only; the id is not checked
    pub fn set_active_note(&mut self, id: Option<String>) -> Change {
        self.active_note = id;
        Change::Transient
    }

    pub fn toggle_dark_mode(&mut self) -> Change {
        self.dark_mode = !self.dark_mode;
        Change::Durable
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) -> Change {
        self.search_query = query.into();
        Change::Transient
    }

    /// Sets the tag filter. Selecting the tag that is already selected
    /// clears the filter.
    pub fn set_selected_tag(&mut self, tag: Option<String>) -> Change {
        self.selected_tag = match tag {
            Some(tag) if self.selected_tag.as_deref() == Some(tag.as_str()) => None,
            other => other,
        };
        Change::Transient
    }

    /// Creates a folder. A `parent_id` that names no existing folder is
    /// dropped and the folder is created at the root.
    pub fn add_folder(&mut self, name: impl Into<String>, parent_id: Option<String>) -> &Folder {
        let parent_id = parent_id.filter(|parent| {
            let known = self.folder(parent).is_some();
            if !known {
                warn!("Parent folder {} not found, creating folder at root", parent);
            }
            known
        });

        let folder = Folder::new(name.into(), parent_id, Utc::now());
        debug!("Adding folder {} '{}'", folder.id, folder.name);
        self.folder_index.insert(&folder);
        let idx = self.folders.len();
        self.folders.push(folder);
        &self.folders[idx]
    }

    /// Removes a folder. Its notes become unfiled and its child folders move
    /// to the root level.
    pub fn delete_folder(&mut self, id: &str) -> Change {
        let before = self.folders.len();
        self.folders.retain(|f| f.id != id);
        if self.folders.len() == before {
            debug!("Ignoring delete for unknown folder {}", id);
            return Change::None;
        }

        let promoted = self.folder_index.remove(id);
        for folder in &mut self.folders {
            if folder.parent_id.as_deref() == Some(id) {
                folder.parent_id = None;
            }
        }

        let mut unfiled = 0;
        for note in &mut self.notes {
            if note.folder_id.as_deref() == Some(id) {
                note.folder_id = None;
                unfiled += 1;
            }
        }

        debug!(
            "Deleted folder {}: {} notes unfiled, {} subfolders moved to root",
            id,
            unfiled,
            promoted.len()
        );
        Change::Durable
    }

    pub fn update_folder(&mut self, id: &str, name: impl Into<String>) -> Change {
        match self.folders.iter_mut().find(|f| f.id == id) {
            Some(folder) => {
                folder.name = name.into();
                Change::Durable
            }
            None => {
                debug!("Ignoring rename for unknown folder {}", id);
                Change::None
            }
        }
    }

    pub fn set_has_visited_before(&mut self, value: bool) -> Change {
        self.has_visited_before = value;
        Change::Durable
    }

    pub fn reset_has_visited_before(&mut self) -> Change {
        self.set_has_visited_before(false)
    }

    pub fn toggle_pin(&mut self, id: &str) -> Change {
        let Some(pinned) = self.note(id).map(|n| !n.is_pinned) else {
            return Change::None;
        };
        self.update_note(id, NoteUpdate::pinned(pinned))
    }

    /// Appends a trimmed tag unless it is empty or already present
    pub fn add_tag(&mut self, id: &str, tag: &str) -> Change {
        let tag = tag.trim();
        let Some(note) = self.note(id) else {
            return Change::None;
        };
        if tag.is_empty() || note.has_tag(tag) {
            return Change::None;
        }

        let mut tags = note.tags.clone();
        tags.push(tag.to_string());
        self.update_note(id, NoteUpdate::tags(tags))
    }

    /// Removes a tag from the note, clearing the tag filter if it was the
    /// selected tag
    pub fn remove_tag(&mut self, id: &str, tag: &str) -> Change {
        let Some(note) = self.note(id) else {
            return Change::None;
        };
        if !note.has_tag(tag) {
            return Change::None;
        }

        let tags = note.tags.iter().filter(|t| *t != tag).cloned().collect();
        if self.selected_tag.as_deref() == Some(tag) {
            self.selected_tag = None;
        }
        self.update_note(id, NoteUpdate::tags(tags))
    }
}

/// `Utc::now()`, bumped past `previous` when the clock has not advanced
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}
