//! Core data structures for the notely application.
//!
//! Notes and folders are plain records. The persisted JSON layout uses
//! camelCase field names, so every record here renames its fields on the wire.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::NotesError;

/// Content kind of a note. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NoteType {
    #[default]
    Text,
    RichText,
    Markdown,
    Code,
    Checklist,
}

impl NoteType {
    pub const ALL: [NoteType; 5] = [
        NoteType::Text,
        NoteType::RichText,
        NoteType::Markdown,
        NoteType::Code,
        NoteType::Checklist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Text => "text",
            NoteType::RichText => "rich-text",
            NoteType::Markdown => "markdown",
            NoteType::Code => "code",
            NoteType::Checklist => "checklist",
        }
    }

    /// Content a freshly created note of this type starts with
    pub fn initial_content(&self) -> &'static str {
        match self {
            NoteType::Checklist => "[ ] New item",
            _ => "",
        }
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteType {
    type Err = NotesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NoteType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| NotesError::InvalidFormat {
                message: format!(
                    "Unknown note type: {}. Must be one of: text, rich-text, markdown, code, checklist",
                    s
                ),
            })
    }
}

/// Represents a single note in our system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Unique identifier for the note
    pub id: String,
    /// Note title, may be empty
    pub title: String,
    /// Note body, interpreted according to `note_type`
    pub content: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    /// Tags for organization
    pub tags: Vec<String>,
    /// Folder the note is filed under, `None` when unfiled
    pub folder_id: Option<String>,
    /// When the note was created
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
    pub is_pinned: bool,
}

impl Note {
    /// Builds a note from a draft, stamping a fresh id and both timestamps
    pub fn from_draft(draft: NoteDraft, now: DateTime<Utc>) -> Self {
        Note {
            id: new_id(),
            title: draft.title,
            content: draft.content,
            note_type: draft.note_type,
            tags: draft.tags,
            folder_id: draft.folder_id,
            created_at: now,
            updated_at: now,
            is_pinned: draft.is_pinned,
        }
    }

    /// Title for display; empty titles read as "Untitled"
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled"
        } else {
            &self.title
        }
    }

    /// True once the note was modified more than a second after creation
    pub fn is_edited(&self) -> bool {
        self.updated_at - self.created_at > Duration::seconds(1)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Everything a caller supplies when creating a note
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub note_type: NoteType,
    pub tags: Vec<String>,
    pub folder_id: Option<String>,
    pub is_pinned: bool,
}

impl NoteDraft {
    /// A draft with the type's initial content, no tags, unfiled and unpinned
    pub fn new(title: impl Into<String>, note_type: NoteType) -> Self {
        NoteDraft {
            title: title.into(),
            content: note_type.initial_content().to_string(),
            note_type,
            ..Default::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn in_folder(mut self, folder_id: Option<String>) -> Self {
        self.folder_id = folder_id;
        self
    }

    pub fn pinned(mut self, is_pinned: bool) -> Self {
        self.is_pinned = is_pinned;
        self
    }
}

/// Partial overrides for an existing note.
///
/// Carries no `updated_at`; the store always stamps it. `id`, `created_at`
/// and the note type cannot be changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    /// `Some(None)` unfiles the note
    pub folder_id: Option<Option<String>>,
    pub is_pinned: Option<bool>,
}

impl NoteUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        NoteUpdate {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        NoteUpdate {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn tags(tags: Vec<String>) -> Self {
        NoteUpdate {
            tags: Some(tags),
            ..Default::default()
        }
    }

    pub fn folder(folder_id: Option<String>) -> Self {
        NoteUpdate {
            folder_id: Some(folder_id),
            ..Default::default()
        }
    }

    pub fn pinned(is_pinned: bool) -> Self {
        NoteUpdate {
            is_pinned: Some(is_pinned),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == NoteUpdate::default()
    }

    /// Merges the overrides into `note`. Timestamps are left to the caller.
    pub(crate) fn apply_to(self, note: &mut Note) {
        if let Some(title) = self.title {
            note.title = title;
        }
        if let Some(content) = self.content {
            note.content = content;
        }
        if let Some(tags) = self.tags {
            note.tags = tags;
        }
        if let Some(folder_id) = self.folder_id {
            note.folder_id = folder_id;
        }
        if let Some(is_pinned) = self.is_pinned {
            note.is_pinned = is_pinned;
        }
    }
}

/// A named grouping node; notes reference it through `folder_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Folder {
    pub fn new(name: String, parent_id: Option<String>, now: DateTime<Utc>) -> Self {
        Folder {
            id: new_id(),
            name,
            parent_id,
            created_at: now,
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_type_wire_names() {
        let json = serde_json::to_string(&NoteType::RichText).unwrap();
        assert_eq!(json, "\"rich-text\"");
        let parsed: NoteType = serde_json::from_str("\"checklist\"").unwrap();
        assert_eq!(parsed, NoteType::Checklist);
        assert_eq!("code".parse::<NoteType>().unwrap(), NoteType::Code);
        assert!("html".parse::<NoteType>().is_err());
    }

    #[test]
    fn test_checklist_draft_starts_with_item() {
        let draft = NoteDraft::new("Todo", NoteType::Checklist);
        assert_eq!(draft.content, "[ ] New item");
        assert_eq!(NoteDraft::new("x", NoteType::Markdown).content, "");
    }

    #[test]
    fn test_note_serializes_camel_case() {
        let note = Note::from_draft(NoteDraft::new("", NoteType::Code), Utc::now());
        let value = serde_json::to_value(&note).unwrap();
        assert!(value.get("folderId").is_some());
        assert!(value.get("isPinned").is_some());
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["type"], "code");
        assert_eq!(note.display_title(), "Untitled");
    }

    #[test]
    fn test_is_edited_threshold() {
        let now = Utc::now();
        let mut note = Note::from_draft(NoteDraft::new("a", NoteType::Text), now);
        note.updated_at = now + Duration::milliseconds(900);
        assert!(!note.is_edited());
        note.updated_at = now + Duration::milliseconds(1500);
        assert!(note.is_edited());
    }

    #[test]
    fn test_update_leaves_unset_fields() {
        let mut note = Note::from_draft(
            NoteDraft::new("Old", NoteType::Text).with_tags(vec!["a".into()]),
            Utc::now(),
        );
        NoteUpdate::pinned(true).apply_to(&mut note);
        assert_eq!(note.title, "Old");
        assert_eq!(note.tags, vec!["a".to_string()]);
        assert!(note.is_pinned);
    }
}
