//! Derivation of the displayed note list.
//!
//! Everything here is a pure function of its inputs; nothing is cached.
use std::collections::HashSet;

use crate::Note;

/// Ordering applied after filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Pinned notes first, then most recently updated
    #[default]
    Default,
    /// Most recently updated first, pin state ignored
    Recent,
}

/// Filters `notes` by tag and search query, then sorts them.
///
/// The tag filter is a case-sensitive exact match. The search query is
/// lower-cased; a leading `#` restricts the match to tags, otherwise title,
/// content and tags are all searched by substring. Both filters must pass.
/// Sorting is stable, so equal timestamps keep their input order.
pub fn visible_notes<'a>(
    notes: &'a [Note],
    selected_tag: Option<&str>,
    search_query: &str,
    sort: SortMode,
) -> Vec<&'a Note> {
    let query = search_query.to_lowercase();

    let mut visible: Vec<&Note> = notes
        .iter()
        .filter(|note| selected_tag.map_or(true, |tag| note.has_tag(tag)))
        .filter(|note| query.is_empty() || matches_query(note, &query))
        .collect();

    sort_notes(&mut visible, sort);
    visible
}

/// `query` must already be lower-cased
fn matches_query(note: &Note, query: &str) -> bool {
    let tag_matches = |needle: &str| note.tags.iter().any(|t| t.to_lowercase().contains(needle));

    match query.strip_prefix('#') {
        Some(tag_query) => tag_matches(tag_query),
        None => {
            note.title.to_lowercase().contains(query)
                || note.content.to_lowercase().contains(query)
                || tag_matches(query)
        }
    }
}

pub fn sort_notes(notes: &mut [&Note], sort: SortMode) {
    match sort {
        SortMode::Recent => notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        SortMode::Default => notes.sort_by(|a, b| {
            b.is_pinned
                .cmp(&a.is_pinned)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        }),
    }
}

/// Distinct tags across all notes, in first-seen order
pub fn all_tags(notes: &[Note]) -> Vec<&str> {
    let mut seen = HashSet::new();
    notes
        .iter()
        .flat_map(|note| note.tags.iter())
        .filter(|tag| seen.insert(tag.as_str()))
        .map(String::as_str)
        .collect()
}
