use std::{fs, path::Path};

use log::{debug, error};

use crate::{NotesError, Result};

// Helper method for parsing tags
pub fn parse_tags(tags: Option<String>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Reads note content from a file given on the command line
pub fn read_content_from_file(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(NotesError::FileNotFound {
            file_path: path.display().to_string(),
        });
    }

    debug!("Reading note content from {}", path.display());
    fs::read_to_string(path).map_err(|e| {
        error!("Failed to read {}: {}", path.display(), e);
        NotesError::Io(e)
    })
}

/// First non-empty line of `content`, cut to `max_chars` characters
pub fn content_preview(content: &str, max_chars: usize) -> String {
    let first_line = content
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");

    match first_line.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &first_line[..idx]),
        None => first_line.to_string(),
    }
}
