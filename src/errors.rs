//! Error types for the notely application.
//!
//! This module defines the error categories that can surface from the store,
//! the persistence layer, the suggestion service and the command-line shell.

use std::{io, path::PathBuf};

use thiserror::Error;

/// The main error type for the notely application.
#[derive(Error, Debug)]
pub enum NotesError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Note was not found when the shell looked it up.
    #[error("Note not found: {id}")]
    NoteNotFound { id: String },

    /// Folder was not found when the shell looked it up.
    #[error("Folder not found: {id}")]
    FolderNotFound { id: String },

    /// A persisted record or config file could not be understood.
    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// for mutex lock acquisition issues
    #[error("{message}")]
    LockAcquisitionFailed { message: String },

    /// No API key is configured for the suggestion service.
    #[error("Please add your Gemini API key to enable AI features.")]
    MissingCredential,

    /// The note has no content to analyze.
    #[error("Please add some content to your note before analyzing.")]
    EmptyContent,

    /// The suggestion service call failed; the caller may retry.
    #[error("Failed to generate suggestions. Please try again later. ({message})")]
    SuggestionFailed { message: String },

    /// file not found
    #[error("File not found: {file_path}")]
    FileNotFound { file_path: String },

    #[error("{message}")]
    EditorError { message: String },
}

impl NotesError {
    /// Whether retrying the same action later might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, NotesError::SuggestionFailed { .. } | NotesError::Io(_))
    }
}
