//! Shared types for the notely application.
//!
//! Holds the crate-wide `Result` alias and the subcommands of the
//! command-line shell.
use std::path::PathBuf;

use clap::Subcommand;

use crate::NotesError;

/// A specialized Result type for notely operations.
pub type Result<T> = std::result::Result<T, NotesError>;

/// Available subcommands for the notely application
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new note
    Create {
        /// Title of the note
        #[clap(short = 'T', long, default_value = "")]
        title: String,

        /// Note type: text, rich-text, markdown, code or checklist
        #[clap(short = 'y', long = "type", default_value = "text")]
        note_type: String,

        /// Content of the note
        #[clap(short, long)]
        content: Option<String>,

        /// Path to a file containing the note's content
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Tags to associate with the note (comma-separated)
        #[clap(short = 't', long)]
        tags: Option<String>,

        /// Folder ID to file the note under
        #[clap(long)]
        folder: Option<String>,

        /// Pin the note
        #[clap(short, long)]
        pin: bool,
    },

    /// View a note by ID
    View {
        /// ID of the note to view
        id: String,

        /// Format output as raw JSON
        #[clap(short, long)]
        json: bool,
    },

    /// List notes with optional filtering
    List {
        /// Search query; prefix with '#' to match tags only
        #[clap(short, long)]
        search: Option<String>,

        /// Only show notes carrying this exact tag
        #[clap(short, long)]
        tag: Option<String>,

        /// Sort by last update only, ignoring pins
        #[clap(short, long)]
        recent: bool,

        /// Limit the number of notes shown (0 shows all)
        #[clap(short = 'n', long, default_value_t = 0)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Edit an existing note
    Edit {
        /// ID of the note to edit
        id: String,

        /// New title for the note
        #[clap(short = 'T', long)]
        title: Option<String>,

        /// New content for the note
        #[clap(short, long)]
        content: Option<String>,

        /// Path to a file containing the new note content
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Open content in editor before saving
        #[clap(short, long)]
        editor: bool,

        /// Tags to add (comma-separated)
        #[clap(short, long)]
        add_tags: Option<String>,

        /// Tags to remove (comma-separated)
        #[clap(short, long)]
        remove_tags: Option<String>,

        /// Move the note into this folder
        #[clap(long, conflicts_with = "unfile")]
        folder: Option<String>,

        /// Remove the note from its folder
        #[clap(long)]
        unfile: bool,
    },

    /// Delete a note by ID
    Delete {
        /// ID of the note to delete
        id: String,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Pin or unpin a note
    Pin {
        /// ID of the note
        id: String,
    },

    /// List every tag in use
    Tags,

    /// Folder operations
    #[clap(subcommand)]
    Folder(FolderCommands),

    /// Toggle dark mode
    Theme,

    /// Show the welcome screen
    Welcome {
        /// Show the welcome screen again on next start
        #[clap(long)]
        reset: bool,
    },

    /// Ask the AI assistant for tag and folder suggestions
    Suggest {
        /// ID of the note to analyze
        id: String,

        /// Apply all tag and folder suggestions
        #[clap(short, long)]
        apply: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum FolderCommands {
    /// Create a folder
    Add {
        /// Folder name
        name: String,

        /// Parent folder ID
        #[clap(short, long)]
        parent: Option<String>,
    },

    /// Rename a folder
    Rename {
        /// Folder ID
        id: String,

        /// New name
        name: String,
    },

    /// Delete a folder; its notes become unfiled
    Delete {
        /// Folder ID
        id: String,
    },

    /// Show the folder tree
    Tree,
}
