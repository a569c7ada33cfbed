//! Note-taking library with tags, nested folders and AI-assisted organization
//!
//! The state lives in a [`NoteStore`]; a [`Workspace`] wraps it and writes the
//! durable part of every change to a [`StateStorage`] slot.

mod cli;
mod config;
mod errors;
mod filter;
mod folders;
mod helper;
mod note;
mod storage;
mod store;
mod suggest;
mod types;
mod workspace;

// Re-export key components
pub use cli::*;
pub use config::*;
pub use errors::*;
pub use filter::*;
pub use folders::*;
pub use helper::*;
pub use note::*;
pub use storage::*;
pub use store::*;
pub use suggest::*;
pub use types::*;
pub use workspace::*;
