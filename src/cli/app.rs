//! CLI module for the notely application
//!
//! This module drives a [`Workspace`] from command-line subcommands. It plays
//! the part of the presentation layer: it reads store state and calls the
//! store's operations, nothing more.
use std::{
    fs::{read_to_string, OpenOptions},
    io::{stdin, stdout, Write},
    path::Path,
    process::Command,
    sync::Arc,
};

use console::style;
use log::{debug, info, warn};
use shell_words::split;
use tempfile::Builder;

use crate::{
    apply_suggestion, content_preview, parse_tags, read_content_from_file, Applied, Commands,
    Config, FileStorage, FolderCommands, GeminiClient, Note, NoteDraft, NoteType, NoteUpdate,
    NotesError, Result, SortMode, Suggestion, SuggestionTask, Workspace,
};

/// CLI Application handler - processes CLI commands against the workspace
pub struct App {
    /// The note workspace backed by the data directory
    workspace: Workspace<FileStorage>,

    /// Application configuration
    config: Config,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    /// Opens the workspace in the configured data directory
    pub fn new(config: Config, verbose: bool) -> Result<Self> {
        let workspace = Workspace::open(FileStorage::new(&config.data_dir))?;
        Ok(Self {
            workspace,
            config,
            verbose,
        })
    }

    /// Run the CLI application with the given command
    pub async fn run(&mut self, command: Commands) -> Result<()> {
        let first_run = !self.workspace.store().has_visited_before();
        if first_run && !matches!(command, Commands::Welcome { .. }) {
            self.show_welcome();
            self.workspace.set_has_visited_before(true);
        }

        match command {
            Commands::Create {
                title,
                note_type,
                content,
                file,
                tags,
                folder,
                pin,
            } => self.create_note(title, note_type, content, file.as_deref(), tags, folder, pin)?,

            Commands::View { id, json } => self.view_note(&id, json)?,

            Commands::List {
                search,
                tag,
                recent,
                limit,
                json,
            } => self.list_notes(search, tag, recent, limit, json)?,

            Commands::Edit {
                id,
                title,
                content,
                file,
                editor,
                add_tags,
                remove_tags,
                folder,
                unfile,
            } => self.handle_edit(
                &id,
                EditOptions {
                    title,
                    content,
                    file: file.as_deref(),
                    open_editor: editor,
                    add_tags,
                    remove_tags,
                    folder,
                    unfile,
                },
            )?,

            Commands::Delete { id, force } => self.handle_delete(&id, force)?,

            Commands::Pin { id } => {
                let note = self.require_note(&id)?;
                let was_pinned = note.is_pinned;
                let title = note.display_title().to_string();
                self.workspace.toggle_pin(&id);
                println!(
                    "\"{}\" has been {}",
                    title,
                    if was_pinned { "unpinned" } else { "pinned" }
                );
            }

            Commands::Tags => self.list_tags(),

            Commands::Folder(cmd) => self.handle_folder(cmd)?,

            Commands::Theme => {
                self.workspace.toggle_dark_mode();
                let mode = if self.workspace.store().dark_mode() {
                    "dark"
                } else {
                    "light"
                };
                println!("Switched to {} mode", mode);
            }

            Commands::Welcome { reset } => {
                if reset {
                    self.workspace.reset_has_visited_before();
                    println!("The welcome screen will be shown on next start.");
                } else {
                    self.show_welcome();
                    self.workspace.set_has_visited_before(true);
                }
            }

            Commands::Suggest { id, apply } => self.handle_suggest(&id, apply).await?,
        }

        if let Some(e) = self.workspace.last_persist_error() {
            warn!("Changes could not be saved: {}", e);
            eprintln!("Warning: changes could not be saved ({})", e);
        }

        Ok(())
    }

    fn show_welcome(&self) {
        println!("{}", style("Welcome to notely").bold());
        println!("Create notes of five kinds: text, rich-text, markdown, code and checklist.");
        println!("Organize them with tags and nested folders, and search with 'list --search'.");
        println!("Prefix a search with '#' to match tags only.");
        if !self.config.has_api_key() {
            println!(
                "{}",
                style("Add a Gemini API key to enable AI suggestions.").yellow()
            );
        }
        println!();
    }

    fn require_note(&self, id: &str) -> Result<&Note> {
        self.workspace
            .store()
            .note(id)
            .ok_or_else(|| NotesError::NoteNotFound { id: id.to_string() })
    }

    fn require_folder(&self, id: &str) -> Result<()> {
        match self.workspace.store().folder(id) {
            Some(_) => Ok(()),
            None => Err(NotesError::FolderNotFound { id: id.to_string() }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn create_note(
        &mut self,
        title: String,
        note_type: String,
        content: Option<String>,
        file: Option<&Path>,
        tags: Option<String>,
        folder: Option<String>,
        pin: bool,
    ) -> Result<()> {
        let note_type: NoteType = note_type.parse()?;
        if let Some(folder_id) = &folder {
            self.require_folder(folder_id)?;
        }

        let mut draft = NoteDraft::new(title, note_type)
            .with_tags(parse_tags(tags))
            .in_folder(folder)
            .pinned(pin);

        match (content, file) {
            (Some(_), Some(_)) => {
                return Err(NotesError::EditorError {
                    message: "Cannot specify both --content and --file options".to_string(),
                })
            }
            (Some(c), None) => draft = draft.with_content(c),
            (None, Some(path)) => draft = draft.with_content(read_content_from_file(path)?),
            (None, None) => {}
        }

        let note = self.workspace.add_note(draft);
        println!(
            "{} has been created with ID: {}",
            note.display_title(),
            note.id
        );
        Ok(())
    }

    fn view_note(&mut self, id: &str, json: bool) -> Result<()> {
        let note = self.require_note(id)?.clone();
        self.workspace.set_active_note(Some(note.id.clone()));

        if json {
            println!("{}", serde_json::to_string_pretty(&note)?);
            return Ok(());
        }

        println!("{}", style(note.display_title()).bold());
        println!("ID:      {}", note.id);
        println!("Type:    {}", note.note_type);
        if let Some(folder) = note
            .folder_id
            .as_deref()
            .and_then(|f| self.workspace.store().folder(f))
        {
            println!("Folder:  {}", folder.name);
        }
        if !note.tags.is_empty() {
            println!("Tags:    {}", format_tags(&note.tags));
        }
        println!("Created: {}", note.created_at.format("%Y-%m-%d %H:%M"));
        println!(
            "Updated: {}{}",
            note.updated_at.format("%Y-%m-%d %H:%M"),
            if note.is_edited() { " (edited)" } else { "" }
        );
        println!("\n{}", note.content);
        Ok(())
    }

    /// List notes according to provided filters and options
    fn list_notes(
        &mut self,
        search: Option<String>,
        tag: Option<String>,
        recent: bool,
        limit: usize,
        json: bool,
    ) -> Result<()> {
        self.workspace.set_search_query(search.unwrap_or_default());
        self.workspace.set_selected_tag(tag);

        let sort = if recent {
            SortMode::Recent
        } else {
            SortMode::Default
        };
        let mut notes = self.workspace.store().visible_notes(sort);
        if limit > 0 && notes.len() > limit {
            notes.truncate(limit);
        }

        if json {
            println!("{}", serde_json::to_string_pretty(&notes)?);
            return Ok(());
        }

        if notes.is_empty() {
            println!("No notes found matching the criteria.");
            return Ok(());
        }

        // Use terminal width for formatting if available
        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);

        for (i, note) in notes.iter().enumerate() {
            if i > 0 {
                println!("{}", "-".repeat(term_width.min(50)));
            }
            self.print_note_summary(note, term_width);
        }

        println!(
            "\nFound {} note{}",
            notes.len(),
            if notes.len() == 1 { "" } else { "s" }
        );
        Ok(())
    }

    fn print_note_summary(&self, note: &Note, term_width: usize) {
        let pin = if note.is_pinned { "* " } else { "" };
        println!(
            "{}{}  [{}]",
            pin,
            style(note.display_title()).bold(),
            note.note_type
        );
        println!(
            "ID: {} | Updated: {}{}",
            note.id,
            note.updated_at.format("%Y-%m-%d %H:%M"),
            if note.is_edited() { " (edited)" } else { "" }
        );

        if !note.tags.is_empty() {
            println!("Tags: {}", style(format_tags(&note.tags)).cyan());
        }

        let preview = content_preview(&note.content, term_width.saturating_sub(10).max(20));
        if !preview.is_empty() {
            println!("{}", preview);
        }

        if self.verbose {
            println!("Created: {}", note.created_at.to_rfc3339());
        }
    }

    fn list_tags(&self) {
        let tags = self.workspace.store().all_tags();
        if tags.is_empty() {
            println!("No tags yet.");
            return;
        }
        for tag in tags {
            let count = self
                .workspace
                .store()
                .notes()
                .iter()
                .filter(|n| n.has_tag(tag))
                .count();
            println!("#{} ({})", tag, count);
        }
    }

    fn handle_edit(&mut self, id: &str, options: EditOptions<'_>) -> Result<()> {
        // Validate input - check for conflicting options
        let sources = [
            options.content.is_some(),
            options.file.is_some(),
            options.open_editor,
        ];
        if sources.iter().filter(|s| **s).count() > 1 {
            return Err(NotesError::EditorError {
                message: "Use only one of --content, --file and --editor".to_string(),
            });
        }

        let note = self.require_note(id)?.clone();
        if let Some(folder_id) = &options.folder {
            self.require_folder(folder_id)?;
        }

        let mut update = NoteUpdate {
            title: options.title,
            ..Default::default()
        };

        if let Some(new_content) = options.content {
            update.content = Some(new_content);
        } else if let Some(path) = options.file {
            update.content = Some(read_content_from_file(path)?);
            println!("Content updated from file: {}", path.display());
        } else if options.open_editor {
            update.content = Some(self.open_editor_with_content(&note)?);
            println!("Content updated from editor");
        }

        if options.add_tags.is_some() || options.remove_tags.is_some() {
            let remove = parse_tags(options.remove_tags);
            let mut tags: Vec<String> = note
                .tags
                .iter()
                .filter(|t| !remove.contains(t))
                .cloned()
                .collect();
            for tag in parse_tags(options.add_tags) {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
            update.tags = Some(tags);
        }

        if options.unfile {
            update.folder_id = Some(None);
        } else if let Some(folder_id) = options.folder {
            update.folder_id = Some(Some(folder_id));
        }

        if update.is_empty() {
            println!("Nothing to change.");
            return Ok(());
        }

        self.workspace.update_note(id, update);
        println!("Note {} updated successfully", id);
        Ok(())
    }

    // Opens the configured editor on a temp file holding the note content
    fn open_editor_with_content(&self, note: &Note) -> Result<String> {
        let suffix = match note.note_type {
            NoteType::Markdown => ".md",
            NoteType::RichText => ".html",
            _ => ".txt",
        };
        let temp_file = Builder::new().prefix("notely-").suffix(suffix).tempfile()?;
        let temp_path = temp_file.path().to_path_buf();

        {
            let mut file = OpenOptions::new().write(true).open(&temp_path)?;
            write!(file, "{}", note.content)?;
        }

        let editor_cmd = self.config.get_editor_command();
        info!("Opening editor to edit note content. Save and exit when done...");
        self.launch_editor(&editor_cmd, &temp_path)?;

        Ok(read_to_string(&temp_path)?)
    }

    fn launch_editor(&self, editor_cmd: &str, file_path: &Path) -> Result<()> {
        // Handle shell-like command parsing
        let args = split(editor_cmd).map_err(|e| NotesError::EditorError {
            message: format!("Failed to parse editor command: {}", e),
        })?;

        let Some((program, rest)) = args.split_first() else {
            return Err(NotesError::EditorError {
                message: "Empty editor command".to_string(),
            });
        };

        debug!("Launching editor: {} {:?}", program, rest);
        let status = Command::new(program)
            .args(rest)
            .arg(file_path)
            .status()
            .map_err(|e| NotesError::EditorError {
                message: format!("Failed to execute editor command: {}", e),
            })?;

        if !status.success() {
            return Err(NotesError::EditorError {
                message: "Editor exited with non-zero status".to_string(),
            });
        }

        Ok(())
    }

    fn handle_delete(&mut self, id: &str, force: bool) -> Result<()> {
        let note = self.require_note(id)?.clone();

        if !force {
            println!("You are about to delete the following note:");
            println!("ID:      {}", note.id);
            println!("Title:   {}", note.display_title());
            println!("Tags:    {}", note.tags.join(", "));
            println!("Created: {}", note.created_at.format("%Y-%m-%d %H:%M:%S"));

            let preview = content_preview(&note.content, 80);
            if !preview.is_empty() {
                println!("\nContent preview:\n{}", preview);
            }

            println!("\nThis action cannot be undone!");
            print!("Are you sure you want to delete this note? [y/N]: ");
            stdout().flush()?;

            let mut input = String::new();
            stdin().read_line(&mut input)?;

            let input = input.trim().to_lowercase();
            if input != "y" && input != "yes" {
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        self.workspace.delete_note(id);
        println!("\"{}\" has been deleted", note.display_title());
        Ok(())
    }

    fn handle_folder(&mut self, cmd: FolderCommands) -> Result<()> {
        match cmd {
            FolderCommands::Add { name, parent } => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(NotesError::EditorError {
                        message: "Folder name cannot be empty".to_string(),
                    });
                }
                if let Some(parent_id) = &parent {
                    self.require_folder(parent_id)?;
                }
                let folder = self.workspace.add_folder(name, parent);
                println!("Folder '{}' created with ID: {}", folder.name, folder.id);
            }
            FolderCommands::Rename { id, name } => {
                self.require_folder(&id)?;
                self.workspace.update_folder(&id, name.trim());
                println!("Folder {} renamed", id);
            }
            FolderCommands::Delete { id } => {
                self.require_folder(&id)?;
                let filed = self
                    .workspace
                    .store()
                    .notes()
                    .iter()
                    .filter(|n| n.folder_id.as_deref() == Some(id.as_str()))
                    .count();
                self.workspace.delete_folder(&id);
                println!("Folder deleted; {} note(s) moved to unfiled", filed);
            }
            FolderCommands::Tree => self.print_folder_tree(),
        }
        Ok(())
    }

    fn print_folder_tree(&self) {
        let store = self.workspace.store();
        let nodes = store.folder_index().walk();
        if nodes.is_empty() {
            println!("No folders yet.");
            return;
        }

        for node in nodes {
            let Some(folder) = store.folder(node.id) else {
                continue;
            };
            let count = store
                .notes()
                .iter()
                .filter(|n| n.folder_id.as_deref() == Some(node.id))
                .count();
            println!(
                "{}{} ({})  {}",
                "  ".repeat(node.depth),
                style(&folder.name).bold(),
                count,
                style(&folder.id).dim()
            );
        }
    }

    async fn handle_suggest(&mut self, id: &str, apply: bool) -> Result<()> {
        let note = self.require_note(id)?.clone();
        self.workspace.set_active_note(Some(note.id.clone()));

        if !self.config.has_api_key() {
            warn!("{}", NotesError::MissingCredential);
            println!(
                "{}",
                style("AI suggestions need an API key.").yellow()
            );
            println!("Set ai.api_key in the config file or the GEMINI_API_KEY variable.");
            return Ok(());
        }

        let service = Arc::new(GeminiClient::new(&self.config.ai)?);
        println!("Analyzing \"{}\"...", note.display_title());
        let suggestions = SuggestionTask::spawn(service, &note).finish().await?;

        let pending = suggestions.pending_for(&note);
        if pending.is_empty() {
            println!("No new suggestions available for this note.");
            return Ok(());
        }

        for suggestion in &pending {
            match suggestion {
                Suggestion::Tag(tag) => println!("Tag:    #{}", tag),
                Suggestion::Folder(name) => println!("Folder: {}", name),
                Suggestion::Organization(tip) => println!("Tip:    {}", tip),
            }
        }

        if apply {
            for suggestion in &pending {
                match apply_suggestion(&mut self.workspace, &note.id, suggestion) {
                    Applied::Tag => debug!("Applied tag suggestion {:?}", suggestion),
                    Applied::Folder(folder) => {
                        println!("Created folder '{}' ({})", folder.name, folder.id)
                    }
                    Applied::Discarded => {
                        warn!("Note {} changed while suggestions were pending", note.id);
                        break;
                    }
                    Applied::AlreadyPresent | Applied::Unchanged | Applied::NotApplicable => {}
                }
            }
            println!("Suggestions applied.");
        }

        Ok(())
    }
}

/// Borrowed edit arguments
struct EditOptions<'a> {
    title: Option<String>,
    content: Option<String>,
    file: Option<&'a Path>,
    open_editor: bool,
    add_tags: Option<String>,
    remove_tags: Option<String>,
    folder: Option<String>,
    unfile: bool,
}

fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("#{}", tag))
        .collect::<Vec<_>>()
        .join(" ")
}
