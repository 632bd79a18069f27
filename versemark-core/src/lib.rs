use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

pub mod bookmarks;
pub mod config;
pub mod document;
pub mod error;
pub mod search;
pub mod store;

pub use bookmarks::{parse_line, Bookmark, BookmarkRegistry, LastPosition, Position};
pub use config::{Config, HighlightConfig};
pub use document::{resolve_document_path, DocumentStore};
pub use error::{Error, Result};
pub use search::{find_all, line_column, Match};
pub use store::{FileSnapshotStore, MemorySnapshotStore, Snapshot, SnapshotStore};

/// Visual tags the core asks the frontend to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Bookmark,
    SearchMatch,
}

/// The view the core drives: rendering, cursor placement, tags and prompts.
///
/// Lines are 1-based, columns 0-based, spans are byte offsets into the
/// rendered content.
pub trait Frontend {
    fn render_document(&mut self, content: &str);
    fn set_cursor(&mut self, line: usize, column: usize);
    fn scroll_into_view(&mut self);
    fn apply_line_tag(&mut self, tag: Tag, line: usize);
    fn apply_span_tag(&mut self, tag: Tag, start: usize, end: usize);
    fn clear_tag(&mut self, tag: Tag);
    fn refresh_bookmark_menu(&mut self, names: &[&str]);
    /// `None` when the user cancels.
    fn prompt_string(&mut self, title: &str, prompt: &str, initial: Option<&str>)
        -> Option<String>;
    fn show_error(&mut self, message: &str);
    fn show_info(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    OpenDocument { path: Option<PathBuf> },
    AddBookmark,
    EditBookmark { name: String },
    RemoveBookmark { name: String },
    ViewBookmark { name: String },
    GotoBookmark { name: Option<String> },
    GotoLine { line: usize },
    Search { term: String },
    ClearSearch,
    SaveBookmarks,
    ReloadBookmarks,
    Close,
}

pub struct Session {
    document: DocumentStore,
    registry: BookmarkRegistry,
    store: Arc<dyn SnapshotStore>,
    persist_failed: bool,
}

impl Session {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            document: DocumentStore::new(),
            registry: BookmarkRegistry::new(),
            store,
            persist_failed: false,
        }
    }

    pub fn document(&self) -> &DocumentStore {
        &self.document
    }

    pub fn registry(&self) -> &BookmarkRegistry {
        &self.registry
    }

    /// Replaces the registry with the stored snapshot. A missing snapshot
    /// yields an empty registry; on error the in-memory state is kept.
    pub fn restore(&mut self) -> Result<()> {
        let mut registry = match self.store.load()? {
            Some(snapshot) => BookmarkRegistry::from_snapshot(snapshot),
            None => BookmarkRegistry::new(),
        };
        if let Some(path) = self.document.current_path() {
            registry.set_document_path(path.to_path_buf());
        }
        info!(bookmarks = registry.len(), "bookmarks restored");
        self.registry = registry;
        Ok(())
    }

    /// Pushes bookmark highlights and the bookmark listing to the view.
    pub fn sync_view(&self, ui: &mut dyn Frontend) {
        ui.clear_tag(Tag::Bookmark);
        for (line, _) in self.registry.bookmark_lines() {
            ui.apply_line_tag(Tag::Bookmark, line);
        }
        ui.refresh_bookmark_menu(&self.registry.names());
    }

    pub fn bookmark_at_line(&self, line: usize) -> Option<&str> {
        self.registry.lookup_by_line(line)
    }

    /// Runs `command` and reports any failure through the frontend.
    pub fn handle(&mut self, command: Command, ui: &mut dyn Frontend) {
        if let Err(err) = self.apply(command, ui) {
            warn!(%err, "command failed");
            ui.show_error(&err.to_string());
        }
    }

    pub fn apply(&mut self, command: Command, ui: &mut dyn Frontend) -> Result<()> {
        match command {
            Command::OpenDocument { path } => {
                let path = match path {
                    Some(path) => path,
                    None => match ui.prompt_string("Open Document", "Path to a text file:", None)
                    {
                        Some(input) if !input.trim().is_empty() => PathBuf::from(input.trim()),
                        _ => return Ok(()),
                    },
                };
                self.load_document(&path, ui);
                Ok(())
            }
            Command::AddBookmark => self.prompt_add_bookmark(ui),
            Command::EditBookmark { name } => self.prompt_edit_bookmark(&name, ui),
            Command::RemoveBookmark { name } => self.remove_bookmark(&name, ui),
            Command::ViewBookmark { name } => self.view_bookmark(&name, ui),
            Command::GotoBookmark { name } => {
                let name = match name {
                    Some(name) => name,
                    None => match ui.prompt_string("Go to Bookmark", "Enter bookmark name:", None) {
                        Some(name) => name,
                        None => return Ok(()),
                    },
                };
                self.go_to_bookmark(&name, ui).map(|_| ())
            }
            Command::GotoLine { line } => self.go_to_line(line, ui).map(|_| ()),
            Command::Search { term } => self.search(&term, ui).map(|_| ()),
            Command::ClearSearch => {
                ui.clear_tag(Tag::SearchMatch);
                Ok(())
            }
            Command::SaveBookmarks => self.save(ui),
            Command::ReloadBookmarks => self.reload(ui),
            Command::Close => {
                self.close(ui);
                Ok(())
            }
        }
    }

    /// Loads `path` into the view. A failed read shows a placeholder instead
    /// of the previous content and is not reported as an error.
    #[instrument(skip(self, ui))]
    pub fn load_document(&mut self, path: &Path, ui: &mut dyn Frontend) {
        let path = resolve_document_path(path);
        let loaded = self.document.load(&path);
        ui.clear_tag(Tag::SearchMatch);
        ui.render_document(self.document.current_content());
        self.registry.set_document_path(path.clone());

        match loaded {
            Ok(()) => {
                info!(?path, lines = self.document.line_count(), "document opened");
                if let Some(position) = self.registry.restore_position(&path) {
                    debug!(line = position.line, column = position.column, "restoring position");
                    self.move_cursor(position, ui);
                }
            }
            Err(err) => warn!(%err, "showing placeholder"),
        }

        self.sync_view(ui);
        self.persist(ui);
    }

    /// Adds a bookmark from raw user input; `line` must be a positive decimal.
    #[instrument(skip(self, ui))]
    pub fn add_bookmark(
        &mut self,
        name: &str,
        line: &str,
        description: Option<String>,
        ui: &mut dyn Frontend,
    ) -> Result<()> {
        if !self.document.is_loaded() {
            return Err(Error::NoDocumentLoaded);
        }
        let line = parse_line(line)?;
        self.registry.add(name, line, description)?;
        info!(name, line, "bookmark added");
        self.sync_view(ui);
        self.persist(ui);
        Ok(())
    }

    fn prompt_add_bookmark(&mut self, ui: &mut dyn Frontend) -> Result<()> {
        if !self.document.is_loaded() {
            return Err(Error::NoDocumentLoaded);
        }
        let name = match ui.prompt_string("Bookmark Name", "Enter bookmark name:", None) {
            Some(name) if !name.is_empty() => name,
            _ => return Ok(()),
        };
        let line = ui
            .prompt_string(
                "Bookmark Line",
                "Enter the line number for the bookmark (e.g., 5):",
                None,
            )
            .unwrap_or_default();
        let line = line.trim().to_string();
        parse_line(&line)?;
        let description =
            ui.prompt_string("Bookmark Description", "Enter bookmark description:", None);
        self.add_bookmark(&name, &line, description, ui)
    }

    pub fn edit_bookmark(
        &mut self,
        name: &str,
        description: Option<String>,
        ui: &mut dyn Frontend,
    ) -> Result<()> {
        self.registry.edit(name, description)?;
        info!(name, "bookmark edited");
        self.persist(ui);
        Ok(())
    }

    fn prompt_edit_bookmark(&mut self, name: &str, ui: &mut dyn Frontend) -> Result<()> {
        let current = self
            .registry
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("bookmark '{}'", name)))?
            .description
            .clone()
            .unwrap_or_default();
        let prompt = format!("Edit description for bookmark '{}':", name);
        match ui.prompt_string("Edit Bookmark", &prompt, Some(&current)) {
            Some(description) => self.edit_bookmark(name, Some(description), ui),
            None => Ok(()),
        }
    }

    #[instrument(skip(self, ui))]
    pub fn remove_bookmark(&mut self, name: &str, ui: &mut dyn Frontend) -> Result<()> {
        let removed = self.registry.remove(name)?;
        info!(name, line = removed.line, "bookmark removed");
        self.sync_view(ui);
        self.persist(ui);
        Ok(())
    }

    pub fn view_bookmark(&self, name: &str, ui: &mut dyn Frontend) -> Result<()> {
        let bookmark = self
            .registry
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("bookmark '{}'", name)))?;
        ui.show_info(&format!(
            "Name: {}\nLine: {}\nDescription: {}",
            bookmark.name,
            bookmark.line,
            bookmark.description.as_deref().unwrap_or("")
        ));
        Ok(())
    }

    pub fn go_to_bookmark(&mut self, name: &str, ui: &mut dyn Frontend) -> Result<Position> {
        let position = self.registry.go_to(name)?;
        debug!(name, line = position.line, "jump to bookmark");
        self.move_cursor(position, ui);
        self.persist(ui);
        Ok(position)
    }

    /// Jumps to `line`, clamped to the document, and records it.
    pub fn go_to_line(&mut self, line: usize, ui: &mut dyn Frontend) -> Result<Position> {
        let path = self
            .document
            .current_path()
            .map(Path::to_path_buf)
            .ok_or(Error::NoDocumentLoaded)?;
        if line == 0 {
            return Err(Error::invalid("line numbers start at 1"));
        }
        let position = Position {
            line: line.min(self.document.line_count().max(1)),
            column: 0,
        };
        self.registry
            .record_position(position.line, position.column, Some(path));
        self.move_cursor(position, ui);
        self.persist(ui);
        Ok(position)
    }

    /// Highlights every match of `term`; returns the number of matches.
    #[instrument(skip(self, ui))]
    pub fn search(&mut self, term: &str, ui: &mut dyn Frontend) -> Result<usize> {
        let matches: Vec<Match> = find_all(self.document.current_content(), term)?.collect();
        if matches.is_empty() {
            ui.show_info("Text not found.");
            return Ok(0);
        }
        ui.clear_tag(Tag::SearchMatch);
        for found in &matches {
            ui.apply_span_tag(Tag::SearchMatch, found.start, found.end);
        }
        debug!(count = matches.len(), "search highlighted");
        Ok(matches.len())
    }

    /// Writes the snapshot now; unlike the automatic flush every failure is
    /// returned.
    pub fn save(&mut self, ui: &mut dyn Frontend) -> Result<()> {
        self.store.save(&self.registry.to_snapshot())?;
        self.persist_failed = false;
        ui.show_info("Bookmarks saved.");
        Ok(())
    }

    pub fn reload(&mut self, ui: &mut dyn Frontend) -> Result<()> {
        self.restore()?;
        self.sync_view(ui);
        Ok(())
    }

    /// Final flush before the process exits.
    pub fn close(&mut self, ui: &mut dyn Frontend) {
        info!(bookmarks = self.registry.len(), "closing session");
        self.persist(ui);
    }

    fn move_cursor(&mut self, position: Position, ui: &mut dyn Frontend) {
        ui.set_cursor(position.line, position.column);
        ui.scroll_into_view();
        let source = self.registry.document_path().map(Path::to_path_buf);
        self.registry
            .record_position(position.line, position.column, source);
    }

    /// Flushes the registry. A failure is shown once; repeats are only logged
    /// until a write succeeds again.
    fn persist(&mut self, ui: &mut dyn Frontend) {
        match self.store.save(&self.registry.to_snapshot()) {
            Ok(()) => self.persist_failed = false,
            Err(err) => {
                warn!(%err, "failed to persist bookmarks");
                if !self.persist_failed {
                    ui.show_error(&err.to_string());
                }
                self.persist_failed = true;
            }
        }
    }
}
