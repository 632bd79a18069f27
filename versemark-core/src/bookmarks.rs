use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result};
use crate::store::{BookmarkRecord, PositionRecord, Snapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub name: String,
    /// 1-based line in the associated document.
    pub line: usize,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Most recent explicit cursor jump, scoped to the document it was made in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastPosition {
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub source: Option<PathBuf>,
}

/// Parses a line number as typed by the user: ASCII digits only, at least 1.
pub fn parse_line(input: &str) -> Result<usize> {
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid(format!("invalid line number {:?}", input)));
    }
    match input.parse::<usize>() {
        Ok(line) if line > 0 => Ok(line),
        _ => Err(Error::invalid(format!("invalid line number {:?}", input))),
    }
}

/// Named bookmarks plus the last-position pointer. Listing order is
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkRegistry {
    bookmarks: Vec<Bookmark>,
    last_position: LastPosition,
    document_path: Option<PathBuf>,
}

impl BookmarkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
        self.bookmarks.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.bookmarks.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Bookmark> {
        self.bookmarks.iter().find(|b| b.name == name)
    }

    pub fn document_path(&self) -> Option<&Path> {
        self.document_path.as_deref()
    }

    pub fn set_document_path(&mut self, path: PathBuf) {
        self.document_path = Some(path);
    }

    pub fn last_position(&self) -> &LastPosition {
        &self.last_position
    }

    pub fn add(&mut self, name: &str, line: usize, description: Option<String>) -> Result<()> {
        if self.document_path.is_none() {
            return Err(Error::NoDocumentLoaded);
        }
        if name.is_empty() {
            return Err(Error::invalid("bookmark name is empty"));
        }
        if line == 0 {
            return Err(Error::invalid("line numbers start at 1"));
        }
        if self.get(name).is_some() {
            return Err(Error::invalid(format!("bookmark '{}' already exists", name)));
        }
        self.bookmarks.push(Bookmark {
            name: name.to_string(),
            line,
            description,
        });
        Ok(())
    }

    /// Replaces the description only; the line cannot be changed here.
    pub fn edit(&mut self, name: &str, description: Option<String>) -> Result<()> {
        let bookmark = self
            .bookmarks
            .iter_mut()
            .find(|b| b.name == name)
            .ok_or_else(|| not_found(name))?;
        bookmark.description = description;
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Bookmark> {
        let index = self
            .bookmarks
            .iter()
            .position(|b| b.name == name)
            .ok_or_else(|| not_found(name))?;
        Ok(self.bookmarks.remove(index))
    }

    /// First bookmark in registry order on `line`. Two bookmarks may share a
    /// line; the earlier one wins.
    pub fn lookup_by_line(&self, line: usize) -> Option<&str> {
        self.bookmarks
            .iter()
            .find(|b| b.line == line)
            .map(|b| b.name.as_str())
    }

    /// Resolves `name` to its position (column 0) and records it as the last
    /// position for the current document.
    pub fn go_to(&mut self, name: &str) -> Result<Position> {
        let line = self.get(name).ok_or_else(|| not_found(name))?.line;
        let position = Position { line, column: 0 };
        let source = self.document_path.clone();
        self.record_position(position.line, position.column, source);
        Ok(position)
    }

    pub fn record_position(&mut self, line: usize, column: usize, source: Option<PathBuf>) {
        if let Some(path) = &source {
            self.document_path = Some(path.clone());
        }
        self.last_position = LastPosition {
            line: Some(line),
            column: Some(column),
            source,
        };
    }

    /// The stored last position, only when it was recorded against `path`.
    pub fn restore_position(&self, path: &Path) -> Option<Position> {
        let LastPosition {
            line,
            column,
            source,
        } = &self.last_position;
        match (line, source) {
            (Some(line), Some(source)) if *line > 0 && source == path => Some(Position {
                line: *line,
                column: column.unwrap_or(0),
            }),
            _ => None,
        }
    }

    /// Every bookmarked line with its name, in insertion order.
    pub fn bookmark_lines(&self) -> Vec<(usize, &str)> {
        self.bookmarks
            .iter()
            .map(|b| (b.line, b.name.as_str()))
            .collect()
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            bookmarks: self
                .bookmarks
                .iter()
                .map(|b| {
                    (
                        b.name.clone(),
                        BookmarkRecord {
                            line: b.line,
                            description: b.description.clone(),
                        },
                    )
                })
                .collect(),
            last_position: PositionRecord {
                line: self.last_position.line,
                column: self.last_position.column,
                file: self.last_position.source.clone(),
            },
            current_file: self.document_path.clone(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut registry = Self::new();
        for (name, record) in snapshot.bookmarks {
            if name.is_empty() || record.line == 0 {
                warn!(%name, line = record.line, "dropping invalid bookmark from snapshot");
                continue;
            }
            if registry.get(&name).is_some() {
                warn!(%name, "duplicate bookmark in snapshot, keeping the first");
                continue;
            }
            registry.bookmarks.push(Bookmark {
                name,
                line: record.line,
                description: record.description,
            });
        }
        registry.last_position = LastPosition {
            line: snapshot.last_position.line,
            column: snapshot.last_position.column,
            source: snapshot.last_position.file,
        };
        registry.document_path = snapshot.current_file;
        registry
    }
}

fn not_found(name: &str) -> Error {
    Error::NotFound(format!("bookmark '{}'", name))
}
