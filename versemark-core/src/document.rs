use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Resolves `path` to the spelling used for bookmark bookkeeping, so the
/// same file compares equal across sessions regardless of the working
/// directory it was opened from.
pub fn resolve_document_path(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf())
}

/// The single open text document. Content is never persisted.
#[derive(Debug, Default)]
pub struct DocumentStore {
    path: Option<PathBuf>,
    content: String,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `path` fully into memory.
    ///
    /// On failure the content becomes a placeholder message and the path is
    /// still recorded as the attempted source; nothing is partially adopted.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.path = Some(path.to_path_buf());
        match fs::read_to_string(path) {
            Ok(content) => {
                debug!(?path, bytes = content.len(), "document loaded");
                self.content = content;
                Ok(())
            }
            Err(err) => {
                warn!(?path, %err, "failed to read document");
                self.content = format!("Document not found: {}", path.display());
                Err(Error::NotFound(format!("document {}", path.display())))
            }
        }
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn current_content(&self) -> &str {
        &self.content
    }

    pub fn is_loaded(&self) -> bool {
        self.path.is_some()
    }

    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_replaces_content_and_path() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("a.txt");
        let second = dir.path().join("b.txt");
        fs::write(&first, "alpha\nbeta\n").unwrap();
        fs::write(&second, "gamma").unwrap();

        let mut store = DocumentStore::new();
        assert!(!store.is_loaded());
        assert_eq!(store.current_content(), "");

        store.load(&first).unwrap();
        assert_eq!(store.current_content(), "alpha\nbeta\n");
        assert_eq!(store.line_count(), 2);

        store.load(&second).unwrap();
        assert_eq!(store.current_path(), Some(second.as_path()));
        assert_eq!(store.current_content(), "gamma");
    }

    #[test]
    fn missing_file_leaves_placeholder_and_records_path() {
        let dir = tempdir().unwrap();
        let existing = dir.path().join("kjv.txt");
        fs::write(&existing, "In the beginning").unwrap();
        let missing = dir.path().join("missing.txt");

        let mut store = DocumentStore::new();
        store.load(&existing).unwrap();
        let err = store.load(&missing).unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.current_path(), Some(missing.as_path()));
        assert!(store.current_content().starts_with("Document not found"));
        assert!(!store.current_content().contains("In the beginning"));
    }

    #[test]
    fn resolved_path_is_absolute_and_stable() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        fs::write(&file, "x").unwrap();

        let first = resolve_document_path(&file);
        let second = resolve_document_path(&file);
        assert!(first.is_absolute());
        assert_eq!(first, second);
    }
}
