use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError, DisplayFromStr, Map, PickFirst};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// On-disk form of the bookmark registry.
///
/// Bookmark lines travel as digit strings (`"line": "5"`) for compatibility
/// with existing snapshot files; integers are accepted on read as well.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    #[serde_as(as = "Map<_, _>")]
    pub bookmarks: Vec<(String, BookmarkRecord)>,
    pub last_position: PositionRecord,
    pub current_file: Option<PathBuf>,
}

/// An unreadable `line` decodes as 0 so the registry drops just that entry.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    #[serde_as(as = "DefaultOnError<PickFirst<(DisplayFromStr, _)>>")]
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub description: Option<String>,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionRecord {
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub file: Option<PathBuf>,
}

pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when no snapshot has been written yet.
    fn load(&self) -> Result<Option<Snapshot>>;
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// The parent directory is created on the first save.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves an unreadable snapshot out of the way so the next save does not
    /// overwrite it.
    fn quarantine(&self) {
        let target = sibling(&self.path, ".corrupt");
        match fs::rename(&self.path, &target) {
            Ok(()) => warn!(from = ?self.path, to = ?target, "moved corrupt snapshot aside"),
            Err(err) => warn!(path = ?self.path, %err, "failed to move corrupt snapshot aside"),
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        let buf = match fs::read_to_string(&self.path) {
            Ok(buf) => buf,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(Error::persistence(&self.path, err)),
        };
        match serde_json::from_str(&buf) {
            Ok(snapshot) => {
                debug!(path = ?self.path, "snapshot loaded");
                Ok(Some(snapshot))
            }
            Err(err) => {
                self.quarantine();
                Err(Error::persistence(&self.path, err))
            }
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let tmp = sibling(&self.path, ".tmp");
        let payload =
            serde_json::to_string_pretty(snapshot).map_err(|err| Error::persistence(&tmp, err))?;
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut file = File::create(&tmp)?;
            file.write_all(payload.as_bytes())?;
            file.flush()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|err| Error::persistence(&self.path, err))?;
        debug!(path = ?self.path, bookmarks = snapshot.bookmarks.len(), "snapshot saved");
        Ok(())
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[derive(Default)]
pub struct MemorySnapshotStore {
    inner: Mutex<Option<Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            inner: Mutex::new(Some(snapshot)),
        }
    }

    pub fn current(&self) -> Option<Snapshot> {
        self.inner.lock().clone()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self.inner.lock().clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.inner.lock() = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Snapshot {
        Snapshot {
            bookmarks: vec![
                (
                    "start".into(),
                    BookmarkRecord {
                        line: 2,
                        description: Some("intro".into()),
                    },
                ),
                (
                    "exodus".into(),
                    BookmarkRecord {
                        line: 1533,
                        description: None,
                    },
                ),
            ],
            last_position: PositionRecord {
                line: Some(2),
                column: Some(0),
                file: Some(PathBuf::from("/srv/texts/kjv.txt")),
            },
            current_file: Some(PathBuf::from("/srv/texts/kjv.txt")),
        }
    }

    #[test]
    fn wire_format_keeps_string_lines_and_order() {
        let json = serde_json::to_string_pretty(&sample()).unwrap();
        insta::assert_snapshot!(json, @r###"
        {
          "bookmarks": {
            "start": {
              "line": "2",
              "description": "intro"
            },
            "exodus": {
              "line": "1533",
              "description": null
            }
          },
          "last_position": {
            "line": 2,
            "column": 0,
            "file": "/srv/texts/kjv.txt"
          },
          "current_file": "/srv/texts/kjv.txt"
        }
        "###);
    }

    #[test]
    fn reads_legacy_snapshot_shapes() {
        let legacy = r#"{
            "bookmarks": {"z": {"line": "5", "description": "five"}, "a": {"line": 7}},
            "last_position": {"line": "5", "column": 0, "file": "/srv/kjv.txt"},
            "current_file": "/srv/kjv.txt"
        }"#;
        let snapshot: Snapshot = serde_json::from_str(legacy).unwrap();
        assert_eq!(snapshot.bookmarks[0].0, "z");
        assert_eq!(snapshot.bookmarks[0].1.line, 5);
        assert_eq!(snapshot.bookmarks[1].0, "a");
        assert_eq!(snapshot.bookmarks[1].1.line, 7);
        assert_eq!(snapshot.bookmarks[1].1.description, None);
        assert_eq!(snapshot.last_position.line, Some(5));

        let bare: Snapshot =
            serde_json::from_str(r#"{"last_position": {"line": null, "column": null}}"#).unwrap();
        assert_eq!(bare, Snapshot::default());
    }

    #[test]
    fn file_store_round_trips() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("state").join("bookmarks.json"));
        assert!(store.load().unwrap().is_none());

        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));
        assert!(!sibling(store.path(), ".tmp").exists());
    }

    #[test]
    fn malformed_snapshot_is_reported_and_moved_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bookmarks.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileSnapshotStore::new(path.clone());
        assert!(matches!(store.load(), Err(Error::Persistence { .. })));
        assert!(!path.exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("bookmarks.json.corrupt")).unwrap(),
            "{ not json"
        );
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn zero_string_line_still_parses_for_later_validation() {
        let snapshot: Snapshot =
            serde_json::from_str(r#"{"bookmarks": {"x": {"line": "0", "description": ""}}}"#)
                .unwrap();
        assert_eq!(snapshot.bookmarks[0].1.line, 0);
    }

    #[test]
    fn unreadable_line_drops_only_that_bookmark() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{"bookmarks": {
                "broken": {"line": "abc", "description": "x"},
                "negative": {"line": -3},
                "unset": {"description": "no line"},
                "kept": {"line": "4", "description": null}
            }}"#,
        )
        .unwrap();
        assert_eq!(snapshot.bookmarks.len(), 4);
        assert_eq!(snapshot.bookmarks[0].1.line, 0);

        let registry = crate::BookmarkRegistry::from_snapshot(snapshot);
        assert_eq!(registry.names(), vec!["kept"]);
        assert_eq!(registry.get("kept").map(|b| b.line), Some(4));
    }

    #[test]
    fn directory_is_created_on_save_and_failure_surfaces_there() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested").join("bookmarks.json"));
        assert!(!dir.path().join("nested").exists());
        store.save(&sample()).unwrap();
        assert!(dir.path().join("nested").is_dir());

        fs::write(dir.path().join("blocker"), "").unwrap();
        let blocked = FileSnapshotStore::new(dir.path().join("blocker/sub/bookmarks.json"));
        assert!(matches!(
            blocked.save(&sample()),
            Err(Error::Persistence { .. })
        ));
    }
}
