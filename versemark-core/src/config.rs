//! Optional user configuration, read from a TOML file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const SNAPSHOT_FILE: &str = "bookmarks.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the bookmark snapshot lives. Defaults to the platform data dir.
    pub snapshot_path: Option<PathBuf>,
    /// Document opened when none is given and none is remembered.
    pub default_document: Option<PathBuf>,
    /// Tracing filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub highlight: HighlightConfig,
}

/// Colour names for tagged text, as understood by the terminal frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub bookmark: String,
    pub search: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            default_document: None,
            log_filter: "info".to_string(),
            highlight: HighlightConfig::default(),
        }
    }
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            bookmark: "blue".to_string(),
            search: "yellow".to_string(),
        }
    }
}

impl Config {
    pub fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("net", "versemark", "versemark")
    }

    pub fn default_path(dirs: &ProjectDirs) -> PathBuf {
        dirs.config_dir().join("config.toml")
    }

    /// Loads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(Error::Config {
                    path: path.to_path_buf(),
                    source: err.into(),
                })
            }
        };
        toml::from_str(&raw).map_err(|err| Error::Config {
            path: path.to_path_buf(),
            source: err.into(),
        })
    }

    pub fn snapshot_path(&self, dirs: Option<&ProjectDirs>) -> Option<PathBuf> {
        self.snapshot_path
            .clone()
            .or_else(|| dirs.map(|d| d.data_local_dir().join(SNAPSHOT_FILE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.highlight.bookmark, "blue");
    }

    #[test]
    fn partial_file_overrides_some_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "snapshot_path = \"/var/lib/versemark/marks.json\"\n[highlight]\nsearch = \"green\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.snapshot_path(None),
            Some(PathBuf::from("/var/lib/versemark/marks.json"))
        );
        assert_eq!(config.highlight.search, "green");
        assert_eq!(config.highlight.bookmark, "blue");
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "log_filter = [").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config { .. })));
    }
}
