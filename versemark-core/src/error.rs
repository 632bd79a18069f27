use std::path::PathBuf;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad user input: empty name, non-numeric line, empty search term.
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("no document loaded")]
    NoDocumentLoaded,
    #[error("bookmark snapshot {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("config file {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Error::Persistence {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
