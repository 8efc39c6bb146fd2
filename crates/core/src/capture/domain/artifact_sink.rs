use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::capture::domain::artifact::Artifact;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to prepare output directory {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Durable storage for accepted artifacts.
///
/// `persist` is called from a dedicated I/O thread, never from the analysis
/// thread; implementations must therefore be shareable.
pub trait ArtifactSink: Send + Sync {
    /// Creates a fresh, empty output location, clearing any previous scratch
    /// contents, and returns it.
    fn prepare(&self) -> Result<PathBuf, PersistError>;

    /// Stores one artifact under a unique name and returns its handle.
    fn persist(&self, artifact: &Artifact) -> Result<PathBuf, PersistError>;

    /// Where artifacts of this session are stored.
    fn location(&self) -> &Path;

    /// Removes whatever the session has stored so far. Default: keep it.
    fn discard(&self) -> Result<(), PersistError> {
        Ok(())
    }
}
