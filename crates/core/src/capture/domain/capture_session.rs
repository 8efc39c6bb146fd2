use std::path::{Path, PathBuf};

/// Progress reported after recording a persisted artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionProgress {
    InProgress { saved: usize, target: usize },
    /// The quota has just been reached. Reported exactly once.
    Completed,
    /// The session was already complete; the artifact was not counted.
    AlreadyComplete,
}

/// Bookkeeping for one capture run: how many artifacts are wanted, which
/// have been persisted, and where they live.
#[derive(Debug)]
pub struct CaptureSession {
    target: usize,
    saved: Vec<PathBuf>,
    location: PathBuf,
}

impl CaptureSession {
    pub fn new(target: usize, location: PathBuf) -> Self {
        debug_assert!(target > 0, "capture quota must be positive");
        Self {
            target,
            saved: Vec::with_capacity(target),
            location,
        }
    }

    pub fn record(&mut self, handle: PathBuf) -> SessionProgress {
        if self.is_complete() {
            return SessionProgress::AlreadyComplete;
        }
        self.saved.push(handle);
        if self.is_complete() {
            SessionProgress::Completed
        } else {
            SessionProgress::InProgress {
                saved: self.saved.len(),
                target: self.target,
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.saved.len() >= self.target
    }

    pub fn remaining(&self) -> usize {
        self.target - self.saved.len()
    }

    pub fn saved_count(&self) -> usize {
        self.saved.len()
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.saved
    }
}
