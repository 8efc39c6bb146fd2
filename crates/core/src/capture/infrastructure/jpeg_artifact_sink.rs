use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use image::codecs::jpeg::JpegEncoder;

use crate::capture::domain::artifact::Artifact;
use crate::capture::domain::artifact_sink::{ArtifactSink, PersistError};
use crate::shared::constants::{DEFAULT_JPEG_QUALITY, SCRATCH_DIR_NAME};

/// Writes artifacts as JPEG files into a per-session directory.
///
/// Layout: `<root>/tmp_photos/session_<millis>/image_<millis>_<seq>.jpg`.
/// The whole `tmp_photos` scratch directory is wiped by [`prepare`], so only
/// the latest session survives.
///
/// [`prepare`]: ArtifactSink::prepare
pub struct JpegArtifactSink {
    scratch_dir: PathBuf,
    session_dir: PathBuf,
    quality: u8,
    sequence: AtomicU64,
}

impl JpegArtifactSink {
    pub fn new(root: &Path) -> Self {
        let scratch_dir = root.join(SCRATCH_DIR_NAME);
        let session_dir = scratch_dir.join(format!("session_{}", unix_millis()));
        Self {
            scratch_dir,
            session_dir,
            quality: DEFAULT_JPEG_QUALITY,
            sequence: AtomicU64::new(0),
        }
    }

    /// JPEG quality, clamped to 1..=100.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    fn next_path(&self) -> PathBuf {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.session_dir
            .join(format!("image_{}_{seq:04}.jpg", unix_millis()))
    }

    fn encode(&self, path: &Path, artifact: &Artifact) -> Result<(), PersistError> {
        let write_error = |source| PersistError::Write {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(write_error)?;
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, self.quality)
            .encode_image(artifact.image())
            .map_err(|source| PersistError::Encode {
                path: path.to_path_buf(),
                source,
            })?;
        writer.flush().map_err(write_error)
    }
}

impl ArtifactSink for JpegArtifactSink {
    fn prepare(&self) -> Result<PathBuf, PersistError> {
        let prepare_error = |source| PersistError::Prepare {
            path: self.scratch_dir.clone(),
            source,
        };
        if self.scratch_dir.exists() {
            fs::remove_dir_all(&self.scratch_dir).map_err(prepare_error)?;
        }
        fs::create_dir_all(&self.session_dir).map_err(prepare_error)?;
        Ok(self.session_dir.clone())
    }

    fn persist(&self, artifact: &Artifact) -> Result<PathBuf, PersistError> {
        let path = self.next_path();
        if let Err(e) = self.encode(&path, artifact) {
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        Ok(path)
    }

    fn location(&self) -> &Path {
        &self.session_dir
    }

    fn discard(&self) -> Result<(), PersistError> {
        if !self.session_dir.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&self.session_dir).map_err(|source| PersistError::Prepare {
            path: self.session_dir.clone(),
            source,
        })
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
