use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::frame_source::{DetectedFrame, DetectionError, FrameSource};
use crate::shared::frame::Frame;

/// Grey level used for frames that carry no image file.
const PLACEHOLDER_LEVEL: u8 = 128;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("failed to read frame script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid frame on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("rotation on line {line} must be 0, 90, 180 or 270, got {rotation}")]
    Rotation { line: usize, rotation: u32 },
    #[error("frame on line {line} has zero width or height")]
    EmptyFrame { line: usize },
    #[error("failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image {path} is {actual:?}, frame declares {declared:?}")]
    DimensionMismatch {
        path: PathBuf,
        actual: (u32, u32),
        declared: (u32, u32),
    },
}

/// One line of a frame script.
#[derive(Debug, Deserialize)]
struct ScriptedFrame {
    width: u32,
    height: u32,
    #[serde(default)]
    rotation: u32,
    timestamp_ms: i64,
    #[serde(default)]
    image: Option<PathBuf>,
    #[serde(default)]
    no_payload: bool,
    #[serde(default)]
    faces: Vec<DetectedFace>,
    #[serde(default)]
    detection_error: Option<String>,
}

/// Replays a recorded JSON-lines frame script as a live frame source.
///
/// Each non-empty line describes one frame: raw dimensions, rotation,
/// timestamp in milliseconds and the faces the detector reported. Frames
/// may reference an image file (relative to the script) for their pixels;
/// otherwise a flat grey payload is synthesised. `no_payload` and
/// `detection_error` reproduce the upstream failure modes.
pub struct ScriptedFrameSource {
    frames: Vec<ScriptedFrame>,
    base_dir: PathBuf,
    released: Arc<AtomicUsize>,
    realtime: bool,
}

impl ScriptedFrameSource {
    /// Reads and validates a frame script from disk.
    pub fn open(path: &Path) -> Result<Self, ScriptError> {
        let text = fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Self::parse(&text, &base_dir)
    }

    /// Parses script text; image paths resolve against `base_dir`.
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self, ScriptError> {
        let mut frames = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let frame: ScriptedFrame =
                serde_json::from_str(trimmed).map_err(|source| ScriptError::Parse { line, source })?;
            if frame.rotation % 90 != 0 || frame.rotation >= 360 {
                return Err(ScriptError::Rotation {
                    line,
                    rotation: frame.rotation,
                });
            }
            if frame.width == 0 || frame.height == 0 {
                return Err(ScriptError::EmptyFrame { line });
            }
            frames.push(frame);
        }
        Ok(Self {
            frames,
            base_dir: base_dir.to_path_buf(),
            released: Arc::new(AtomicUsize::new(0)),
            realtime: false,
        })
    }

    /// Delivers frames at the pace of their timestamps instead of as fast
    /// as the consumer pulls them.
    pub fn with_realtime_pacing(mut self, enabled: bool) -> Self {
        self.realtime = enabled;
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Shared counter of frames whose release hook has run.
    pub fn released_counter(&self) -> Arc<AtomicUsize> {
        self.released.clone()
    }
}

impl FrameSource for ScriptedFrameSource {
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<DetectedFrame, Box<dyn std::error::Error>>> + '_> {
        let base_dir = self.base_dir.clone();
        let released = self.released.clone();
        let realtime = self.realtime;
        let mut previous_ms: Option<i64> = None;
        Box::new(self.frames.drain(..).map(move |scripted| {
            if realtime {
                if let Some(previous) = previous_ms {
                    let gap = (scripted.timestamp_ms - previous).max(0) as u64;
                    std::thread::sleep(Duration::from_millis(gap));
                }
                previous_ms = Some(scripted.timestamp_ms);
            }
            build_frame(scripted, &base_dir, &released)
                .map_err(|e| -> Box<dyn std::error::Error> { Box::new(e) })
        }))
    }

    fn close(&mut self) {
        self.frames.clear();
    }
}

fn build_frame(
    scripted: ScriptedFrame,
    base_dir: &Path,
    released: &Arc<AtomicUsize>,
) -> Result<DetectedFrame, ScriptError> {
    let timestamp_nanos = scripted.timestamp_ms * 1_000_000;
    let frame = if scripted.no_payload {
        Frame::without_payload(
            scripted.width,
            scripted.height,
            scripted.rotation,
            timestamp_nanos,
        )
    } else {
        let data = match &scripted.image {
            Some(relative) => load_pixels(&base_dir.join(relative), &scripted)?,
            None => vec![PLACEHOLDER_LEVEL; rgb_len(scripted.width, scripted.height)],
        };
        Frame::new(
            data,
            scripted.width,
            scripted.height,
            3,
            scripted.rotation,
            timestamp_nanos,
        )
    };

    let counter = released.clone();
    let frame = frame.with_release_hook(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    Ok(match scripted.detection_error {
        Some(message) => DetectedFrame::failed(frame, DetectionError(message)),
        None => DetectedFrame::new(frame, scripted.faces),
    })
}

/// Byte length of an RGB buffer, computed in `usize` so large declared
/// dimensions cannot wrap.
fn rgb_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

fn load_pixels(path: &Path, scripted: &ScriptedFrame) -> Result<Vec<u8>, ScriptError> {
    let img = image::open(path)
        .map_err(|source| ScriptError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    if img.dimensions() != (scripted.width, scripted.height) {
        return Err(ScriptError::DimensionMismatch {
            path: path.to_path_buf(),
            actual: img.dimensions(),
            declared: (scripted.width, scripted.height),
        });
    }
    Ok(img.into_raw())
}
