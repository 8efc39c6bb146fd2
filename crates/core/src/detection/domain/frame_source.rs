use thiserror::Error;

use crate::detection::domain::detected_face::DetectedFace;
use crate::shared::frame::Frame;

/// The upstream detector failed on one frame.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("face detection failed: {0}")]
pub struct DetectionError(pub String);

/// A frame paired with the detector's verdict for it.
#[derive(Debug)]
pub struct DetectedFrame {
    pub frame: Frame,
    pub faces: Result<Vec<DetectedFace>, DetectionError>,
}

impl DetectedFrame {
    pub fn new(frame: Frame, faces: Vec<DetectedFace>) -> Self {
        Self {
            frame,
            faces: Ok(faces),
        }
    }

    pub fn failed(frame: Frame, error: DetectionError) -> Self {
        Self {
            frame,
            faces: Err(error),
        }
    }
}

/// Delivers detected frames one at a time.
///
/// The consumer owns each delivered [`Frame`] and is responsible for
/// releasing it; dropping a frame releases it as well.
pub trait FrameSource: Send {
    /// Returns an iterator over frames in capture order.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<DetectedFrame, Box<dyn std::error::Error>>> + '_>;

    /// Releases any resources held by the source.
    fn close(&mut self);
}
