use serde::{Deserialize, Serialize};

use crate::capture::domain::coordinate_mapper::percent_of;
use crate::detection::domain::detected_face::DetectedFace;
use crate::shared::constants::{
    DEFAULT_ANGLE_TOLERANCE_DEG, DEFAULT_CENTER_BAND_MAX_PERCENT, DEFAULT_CENTER_BAND_MIN_PERCENT,
    DEFAULT_EYES_OPEN_THRESHOLD, DEFAULT_MIN_FACE_WIDTH_PERCENT, DEFAULT_SMILE_THRESHOLD,
};
use crate::shared::frame::FrameGeometry;

/// Thresholds a single face must meet for its frame to be worth keeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityCriteria {
    /// Smiling probability must stay strictly below this.
    pub smile_threshold: f32,
    /// Both eye-open probabilities must be strictly above this.
    pub eyes_open_threshold: f32,
    /// Every head Euler angle must lie within `±angle_tolerance_deg`.
    pub angle_tolerance_deg: f32,
    pub center_band_min_percent: i32,
    pub center_band_max_percent: i32,
    /// Face width, as a percentage of the oriented frame width, must exceed this.
    pub min_face_width_percent: i32,
}

impl Default for QualityCriteria {
    fn default() -> Self {
        Self {
            smile_threshold: DEFAULT_SMILE_THRESHOLD,
            eyes_open_threshold: DEFAULT_EYES_OPEN_THRESHOLD,
            angle_tolerance_deg: DEFAULT_ANGLE_TOLERANCE_DEG,
            center_band_min_percent: DEFAULT_CENTER_BAND_MIN_PERCENT,
            center_band_max_percent: DEFAULT_CENTER_BAND_MAX_PERCENT,
            min_face_width_percent: DEFAULT_MIN_FACE_WIDTH_PERCENT,
        }
    }
}

/// Outcome of the per-frame quality check, naming the first failed criterion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QualityVerdict {
    Acceptable,
    /// Not exactly one face in the frame.
    FaceCount(usize),
    Smiling,
    EyesClosed,
    HeadTurned,
    OffCenter,
    TooSmall,
}

impl QualityVerdict {
    pub fn is_acceptable(&self) -> bool {
        matches!(self, QualityVerdict::Acceptable)
    }

    /// Whether accumulated stability must be discarded after this verdict.
    pub fn resets_stability(&self) -> bool {
        matches!(self, QualityVerdict::FaceCount(_))
    }

    pub fn reason(&self) -> &'static str {
        match self {
            QualityVerdict::Acceptable => "acceptable",
            QualityVerdict::FaceCount(0) => "no_face",
            QualityVerdict::FaceCount(_) => "multiple_faces",
            QualityVerdict::Smiling => "smiling",
            QualityVerdict::EyesClosed => "eyes_closed",
            QualityVerdict::HeadTurned => "head_turned",
            QualityVerdict::OffCenter => "off_center",
            QualityVerdict::TooSmall => "too_small",
        }
    }
}

/// Stateless check of expression, gaze, pose and framing.
///
/// Criteria are evaluated in order and the first failure is reported, so a
/// frame is only ever charged with one reason.
#[derive(Clone, Debug, Default)]
pub struct FrameQualityGate {
    criteria: QualityCriteria,
}

impl FrameQualityGate {
    pub fn new(criteria: QualityCriteria) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &QualityCriteria {
        &self.criteria
    }

    pub fn assess(&self, faces: &[DetectedFace], geometry: &FrameGeometry) -> QualityVerdict {
        match faces {
            [face] => self.assess_face(face, geometry),
            _ => QualityVerdict::FaceCount(faces.len()),
        }
    }

    fn assess_face(&self, face: &DetectedFace, geometry: &FrameGeometry) -> QualityVerdict {
        if !self.is_neutral(face) {
            QualityVerdict::Smiling
        } else if !self.eyes_open(face) {
            QualityVerdict::EyesClosed
        } else if !self.faces_camera(face) {
            QualityVerdict::HeadTurned
        } else {
            self.assess_framing(face, geometry)
        }
    }

    fn is_neutral(&self, face: &DetectedFace) -> bool {
        face.smiling_probability.unwrap_or(0.0) < self.criteria.smile_threshold
    }

    fn eyes_open(&self, face: &DetectedFace) -> bool {
        let threshold = self.criteria.eyes_open_threshold;
        face.left_eye_open_probability.unwrap_or(1.0) > threshold
            && face.right_eye_open_probability.unwrap_or(1.0) > threshold
    }

    fn faces_camera(&self, face: &DetectedFace) -> bool {
        let tolerance = self.criteria.angle_tolerance_deg;
        let angles = face.head_angles();
        log::debug!(
            "Face angles: X {}, Y {}, Z {}",
            angles[0],
            angles[1],
            angles[2]
        );
        angles
            .iter()
            .all(|angle| (-tolerance..=tolerance).contains(angle))
    }

    fn assess_framing(&self, face: &DetectedFace, geometry: &FrameGeometry) -> QualityVerdict {
        let bounds = &face.bounding_box;
        let width = geometry.oriented_width();
        let height = geometry.oriented_height();

        let center_x = percent_of(bounds.center_x(), width);
        let center_y = percent_of(bounds.center_y(), height);
        let face_width = percent_of(bounds.width(), width);
        let face_height = percent_of(bounds.height(), height);
        log::debug!("Face center: x {center_x}, y {center_y}; size: w {face_width}, h {face_height}");

        let band = self.criteria.center_band_min_percent..=self.criteria.center_band_max_percent;
        if !band.contains(&center_x) || !band.contains(&center_y) {
            QualityVerdict::OffCenter
        } else if face_width <= self.criteria.min_face_width_percent {
            QualityVerdict::TooSmall
        } else {
            QualityVerdict::Acceptable
        }
    }
}
