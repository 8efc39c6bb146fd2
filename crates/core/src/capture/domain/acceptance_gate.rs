use crate::capture::domain::coordinate_mapper::to_stability_rect;
use crate::capture::domain::quality_gate::{FrameQualityGate, QualityVerdict};
use crate::capture::domain::stability_tracker::{StabilityState, StabilityTracker};
use crate::detection::domain::detected_face::DetectedFace;
use crate::shared::frame::FrameGeometry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Accepted,
    /// The quality check failed; stability was not consulted.
    Rejected(QualityVerdict),
    /// Quality passed but the face has not been still long enough.
    Unsettled,
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            GateDecision::Accepted => "accepted",
            GateDecision::Rejected(verdict) => verdict.reason(),
            GateDecision::Unsettled => "unsettled",
        }
    }
}

/// Quality gate followed by the stability tracker.
///
/// The tracker is reset whenever a frame does not contain exactly one face,
/// and is only fed frames that pass every quality criterion.
#[derive(Debug, Default)]
pub struct FrameAcceptanceGate {
    quality: FrameQualityGate,
    stability: StabilityTracker,
}

impl FrameAcceptanceGate {
    pub fn new(quality: FrameQualityGate, stability: StabilityTracker) -> Self {
        Self { quality, stability }
    }

    pub fn evaluate(
        &mut self,
        faces: &[DetectedFace],
        geometry: &FrameGeometry,
        timestamp_ms: i64,
    ) -> GateDecision {
        let verdict = self.quality.assess(faces, geometry);
        if verdict.resets_stability() {
            self.stability.reset();
        }
        if !verdict.is_acceptable() {
            return GateDecision::Rejected(verdict);
        }

        let rect = to_stability_rect(&faces[0].bounding_box, geometry);
        if self.stability.assess(rect, timestamp_ms) {
            GateDecision::Accepted
        } else {
            GateDecision::Unsettled
        }
    }

    pub fn accept(
        &mut self,
        faces: &[DetectedFace],
        geometry: &FrameGeometry,
        timestamp_ms: i64,
    ) -> bool {
        self.evaluate(faces, geometry, timestamp_ms).is_accepted()
    }

    pub fn stability_state(&self) -> StabilityState {
        self.stability.state()
    }
}
