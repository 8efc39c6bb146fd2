use std::time::Instant;

use crate::capture::domain::acceptance_gate::{FrameAcceptanceGate, GateDecision};
use crate::capture::domain::artifact::Artifact;
use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::frame_source::{DetectedFrame, DetectionError};
use crate::pipeline::bounds_publisher::BoundsPublisher;
use crate::pipeline::capture_orchestrator::{CaptureOrchestrator, SubmitOutcome};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::frame::Frame;

/// What the analyzer did with one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame carried no image and was skipped entirely.
    NoPayload,
    DetectionFailed,
    /// The quota is met; no gate work was done.
    Idle,
    Rejected(GateDecision),
    Captured,
    CaptureDropped(SubmitOutcome),
    ConversionFailed,
}

impl FrameOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FrameOutcome::NoPayload => "no_payload",
            FrameOutcome::DetectionFailed => "detection_failed",
            FrameOutcome::Idle => "idle",
            FrameOutcome::Rejected(decision) => decision.reason(),
            FrameOutcome::Captured => "accepted",
            FrameOutcome::CaptureDropped(_) => "dropped",
            FrameOutcome::ConversionFailed => "conversion_failed",
        }
    }
}

/// Per-session analysis context: processes detected frames strictly one at
/// a time on the calling thread.
///
/// Every frame handed to [`analyze`](Self::analyze) is released before it
/// returns, whatever the outcome. No per-frame failure escapes as an error.
pub struct FrameAnalyzer {
    gate: FrameAcceptanceGate,
    bounds: BoundsPublisher,
    orchestrator: CaptureOrchestrator,
    logger: Box<dyn PipelineLogger>,
}

impl FrameAnalyzer {
    pub fn new(
        gate: FrameAcceptanceGate,
        bounds: BoundsPublisher,
        orchestrator: CaptureOrchestrator,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            gate,
            bounds,
            orchestrator,
            logger,
        }
    }

    pub fn analyze(&mut self, detected: DetectedFrame) -> FrameOutcome {
        let DetectedFrame { frame, faces } = detected;
        let outcome = self.process(&frame, faces);
        frame.release();

        self.logger.outcome(outcome.label());
        self.logger
            .progress(self.orchestrator.saved_count(), self.orchestrator.target());
        outcome
    }

    fn process(
        &mut self,
        frame: &Frame,
        faces: Result<Vec<DetectedFace>, DetectionError>,
    ) -> FrameOutcome {
        let timestamp_ms = frame.timestamp_millis();
        if !frame.has_payload() {
            log::debug!("Frame at {timestamp_ms}ms has no image, skipping");
            return FrameOutcome::NoPayload;
        }
        let faces = match faces {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Frame at {timestamp_ms}ms: {e}");
                return FrameOutcome::DetectionFailed;
            }
        };

        let geometry = frame.geometry();
        self.bounds.publish(&faces, &geometry);

        if !self.orchestrator.needs_captures() {
            return FrameOutcome::Idle;
        }

        let started = Instant::now();
        let decision = self.gate.evaluate(&faces, &geometry, timestamp_ms);
        self.logger.timing("gate", elapsed_ms(started));
        if !decision.is_accepted() {
            return FrameOutcome::Rejected(decision);
        }

        let started = Instant::now();
        let artifact = match Artifact::from_frame(frame) {
            Ok(artifact) => artifact,
            Err(e) => {
                log::warn!("Frame at {timestamp_ms}ms could not be converted: {e}");
                return FrameOutcome::ConversionFailed;
            }
        };
        self.logger.timing("convert", elapsed_ms(started));

        match self.orchestrator.submit(artifact) {
            SubmitOutcome::Queued => {
                log::debug!("Frame at {timestamp_ms}ms accepted");
                FrameOutcome::Captured
            }
            other => FrameOutcome::CaptureDropped(other),
        }
    }

    pub fn orchestrator(&self) -> &CaptureOrchestrator {
        &self.orchestrator
    }

    pub fn gate(&self) -> &FrameAcceptanceGate {
        &self.gate
    }

    pub fn bounds(&self) -> &BoundsPublisher {
        &self.bounds
    }

    pub fn into_parts(self) -> (CaptureOrchestrator, Box<dyn PipelineLogger>) {
        (self.orchestrator, self.logger)
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
