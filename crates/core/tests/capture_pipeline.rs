use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use autocapture_core::capture::domain::acceptance_gate::{FrameAcceptanceGate, GateDecision};
use autocapture_core::capture::domain::artifact::Artifact;
use autocapture_core::capture::domain::artifact_sink::{ArtifactSink, PersistError};
use autocapture_core::capture::domain::quality_gate::QualityVerdict;
use autocapture_core::capture::infrastructure::gallery::list_captured_images;
use autocapture_core::capture::infrastructure::jpeg_artifact_sink::JpegArtifactSink;
use autocapture_core::detection::domain::detected_face::{BoundingBox, DetectedFace};
use autocapture_core::detection::domain::frame_source::DetectedFrame;
use autocapture_core::detection::infrastructure::scripted_frame_source::ScriptedFrameSource;
use autocapture_core::pipeline::bounds_publisher::BoundsPublisher;
use autocapture_core::pipeline::capture_config::CaptureConfig;
use autocapture_core::pipeline::capture_orchestrator::CaptureOrchestrator;
use autocapture_core::pipeline::capture_runner::{CaptureRunner, RunOutcome};
use autocapture_core::pipeline::frame_analyzer::{FrameAnalyzer, FrameOutcome};
use autocapture_core::pipeline::infrastructure::threaded_capture_runner::ThreadedCaptureRunner;
use autocapture_core::pipeline::pipeline_logger::NullPipelineLogger;
use autocapture_core::shared::frame::Frame;
use autocapture_core::shared::normalized_rect::NormalizedRect;

const SIDE: u32 = 1000;

/// Sink that counts persist calls and fails the ones listed in `fail_on`.
struct CountingSink {
    location: PathBuf,
    fail_on: Vec<usize>,
    calls: AtomicUsize,
}

impl CountingSink {
    fn new(fail_on: Vec<usize>) -> Arc<Self> {
        Arc::new(Self {
            location: PathBuf::from("/captures/session"),
            fail_on,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }
}

impl ArtifactSink for CountingSink {
    fn prepare(&self) -> Result<PathBuf, PersistError> {
        Ok(self.location.clone())
    }

    fn persist(&self, _artifact: &Artifact) -> Result<PathBuf, PersistError> {
        let index = self.calls.fetch_add(1, Ordering::AcqRel);
        let path = self.location.join(format!("image_{index}.jpg"));
        if self.fail_on.contains(&index) {
            return Err(PersistError::Write {
                path,
                source: std::io::Error::other("no space left"),
            });
        }
        Ok(path)
    }

    fn location(&self) -> &Path {
        &self.location
    }
}

/// A centred face covering 30..70% of a 1000x1000 frame, passing every
/// quality criterion.
fn centred_face() -> DetectedFace {
    DetectedFace::new(BoundingBox::new(300, 300, 700, 700))
        .with_smile(0.1)
        .with_eyes_open(0.9, 0.9)
        .with_head_angles(0.0, 0.0, 0.0)
}

fn frame_at(ts_ms: i64, released: &Arc<AtomicUsize>) -> Frame {
    let released = released.clone();
    Frame::new(
        vec![200; (SIDE * SIDE * 3) as usize],
        SIDE,
        SIDE,
        3,
        0,
        ts_ms * 1_000_000,
    )
    .with_release_hook(move || {
        released.fetch_add(1, Ordering::AcqRel);
    })
}

fn analyzer_with(quota: usize, sink: Arc<dyn ArtifactSink>) -> FrameAnalyzer {
    FrameAnalyzer::new(
        FrameAcceptanceGate::default(),
        BoundsPublisher::new(),
        CaptureOrchestrator::start(quota, sink).unwrap(),
        Box::new(NullPipelineLogger),
    )
}

fn feed(
    analyzer: &mut FrameAnalyzer,
    ts_ms: i64,
    faces: Vec<DetectedFace>,
    released: &Arc<AtomicUsize>,
) -> FrameOutcome {
    analyzer.analyze(DetectedFrame::new(frame_at(ts_ms, released), faces))
}

#[test]
fn test_still_face_is_captured_after_dwell() {
    let root = tempfile::tempdir().unwrap();
    let released = Arc::new(AtomicUsize::new(0));
    let mut analyzer = analyzer_with(5, Arc::new(JpegArtifactSink::new(root.path())));

    assert_eq!(
        feed(&mut analyzer, 0, vec![centred_face()], &released),
        FrameOutcome::Rejected(GateDecision::Unsettled)
    );
    assert_eq!(analyzer.gate().stability_state().last_movement_ms, 0);
    assert_eq!(
        feed(&mut analyzer, 500, vec![centred_face()], &released),
        FrameOutcome::Rejected(GateDecision::Unsettled)
    );
    assert_eq!(
        feed(&mut analyzer, 1200, vec![centred_face()], &released),
        FrameOutcome::Captured
    );

    let (orchestrator, _logger) = analyzer.into_parts();
    let location = orchestrator.location().to_path_buf();
    let session = orchestrator.finish();
    assert_eq!(session.saved_count(), 1);
    assert_eq!(list_captured_images(&location).unwrap().len(), 1);
    assert_eq!(released.load(Ordering::Acquire), 3);
}

#[test]
fn test_quota_completes_exactly_once() {
    let root = tempfile::tempdir().unwrap();
    let released = Arc::new(AtomicUsize::new(0));
    let mut analyzer = analyzer_with(5, Arc::new(JpegArtifactSink::new(root.path())));
    let completion = analyzer.orchestrator().completion();

    for ts in [0, 500, 1000, 1100, 1200, 1300, 1400] {
        feed(&mut analyzer, ts, vec![centred_face()], &released);
    }

    let location = completion.recv_timeout(Duration::from_secs(10)).unwrap();
    assert!(completion.recv_timeout(Duration::from_millis(100)).is_err());
    assert_eq!(list_captured_images(&location).unwrap().len(), 5);
    assert!(!analyzer.orchestrator().needs_captures());
}

#[test]
fn test_frames_after_quota_do_not_touch_state_or_sink() {
    let sink = CountingSink::new(vec![]);
    let released = Arc::new(AtomicUsize::new(0));
    let mut analyzer = analyzer_with(2, sink.clone());

    for ts in [0, 1000, 1100] {
        feed(&mut analyzer, ts, vec![centred_face()], &released);
    }
    analyzer
        .orchestrator()
        .wait_for_completion(Duration::from_secs(5))
        .unwrap();
    let state = analyzer.gate().stability_state();

    // an empty frame would normally reset stability
    assert_eq!(feed(&mut analyzer, 2000, vec![], &released), FrameOutcome::Idle);
    assert_eq!(
        feed(&mut analyzer, 3000, vec![centred_face()], &released),
        FrameOutcome::Idle
    );

    assert_eq!(analyzer.gate().stability_state(), state);
    assert_eq!(sink.calls(), 2);
    assert_eq!(released.load(Ordering::Acquire), 5);
}

#[test]
fn test_multiplicity_change_restarts_dwell() {
    let sink = CountingSink::new(vec![]);
    let released = Arc::new(AtomicUsize::new(0));
    let mut analyzer = analyzer_with(5, sink);

    feed(&mut analyzer, 0, vec![centred_face()], &released);
    let outcome = feed(&mut analyzer, 600, vec![centred_face(), centred_face()], &released);
    assert_eq!(
        outcome,
        FrameOutcome::Rejected(GateDecision::Rejected(QualityVerdict::FaceCount(2)))
    );
    assert_eq!(analyzer.gate().stability_state().rect, NormalizedRect::ZERO);

    // the dwell clock restarts from the reappearance at 900ms
    assert_eq!(
        feed(&mut analyzer, 900, vec![centred_face()], &released),
        FrameOutcome::Rejected(GateDecision::Unsettled)
    );
    assert_eq!(
        feed(&mut analyzer, 1200, vec![centred_face()], &released),
        FrameOutcome::Rejected(GateDecision::Unsettled)
    );
    assert_eq!(
        feed(&mut analyzer, 1900, vec![centred_face()], &released),
        FrameOutcome::Captured
    );
}

#[test]
fn test_failed_persistence_is_not_counted() {
    let sink = CountingSink::new(vec![0]);
    let released = Arc::new(AtomicUsize::new(0));
    let mut analyzer = analyzer_with(1, sink.clone());

    feed(&mut analyzer, 0, vec![centred_face()], &released);
    feed(&mut analyzer, 1000, vec![centred_face()], &released);
    assert!(analyzer
        .orchestrator()
        .wait_for_completion(Duration::from_millis(200))
        .is_none());
    assert_eq!(analyzer.orchestrator().failed_count(), 1);
    assert!(analyzer.orchestrator().needs_captures());

    assert_eq!(
        feed(&mut analyzer, 1050, vec![centred_face()], &released),
        FrameOutcome::Captured
    );
    assert!(analyzer
        .orchestrator()
        .wait_for_completion(Duration::from_secs(5))
        .is_some());
    assert_eq!(sink.calls(), 2);
}

#[test]
fn test_scripted_run_writes_quota_to_disk() {
    let root = tempfile::tempdir().unwrap();
    let script: String = (0..20)
        .map(|i| {
            format!(
                concat!(
                    r#"{{"width": 64, "height": 48, "rotation": 90, "timestamp_ms": {}, "#,
                    r#""faces": [{{"bounding_box": {{"left": 12, "top": 16, "right": 36, "bottom": 48}}, "#,
                    r#""smiling_probability": 0.0, "left_eye_open_probability": 1.0, "#,
                    r#""right_eye_open_probability": 1.0}}]}}"#,
                    "\n"
                ),
                i * 100
            )
        })
        .collect();
    let source = ScriptedFrameSource::parse(&script, root.path()).unwrap();
    let released = source.released_counter();

    let config = CaptureConfig {
        capture_quota: 3,
        ..CaptureConfig::default()
    };
    let sink = Arc::new(JpegArtifactSink::new(root.path()).with_quality(config.jpeg_quality));
    let analyzer = FrameAnalyzer::new(
        config.build_gate(),
        BoundsPublisher::new(),
        CaptureOrchestrator::start(config.capture_quota, sink).unwrap(),
        Box::new(NullPipelineLogger),
    );

    let outcome = ThreadedCaptureRunner::default()
        .run(Box::new(source), analyzer, Arc::new(AtomicBool::new(false)))
        .unwrap();

    let (location, artifacts) = match outcome {
        RunOutcome::Completed {
            location,
            artifacts,
        } => (location, artifacts),
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(artifacts.len(), 3);
    let images = list_captured_images(&location).unwrap();
    assert_eq!(images.len(), 3);

    // rotated 90 degrees to upright
    let decoded = image::open(&images[0]).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (48, 64));
    assert!(released.load(Ordering::Acquire) >= 12);
}

#[test]
fn test_aborted_session_discards_output() {
    let root = tempfile::tempdir().unwrap();
    let released = Arc::new(AtomicUsize::new(0));
    let mut analyzer = analyzer_with(5, Arc::new(JpegArtifactSink::new(root.path())));
    let completion = analyzer.orchestrator().completion();

    feed(&mut analyzer, 0, vec![centred_face()], &released);
    feed(&mut analyzer, 1000, vec![centred_face()], &released);

    let (orchestrator, _logger) = analyzer.into_parts();
    let location = orchestrator.location().to_path_buf();
    orchestrator.abort().unwrap();

    assert!(!location.exists());
    assert!(completion.try_recv().is_err());
}
