use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::detection::domain::frame_source::{DetectedFrame, FrameSource};
use crate::pipeline::capture_runner::{CaptureRunner, RunOutcome};
use crate::pipeline::frame_analyzer::FrameAnalyzer;
use crate::shared::latest_channel::{latest_channel, LatestSender};

/// How often the analysis loop wakes up to check for cancellation while
/// no frame arrives.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Hand-off policy between the reader thread and the analysis thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// The reader waits until the analyzer takes each frame.
    #[default]
    Blocking,
    /// A new frame replaces one the analyzer has not started yet; the
    /// replaced frame is released.
    LatestWins,
}

enum Delivery {
    Blocking(Sender<DetectedFrame>),
    LatestWins(LatestSender<DetectedFrame>),
}

impl Delivery {
    /// Returns false once the analysis side has gone away.
    fn deliver(&self, detected: DetectedFrame) -> bool {
        match self {
            Delivery::Blocking(tx) => tx.send(detected).is_ok(),
            Delivery::LatestWins(tx) => {
                if let Some(stale) = tx.send(detected) {
                    log::trace!(
                        "Dropped late frame at {}ms",
                        stale.frame.timestamp_millis()
                    );
                }
                true
            }
        }
    }
}

enum LoopEnd {
    Completed,
    Exhausted,
    Cancelled,
}

/// Runs `reader → analyzer` with the source on its own thread and analysis
/// on the calling thread, so at most one frame is being analysed at a time.
#[derive(Default)]
pub struct ThreadedCaptureRunner {
    policy: DeliveryPolicy,
}

impl ThreadedCaptureRunner {
    pub fn new(policy: DeliveryPolicy) -> Self {
        Self { policy }
    }
}

impl CaptureRunner for ThreadedCaptureRunner {
    fn run(
        &self,
        source: Box<dyn FrameSource>,
        mut analyzer: FrameAnalyzer,
        cancelled: Arc<AtomicBool>,
    ) -> Result<RunOutcome, Box<dyn std::error::Error>> {
        let stop = Arc::new(AtomicBool::new(false));
        let (delivery, frame_rx) = match self.policy {
            DeliveryPolicy::Blocking => {
                let (tx, rx) = crossbeam_channel::bounded(1);
                (Delivery::Blocking(tx), rx)
            }
            DeliveryPolicy::LatestWins => {
                let (tx, rx) = latest_channel();
                (Delivery::LatestWins(tx), rx)
            }
        };

        let reader_handle = spawn_reader(source, delivery, cancelled.clone(), stop.clone());
        let mut end = run_analysis_loop(&mut analyzer, frame_rx, &cancelled);

        stop.store(true, Ordering::Release);
        let reader_result = reader_handle.join();
        // The reader also stops on cancellation, which the loop may have
        // seen only as the end of the source.
        if cancelled.load(Ordering::Acquire) {
            end = LoopEnd::Cancelled;
        }

        let (orchestrator, mut logger) = analyzer.into_parts();
        let outcome = match end {
            LoopEnd::Cancelled => {
                orchestrator.abort()?;
                logger.info("Capture run cancelled, partial output discarded");
                RunOutcome::Cancelled
            }
            LoopEnd::Completed | LoopEnd::Exhausted => {
                let session = orchestrator.finish();
                logger.info(&format!(
                    "Capture run ended with {}/{} artifacts in {}",
                    session.saved_count(),
                    session.target(),
                    session.location().display()
                ));
                if session.is_complete() {
                    RunOutcome::Completed {
                        location: session.location().to_path_buf(),
                        artifacts: session.artifacts().to_vec(),
                    }
                } else {
                    RunOutcome::SourceExhausted {
                        saved: session.saved_count(),
                        target: session.target(),
                    }
                }
            }
        };
        logger.summary();

        match reader_result {
            Ok(mut source) => source.close(),
            Err(_) => return Err("Reader thread panicked".into()),
        }
        Ok(outcome)
    }
}

fn spawn_reader(
    mut source: Box<dyn FrameSource>,
    delivery: Delivery,
    cancelled: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<Box<dyn FrameSource>> {
    std::thread::spawn(move || {
        for item in source.frames() {
            if cancelled.load(Ordering::Relaxed) || stop.load(Ordering::Relaxed) {
                break;
            }
            match item {
                Ok(detected) => {
                    if !delivery.deliver(detected) {
                        break;
                    }
                }
                Err(e) => log::warn!("Skipping unreadable frame: {e}"),
            }
        }
        drop(delivery);
        source
    })
}

/// Feeds frames to the analyzer until the quota is reached, the source
/// ends or the run is cancelled.
fn run_analysis_loop(
    analyzer: &mut FrameAnalyzer,
    frame_rx: Receiver<DetectedFrame>,
    cancelled: &AtomicBool,
) -> LoopEnd {
    loop {
        if cancelled.load(Ordering::Acquire) {
            return LoopEnd::Cancelled;
        }
        if analyzer.orchestrator().is_complete() {
            return LoopEnd::Completed;
        }
        match frame_rx.recv_timeout(POLL_INTERVAL) {
            Ok(detected) => {
                analyzer.analyze(detected);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) if cancelled.load(Ordering::Acquire) => {
                return LoopEnd::Cancelled;
            }
            Err(RecvTimeoutError::Disconnected) => return LoopEnd::Exhausted,
        }
    }
}
