use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::capture::domain::artifact::Artifact;
use crate::capture::domain::artifact_sink::{ArtifactSink, PersistError};
use crate::capture::domain::capture_session::{CaptureSession, SessionProgress};

/// Result of handing an accepted artifact to the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    /// The persistence buffer already holds a full quota of artifacts.
    BufferFull,
    /// The quota was reached or the session was torn down.
    Closed,
}

/// Completion location plus the consumers waiting for it.
#[derive(Debug, Default)]
struct CompletionState {
    location: Option<PathBuf>,
    /// Set once the session can no longer complete.
    closed: bool,
    listeners: Vec<Sender<PathBuf>>,
}

/// State shared between the analysis thread and the persistence worker.
#[derive(Debug)]
struct Shared {
    demand: AtomicBool,
    cancelled: AtomicBool,
    saved: AtomicUsize,
    failed: AtomicUsize,
    completion: Mutex<CompletionState>,
}

impl Shared {
    fn completion(&self) -> MutexGuard<'_, CompletionState> {
        self.completion
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the location and notifies every listener. Returns false if
    /// the session was closed first.
    fn complete(&self, location: &Path) -> bool {
        let mut state = self.completion();
        if state.closed || state.location.is_some() {
            return false;
        }
        state.location = Some(location.to_path_buf());
        for listener in state.listeners.drain(..) {
            let _ = listener.send(location.to_path_buf());
        }
        true
    }

    /// Disconnects pending listeners; later subscribers only see a
    /// completion that already happened.
    fn close(&self) {
        let mut state = self.completion();
        state.closed = true;
        state.listeners.clear();
    }
}

/// Turns accepted artifacts into exactly `target` persisted files and a
/// single completion event.
///
/// Persistence runs on a dedicated worker thread fed through a bounded
/// buffer of capacity `target`, drained in arrival order. A failed write is
/// logged and not counted; nothing is retried. Once the quota is reached the
/// worker stops, [`needs_captures`](Self::needs_captures) turns false and the
/// output location is delivered exactly once to every completion receiver.
pub struct CaptureOrchestrator {
    artifact_tx: Option<Sender<Artifact>>,
    shared: Arc<Shared>,
    sink: Arc<dyn ArtifactSink>,
    location: PathBuf,
    target: usize,
    worker: Option<JoinHandle<CaptureSession>>,
}

impl CaptureOrchestrator {
    /// Prepares a fresh output location (destroying any previous scratch
    /// contents) and starts the persistence worker.
    pub fn start(target: usize, sink: Arc<dyn ArtifactSink>) -> Result<Self, PersistError> {
        debug_assert!(target > 0, "capture quota must be positive");
        let location = sink.prepare()?;
        log::info!(
            "Capture session started: {target} artifacts into {}",
            location.display()
        );

        let shared = Arc::new(Shared {
            demand: AtomicBool::new(true),
            cancelled: AtomicBool::new(false),
            saved: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            completion: Mutex::new(CompletionState::default()),
        });
        let (artifact_tx, artifact_rx) = crossbeam_channel::bounded(target);

        let worker = spawn_persister(
            CaptureSession::new(target, location.clone()),
            sink.clone(),
            artifact_rx,
            shared.clone(),
        );

        Ok(Self {
            artifact_tx: Some(artifact_tx),
            shared,
            sink,
            location,
            target,
            worker: Some(worker),
        })
    }

    /// True while more artifacts are wanted. Callers skip all gate work
    /// for a frame when this is false.
    pub fn needs_captures(&self) -> bool {
        self.shared.demand.load(Ordering::Acquire)
            && !self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Queues an artifact for persistence without blocking.
    pub fn submit(&self, artifact: Artifact) -> SubmitOutcome {
        let Some(tx) = &self.artifact_tx else {
            return SubmitOutcome::Closed;
        };
        match tx.try_send(artifact) {
            Ok(()) => SubmitOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                log::warn!("Persistence buffer full, dropping accepted frame");
                SubmitOutcome::BufferFull
            }
            Err(TrySendError::Disconnected(_)) => SubmitOutcome::Closed,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.saved_count() >= self.target
    }

    pub fn saved_count(&self) -> usize {
        self.shared.saved.load(Ordering::Acquire)
    }

    /// Persistence attempts that failed and were not counted.
    pub fn failed_count(&self) -> usize {
        self.shared.failed.load(Ordering::Acquire)
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// A fresh receiver of the completion event.
    ///
    /// Every receiver gets the output location once, including receivers
    /// created after the quota was reached. Receivers disconnect without a
    /// value when the session ends incomplete or is aborted.
    pub fn completion(&self) -> Receiver<PathBuf> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut state = self.shared.completion();
        match state.location.clone() {
            Some(location) => {
                let _ = tx.send(location);
            }
            None if !state.closed => state.listeners.push(tx),
            None => {}
        }
        rx
    }

    /// Output location, once the quota has been reached.
    pub fn completed_location(&self) -> Option<PathBuf> {
        self.shared.completion().location.clone()
    }

    /// Blocks until the quota is reached or `timeout` elapses.
    pub fn wait_for_completion(&self, timeout: Duration) -> Option<PathBuf> {
        self.completion().recv_timeout(timeout).ok()
    }

    /// Stops accepting artifacts, lets the worker persist what is already
    /// buffered, and returns the session record.
    pub fn finish(mut self) -> CaptureSession {
        self.artifact_tx = None;
        let session = self.join_worker();
        self.shared.close();
        log::info!(
            "Capture session finished: {}/{} saved, {} failed",
            session.saved_count(),
            self.target,
            self.failed_count()
        );
        session
    }

    /// Tears the session down: pending artifacts are abandoned, no
    /// completion is emitted, and the sink discards partial output.
    pub fn abort(mut self) -> Result<(), PersistError> {
        self.cancel();
        log::info!(
            "Capture session aborted after {} of {} artifacts",
            self.saved_count(),
            self.target
        );
        self.sink.discard()
    }

    fn cancel(&mut self) {
        self.shared.cancelled.store(true, Ordering::Release);
        self.shared.close();
        self.artifact_tx = None;
        self.join_worker();
    }

    fn join_worker(&mut self) -> CaptureSession {
        match self.worker.take().map(JoinHandle::join) {
            Some(Ok(session)) => session,
            Some(Err(_)) => {
                log::error!("Persistence worker panicked");
                CaptureSession::new(self.target, self.location.clone())
            }
            None => CaptureSession::new(self.target, self.location.clone()),
        }
    }
}

impl Drop for CaptureOrchestrator {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel();
        }
    }
}

fn spawn_persister(
    mut session: CaptureSession,
    sink: Arc<dyn ArtifactSink>,
    artifact_rx: Receiver<Artifact>,
    shared: Arc<Shared>,
) -> JoinHandle<CaptureSession> {
    std::thread::spawn(move || {
        for artifact in artifact_rx {
            if shared.cancelled.load(Ordering::Acquire) {
                break;
            }
            let handle = match sink.persist(&artifact) {
                Ok(handle) => handle,
                Err(e) => {
                    shared.failed.fetch_add(1, Ordering::AcqRel);
                    log::warn!("Failed to persist capture: {e}");
                    continue;
                }
            };
            log::debug!("Persisted {}", handle.display());

            match session.record(handle) {
                SessionProgress::InProgress { saved, target } => {
                    shared.saved.store(saved, Ordering::Release);
                    log::info!("Captured {saved}/{target}");
                }
                SessionProgress::Completed => {
                    shared.saved.store(session.saved_count(), Ordering::Release);
                    shared.demand.store(false, Ordering::Release);
                    if shared.complete(session.location()) {
                        log::info!("Capture quota reached: {}", session.location().display());
                    }
                    break;
                }
                SessionProgress::AlreadyComplete => break,
            }
        }
        session
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::shared::frame::Frame;

    /// In-memory sink failing the calls whose index is listed in `fail_on`.
    struct RecordingSink {
        location: PathBuf,
        fail_on: Vec<usize>,
        calls: Mutex<Vec<i64>>,
        discarded: AtomicBool,
    }

    impl RecordingSink {
        fn new(fail_on: Vec<usize>) -> Arc<Self> {
            Arc::new(Self {
                location: PathBuf::from("/captures/session_1"),
                fail_on,
                calls: Mutex::new(Vec::new()),
                discarded: AtomicBool::new(false),
            })
        }

        fn persist_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl ArtifactSink for RecordingSink {
        fn prepare(&self) -> Result<PathBuf, PersistError> {
            Ok(self.location.clone())
        }

        fn persist(&self, artifact: &Artifact) -> Result<PathBuf, PersistError> {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.len();
            calls.push(artifact.timestamp_nanos());
            if self.fail_on.contains(&index) {
                return Err(PersistError::Write {
                    path: self.location.join(format!("{index}.jpg")),
                    source: std::io::Error::other("disk full"),
                });
            }
            Ok(self.location.join(format!("{index}.jpg")))
        }

        fn location(&self) -> &Path {
            &self.location
        }

        fn discard(&self) -> Result<(), PersistError> {
            self.discarded.store(true, Ordering::Release);
            Ok(())
        }
    }

    fn artifact(ts: i64) -> Artifact {
        Artifact::from_frame(&Frame::new(vec![50; 2 * 2 * 3], 2, 2, 3, 0, ts)).unwrap()
    }

    fn wait_until(condition: impl Fn() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(std::time::Instant::now() < deadline, "condition not reached");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_completion_fires_once_at_quota() {
        let sink = RecordingSink::new(vec![]);
        let orchestrator = CaptureOrchestrator::start(3, sink.clone()).unwrap();
        let completion = orchestrator.completion();

        for ts in 0..3 {
            assert_eq!(orchestrator.submit(artifact(ts)), SubmitOutcome::Queued);
        }

        let location = orchestrator
            .wait_for_completion(Duration::from_secs(5))
            .unwrap();
        assert_eq!(location, PathBuf::from("/captures/session_1"));
        assert!(!orchestrator.needs_captures());
        assert!(orchestrator.is_complete());
        assert_eq!(completion.try_recv().unwrap(), location);
        assert!(completion.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(orchestrator.completed_location(), Some(location));

        let session = orchestrator.finish();
        assert_eq!(session.saved_count(), 3);
        assert_eq!(sink.persist_calls(), 3);
    }

    #[test]
    fn test_every_receiver_observes_completion() {
        let sink = RecordingSink::new(vec![]);
        let orchestrator = CaptureOrchestrator::start(1, sink).unwrap();
        let controller = orchestrator.completion();
        let overlay = orchestrator.completion();
        orchestrator.submit(artifact(0));

        let expected = PathBuf::from("/captures/session_1");
        let timeout = Duration::from_secs(5);
        assert_eq!(controller.recv_timeout(timeout).unwrap(), expected);
        assert_eq!(overlay.recv_timeout(timeout).unwrap(), expected);
        assert_eq!(orchestrator.wait_for_completion(timeout), Some(expected.clone()));
        assert_eq!(orchestrator.wait_for_completion(timeout), Some(expected.clone()));

        let late = orchestrator.completion();
        assert_eq!(late.try_recv().unwrap(), expected);
    }

    #[test]
    fn test_incomplete_finish_disconnects_receivers() {
        let sink = RecordingSink::new(vec![]);
        let orchestrator = CaptureOrchestrator::start(3, sink).unwrap();
        let completion = orchestrator.completion();
        orchestrator.submit(artifact(0));

        orchestrator.finish();
        assert!(matches!(
            completion.recv_timeout(Duration::from_secs(1)),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn test_persists_in_arrival_order() {
        let sink = RecordingSink::new(vec![]);
        let orchestrator = CaptureOrchestrator::start(4, sink.clone()).unwrap();
        for ts in [40, 10, 30, 20] {
            orchestrator.submit(artifact(ts));
        }
        orchestrator
            .wait_for_completion(Duration::from_secs(5))
            .unwrap();
        assert_eq!(*sink.calls.lock().unwrap(), vec![40, 10, 30, 20]);
    }

    #[test]
    fn test_failed_persist_is_not_counted() {
        let sink = RecordingSink::new(vec![1]);
        let orchestrator = CaptureOrchestrator::start(2, sink.clone()).unwrap();
        orchestrator.submit(artifact(0));
        orchestrator.submit(artifact(1));

        wait_until(|| sink.persist_calls() == 2);
        wait_until(|| orchestrator.failed_count() == 1);
        assert_eq!(orchestrator.saved_count(), 1);
        assert!(orchestrator.needs_captures());
        assert!(orchestrator
            .wait_for_completion(Duration::from_millis(50))
            .is_none());

        orchestrator.submit(artifact(2));
        assert!(orchestrator
            .wait_for_completion(Duration::from_secs(5))
            .is_some());
        assert_eq!(sink.persist_calls(), 3);
    }

    #[test]
    fn test_submit_after_completion_is_closed() {
        let sink = RecordingSink::new(vec![]);
        let orchestrator = CaptureOrchestrator::start(1, sink.clone()).unwrap();
        orchestrator.submit(artifact(0));
        orchestrator
            .wait_for_completion(Duration::from_secs(5))
            .unwrap();

        wait_until(|| orchestrator.submit(artifact(1)) == SubmitOutcome::Closed);
        assert_eq!(sink.persist_calls(), 1);
    }

    #[test]
    fn test_abort_suppresses_completion_and_discards() {
        let sink = RecordingSink::new(vec![]);
        let orchestrator = CaptureOrchestrator::start(5, sink.clone()).unwrap();
        let completion = orchestrator.completion();
        orchestrator.submit(artifact(0));

        orchestrator.abort().unwrap();
        assert!(sink.discarded.load(Ordering::Acquire));
        assert!(completion.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_finish_without_quota_reports_partial_session() {
        let sink = RecordingSink::new(vec![]);
        let orchestrator = CaptureOrchestrator::start(5, sink.clone()).unwrap();
        orchestrator.submit(artifact(0));
        orchestrator.submit(artifact(1));

        let session = orchestrator.finish();
        assert_eq!(session.saved_count(), 2);
        assert!(!session.is_complete());
    }
}
