use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::detection::domain::frame_source::FrameSource;
use crate::pipeline::frame_analyzer::FrameAnalyzer;

/// How a finished run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The quota was reached.
    Completed {
        location: PathBuf,
        artifacts: Vec<PathBuf>,
    },
    /// The source ran dry before the quota was reached.
    SourceExhausted { saved: usize, target: usize },
    /// The run was torn down; partial output was discarded.
    Cancelled,
}

/// Abstracts how frames are moved from a source through the analyzer.
///
/// This is a port. Infrastructure provides the concrete threading model.
pub trait CaptureRunner: Send {
    fn run(
        &self,
        source: Box<dyn FrameSource>,
        analyzer: FrameAnalyzer,
        cancelled: Arc<AtomicBool>,
    ) -> Result<RunOutcome, Box<dyn std::error::Error>>;
}
