use std::collections::BTreeMap;
use std::time::Instant;

/// Observer of per-frame analysis events.
///
/// Lets the CLI print a run summary while tests stay silent, without the
/// analyzer knowing where its events go.
pub trait PipelineLogger: Send {
    /// Artifacts persisted so far against the quota.
    fn progress(&mut self, saved: usize, target: usize);

    /// How long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// What happened to one frame (`"accepted"`, `"off_center"`, ...).
    fn outcome(&mut self, label: &str);

    fn info(&mut self, message: &str);

    /// End-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards every event.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _saved: usize, _target: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn outcome(&mut self, _label: &str) {}
    fn info(&mut self, _message: &str) {}
}

/// Collects timings and outcome counts and reports them through `log`.
///
/// Progress is only logged when the saved count changes.
pub struct StdoutPipelineLogger {
    timings: BTreeMap<String, Vec<f64>>,
    outcomes: BTreeMap<String, usize>,
    start_time: Instant,
    frames: usize,
    last_saved: Option<usize>,
}

impl StdoutPipelineLogger {
    pub fn new() -> Self {
        Self {
            timings: BTreeMap::new(),
            outcomes: BTreeMap::new(),
            start_time: Instant::now(),
            frames: 0,
            last_saved: None,
        }
    }

    /// Formatted summary, or `None` if no frame was observed.
    pub fn summary_string(&self) -> Option<String> {
        if self.frames == 0 && self.timings.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Capture summary ({} frames, {:.1}s total):",
            self.frames,
            elapsed_ms / 1000.0
        )];

        for (stage, durations) in &self.timings {
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = if durations.is_empty() {
                0.0
            } else {
                total_ms / durations.len() as f64
            };
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms"
            ));
        }

        for (label, count) in &self.outcomes {
            lines.push(format!("  {label}: {count}"));
        }

        if self.frames > 0 && elapsed_ms > 0.0 {
            let fps = self.frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn outcome_count(&self, label: &str) -> usize {
        self.outcomes.get(label).copied().unwrap_or(0)
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, saved: usize, target: usize) {
        if self.last_saved == Some(saved) {
            return;
        }
        self.last_saved = Some(saved);
        log::info!("Captured: {saved}/{target}");
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn outcome(&mut self, label: &str) {
        self.frames += 1;
        *self.outcomes.entry(label.to_string()).or_default() += 1;
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
