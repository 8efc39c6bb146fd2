use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;

use clap::Parser;

use autocapture_core::capture::domain::artifact_sink::ArtifactSink;
use autocapture_core::capture::infrastructure::gallery::list_captured_images;
use autocapture_core::capture::infrastructure::jpeg_artifact_sink::JpegArtifactSink;
use autocapture_core::detection::infrastructure::scripted_frame_source::ScriptedFrameSource;
use autocapture_core::pipeline::bounds_publisher::BoundsPublisher;
use autocapture_core::pipeline::capture_config::CaptureConfig;
use autocapture_core::pipeline::capture_orchestrator::CaptureOrchestrator;
use autocapture_core::pipeline::capture_runner::{CaptureRunner, RunOutcome};
use autocapture_core::pipeline::frame_analyzer::FrameAnalyzer;
use autocapture_core::pipeline::infrastructure::threaded_capture_runner::{
    DeliveryPolicy, ThreadedCaptureRunner,
};
use autocapture_core::pipeline::pipeline_logger::StdoutPipelineLogger;

/// Replays a recorded frame script through the auto-capture pipeline.
#[derive(Parser)]
#[command(name = "autocapture")]
struct Cli {
    /// JSON-lines frame script (one detected frame per line).
    script: PathBuf,

    /// Directory under which `tmp_photos/session_<millis>` is created.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// JSON config file; omitted fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of captures that completes the session.
    #[arg(long)]
    quota: Option<usize>,

    /// How long the face must hold still before a capture (milliseconds).
    #[arg(long)]
    dwell_ms: Option<i64>,

    /// Largest per-edge change, in percentage points, that still counts as still.
    #[arg(long)]
    movement_tolerance: Option<i32>,

    /// Replay at the script's own pace and drop frames the analyzer is too busy for.
    #[arg(long)]
    drop_late_frames: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let config = build_config(&cli)?;

    let source =
        ScriptedFrameSource::open(&cli.script)?.with_realtime_pacing(cli.drop_late_frames);
    log::info!(
        "Replaying {} frames from {}",
        source.len(),
        cli.script.display()
    );

    let sink: Arc<dyn ArtifactSink> =
        Arc::new(JpegArtifactSink::new(&cli.output_dir).with_quality(config.jpeg_quality));
    let orchestrator = CaptureOrchestrator::start(config.capture_quota, sink)?;

    let bounds = BoundsPublisher::new();
    let overlay = spawn_overlay_logger(&bounds);

    let analyzer = FrameAnalyzer::new(
        config.build_gate(),
        bounds,
        orchestrator,
        Box::new(StdoutPipelineLogger::new()),
    );
    let policy = if cli.drop_late_frames {
        DeliveryPolicy::LatestWins
    } else {
        DeliveryPolicy::Blocking
    };

    let outcome = ThreadedCaptureRunner::new(policy).run(
        Box::new(source),
        analyzer,
        Arc::new(AtomicBool::new(false)),
    )?;
    // The analyzer owned the last publisher handle; the overlay thread ends
    // once it has been dropped.
    if overlay.join().is_err() {
        log::warn!("Overlay thread panicked");
    }

    report(outcome)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.script.exists() {
        return Err(format!("Frame script not found: {}", cli.script.display()).into());
    }
    if let Some(config) = &cli.config {
        if !config.exists() {
            return Err(format!("Config file not found: {}", config.display()).into());
        }
    }
    if cli.output_dir.exists() && !cli.output_dir.is_dir() {
        return Err(format!(
            "Output path is not a directory: {}",
            cli.output_dir.display()
        )
        .into());
    }
    Ok(())
}

/// Config file (or defaults) with command-line overrides applied.
fn build_config(cli: &Cli) -> Result<CaptureConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => CaptureConfig::load(path)?,
        None => CaptureConfig::default(),
    };
    if let Some(quota) = cli.quota {
        config.capture_quota = quota;
    }
    if let Some(dwell) = cli.dwell_ms {
        config.stability.dwell_threshold_ms = dwell;
    }
    if let Some(tolerance) = cli.movement_tolerance {
        config.stability.movement_tolerance_percent = tolerance;
    }
    config.validate()?;
    Ok(config)
}

/// Logs the face rectangles of each analysed frame, standing in for a
/// preview overlay.
fn spawn_overlay_logger(bounds: &BoundsPublisher) -> JoinHandle<()> {
    let subscription = bounds.subscribe();
    std::thread::spawn(move || {
        while let Ok(rects) = subscription.recv() {
            let described: Vec<String> = rects
                .iter()
                .map(|r| format!("[{},{} {}x{}]", r.left, r.top, r.width(), r.height()))
                .collect();
            log::debug!("overlay: {}", described.join(" "));
        }
    })
}

fn report(outcome: RunOutcome) -> Result<(), Box<dyn std::error::Error>> {
    match outcome {
        RunOutcome::Completed { location, .. } => {
            let images = list_captured_images(&location)?;
            println!("Captured {} images in {}", images.len(), location.display());
            for image in images {
                println!("  {}", image.display());
            }
            Ok(())
        }
        RunOutcome::SourceExhausted { saved, target } => Err(format!(
            "Frame script ended after {saved} of {target} captures"
        )
        .into()),
        RunOutcome::Cancelled => Err("Capture cancelled".into()),
    }
}
