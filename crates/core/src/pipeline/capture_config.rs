use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::domain::acceptance_gate::FrameAcceptanceGate;
use crate::capture::domain::quality_gate::{FrameQualityGate, QualityCriteria};
use crate::capture::domain::stability_tracker::{StabilityConfig, StabilityTracker};
use crate::shared::constants::{DEFAULT_CAPTURE_QUOTA, DEFAULT_JPEG_QUALITY};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for one capture session.
///
/// Every field has a default, so a config file only needs to name the
/// values it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub capture_quota: usize,
    pub quality: QualityCriteria,
    pub stability: StabilityConfig,
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_quota: DEFAULT_CAPTURE_QUOTA,
            quality: QualityCriteria::default(),
            stability: StabilityConfig::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl CaptureConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CaptureConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let q = &self.quality;
        let s = &self.stability;
        if self.capture_quota == 0 {
            return invalid("capture_quota must be at least 1".to_string());
        }
        if s.movement_tolerance_percent <= 0 {
            return invalid(format!(
                "movement_tolerance_percent must be positive, got {}",
                s.movement_tolerance_percent
            ));
        }
        if s.dwell_threshold_ms < 0 {
            return invalid(format!(
                "dwell_threshold_ms must not be negative, got {}",
                s.dwell_threshold_ms
            ));
        }
        for (name, value) in [
            ("smile_threshold", q.smile_threshold),
            ("eyes_open_threshold", q.eyes_open_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} must be between 0.0 and 1.0, got {value}"));
            }
        }
        if !q.angle_tolerance_deg.is_finite() || q.angle_tolerance_deg < 0.0 {
            return invalid(format!(
                "angle_tolerance_deg must be a non-negative number, got {}",
                q.angle_tolerance_deg
            ));
        }
        if q.center_band_min_percent > q.center_band_max_percent {
            return invalid(format!(
                "center band is inverted: {}..{}",
                q.center_band_min_percent, q.center_band_max_percent
            ));
        }
        if !(0..100).contains(&q.min_face_width_percent) {
            return invalid(format!(
                "min_face_width_percent must be between 0 and 99, got {}",
                q.min_face_width_percent
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return invalid(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            ));
        }
        Ok(())
    }

    /// A fresh acceptance gate with no stability history.
    pub fn build_gate(&self) -> FrameAcceptanceGate {
        FrameAcceptanceGate::new(
            FrameQualityGate::new(self.quality.clone()),
            StabilityTracker::new(self.stability.clone()),
        )
    }
}

fn invalid(message: String) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(message))
}
