/// Accepted frames that must be persisted before a session completes.
pub const DEFAULT_CAPTURE_QUOTA: usize = 5;

/// Per-edge change, in percentage points, still considered "not moving".
pub const DEFAULT_MOVEMENT_TOLERANCE_PERCENT: i32 = 5;

/// Contiguous stillness required before a frame is accepted.
pub const DEFAULT_DWELL_THRESHOLD_MS: i64 = 1000;

pub const DEFAULT_SMILE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_EYES_OPEN_THRESHOLD: f32 = 0.8;
pub const DEFAULT_ANGLE_TOLERANCE_DEG: f32 = 5.0;
pub const DEFAULT_CENTER_BAND_MIN_PERCENT: i32 = 45;
pub const DEFAULT_CENTER_BAND_MAX_PERCENT: i32 = 55;
pub const DEFAULT_MIN_FACE_WIDTH_PERCENT: i32 = 30;

pub const DEFAULT_JPEG_QUALITY: u8 = 100;

/// Scratch directory wiped at the start of every capture session.
pub const SCRATCH_DIR_NAME: &str = "tmp_photos";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
