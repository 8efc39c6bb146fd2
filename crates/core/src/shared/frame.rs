use std::fmt;

/// Callback that hands a frame's underlying buffer back to its source.
pub type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Dimensions and orientation of a frame, without its pixels.
///
/// Width and height are in sensor orientation; `rotation_degrees` is the
/// clockwise rotation needed to display the frame upright. Only whole
/// quarter turns are meaningful: other angles snap down to the previous
/// multiple of 90.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub rotation_degrees: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32, rotation_degrees: u32) -> Self {
        Self {
            width,
            height,
            rotation_degrees: rotation_degrees / 90 % 4 * 90,
        }
    }

    /// Clockwise quarter turns to upright, in `0..4`.
    pub fn quarter_turns(&self) -> u32 {
        self.rotation_degrees / 90 % 4
    }

    fn is_transposed(&self) -> bool {
        self.quarter_turns() % 2 == 1
    }

    /// Width as seen after applying the rotation.
    pub fn oriented_width(&self) -> u32 {
        if self.is_transposed() {
            self.height
        } else {
            self.width
        }
    }

    /// Height as seen after applying the rotation.
    pub fn oriented_height(&self) -> u32 {
        if self.is_transposed() {
            self.width
        } else {
            self.height
        }
    }

    /// Orientation-independent scale: mean of the raw width and height.
    pub fn stability_scale(&self) -> u32 {
        (self.width + self.height) / 2
    }
}

/// A single camera frame: contiguous pixel bytes in row-major order, in
/// sensor orientation, plus capture metadata.
///
/// The frame may own a release hook that returns its buffer to the frame
/// source. The hook runs exactly once: either through [`Frame::release`] or,
/// failing that, when the frame is dropped.
pub struct Frame {
    data: Vec<u8>,
    geometry: FrameGeometry,
    channels: u8,
    timestamp_nanos: i64,
    release: Option<ReleaseHook>,
}

impl Frame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: u8,
        rotation_degrees: u32,
        timestamp_nanos: i64,
    ) -> Self {
        debug_assert!(
            data.is_empty()
                || data.len() == (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            geometry: FrameGeometry::new(width, height, rotation_degrees),
            channels,
            timestamp_nanos,
            release: None,
        }
    }

    /// A frame whose image payload is unavailable.
    pub fn without_payload(
        width: u32,
        height: u32,
        rotation_degrees: u32,
        timestamp_nanos: i64,
    ) -> Self {
        Self::new(Vec::new(), width, height, 0, rotation_degrees, timestamp_nanos)
    }

    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn has_payload(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.geometry.width
    }

    pub fn height(&self) -> u32 {
        self.geometry.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn rotation_degrees(&self) -> u32 {
        self.geometry.rotation_degrees
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn timestamp_nanos(&self) -> i64 {
        self.timestamp_nanos
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_nanos / 1_000_000
    }

    /// Returns the frame's resources to its source.
    pub fn release(mut self) {
        self.run_release_hook();
    }

    fn run_release_hook(&mut self) {
        if let Some(hook) = self.release.take() {
            hook();
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.run_release_hook();
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("geometry", &self.geometry)
            .field("channels", &self.channels)
            .field("timestamp_nanos", &self.timestamp_nanos)
            .field("payload_bytes", &self.data.len())
            .field("pending_release", &self.release.is_some())
            .finish()
    }
}
