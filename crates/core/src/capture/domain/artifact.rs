use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("frame has no image payload")]
    NoPayload,
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u8),
    #[error("pixel buffer does not match {width}x{height}x{channels}")]
    BufferSize { width: u32, height: u32, channels: u8 },
}

/// An upright RGB image ready to be persisted.
#[derive(Clone, Debug)]
pub struct Artifact {
    image: RgbImage,
    timestamp_nanos: i64,
}

impl Artifact {
    /// Copies the frame's pixels and rotates them upright.
    pub fn from_frame(frame: &Frame) -> Result<Self, ArtifactError> {
        if !frame.has_payload() {
            return Err(ArtifactError::NoPayload);
        }
        let rgb = to_rgb(frame)?;
        let image = match frame.geometry().quarter_turns() {
            1 => image::imageops::rotate90(&rgb),
            2 => image::imageops::rotate180(&rgb),
            3 => image::imageops::rotate270(&rgb),
            _ => rgb,
        };
        Ok(Self {
            image,
            timestamp_nanos: frame.timestamp_nanos(),
        })
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn timestamp_nanos(&self) -> i64 {
        self.timestamp_nanos
    }
}

fn to_rgb(frame: &Frame) -> Result<RgbImage, ArtifactError> {
    let (w, h, c) = (frame.width(), frame.height(), frame.channels());
    let data = frame.data().to_vec();
    let size_error = || ArtifactError::BufferSize {
        width: w,
        height: h,
        channels: c,
    };
    let dynamic = match c {
        1 => DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, data).ok_or_else(size_error)?),
        3 => DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, data).ok_or_else(size_error)?),
        4 => DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, data).ok_or_else(size_error)?),
        other => return Err(ArtifactError::UnsupportedChannels(other)),
    };
    Ok(dynamic.into_rgb8())
}
