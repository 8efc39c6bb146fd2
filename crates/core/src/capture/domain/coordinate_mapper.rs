//! Conversions from detector pixel space to integer percentages.

use crate::detection::domain::detected_face::BoundingBox;
use crate::shared::frame::FrameGeometry;
use crate::shared::normalized_rect::NormalizedRect;

/// `value` as an integer percentage of `scale`, truncated toward zero.
pub fn percent_of(value: i32, scale: u32) -> i32 {
    debug_assert!(scale > 0, "percentage scale must be positive");
    (value as i64 * 100 / scale as i64) as i32
}

/// Bounding box relative to the orientation-adjusted frame size.
///
/// Horizontal edges are scaled by the oriented width, vertical edges by the
/// oriented height. The box itself is not rotated.
pub fn to_oriented_rect(bounds: &BoundingBox, geometry: &FrameGeometry) -> NormalizedRect {
    let width = geometry.oriented_width();
    let height = geometry.oriented_height();
    NormalizedRect::new(
        percent_of(bounds.left, width),
        percent_of(bounds.top, height),
        percent_of(bounds.right, width),
        percent_of(bounds.bottom, height),
    )
}

/// Bounding box relative to the orientation-independent stability scale,
/// `(raw_width + raw_height) / 2`, used for all four edges.
pub fn to_stability_rect(bounds: &BoundingBox, geometry: &FrameGeometry) -> NormalizedRect {
    let scale = geometry.stability_scale();
    NormalizedRect::new(
        percent_of(bounds.left, scale),
        percent_of(bounds.top, scale),
        percent_of(bounds.right, scale),
        percent_of(bounds.bottom, scale),
    )
}
