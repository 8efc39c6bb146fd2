use serde::{Deserialize, Serialize};

/// Rectangle edges as integer percentages of a reference dimension.
///
/// Values are not clamped: a bounding box that leaves the frame yields
/// percentages below 0 or above 100.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl NormalizedRect {
    pub const ZERO: NormalizedRect = NormalizedRect {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Largest absolute per-edge difference to `other`.
    pub fn max_edge_delta(&self, other: &NormalizedRect) -> i32 {
        [
            (self.left - other.left).abs(),
            (self.top - other.top).abs(),
            (self.right - other.right).abs(),
            (self.bottom - other.bottom).abs(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}
