use serde::{Deserialize, Serialize};

/// Face bounding box in frame pixel space, before rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
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

    /// Horizontal center, rounded toward negative infinity.
    pub fn center_x(&self) -> i32 {
        (self.left + self.right) >> 1
    }

    /// Vertical center, rounded toward negative infinity.
    pub fn center_y(&self) -> i32 {
        (self.top + self.bottom) >> 1
    }
}

/// One face reported by the upstream detector for a frame.
///
/// Classification probabilities are `None` when the detector could not
/// estimate them. Euler angles are signed degrees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub smiling_probability: Option<f32>,
    #[serde(default)]
    pub left_eye_open_probability: Option<f32>,
    #[serde(default)]
    pub right_eye_open_probability: Option<f32>,
    #[serde(default)]
    pub head_euler_angle_x: f32,
    #[serde(default)]
    pub head_euler_angle_y: f32,
    #[serde(default)]
    pub head_euler_angle_z: f32,
}

impl DetectedFace {
    /// A frontal face with no classification data.
    pub fn new(bounding_box: BoundingBox) -> Self {
        Self {
            bounding_box,
            smiling_probability: None,
            left_eye_open_probability: None,
            right_eye_open_probability: None,
            head_euler_angle_x: 0.0,
            head_euler_angle_y: 0.0,
            head_euler_angle_z: 0.0,
        }
    }

    pub fn with_smile(mut self, probability: f32) -> Self {
        self.smiling_probability = Some(probability);
        self
    }

    pub fn with_eyes_open(mut self, left: f32, right: f32) -> Self {
        self.left_eye_open_probability = Some(left);
        self.right_eye_open_probability = Some(right);
        self
    }

    pub fn with_head_angles(mut self, x: f32, y: f32, z: f32) -> Self {
        self.head_euler_angle_x = x;
        self.head_euler_angle_y = y;
        self.head_euler_angle_z = z;
        self
    }

    pub fn head_angles(&self) -> [f32; 3] {
        [
            self.head_euler_angle_x,
            self.head_euler_angle_y,
            self.head_euler_angle_z,
        ]
    }
}
