//! Records exchanged with the host runtime.
//!
//! These mirror the usual robotics wire types (stamped headers, transforms,
//! camera info) as plain serde structs so any transport can carry them.

use marker_pose_core::{Quaternion, RigidTransform};
use serde::{Deserialize, Serialize};

/// Timestamp as seconds + nanoseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time {
    pub sec: i32,
    pub nanosec: u32,
}

impl Time {
    pub fn new(sec: i32, nanosec: u32) -> Self {
        Self { sec, nanosec }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nanosec as f64 * 1e-9
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

impl Header {
    pub fn new(stamp: Time, frame_id: impl Into<String>) -> Self {
        Self {
            stamp,
            frame_id: frame_id.into(),
        }
    }
}

/// Position + orientation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: [f64; 3],
    pub orientation: Quaternion,
}

impl From<RigidTransform> for Pose {
    fn from(t: RigidTransform) -> Self {
        Self {
            position: t.translation,
            orientation: t.rotation,
        }
    }
}

/// `transform` maps child-frame coordinates into the header's (parent) frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: RigidTransform,
}

/// One marker expressed in the global frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub header: Header,
    pub id: i32,
    pub pose: Pose,
    /// Pixel position of the marker's first detected corner.
    pub pixel_x: f64,
    pub pixel_y: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerArray {
    pub header: Header,
    pub markers: Vec<Marker>,
}

/// Camera calibration as reported by the camera driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub header: Header,
    pub width: u32,
    pub height: u32,
    /// Row-major 3x3 intrinsic matrix.
    pub k: [f64; 9],
    /// Distortion coefficients; may be empty.
    #[serde(default)]
    pub d: Vec<f64>,
}
