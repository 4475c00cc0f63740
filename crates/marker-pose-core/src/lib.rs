//! Core geometry for fiducial marker pose estimation.
//!
//! This crate is intentionally small and purely geometric. It knows nothing
//! about marker detection, frame trees or image buffers; it only provides the
//! math the pose pipeline is built from:
//! - pinhole camera intrinsics and projection,
//! - 4-point plane homographies,
//! - rigid transforms with unit-quaternion rotations.

mod camera;
mod homography;
mod logger;
mod transform;

pub use camera::{CameraIntrinsics, IntrinsicsError};
pub use homography::{homography_from_4pt, Homography};
pub use transform::{Quaternion, RigidTransform};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
