//! Latest camera intrinsics, shared between the camera-info and image paths.

use crate::messages::CameraInfo;
use log::info;
use marker_pose_core::{CameraIntrinsics, IntrinsicsError};
use parking_lot::RwLock;
use std::sync::Arc;

/// No camera info has been received yet.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("camera intrinsics not received yet")]
pub struct NotReady;

/// Holder of the current intrinsics snapshot.
///
/// Starts `NotReady`; the first successful update makes it ready for good.
/// Updates swap in a whole new `Arc`, so a snapshot taken by a frame stays
/// consistent while newer calibrations arrive.
#[derive(Debug, Default)]
pub struct IntrinsicsStore {
    current: RwLock<Option<Arc<CameraIntrinsics>>>,
}

impl IntrinsicsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot. Invalid parameters leave the store untouched.
    pub fn update(
        &self,
        k: [f64; 9],
        distortion: &[f64],
        width: u32,
        height: u32,
    ) -> Result<Arc<CameraIntrinsics>, IntrinsicsError> {
        let next = Arc::new(CameraIntrinsics::from_row_major(k, distortion, width, height)?);
        *self.current.write() = Some(Arc::clone(&next));
        Ok(next)
    }

    /// Apply a camera-info message. Logs the calibration on first arrival.
    pub fn update_from_camera_info(&self, msg: &CameraInfo) -> Result<(), IntrinsicsError> {
        let first = !self.is_ready();
        let cam = self.update(msg.k, &msg.d, msg.width, msg.height)?;
        if first {
            info!("received camera info");
            info!(
                "camera info: width={} height={} K={:?} D={:?}",
                cam.width,
                cam.height,
                cam.k_row_major(),
                cam.distortion
            );
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Arc<CameraIntrinsics>, NotReady> {
        self.current.read().clone().ok_or(NotReady)
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }
}
