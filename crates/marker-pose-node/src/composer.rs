//! Re-expressing camera-relative marker poses in the global frame.

use crate::collab::{FrameLookupError, FrameTree, TimeQuery};
use crate::estimator::CameraRelativePose;
use crate::messages::Pose;
use marker_pose_core::RigidTransform;

/// `global_from_marker = global_from_camera ∘ camera_from_marker`.
///
/// The resulting orientation is renormalized to unit length.
pub fn compose(camera_relative: &CameraRelativePose, global_from_camera: &RigidTransform) -> Pose {
    global_from_camera
        .compose(&camera_relative.to_transform())
        .into()
}

/// Frame names used to look up the camera in the frame tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameComposer {
    pub global_frame: String,
    pub camera_frame: String,
}

impl FrameComposer {
    pub fn new(global_frame: impl Into<String>, camera_frame: impl Into<String>) -> Self {
        Self {
            global_frame: global_frame.into(),
            camera_frame: camera_frame.into(),
        }
    }

    /// Latest available camera pose in the global frame.
    pub fn global_from_camera(
        &self,
        tree: &dyn FrameTree,
    ) -> Result<RigidTransform, FrameLookupError> {
        tree.lookup_transform(&self.global_frame, &self.camera_frame, TimeQuery::Latest)
    }

    /// Look up the camera and compose in one step.
    pub fn to_global(
        &self,
        tree: &dyn FrameTree,
        camera_relative: &CameraRelativePose,
    ) -> Result<Pose, FrameLookupError> {
        let global_from_camera = self.global_from_camera(tree)?;
        Ok(compose(camera_relative, &global_from_camera))
    }
}
