use crate::collab::FrameLookupError;
use crate::image_frame::DecodeError;
use crate::intrinsics::NotReady;
use marker_pose_aruco::DictionaryError;

/// Why pose recovery failed for one marker.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseFailureReason {
    #[error("marker edge length must be finite and > 0")]
    InvalidEdgeLength,
    #[error("corner coordinates are not finite")]
    NonFiniteCorners,
    #[error("corners do not span a plane homography")]
    DegenerateHomography,
    #[error("homography does not decompose into a rigid pose")]
    DegenerateDecomposition,
    #[error("solver produced a non-finite pose")]
    NonFiniteSolution,
}

/// Pose recovery failed for marker `id`.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("pose estimation failed for marker {id}: {reason}")]
pub struct PoseFailure {
    pub id: i32,
    pub reason: PoseFailureReason,
}

/// Invalid node configuration; the node never becomes ready.
#[derive(thiserror::Error, Debug)]
pub enum NodeConfigError {
    #[error(transparent)]
    InvalidDictionary(#[from] DictionaryError),
    #[error("marker_size must be finite and > 0 (got {0})")]
    InvalidMarkerSize(f64),
    #[error("`{0}` must not be empty")]
    EmptyFrameName(&'static str),
}

/// JSON parameter file errors.
#[derive(thiserror::Error, Debug)]
pub enum NodeIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Reasons a frame produced no marker array and no image.
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    NotReady(#[from] NotReady),
    #[error("image conversion failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("frame aborted: {0}")]
    PoseFailure(PoseFailure),
    #[error("frame lookup failed at marker {marker_id}: {error}")]
    FrameLookup {
        marker_id: i32,
        error: FrameLookupError,
    },
}
