//! Fiducial marker pose pipeline.
//!
//! Given an image, the latest camera intrinsics and a frame tree, a
//! [`MarkerPoseNode`] produces for every detected marker:
//! - a camera-to-marker transform broadcast to the [`FrameSink`],
//! - a [`Marker`] record with its pose in the global frame,
//!
//! plus an annotated copy of the image with an axis overlay per marker.
//!
//! Detection, frame-tree storage and transport stay outside this crate and
//! are reached through the traits in [`collab`].
//!
//! ## Quickstart
//!
//! ```no_run
//! use marker_pose_node::{
//!     CameraInfo, CollectingSink, FrameTree, ImageFrame, MarkerPoseNode, NodeParams,
//!     RecordedDetections,
//! };
//!
//! # fn run(info: CameraInfo, frame: ImageFrame, tree: &dyn FrameTree) -> Result<(), Box<dyn std::error::Error>> {
//! let node = MarkerPoseNode::new(NodeParams::default())?;
//! node.on_camera_info(&info)?;
//!
//! let mut detector = RecordedDetections::default();
//! let mut sink = CollectingSink::default();
//! let summary = node.process_frame(&frame, &mut detector, tree, &mut sink)?;
//! println!("published {} markers", summary.published);
//! # Ok(())
//! # }
//! ```

mod assembler;
pub mod collab;
mod composer;
mod error;
mod estimator;
mod image_frame;
mod intrinsics;
mod messages;
mod node;
mod overlay;
mod params;

pub use assembler::{
    assemble, FailureAction, FailurePolicy, FrameResult, MarkerOutcome, ResultAssembler,
};
pub use collab::{
    CollectingSink, DetectedMarkerRaw, DetectionBatch, FrameLookupError, FrameSink, FrameTree,
    MarkerDetector, RecordedDetections, TimeQuery,
};
pub use composer::{compose, FrameComposer};
pub use error::{FrameError, NodeConfigError, NodeIoError, PoseFailure, PoseFailureReason};
pub use estimator::{
    marker_object_points, CameraRelativePose, MarkerPoseEstimator, PoseRefineParams,
};
pub use image_frame::{DecodeError, ImageEncoding, ImageFrame};
pub use intrinsics::{IntrinsicsStore, NotReady};
pub use messages::{CameraInfo, Header, Marker, MarkerArray, Pose, Time, TransformStamped};
pub use node::{marker_frame_id, FrameSummary, MarkerPoseNode};
pub use overlay::{draw_axes, project_axes, AxisProjection};
pub use params::NodeParams;
