//! Fiducial marker poses in a global frame.
//!
//! This crate ties the `marker-pose-*` workspace together:
//! - re-exports of the geometry core, the dictionary catalog and the node,
//! - [`StaticFrameTree`], a frame tree built from fixed transforms,
//! - (feature `image`) [`replay`], running recorded sessions through a node,
//! - (feature `cli`) the `marker-pose` binary.
//!
//! ## Quickstart
//!
//! ```no_run
//! use marker_pose::replay::{replay, write_outputs, Recording};
//! use marker_pose::{MarkerPoseNode, NodeParams};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let node = MarkerPoseNode::new(NodeParams::load_json("params.json")?)?;
//! let recording = Recording::load_json("session/recording.json")?;
//! let out = replay(&node, &recording, Path::new("session"))?;
//! write_outputs(Path::new("out"), &out)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `marker_pose::core`: intrinsics, homographies, rigid transforms, logging.
//! - `marker_pose::aruco`: predefined dictionary names.
//! - `marker_pose::node`: pose estimation, frame composition, output assembly.

pub use marker_pose_aruco as aruco;
pub use marker_pose_core as core;
pub use marker_pose_node as node;

pub use marker_pose_aruco::{resolve, DictionaryId};
pub use marker_pose_core::{CameraIntrinsics, RigidTransform};
pub use marker_pose_node::{
    CameraInfo, CollectingSink, FailurePolicy, FrameError, FrameSink, FrameTree, ImageFrame,
    MarkerArray, MarkerDetector, MarkerPoseNode, NodeParams, TransformStamped,
};

mod frame_tree;

pub use frame_tree::StaticFrameTree;

#[cfg(feature = "image")]
pub mod replay;
