//! Contracts with the node's external collaborators.
//!
//! The pose pipeline does not detect markers, store frame trees or own a
//! transport. It talks to those through the traits in this module.

use crate::image_frame::ImageFrame;
use crate::messages::{MarkerArray, Time, TransformStamped};
use image::RgbImage;
use marker_pose_aruco::DictionaryId;
use marker_pose_core::RigidTransform;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// One detected marker: id and its four corners in detector order
/// (top-left, top-right, bottom-right, bottom-left).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarkerRaw {
    pub id: i32,
    pub corners: [Point2<f64>; 4],
}

/// Detector output for one image.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionBatch {
    pub markers: Vec<DetectedMarkerRaw>,
    /// Candidate quads that failed decoding. Not used by the pose pipeline.
    #[serde(default)]
    pub rejected: Vec<[Point2<f64>; 4]>,
}

/// Fiducial detector.
///
/// Precondition on implementors: returned corners are in *undistorted* pixel
/// coordinates. Pose recovery applies the intrinsic matrix only and never
/// reapplies lens distortion.
pub trait MarkerDetector {
    fn detect(&mut self, image: &RgbImage, dictionary: DictionaryId) -> DetectionBatch;
}

/// Detector that replays a fixed batch, e.g. from a recording.
#[derive(Clone, Debug, Default)]
pub struct RecordedDetections(pub DetectionBatch);

impl MarkerDetector for RecordedDetections {
    fn detect(&mut self, _image: &RgbImage, _dictionary: DictionaryId) -> DetectionBatch {
        self.0.clone()
    }
}

/// Which point in time a frame-tree lookup refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeQuery {
    /// Most recent transform available.
    Latest,
    At(Time),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameLookupError {
    #[error("frame `{0}` does not exist")]
    UnknownFrame(String),
    #[error("frames `{target_frame}` and `{source_frame}` are not connected")]
    Disconnected {
        target_frame: String,
        source_frame: String,
    },
    #[error("transform `{target_frame}` <- `{source_frame}` unavailable: {reason}")]
    Unavailable {
        target_frame: String,
        source_frame: String,
        reason: String,
    },
}

/// Frame-graph provider.
pub trait FrameTree {
    /// Transform mapping `source`-frame coordinates into `target`.
    fn lookup_transform(
        &self,
        target: &str,
        source: &str,
        time: TimeQuery,
    ) -> Result<RigidTransform, FrameLookupError>;
}

/// Destination for everything a processed frame emits.
pub trait FrameSink {
    fn send_transform(&mut self, transform: TransformStamped);
    fn publish_markers(&mut self, markers: MarkerArray);
    fn publish_image(&mut self, image: ImageFrame);
}

/// Sink that keeps every output in memory, in emission order per channel.
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    pub transforms: Vec<TransformStamped>,
    pub marker_arrays: Vec<MarkerArray>,
    pub images: Vec<ImageFrame>,
}

impl CollectingSink {
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty() && self.marker_arrays.is_empty() && self.images.is_empty()
    }
}

impl FrameSink for CollectingSink {
    fn send_transform(&mut self, transform: TransformStamped) {
        self.transforms.push(transform);
    }

    fn publish_markers(&mut self, markers: MarkerArray) {
        self.marker_arrays.push(markers);
    }

    fn publish_image(&mut self, image: ImageFrame) {
        self.images.push(image);
    }
}
