//! Per-frame output assembly: marker array, failure policy and overlay.

use crate::error::PoseFailure;
use crate::estimator::CameraRelativePose;
use crate::image_frame::{ImageEncoding, ImageFrame};
use crate::messages::{Header, Marker, MarkerArray, Pose};
use crate::overlay::draw_axes;
use image::RgbImage;
use log::warn;
use marker_pose_core::CameraIntrinsics;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// What happens to a frame when one of its markers cannot be posed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Drop the failing marker and keep the rest of the frame.
    #[default]
    SkipMarker,
    /// Publish nothing for the frame.
    AbortFrame,
}

/// Outcome of [`ResultAssembler::reject`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureAction {
    Skipped,
    Abort(PoseFailure),
}

/// Everything one frame publishes.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameResult {
    pub markers: MarkerArray,
    pub image: ImageFrame,
    /// Markers dropped under [`FailurePolicy::SkipMarker`].
    pub skipped: Vec<PoseFailure>,
}

/// Collects the markers of one frame.
#[derive(Debug)]
pub struct ResultAssembler {
    header: Header,
    policy: FailurePolicy,
    edge: f64,
    markers: Vec<Marker>,
    posed: Vec<CameraRelativePose>,
    skipped: Vec<PoseFailure>,
}

impl ResultAssembler {
    /// `header` is the marker array header (global frame, frame stamp);
    /// `edge` is the marker side length used for the overlay.
    pub fn new(header: Header, policy: FailurePolicy, edge: f64) -> Self {
        Self {
            header,
            policy,
            edge,
            markers: Vec::new(),
            posed: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Record a successfully posed marker. `first_corner` is the first raw
    /// detector corner, kept as the marker's 2D anchor.
    pub fn accept(
        &mut self,
        id: i32,
        global: Pose,
        first_corner: Point2<f64>,
        camera_relative: CameraRelativePose,
    ) {
        self.markers.push(Marker {
            header: self.header.clone(),
            id,
            pose: global,
            pixel_x: first_corner.x,
            pixel_y: first_corner.y,
        });
        self.posed.push(camera_relative);
    }

    /// Apply the failure policy to a marker whose pose could not be recovered.
    pub fn reject(&mut self, failure: PoseFailure) -> FailureAction {
        warn!("{failure}");
        match self.policy {
            FailurePolicy::SkipMarker => {
                self.skipped.push(failure);
                FailureAction::Skipped
            }
            FailurePolicy::AbortFrame => FailureAction::Abort(failure),
        }
    }

    /// Draw the overlay for every accepted marker and build the frame outputs.
    ///
    /// The output image keeps `image_header` and `encoding` of the input.
    pub fn finish(
        self,
        mut image: RgbImage,
        image_header: Header,
        encoding: ImageEncoding,
        intrinsics: &CameraIntrinsics,
    ) -> FrameResult {
        for pose in &self.posed {
            draw_axes(&mut image, pose, intrinsics, self.edge);
        }
        FrameResult {
            markers: MarkerArray {
                header: self.header,
                markers: self.markers,
            },
            image: ImageFrame::from_rgb(image_header, &image, encoding),
            skipped: self.skipped,
        }
    }
}

/// One marker's contribution to [`assemble`].
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerOutcome {
    pub id: i32,
    pub corners: [Point2<f64>; 4],
    pub pose: Result<(Pose, CameraRelativePose), PoseFailure>,
}

/// Assemble a whole frame at once. Fails with the first pose failure when the
/// policy aborts the frame.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    header: Header,
    outcomes: impl IntoIterator<Item = MarkerOutcome>,
    policy: FailurePolicy,
    edge: f64,
    image: RgbImage,
    image_header: Header,
    encoding: ImageEncoding,
    intrinsics: &CameraIntrinsics,
) -> Result<FrameResult, PoseFailure> {
    let mut assembler = ResultAssembler::new(header, policy, edge);
    for outcome in outcomes {
        match outcome.pose {
            Ok((global, camera_relative)) => {
                assembler.accept(outcome.id, global, outcome.corners[0], camera_relative)
            }
            Err(failure) => {
                if let FailureAction::Abort(f) = assembler.reject(failure) {
                    return Err(f);
                }
            }
        }
    }
    Ok(assembler.finish(image, image_header, encoding, intrinsics))
}
