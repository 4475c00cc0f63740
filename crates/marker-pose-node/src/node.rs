//! Per-frame orchestration.

use crate::assembler::{FailureAction, ResultAssembler};
use crate::collab::{FrameSink, FrameTree, MarkerDetector};
use crate::composer::{compose, FrameComposer};
use crate::error::{FrameError, NodeConfigError, PoseFailure};
use crate::estimator::MarkerPoseEstimator;
use crate::image_frame::ImageFrame;
use crate::intrinsics::IntrinsicsStore;
use crate::messages::{CameraInfo, Header, TransformStamped};
use crate::params::NodeParams;
use log::{error, info, warn};
use marker_pose_aruco::DictionaryId;
use marker_pose_core::IntrinsicsError;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Child frame id broadcast for marker `id`.
pub fn marker_frame_id(id: i32) -> String {
    format!("aruco_marker_{id}")
}

/// What a successfully processed frame emitted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameSummary {
    pub detected: usize,
    pub published: usize,
    pub transforms_sent: usize,
    pub skipped: Vec<PoseFailure>,
}

/// Marker pose node: turns images into marker transforms, a marker array
/// in the global frame and an annotated image.
#[derive(Debug)]
pub struct MarkerPoseNode {
    params: NodeParams,
    dictionary: DictionaryId,
    intrinsics: Arc<IntrinsicsStore>,
    estimator: MarkerPoseEstimator,
    composer: FrameComposer,
}

impl MarkerPoseNode {
    /// Validate `params` and build a node waiting for camera info.
    pub fn new(params: NodeParams) -> Result<Self, NodeConfigError> {
        let dictionary = params.validate()?;

        info!("marker_size: {}", params.marker_size);
        info!("camera_frame: {}", params.camera_frame);
        info!("global_frame: {}", params.global_frame);
        info!("image_topic: {}", params.image_topic);
        info!("camera_info_topic: {}", params.camera_info_topic);
        info!("marker_array_topic: {}", params.marker_array_topic);
        info!("result_image_topic: {}", params.result_image_topic);
        info!("dictionary: {}", dictionary);
        info!("failure_policy: {:?}", params.failure_policy);

        Ok(Self {
            dictionary,
            intrinsics: Arc::new(IntrinsicsStore::new()),
            estimator: MarkerPoseEstimator::new(params.refine),
            composer: FrameComposer::new(params.global_frame.clone(), params.camera_frame.clone()),
            params,
        })
    }

    pub fn params(&self) -> &NodeParams {
        &self.params
    }

    pub fn dictionary(&self) -> DictionaryId {
        self.dictionary
    }

    /// Shared handle to the intrinsics, e.g. for a camera-info thread.
    pub fn intrinsics_store(&self) -> Arc<IntrinsicsStore> {
        Arc::clone(&self.intrinsics)
    }

    pub fn on_camera_info(&self, msg: &CameraInfo) -> Result<(), IntrinsicsError> {
        self.intrinsics.update_from_camera_info(msg).inspect_err(|e| {
            warn!("ignoring camera info: {e}");
        })
    }

    /// Process one image.
    ///
    /// For every posed marker a camera-to-marker transform is sent to `sink`
    /// before the camera is looked up in `tree`. The annotated image and the
    /// marker array are published only when the whole frame succeeds; on
    /// error, transforms already sent stay sent.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip_all,
            fields(stamp = frame.header.stamp.as_secs_f64(), frame_id = %frame.header.frame_id)
        )
    )]
    pub fn process_frame(
        &self,
        frame: &ImageFrame,
        detector: &mut dyn MarkerDetector,
        tree: &dyn FrameTree,
        sink: &mut dyn FrameSink,
    ) -> Result<FrameSummary, FrameError> {
        let intrinsics = self.intrinsics.snapshot().inspect_err(|_| {
            info!("waiting for camera info");
        })?;
        let (rgb, encoding) = frame.to_rgb().inspect_err(|e| {
            error!("image conversion failed: {e}");
        })?;

        let batch = detector.detect(&rgb, self.dictionary);
        let edge = self.params.marker_size;
        let poses = self.estimator.estimate(&batch.markers, &intrinsics, edge);

        let stamp = frame.header.stamp;
        let mut assembler = ResultAssembler::new(
            Header::new(stamp, self.params.global_frame.clone()),
            self.params.failure_policy,
            edge,
        );
        let mut transforms_sent = 0;

        for (marker, pose) in batch.markers.iter().zip(poses) {
            let camera_relative = match pose {
                Ok(p) => p,
                Err(failure) => match assembler.reject(failure) {
                    FailureAction::Skipped => continue,
                    FailureAction::Abort(f) => return Err(FrameError::PoseFailure(f)),
                },
            };

            sink.send_transform(TransformStamped {
                header: Header::new(stamp, self.params.camera_frame.clone()),
                child_frame_id: marker_frame_id(marker.id),
                transform: camera_relative.to_transform(),
            });
            transforms_sent += 1;
            info!("detected marker {}", marker.id);

            let global_from_camera = match self.composer.global_from_camera(tree) {
                Ok(t) => t,
                Err(e) => {
                    warn!("frame lookup failed: {e}");
                    return Err(FrameError::FrameLookup {
                        marker_id: marker.id,
                        error: e,
                    });
                }
            };
            let global = compose(&camera_relative, &global_from_camera);
            assembler.accept(marker.id, global, marker.corners[0], camera_relative);
        }

        let result = assembler.finish(rgb, frame.header.clone(), encoding, &intrinsics);
        let summary = FrameSummary {
            detected: batch.markers.len(),
            published: result.markers.markers.len(),
            transforms_sent,
            skipped: result.skipped,
        };
        sink.publish_image(result.image);
        sink.publish_markers(result.markers);
        Ok(summary)
    }
}
