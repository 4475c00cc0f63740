//! Offline replay of recorded camera streams through a [`MarkerPoseNode`].
//!
//! A recording is a JSON file listing camera info, static transforms and
//! frames. Each frame references an image on disk (relative to the recording)
//! and carries the detections made on it, which stand in for a live detector.

use crate::frame_tree::StaticFrameTree;
use image::RgbImage;
use log::info;
use marker_pose_core::IntrinsicsError;
use marker_pose_node::{
    CameraInfo, CollectingSink, DecodeError, DetectedMarkerRaw, DetectionBatch, FrameError,
    Header, ImageEncoding, ImageFrame, MarkerPoseNode, PoseFailure, RecordedDetections, Time,
    TransformStamped,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("image i/o failed for {}: {source}", path.display())]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error(transparent)]
    CameraInfo(#[from] IntrinsicsError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// One recorded frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub stamp: Time,
    pub frame_id: String,
    /// Relative to the recording file.
    pub image_path: PathBuf,
    #[serde(default)]
    pub markers: Vec<DetectedMarkerRaw>,
}

/// A recorded session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// Applied before the first frame; without it every frame waits.
    #[serde(default)]
    pub camera_info: Option<CameraInfo>,
    #[serde(default)]
    pub static_transforms: Vec<TransformStamped>,
    pub frames: Vec<RecordedFrame>,
}

impl Recording {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReplayError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn frame_tree(&self) -> StaticFrameTree {
        self.static_transforms.iter().cloned().collect()
    }
}

/// Per-frame outcome of a replay.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    pub index: usize,
    pub stamp: Time,
    pub detected: usize,
    pub published: Option<usize>,
    pub skipped: Vec<i32>,
    /// Set when the frame produced no marker array.
    pub error: Option<String>,
}

impl FrameReport {
    fn ok(
        index: usize,
        stamp: Time,
        detected: usize,
        published: usize,
        skipped: &[PoseFailure],
    ) -> Self {
        Self {
            index,
            stamp,
            detected,
            published: Some(published),
            skipped: skipped.iter().map(|f| f.id).collect(),
            error: None,
        }
    }

    fn failed(index: usize, stamp: Time, detected: usize, err: &FrameError) -> Self {
        Self {
            index,
            stamp,
            detected,
            published: None,
            skipped: Vec::new(),
            error: Some(err.to_string()),
        }
    }
}

/// Everything a replay emitted.
#[derive(Clone, Debug, Default)]
pub struct ReplayOutput {
    pub sink: CollectingSink,
    pub frames: Vec<FrameReport>,
}

/// Load an image from disk as a `bgr8` frame, as a camera driver would publish it.
pub fn load_frame(path: &Path, header: Header) -> Result<ImageFrame, ReplayError> {
    let rgb: RgbImage = image::open(path)
        .map_err(|source| ReplayError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    Ok(ImageFrame::from_rgb(header, &rgb, ImageEncoding::Bgr8))
}

/// Feed every frame of `recording` through `node`.
///
/// `base_dir` resolves relative image paths. Frame-level failures are
/// recorded in the report and do not stop the replay.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(frames = recording.frames.len()))
)]
pub fn replay(
    node: &MarkerPoseNode,
    recording: &Recording,
    base_dir: &Path,
) -> Result<ReplayOutput, ReplayError> {
    if let Some(info) = &recording.camera_info {
        node.on_camera_info(info)?;
    }
    let tree = recording.frame_tree();
    let mut out = ReplayOutput::default();

    for (index, rec) in recording.frames.iter().enumerate() {
        let frame = load_frame(
            &base_dir.join(&rec.image_path),
            Header::new(rec.stamp, rec.frame_id.clone()),
        )?;
        let mut detector = RecordedDetections(DetectionBatch {
            markers: rec.markers.clone(),
            rejected: Vec::new(),
        });

        let report = match node.process_frame(&frame, &mut detector, &tree, &mut out.sink) {
            Ok(summary) => FrameReport::ok(
                index,
                rec.stamp,
                summary.detected,
                summary.published,
                &summary.skipped,
            ),
            Err(err) => FrameReport::failed(index, rec.stamp, rec.markers.len(), &err),
        };
        out.frames.push(report);
    }

    info!(
        "replayed {} frames: {} marker arrays, {} transforms",
        out.frames.len(),
        out.sink.marker_arrays.len(),
        out.sink.transforms.len()
    );
    Ok(out)
}

fn write_json_lines<T: Serialize>(path: &Path, items: &[T]) -> Result<(), ReplayError> {
    let mut w = BufWriter::new(fs::File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut w, item)?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(())
}

/// Write replay outputs into `dir`:
/// `transforms.jsonl`, `markers.jsonl`, `frames.json` and one
/// `result_NNNN.png` per annotated image.
pub fn write_outputs(dir: &Path, out: &ReplayOutput) -> Result<Vec<PathBuf>, ReplayError> {
    fs::create_dir_all(dir)?;
    write_json_lines(&dir.join("transforms.jsonl"), &out.sink.transforms)?;
    write_json_lines(&dir.join("markers.jsonl"), &out.sink.marker_arrays)?;
    fs::write(
        dir.join("frames.json"),
        serde_json::to_string_pretty(&out.frames)?,
    )?;

    let mut written = Vec::with_capacity(out.sink.images.len());
    for (i, frame) in out.sink.images.iter().enumerate() {
        let (rgb, _) = frame.to_rgb()?;
        let path = dir.join(format!("result_{i:04}.png"));
        rgb.save(&path).map_err(|source| ReplayError::Image {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }
    Ok(written)
}
