//! Node parameters and their JSON representation.

use crate::assembler::FailurePolicy;
use crate::error::{NodeConfigError, NodeIoError};
use crate::estimator::PoseRefineParams;
use marker_pose_aruco::{resolve, DictionaryId};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

fn default_marker_size() -> f64 {
    0.1
}

fn default_camera_frame() -> String {
    "camera_rgb_optical_frame".to_string()
}

fn default_global_frame() -> String {
    "map".to_string()
}

fn default_image_topic() -> String {
    "/camera/color/image_raw".to_string()
}

fn default_camera_info_topic() -> String {
    "/camera/color/camera_info".to_string()
}

fn default_marker_array_topic() -> String {
    "/aruco/markers".to_string()
}

fn default_result_image_topic() -> String {
    "/aruco/result".to_string()
}

fn default_dictionary() -> String {
    "DICT_4X4_1000".to_string()
}

/// Node configuration. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeParams {
    /// Physical marker side length; output translations use the same unit.
    #[serde(default = "default_marker_size")]
    pub marker_size: f64,
    #[serde(default = "default_camera_frame")]
    pub camera_frame: String,
    /// Frame the marker array is expressed in.
    #[serde(default = "default_global_frame")]
    pub global_frame: String,
    #[serde(default = "default_image_topic")]
    pub image_topic: String,
    #[serde(default = "default_camera_info_topic")]
    pub camera_info_topic: String,
    #[serde(default = "default_marker_array_topic")]
    pub marker_array_topic: String,
    /// Annotated image output.
    #[serde(default = "default_result_image_topic")]
    pub result_image_topic: String,
    /// Predefined dictionary name, e.g. `DICT_4X4_1000`.
    #[serde(default = "default_dictionary")]
    pub dictionary: String,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub refine: PoseRefineParams,
}

impl Default for NodeParams {
    fn default() -> Self {
        Self {
            marker_size: default_marker_size(),
            camera_frame: default_camera_frame(),
            global_frame: default_global_frame(),
            image_topic: default_image_topic(),
            camera_info_topic: default_camera_info_topic(),
            marker_array_topic: default_marker_array_topic(),
            result_image_topic: default_result_image_topic(),
            dictionary: default_dictionary(),
            failure_policy: FailurePolicy::default(),
            refine: PoseRefineParams::default(),
        }
    }
}

impl NodeParams {
    /// Load parameters from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, NodeIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write parameters to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), NodeIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check the parameters and resolve the dictionary name.
    pub fn validate(&self) -> Result<DictionaryId, NodeConfigError> {
        if !self.marker_size.is_finite() || self.marker_size <= 0.0 {
            return Err(NodeConfigError::InvalidMarkerSize(self.marker_size));
        }
        if self.camera_frame.is_empty() {
            return Err(NodeConfigError::EmptyFrameName("camera_frame"));
        }
        if self.global_frame.is_empty() {
            return Err(NodeConfigError::EmptyFrameName("global_frame"));
        }
        Ok(resolve(&self.dictionary)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let p: NodeParams = serde_json::from_str("{}").expect("json");
        assert_eq!(p, NodeParams::default());
        assert_eq!(p.marker_size, 0.1);
        assert_eq!(p.camera_frame, "camera_rgb_optical_frame");
        assert_eq!(p.global_frame, "map");
        assert_eq!(p.dictionary, "DICT_4X4_1000");
        assert_eq!(p.failure_policy, FailurePolicy::SkipMarker);
    }

    #[test]
    fn partial_json_overrides_fields() {
        let p: NodeParams = serde_json::from_str(
            r#"{"marker_size": 0.05, "dictionary": "DICT_APRILTAG_36h11", "failure_policy": "abort_frame"}"#,
        )
        .expect("json");
        assert_eq!(p.marker_size, 0.05);
        assert_eq!(p.failure_policy, FailurePolicy::AbortFrame);
        assert_eq!(p.validate().expect("valid"), DictionaryId::AprilTag36h11);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad_dict = NodeParams {
            dictionary: "DICT_9X9_1".into(),
            ..Default::default()
        };
        assert!(matches!(
            bad_dict.validate(),
            Err(NodeConfigError::InvalidDictionary(_))
        ));

        for size in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let p = NodeParams {
                marker_size: size,
                ..Default::default()
            };
            assert!(matches!(
                p.validate(),
                Err(NodeConfigError::InvalidMarkerSize(_))
            ));
        }

        let p = NodeParams {
            global_frame: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            p.validate(),
            Err(NodeConfigError::EmptyFrameName("global_frame"))
        ));
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("params.json");
        let p = NodeParams {
            marker_size: 0.16,
            global_frame: "odom".into(),
            ..Default::default()
        };
        p.write_json(&path).expect("write");
        assert_eq!(NodeParams::load_json(&path).expect("load"), p);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = NodeParams::load_json("/nonexistent/params.json").unwrap_err();
        assert!(matches!(err, NodeIoError::Io(_)));
    }
}
