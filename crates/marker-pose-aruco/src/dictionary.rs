//! Dictionary identifiers and metadata.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Configuration string did not name a known dictionary.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DictionaryError {
    #[error("invalid dictionary `{name}`")]
    Unknown { name: String },
}

/// Pattern family of a dictionary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictionaryFamily {
    Aruco,
    ArucoOriginal,
    AprilTag,
}

/// Static description of a predefined dictionary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DictionaryInfo {
    /// Configuration name, e.g. `DICT_4X4_1000`.
    pub name: &'static str,
    pub family: DictionaryFamily,
    /// Marker side length (number of inner bits per side).
    pub marker_size: usize,
    /// Number of distinct marker ids.
    pub size: usize,
    /// Maximum error-correcting Hamming distance supported by the dictionary.
    pub max_correction_bits: u8,
}

/// One of the predefined dictionaries a detector may be configured with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DictionaryId {
    Dict4x4_50,
    Dict4x4_100,
    Dict4x4_250,
    Dict4x4_1000,
    Dict5x5_50,
    Dict5x5_100,
    Dict5x5_250,
    Dict5x5_1000,
    Dict6x6_50,
    Dict6x6_100,
    Dict6x6_250,
    Dict6x6_1000,
    Dict7x7_50,
    Dict7x7_100,
    Dict7x7_250,
    Dict7x7_1000,
    ArucoOriginal,
    AprilTag16h5,
    AprilTag25h9,
    AprilTag36h10,
    AprilTag36h11,
}

const fn aruco(
    name: &'static str,
    marker_size: usize,
    size: usize,
    max_correction_bits: u8,
) -> DictionaryInfo {
    DictionaryInfo {
        name,
        family: DictionaryFamily::Aruco,
        marker_size,
        size,
        max_correction_bits,
    }
}

const fn april(name: &'static str, marker_size: usize, size: usize) -> DictionaryInfo {
    DictionaryInfo {
        name,
        family: DictionaryFamily::AprilTag,
        marker_size,
        size,
        max_correction_bits: 0,
    }
}

impl DictionaryId {
    /// Every predefined dictionary, in catalog order.
    pub const ALL: [DictionaryId; 21] = [
        DictionaryId::Dict4x4_50,
        DictionaryId::Dict4x4_100,
        DictionaryId::Dict4x4_250,
        DictionaryId::Dict4x4_1000,
        DictionaryId::Dict5x5_50,
        DictionaryId::Dict5x5_100,
        DictionaryId::Dict5x5_250,
        DictionaryId::Dict5x5_1000,
        DictionaryId::Dict6x6_50,
        DictionaryId::Dict6x6_100,
        DictionaryId::Dict6x6_250,
        DictionaryId::Dict6x6_1000,
        DictionaryId::Dict7x7_50,
        DictionaryId::Dict7x7_100,
        DictionaryId::Dict7x7_250,
        DictionaryId::Dict7x7_1000,
        DictionaryId::ArucoOriginal,
        DictionaryId::AprilTag16h5,
        DictionaryId::AprilTag25h9,
        DictionaryId::AprilTag36h10,
        DictionaryId::AprilTag36h11,
    ];

    pub const fn info(self) -> DictionaryInfo {
        use DictionaryId::*;
        match self {
            Dict4x4_50 => aruco("DICT_4X4_50", 4, 50, 1),
            Dict4x4_100 => aruco("DICT_4X4_100", 4, 100, 1),
            Dict4x4_250 => aruco("DICT_4X4_250", 4, 250, 1),
            Dict4x4_1000 => aruco("DICT_4X4_1000", 4, 1000, 0),
            Dict5x5_50 => aruco("DICT_5X5_50", 5, 50, 3),
            Dict5x5_100 => aruco("DICT_5X5_100", 5, 100, 3),
            Dict5x5_250 => aruco("DICT_5X5_250", 5, 250, 2),
            Dict5x5_1000 => aruco("DICT_5X5_1000", 5, 1000, 2),
            Dict6x6_50 => aruco("DICT_6X6_50", 6, 50, 6),
            Dict6x6_100 => aruco("DICT_6X6_100", 6, 100, 5),
            Dict6x6_250 => aruco("DICT_6X6_250", 6, 250, 5),
            Dict6x6_1000 => aruco("DICT_6X6_1000", 6, 1000, 4),
            Dict7x7_50 => aruco("DICT_7X7_50", 7, 50, 9),
            Dict7x7_100 => aruco("DICT_7X7_100", 7, 100, 8),
            Dict7x7_250 => aruco("DICT_7X7_250", 7, 250, 8),
            Dict7x7_1000 => aruco("DICT_7X7_1000", 7, 1000, 6),
            ArucoOriginal => DictionaryInfo {
                name: "DICT_ARUCO_ORIGINAL",
                family: DictionaryFamily::ArucoOriginal,
                marker_size: 5,
                size: 1024,
                max_correction_bits: 0,
            },
            AprilTag16h5 => april("DICT_APRILTAG_16h5", 4, 30),
            AprilTag25h9 => april("DICT_APRILTAG_25h9", 5, 35),
            AprilTag36h10 => april("DICT_APRILTAG_36h10", 6, 2320),
            AprilTag36h11 => april("DICT_APRILTAG_36h11", 6, 587),
        }
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        self.info().name
    }

    /// Whether `id` is a valid marker id in this dictionary.
    pub fn contains(self, id: i32) -> bool {
        usize::try_from(id).is_ok_and(|id| id < self.info().size)
    }
}

/// Resolve a case-sensitive configuration name such as `DICT_4X4_1000`.
pub fn resolve(name: &str) -> Result<DictionaryId, DictionaryError> {
    DictionaryId::ALL
        .into_iter()
        .find(|d| d.name() == name)
        .ok_or_else(|| DictionaryError::Unknown {
            name: name.to_string(),
        })
}

impl FromStr for DictionaryId {
    type Err = DictionaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve(s)
    }
}

impl fmt::Display for DictionaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for DictionaryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for DictionaryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        resolve(&name).map_err(serde::de::Error::custom)
    }
}
