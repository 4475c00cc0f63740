//! Predefined ArUco/AprilTag dictionary catalog.
//!
//! Marker detection itself happens elsewhere; this crate only names the
//! pattern families a detector can be configured with and validates
//! configuration strings against that fixed set.

mod dictionary;

pub use dictionary::{resolve, DictionaryError, DictionaryFamily, DictionaryId, DictionaryInfo};
