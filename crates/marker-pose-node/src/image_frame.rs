//! Raw image buffers and their conversion to/from `image::RgbImage`.

use crate::messages::Header;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Image conversion failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported image encoding `{0}`")]
    UnsupportedEncoding(String),
    #[error("image buffer has {got} bytes, expected {expected} for {width}x{height} {encoding}")]
    BufferSize {
        width: u32,
        height: u32,
        encoding: ImageEncoding,
        expected: usize,
        got: usize,
    },
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Supported pixel layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageEncoding {
    Bgr8,
    Rgb8,
    Mono8,
}

impl ImageEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageEncoding::Bgr8 => "bgr8",
            ImageEncoding::Rgb8 => "rgb8",
            ImageEncoding::Mono8 => "mono8",
        }
    }

    #[inline]
    pub fn channels(self) -> usize {
        match self {
            ImageEncoding::Bgr8 | ImageEncoding::Rgb8 => 3,
            ImageEncoding::Mono8 => 1,
        }
    }
}

impl FromStr for ImageEncoding {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bgr8" => Ok(ImageEncoding::Bgr8),
            "rgb8" => Ok(ImageEncoding::Rgb8),
            "mono8" => Ok(ImageEncoding::Mono8),
            other => Err(DecodeError::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tightly packed image with its header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageFrame {
    pub header: Header,
    pub width: u32,
    pub height: u32,
    pub encoding: String,
    pub data: Vec<u8>,
}

impl ImageFrame {
    /// Decode into an RGB working image.
    pub fn to_rgb(&self) -> Result<(RgbImage, ImageEncoding), DecodeError> {
        let encoding: ImageEncoding = self.encoding.parse()?;
        let (width, height) = (self.width, self.height);
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidDimensions { width, height });
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(encoding.channels()))
            .ok_or(DecodeError::InvalidDimensions { width, height })?;
        if self.data.len() != expected {
            return Err(DecodeError::BufferSize {
                width,
                height,
                encoding,
                expected,
                got: self.data.len(),
            });
        }

        let rgb = match encoding {
            ImageEncoding::Rgb8 => RgbImage::from_raw(width, height, self.data.clone()),
            ImageEncoding::Bgr8 => RgbImage::from_raw(
                width,
                height,
                self.data
                    .chunks_exact(3)
                    .flat_map(|px| [px[2], px[1], px[0]])
                    .collect(),
            ),
            ImageEncoding::Mono8 => RgbImage::from_raw(
                width,
                height,
                self.data.iter().flat_map(|&v| [v, v, v]).collect(),
            ),
        }
        .ok_or(DecodeError::InvalidDimensions { width, height })?;

        Ok((rgb, encoding))
    }

    /// Encode an RGB working image back into `encoding`.
    pub fn from_rgb(header: Header, image: &RgbImage, encoding: ImageEncoding) -> Self {
        let data = match encoding {
            ImageEncoding::Rgb8 => image.as_raw().clone(),
            ImageEncoding::Bgr8 => image
                .pixels()
                .flat_map(|Rgb([r, g, b])| [*b, *g, *r])
                .collect(),
            ImageEncoding::Mono8 => image.pixels().map(luma).collect(),
        };
        Self {
            header,
            width: image.width(),
            height: image.height(),
            encoding: encoding.to_string(),
            data,
        }
    }
}

// ITU-R BT.601 luma.
fn luma(px: &Rgb<u8>) -> u8 {
    let [r, g, b] = px.0;
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}
