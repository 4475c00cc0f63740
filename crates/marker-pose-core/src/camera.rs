//! Pinhole camera intrinsics.

use nalgebra::{Matrix3, Point2, Point3};
use serde::{Deserialize, Serialize};

/// Number of zero coefficients used when the camera reports no distortion model.
const DEFAULT_DISTORTION_LEN: usize = 4;

/// Invalid intrinsic parameters.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum IntrinsicsError {
    #[error("intrinsic matrix contains non-finite values")]
    NonFinite,
    #[error("focal lengths must be > 0 (fx={fx}, fy={fy})")]
    InvalidFocalLength { fx: f64, fy: f64 },
    #[error("intrinsic matrix is not invertible")]
    Singular,
}

/// Camera intrinsic matrix `K`, distortion coefficients and image size.
///
/// `K` is always 3×3. The distortion vector is kept for reporting only: pose
/// recovery and overlay projection treat pixel coordinates as undistorted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub k: Matrix3<f64>,
    pub distortion: Vec<f64>,
    pub width: u32,
    pub height: u32,
}

impl CameraIntrinsics {
    /// Build intrinsics from a row-major `K` and an optional distortion vector.
    ///
    /// An empty `distortion` slice is replaced by four zeros.
    pub fn from_row_major(
        k: [f64; 9],
        distortion: &[f64],
        width: u32,
        height: u32,
    ) -> Result<Self, IntrinsicsError> {
        let k = Matrix3::from_row_slice(&k);
        if k.iter().any(|v| !v.is_finite()) {
            return Err(IntrinsicsError::NonFinite);
        }
        let (fx, fy) = (k[(0, 0)], k[(1, 1)]);
        if fx <= 0.0 || fy <= 0.0 {
            return Err(IntrinsicsError::InvalidFocalLength { fx, fy });
        }
        if k.try_inverse().is_none() {
            return Err(IntrinsicsError::Singular);
        }

        let distortion = if distortion.is_empty() {
            vec![0.0; DEFAULT_DISTORTION_LEN]
        } else {
            distortion.to_vec()
        };

        Ok(Self {
            k,
            distortion,
            width,
            height,
        })
    }

    #[inline]
    pub fn fx(&self) -> f64 {
        self.k[(0, 0)]
    }

    #[inline]
    pub fn fy(&self) -> f64 {
        self.k[(1, 1)]
    }

    #[inline]
    pub fn cx(&self) -> f64 {
        self.k[(0, 2)]
    }

    #[inline]
    pub fn cy(&self) -> f64 {
        self.k[(1, 2)]
    }

    #[inline]
    pub fn skew(&self) -> f64 {
        self.k[(0, 1)]
    }

    /// `K` in row-major order.
    pub fn k_row_major(&self) -> [f64; 9] {
        let k = &self.k;
        [
            k[(0, 0)],
            k[(0, 1)],
            k[(0, 2)],
            k[(1, 0)],
            k[(1, 1)],
            k[(1, 2)],
            k[(2, 0)],
            k[(2, 1)],
            k[(2, 2)],
        ]
    }

    /// Project a camera-frame point to pixels. Returns `None` behind the camera.
    #[inline]
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if p.z <= f64::EPSILON {
            return None;
        }
        let x = p.x / p.z;
        let y = p.y / p.z;
        Some(Point2::new(
            self.fx() * x + self.skew() * y + self.cx(),
            self.fy() * y + self.cy(),
        ))
    }

    /// Map a pixel to normalized image coordinates (`z = 1` plane).
    #[inline]
    pub fn normalize(&self, px: &Point2<f64>) -> Point2<f64> {
        let y = (px.y - self.cy()) / self.fy();
        let x = (px.x - self.cx() - self.skew() * y) / self.fx();
        Point2::new(x, y)
    }
}
