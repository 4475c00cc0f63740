//! Camera-relative pose of square markers from their four image corners.
//!
//! Pipeline per marker:
//! 1. undo `K` (no distortion model, see [`MarkerDetector`](crate::MarkerDetector)),
//! 2. 4-point homography from the marker plane to normalized image coordinates,
//! 3. planar decomposition `H ~ [r1 r2 t]`, projected onto SO(3),
//! 4. Levenberg-Marquardt refinement of the normalized reprojection error.

use crate::collab::DetectedMarkerRaw;
use crate::error::{PoseFailure, PoseFailureReason};
use log::debug;
use marker_pose_core::{homography_from_4pt, CameraIntrinsics, RigidTransform};
use nalgebra::{
    Matrix2x3, Matrix3, Matrix6, Point2, Point3, Rotation3, SMatrix, UnitQuaternion, Vector2,
    Vector3, Vector6,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Refinement settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseRefineParams {
    /// Maximum Levenberg-Marquardt iterations; 0 keeps the closed-form pose.
    pub max_iters: usize,
    pub initial_lambda: f64,
    /// Stop once the update norm drops below this.
    pub step_tolerance: f64,
}

impl Default for PoseRefineParams {
    fn default() -> Self {
        Self {
            max_iters: 20,
            initial_lambda: 1e-3,
            step_tolerance: 1e-12,
        }
    }
}

/// Marker pose in the camera optical frame: `X_cam = R * X_marker + t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraRelativePose {
    pub rotation: Rotation3<f64>,
    /// In marker edge units.
    pub translation: Vector3<f64>,
    /// RMS distance between observed and reprojected corners, in pixels.
    pub reprojection_rms_px: f64,
}

impl CameraRelativePose {
    /// Axis-angle vector (Rodrigues).
    pub fn rvec(&self) -> Vector3<f64> {
        self.rotation.scaled_axis()
    }

    /// `camera_from_marker`.
    pub fn to_transform(&self) -> RigidTransform {
        RigidTransform::from_rotation_matrix(&self.rotation, self.translation)
    }

    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation * p + self.translation
    }
}

/// Corners of a square marker of side `edge`, centred at the origin on `z = 0`,
/// in detector order: top-left, top-right, bottom-right, bottom-left.
pub fn marker_object_points(edge: f64) -> [Point3<f64>; 4] {
    let h = edge * 0.5;
    [
        Point3::new(-h, h, 0.0),
        Point3::new(h, h, 0.0),
        Point3::new(h, -h, 0.0),
        Point3::new(-h, -h, 0.0),
    ]
}

/// Estimates one [`CameraRelativePose`] per detected marker.
#[derive(Clone, Debug, Default)]
pub struct MarkerPoseEstimator {
    pub refine: PoseRefineParams,
}

impl MarkerPoseEstimator {
    pub fn new(refine: PoseRefineParams) -> Self {
        Self { refine }
    }

    /// One result per input marker, in input order. A failing marker never
    /// affects the others.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(markers = markers.len(), edge = edge))
    )]
    pub fn estimate(
        &self,
        markers: &[DetectedMarkerRaw],
        intrinsics: &CameraIntrinsics,
        edge: f64,
    ) -> Vec<Result<CameraRelativePose, PoseFailure>> {
        markers
            .iter()
            .map(|m| self.estimate_one(m, intrinsics, edge))
            .collect()
    }

    pub fn estimate_one(
        &self,
        marker: &DetectedMarkerRaw,
        intrinsics: &CameraIntrinsics,
        edge: f64,
    ) -> Result<CameraRelativePose, PoseFailure> {
        let fail = |reason| PoseFailure {
            id: marker.id,
            reason,
        };

        if !edge.is_finite() || edge <= 0.0 {
            return Err(fail(PoseFailureReason::InvalidEdgeLength));
        }
        if marker
            .corners
            .iter()
            .any(|c| !c.x.is_finite() || !c.y.is_finite())
        {
            return Err(fail(PoseFailureReason::NonFiniteCorners));
        }

        let object = marker_object_points(edge);
        let plane = object.map(|p| Point2::new(p.x, p.y));
        let observed = marker.corners.map(|c| intrinsics.normalize(&c));

        let h = homography_from_4pt(&plane, &observed)
            .ok_or_else(|| fail(PoseFailureReason::DegenerateHomography))?;
        let (rotation, translation) = decompose_planar(&h.h)
            .ok_or_else(|| fail(PoseFailureReason::DegenerateDecomposition))?;

        let (rotation, translation) =
            refine_pose(&object, &observed, rotation, translation, &self.refine);

        if rotation.matrix().iter().any(|v| !v.is_finite())
            || translation.iter().any(|v| !v.is_finite())
        {
            return Err(fail(PoseFailureReason::NonFiniteSolution));
        }

        let pose = CameraRelativePose {
            rotation,
            translation,
            reprojection_rms_px: 0.0,
        };
        let rms = reprojection_rms_px(&pose, &object, &marker.corners, intrinsics)
            .ok_or_else(|| fail(PoseFailureReason::NonFiniteSolution))?;
        debug!(
            "marker {}: t=[{:.4}, {:.4}, {:.4}] rms={:.3}px",
            marker.id, translation.x, translation.y, translation.z, rms
        );

        Ok(CameraRelativePose {
            reprojection_rms_px: rms,
            ..pose
        })
    }
}

/// Recover `[R | t]` from a plane-to-normalized-image homography.
///
/// Scale is fixed by the mean norm of the first two columns; the sign is
/// chosen so the plane lies in front of the camera.
fn decompose_planar(h: &Matrix3<f64>) -> Option<(Rotation3<f64>, Vector3<f64>)> {
    let h1 = h.column(0).into_owned();
    let h2 = h.column(1).into_owned();
    let h3 = h.column(2).into_owned();

    let n1 = h1.norm();
    let n2 = h2.norm();
    if !(n1 > 1e-12 && n2 > 1e-12) {
        return None;
    }

    let mut lambda = 2.0 / (n1 + n2);
    if h3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let t = h3 * lambda;
    if t.z <= 1e-12 {
        return None;
    }
    let r3 = r1.cross(&r2);

    let approx = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = approx.svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fixed = u;
        for v in u_fixed.column_mut(2).iter_mut() {
            *v = -*v;
        }
        r = u_fixed * v_t;
    }

    if r.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some((Rotation3::from_matrix_unchecked(r), t))
}

fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Sum of squared normalized reprojection residuals. `None` if any point is
/// at or behind the camera.
fn cost(
    object: &[Point3<f64>; 4],
    observed: &[Point2<f64>; 4],
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> Option<f64> {
    let mut sum = 0.0;
    for (p, o) in object.iter().zip(observed) {
        let pc = rotation * p + translation;
        if pc.z <= f64::EPSILON {
            return None;
        }
        let dx = pc.x / pc.z - o.x;
        let dy = pc.y / pc.z - o.y;
        sum += dx * dx + dy * dy;
    }
    Some(sum)
}

// Left perturbation: R <- exp(w) R, t <- t + dt.
fn refine_pose(
    object: &[Point3<f64>; 4],
    observed: &[Point2<f64>; 4],
    mut rotation: Rotation3<f64>,
    mut translation: Vector3<f64>,
    params: &PoseRefineParams,
) -> (Rotation3<f64>, Vector3<f64>) {
    let Some(mut current) = cost(object, observed, &rotation, &translation) else {
        return (rotation, translation);
    };
    let mut lambda = params.initial_lambda;

    for _ in 0..params.max_iters {
        if current < 1e-24 {
            break;
        }

        let mut jtj = Matrix6::<f64>::zeros();
        let mut jtr = Vector6::<f64>::zeros();
        for (p, o) in object.iter().zip(observed) {
            let rp = rotation * p;
            let pc = rp.coords + translation;
            let inv_z = 1.0 / pc.z;
            let inv_z2 = inv_z * inv_z;
            let d = Matrix2x3::new(
                inv_z,
                0.0,
                -pc.x * inv_z2,
                0.0,
                inv_z,
                -pc.y * inv_z2,
            );

            let mut j = SMatrix::<f64, 2, 6>::zeros();
            j.fixed_view_mut::<2, 3>(0, 0).copy_from(&(d * -skew(&rp.coords)));
            j.fixed_view_mut::<2, 3>(0, 3).copy_from(&d);

            let r = Vector2::new(pc.x * inv_z - o.x, pc.y * inv_z - o.y);
            jtj += j.transpose() * &j;
            jtr += j.transpose() * r;
        }

        let mut damped = jtj;
        for i in 0..6 {
            damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
        }
        let Some(delta) = damped.cholesky().map(|c| c.solve(&(-jtr))) else {
            lambda *= 10.0;
            continue;
        };

        let omega = Vector3::new(delta[0], delta[1], delta[2]);
        let dt = Vector3::new(delta[3], delta[4], delta[5]);
        let cand_r = Rotation3::new(omega) * rotation;
        let cand_t = translation + dt;

        match cost(object, observed, &cand_r, &cand_t) {
            Some(c) if c < current => {
                rotation = renormalize(&cand_r);
                translation = cand_t;
                current = c;
                lambda = (lambda / 10.0).max(1e-12);
            }
            _ => lambda *= 10.0,
        }

        if delta.norm() < params.step_tolerance {
            break;
        }
    }

    (rotation, translation)
}

// Repeated left-multiplication drifts off SO(3).
fn renormalize(r: &Rotation3<f64>) -> Rotation3<f64> {
    UnitQuaternion::from_rotation_matrix(r).to_rotation_matrix()
}

fn reprojection_rms_px(
    pose: &CameraRelativePose,
    object: &[Point3<f64>; 4],
    corners: &[Point2<f64>; 4],
    intrinsics: &CameraIntrinsics,
) -> Option<f64> {
    let mut sum = 0.0;
    for (p, c) in object.iter().zip(corners) {
        let px = intrinsics.project(&pose.transform_point(p))?;
        sum += (px - c).norm_squared();
    }
    let rms = (sum / 4.0).sqrt();
    rms.is_finite().then_some(rms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::from_row_major(
            [800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0],
            &[],
            640,
            480,
        )
        .expect("valid intrinsics")
    }

    fn project_marker(
        id: i32,
        rotation: &Rotation3<f64>,
        translation: &Vector3<f64>,
        edge: f64,
    ) -> DetectedMarkerRaw {
        let k = intrinsics();
        let corners = marker_object_points(edge).map(|p| {
            k.project(&(rotation * p + translation))
                .expect("in front of camera")
        });
        DetectedMarkerRaw { id, corners }
    }

    #[test]
    fn object_points_follow_detector_corner_order() {
        let pts = marker_object_points(0.2);
        assert_eq!(pts[0], Point3::new(-0.1, 0.1, 0.0));
        assert_eq!(pts[1], Point3::new(0.1, 0.1, 0.0));
        assert_eq!(pts[2], Point3::new(0.1, -0.1, 0.0));
        assert_eq!(pts[3], Point3::new(-0.1, -0.1, 0.0));
    }

    #[test]
    fn recovers_projected_pose() {
        let cases = [
            (Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0)),
            (Vector3::new(0.3, -0.2, 0.1), Vector3::new(0.1, -0.05, 0.8)),
            (Vector3::new(-0.5, 0.4, 1.2), Vector3::new(-0.2, 0.1, 1.5)),
            (Vector3::new(0.0, 0.0, 3.0), Vector3::new(0.05, 0.05, 0.5)),
        ];
        let est = MarkerPoseEstimator::default();
        let k = intrinsics();

        for (rvec, t) in cases {
            let r = Rotation3::new(rvec);
            let m = project_marker(7, &r, &t, 0.1);
            let pose = est.estimate_one(&m, &k, 0.1).expect("pose");

            assert_relative_eq!(pose.translation, t, epsilon = 1e-6);
            assert!((pose.rotation.matrix() - r.matrix()).norm() < 1e-7);
            assert!(pose.reprojection_rms_px < 1e-6);
            assert_relative_eq!(pose.rotation.matrix().determinant(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn refinement_reduces_noisy_reprojection_error() {
        let r = Rotation3::new(Vector3::new(0.4, 0.1, -0.3));
        let t = Vector3::new(0.05, -0.02, 0.6);
        let mut m = project_marker(3, &r, &t, 0.1);
        let noise = [(0.4, -0.3), (-0.2, 0.5), (0.3, 0.1), (-0.5, -0.2)];
        for (c, (dx, dy)) in m.corners.iter_mut().zip(noise) {
            c.x += dx;
            c.y += dy;
        }

        let k = intrinsics();
        let closed_form = MarkerPoseEstimator::new(PoseRefineParams {
            max_iters: 0,
            ..Default::default()
        })
        .estimate_one(&m, &k, 0.1)
        .expect("closed form");
        let refined = MarkerPoseEstimator::default()
            .estimate_one(&m, &k, 0.1)
            .expect("refined");

        assert!(refined.reprojection_rms_px <= closed_form.reprojection_rms_px + 1e-9);
        assert!(refined.reprojection_rms_px < 1.0);
        assert!((refined.translation - t).norm() < 1e-2);
    }

    #[test]
    fn translation_scales_with_edge_length() {
        let r = Rotation3::new(Vector3::new(0.2, -0.1, 0.0));
        let t = Vector3::new(0.1, 0.0, 1.0);
        let m = project_marker(1, &r, &t, 0.1);
        let k = intrinsics();
        let est = MarkerPoseEstimator::default();

        let a = est.estimate_one(&m, &k, 0.1).expect("pose");
        let b = est.estimate_one(&m, &k, 0.2).expect("pose");
        assert_relative_eq!(b.translation, a.translation * 2.0, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_and_non_finite_corners_fail_per_marker() {
        let k = intrinsics();
        let good = project_marker(
            1,
            &Rotation3::identity(),
            &Vector3::new(0.0, 0.0, 1.0),
            0.1,
        );
        let collapsed = DetectedMarkerRaw {
            id: 2,
            corners: [Point2::new(100.0, 100.0); 4],
        };
        let mut nan = good.clone();
        nan.id = 3;
        nan.corners[2].x = f64::NAN;

        let out = MarkerPoseEstimator::default().estimate(&[good, collapsed, nan], &k, 0.1);
        assert_eq!(out.len(), 3);
        assert!(out[0].is_ok());
        assert_eq!(
            out[1].unwrap_err(),
            PoseFailure {
                id: 2,
                reason: PoseFailureReason::DegenerateHomography
            }
        );
        assert_eq!(
            out[2].unwrap_err(),
            PoseFailure {
                id: 3,
                reason: PoseFailureReason::NonFiniteCorners
            }
        );
    }

    #[test]
    fn invalid_edge_is_rejected() {
        let k = intrinsics();
        let m = project_marker(
            9,
            &Rotation3::identity(),
            &Vector3::new(0.0, 0.0, 1.0),
            0.1,
        );
        let est = MarkerPoseEstimator::default();
        for edge in [0.0, -0.1, f64::NAN] {
            assert_eq!(
                est.estimate_one(&m, &k, edge).unwrap_err().reason,
                PoseFailureReason::InvalidEdgeLength
            );
        }
    }

    #[test]
    fn transform_matches_rotation_and_translation() {
        let r = Rotation3::new(Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2));
        let pose = CameraRelativePose {
            rotation: r,
            translation: Vector3::new(1.0, 2.0, 3.0),
            reprojection_rms_px: 0.0,
        };
        let p = Point3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(
            pose.to_transform().transform_point(&p),
            pose.transform_point(&p),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            pose.rvec(),
            Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            epsilon = 1e-12
        );
    }
}
