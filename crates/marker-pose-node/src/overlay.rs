//! Axis overlay drawn onto the output image for each posed marker.

use crate::estimator::CameraRelativePose;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use marker_pose_core::CameraIntrinsics;
use nalgebra::{Point2, Point3, Vector2};

const AXIS_COLORS: [Rgb<u8>; 3] = [Rgb([255, 0, 0]), Rgb([0, 255, 0]), Rgb([0, 0, 255])];
const LINE_WIDTH: i32 = 3;
const LABEL_SIZE: f64 = 10.0;
const CLIP_MARGIN: f64 = 16.0;

/// Projected axis end points of one marker, in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisProjection {
    pub origin: Point2<f64>,
    /// Tips of the x, y and z axes.
    pub tips: [Point2<f64>; 3],
}

/// Project the marker origin and the axis tips at `edge / 2`.
///
/// Returns `None` if any reference point is at or behind the camera.
pub fn project_axes(
    pose: &CameraRelativePose,
    intrinsics: &CameraIntrinsics,
    edge: f64,
) -> Option<AxisProjection> {
    let l = edge * 0.5;
    let project = |p: Point3<f64>| intrinsics.project(&pose.transform_point(&p));
    Some(AxisProjection {
        origin: project(Point3::origin())?,
        tips: [
            project(Point3::new(l, 0.0, 0.0))?,
            project(Point3::new(0.0, l, 0.0))?,
            project(Point3::new(0.0, 0.0, l))?,
        ],
    })
}

/// Draw x (red), y (green) and z (blue) axes plus their labels.
/// Markers behind the camera are skipped.
///
/// Axes are clipped to the image, so tips projected far outside it (a marker
/// tilted close to the camera) only cost the visible part of the stroke.
pub fn draw_axes(
    image: &mut RgbImage,
    pose: &CameraRelativePose,
    intrinsics: &CameraIntrinsics,
    edge: f64,
) -> bool {
    let Some(axes) = project_axes(pose, intrinsics, edge) else {
        return false;
    };
    for (axis, (tip, color)) in axes.tips.iter().zip(AXIS_COLORS).enumerate() {
        thick_line(image, axes.origin, *tip, color);
        draw_label(image, axis, *tip, color);
    }
    true
}

/// Liang-Barsky clip of `a -> b` against the image grown by [`CLIP_MARGIN`].
fn clip_segment(
    a: Point2<f64>,
    b: Point2<f64>,
    width: u32,
    height: u32,
) -> Option<(Point2<f64>, Point2<f64>)> {
    if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
        return None;
    }
    let x_max = f64::from(width) + CLIP_MARGIN;
    let y_max = f64::from(height) + CLIP_MARGIN;
    let d = b - a;
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [
        (-d.x, a.x + CLIP_MARGIN),
        (d.x, x_max - a.x),
        (-d.y, a.y + CLIP_MARGIN),
        (d.y, y_max - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((a + d * t0, a + d * t1))
}

fn segment(image: &mut RgbImage, a: Point2<f64>, b: Point2<f64>, color: Rgb<u8>) {
    let (w, h) = image.dimensions();
    if let Some((a, b)) = clip_segment(a, b, w, h) {
        draw_line_segment_mut(
            image,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            color,
        );
    }
}

fn thick_line(image: &mut RgbImage, a: Point2<f64>, b: Point2<f64>, color: Rgb<u8>) {
    let d = b - a;
    let len = d.norm();
    let normal = if len > f64::EPSILON {
        Vector2::new(-d.y / len, d.x / len)
    } else {
        Vector2::zeros()
    };
    let half = LINE_WIDTH / 2;
    for k in -half..=half {
        let o = normal * f64::from(k);
        segment(image, a + o, b + o, color);
    }
}

// Stroke glyphs in a unit box, (0,0) top-left.
fn glyph(axis: usize) -> &'static [((f64, f64), (f64, f64))] {
    match axis {
        0 => &[((0.0, 0.0), (1.0, 1.0)), ((1.0, 0.0), (0.0, 1.0))],
        1 => &[
            ((0.0, 0.0), (0.5, 0.5)),
            ((1.0, 0.0), (0.5, 0.5)),
            ((0.5, 0.5), (0.5, 1.0)),
        ],
        _ => &[
            ((0.0, 0.0), (1.0, 0.0)),
            ((1.0, 0.0), (0.0, 1.0)),
            ((0.0, 1.0), (1.0, 1.0)),
        ],
    }
}

fn draw_label(image: &mut RgbImage, axis: usize, at: Point2<f64>, color: Rgb<u8>) {
    let o = Point2::new(at.x + 4.0, at.y - LABEL_SIZE - 4.0);
    for &((x0, y0), (x1, y1)) in glyph(axis) {
        segment(
            image,
            o + Vector2::new(x0, y0) * LABEL_SIZE,
            o + Vector2::new(x1, y1) * LABEL_SIZE,
            color,
        );
    }
}
