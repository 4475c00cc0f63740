//! Rigid-body transforms between named frames.
//!
//! A `RigidTransform` named `a_from_b` maps coordinates expressed in frame `b`
//! into frame `a`: `p_a = a_from_b * p_b`. Composition follows the same
//! convention, so `a_from_c = a_from_b.compose(&b_from_c)`.

use nalgebra::{
    Isometry3, Point3, Quaternion as NaQuaternion, Rotation3, Translation3, UnitQuaternion,
    Vector3,
};
use serde::{Deserialize, Serialize};

/// Plain `(x, y, z, w)` quaternion as it appears on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    #[inline]
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }
}

impl From<UnitQuaternion<f64>> for Quaternion {
    fn from(q: UnitQuaternion<f64>) -> Self {
        let q = q.into_inner();
        Self {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }
}

impl From<Quaternion> for UnitQuaternion<f64> {
    /// Normalizes on the way in; a zero quaternion maps to identity.
    fn from(q: Quaternion) -> Self {
        let raw = NaQuaternion::new(q.w, q.x, q.y, q.z);
        UnitQuaternion::try_new(raw, 1e-12).unwrap_or_else(UnitQuaternion::identity)
    }
}

/// Translation + unit-quaternion rotation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub translation: [f64; 3],
    pub rotation: Quaternion,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: Quaternion::IDENTITY,
        }
    }

    pub fn from_parts(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            translation: [translation.x, translation.y, translation.z],
            rotation: rotation.into(),
        }
    }

    /// Build from a rotation matrix; the quaternion is extracted and renormalized.
    pub fn from_rotation_matrix(rotation: &Rotation3<f64>, translation: Vector3<f64>) -> Self {
        let q = UnitQuaternion::from_rotation_matrix(rotation);
        Self::from_parts(translation, UnitQuaternion::new_normalize(q.into_inner()))
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self::from_parts(iso.translation.vector, iso.rotation)
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        let [x, y, z] = self.translation;
        Isometry3::from_parts(Translation3::new(x, y, z), self.rotation.into())
    }

    #[inline]
    pub fn translation_vector(&self) -> Vector3<f64> {
        Vector3::from(self.translation)
    }

    /// `self ∘ rhs`: apply `rhs` first, then `self`.
    pub fn compose(&self, rhs: &RigidTransform) -> RigidTransform {
        let iso = self.to_isometry() * rhs.to_isometry();
        let rotation = UnitQuaternion::new_normalize(iso.rotation.into_inner());
        Self::from_parts(iso.translation.vector, rotation)
    }

    pub fn inverse(&self) -> RigidTransform {
        Self::from_isometry(&self.to_isometry().inverse())
    }

    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.to_isometry() * p
    }
}
