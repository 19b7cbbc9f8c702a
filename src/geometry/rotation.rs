//! Rotations between frame bases.
//!
//! A `Rotation<From, To>` is a proper orthogonal change of basis stored as a
//! 3×3 matrix. It maps displacements and velocities (not points: origins are
//! handled by `AffineMap`).

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::ops::Mul;
use uom::si::angle::radian;
use uom::si::f64::Angle;

use crate::geometry::frame::Frame;
use crate::geometry::vectors::{Displacement, Velocity};

/// A rotation taking components in `From` to components in `To`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Rotation<From, To> {
    rows: [[f64; 3]; 3],
    #[serde(skip)]
    _frames: PhantomData<(From, To)>,
}

impl<From: Frame, To: Frame> Rotation<From, To> {
    /// The identity change of basis.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            _frames: PhantomData,
        }
    }

    /// Rotation by `angle` about the +y axis, following the right-hand rule.
    #[must_use]
    pub fn about_y(angle: Angle) -> Self {
        let theta = angle.get::<radian>();
        let (sin, cos) = theta.sin_cos();
        Self {
            rows: [[cos, 0.0, sin], [0.0, 1.0, 0.0], [-sin, 0.0, cos]],
            _frames: PhantomData,
        }
    }

    /// Change of basis onto the orthonormal basis `(x̂, ŷ, ẑ)`, whose vectors
    /// are expressed in the `From` frame.
    ///
    /// The rows of the matrix are the basis vectors, so application projects
    /// a `From` vector onto the new basis.
    #[must_use]
    pub const fn from_basis(x: [f64; 3], y: [f64; 3], z: [f64; 3]) -> Self {
        Self {
            rows: [x, y, z],
            _frames: PhantomData,
        }
    }

    /// The inverse rotation (the transpose).
    #[must_use]
    pub fn inverse(&self) -> Rotation<To, From> {
        let r = &self.rows;
        Rotation {
            rows: [
                [r[0][0], r[1][0], r[2][0]],
                [r[0][1], r[1][1], r[2][1]],
                [r[0][2], r[1][2], r[2][2]],
            ],
            _frames: PhantomData,
        }
    }

    /// Apply to a raw component triple.
    #[must_use]
    pub fn apply_raw(&self, v: [f64; 3]) -> [f64; 3] {
        let r = &self.rows;
        [
            r[0][0] * v[0] + r[0][1] * v[1] + r[0][2] * v[2],
            r[1][0] * v[0] + r[1][1] * v[1] + r[1][2] * v[2],
            r[2][0] * v[0] + r[2][1] * v[1] + r[2][2] * v[2],
        ]
    }

    /// Apply to a displacement.
    #[must_use]
    pub fn apply(&self, d: &Displacement<From>) -> Displacement<To> {
        let (x, y, z) = d.as_meters();
        let [rx, ry, rz] = self.apply_raw([x, y, z]);
        Displacement::from_meters(rx, ry, rz)
    }

    /// Apply to a velocity.
    #[must_use]
    pub fn apply_velocity(&self, v: &Velocity<From>) -> Velocity<To> {
        let (x, y, z) = v.as_meters_per_second();
        let [rx, ry, rz] = self.apply_raw([x, y, z]);
        Velocity::from_meters_per_second(rx, ry, rz)
    }
}

/// Composition: `(self ∘ rhs)(v) = self(rhs(v))`.
impl<A: Frame, B: Frame, C: Frame> Mul<Rotation<A, B>> for Rotation<B, C> {
    type Output = Rotation<A, C>;

    fn mul(self, rhs: Rotation<A, B>) -> Rotation<A, C> {
        let mut rows = [[0.0; 3]; 3];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, entry) in row.iter_mut().enumerate() {
                *entry = (0..3).map(|k| self.rows[i][k] * rhs.rows[k][j]).sum();
            }
        }
        Rotation {
            rows,
            _frames: PhantomData,
        }
    }
}
