//! Coordinate permutations between left- and right-handed bases.
//!
//! The host's world coordinates are left-handed; the core computes in
//! right-handed bases. The XZY permutation (y and z exchanged) is the
//! looking glass between the two conventions.

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

use crate::geometry::frame::Frame;
use crate::geometry::vectors::{Displacement, Velocity};

/// The y↔z coordinate permutation taking components in `From` to components
/// in `To`. It is an improper map (determinant −1) and thus flips
/// handedness; it is its own inverse up to frame relabeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Permutation<From, To> {
    #[serde(skip)]
    _frames: PhantomData<(From, To)>,
}

impl<From: Frame, To: Frame> Permutation<From, To> {
    /// The XZY permutation.
    #[must_use]
    pub const fn xzy() -> Self {
        Self {
            _frames: PhantomData,
        }
    }

    /// The inverse permutation, which is again XZY.
    #[must_use]
    pub const fn inverse(&self) -> Permutation<To, From> {
        Permutation::xzy()
    }

    /// Apply to a raw component triple.
    #[must_use]
    pub const fn apply_raw(&self, v: [f64; 3]) -> [f64; 3] {
        [v[0], v[2], v[1]]
    }

    /// Apply to a displacement.
    #[must_use]
    pub fn apply(&self, d: &Displacement<From>) -> Displacement<To> {
        let (x, y, z) = d.as_meters();
        Displacement::from_meters(x, z, y)
    }

    /// Apply to a velocity.
    #[must_use]
    pub fn apply_velocity(&self, v: &Velocity<From>) -> Velocity<To> {
        let (x, y, z) = v.as_meters_per_second();
        Velocity::from_meters_per_second(x, z, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::frame::{AliceSun, WorldSun};

    const EPSILON: f64 = 1e-12;

    #[test]
    fn test_xzy_swaps_y_and_z() {
        let p = Permutation::<WorldSun, AliceSun>::xzy();
        let d = Displacement::<WorldSun>::from_meters(1.0, 2.0, 3.0);
        let (x, y, z) = p.apply(&d).as_meters();
        assert!((x - 1.0).abs() < EPSILON);
        assert!((y - 3.0).abs() < EPSILON);
        assert!((z - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_xzy_velocity() {
        let p = Permutation::<WorldSun, AliceSun>::xzy();
        let v = Velocity::<WorldSun>::from_meters_per_second(-1.0, 5.0, 7.0);
        let (x, y, z) = p.apply_velocity(&v).as_meters_per_second();
        assert!((x + 1.0).abs() < EPSILON);
        assert!((y - 7.0).abs() < EPSILON);
        assert!((z - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_xzy_involution() {
        let p = Permutation::<WorldSun, AliceSun>::xzy();
        let d = Displacement::<WorldSun>::from_meters(4.0, 5.0, 6.0);
        let back = p.inverse().apply(&p.apply(&d));
        assert_eq!(back, d);
    }

    #[test]
    fn test_xzy_raw() {
        let p = Permutation::<WorldSun, AliceSun>::xzy();
        assert_eq!(p.apply_raw([1.0, 2.0, 3.0]), [1.0, 3.0, 2.0]);
    }
}
