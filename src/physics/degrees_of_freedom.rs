//! Degrees of freedom: position and velocity in a frame.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Neg, Sub};

use crate::geometry::frame::Frame;
use crate::geometry::vectors::{Displacement, Position, Velocity};

/// The state of a point mass in frame `F`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct DegreesOfFreedom<F> {
    pub position: Position<F>,
    pub velocity: Velocity<F>,
}

impl<F: Frame> DegreesOfFreedom<F> {
    /// Create degrees of freedom from a position and a velocity.
    #[must_use]
    pub const fn new(position: Position<F>, velocity: Velocity<F>) -> Self {
        Self { position, velocity }
    }

    /// Check that all components are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }
}

/// A difference of two degrees of freedom taken at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct RelativeDegreesOfFreedom<F> {
    pub displacement: Displacement<F>,
    pub velocity: Velocity<F>,
}

impl<F: Frame> RelativeDegreesOfFreedom<F> {
    /// Create relative degrees of freedom.
    #[must_use]
    pub const fn new(displacement: Displacement<F>, velocity: Velocity<F>) -> Self {
        Self {
            displacement,
            velocity,
        }
    }

    /// The zero offset.
    #[must_use]
    pub fn zero() -> Self {
        Self::new(Displacement::zero(), Velocity::zero())
    }
}

impl<F: Frame> Sub for DegreesOfFreedom<F> {
    type Output = RelativeDegreesOfFreedom<F>;

    fn sub(self, other: Self) -> RelativeDegreesOfFreedom<F> {
        RelativeDegreesOfFreedom {
            displacement: self.position - other.position,
            velocity: self.velocity - other.velocity,
        }
    }
}

impl<F: Frame> Add<RelativeDegreesOfFreedom<F>> for DegreesOfFreedom<F> {
    type Output = Self;

    fn add(self, relative: RelativeDegreesOfFreedom<F>) -> Self {
        Self {
            position: self.position + relative.displacement,
            velocity: self.velocity + relative.velocity,
        }
    }
}

impl<F: Frame> Add for RelativeDegreesOfFreedom<F> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            displacement: self.displacement + other.displacement,
            velocity: self.velocity + other.velocity,
        }
    }
}

impl<F: Frame> Neg for RelativeDegreesOfFreedom<F> {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            displacement: -self.displacement,
            velocity: -self.velocity,
        }
    }
}

/// The weighted barycentre of a set of degrees of freedom.
///
/// # Panics
///
/// Panics if `items` is empty or the weights do not sum to a positive value.
#[must_use]
pub fn barycentre<F: Frame>(items: &[(DegreesOfFreedom<F>, f64)]) -> DegreesOfFreedom<F> {
    assert!(!items.is_empty(), "barycentre of nothing");
    let total: f64 = items.iter().map(|(_, weight)| weight).sum();
    assert!(total > 0.0, "barycentre weights must sum to a positive value");
    let origin = Position::<F>::origin();
    let mut displacement = Displacement::<F>::zero();
    let mut velocity = Velocity::<F>::zero();
    for (dof, weight) in items {
        displacement = displacement + (dof.position - origin).scale(weight / total);
        velocity = velocity + dof.velocity.scale(weight / total);
    }
    DegreesOfFreedom {
        position: origin + displacement,
        velocity,
    }
}
