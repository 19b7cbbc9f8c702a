//! Frame-tagged vectors and affine points.
//!
//! `Displacement<F>` and `Velocity<F>` are 3-vectors of `uom` scalars;
//! `Position<F>` is an affine point that only supports affine operations.
//! Component extraction in SI units is provided for the integrator and the
//! force model, which run on raw `f64`.

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::ops::{Add, Mul, Neg, Sub};
use uom::si::f64::{Length, Time, Velocity as Speed};
use uom::si::length::meter;
use uom::si::time::second;
use uom::si::velocity::meter_per_second;

use crate::geometry::frame::Frame;

/// A displacement between two positions in frame `F`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Displacement<F> {
    pub x: Length,
    pub y: Length,
    pub z: Length,
    #[serde(skip)]
    _frame: PhantomData<F>,
}

impl<F: Frame> Displacement<F> {
    /// Create a displacement from meter components.
    #[must_use]
    pub fn from_meters(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Length::new::<meter>(x),
            y: Length::new::<meter>(y),
            z: Length::new::<meter>(z),
            _frame: PhantomData,
        }
    }

    /// The zero displacement.
    #[must_use]
    pub fn zero() -> Self {
        Self::from_meters(0.0, 0.0, 0.0)
    }

    /// Get the components in meters.
    #[must_use]
    pub fn as_meters(&self) -> (f64, f64, f64) {
        (
            self.x.get::<meter>(),
            self.y.get::<meter>(),
            self.z.get::<meter>(),
        )
    }

    /// The Euclidean norm.
    #[must_use]
    pub fn norm(&self) -> Length {
        Length::new::<meter>(self.norm_squared().sqrt())
    }

    /// The squared norm in m² (avoids the square root).
    #[must_use]
    pub fn norm_squared(&self) -> f64 {
        let (x, y, z) = self.as_meters();
        x * x + y * y + z * z
    }

    /// Dot product in m².
    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        let (ax, ay, az) = self.as_meters();
        let (bx, by, bz) = other.as_meters();
        ax * bx + ay * by + az * bz
    }

    /// Scale by a dimensionless factor.
    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            z: self.z * factor,
            _frame: PhantomData,
        }
    }

    /// Normalize to a raw unit vector; zero input yields the zero tuple.
    #[must_use]
    pub fn direction(&self) -> [f64; 3] {
        let norm = self.norm_squared().sqrt();
        if norm < f64::EPSILON {
            return [0.0, 0.0, 0.0];
        }
        let (x, y, z) = self.as_meters();
        [x / norm, y / norm, z / norm]
    }

    /// Check that all components are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        let (x, y, z) = self.as_meters();
        x.is_finite() && y.is_finite() && z.is_finite()
    }
}

impl<F: Frame> Add for Displacement<F> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
            _frame: PhantomData,
        }
    }
}

impl<F: Frame> Sub for Displacement<F> {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
            _frame: PhantomData,
        }
    }
}

impl<F: Frame> Neg for Displacement<F> {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
            _frame: PhantomData,
        }
    }
}

/// A velocity in frame `F`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Velocity<F> {
    pub x: Speed,
    pub y: Speed,
    pub z: Speed,
    #[serde(skip)]
    _frame: PhantomData<F>,
}

impl<F: Frame> Velocity<F> {
    /// Create a velocity from m/s components.
    #[must_use]
    pub fn from_meters_per_second(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Speed::new::<meter_per_second>(x),
            y: Speed::new::<meter_per_second>(y),
            z: Speed::new::<meter_per_second>(z),
            _frame: PhantomData,
        }
    }

    /// The zero velocity.
    #[must_use]
    pub fn zero() -> Self {
        Self::from_meters_per_second(0.0, 0.0, 0.0)
    }

    /// Get the components in m/s.
    #[must_use]
    pub fn as_meters_per_second(&self) -> (f64, f64, f64) {
        (
            self.x.get::<meter_per_second>(),
            self.y.get::<meter_per_second>(),
            self.z.get::<meter_per_second>(),
        )
    }

    /// The Euclidean norm (speed).
    #[must_use]
    pub fn norm(&self) -> Speed {
        let (x, y, z) = self.as_meters_per_second();
        Speed::new::<meter_per_second>((x * x + y * y + z * z).sqrt())
    }

    /// Scale by a dimensionless factor.
    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            z: self.z * factor,
            _frame: PhantomData,
        }
    }

    /// Check that all components are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        let (x, y, z) = self.as_meters_per_second();
        x.is_finite() && y.is_finite() && z.is_finite()
    }
}

impl<F: Frame> Add for Velocity<F> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
            _frame: PhantomData,
        }
    }
}

impl<F: Frame> Sub for Velocity<F> {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
            _frame: PhantomData,
        }
    }
}

impl<F: Frame> Neg for Velocity<F> {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
            _frame: PhantomData,
        }
    }
}

/// Displacement = Velocity · Time.
impl<F: Frame> Mul<Time> for Velocity<F> {
    type Output = Displacement<F>;

    fn mul(self, duration: Time) -> Displacement<F> {
        let dt = duration.get::<second>();
        let (x, y, z) = self.as_meters_per_second();
        Displacement::from_meters(x * dt, y * dt, z * dt)
    }
}

/// An affine point in frame `F`, stored as a displacement from the frame
/// origin. Only affine operations are exposed: points are displaced and
/// subtracted, never added together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Position<F> {
    coordinates: Displacement<F>,
}

impl<F: Frame> Position<F> {
    /// The origin of frame `F`.
    #[must_use]
    pub fn origin() -> Self {
        Self {
            coordinates: Displacement::zero(),
        }
    }

    /// Create a position from meter coordinates.
    #[must_use]
    pub fn from_meters(x: f64, y: f64, z: f64) -> Self {
        Self {
            coordinates: Displacement::from_meters(x, y, z),
        }
    }

    /// Get the coordinates in meters.
    #[must_use]
    pub fn as_meters(&self) -> (f64, f64, f64) {
        self.coordinates.as_meters()
    }

    /// The displacement of this point from the frame origin.
    #[must_use]
    pub const fn from_origin(&self) -> Displacement<F> {
        self.coordinates
    }

    /// Check that all coordinates are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.coordinates.is_finite()
    }
}

impl<F: Frame> Sub for Position<F> {
    type Output = Displacement<F>;

    fn sub(self, other: Self) -> Displacement<F> {
        self.coordinates - other.coordinates
    }
}

impl<F: Frame> Add<Displacement<F>> for Position<F> {
    type Output = Self;

    fn add(self, displacement: Displacement<F>) -> Self {
        Self {
            coordinates: self.coordinates + displacement,
        }
    }
}

impl<F: Frame> Sub<Displacement<F>> for Position<F> {
    type Output = Self;

    fn sub(self, displacement: Displacement<F>) -> Self {
        Self {
            coordinates: self.coordinates - displacement,
        }
    }
}
