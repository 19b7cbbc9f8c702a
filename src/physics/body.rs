//! The body model.
//!
//! A body is either massless (vessels, the physics bubble) or massive
//! (celestials). Massive bodies carry the gravitational parameter μ = GM and
//! may carry oblateness data. Oblateness participates in the force model but
//! is not exercised by the scheduler.

use serde::{Deserialize, Serialize};
use uom::si::f64::Length;
use uom::si::length::meter;

use crate::units::GravitationalParameter;

/// A mass point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Body {
    /// A body that exerts no gravitation.
    Massless,
    /// A gravitating body.
    Massive(MassiveBody),
}

impl Body {
    /// Create a massive body with the given gravitational parameter.
    ///
    /// # Panics
    ///
    /// Panics unless μ > 0.
    #[must_use]
    pub fn massive(gravitational_parameter: GravitationalParameter) -> Self {
        Self::Massive(MassiveBody::new(gravitational_parameter))
    }

    /// True for `Massless`.
    #[must_use]
    pub const fn is_massless(&self) -> bool {
        matches!(self, Self::Massless)
    }

    /// The gravitational parameter, if the body is massive.
    #[must_use]
    pub const fn gravitational_parameter(&self) -> Option<GravitationalParameter> {
        match self {
            Self::Massless => None,
            Self::Massive(massive) => Some(massive.gravitational_parameter),
        }
    }

    /// The oblateness data, if any.
    #[must_use]
    pub const fn oblateness(&self) -> Option<&Oblateness> {
        match self {
            Self::Massless => None,
            Self::Massive(massive) => massive.oblateness.as_ref(),
        }
    }
}

/// A gravitating body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MassiveBody {
    /// μ = GM. Carried instead of the mass so that the force loop never
    /// multiplies by G.
    pub gravitational_parameter: GravitationalParameter,
    /// Optional oblateness extension.
    pub oblateness: Option<Oblateness>,
}

impl MassiveBody {
    /// Create a spherical massive body.
    ///
    /// # Panics
    ///
    /// Panics unless μ > 0.
    #[must_use]
    pub fn new(gravitational_parameter: GravitationalParameter) -> Self {
        assert!(
            gravitational_parameter.as_m3_per_s2() > 0.0,
            "gravitational parameter must be positive"
        );
        Self {
            gravitational_parameter,
            oblateness: None,
        }
    }

    /// Create an oblate massive body.
    ///
    /// # Panics
    ///
    /// Panics unless μ > 0 and the axis is a unit vector.
    #[must_use]
    pub fn oblate(
        gravitational_parameter: GravitationalParameter,
        oblateness: Oblateness,
    ) -> Self {
        let mut body = Self::new(gravitational_parameter);
        let [x, y, z] = oblateness.axis;
        let norm = (x * x + y * y + z * z).sqrt();
        assert!(
            (norm - 1.0).abs() < 1e-12,
            "oblateness axis must be a unit vector"
        );
        body.oblateness = Some(oblateness);
        body
    }
}

/// Degree-2 zonal harmonic data for an oblate body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Oblateness {
    /// The dimensionless J₂ coefficient.
    pub j2: f64,
    /// The reference radius the coefficient is normalized to.
    pub reference_radius: Length,
    /// The symmetry axis, a unit vector in the inertial integration frame.
    pub axis: [f64; 3],
}

impl Oblateness {
    /// Create oblateness data.
    #[must_use]
    pub fn new(j2: f64, reference_radius_meters: f64, axis: [f64; 3]) -> Self {
        Self {
            j2,
            reference_radius: Length::new::<meter>(reference_radius_meters),
            axis,
        }
    }
}
