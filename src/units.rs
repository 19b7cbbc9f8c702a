//! Dimensional scalar quantities and physical constants.
//!
//! Scalar quantities are `uom` SI quantities so that dimensional errors are
//! caught at compile time. The standard gravitational parameter μ = GM
//! (m³ s⁻²) is not a named `uom` quantity, so it gets a dedicated newtype
//! with explicit unit constructors, built the same way as the other wrappers.

use serde::{Deserialize, Serialize};
use uom::si::f64::Mass;
use uom::si::mass::kilogram;

/// Gravitational constant (m³ kg⁻¹ s⁻²).
pub const G: f64 = 6.674_30e-11;

/// Astronomical unit in meters.
pub const AU: f64 = 1.495_978_707e11;

/// Solar mass in kilograms.
pub const SOLAR_MASS: f64 = 1.988_92e30;

/// Earth mass in kilograms.
pub const EARTH_MASS: f64 = 5.972_2e24;

/// Standard gravitational parameter μ = GM (m³ s⁻²).
///
/// Bodies carry μ rather than a mass so that repeated multiplications by G
/// do not accumulate unit roundoff in the force loop.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct GravitationalParameter(f64);

impl GravitationalParameter {
    /// Create from a raw value in m³ s⁻².
    #[must_use]
    pub const fn from_m3_per_s2(mu: f64) -> Self {
        Self(mu)
    }

    /// Create from a mass, multiplying by G once.
    #[must_use]
    pub fn from_mass(mass: Mass) -> Self {
        Self(G * mass.get::<kilogram>())
    }

    /// Get the raw value in m³ s⁻².
    #[must_use]
    pub const fn as_m3_per_s2(&self) -> f64 {
        self.0
    }

    /// Check that the value is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-10;

    #[test]
    fn test_gravitational_parameter_roundtrip() {
        let mu = GravitationalParameter::from_m3_per_s2(3.986_004_418e14);
        assert!((mu.as_m3_per_s2() - 3.986_004_418e14).abs() < 1.0);
    }

    #[test]
    fn test_gravitational_parameter_from_mass() {
        let mu = GravitationalParameter::from_mass(Mass::new::<kilogram>(SOLAR_MASS));
        let expected = G * SOLAR_MASS;
        assert!((mu.as_m3_per_s2() - expected).abs() / expected < EPSILON);
    }

    #[test]
    fn test_gravitational_parameter_is_finite() {
        assert!(GravitationalParameter::from_m3_per_s2(1.0).is_finite());
        assert!(!GravitationalParameter::from_m3_per_s2(f64::NAN).is_finite());
    }

    #[test]
    fn test_gravitational_constant() {
        assert!((G - 6.674_30e-11).abs() < 1e-15);
    }

    #[test]
    fn test_au_constant() {
        assert!((AU - 1.495_978_707e11).abs() < 1.0);
    }

    #[test]
    fn test_mass_constants() {
        assert!(SOLAR_MASS > 1.9e30);
        assert!(EARTH_MASS > 5.9e24);
    }
}
