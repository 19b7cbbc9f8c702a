//! Engine configuration.
//!
//! Configuration is loaded from YAML, structurally validated, and further
//! checked semantically. The history and prolongation integrators are
//! independently configurable; both default to the fifth-order optimal
//! scheme, and the fixed history step defaults to 10 seconds.

use serde::{Deserialize, Serialize};
use std::path::Path;
use uom::si::f64::Time;
use uom::si::time::second;
use validator::Validate;

use crate::error::{OrreryError, OrreryResult};
use crate::physics::integrator::SprkScheme;

const DEFAULT_HISTORY_STEP_SECONDS: f64 = 10.0;

fn default_history_step_seconds() -> f64 {
    DEFAULT_HISTORY_STEP_SECONDS
}

/// A named integration scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchemeChoice {
    /// First order, one stage.
    #[serde(rename = "symplectic_euler")]
    SymplecticEuler,
    /// Second order, kick-drift-kick.
    #[serde(rename = "leapfrog")]
    Leapfrog,
    /// McLachlan–Atela 1992, optimal order 4.
    #[serde(rename = "mclachlan_atela_1992_order_4_optimal")]
    McLachlanAtela1992Order4Optimal,
    /// McLachlan–Atela 1992, optimal order 5. The default.
    #[default]
    #[serde(rename = "mclachlan_atela_1992_order_5_optimal")]
    McLachlanAtela1992Order5Optimal,
}

impl SchemeChoice {
    /// Resolve to the scheme's coefficients.
    #[must_use]
    pub fn resolve(&self) -> SprkScheme {
        match self {
            Self::SymplecticEuler => SprkScheme::symplectic_euler(),
            Self::Leapfrog => SprkScheme::leapfrog(),
            Self::McLachlanAtela1992Order4Optimal => {
                SprkScheme::mclachlan_atela_1992_order_4_optimal()
            }
            Self::McLachlanAtela1992Order5Optimal => {
                SprkScheme::mclachlan_atela_1992_order_5_optimal()
            }
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// The fixed history step, in seconds of simulated time.
    #[validate(range(min = 1e-6, max = 86400.0))]
    #[serde(default = "default_history_step_seconds")]
    pub history_step_seconds: f64,

    /// Scheme for the history integrator.
    #[serde(default)]
    pub history_scheme: SchemeChoice,

    /// Scheme for the prolongation integrator. A lower order may suit the
    /// catch-up track; the default matches the history integrator.
    #[serde(default)]
    pub prolongation_scheme: SchemeChoice,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_step_seconds: DEFAULT_HISTORY_STEP_SECONDS,
            history_scheme: SchemeChoice::default(),
            prolongation_scheme: SchemeChoice::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> OrreryResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> OrreryResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        config.validate_semantic()?;
        Ok(config)
    }

    /// Create a builder.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Semantic constraints beyond the schema.
    fn validate_semantic(&self) -> OrreryResult<()> {
        if !self.history_step_seconds.is_finite() {
            return Err(OrreryError::config("history step must be finite"));
        }
        Ok(())
    }

    /// The history step as a typed duration.
    #[must_use]
    pub fn history_step(&self) -> Time {
        Time::new::<second>(self.history_step_seconds)
    }
}

/// Builder for `EngineConfig`.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the history step in seconds.
    ///
    /// # Panics
    ///
    /// Panics unless the step is positive and finite.
    #[must_use]
    pub fn history_step_seconds(mut self, seconds: f64) -> Self {
        assert!(
            seconds > 0.0 && seconds.is_finite(),
            "the history step must be positive and finite"
        );
        self.config.history_step_seconds = seconds;
        self
    }

    /// Set the history integration scheme.
    #[must_use]
    pub const fn history_scheme(mut self, scheme: SchemeChoice) -> Self {
        self.config.history_scheme = scheme;
        self
    }

    /// Set the prolongation integration scheme.
    #[must_use]
    pub const fn prolongation_scheme(mut self, scheme: SchemeChoice) -> Self {
        self.config.prolongation_scheme = scheme;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!((config.history_step_seconds - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.history_scheme, SchemeChoice::McLachlanAtela1992Order5Optimal);
        assert_eq!(config.prolongation_scheme, SchemeChoice::McLachlanAtela1992Order5Optimal);
        assert!((config.history_step().get::<second>() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scheme_resolution() {
        assert_eq!(SchemeChoice::SymplecticEuler.resolve().order(), 1);
        assert_eq!(SchemeChoice::Leapfrog.resolve().order(), 2);
        assert_eq!(SchemeChoice::McLachlanAtela1992Order4Optimal.resolve().order(), 4);
        let order_5 = SchemeChoice::McLachlanAtela1992Order5Optimal.resolve();
        assert_eq!(order_5.order(), 5);
        assert_eq!(order_5.stages(), 6);
    }

    #[test]
    fn test_from_yaml() {
        let config = EngineConfig::from_yaml(
            "history_step_seconds: 5.0\nprolongation_scheme: leapfrog\n",
        );
        let config = match config {
            Ok(config) => config,
            Err(error) => panic!("parse failed: {error}"),
        };
        assert!((config.history_step_seconds - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.history_scheme, SchemeChoice::McLachlanAtela1992Order5Optimal);
        assert_eq!(config.prolongation_scheme, SchemeChoice::Leapfrog);
    }

    #[test]
    fn test_yaml_rejects_nonpositive_step() {
        let result = EngineConfig::from_yaml("history_step_seconds: 0.0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_yaml_rejects_unknown_fields() {
        let result = EngineConfig::from_yaml("histroy_step_seconds: 10.0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = EngineConfig::builder()
            .history_step_seconds(2.5)
            .prolongation_scheme(SchemeChoice::Leapfrog)
            .build();
        let yaml = match serde_yaml::to_string(&config) {
            Ok(yaml) => yaml,
            Err(error) => panic!("serialize failed: {error}"),
        };
        let parsed = match EngineConfig::from_yaml(&yaml) {
            Ok(parsed) => parsed,
            Err(error) => panic!("parse failed: {error}"),
        };
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = match tempfile::NamedTempFile::new() {
            Ok(file) => file,
            Err(error) => panic!("tempfile failed: {error}"),
        };
        if let Err(error) = writeln!(file, "history_step_seconds: 30.0") {
            panic!("write failed: {error}");
        }
        let config = match EngineConfig::load(file.path()) {
            Ok(config) => config,
            Err(error) => panic!("load failed: {error}"),
        };
        assert!((config.history_step_seconds - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    #[should_panic(expected = "positive and finite")]
    fn test_builder_rejects_bad_step() {
        let _ = EngineConfig::builder().history_step_seconds(-1.0);
    }
}
