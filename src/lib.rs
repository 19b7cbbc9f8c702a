//! # orrery
//!
//! The physics core of a game-integrated astrodynamics engine:
//! - a symplectic partitioned Runge–Kutta integrator over separable
//!   Hamiltonians, with compensated time summation;
//! - trajectory trees with cheap forking, time-keyed lookup and lazy
//!   iteration;
//! - a world scheduler reconciling a constant-step history track with an
//!   exact-endpoint prolongation track, a physics bubble for host-controlled
//!   vessels, and pluggable reference-frame transforms for rendering.
//!
//! The core is single-threaded and runs to completion on every call; the
//! host drives it once per tick. Violations of the calling protocol are
//! programmer errors and abort with a message; only the ambient surface
//! (configuration, snapshots) returns `Result`s.
//!
//! ## Example
//!
//! ```rust
//! use orrery::prelude::*;
//!
//! let plugin = Plugin::new(
//!     Instant::EPOCH,
//!     0,
//!     GravitationalParameter::from_m3_per_s2(1.327e20),
//!     Angle::new::<orrery::angle::radian>(0.0),
//! );
//! assert_eq!(plugin.current_time(), Instant::EPOCH);
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops,  // Numerical code choices are intentional
    clippy::imprecise_flops,   // Numerical code choices are intentional
    clippy::too_many_lines,
    clippy::missing_const_for_fn,  // Many functions can't be const in stable Rust
    clippy::needless_range_loop,   // Indexed loops mirror the stacked state vector
)]

pub mod config;
pub mod error;
pub mod geometry;
pub mod physics;
pub mod plugin;
pub mod units;

/// Re-export of the `uom` angle units used at the API boundary.
pub use uom::si::angle;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{EngineConfig, EngineConfigBuilder, SchemeChoice};
    pub use crate::error::{OrreryError, OrreryResult};
    pub use crate::geometry::{
        AliceSun, Barycentric, Displacement, Frame, Instant, Position, Rendering, Velocity,
        World, WorldSun,
    };
    pub use crate::physics::{
        Body, DegreesOfFreedom, RelativeDegreesOfFreedom, SprkIntegrator, SprkScheme, Trajectory,
    };
    pub use crate::plugin::{Part, PartId, Plugin};
    pub use crate::units::GravitationalParameter;
    pub use uom::si::f64::Angle;
}

/// Re-export for the public API.
pub use error::{OrreryError, OrreryResult};
