//! Reference-frame markers.
//!
//! Frames are zero-sized type-level tags. The integrator and the rotating
//! transforms require inertial frames; the `IS_INERTIAL` constant carries
//! that property so it can be asserted where it matters.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A reference frame, used as a phantom type parameter on vectors, points
/// and trajectories.
pub trait Frame:
    Copy + Clone + Debug + Default + PartialEq + Eq + Serialize + DeserializeOwned + 'static
{
    /// Whether this frame is inertial. Integration and certain transforms
    /// are only meaningful in inertial frames.
    const IS_INERTIAL: bool;
}

/// The inertial frame of the solar system, with its origin at the sun's
/// position at construction time and the axes of `World` at the epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barycentric;

impl Frame for Barycentric {
    const IS_INERTIAL: bool = true;
}

/// The intermediate frame used while rendering a trajectory. Its definition
/// depends on the transform that produces it, see `Transforms`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendering;

impl Frame for Rendering {
    const IS_INERTIAL: bool = false;
}

/// The host's world coordinates. The basis is left-handed and occasionally
/// rotates with the surface of the focused body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct World;

impl Frame for World {
    const IS_INERTIAL: bool = false;
}

/// `World` with the y and z axes exchanged, making it right-handed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliceWorld;

impl Frame for AliceWorld {
    const IS_INERTIAL: bool = false;
}

/// A nonrotating frame comoving with the sun, with the axes of `AliceWorld`.
/// Since the axes follow the host's world axes, quantities taken at different
/// instants are not comparable; differences at the same instant are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliceSun;

impl Frame for AliceSun {
    const IS_INERTIAL: bool = false;
}

/// Same as `AliceSun` but with the axes of `World`, with the same caveats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSun;

impl Frame for WorldSun {
    const IS_INERTIAL: bool = false;
}
