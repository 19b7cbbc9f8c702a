//! The physics core: bodies, degrees of freedom, trajectory trees, the
//! symplectic integrator, the n-body force model and rendering transforms.

pub mod body;
pub mod degrees_of_freedom;
pub mod integrator;
pub mod nbody;
pub mod trajectory;
pub mod transforms;

pub use body::{Body, MassiveBody, Oblateness};
pub use degrees_of_freedom::{DegreesOfFreedom, RelativeDegreesOfFreedom};
pub use integrator::{SprkIntegrator, SprkScheme, SystemState};
pub use nbody::{NBodySystem, TrajectoryWriter};
pub use trajectory::{ForkId, Trajectory};
pub use transforms::{LazyTrajectory, Transforms, TrajectoryView};
