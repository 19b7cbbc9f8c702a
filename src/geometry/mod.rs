//! Geometric foundations: reference frames, instants, frame-tagged vectors
//! and points, rotations, coordinate permutations and affine maps.
//!
//! Every vector and point carries its reference frame as a type parameter,
//! so quantities from different frames cannot be mixed without an explicit
//! transform.

pub mod affine_map;
pub mod frame;
pub mod instant;
pub mod permutation;
pub mod rotation;
pub mod vectors;

pub use affine_map::AffineMap;
pub use frame::{AliceSun, AliceWorld, Barycentric, Frame, Rendering, World, WorldSun};
pub use instant::Instant;
pub use permutation::Permutation;
pub use rotation::Rotation;
pub use vectors::{Displacement, Position, Velocity};
