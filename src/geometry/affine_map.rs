//! Affine maps between framed affine spaces.

use crate::geometry::frame::Frame;
use crate::geometry::rotation::Rotation;
use crate::geometry::vectors::Position;

/// The affine map `p ↦ to_origin + R(p − from_origin)`.
///
/// Used to anchor barycentric renderings at the host's sun position.
#[derive(Debug, Clone, Copy)]
pub struct AffineMap<From, To> {
    from_origin: Position<From>,
    to_origin: Position<To>,
    rotation: Rotation<From, To>,
}

impl<From: Frame, To: Frame> AffineMap<From, To> {
    /// Create an affine map sending `from_origin` to `to_origin` with the
    /// given change of basis.
    #[must_use]
    pub const fn new(
        from_origin: Position<From>,
        to_origin: Position<To>,
        rotation: Rotation<From, To>,
    ) -> Self {
        Self {
            from_origin,
            to_origin,
            rotation,
        }
    }

    /// Apply the map to a point.
    #[must_use]
    pub fn map(&self, point: &Position<From>) -> Position<To> {
        self.to_origin + self.rotation.apply(&(*point - self.from_origin))
    }
}
