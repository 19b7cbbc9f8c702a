//! Rendered trajectories.

use crate::geometry::frame::Frame;
use crate::geometry::vectors::Position;

/// The segment joining two consecutive rendered trajectory points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment<F> {
    pub begin: Position<F>,
    pub end: Position<F>,
}

impl<F: Frame> LineSegment<F> {
    /// Create a segment.
    #[must_use]
    pub const fn new(begin: Position<F>, end: Position<F>) -> Self {
        Self { begin, end }
    }
}

/// Trajectories are rendered as polylines.
pub type RenderedTrajectory<F> = Vec<LineSegment<F>>;
