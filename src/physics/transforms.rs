//! Trajectory-to-trajectory rendering transforms.
//!
//! A `Transforms<From, Through, To>` is a pair of lazy transforms with an
//! intermediate representation in `Through`. The trajectory produced by the
//! second transform is not the trajectory of a body: its past is re-expressed
//! from the point of view of the current instant, which is what produces the
//! familiar fixed curves when rendering in a body-centred or rotating frame.
//!
//! Reference trajectories are supplied as lazy providers, re-invoked on every
//! lookup; the borrow checker pins the referenced celestials for the lifetime
//! of the `Transforms` instance, which is created per render request.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::geometry::frame::Frame;
use crate::geometry::instant::Instant;
use crate::geometry::vectors::{Position, Velocity};
use crate::physics::degrees_of_freedom::DegreesOfFreedom;
use crate::physics::trajectory::{ForkId, Trajectory};

/// A borrowed view of one track of a trajectory tree.
#[derive(Clone, Copy)]
pub struct TrajectoryView<'a, F: Frame> {
    pub trajectory: &'a Trajectory<F>,
    pub track: ForkId,
}

impl<'a, F: Frame> TrajectoryView<'a, F> {
    /// The sample at exactly `time`.
    ///
    /// # Panics
    ///
    /// Panics if the effective timeline has no sample at `time`; reference
    /// trajectories are sampled at the same instants as the trajectories
    /// being transformed.
    #[must_use]
    pub fn sample_or_die(&self, time: Instant) -> &'a DegreesOfFreedom<F> {
        match self.trajectory.find(self.track, time) {
            Some(dof) => dof,
            None => panic!("reference trajectory has no sample at {time}"),
        }
    }

    /// The last sample of the effective timeline.
    ///
    /// # Panics
    ///
    /// Panics if the trajectory is empty.
    #[must_use]
    pub fn last_or_die(&self) -> (Instant, &'a DegreesOfFreedom<F>) {
        match self.trajectory.last(self.track) {
            Some(last) => last,
            None => panic!("reference trajectory is empty"),
        }
    }

    /// The gravitational parameter of the underlying body.
    ///
    /// # Panics
    ///
    /// Panics if the body is massless.
    #[must_use]
    pub fn gravitational_parameter_or_die(&self) -> f64 {
        match self.trajectory.body().gravitational_parameter() {
            Some(mu) => mu.as_m3_per_s2(),
            None => panic!("a massless body cannot define a reference frame"),
        }
    }
}

/// A lazy provider of a reference trajectory, re-invoked at each use because
/// the underlying trajectory may have grown since the previous one.
pub type LazyTrajectory<'a, F> = Box<dyn Fn() -> TrajectoryView<'a, F> + 'a>;

/// Reference-frame data at one instant, memoized by the first transform so
/// that rendering several vessels reuses the reference-body lookups.
#[derive(Debug, Clone, Copy)]
enum FrameData {
    Centred {
        position: [f64; 3],
        velocity: [f64; 3],
    },
    Rotating {
        origin: [f64; 3],
        origin_velocity: [f64; 3],
        basis: [[f64; 3]; 3],
    },
}

impl FrameData {
    fn forward(&self, position: [f64; 3], velocity: [f64; 3]) -> ([f64; 3], [f64; 3]) {
        match self {
            Self::Centred {
                position: origin,
                velocity: origin_velocity,
            } => (
                sub(position, *origin),
                sub(velocity, *origin_velocity),
            ),
            Self::Rotating {
                origin,
                origin_velocity,
                basis,
            } => (
                project(basis, sub(position, *origin)),
                project(basis, sub(velocity, *origin_velocity)),
            ),
        }
    }

    fn backward(&self, position: [f64; 3], velocity: [f64; 3]) -> ([f64; 3], [f64; 3]) {
        match self {
            Self::Centred {
                position: origin,
                velocity: origin_velocity,
            } => (add(position, *origin), add(velocity, *origin_velocity)),
            Self::Rotating {
                origin,
                origin_velocity,
                basis,
            } => (
                add(unproject(basis, position), *origin),
                add(unproject(basis, velocity), *origin_velocity),
            ),
        }
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalized(v: [f64; 3]) -> [f64; 3] {
    let norm = dot(v, v).sqrt();
    assert!(norm > 0.0, "degenerate rotating-frame basis");
    [v[0] / norm, v[1] / norm, v[2] / norm]
}

/// Project onto the basis (rows).
fn project(basis: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [dot(basis[0], v), dot(basis[1], v), dot(basis[2], v)]
}

/// Map back out of the basis (columns, the transpose).
fn unproject(basis: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        basis[0][0] * v[0] + basis[1][0] * v[1] + basis[2][0] * v[2],
        basis[0][1] * v[0] + basis[1][1] * v[1] + basis[2][1] * v[2],
        basis[0][2] * v[0] + basis[1][2] * v[1] + basis[2][2] * v[2],
    ]
}

fn dof_raw<F: Frame>(dof: &DegreesOfFreedom<F>) -> ([f64; 3], [f64; 3]) {
    let (x, y, z) = dof.position.as_meters();
    let (vx, vy, vz) = dof.velocity.as_meters_per_second();
    ([x, y, z], [vx, vy, vz])
}

fn raw_dof<F: Frame>(position: [f64; 3], velocity: [f64; 3]) -> DegreesOfFreedom<F> {
    DegreesOfFreedom::new(
        Position::from_meters(position[0], position[1], position[2]),
        Velocity::from_meters_per_second(velocity[0], velocity[1], velocity[2]),
    )
}

enum Kind<'a, FromFrame: Frame, ToFrame: Frame> {
    BodyCentredNonRotating {
        from_centre: LazyTrajectory<'a, FromFrame>,
        to_centre: LazyTrajectory<'a, ToFrame>,
    },
    BarycentricRotating {
        from_primary: LazyTrajectory<'a, FromFrame>,
        to_primary: LazyTrajectory<'a, ToFrame>,
        from_secondary: LazyTrajectory<'a, FromFrame>,
        to_secondary: LazyTrajectory<'a, ToFrame>,
    },
}

/// A pair of lazy trajectory transforms with caching, created per render
/// request.
pub struct Transforms<'a, FromFrame: Frame, ThroughFrame: Frame, ToFrame: Frame> {
    kind: Kind<'a, FromFrame, ToFrame>,
    first_cache: RefCell<HashMap<(u64, Instant), DegreesOfFreedom<ThroughFrame>>>,
    frame_cache: RefCell<HashMap<Instant, FrameData>>,
}

impl<'a, FromFrame, ThroughFrame, ToFrame> Transforms<'a, FromFrame, ThroughFrame, ToFrame>
where
    FromFrame: Frame,
    ThroughFrame: Frame,
    ToFrame: Frame,
{
    fn new(kind: Kind<'a, FromFrame, ToFrame>) -> Self {
        assert!(
            FromFrame::IS_INERTIAL && ToFrame::IS_INERTIAL,
            "both end frames of a transform pair must be inertial"
        );
        Self {
            kind,
            first_cache: RefCell::new(HashMap::new()),
            frame_cache: RefCell::new(HashMap::new()),
        }
    }

    /// `Through` has the same axes as `From` and the body of
    /// `from_centre` as its origin.
    #[must_use]
    pub fn body_centred_non_rotating(
        from_centre: LazyTrajectory<'a, FromFrame>,
        to_centre: LazyTrajectory<'a, ToFrame>,
    ) -> Self {
        Self::new(Kind::BodyCentredNonRotating {
            from_centre,
            to_centre,
        })
    }

    /// `Through` has its origin at the barycentre of the two bodies, its x
    /// axis from the primary to the secondary, its y axis in the plane of
    /// their relative velocity on the side of the primary's barycentric
    /// velocity, and its z axis completing a right-handed basis.
    #[must_use]
    pub fn barycentric_rotating(
        from_primary: LazyTrajectory<'a, FromFrame>,
        to_primary: LazyTrajectory<'a, ToFrame>,
        from_secondary: LazyTrajectory<'a, FromFrame>,
        to_secondary: LazyTrajectory<'a, ToFrame>,
    ) -> Self {
        Self::new(Kind::BarycentricRotating {
            from_primary,
            to_primary,
            from_secondary,
            to_secondary,
        })
    }

    fn rotating_frame_data<G: Frame>(
        primary: &TrajectoryView<'_, G>,
        primary_dof: &DegreesOfFreedom<G>,
        secondary: &TrajectoryView<'_, G>,
        secondary_dof: &DegreesOfFreedom<G>,
    ) -> FrameData {
        let mu_primary = primary.gravitational_parameter_or_die();
        let mu_secondary = secondary.gravitational_parameter_or_die();
        let (primary_position, primary_velocity) = dof_raw(primary_dof);
        let (secondary_position, secondary_velocity) = dof_raw(secondary_dof);
        let total = mu_primary + mu_secondary;
        let weight = |a: [f64; 3], b: [f64; 3]| {
            [
                (mu_primary * a[0] + mu_secondary * b[0]) / total,
                (mu_primary * a[1] + mu_secondary * b[1]) / total,
                (mu_primary * a[2] + mu_secondary * b[2]) / total,
            ]
        };
        let origin = weight(primary_position, secondary_position);
        let origin_velocity = weight(primary_velocity, secondary_velocity);

        let x_axis = normalized(sub(secondary_position, primary_position));
        let primary_relative_velocity = sub(primary_velocity, origin_velocity);
        let radial = dot(primary_relative_velocity, x_axis);
        let orthogonal = sub(
            primary_relative_velocity,
            [radial * x_axis[0], radial * x_axis[1], radial * x_axis[2]],
        );
        let y_axis = normalized(orthogonal);
        let z_axis = cross(x_axis, y_axis);
        FrameData::Rotating {
            origin,
            origin_velocity,
            basis: [x_axis, y_axis, z_axis],
        }
    }

    fn frame_data_at(&self, time: Instant) -> FrameData {
        if let Some(data) = self.frame_cache.borrow().get(&time) {
            return *data;
        }
        let data = match &self.kind {
            Kind::BodyCentredNonRotating { from_centre, .. } => {
                let centre = from_centre();
                let (position, velocity) = dof_raw(centre.sample_or_die(time));
                FrameData::Centred { position, velocity }
            }
            Kind::BarycentricRotating {
                from_primary,
                from_secondary,
                ..
            } => {
                let primary = from_primary();
                let secondary = from_secondary();
                Self::rotating_frame_data(
                    &primary,
                    primary.sample_or_die(time),
                    &secondary,
                    secondary.sample_or_die(time),
                )
            }
        };
        self.frame_cache.borrow_mut().insert(time, data);
        data
    }

    /// The frame data of the current instant, from the `to` providers.
    fn current_frame_data(&self) -> FrameData {
        match &self.kind {
            Kind::BodyCentredNonRotating { to_centre, .. } => {
                let centre = to_centre();
                let (_, dof) = centre.last_or_die();
                let (position, velocity) = dof_raw(dof);
                FrameData::Centred { position, velocity }
            }
            Kind::BarycentricRotating {
                to_primary,
                to_secondary,
                ..
            } => {
                let primary = to_primary();
                let secondary = to_secondary();
                let (_, primary_dof) = primary.last_or_die();
                let (_, secondary_dof) = secondary.last_or_die();
                Self::rotating_frame_data(&primary, primary_dof, &secondary, secondary_dof)
            }
        }
    }

    fn first_at(
        &self,
        trajectory_id: u64,
        time: Instant,
        dof: &DegreesOfFreedom<FromFrame>,
    ) -> DegreesOfFreedom<ThroughFrame> {
        let key = (trajectory_id, time);
        if let Some(cached) = self.first_cache.borrow().get(&key) {
            return *cached;
        }
        let frame = self.frame_data_at(time);
        let (position, velocity) = dof_raw(dof);
        let (through_position, through_velocity) = frame.forward(position, velocity);
        let result = raw_dof(through_position, through_velocity);
        self.first_cache.borrow_mut().insert(key, result);
        result
    }

    /// The first transform: re-express each sample in `Through` at the
    /// sample's own instant. Lazy; results are cached per
    /// `(trajectory, instant)`.
    pub fn first<'s>(
        &'s self,
        trajectory: TrajectoryView<'s, FromFrame>,
    ) -> impl Iterator<Item = (Instant, DegreesOfFreedom<ThroughFrame>)> + 's + use<'s, 'a, FromFrame, ThroughFrame, ToFrame>
    {
        trajectory
            .trajectory
            .transforming_iter(trajectory.track, move |id, time, dof| {
                self.first_at(id, time, dof)
            })
    }

    /// The second transform: map `Through` samples back into `To` using the
    /// reference frame of the current instant, so that the resulting
    /// trajectory is what the frame's observer would trace today.
    pub fn second<'s>(
        &'s self,
        trajectory: TrajectoryView<'s, ThroughFrame>,
    ) -> impl Iterator<Item = (Instant, DegreesOfFreedom<ToFrame>)> + 's {
        let frame = self.current_frame_data();
        trajectory
            .trajectory
            .transforming_iter(trajectory.track, move |_, _, dof| {
                let (position, velocity) = dof_raw(dof);
                let (to_position, to_velocity) = frame.backward(position, velocity);
                raw_dof(to_position, to_velocity)
            })
    }
}
