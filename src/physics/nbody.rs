//! The n-body force model and integration driver.
//!
//! `NBodySystem` stacks a collection of trajectories into one flat state
//! vector, evaluates pairwise Newtonian gravitation (with an optional J₂
//! correction for oblate sources), drives the symplectic integrator, and
//! writes every emitted step back into all trajectories at the same instant
//! before any later step is written.

use std::marker::PhantomData;
use uom::si::f64::Time;
use uom::si::length::meter;

use crate::geometry::frame::Frame;
use crate::geometry::instant::Instant;
use crate::geometry::vectors::{Position, Velocity};
use crate::physics::degrees_of_freedom::DegreesOfFreedom;
use crate::physics::integrator::{IntegrationParameters, SprkIntegrator, SystemState};
use crate::physics::trajectory::{ForkId, Trajectory};

/// A mutable handle onto one track of one trajectory tree.
#[derive(Debug)]
pub struct TrajectoryWriter<'a, F: Frame> {
    pub trajectory: &'a mut Trajectory<F>,
    pub track: ForkId,
}

/// A gravitating source, hoisted out of the trajectory representation.
struct Source {
    index: usize,
    mu: f64,
    oblateness: Option<OblatenessTerm>,
}

struct OblatenessTerm {
    j2: f64,
    radius_squared: f64,
    axis: [f64; 3],
}

/// Fill `accel` with the gravitational acceleration of each body.
///
/// `q` holds 3·N position components in meters; `accel` receives m/s².
/// The oblateness loop is separate from the Newtonian loop so the common
/// case pays for a single branch per source.
fn compute_accelerations(sources: &[Source], body_count: usize, q: &[f64], accel: &mut [f64]) {
    accel.fill(0.0);
    for source in sources {
        let j = source.index;
        let (qjx, qjy, qjz) = (q[3 * j], q[3 * j + 1], q[3 * j + 2]);
        for i in 0..body_count {
            if i == j {
                continue;
            }
            let dx = qjx - q[3 * i];
            let dy = qjy - q[3 * i + 1];
            let dz = qjz - q[3 * i + 2];
            let r_squared = dx * dx + dy * dy + dz * dz;
            let r = r_squared.sqrt();
            let factor = source.mu / (r_squared * r);
            accel[3 * i] += factor * dx;
            accel[3 * i + 1] += factor * dy;
            accel[3 * i + 2] += factor * dz;
        }
        if let Some(oblateness) = &source.oblateness {
            let [zx, zy, zz] = oblateness.axis;
            for i in 0..body_count {
                if i == j {
                    continue;
                }
                // r̂ points from the oblate source to the attracted body.
                let dx = q[3 * i] - qjx;
                let dy = q[3 * i + 1] - qjy;
                let dz = q[3 * i + 2] - qjz;
                let r_squared = dx * dx + dy * dy + dz * dz;
                let r = r_squared.sqrt();
                let (ux, uy, uz) = (dx / r, dy / r, dz / r);
                let cos_latitude = ux * zx + uy * zy + uz * zz;
                let strength = 1.5 * source.mu * oblateness.j2 * oblateness.radius_squared
                    / (r_squared * r_squared);
                let radial = 5.0 * cos_latitude * cos_latitude - 1.0;
                let axial = -2.0 * cos_latitude;
                accel[3 * i] += strength * (radial * ux + axial * zx);
                accel[3 * i + 1] += strength * (radial * uy + axial * zy);
                accel[3 * i + 2] += strength * (radial * uz + axial * zz);
            }
        }
    }
}

/// Integration driver over collections of trajectories in an inertial frame.
#[derive(Debug, Clone, Default)]
pub struct NBodySystem<F: Frame> {
    _frame: PhantomData<F>,
}

impl<F: Frame> NBodySystem<F> {
    /// Create a driver.
    #[must_use]
    pub fn new() -> Self {
        assert!(F::IS_INERTIAL, "n-body integration requires an inertial frame");
        Self {
            _frame: PhantomData,
        }
    }

    /// Integrate all `targets` from their common last sample time to
    /// `t_final`. Every emitted state is appended to every target at the
    /// same instant, in target order.
    ///
    /// # Panics
    ///
    /// Panics if `targets` is empty, if any target is empty, or if the
    /// targets do not share their last sample time.
    pub fn integrate(
        &self,
        integrator: &SprkIntegrator,
        t_final: Instant,
        step: Time,
        sampling_period: u32,
        t_final_is_exact: bool,
        targets: &mut [TrajectoryWriter<'_, F>],
    ) {
        assert!(!targets.is_empty(), "nothing to integrate");
        let body_count = targets.len();

        let mut q0 = Vec::with_capacity(3 * body_count);
        let mut p0 = Vec::with_capacity(3 * body_count);
        let mut start: Option<Instant> = None;
        for writer in targets.iter() {
            let (last_time, dof) = match writer.trajectory.last(writer.track) {
                Some(last) => last,
                None => panic!("cannot integrate an empty trajectory"),
            };
            match start {
                None => start = Some(last_time),
                Some(start) => assert!(
                    start == last_time,
                    "trajectories must share their last sample time \
                     ({start} vs {last_time})"
                ),
            }
            let (x, y, z) = dof.position.as_meters();
            q0.extend_from_slice(&[x, y, z]);
            let (vx, vy, vz) = dof.velocity.as_meters_per_second();
            p0.extend_from_slice(&[vx, vy, vz]);
        }
        let start = match start {
            Some(start) => start,
            None => unreachable!(),
        };
        if t_final == start {
            return;
        }

        let sources: Vec<Source> = targets
            .iter()
            .enumerate()
            .filter_map(|(index, writer)| {
                let body = writer.trajectory.body();
                body.gravitational_parameter().map(|mu| Source {
                    index,
                    mu: mu.as_m3_per_s2(),
                    oblateness: body.oblateness().map(|oblateness| {
                        let radius = oblateness.reference_radius.get::<meter>();
                        OblatenessTerm {
                            j2: oblateness.j2,
                            radius_squared: radius * radius,
                            axis: oblateness.axis,
                        }
                    }),
                })
            })
            .collect();

        let initial = SystemState::new(&q0, &p0, start);
        let parameters = IntegrationParameters {
            initial_state: &initial,
            t_final,
            step,
            sampling_period,
            t_final_is_exact,
        };
        integrator.solve(
            &parameters,
            |_t, q, accel| compute_accelerations(&sources, body_count, q, accel),
            |p, dq_dt| dq_dt.copy_from_slice(p),
            |state| {
                let time = state.instant();
                for (k, writer) in targets.iter_mut().enumerate() {
                    let dof = DegreesOfFreedom::new(
                        Position::from_meters(
                            state.positions[3 * k].total(),
                            state.positions[3 * k + 1].total(),
                            state.positions[3 * k + 2].total(),
                        ),
                        Velocity::from_meters_per_second(
                            state.momenta[3 * k].total(),
                            state.momenta[3 * k + 1].total(),
                            state.momenta[3 * k + 2].total(),
                        ),
                    );
                    writer.trajectory.append(writer.track, time, dof);
                }
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::frame::Barycentric;
    use crate::physics::body::{Body, MassiveBody, Oblateness};
    use crate::physics::integrator::SprkScheme;
    use crate::units::GravitationalParameter;
    use uom::si::time::second;

    const SUN_MU: f64 = 1.327e20;

    fn integrator() -> SprkIntegrator {
        SprkIntegrator::new(SprkScheme::mclachlan_atela_1992_order_5_optimal())
    }

    fn seconds(value: f64) -> Time {
        Time::new::<second>(value)
    }

    fn trajectory_at(
        body: Body,
        position: (f64, f64, f64),
        velocity: (f64, f64, f64),
    ) -> Trajectory<Barycentric> {
        let mut trajectory = Trajectory::new(body);
        trajectory.append(
            ForkId::ROOT,
            Instant::EPOCH,
            DegreesOfFreedom::new(
                Position::from_meters(position.0, position.1, position.2),
                Velocity::from_meters_per_second(velocity.0, velocity.1, velocity.2),
            ),
        );
        trajectory
    }

    #[test]
    fn test_circular_orbit_tracks_analytic_solution() {
        let mu = GravitationalParameter::from_m3_per_s2(SUN_MU);
        let radius = 1.496e11;
        let speed = (SUN_MU / radius).sqrt();
        let mut sun = trajectory_at(Body::massive(mu), (0.0, 0.0, 0.0), (0.0, 0.0, 0.0));
        let mut satellite =
            trajectory_at(Body::Massless, (radius, 0.0, 0.0), (0.0, speed, 0.0));

        {
            let mut targets = [
                TrajectoryWriter {
                    trajectory: &mut sun,
                    track: ForkId::ROOT,
                },
                TrajectoryWriter {
                    trajectory: &mut satellite,
                    track: ForkId::ROOT,
                },
            ];
            NBodySystem::<Barycentric>::new().integrate(
                &integrator(),
                Instant::from_seconds(3.156e7),
                seconds(10.0),
                0,
                false,
                &mut targets,
            );
        }

        let (final_time, final_dof) = match satellite.last(ForkId::ROOT) {
            Some(last) => last,
            None => panic!("no samples"),
        };
        // A bit over one full orbit.
        let angle = speed * final_time.as_seconds() / radius;
        let expected = (radius * angle.cos(), radius * angle.sin(), 0.0);
        let (x, y, z) = final_dof.position.as_meters();
        let error =
            ((x - expected.0).powi(2) + (y - expected.1).powi(2) + (z - expected.2).powi(2)).sqrt();
        assert!(error < 1.0e4, "drift after one orbit: {error:.1} m");
    }

    #[test]
    fn test_emitted_steps_share_instants_across_targets() {
        let mu = GravitationalParameter::from_m3_per_s2(SUN_MU);
        let mut sun = trajectory_at(Body::massive(mu), (0.0, 0.0, 0.0), (0.0, 0.0, 0.0));
        let mut satellite =
            trajectory_at(Body::Massless, (1.496e11, 0.0, 0.0), (0.0, 2.978e4, 0.0));

        {
            let mut targets = [
                TrajectoryWriter {
                    trajectory: &mut sun,
                    track: ForkId::ROOT,
                },
                TrajectoryWriter {
                    trajectory: &mut satellite,
                    track: ForkId::ROOT,
                },
            ];
            NBodySystem::<Barycentric>::new().integrate(
                &integrator(),
                Instant::from_seconds(100.0),
                seconds(10.0),
                1,
                false,
                &mut targets,
            );
        }

        let sun_times: Vec<Instant> = sun.iter(ForkId::ROOT).map(|(t, _)| t).collect();
        let satellite_times: Vec<Instant> =
            satellite.iter(ForkId::ROOT).map(|(t, _)| t).collect();
        assert_eq!(sun_times, satellite_times);
        assert_eq!(sun_times.len(), 11);
    }

    #[test]
    fn test_massless_bodies_exert_nothing() {
        let mut a = trajectory_at(Body::Massless, (0.0, 0.0, 0.0), (1.0, 0.0, 0.0));
        let mut b = trajectory_at(Body::Massless, (10.0, 0.0, 0.0), (0.0, 1.0, 0.0));
        {
            let mut targets = [
                TrajectoryWriter {
                    trajectory: &mut a,
                    track: ForkId::ROOT,
                },
                TrajectoryWriter {
                    trajectory: &mut b,
                    track: ForkId::ROOT,
                },
            ];
            NBodySystem::<Barycentric>::new().integrate(
                &integrator(),
                Instant::from_seconds(10.0),
                seconds(1.0),
                0,
                false,
                &mut targets,
            );
        }
        let (_, dof) = match a.last(ForkId::ROOT) {
            Some(last) => last,
            None => panic!("no samples"),
        };
        let (x, y, z) = dof.position.as_meters();
        assert!((x - 10.0).abs() < 1e-9 && y.abs() < 1e-9 && z.abs() < 1e-9);
    }

    #[test]
    fn test_two_massive_bodies_preserve_barycentre_velocity() {
        let mu = GravitationalParameter::from_m3_per_s2(1.0e12);
        let mut a = trajectory_at(Body::massive(mu), (-1.0e7, 0.0, 0.0), (0.0, -1.0, 0.0));
        let mut b = trajectory_at(Body::massive(mu), (1.0e7, 0.0, 0.0), (0.0, 1.0, 0.0));
        {
            let mut targets = [
                TrajectoryWriter {
                    trajectory: &mut a,
                    track: ForkId::ROOT,
                },
                TrajectoryWriter {
                    trajectory: &mut b,
                    track: ForkId::ROOT,
                },
            ];
            NBodySystem::<Barycentric>::new().integrate(
                &integrator(),
                Instant::from_seconds(1000.0),
                seconds(1.0),
                0,
                false,
                &mut targets,
            );
        }
        let velocity_sum = {
            let (_, dof_a) = match a.last(ForkId::ROOT) {
                Some(last) => last,
                None => panic!("no samples"),
            };
            let (_, dof_b) = match b.last(ForkId::ROOT) {
                Some(last) => last,
                None => panic!("no samples"),
            };
            let (ax, ay, az) = dof_a.velocity.as_meters_per_second();
            let (bx, by, bz) = dof_b.velocity.as_meters_per_second();
            ((ax + bx).powi(2) + (ay + by).powi(2) + (az + bz).powi(2)).sqrt()
        };
        assert!(velocity_sum < 1e-9, "barycentre drift {velocity_sum:e}");
    }

    #[test]
    #[should_panic(expected = "share their last sample time")]
    fn test_targets_must_share_last_time() {
        let mu = GravitationalParameter::from_m3_per_s2(SUN_MU);
        let mut a = trajectory_at(Body::massive(mu), (0.0, 0.0, 0.0), (0.0, 0.0, 0.0));
        let mut b = trajectory_at(Body::Massless, (1.0e11, 0.0, 0.0), (0.0, 3.0e4, 0.0));
        b.append(
            ForkId::ROOT,
            Instant::from_seconds(5.0),
            DegreesOfFreedom::new(
                Position::from_meters(1.0e11, 1.0e5, 0.0),
                Velocity::from_meters_per_second(0.0, 3.0e4, 0.0),
            ),
        );
        let mut targets = [
            TrajectoryWriter {
                trajectory: &mut a,
                track: ForkId::ROOT,
            },
            TrajectoryWriter {
                trajectory: &mut b,
                track: ForkId::ROOT,
            },
        ];
        NBodySystem::<Barycentric>::new().integrate(
            &integrator(),
            Instant::from_seconds(10.0),
            seconds(1.0),
            0,
            false,
            &mut targets,
        );
    }

    #[test]
    fn test_zero_length_integration_appends_nothing() {
        let mu = GravitationalParameter::from_m3_per_s2(SUN_MU);
        let mut sun = trajectory_at(Body::massive(mu), (0.0, 0.0, 0.0), (0.0, 0.0, 0.0));
        {
            let mut targets = [TrajectoryWriter {
                trajectory: &mut sun,
                track: ForkId::ROOT,
            }];
            NBodySystem::<Barycentric>::new().integrate(
                &integrator(),
                Instant::EPOCH,
                seconds(10.0),
                0,
                true,
                &mut targets,
            );
        }
        assert_eq!(sun.iter(ForkId::ROOT).count(), 1);
    }

    #[test]
    fn test_j2_acceleration_in_equatorial_plane() {
        // At zero latitude the J₂ term strengthens the radial pull by
        // (3/2)·μ·J₂·R²/r⁴.
        let mu = 3.986e14;
        let j2 = 1.082_63e-3;
        let radius = 6.378e6;
        let r = 7.0e6;
        let sources = [Source {
            index: 0,
            mu,
            oblateness: Some(OblatenessTerm {
                j2,
                radius_squared: radius * radius,
                axis: [0.0, 0.0, 1.0],
            }),
        }];
        let q = [0.0, 0.0, 0.0, r, 0.0, 0.0];
        let mut accel = [0.0; 6];
        compute_accelerations(&sources, 2, &q, &mut accel);

        let newtonian = -mu / (r * r);
        let oblate = -1.5 * mu * j2 * radius * radius / (r * r * r * r);
        assert!(
            (accel[3] - (newtonian + oblate)).abs() < 1e-9 * (newtonian + oblate).abs(),
            "a_x = {}, expected {}",
            accel[3],
            newtonian + oblate
        );
        assert!(accel[4].abs() < 1e-12 && accel[5].abs() < 1e-12);
    }

    #[test]
    fn test_j2_acceleration_on_the_axis() {
        // At the pole the J₂ term weakens the pull by 3·μ·J₂·R²/r⁴.
        let mu = 3.986e14;
        let j2 = 1.082_63e-3;
        let radius = 6.378e6;
        let r = 7.0e6;
        let sources = [Source {
            index: 0,
            mu,
            oblateness: Some(OblatenessTerm {
                j2,
                radius_squared: radius * radius,
                axis: [0.0, 0.0, 1.0],
            }),
        }];
        let q = [0.0, 0.0, 0.0, 0.0, 0.0, r];
        let mut accel = [0.0; 6];
        compute_accelerations(&sources, 2, &q, &mut accel);

        let newtonian = -mu / (r * r);
        let oblate = 3.0 * mu * j2 * radius * radius / (r * r * r * r);
        assert!(
            (accel[5] - (newtonian + oblate)).abs() < 1e-9 * newtonian.abs(),
            "a_z = {}, expected {}",
            accel[5],
            newtonian + oblate
        );
    }

    #[test]
    fn test_oblate_body_construction_in_system() {
        let body = Body::Massive(MassiveBody::oblate(
            GravitationalParameter::from_m3_per_s2(3.986e14),
            Oblateness::new(1.082_63e-3, 6.378e6, [0.0, 0.0, 1.0]),
        ));
        let trajectory = trajectory_at(body, (0.0, 0.0, 0.0), (0.0, 0.0, 0.0));
        assert!(trajectory.body().oblateness().is_some());
    }
}
