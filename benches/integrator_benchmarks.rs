//! Integrator benchmarks.
//!
//! The harmonic oscillator is the reference workload for the step engine;
//! the two-body run exercises the full n-body driver including trajectory
//! appends.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use orrery::physics::integrator::{IntegrationParameters, SystemState};
use orrery::physics::nbody::{NBodySystem, TrajectoryWriter};
use orrery::physics::trajectory::ForkId;
use orrery::prelude::*;
use uom::si::f64::Time;
use uom::si::time::second;

fn bench_harmonic_oscillator(c: &mut Criterion) {
    let mut group = c.benchmark_group("harmonic_oscillator");
    group.sample_size(10);

    for (name, scheme) in [
        ("leapfrog", SprkScheme::leapfrog()),
        (
            "mclachlan_atela_order_5",
            SprkScheme::mclachlan_atela_1992_order_5_optimal(),
        ),
    ] {
        let integrator = SprkIntegrator::new(scheme);
        group.bench_function(name, |b| {
            b.iter(|| {
                let initial = SystemState::new(&[1.0], &[0.0], Instant::EPOCH);
                let mut final_q = 0.0;
                integrator.solve(
                    &IntegrationParameters {
                        initial_state: &initial,
                        t_final: Instant::from_seconds(1000.0),
                        step: Time::new::<second>(1.0e-3),
                        sampling_period: 0,
                        t_final_is_exact: false,
                    },
                    |_t, q, dp_dt| {
                        for (out, &q) in dp_dt.iter_mut().zip(q) {
                            *out = -q;
                        }
                    },
                    |p, dq_dt| dq_dt.copy_from_slice(p),
                    |state| final_q = state.positions[0].total(),
                );
                black_box(final_q)
            });
        });
    }

    group.finish();
}

fn bench_two_body_day(c: &mut Criterion) {
    let mut group = c.benchmark_group("two_body");
    group.sample_size(10);

    let integrator = SprkIntegrator::new(SprkScheme::mclachlan_atela_1992_order_5_optimal());
    let system = NBodySystem::<Barycentric>::new();
    let mu = GravitationalParameter::from_m3_per_s2(1.327e20);
    let radius = 1.496e11;
    let speed = (1.327e20_f64 / radius).sqrt();

    group.bench_function("one_day_of_ten_second_steps", |b| {
        b.iter(|| {
            let mut sun = Trajectory::new(Body::massive(mu));
            sun.append(
                ForkId::ROOT,
                Instant::EPOCH,
                DegreesOfFreedom::new(Position::origin(), Velocity::zero()),
            );
            let mut satellite = Trajectory::new(Body::Massless);
            satellite.append(
                ForkId::ROOT,
                Instant::EPOCH,
                DegreesOfFreedom::new(
                    Position::from_meters(radius, 0.0, 0.0),
                    Velocity::from_meters_per_second(0.0, speed, 0.0),
                ),
            );
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
                system.integrate(
                    &integrator,
                    Instant::from_seconds(86_400.0),
                    Time::new::<second>(10.0),
                    0,
                    false,
                    &mut targets,
                );
            }
            black_box(satellite.last(ForkId::ROOT).map(|(time, _)| time))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_harmonic_oscillator, bench_two_body_day);
criterion_main!(benches);
