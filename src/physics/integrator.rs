//! Symplectic partitioned Runge–Kutta integration.
//!
//! The integrator advances a separable Hamiltonian system
//! `q̇ = v(p)`, `ṗ = f(q, t)` with a fixed step. A scheme is pure data: an
//! ordered list of stage coefficients `(aᵢ, bᵢ)` with Σa = Σb = 1. Stage k
//! kicks the momenta with `b[k]` at the current positions, then drifts the
//! positions with `a[k]` using the updated momenta; this ordering is what
//! makes the shipped coefficient sets attain their nominal order.
//!
//! Positions, momenta and the time accumulator are kept in compensated
//! double-double form, with one Kahan increment per component per completed
//! step, so roundoff stays O(ε) instead of growing with the step count.
//!
//! References: McLachlan and Atela, "The accuracy of symplectic
//! integrators", Nonlinearity 5 (1992); Hairer, Lubich, Wanner, "Geometric
//! Numerical Integration", 2006.

use serde::{Deserialize, Serialize};
use uom::si::f64::Time;
use uom::si::time::second;

use crate::geometry::instant::Instant;

/// A floating-point accumulator with a Kahan compensation term.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DoublePrecision {
    /// The accumulated value.
    pub value: f64,
    /// The running compensation.
    pub error: f64,
}

impl DoublePrecision {
    /// Create an accumulator holding `value` exactly.
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self { value, error: 0.0 }
    }

    /// Add `right` with Kahan compensation.
    pub fn increment(&mut self, right: f64) {
        let temp = self.value;
        let y = self.error + right;
        self.value = temp + y;
        self.error = (temp - self.value) + y;
    }

    /// The compensated total.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.value + self.error
    }
}

/// An integration scheme: stage coefficients, pure data.
///
/// Swapping schemes requires no code changes; the two plugin integrators can
/// be configured independently.
#[derive(Debug, Clone, PartialEq)]
pub struct SprkScheme {
    name: &'static str,
    order: u8,
    a: Vec<f64>,
    b: Vec<f64>,
}

impl SprkScheme {
    fn validated(name: &'static str, order: u8, a: Vec<f64>, b: Vec<f64>) -> Self {
        assert_eq!(a.len(), b.len(), "stage coefficient lists must match");
        assert!(!a.is_empty(), "a scheme needs at least one stage");
        let sum_a: f64 = a.iter().sum();
        let sum_b: f64 = b.iter().sum();
        assert!((sum_a - 1.0).abs() < 1e-10, "Σa must be 1, got {sum_a}");
        assert!((sum_b - 1.0).abs() < 1e-10, "Σb must be 1, got {sum_b}");
        Self { name, order, a, b }
    }

    /// First-order symplectic Euler (kick then drift).
    #[must_use]
    pub fn symplectic_euler() -> Self {
        Self::validated("symplectic Euler", 1, vec![1.0], vec![1.0])
    }

    /// Second-order leapfrog in kick-drift-kick form.
    #[must_use]
    pub fn leapfrog() -> Self {
        Self::validated("leapfrog", 2, vec![1.0, 0.0], vec![0.5, 0.5])
    }

    /// The optimal fourth-order method of McLachlan and Atela (1992),
    /// 4 stages.
    #[must_use]
    pub fn mclachlan_atela_1992_order_4_optimal() -> Self {
        Self::validated(
            "McLachlan-Atela 1992 order 4 optimal",
            4,
            vec![
                0.515_352_837_431_122_936_4,
                -0.085_782_019_412_973_646,
                0.441_583_023_616_466_524_2,
                0.128_846_158_365_384_185_4,
            ],
            vec![
                0.134_496_199_277_431_089_2,
                -0.224_819_803_079_420_805_8,
                0.756_320_000_515_668_291_1,
                0.334_003_603_286_321_425_5,
            ],
        )
    }

    /// The optimal fifth-order method of McLachlan and Atela (1992),
    /// 6 stages. The default scheme everywhere.
    #[must_use]
    pub fn mclachlan_atela_1992_order_5_optimal() -> Self {
        Self::validated(
            "McLachlan-Atela 1992 order 5 optimal",
            5,
            vec![
                0.339_839_625_839_110_000,
                -0.088_601_336_903_027_329,
                0.585_856_476_825_962_118_8,
                -0.603_039_356_536_491_888,
                0.323_580_796_554_697_639_4,
                0.442_363_794_219_749_458_7,
            ],
            vec![
                0.119_390_029_287_567_275_8,
                0.698_927_370_382_475_230_8,
                -0.171_312_358_271_600_775_4,
                0.401_269_502_251_353_448_0,
                0.010_705_081_848_235_984_0,
                -0.058_979_625_498_031_163_2,
            ],
        )
    }

    /// Number of stages.
    #[must_use]
    pub fn stages(&self) -> usize {
        self.a.len()
    }

    /// Nominal order of accuracy.
    #[must_use]
    pub const fn order(&self) -> u8 {
        self.order
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// The full state of the system between steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    /// Positions, compensated.
    pub positions: Vec<DoublePrecision>,
    /// Momenta (velocities, for unit-mass formulations), compensated.
    pub momenta: Vec<DoublePrecision>,
    /// Time, compensated.
    pub time: DoublePrecision,
}

impl SystemState {
    /// Create a state from plain values.
    #[must_use]
    pub fn new(positions: &[f64], momenta: &[f64], time: Instant) -> Self {
        Self {
            positions: positions.iter().map(|&q| DoublePrecision::new(q)).collect(),
            momenta: momenta.iter().map(|&p| DoublePrecision::new(p)).collect(),
            time: DoublePrecision::new(time.as_seconds()),
        }
    }

    /// The user-visible instant, the compensated time total.
    #[must_use]
    pub fn instant(&self) -> Instant {
        Instant::from_seconds(self.time.total())
    }
}

/// Parameters for one integration run.
#[derive(Debug, Clone)]
pub struct IntegrationParameters<'a> {
    /// The state to start from.
    pub initial_state: &'a SystemState,
    /// Where to stop.
    pub t_final: Instant,
    /// The step. Negative steps integrate backward (`t_final` before the
    /// initial time).
    pub step: Time,
    /// 0 emits only the final state; k ≥ 1 emits every k-th completed step.
    pub sampling_period: u32,
    /// Whether to land exactly on `t_final` with one final partial step.
    pub t_final_is_exact: bool,
}

/// The step engine. Holds a scheme; all run state lives on the stack.
#[derive(Debug, Clone)]
pub struct SprkIntegrator {
    scheme: SprkScheme,
}

impl SprkIntegrator {
    /// Create an integrator with the given scheme.
    #[must_use]
    pub const fn new(scheme: SprkScheme) -> Self {
        Self { scheme }
    }

    /// The scheme in use.
    #[must_use]
    pub const fn scheme(&self) -> &SprkScheme {
        &self.scheme
    }

    /// Integrate from `parameters.initial_state` to `parameters.t_final`,
    /// passing each emitted state to `emit`.
    ///
    /// `compute_force` receives `(t, q, dp_dt)` and must fill `dp_dt`;
    /// `compute_velocity` receives `(p, dq_dt)` and must fill `dq_dt`.
    /// A run that takes no step emits nothing.
    ///
    /// # Panics
    ///
    /// Panics on inconsistent vector lengths, a zero or non-finite step, or
    /// a step oriented away from `t_final`; these are programmer errors.
    pub fn solve<Force, Vel, Sink>(
        &self,
        parameters: &IntegrationParameters<'_>,
        mut compute_force: Force,
        mut compute_velocity: Vel,
        mut emit: Sink,
    ) where
        Force: FnMut(f64, &[f64], &mut [f64]),
        Vel: FnMut(&[f64], &mut [f64]),
        Sink: FnMut(&SystemState),
    {
        let dimension = parameters.initial_state.positions.len();
        assert_eq!(
            parameters.initial_state.momenta.len(),
            dimension,
            "positions and momenta must have the same dimension"
        );
        let h = parameters.step.get::<second>();
        assert!(h != 0.0 && h.is_finite(), "the step must be finite and nonzero");
        let t_final = parameters.t_final.as_seconds();
        let span = t_final - parameters.initial_state.time.total();
        assert!(
            span * h.signum() >= 0.0,
            "the step must be oriented toward t_final"
        );

        let mut state = parameters.initial_state.clone();
        let a = &self.scheme.a;
        let b = &self.scheme.b;
        let stages = self.scheme.stages();
        // Offsets of the stage positions within the step, in units of h.
        let mut c = vec![0.0; stages];
        for k in 1..stages {
            c[k] = c[k - 1] + a[k - 1];
        }

        let mut q = vec![0.0; dimension];
        let mut p = vec![0.0; dimension];
        let mut delta_q = vec![0.0; dimension];
        let mut delta_p = vec![0.0; dimension];
        let mut force = vec![0.0; dimension];
        let mut velocity = vec![0.0; dimension];

        let mut step_count: u64 = 0;

        let mut advance = |state: &mut SystemState, step_size: f64| {
            delta_q.iter_mut().for_each(|d| *d = 0.0);
            delta_p.iter_mut().for_each(|d| *d = 0.0);
            for k in 0..stages {
                let t_stage = state.time.total() + c[k] * step_size;
                for i in 0..dimension {
                    q[i] = state.positions[i].value + delta_q[i];
                }
                compute_force(t_stage, &q, &mut force);
                for i in 0..dimension {
                    delta_p[i] += step_size * b[k] * force[i];
                    p[i] = state.momenta[i].value + delta_p[i];
                }
                compute_velocity(&p, &mut velocity);
                for i in 0..dimension {
                    delta_q[i] += step_size * a[k] * velocity[i];
                }
            }
            for i in 0..dimension {
                state.positions[i].increment(delta_q[i]);
                state.momenta[i].increment(delta_p[i]);
            }
            state.time.increment(step_size);
        };

        loop {
            let reached = state.time.total() + h;
            if (reached - t_final) * h.signum() > 0.0 {
                break;
            }
            advance(&mut state, h);
            step_count += 1;
            if parameters.sampling_period != 0
                && step_count % u64::from(parameters.sampling_period) == 0
            {
                emit(&state);
            }
        }

        if parameters.t_final_is_exact {
            let remaining = t_final - state.time.total();
            if remaining * h.signum() > 0.0 {
                advance(&mut state, remaining);
                // Land exactly on the requested instant.
                state.time = DoublePrecision::new(t_final);
                step_count += 1;
                if parameters.sampling_period != 0
                    && step_count % u64::from(parameters.sampling_period) == 0
                {
                    emit(&state);
                }
            }
        }

        if parameters.sampling_period == 0 && step_count > 0 {
            emit(&state);
        }
    }
}
