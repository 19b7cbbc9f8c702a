//! The world scheduler.
//!
//! The plugin owns all celestials and vessels and coordinates two
//! integration tracks. Histories advance with a constant symplectic step,
//! which preserves the integrator's long-term error behavior. Prolongations
//! are the catch-up track: they run from the history's end to the exact
//! current instant, at the cost of one non-constant final step, and are
//! discarded and re-forked whenever the histories advance.
//!
//! Caller-protocol violations (unknown indices, duplicate insertions, time
//! going backward, structural changes after initialization) are programmer
//! errors on the host's side and abort with a message.

pub mod bubble;
pub mod render;
mod snapshot;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::TAU;
use uom::si::f64::{Angle, Time};
use uom::si::time::second;

use crate::config::EngineConfig;
use crate::geometry::affine_map::AffineMap;
use crate::geometry::frame::{AliceSun, Barycentric, Rendering, World, WorldSun};
use crate::geometry::instant::Instant;
use crate::geometry::permutation::Permutation;
use crate::geometry::rotation::Rotation;
use crate::geometry::vectors::{Displacement, Position, Velocity};
use crate::physics::body::{Body, MassiveBody};
use crate::physics::degrees_of_freedom::{DegreesOfFreedom, RelativeDegreesOfFreedom};
use crate::physics::integrator::SprkIntegrator;
use crate::physics::nbody::{NBodySystem, TrajectoryWriter};
use crate::physics::trajectory::{ForkId, Trajectory};
use crate::physics::transforms::{Transforms, TrajectoryView};
use crate::units::GravitationalParameter;

pub use bubble::{Part, PartId, PhysicsBubble};
pub use render::{LineSegment, RenderedTrajectory};

/// The GUID of a vessel, as produced by the host. Used as a map key.
pub type Guid = String;

/// The index of a celestial body in the host's body table.
pub type CelestialIndex = i32;

/// A celestial body: a massive body with a history and a prolongation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Celestial {
    /// The parent in the host's two-body hierarchy; `None` only for the sun.
    /// Not used by the physics.
    parent: Option<CelestialIndex>,
    /// The root track is the history, sampled at the fixed step.
    trajectory: Trajectory<Barycentric>,
    /// A fork of the history at its last time, extended to the current
    /// instant with non-constant steps.
    prolongation: ForkId,
}

impl Celestial {
    fn new(body: MassiveBody, time: Instant, degrees_of_freedom: DegreesOfFreedom<Barycentric>) -> Self {
        let mut trajectory = Trajectory::new(Body::Massive(body));
        trajectory.append(ForkId::ROOT, time, degrees_of_freedom);
        let prolongation = trajectory.fork(ForkId::ROOT, time);
        Self {
            parent: None,
            trajectory,
            prolongation,
        }
    }

    fn history_last(&self) -> (Instant, DegreesOfFreedom<Barycentric>) {
        match self.trajectory.last(ForkId::ROOT) {
            Some((time, dof)) => (time, *dof),
            None => panic!("a celestial history cannot be empty"),
        }
    }

    fn prolongation_last(&self) -> (Instant, DegreesOfFreedom<Barycentric>) {
        match self.trajectory.last(self.prolongation) {
            Some((time, dof)) => (time, *dof),
            None => panic!("a celestial prolongation cannot be empty"),
        }
    }

    fn reset_prolongation(&mut self, time: Instant) {
        self.trajectory.delete_fork(self.prolongation);
        self.prolongation = self.trajectory.fork(ForkId::ROOT, time);
    }

    fn history_writer(&mut self) -> TrajectoryWriter<'_, Barycentric> {
        TrajectoryWriter {
            trajectory: &mut self.trajectory,
            track: ForkId::ROOT,
        }
    }

    fn prolongation_writer(&mut self) -> TrajectoryWriter<'_, Barycentric> {
        TrajectoryWriter {
            trajectory: &mut self.trajectory,
            track: self.prolongation,
        }
    }

    fn prolongation_view(&self) -> TrajectoryView<'_, Barycentric> {
        TrajectoryView {
            trajectory: &self.trajectory,
            track: self.prolongation,
        }
    }
}

/// A vessel is uninitialized until the host provides its state, then lives
/// on the prolongation track only until the next history step synchronizes
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum VesselState {
    Uninitialized,
    Unsynchronized {
        prolongation: Trajectory<Barycentric>,
    },
    Synchronized {
        /// The root track is the history.
        trajectory: Trajectory<Barycentric>,
        prolongation: ForkId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Vessel {
    parent: CelestialIndex,
    state: VesselState,
}

impl Vessel {
    const fn new(parent: CelestialIndex) -> Self {
        Self {
            parent,
            state: VesselState::Uninitialized,
        }
    }

    const fn is_initialized(&self) -> bool {
        !matches!(self.state, VesselState::Uninitialized)
    }

    const fn is_synchronized(&self) -> bool {
        matches!(self.state, VesselState::Synchronized { .. })
    }

    fn create_prolongation(&mut self, time: Instant, degrees_of_freedom: DegreesOfFreedom<Barycentric>) {
        assert!(
            !self.is_initialized(),
            "the vessel already has a trajectory"
        );
        let mut prolongation = Trajectory::new(Body::Massless);
        prolongation.append(ForkId::ROOT, time, degrees_of_freedom);
        self.state = VesselState::Unsynchronized { prolongation };
    }

    fn create_history_and_fork_prolongation(
        &mut self,
        time: Instant,
        degrees_of_freedom: DegreesOfFreedom<Barycentric>,
    ) {
        assert!(
            !self.is_synchronized(),
            "the vessel already has a history"
        );
        let mut trajectory = Trajectory::new(Body::Massless);
        trajectory.append(ForkId::ROOT, time, degrees_of_freedom);
        let prolongation = trajectory.fork(ForkId::ROOT, time);
        self.state = VesselState::Synchronized {
            trajectory,
            prolongation,
        };
    }

    fn prolongation_last(&self) -> (Instant, DegreesOfFreedom<Barycentric>) {
        match &self.state {
            VesselState::Uninitialized => panic!("the vessel was not given an initial state"),
            VesselState::Unsynchronized { prolongation } => {
                match prolongation.last(ForkId::ROOT) {
                    Some((time, dof)) => (time, *dof),
                    None => panic!("a vessel prolongation cannot be empty"),
                }
            }
            VesselState::Synchronized {
                trajectory,
                prolongation,
            } => match trajectory.last(*prolongation) {
                Some((time, dof)) => (time, *dof),
                None => panic!("a vessel prolongation cannot be empty"),
            },
        }
    }

    fn history_last(&self) -> (Instant, DegreesOfFreedom<Barycentric>) {
        match &self.state {
            VesselState::Synchronized { trajectory, .. } => match trajectory.last(ForkId::ROOT) {
                Some((time, dof)) => (time, *dof),
                None => panic!("a vessel history cannot be empty"),
            },
            _ => panic!("the vessel has no history"),
        }
    }

    fn append_history(&mut self, time: Instant, degrees_of_freedom: DegreesOfFreedom<Barycentric>) {
        match &mut self.state {
            VesselState::Synchronized { trajectory, .. } => {
                trajectory.append(ForkId::ROOT, time, degrees_of_freedom);
            }
            _ => panic!("the vessel has no history"),
        }
    }

    fn append_prolongation(
        &mut self,
        time: Instant,
        degrees_of_freedom: DegreesOfFreedom<Barycentric>,
    ) {
        match &mut self.state {
            VesselState::Uninitialized => panic!("the vessel was not given an initial state"),
            VesselState::Unsynchronized { prolongation } => {
                prolongation.append(ForkId::ROOT, time, degrees_of_freedom);
            }
            VesselState::Synchronized {
                trajectory,
                prolongation,
            } => trajectory.append(*prolongation, time, degrees_of_freedom),
        }
    }

    fn reset_prolongation(&mut self, time: Instant) {
        match &mut self.state {
            VesselState::Synchronized {
                trajectory,
                prolongation,
            } => {
                trajectory.delete_fork(*prolongation);
                *prolongation = trajectory.fork(ForkId::ROOT, time);
            }
            _ => panic!("only synchronized vessels have resettable prolongations"),
        }
    }

    fn prolongation_writer(&mut self) -> TrajectoryWriter<'_, Barycentric> {
        match &mut self.state {
            VesselState::Uninitialized => panic!("the vessel was not given an initial state"),
            VesselState::Unsynchronized { prolongation } => TrajectoryWriter {
                trajectory: prolongation,
                track: ForkId::ROOT,
            },
            VesselState::Synchronized {
                trajectory,
                prolongation,
            } => TrajectoryWriter {
                trajectory,
                track: *prolongation,
            },
        }
    }

    fn history_writer(&mut self) -> TrajectoryWriter<'_, Barycentric> {
        match &mut self.state {
            VesselState::Synchronized { trajectory, .. } => TrajectoryWriter {
                trajectory,
                track: ForkId::ROOT,
            },
            _ => panic!("the vessel has no history"),
        }
    }
}

/// The physics core exposed to the host.
pub struct Plugin {
    config: EngineConfig,
    vessels: BTreeMap<Guid, Vessel>,
    celestials: BTreeMap<CelestialIndex, Celestial>,
    /// Vessels inserted after the current history time; they have no
    /// history yet.
    unsynchronized_vessels: BTreeSet<Guid>,
    /// Vessels touched by the physics bubble since the last history step;
    /// their histories will be advanced from their prolongations.
    dirty_vessels: BTreeSet<Guid>,
    /// Vessels reasserted by the host this tick.
    kept_vessels: BTreeSet<Guid>,
    bubble: PhysicsBubble,
    n_body_system: NBodySystem<Barycentric>,
    history_integrator: SprkIntegrator,
    prolongation_integrator: SprkIntegrator,
    initializing: bool,
    planetarium_rotation: Angle,
    current_time: Instant,
    sun_index: CelestialIndex,
}

impl Plugin {
    /// Create an initializing plugin holding only the sun, at the origin of
    /// `Barycentric`.
    #[must_use]
    pub fn new(
        initial_time: Instant,
        sun_index: CelestialIndex,
        sun_gravitational_parameter: GravitationalParameter,
        planetarium_rotation: Angle,
    ) -> Self {
        Self::with_config(
            EngineConfig::default(),
            initial_time,
            sun_index,
            sun_gravitational_parameter,
            planetarium_rotation,
        )
    }

    /// Create an initializing plugin with an explicit configuration.
    #[must_use]
    pub fn with_config(
        config: EngineConfig,
        initial_time: Instant,
        sun_index: CelestialIndex,
        sun_gravitational_parameter: GravitationalParameter,
        planetarium_rotation: Angle,
    ) -> Self {
        let sun = Celestial::new(
            MassiveBody::new(sun_gravitational_parameter),
            initial_time,
            DegreesOfFreedom::new(Position::origin(), Velocity::zero()),
        );
        let mut celestials = BTreeMap::new();
        celestials.insert(sun_index, sun);
        let history_integrator = SprkIntegrator::new(config.history_scheme.resolve());
        let prolongation_integrator = SprkIntegrator::new(config.prolongation_scheme.resolve());
        Self {
            config,
            vessels: BTreeMap::new(),
            celestials,
            unsynchronized_vessels: BTreeSet::new(),
            dirty_vessels: BTreeSet::new(),
            kept_vessels: BTreeSet::new(),
            bubble: PhysicsBubble::new(),
            n_body_system: NBodySystem::new(),
            history_integrator,
            prolongation_integrator,
            initializing: true,
            planetarium_rotation,
            current_time: initial_time,
            sun_index,
        }
    }

    fn celestial(&self, index: CelestialIndex) -> &Celestial {
        match self.celestials.get(&index) {
            Some(celestial) => celestial,
            None => panic!("no celestial at index {index}"),
        }
    }

    fn vessel(&self, guid: &str) -> &Vessel {
        match self.vessels.get(guid) {
            Some(vessel) => vessel,
            None => panic!("no vessel with GUID {guid}"),
        }
    }

    fn vessel_mut(&mut self, guid: &str) -> &mut Vessel {
        match self.vessels.get_mut(guid) {
            Some(vessel) => vessel,
            None => panic!("no vessel with GUID {guid}"),
        }
    }

    /// The common last time of all histories.
    #[must_use]
    pub fn history_time(&self) -> Instant {
        self.celestial(self.sun_index).history_last().0
    }

    /// The current in-game universal time.
    #[must_use]
    pub fn current_time(&self) -> Instant {
        self.current_time
    }

    /// Whether a vessel with this GUID is known.
    #[must_use]
    pub fn has_vessel(&self, guid: &str) -> bool {
        self.vessels.contains_key(guid)
    }

    /// The change of basis between `Barycentric` and the host's sun-centred
    /// `WorldSun` at the current instant.
    fn planetarium_rotation_map(&self) -> Rotation<Barycentric, WorldSun> {
        Rotation::about_y(self.planetarium_rotation)
    }

    fn sun_looking_glass() -> Permutation<WorldSun, AliceSun> {
        Permutation::xzy()
    }

    fn barycentric_from_alice_sun(
        &self,
        from: &RelativeDegreesOfFreedom<AliceSun>,
    ) -> RelativeDegreesOfFreedom<Barycentric> {
        let unpermuted = Self::sun_looking_glass().inverse();
        let unrotated = self.planetarium_rotation_map().inverse();
        RelativeDegreesOfFreedom::new(
            unrotated.apply(&unpermuted.apply(&from.displacement)),
            unrotated.apply_velocity(&unpermuted.apply_velocity(&from.velocity)),
        )
    }

    fn alice_sun_from_barycentric(
        &self,
        from: &RelativeDegreesOfFreedom<Barycentric>,
    ) -> RelativeDegreesOfFreedom<AliceSun> {
        let rotated = self.planetarium_rotation_map();
        let permuted = Self::sun_looking_glass();
        RelativeDegreesOfFreedom::new(
            permuted.apply(&rotated.apply(&from.displacement)),
            permuted.apply_velocity(&rotated.apply_velocity(&from.velocity)),
        )
    }

    /// Insert a celestial during initialization. Its state is given as
    /// `AliceSun` offsets from an already-inserted parent.
    ///
    /// # Panics
    ///
    /// Panics after initialization, on an unknown parent, or on a duplicate
    /// index.
    pub fn insert_celestial(
        &mut self,
        celestial_index: CelestialIndex,
        gravitational_parameter: GravitationalParameter,
        parent_index: CelestialIndex,
        from_parent: &RelativeDegreesOfFreedom<AliceSun>,
    ) {
        assert!(
            self.initializing,
            "celestials must be inserted before the end of initialization"
        );
        let relative = self.barycentric_from_alice_sun(from_parent);
        let parent_state = self.celestial(parent_index).history_last().1;
        assert!(
            !self.celestials.contains_key(&celestial_index),
            "a celestial already exists at index {celestial_index}"
        );
        let mut celestial = Celestial::new(
            MassiveBody::new(gravitational_parameter),
            self.current_time,
            parent_state + relative,
        );
        celestial.parent = Some(parent_index);
        self.celestials.insert(celestial_index, celestial);
    }

    /// Flip the initialization latch; structural changes to celestials are
    /// forbidden afterwards.
    ///
    /// # Panics
    ///
    /// Panics if initialization already ended.
    pub fn end_initialization(&mut self) {
        assert!(self.initializing, "initialization already ended");
        self.initializing = false;
    }

    /// Re-hang a celestial below another parent.
    ///
    /// # Panics
    ///
    /// Panics during initialization, on unknown indices, or on the sun.
    pub fn update_celestial_hierarchy(
        &mut self,
        celestial_index: CelestialIndex,
        parent_index: CelestialIndex,
    ) {
        assert!(!self.initializing, "must be called after initialization");
        assert!(
            celestial_index != self.sun_index,
            "the sun has no parent to update"
        );
        assert!(
            self.celestials.contains_key(&parent_index),
            "no celestial at index {parent_index}"
        );
        match self.celestials.get_mut(&celestial_index) {
            Some(celestial) => celestial.parent = Some(parent_index),
            None => panic!("no celestial at index {celestial_index}"),
        }
    }

    /// Insert a vessel if it is unknown, and in any case flag it to be kept
    /// through the next `advance_time`. Returns whether the vessel was
    /// inserted, in which case `set_vessel_state_offset` must be called
    /// before the next `advance_time`.
    ///
    /// # Panics
    ///
    /// Panics during initialization or on an unknown parent index.
    pub fn insert_or_keep_vessel(&mut self, vessel_guid: &str, parent_index: CelestialIndex) -> bool {
        assert!(!self.initializing, "must be called after initialization");
        assert!(
            self.celestials.contains_key(&parent_index),
            "no celestial at index {parent_index}"
        );
        let inserted = match self.vessels.entry(vessel_guid.to_owned()) {
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(Vessel::new(parent_index));
                true
            }
            std::collections::btree_map::Entry::Occupied(mut entry) => {
                entry.get_mut().parent = parent_index;
                false
            }
        };
        self.kept_vessels.insert(vessel_guid.to_owned());
        inserted
    }

    /// Give a newly inserted vessel its state, as `AliceSun` offsets from
    /// its parent at the current instant. Must be called exactly once per
    /// vessel.
    ///
    /// # Panics
    ///
    /// Panics during initialization, on an unknown GUID, or if the vessel
    /// already has a trajectory.
    pub fn set_vessel_state_offset(
        &mut self,
        vessel_guid: &str,
        from_parent: &RelativeDegreesOfFreedom<AliceSun>,
    ) {
        assert!(!self.initializing, "must be called after initialization");
        let relative = self.barycentric_from_alice_sun(from_parent);
        let parent_index = self.vessel(vessel_guid).parent;
        let parent_state = self.celestial(parent_index).prolongation_last().1;
        let current_time = self.current_time;
        let vessel = self.vessel_mut(vessel_guid);
        vessel.create_prolongation(current_time, parent_state + relative);
        assert!(
            self.unsynchronized_vessels.insert(vessel_guid.to_owned()),
            "vessel {vessel_guid} was already pending synchronization"
        );
    }

    /// Add a vessel and its parts to the physics bubble assembled for the
    /// next `advance_time`, marking the vessel dirty.
    ///
    /// # Panics
    ///
    /// Panics on an unknown GUID or a duplicate vessel or part.
    pub fn add_vessel_to_next_physics_bubble(
        &mut self,
        vessel_guid: &str,
        parts: Vec<(PartId, Part)>,
    ) {
        assert!(!self.initializing, "must be called after initialization");
        assert!(
            self.vessel(vessel_guid).is_initialized(),
            "vessel {vessel_guid} was not given an initial state"
        );
        self.dirty_vessels.insert(vessel_guid.to_owned());
        self.bubble.add_vessel_to_next(vessel_guid, parts);
    }

    /// Simulate the system up to instant `t`, removing every vessel that was
    /// not kept since the previous call.
    ///
    /// # Panics
    ///
    /// Panics during initialization or if `t` is not later than the current
    /// time.
    pub fn advance_time(&mut self, t: Instant, planetarium_rotation: Angle) {
        assert!(!self.initializing, "must be called after initialization");
        assert!(
            t > self.current_time,
            "cannot advance backward from {} to {t}",
            self.current_time
        );
        self.clean_up_vessels();
        self.prepare_bubble();
        if self.history_time() + self.config.history_step() <= t {
            self.evolve_histories(t);
            if !self.unsynchronized_vessels.is_empty()
                || !self.dirty_vessels.is_empty()
                || !self.bubble.is_empty()
            {
                self.synchronize_new_vessels_and_clean_dirty_vessels();
            }
            self.reset_prolongations();
        }
        self.evolve_prolongations_and_bubble(t);
        self.current_time = t;
        self.planetarium_rotation = planetarium_rotation;
    }

    fn check_vessel_invariants(&self, guid: &str, vessel: &Vessel, history_time: Instant) {
        assert!(
            vessel.is_initialized(),
            "vessel {guid} was not given an initial state"
        );
        let (prolongation_time, _) = vessel.prolongation_last();
        // A vessel inserted before the first advance sits exactly at the
        // history time, hence >= rather than >.
        assert!(
            prolongation_time >= history_time,
            "vessel {guid} prolongation ends at {prolongation_time}, before {history_time}"
        );
        if self.unsynchronized_vessels.contains(guid) {
            assert!(
                !vessel.is_synchronized(),
                "vessel {guid} has a history but is marked unsynchronized"
            );
        } else {
            assert!(
                vessel.is_synchronized(),
                "vessel {guid} has no history but is not marked unsynchronized"
            );
            let (history_last, _) = vessel.history_last();
            assert!(
                history_last == history_time,
                "vessel {guid} history ends at {history_last}, not at {history_time}"
            );
        }
    }

    /// Remove every vessel not in `kept_vessels`, and clear `kept_vessels`.
    fn clean_up_vessels(&mut self) {
        let history_time = self.history_time();
        for (guid, vessel) in &self.vessels {
            self.check_vessel_invariants(guid, vessel, history_time);
        }
        let kept = std::mem::take(&mut self.kept_vessels);
        let removed: Vec<Guid> = self
            .vessels
            .keys()
            .filter(|guid| !kept.contains(*guid))
            .cloned()
            .collect();
        for guid in &removed {
            self.vessels.remove(guid);
            self.unsynchronized_vessels.remove(guid);
            self.dirty_vessels.remove(guid);
        }
    }

    /// Swap the next bubble in and seed its centre-of-mass trajectory at the
    /// current instant.
    fn prepare_bubble(&mut self) {
        let rotation = self.planetarium_rotation_map();
        let mut barycentric_states = BTreeMap::new();
        for guid in self.bubble.next_vessel_guids() {
            let state = self.vessel(&guid).prolongation_last().1;
            barycentric_states.insert(guid, state);
        }
        self.bubble
            .prepare(&rotation, self.current_time, &barycentric_states);
    }

    /// Advance the histories of the celestials and of the synchronized,
    /// non-bubble, non-dirty vessels by whole steps, up to at most `t`.
    fn evolve_histories(&mut self, t: Instant) {
        let step = self.config.history_step();
        let mut targets: Vec<TrajectoryWriter<'_, Barycentric>> =
            Vec::with_capacity(self.celestials.len() + self.vessels.len());
        for celestial in self.celestials.values_mut() {
            targets.push(celestial.history_writer());
        }
        let bubble = &self.bubble;
        let dirty = &self.dirty_vessels;
        for (guid, vessel) in &mut self.vessels {
            if vessel.is_synchronized() && !bubble.contains(guid) && !dirty.contains(guid) {
                targets.push(vessel.history_writer());
            }
        }
        self.n_body_system
            .integrate(&self.history_integrator, t, step, 0, false, &mut targets);
    }

    /// Catch the prolongations of the unsynchronized and dirty vessels (and
    /// the bubble) up to the new history time, then give them histories.
    fn synchronize_new_vessels_and_clean_dirty_vessels(&mut self) {
        let history_time = self.history_time();
        let step = self.config.history_step();
        let members = self.bubble.vessel_guids();
        {
            let mut targets: Vec<TrajectoryWriter<'_, Barycentric>> = Vec::new();
            for celestial in self.celestials.values_mut() {
                targets.push(celestial.prolongation_writer());
            }
            let unsynchronized = &self.unsynchronized_vessels;
            let dirty = &self.dirty_vessels;
            for (guid, vessel) in &mut self.vessels {
                if members.contains(guid) {
                    continue;
                }
                if unsynchronized.contains(guid)
                    || (dirty.contains(guid) && vessel.is_synchronized())
                {
                    targets.push(vessel.prolongation_writer());
                }
            }
            if let Some(writer) = self.bubble.centre_of_mass_writer() {
                targets.push(writer);
            }
            self.n_body_system.integrate(
                &self.prolongation_integrator,
                history_time,
                step,
                0,
                true,
                &mut targets,
            );
        }
        if !self.bubble.is_empty() {
            self.synchronize_bubble_histories(history_time);
        }
        let still_unsynchronized: Vec<Guid> =
            self.unsynchronized_vessels.iter().cloned().collect();
        for guid in still_unsynchronized {
            assert!(!self.bubble.contains(&guid));
            let vessel = self.vessel_mut(&guid);
            let (_, state) = vessel.prolongation_last();
            vessel.create_history_and_fork_prolongation(history_time, state);
            self.dirty_vessels.remove(&guid);
        }
        self.unsynchronized_vessels.clear();
        let still_dirty: Vec<Guid> = self.dirty_vessels.iter().cloned().collect();
        for guid in still_dirty {
            assert!(!self.bubble.contains(&guid));
            let vessel = self.vessel_mut(&guid);
            let (_, state) = vessel.prolongation_last();
            vessel.append_history(history_time, state);
        }
        self.dirty_vessels.clear();
    }

    /// Extend the histories of the bubble's vessels from the integrated
    /// centre of mass; new bubble vessels become synchronized here.
    fn synchronize_bubble_histories(&mut self, history_time: Instant) {
        let centre_of_mass = self.bubble.centre_of_mass_last();
        for guid in self.bubble.vessel_guids() {
            let offset = self.bubble.from_centre_of_mass(&guid);
            let state = centre_of_mass + offset;
            let vessel = match self.vessels.get_mut(&guid) {
                Some(vessel) => vessel,
                None => panic!("no vessel with GUID {guid}"),
            };
            if vessel.is_synchronized() {
                vessel.append_history(history_time, state);
            } else {
                vessel.create_history_and_fork_prolongation(history_time, state);
                assert!(self.unsynchronized_vessels.remove(&guid));
            }
            assert!(self.dirty_vessels.remove(&guid));
        }
    }

    /// Delete all prolongations and re-fork them at the history time.
    fn reset_prolongations(&mut self) {
        let history_time = self.history_time();
        for vessel in self.vessels.values_mut() {
            vessel.reset_prolongation(history_time);
        }
        for celestial in self.celestials.values_mut() {
            celestial.reset_prolongation(history_time);
        }
    }

    /// Advance all prolongations (and the bubble's centre of mass) to
    /// exactly `t`; bubble vessels follow the centre of mass.
    fn evolve_prolongations_and_bubble(&mut self, t: Instant) {
        let step = self.config.history_step();
        let members = self.bubble.vessel_guids();
        {
            let mut targets: Vec<TrajectoryWriter<'_, Barycentric>> =
                Vec::with_capacity(self.celestials.len() + self.vessels.len() + 1);
            for celestial in self.celestials.values_mut() {
                targets.push(celestial.prolongation_writer());
            }
            for (guid, vessel) in &mut self.vessels {
                if !members.contains(guid) {
                    targets.push(vessel.prolongation_writer());
                }
            }
            if let Some(writer) = self.bubble.centre_of_mass_writer() {
                targets.push(writer);
            }
            self.n_body_system.integrate(
                &self.prolongation_integrator,
                t,
                step,
                0,
                true,
                &mut targets,
            );
        }
        if !self.bubble.is_empty() {
            let centre_of_mass = self.bubble.centre_of_mass_last();
            for guid in members {
                let offset = self.bubble.from_centre_of_mass(&guid);
                let vessel = self.vessel_mut(&guid);
                // When the history step landed exactly on t, the re-forked
                // prolongation already holds the synchronized state.
                if vessel.prolongation_last().0 == t {
                    continue;
                }
                vessel.append_prolongation(t, centre_of_mass + offset);
            }
        }
    }

    /// The vessel's displacement and velocity relative to its parent at the
    /// current instant, in `AliceSun`.
    ///
    /// # Panics
    ///
    /// Panics during initialization, on an unknown GUID, or on an
    /// uninitialized vessel.
    #[must_use]
    pub fn vessel_from_parent(&self, vessel_guid: &str) -> RelativeDegreesOfFreedom<AliceSun> {
        assert!(!self.initializing, "must be called after initialization");
        let vessel = self.vessel(vessel_guid);
        assert!(
            vessel.is_initialized(),
            "vessel {vessel_guid} was not given an initial state"
        );
        let parent = self.celestial(vessel.parent);
        let relative = vessel.prolongation_last().1 - parent.prolongation_last().1;
        self.alice_sun_from_barycentric(&relative)
    }

    /// The celestial's displacement and velocity relative to its parent at
    /// the current instant, in `AliceSun`.
    ///
    /// # Panics
    ///
    /// Panics during initialization, on an unknown index, or on the sun.
    #[must_use]
    pub fn celestial_from_parent(
        &self,
        celestial_index: CelestialIndex,
    ) -> RelativeDegreesOfFreedom<AliceSun> {
        assert!(!self.initializing, "must be called after initialization");
        let celestial = self.celestial(celestial_index);
        let parent_index = match celestial.parent {
            Some(parent) => parent,
            None => panic!("the celestial at index {celestial_index} is the sun"),
        };
        let parent = self.celestial(parent_index);
        let relative = celestial.prolongation_last().1 - parent.prolongation_last().1;
        self.alice_sun_from_barycentric(&relative)
    }

    /// Transforms rendering trajectories relative to the body at
    /// `reference_body_index`, with nonrotating axes.
    ///
    /// # Panics
    ///
    /// Panics on an unknown index.
    #[must_use]
    pub fn new_body_centred_non_rotating_transforms(
        &self,
        reference_body_index: CelestialIndex,
    ) -> Transforms<'_, Barycentric, Rendering, Barycentric> {
        let celestial = self.celestial(reference_body_index);
        Transforms::body_centred_non_rotating(
            Box::new(move || celestial.prolongation_view()),
            Box::new(move || celestial.prolongation_view()),
        )
    }

    /// Transforms rendering trajectories in the rotating frame of two
    /// bodies, anchored at their barycentre.
    ///
    /// # Panics
    ///
    /// Panics on unknown indices.
    #[must_use]
    pub fn new_barycentric_rotating_transforms(
        &self,
        primary_index: CelestialIndex,
        secondary_index: CelestialIndex,
    ) -> Transforms<'_, Barycentric, Rendering, Barycentric> {
        let primary = self.celestial(primary_index);
        let secondary = self.celestial(secondary_index);
        Transforms::barycentric_rotating(
            Box::new(move || primary.prolongation_view()),
            Box::new(move || primary.prolongation_view()),
            Box::new(move || secondary.prolongation_view()),
            Box::new(move || secondary.prolongation_view()),
        )
    }

    /// Render the vessel's history as a polyline in the host's world frame.
    /// An unsynchronized vessel yields an empty rendering.
    ///
    /// # Panics
    ///
    /// Panics during initialization, on an unknown GUID, or on an
    /// uninitialized vessel.
    #[must_use]
    pub fn rendered_vessel_trajectory(
        &self,
        vessel_guid: &str,
        transforms: &Transforms<'_, Barycentric, Rendering, Barycentric>,
        sun_world_position: Position<World>,
    ) -> RenderedTrajectory<World> {
        assert!(!self.initializing, "must be called after initialization");
        let sun = self.celestial(self.sun_index);
        let to_world = AffineMap::new(
            sun.prolongation_last().1.position,
            sun_world_position,
            Rotation::<WorldSun, World>::identity() * self.planetarium_rotation_map(),
        );
        let vessel = self.vessel(vessel_guid);
        assert!(
            vessel.is_initialized(),
            "vessel {vessel_guid} was not given an initial state"
        );
        let mut rendered = RenderedTrajectory::new();
        let VesselState::Synchronized { trajectory, .. } = &vessel.state else {
            // Neither unsynchronized histories nor prolongations are
            // rendered.
            return rendered;
        };

        let mut intermediate = Trajectory::<Rendering>::new(trajectory.body().clone());
        for (time, dof) in transforms.first(TrajectoryView {
            trajectory,
            track: ForkId::ROOT,
        }) {
            intermediate.append(ForkId::ROOT, time, dof);
        }

        let mut apparent = Trajectory::<Barycentric>::new(trajectory.body().clone());
        for (time, dof) in transforms.second(TrajectoryView {
            trajectory: &intermediate,
            track: ForkId::ROOT,
        }) {
            apparent.append(ForkId::ROOT, time, dof);
        }

        let mut previous: Option<Position<Barycentric>> = None;
        for (_, dof) in apparent.iter(ForkId::ROOT) {
            if let Some(previous) = previous {
                rendered.push(LineSegment::new(
                    to_world.map(&previous),
                    to_world.map(&dof.position),
                ));
            }
            previous = Some(dof.position);
        }
        rendered
    }

    /// The vessel's current position in the host's world frame, anchored at
    /// its parent's world position.
    #[must_use]
    pub fn vessel_world_position(
        &self,
        vessel_guid: &str,
        parent_world_position: Position<World>,
    ) -> Position<World> {
        let vessel = self.vessel(vessel_guid);
        assert!(
            vessel.is_initialized(),
            "vessel {vessel_guid} was not given an initial state"
        );
        let parent = self.celestial(vessel.parent);
        let to_world = AffineMap::new(
            parent.prolongation_last().1.position,
            parent_world_position,
            Rotation::<WorldSun, World>::identity() * self.planetarium_rotation_map(),
        );
        to_world.map(&vessel.prolongation_last().1.position)
    }

    /// The vessel's current velocity in the host's world frame, accounting
    /// for the rotation of that frame about the parent.
    #[must_use]
    pub fn vessel_world_velocity(
        &self,
        vessel_guid: &str,
        parent_world_velocity: Velocity<World>,
        parent_rotation_period: Time,
    ) -> Velocity<World> {
        let vessel = self.vessel(vessel_guid);
        assert!(
            vessel.is_initialized(),
            "vessel {vessel_guid} was not given an initial state"
        );
        let parent = self.celestial(vessel.parent);
        let relative = vessel.prolongation_last().1 - parent.prolongation_last().1;
        let to_world = Rotation::<WorldSun, World>::identity() * self.planetarium_rotation_map();

        // The world frame rotates about the y axis with the parent's period.
        let angular_speed = TAU / parent_rotation_period.get::<second>();
        let (dx, _, dz) = relative.displacement.as_meters();
        let frame_velocity =
            Velocity::<Barycentric>::from_meters_per_second(angular_speed * dz, 0.0, -angular_speed * dx);
        to_world.apply_velocity(&(frame_velocity + relative.velocity)) + parent_world_velocity
    }

    /// Whether the current physics bubble is empty.
    #[must_use]
    pub fn physics_bubble_is_empty(&self) -> bool {
        self.bubble.is_empty()
    }

    /// The `World` shift to apply to the physics bubble so it sits where
    /// the integrated centre of mass says it should.
    ///
    /// # Panics
    ///
    /// Panics if the bubble is empty.
    #[must_use]
    pub fn bubble_displacement_correction(
        &self,
        sun_world_position: Position<World>,
    ) -> Displacement<World> {
        self.bubble.displacement_correction(
            &self.planetarium_rotation_map(),
            self.celestial(self.sun_index).prolongation_last().1.position,
            sun_world_position,
        )
    }

    /// The `World` velocity shift to apply to the physics bubble, relative
    /// to a reference celestial.
    ///
    /// # Panics
    ///
    /// Panics if the bubble is empty or the index is unknown.
    #[must_use]
    pub fn bubble_velocity_correction(
        &self,
        reference_body_index: CelestialIndex,
    ) -> Velocity<World> {
        self.bubble.velocity_correction(
            &self.planetarium_rotation_map(),
            self.celestial(reference_body_index).prolongation_last().1.velocity,
        )
    }
}
