//! The physics bubble.
//!
//! Vessels whose motion is controlled by the host's own physics engine are
//! aggregated into one centre-of-mass trajectory that the core integrates
//! like any other massless body. Two snapshots are kept: `current`, which is
//! consistent with the last `advance_time`, and `next`, assembled by host
//! calls during the tick and swapped in by `prepare`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uom::si::f64::Mass;
use uom::si::mass::kilogram;

use crate::geometry::affine_map::AffineMap;
use crate::geometry::frame::{Barycentric, World, WorldSun};
use crate::geometry::instant::Instant;
use crate::geometry::rotation::Rotation;
use crate::geometry::vectors::{Displacement, Position, Velocity};
use crate::physics::body::Body;
use crate::physics::degrees_of_freedom::{
    barycentre, DegreesOfFreedom, RelativeDegreesOfFreedom,
};
use crate::physics::nbody::TrajectoryWriter;
use crate::physics::trajectory::{ForkId, Trajectory};
use crate::plugin::Guid;

/// Identifies a part across host calls.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PartId(pub u32);

/// A rigid part of a vessel, as reported by the host in its world frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub degrees_of_freedom: DegreesOfFreedom<World>,
    pub mass: Mass,
}

impl Part {
    /// Create a part.
    #[must_use]
    pub fn new(degrees_of_freedom: DegreesOfFreedom<World>, mass_kilograms: f64) -> Self {
        assert!(mass_kilograms > 0.0, "a part must have positive mass");
        Self {
            degrees_of_freedom,
            mass: Mass::new::<kilogram>(mass_kilograms),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BubbleContents {
    /// Part ids per member vessel.
    vessels: BTreeMap<Guid, Vec<PartId>>,
    /// All parts in the bubble.
    parts: BTreeMap<PartId, Part>,
}

impl BubbleContents {
    fn world_centre_of_mass(&self, part_ids: impl Iterator<Item = PartId>) -> DegreesOfFreedom<World> {
        let weighted: Vec<(DegreesOfFreedom<World>, f64)> = part_ids
            .map(|id| {
                let part = match self.parts.get(&id) {
                    Some(part) => part,
                    None => panic!("unknown part {id:?}"),
                };
                (part.degrees_of_freedom, part.mass.get::<kilogram>())
            })
            .collect();
        barycentre(&weighted)
    }

    fn vessel_mass(&self, part_ids: &[PartId]) -> f64 {
        part_ids
            .iter()
            .map(|id| match self.parts.get(id) {
                Some(part) => part.mass.get::<kilogram>(),
                None => panic!("unknown part {id:?}"),
            })
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CurrentBubble {
    contents: BubbleContents,
    /// The integrated centre of mass, a massless trajectory in `Barycentric`.
    centre_of_mass_trajectory: Trajectory<Barycentric>,
    /// Barycentric offset of each member vessel from the centre of mass.
    from_centre_of_mass: BTreeMap<Guid, RelativeDegreesOfFreedom<Barycentric>>,
    /// The parts' centre of mass as the host reported it, used by the
    /// correction queries.
    world_centre_of_mass: DegreesOfFreedom<World>,
}

/// The aggregate of all vessels inside the host's physics range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhysicsBubble {
    current: Option<CurrentBubble>,
    next: Option<BubbleContents>,
}

impl PhysicsBubble {
    /// Create an empty bubble.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the current bubble is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Whether `guid` is a member of the current bubble.
    #[must_use]
    pub fn contains(&self, guid: &str) -> bool {
        self.current
            .as_ref()
            .is_some_and(|current| current.contents.vessels.contains_key(guid))
    }

    /// The member vessels of the current bubble.
    #[must_use]
    pub fn vessel_guids(&self) -> BTreeSet<Guid> {
        self.current
            .as_ref()
            .map(|current| current.contents.vessels.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of member vessels of the current bubble.
    #[must_use]
    pub fn number_of_vessels(&self) -> usize {
        self.current
            .as_ref()
            .map_or(0, |current| current.contents.vessels.len())
    }

    /// The member vessels of the bubble being assembled for the next tick.
    #[must_use]
    pub fn next_vessel_guids(&self) -> BTreeSet<Guid> {
        self.next
            .as_ref()
            .map(|next| next.vessels.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Add a vessel with its parts to the next bubble.
    ///
    /// # Panics
    ///
    /// Panics if the vessel or any part id is already in the next bubble, or
    /// if `parts` is empty.
    pub fn add_vessel_to_next(&mut self, guid: &str, parts: Vec<(PartId, Part)>) {
        assert!(!parts.is_empty(), "a bubble vessel needs at least one part");
        let next = self.next.get_or_insert_with(BubbleContents::default);
        assert!(
            !next.vessels.contains_key(guid),
            "vessel {guid} is already in the next physics bubble"
        );
        let mut ids = Vec::with_capacity(parts.len());
        for (id, part) in parts {
            assert!(
                next.parts.insert(id, part).is_none(),
                "part {id:?} is already in the next physics bubble"
            );
            ids.push(id);
        }
        next.vessels.insert(guid.to_owned(), ids);
    }

    /// Swap `next` into `current` and seed the centre-of-mass trajectory at
    /// `current_time`.
    ///
    /// A freshly formed bubble (or one sharing no part with its predecessor)
    /// is seeded from the member vessels' own barycentric states. A bubble
    /// persisting from the previous tick continues its integrated centre of
    /// mass, displaced by how much the host's physics moved the parts common
    /// to both snapshots.
    ///
    /// `barycentric_states` must hold the state of every next-bubble vessel
    /// at `current_time`.
    pub fn prepare(
        &mut self,
        planetarium_rotation: &Rotation<Barycentric, WorldSun>,
        current_time: Instant,
        barycentric_states: &BTreeMap<Guid, DegreesOfFreedom<Barycentric>>,
    ) {
        let next = self.next.take();
        let previous = self.current.take();
        self.current = next.map(|contents| {
            let world_centre_of_mass =
                contents.world_centre_of_mass(contents.parts.keys().copied());

            let mut from_centre_of_mass = BTreeMap::new();
            let mut restart_seeds: Vec<(DegreesOfFreedom<Barycentric>, f64)> = Vec::new();
            for (guid, part_ids) in &contents.vessels {
                let vessel_world = contents.world_centre_of_mass(part_ids.iter().copied());
                let offset =
                    barycentric_relative_from_world(planetarium_rotation, vessel_world - world_centre_of_mass);
                let state = match barycentric_states.get(guid) {
                    Some(state) => *state,
                    None => panic!("no barycentric state for bubble vessel {guid}"),
                };
                restart_seeds.push((state + (-offset), contents.vessel_mass(part_ids)));
                from_centre_of_mass.insert(guid.clone(), offset);
            }

            let common: Vec<PartId> = previous
                .as_ref()
                .map(|previous| {
                    contents
                        .parts
                        .keys()
                        .filter(|id| previous.contents.parts.contains_key(id))
                        .copied()
                        .collect()
                })
                .unwrap_or_default();
            let seed = match &previous {
                Some(previous) if !common.is_empty() => {
                    let was = previous.contents.world_centre_of_mass(common.iter().copied());
                    let is = contents.world_centre_of_mass(common.iter().copied());
                    let delta = barycentric_relative_from_world(planetarium_rotation, is - was);
                    let last = match previous.centre_of_mass_trajectory.last(ForkId::ROOT) {
                        Some((_, dof)) => *dof,
                        None => panic!("the centre-of-mass trajectory is empty"),
                    };
                    last + delta
                }
                _ => barycentre(&restart_seeds),
            };

            let mut centre_of_mass_trajectory = Trajectory::new(Body::Massless);
            centre_of_mass_trajectory.append(ForkId::ROOT, current_time, seed);
            CurrentBubble {
                contents,
                centre_of_mass_trajectory,
                from_centre_of_mass,
                world_centre_of_mass,
            }
        });
    }

    fn current_or_die(&self) -> &CurrentBubble {
        match &self.current {
            Some(current) => current,
            None => panic!("the physics bubble is empty"),
        }
    }

    /// A writer onto the centre-of-mass trajectory, if the bubble is
    /// non-empty.
    pub fn centre_of_mass_writer(&mut self) -> Option<TrajectoryWriter<'_, Barycentric>> {
        self.current.as_mut().map(|current| TrajectoryWriter {
            trajectory: &mut current.centre_of_mass_trajectory,
            track: ForkId::ROOT,
        })
    }

    /// The last integrated centre-of-mass state.
    ///
    /// # Panics
    ///
    /// Panics if the bubble is empty.
    #[must_use]
    pub fn centre_of_mass_last(&self) -> DegreesOfFreedom<Barycentric> {
        let current = self.current_or_die();
        match current.centre_of_mass_trajectory.last(ForkId::ROOT) {
            Some((_, dof)) => *dof,
            None => panic!("the centre-of-mass trajectory is empty"),
        }
    }

    /// The barycentric offset of `guid` from the centre of mass.
    ///
    /// # Panics
    ///
    /// Panics if the bubble is empty or `guid` is not a member.
    #[must_use]
    pub fn from_centre_of_mass(&self, guid: &str) -> RelativeDegreesOfFreedom<Barycentric> {
        match self.current_or_die().from_centre_of_mass.get(guid) {
            Some(offset) => *offset,
            None => panic!("vessel {guid} is not in the physics bubble"),
        }
    }

    /// The `World` shift to apply to the bubble so it sits where the
    /// integrated centre of mass says it should.
    ///
    /// # Panics
    ///
    /// Panics if the bubble is empty.
    #[must_use]
    pub fn displacement_correction(
        &self,
        planetarium_rotation: &Rotation<Barycentric, WorldSun>,
        sun_position: Position<Barycentric>,
        sun_world_position: Position<World>,
    ) -> Displacement<World> {
        let current = self.current_or_die();
        let to_world = AffineMap::new(
            sun_position,
            sun_world_position,
            Rotation::<WorldSun, World>::identity() * *planetarium_rotation,
        );
        let integrated = to_world.map(&self.centre_of_mass_last().position);
        integrated - current.world_centre_of_mass.position
    }

    /// The `World` shift to apply to the bubble's velocity, relative to a
    /// reference celestial.
    ///
    /// # Panics
    ///
    /// Panics if the bubble is empty.
    #[must_use]
    pub fn velocity_correction(
        &self,
        planetarium_rotation: &Rotation<Barycentric, WorldSun>,
        reference_velocity: Velocity<Barycentric>,
    ) -> Velocity<World> {
        let current = self.current_or_die();
        let to_world = Rotation::<WorldSun, World>::identity() * *planetarium_rotation;
        let integrated =
            to_world.apply_velocity(&(self.centre_of_mass_last().velocity - reference_velocity));
        integrated - current.world_centre_of_mass.velocity
    }
}

/// Map a relative quantity from the host's world frame to `Barycentric`:
/// `World` and `WorldSun` share axes, then the planetarium rotation is
/// undone.
fn barycentric_relative_from_world(
    planetarium_rotation: &Rotation<Barycentric, WorldSun>,
    relative: RelativeDegreesOfFreedom<World>,
) -> RelativeDegreesOfFreedom<Barycentric> {
    let to_world_sun = Rotation::<World, WorldSun>::identity();
    let from_world_sun = planetarium_rotation.inverse();
    RelativeDegreesOfFreedom::new(
        from_world_sun.apply(&to_world_sun.apply(&relative.displacement)),
        from_world_sun.apply_velocity(&to_world_sun.apply_velocity(&relative.velocity)),
    )
}
