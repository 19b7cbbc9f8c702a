//! Snapshot persistence.
//!
//! The whole plugin state is captured as an opaque byte message: celestials
//! and vessels with their trajectory trees, the physics bubble, the
//! planetarium rotation, the current time and the sun's index. Writing and
//! then reading yields a plugin whose next observable behavior is bitwise
//! equal to the original's; the exact bytes are an implementation detail.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uom::si::f64::Angle;

use crate::config::EngineConfig;
use crate::error::{OrreryError, OrreryResult};
use crate::geometry::instant::Instant;
use crate::physics::integrator::SprkIntegrator;
use crate::physics::nbody::NBodySystem;
use crate::plugin::bubble::PhysicsBubble;
use crate::plugin::{Celestial, CelestialIndex, Guid, Plugin, Vessel};

#[derive(Serialize, Deserialize)]
struct PluginSnapshot {
    config: EngineConfig,
    celestials: BTreeMap<CelestialIndex, Celestial>,
    vessels: BTreeMap<Guid, Vessel>,
    dirty_vessels: BTreeSet<Guid>,
    bubble: PhysicsBubble,
    planetarium_rotation: Angle,
    current_time: Instant,
    sun_index: CelestialIndex,
}

impl Plugin {
    /// Capture the full plugin state as an opaque byte message.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    ///
    /// # Panics
    ///
    /// Panics during initialization.
    pub fn write_to_bytes(&self) -> OrreryResult<Vec<u8>> {
        assert!(!self.initializing, "must be called after initialization");
        let snapshot = PluginSnapshot {
            config: self.config.clone(),
            celestials: self.celestials.clone(),
            vessels: self.vessels.clone(),
            dirty_vessels: self.dirty_vessels.clone(),
            bubble: self.bubble.clone(),
            planetarium_rotation: self.planetarium_rotation,
            current_time: self.current_time,
            sun_index: self.sun_index,
        };
        bincode::serialize(&snapshot).map_err(|error| OrreryError::snapshot(error.to_string()))
    }

    /// Rebuild a plugin from a message written by `write_to_bytes`. The
    /// restored plugin is past initialization; the unsynchronized set is
    /// recomputed from the vessels without a history.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be decoded or is internally
    /// inconsistent.
    pub fn read_from_bytes(bytes: &[u8]) -> OrreryResult<Self> {
        let snapshot: PluginSnapshot = bincode::deserialize(bytes)
            .map_err(|error| OrreryError::snapshot(error.to_string()))?;
        if !snapshot.celestials.contains_key(&snapshot.sun_index) {
            return Err(OrreryError::snapshot(format!(
                "no celestial at the sun index {}",
                snapshot.sun_index
            )));
        }
        let unsynchronized_vessels: BTreeSet<Guid> = snapshot
            .vessels
            .iter()
            .filter(|(_, vessel)| !vessel.is_synchronized())
            .map(|(guid, _)| guid.clone())
            .collect();
        let history_integrator = SprkIntegrator::new(snapshot.config.history_scheme.resolve());
        let prolongation_integrator =
            SprkIntegrator::new(snapshot.config.prolongation_scheme.resolve());
        Ok(Self {
            config: snapshot.config,
            vessels: snapshot.vessels,
            celestials: snapshot.celestials,
            unsynchronized_vessels,
            dirty_vessels: snapshot.dirty_vessels,
            kept_vessels: BTreeSet::new(),
            bubble: snapshot.bubble,
            n_body_system: NBodySystem::new(),
            history_integrator,
            prolongation_integrator,
            initializing: false,
            planetarium_rotation: snapshot.planetarium_rotation,
            current_time: snapshot.current_time,
            sun_index: snapshot.sun_index,
        })
    }
}
