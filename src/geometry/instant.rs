//! Instants on the simulation time line.
//!
//! `Instant` is an affine point: instants are subtracted to give a `uom`
//! `Time`, and a `Time` is added to an instant to give another instant.
//! Instants are totally ordered (construction asserts finiteness) so they
//! can key the `BTreeMap` timelines of trajectories.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Sub};
use uom::si::f64::Time;
use uom::si::time::second;

/// An instant of simulated time, in seconds from the epoch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Instant {
    seconds: f64,
}

impl Instant {
    /// Universal time 0, the time of world creation.
    pub const EPOCH: Self = Self { seconds: 0.0 };

    /// Create an instant from seconds since the epoch.
    ///
    /// # Panics
    ///
    /// Panics if `seconds` is not finite.
    #[must_use]
    pub fn from_seconds(seconds: f64) -> Self {
        assert!(seconds.is_finite(), "Instant must be finite");
        Self { seconds }
    }

    /// Get the number of seconds since the epoch.
    #[must_use]
    pub const fn as_seconds(&self) -> f64 {
        self.seconds
    }
}

impl Default for Instant {
    fn default() -> Self {
        Self::EPOCH
    }
}

impl PartialEq for Instant {
    fn eq(&self, other: &Self) -> bool {
        self.seconds.total_cmp(&other.seconds) == Ordering::Equal
    }
}

impl Eq for Instant {}

impl Hash for Instant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.seconds.to_bits().hash(state);
    }
}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instant {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seconds.total_cmp(&other.seconds)
    }
}

impl Add<Time> for Instant {
    type Output = Self;

    fn add(self, duration: Time) -> Self {
        Self::from_seconds(self.seconds + duration.get::<second>())
    }
}

impl Sub<Time> for Instant {
    type Output = Self;

    fn sub(self, duration: Time) -> Self {
        Self::from_seconds(self.seconds - duration.get::<second>())
    }
}

impl Sub for Instant {
    type Output = Time;

    fn sub(self, other: Self) -> Time {
        Time::new::<second>(self.seconds - other.seconds)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} s", self.seconds)
    }
}
