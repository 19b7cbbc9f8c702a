//! Time-keyed trajectories with forking.
//!
//! A `Trajectory<F>` is a tree of tracks held in an arena: the root track is
//! the authoritative timeline and forks branch off it at existing sample
//! times, sharing the parent's past. The arena representation keeps
//! ownership acyclic and makes deleting a fork (with all its descendants)
//! O(size of the subtree).
//!
//! Appends must be strictly monotonic in time; fork times must be exact
//! sample times of the effective timeline. Violations are programmer errors
//! and abort.

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::geometry::frame::Frame;
use crate::geometry::instant::Instant;
use crate::physics::body::Body;
use crate::physics::degrees_of_freedom::DegreesOfFreedom;

static NEXT_TRAJECTORY_ID: AtomicU64 = AtomicU64::new(0);

fn fresh_trajectory_id() -> u64 {
    NEXT_TRAJECTORY_ID.fetch_add(1, Ordering::Relaxed)
}

/// Identifies a track within one trajectory tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ForkId(u32);

impl ForkId {
    /// The root track of every tree.
    pub const ROOT: Self = Self(0);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
struct Node<F: Frame> {
    parent: Option<ForkId>,
    fork_time: Option<Instant>,
    timeline: BTreeMap<Instant, DegreesOfFreedom<F>>,
    children: Vec<ForkId>,
}

impl<F: Frame> Node<F> {
    fn root() -> Self {
        Self {
            parent: None,
            fork_time: None,
            timeline: BTreeMap::new(),
            children: Vec::new(),
        }
    }
}

/// A tree of timelines tied to one body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Trajectory<F: Frame> {
    /// Process-unique identity, used as a cache key by transforms. Not
    /// persisted; a restored tree gets a fresh identity.
    #[serde(skip, default = "fresh_trajectory_id")]
    id: u64,
    body: Body,
    nodes: BTreeMap<u32, Node<F>>,
    next_node: u32,
}

impl<F: Frame> Trajectory<F> {
    /// Create an empty trajectory for `body`.
    #[must_use]
    pub fn new(body: Body) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(ForkId::ROOT.0, Node::root());
        Self {
            id: fresh_trajectory_id(),
            body,
            nodes,
            next_node: 1,
        }
    }

    /// The process-unique identity of this tree.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The body this trajectory belongs to.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    fn node(&self, track: ForkId) -> &Node<F> {
        match self.nodes.get(&track.0) {
            Some(node) => node,
            None => panic!("unknown trajectory track {track:?}"),
        }
    }

    fn node_mut(&mut self, track: ForkId) -> &mut Node<F> {
        match self.nodes.get_mut(&track.0) {
            Some(node) => node,
            None => panic!("unknown trajectory track {track:?}"),
        }
    }

    /// Append a sample to `track`.
    ///
    /// # Panics
    ///
    /// Panics unless `time` is strictly greater than the track's last sample
    /// time (or its fork time, for a fork with no samples of its own yet).
    pub fn append(&mut self, track: ForkId, time: Instant, degrees_of_freedom: DegreesOfFreedom<F>) {
        if let Some((last_time, _)) = self.last(track) {
            assert!(
                time > last_time,
                "non-monotonic append at {time} (last sample at {last_time})"
            );
        }
        self.node_mut(track).timeline.insert(time, degrees_of_freedom);
    }

    /// Fork a child track at `time`, which must be an exact sample time of
    /// `track`'s effective timeline. The child logically inherits the
    /// effective timeline up to and including `time`.
    ///
    /// # Panics
    ///
    /// Panics if `time` is not a sample time of the effective timeline.
    pub fn fork(&mut self, track: ForkId, time: Instant) -> ForkId {
        assert!(
            self.find(track, time).is_some(),
            "fork time {time} is not a sample of the effective timeline"
        );
        let child = ForkId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(
            child.0,
            Node {
                parent: Some(track),
                fork_time: Some(time),
                timeline: BTreeMap::new(),
                children: Vec::new(),
            },
        );
        self.node_mut(track).children.push(child);
        child
    }

    /// Delete a fork and all its descendants.
    ///
    /// # Panics
    ///
    /// Panics if `fork` is the root track or unknown.
    pub fn delete_fork(&mut self, fork: ForkId) {
        assert!(fork != ForkId::ROOT, "cannot delete the root track");
        let parent = self.node(fork).parent;
        if let Some(parent) = parent {
            self.node_mut(parent).children.retain(|&child| child != fork);
        }
        let mut pending = vec![fork];
        while let Some(current) = pending.pop() {
            let node = match self.nodes.remove(&current.0) {
                Some(node) => node,
                None => panic!("unknown trajectory track {current:?}"),
            };
            pending.extend(node.children);
        }
    }

    /// The last sample of the effective timeline of `track`. For a fork with
    /// no samples of its own this is the inherited parent sample at the fork
    /// time. `None` only for an empty root.
    #[must_use]
    pub fn last(&self, track: ForkId) -> Option<(Instant, &DegreesOfFreedom<F>)> {
        let node = self.node(track);
        if let Some((time, dof)) = node.timeline.iter().next_back() {
            return Some((*time, dof));
        }
        match (node.parent, node.fork_time) {
            (Some(parent), Some(fork_time)) => self
                .find(parent, fork_time)
                .map(|dof| (fork_time, dof)),
            _ => None,
        }
    }

    /// The first sample of the effective timeline of `track`.
    #[must_use]
    pub fn first(&self, track: ForkId) -> Option<(Instant, &DegreesOfFreedom<F>)> {
        self.iter(track).next()
    }

    /// Look up the sample at exactly `time` in the effective timeline.
    #[must_use]
    pub fn find(&self, track: ForkId, time: Instant) -> Option<&DegreesOfFreedom<F>> {
        let mut current = track;
        loop {
            let node = self.node(current);
            if let Some(dof) = node.timeline.get(&time) {
                return Some(dof);
            }
            match (node.parent, node.fork_time) {
                (Some(parent), Some(fork_time)) if time <= fork_time => current = parent,
                _ => return None,
            }
        }
    }

    /// Iterate the effective timeline of `track` in ascending time order:
    /// ancestor prefixes truncated at their fork times, then the track's own
    /// samples.
    pub fn iter(
        &self,
        track: ForkId,
    ) -> impl Iterator<Item = (Instant, &DegreesOfFreedom<F>)> + '_ {
        let mut path: Vec<(ForkId, Option<Instant>)> = Vec::new();
        let mut current = track;
        let mut bound: Option<Instant> = None;
        loop {
            let node = self.node(current);
            path.push((current, bound));
            match (node.parent, node.fork_time) {
                (Some(parent), Some(fork_time)) => {
                    bound = Some(bound.map_or(fork_time, |b| b.min(fork_time)));
                    current = parent;
                }
                _ => break,
            }
        }
        path.reverse();
        path.into_iter().flat_map(move |(track, bound)| {
            let timeline = &self.node(track).timeline;
            let range: btree_map::Range<'_, Instant, DegreesOfFreedom<F>> = match bound {
                Some(bound) => timeline.range(..=bound),
                None => timeline.range(..),
            };
            range.map(|(time, dof)| (*time, dof))
        })
    }

    /// Iterate the effective timeline, mapping each sample through
    /// `transform` at pull time. The transform receives the tree identity so
    /// it can key caches.
    pub fn transforming_iter<'a, G, T>(
        &'a self,
        track: ForkId,
        mut transform: T,
    ) -> impl Iterator<Item = (Instant, DegreesOfFreedom<G>)> + 'a
    where
        G: Frame,
        T: FnMut(u64, Instant, &DegreesOfFreedom<F>) -> DegreesOfFreedom<G> + 'a,
    {
        let id = self.id;
        self.iter(track)
            .map(move |(time, dof)| (time, transform(id, time, dof)))
    }
}
