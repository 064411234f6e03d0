use std::collections::BTreeMap;

use glam::Vec3;
use slotmap::SecondaryMap;
use tracing::debug;

use crate::neighbor_grid::NeighborGrid;
use crate::population::AgentId;

/// Neighbor state as of the start of the tick it was recorded in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NeighborSnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Averages derived from one agent's neighbor set. A zero vector in any field
/// means "no contributing neighbor"; a true average that lands on the origin
/// reads the same way.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NeighborAggregates {
    pub avg_pos: Vec3,
    pub avg_vel: Vec3,
    pub avg_near_pos: Vec3,
}

/// Agents currently within one agent's neighbor radius, keyed by id.
///
/// Ordered by id so aggregate sums are reproducible run to run.
#[derive(Clone, Debug, Default)]
pub struct NeighborSet {
    members: BTreeMap<AgentId, NeighborSnapshot>,
}

impl NeighborSet {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn get(&self, id: AgentId) -> Option<&NeighborSnapshot> {
        self.members.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.members.keys().copied()
    }

    pub fn avg_pos(&self) -> Vec3 {
        mean(self.members.values().map(|n| n.position))
    }

    pub fn avg_vel(&self) -> Vec3 {
        mean(self.members.values().map(|n| n.velocity))
    }

    /// Mean position of neighbors no farther than `near_dist` from `origin`.
    pub fn avg_near_pos(&self, origin: Vec3, near_dist: f32) -> Vec3 {
        mean(
            self.members
                .values()
                .map(|n| n.position)
                .filter(|p| (*p - origin).length() <= near_dist),
        )
    }

    pub fn aggregates(&self, origin: Vec3, near_dist: f32) -> NeighborAggregates {
        NeighborAggregates {
            avg_pos: self.avg_pos(),
            avg_vel: self.avg_vel(),
            avg_near_pos: self.avg_near_pos(origin, near_dist),
        }
    }

    fn enter(&mut self, id: AgentId, snapshot: NeighborSnapshot) -> bool {
        self.members.insert(id, snapshot).is_none()
    }

    fn exit(&mut self, id: AgentId) -> bool {
        self.members.remove(&id).is_some()
    }
}

fn mean(values: impl Iterator<Item = Vec3>) -> Vec3 {
    let (sum, count) = values.fold((Vec3::ZERO, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return Vec3::ZERO;
    }
    sum / count as f32
}

/// Membership changes applied by one refresh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub entered: usize,
    pub exited: usize,
    /// Every set was dropped and rebuilt because the radius changed.
    pub rebuilt: bool,
}

/// Per-agent neighbor sets kept in step with a uniform grid broad phase.
pub struct NeighborIndex {
    radius: Option<f32>,
    grid: NeighborGrid,
    sets: SecondaryMap<AgentId, NeighborSet>,
}

impl Default for NeighborIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl NeighborIndex {
    pub fn new() -> Self {
        Self {
            radius: None,
            grid: NeighborGrid::new(1.0),
            sets: SecondaryMap::new(),
        }
    }

    /// Radius the current memberships were computed with.
    pub fn radius(&self) -> Option<f32> {
        self.radius
    }

    pub fn neighbors(&self, id: AgentId) -> Option<&NeighborSet> {
        self.sets.get(id)
    }

    /// Brings every set in line with a snapshot of the roster.
    ///
    /// `ids`, `positions` and `velocities` are parallel slices describing
    /// every live agent. Agents that crossed the radius boundary since the
    /// last refresh enter or exit exactly once; neighbors that stayed in range
    /// get their snapshot updated. Sets belonging to, and references to, agents
    /// missing from the snapshot are dropped.
    pub fn refresh(
        &mut self,
        ids: &[AgentId],
        positions: &[Vec3],
        velocities: &[Vec3],
        radius: f32,
    ) -> RefreshStats {
        debug_assert_eq!(ids.len(), positions.len());
        debug_assert_eq!(ids.len(), velocities.len());

        let mut stats = RefreshStats::default();
        if self.radius != Some(radius) {
            debug!(old = ?self.radius, new = radius, "neighbor radius changed, rebuilding sets");
            self.sets.clear();
            self.grid.set_cell_size(radius);
            self.radius = Some(radius);
            stats.rebuilt = true;
        }

        let mut live = SecondaryMap::with_capacity(ids.len());
        for &id in ids {
            live.insert(id, ());
        }
        self.sets.retain(|id, _| live.contains_key(id));

        self.grid.rebuild(positions);

        for (i, &id) in ids.iter().enumerate() {
            let mut current = BTreeMap::new();
            self.grid.for_each_neighbor(i, radius, |j| {
                current.insert(
                    ids[j],
                    NeighborSnapshot {
                        position: positions[j],
                        velocity: velocities[j],
                    },
                );
            });

            if !self.sets.contains_key(id) {
                self.sets.insert(id, NeighborSet::default());
            }
            let Some(set) = self.sets.get_mut(id) else {
                continue;
            };

            let departed: Vec<AgentId> = set
                .ids()
                .filter(|other| !current.contains_key(other))
                .collect();
            for other in departed {
                if set.exit(other) {
                    stats.exited += 1;
                }
            }
            for (other, snapshot) in current {
                if set.enter(other, snapshot) {
                    stats.entered += 1;
                }
            }
        }

        stats
    }

    /// Forgets `id` entirely: its own set and every membership pointing at it.
    pub fn remove_agent(&mut self, id: AgentId) {
        self.sets.remove(id);
        for (_, set) in self.sets.iter_mut() {
            set.exit(id);
        }
    }
}
