use glam::Vec3;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::attractor::AttractorMotion;
use crate::config::{BoidSettings, SimConfig};
use crate::error::SimError;
use crate::math::look_rotation;
use crate::neighborhood::{NeighborIndex, NeighborSet, RefreshStats};
use crate::obstacle::{ObstacleField, ObstacleQuery, ObstacleSensor};
use crate::population::{Agent, AgentId, PopulationManager};
use crate::steering::{steer, Steering, SteeringInput};

/// Read-only state shared by every agent for the duration of one tick.
#[derive(Clone, Copy, Debug)]
pub struct SimulationContext {
    pub settings: BoidSettings,
    /// Written once per tick, before any agent steers.
    pub attractor: Vec3,
    /// Simulated seconds, accumulated in `f64` so long runs keep the
    /// attractor phase precise.
    pub elapsed: f64,
    pub tick: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub elapsed: f64,
    pub spawned: Vec<AgentId>,
    pub neighbors: RefreshStats,
}

/// Start-of-tick copy of the roster that steering reads from.
#[derive(Default)]
struct Snapshot {
    ids: Vec<AgentId>,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    forwards: Vec<Vec3>,
}

impl Snapshot {
    fn capture(&mut self, population: &PopulationManager) {
        self.ids.clear();
        self.positions.clear();
        self.velocities.clear();
        self.forwards.clear();
        for (id, agent) in population.iter() {
            self.ids.push(id);
            self.positions.push(agent.position);
            self.velocities.push(agent.velocity);
            self.forwards.push(agent.heading());
        }
    }
}

/// Fixed-step flocking simulation over an injected obstacle geometry.
///
/// Each tick runs in phases: the attractor moves, pending spawns are added,
/// the roster is snapshotted, neighbor sets are refreshed from the snapshot,
/// every agent steers against the snapshot in parallel, and only then are the
/// new velocities written back and positions integrated. No agent ever sees
/// another agent's state from the tick in progress.
pub struct Simulation<Q = ObstacleField> {
    context: SimulationContext,
    fixed_dt: f32,
    attractor: AttractorMotion,
    population: PopulationManager,
    neighbors: NeighborIndex,
    sensor: ObstacleSensor,
    obstacles: Q,
    snapshot: Snapshot,
}

impl Simulation<ObstacleField> {
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        Self::with_obstacles(config, ObstacleField::new())
    }
}

impl<Q: ObstacleQuery> Simulation<Q> {
    pub fn with_obstacles(config: SimConfig, obstacles: Q) -> Result<Self, SimError> {
        config.validate()?;
        let seed = match config.seed {
            Some(seed) => seed,
            None => getrandom::u64().map_err(SimError::Entropy)?,
        };
        info!(
            seed,
            num_boids = config.spawn.num_boids,
            neighbor_radius = config.boids.neighbor_radius(),
            "starting simulation"
        );

        Ok(Self {
            context: SimulationContext {
                settings: config.boids,
                attractor: Vec3::ZERO,
                elapsed: 0.0,
                tick: 0,
            },
            fixed_dt: config.fixed_dt,
            attractor: AttractorMotion::new(config.attractor),
            population: PopulationManager::new(config.boids, config.spawn, seed),
            neighbors: NeighborIndex::new(),
            sensor: ObstacleSensor::new(config.obstacle_layer),
            obstacles,
            snapshot: Snapshot::default(),
        })
    }

    pub fn context(&self) -> &SimulationContext {
        &self.context
    }

    pub fn settings(&self) -> &BoidSettings {
        self.population.settings()
    }

    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    pub fn population(&self) -> &PopulationManager {
        &self.population
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.population.get(id)
    }

    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.population.iter()
    }

    pub fn len(&self) -> usize {
        self.population.len()
    }

    pub fn is_empty(&self) -> bool {
        self.population.is_empty()
    }

    /// Neighbor set as of the start of the most recent tick.
    pub fn neighbors_of(&self, id: AgentId) -> Option<&NeighborSet> {
        self.neighbors.neighbors(id)
    }

    pub fn neighbor_radius(&self) -> Option<f32> {
        self.neighbors.radius()
    }

    pub fn obstacles(&self) -> &Q {
        &self.obstacles
    }

    pub fn obstacles_mut(&mut self) -> &mut Q {
        &mut self.obstacles
    }

    /// Installs new steering settings between ticks. A changed neighbor
    /// radius rebuilds every neighbor set on the next tick.
    pub fn replace_settings(&mut self, settings: BoidSettings) -> Result<(), SimError> {
        settings.validate()?;
        info!(
            velocity = settings.velocity,
            neighbor_radius = settings.neighbor_radius(),
            "replacing boid settings"
        );
        self.context.settings = settings;
        self.population.set_settings(settings);
        Ok(())
    }

    pub fn spawn_agent(&mut self, position: Vec3, velocity: Vec3) -> AgentId {
        self.population.spawn_agent(position, velocity)
    }

    /// Removes an agent from the roster and from every neighbor set.
    pub fn despawn(&mut self, id: AgentId) -> Result<Agent, SimError> {
        let agent = self
            .population
            .remove(id)
            .ok_or(SimError::UnknownAgent(id))?;
        self.neighbors.remove_agent(id);
        debug!(?id, "despawned agent");
        Ok(agent)
    }

    /// Overrides an agent's state, e.g. after the host resolved a collision.
    /// The facing follows the new velocity unless the agent is left at rest.
    pub fn set_agent_state(
        &mut self,
        id: AgentId,
        position: Vec3,
        velocity: Vec3,
    ) -> Result<(), SimError> {
        if !(position.is_finite() && velocity.is_finite()) {
            return Err(SimError::InvalidAgentState { position, velocity });
        }
        let agent = self
            .population
            .get_mut(id)
            .ok_or(SimError::UnknownAgent(id))?;
        agent.position = position;
        agent.velocity = velocity;
        if let Some(rotation) = look_rotation(velocity) {
            agent.rotation = rotation;
        }
        Ok(())
    }

    pub fn step(&mut self) -> Result<TickReport, SimError> {
        self.tick(self.fixed_dt)
    }

    pub fn tick(&mut self, dt: f32) -> Result<TickReport, SimError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SimError::InvalidTick(dt));
        }

        self.context.tick += 1;
        self.context.elapsed += f64::from(dt);
        self.attractor
            .advance(self.context.elapsed, &mut self.context.attractor);

        let spawned = self.population.advance_spawns(dt);

        self.snapshot.capture(&self.population);
        let stats = self.neighbors.refresh(
            &self.snapshot.ids,
            &self.snapshot.positions,
            &self.snapshot.velocities,
            self.context.settings.neighbor_radius(),
        );

        let steering = self.compute_steering();

        for (&id, next) in self.snapshot.ids.iter().zip(&steering) {
            if let Some(agent) = self.population.get_mut(id) {
                agent.velocity = next.velocity;
                agent.rotation = next.rotation;
                agent.position += next.velocity * dt;
            }
        }

        debug!(
            tick = self.context.tick,
            agents = self.snapshot.ids.len(),
            spawned = spawned.len(),
            entered = stats.entered,
            exited = stats.exited,
            rebuilt = stats.rebuilt,
            "tick complete"
        );

        Ok(TickReport {
            tick: self.context.tick,
            elapsed: self.context.elapsed,
            spawned,
            neighbors: stats,
        })
    }

    fn compute_steering(&self) -> Vec<Steering> {
        let context = &self.context;
        let settings = &context.settings;
        let snapshot = &self.snapshot;
        let index = &self.neighbors;
        let sensor = &self.sensor;
        let obstacles = &self.obstacles;

        (0..snapshot.ids.len())
            .into_par_iter()
            .map(|i| {
                let position = snapshot.positions[i];
                let forward = snapshot.forwards[i];
                let neighbors = index
                    .neighbors(snapshot.ids[i])
                    .map(|set| set.aggregates(position, settings.near_dist))
                    .unwrap_or_default();
                let obstacle_force = sensor.avoidance_force(obstacles, position, forward, settings);

                steer(
                    &SteeringInput {
                        position,
                        velocity: snapshot.velocities[i],
                        forward,
                        attractor: context.attractor,
                        neighbors,
                        obstacle_force,
                    },
                    settings,
                )
            })
            .collect()
    }
}
