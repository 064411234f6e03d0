use std::f32::consts::TAU;

use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use slotmap::{new_key_type, SlotMap};
use tracing::{info, trace};

use crate::config::{BoidSettings, SpawnSettings};
use crate::math::{forward_of, look_rotation, normalize_checked};

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentId;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Agent {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Local +Z faces along the velocity after every tick.
    pub rotation: Quat,
    /// Linear RGB tint picked at spawn for hosts that draw agents.
    pub color: [f32; 3],
}

impl Agent {
    /// Unit travel direction; falls back to the facing when the agent is at rest.
    pub fn heading(&self) -> Vec3 {
        normalize_checked(self.velocity).unwrap_or_else(|| forward_of(self.rotation))
    }
}

/// Owns the live roster and fills it up to the target population over time.
pub struct PopulationManager {
    settings: BoidSettings,
    spawn: SpawnSettings,
    agents: SlotMap<AgentId, Agent>,
    rng: ChaCha12Rng,
    spawn_clock: f32,
    started: bool,
}

impl PopulationManager {
    pub fn new(settings: BoidSettings, spawn: SpawnSettings, seed: u64) -> Self {
        Self {
            settings,
            spawn,
            agents: SlotMap::with_capacity_and_key(spawn.num_boids),
            rng: ChaCha12Rng::seed_from_u64(seed),
            spawn_clock: 0.0,
            started: false,
        }
    }

    pub fn settings(&self) -> &BoidSettings {
        &self.settings
    }

    pub(crate) fn set_settings(&mut self, settings: BoidSettings) {
        self.settings = settings;
    }

    pub fn spawn_settings(&self) -> &SpawnSettings {
        &self.spawn
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.agents.len() >= self.spawn.num_boids
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.agents.iter()
    }

    /// Spawns the first agent on the first call, then one per `spawn_delay`
    /// of accumulated time until the roster is full.
    pub fn advance_spawns(&mut self, dt: f32) -> Vec<AgentId> {
        let mut spawned = Vec::new();
        if self.is_full() {
            return spawned;
        }

        if !self.started {
            self.started = true;
            spawned.push(self.spawn_random());
        } else {
            self.spawn_clock += dt;
        }

        while !self.is_full() && self.spawn_clock >= self.spawn.spawn_delay {
            self.spawn_clock -= self.spawn.spawn_delay;
            spawned.push(self.spawn_random());
        }

        if self.is_full() && !spawned.is_empty() {
            info!(agents = self.agents.len(), "population reached target");
        }
        spawned
    }

    /// Inserts an agent at a host-chosen state, facing along `velocity`.
    pub fn spawn_agent(&mut self, position: Vec3, velocity: Vec3) -> AgentId {
        let color = random_color(&mut self.rng);
        let id = self.agents.insert(Agent {
            position,
            velocity,
            rotation: look_rotation(velocity).unwrap_or(Quat::IDENTITY),
            color,
        });
        trace!(?id, ?position, "spawned agent");
        id
    }

    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(id)
    }

    fn spawn_random(&mut self) -> AgentId {
        let position = random_in_sphere(&mut self.rng, self.spawn.spawn_radius);
        let velocity = random_unit_vector(&mut self.rng) * self.settings.velocity;
        self.spawn_agent(position, velocity)
    }
}

/// Uniform point inside a ball of `radius` centered at the origin.
pub fn random_in_sphere(rng: &mut impl Rng, radius: f32) -> Vec3 {
    random_unit_vector(rng) * radius * rng.gen::<f32>().cbrt()
}

/// Uniform direction on the unit sphere.
pub fn random_unit_vector(rng: &mut impl Rng) -> Vec3 {
    let z: f32 = rng.gen_range(-1.0..=1.0);
    let theta = rng.gen_range(0.0..TAU);
    let ring = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(ring * theta.cos(), ring * theta.sin(), z)
}

fn random_color(rng: &mut impl Rng) -> [f32; 3] {
    let hue = rng.gen_range(0.0..=1.0);
    let saturation = rng.gen_range(0.5..=1.0);
    let value = rng.gen_range(0.5..=1.0);
    hsv_to_rgb(hue, saturation, value)
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [f32; 3] {
    let h = (hue.fract() * 6.0).max(0.0);
    let sector = h.floor();
    let f = h - sector;
    let p = value * (1.0 - saturation);
    let q = value * (1.0 - saturation * f);
    let t = value * (1.0 - saturation * (1.0 - f));
    match sector as u32 {
        0 => [value, t, p],
        1 => [q, value, p],
        2 => [p, value, t],
        3 => [p, q, value],
        4 => [t, p, value],
        _ => [value, p, q],
    }
}
