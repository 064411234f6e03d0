//! Boids steering core: per-agent neighbor tracking, a drifting attractor,
//! obstacle probes, and eased constant-speed steering on a fixed tick.

pub mod attractor;
pub mod config;
pub mod error;
pub mod math;
pub mod neighbor_grid;
pub mod neighborhood;
pub mod obstacle;
pub mod population;
pub mod simulation;
pub mod steering;

use glam::Vec3;
use wasm_bindgen::prelude::*;

pub use attractor::AttractorMotion;
pub use config::{AttractorSettings, BoidSettings, SimConfig, SpawnSettings};
pub use error::{ConfigError, SimError};
pub use neighborhood::{NeighborAggregates, NeighborIndex, NeighborSet, NeighborSnapshot};
pub use obstacle::{
    Collider, LayerMask, NoObstacles, ObstacleField, ObstacleQuery, ObstacleSensor, RayHit,
};
pub use population::{Agent, AgentId, PopulationManager};
pub use simulation::{Simulation, SimulationContext, TickReport};

/// Browser-facing handle around a [`Simulation`] with flat buffer accessors.
#[wasm_bindgen]
pub struct Sim {
    inner: Simulation<ObstacleField>,
}

#[wasm_bindgen]
impl Sim {
    #[wasm_bindgen(constructor)]
    pub fn new(count: usize, seed: u32, spawn_radius: f32) -> Result<Sim, JsError> {
        let config = SimConfig {
            seed: Some(u64::from(seed)),
            spawn: SpawnSettings {
                num_boids: count,
                spawn_radius,
                ..SpawnSettings::default()
            },
            ..SimConfig::default()
        };
        Ok(Sim {
            inner: Simulation::new(config)?,
        })
    }

    pub fn from_json(json: &str) -> Result<Sim, JsError> {
        let config = SimConfig::from_json_str(json)?;
        Ok(Sim {
            inner: Simulation::new(config)?,
        })
    }

    pub fn step(&mut self, dt: f32) -> Result<(), JsError> {
        self.inner.tick(dt)?;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.inner.len()
    }

    pub fn elapsed(&self) -> f64 {
        self.inner.context().elapsed
    }

    pub fn set_neighbor_dist(&mut self, neighbor_dist: f32) -> Result<(), JsError> {
        let settings = BoidSettings {
            neighbor_dist,
            ..*self.inner.settings()
        };
        self.inner.replace_settings(settings)?;
        Ok(())
    }

    pub fn add_sphere_obstacle(&mut self, x: f32, y: f32, z: f32, radius: f32) {
        self.inner.obstacles_mut().add(
            Collider::Sphere {
                center: Vec3::new(x, y, z),
                radius,
            },
            LayerMask::OBSTACLE,
        );
    }

    pub fn add_box_obstacle(
        &mut self,
        min_x: f32,
        min_y: f32,
        min_z: f32,
        max_x: f32,
        max_y: f32,
        max_z: f32,
    ) {
        self.inner.obstacles_mut().add(
            Collider::Aabb {
                min: Vec3::new(min_x, min_y, min_z),
                max: Vec3::new(max_x, max_y, max_z),
            },
            LayerMask::OBSTACLE,
        );
    }

    /// Interleaved xyz positions in roster order.
    pub fn positions(&self) -> Vec<f32> {
        self.flatten(|agent| agent.position.to_array())
    }

    pub fn velocities(&self) -> Vec<f32> {
        self.flatten(|agent| agent.velocity.to_array())
    }

    pub fn colors(&self) -> Vec<f32> {
        self.flatten(|agent| agent.color)
    }

    pub fn attractor(&self) -> Vec<f32> {
        self.inner.context().attractor.to_array().to_vec()
    }
}

impl Sim {
    fn flatten(&self, field: impl Fn(&Agent) -> [f32; 3]) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.inner.len() * 3);
        for (_, agent) in self.inner.agents() {
            out.extend_from_slice(&field(agent));
        }
        out
    }
}
