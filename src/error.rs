use glam::Vec3;
use thiserror::Error;

use crate::population::AgentId;

/// Rejected configuration values, reported at load time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("velocity must be positive and finite, got {0}")]
    InvalidVelocity(f32),
    #[error("neighborDist must be non-negative and finite, got {0}")]
    InvalidNeighborDist(f32),
    #[error("nearDist must be non-negative and finite, got {0}")]
    InvalidNearDist(f32),
    #[error("attractPushDist must be non-negative and finite, got {0}")]
    InvalidAttractPushDist(f32),
    #[error("influence weight `{name}` must be non-negative and finite, got {value}")]
    InvalidWeight { name: &'static str, value: f32 },
    #[error("velocityEasing must lie in [0, 1], got {0}")]
    InvalidVelocityEasing(f32),
    #[error("obstacleAvoidanceDistance must be non-negative and finite, got {0}")]
    InvalidObstacleAvoidanceDistance(f32),
    #[error("obstacleBufferDistance must be non-negative and finite, got {0}")]
    InvalidObstacleBufferDistance(f32),
    #[error("spawnRadius must be non-negative and finite, got {0}")]
    InvalidSpawnRadius(f32),
    #[error("spawnDelay must be positive and finite, got {0}")]
    InvalidSpawnDelay(f32),
    #[error("fixedDt must be positive and finite, got {0}")]
    InvalidFixedDt(f32),
    #[error("attractor {field} must be finite on every axis")]
    InvalidAttractor { field: &'static str },
}

/// Errors surfaced by the simulation's public entry points.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no entropy source available for seeding: {0}")]
    Entropy(getrandom::Error),
    #[error("unknown agent {0:?}")]
    UnknownAgent(AgentId),
    #[error("tick duration must be positive and finite, got {0}")]
    InvalidTick(f32),
    #[error("agent state must be finite, got position {position} and velocity {velocity}")]
    InvalidAgentState { position: Vec3, velocity: Vec3 },
}
