use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SimError};
use crate::obstacle::LayerMask;

/// Flat steering parameters shared by every agent for the duration of a tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoidSettings {
    /// Constant speed every agent travels at.
    pub velocity: f32,
    /// Neighbor sensing diameter; the tracked radius is half of this.
    pub neighbor_dist: f32,
    /// Neighbors closer than this trigger separation.
    pub near_dist: f32,
    /// Inside this distance the attractor repels instead of pulling.
    pub attract_push_dist: f32,
    pub vel_matching: f32,
    pub flock_centering: f32,
    pub near_avoid: f32,
    pub attract_push: f32,
    pub attract_pull: f32,
    /// How quickly agents turn toward their desired heading, in [0, 1].
    pub velocity_easing: f32,
    pub obstacle_avoidance_distance: f32,
    pub obstacle_buffer_distance: f32,
    pub avoidance_weight: f32,
}

impl Default for BoidSettings {
    fn default() -> Self {
        Self {
            velocity: 32.0,
            neighbor_dist: 10.0,
            near_dist: 4.0,
            attract_push_dist: 5.0,
            vel_matching: 1.5,
            flock_centering: 1.0,
            near_avoid: 2.0,
            attract_push: 20.0,
            attract_pull: 1.0,
            velocity_easing: 0.03,
            obstacle_avoidance_distance: 3.0,
            obstacle_buffer_distance: 1.0,
            avoidance_weight: 1.0,
        }
    }
}

impl BoidSettings {
    pub fn neighbor_radius(&self) -> f32 {
        self.neighbor_dist * 0.5
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.velocity.is_finite() && self.velocity > 0.0) {
            return Err(ConfigError::InvalidVelocity(self.velocity));
        }
        if !non_negative(self.neighbor_dist) {
            return Err(ConfigError::InvalidNeighborDist(self.neighbor_dist));
        }
        if !non_negative(self.near_dist) {
            return Err(ConfigError::InvalidNearDist(self.near_dist));
        }
        if !non_negative(self.attract_push_dist) {
            return Err(ConfigError::InvalidAttractPushDist(self.attract_push_dist));
        }
        for (name, value) in [
            ("velMatching", self.vel_matching),
            ("flockCentering", self.flock_centering),
            ("nearAvoid", self.near_avoid),
            ("attractPush", self.attract_push),
            ("attractPull", self.attract_pull),
            ("avoidanceWeight", self.avoidance_weight),
        ] {
            if !non_negative(value) {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        if !(self.velocity_easing.is_finite() && (0.0..=1.0).contains(&self.velocity_easing)) {
            return Err(ConfigError::InvalidVelocityEasing(self.velocity_easing));
        }
        if !non_negative(self.obstacle_avoidance_distance) {
            return Err(ConfigError::InvalidObstacleAvoidanceDistance(
                self.obstacle_avoidance_distance,
            ));
        }
        if !non_negative(self.obstacle_buffer_distance) {
            return Err(ConfigError::InvalidObstacleBufferDistance(
                self.obstacle_buffer_distance,
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpawnSettings {
    /// Roster size the spawner fills up to.
    pub num_boids: usize,
    pub spawn_radius: f32,
    /// Simulated seconds between consecutive spawns.
    pub spawn_delay: f32,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            num_boids: 100,
            spawn_radius: 100.0,
            spawn_delay: 0.1,
        }
    }
}

impl SpawnSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !non_negative(self.spawn_radius) {
            return Err(ConfigError::InvalidSpawnRadius(self.spawn_radius));
        }
        if !(self.spawn_delay.is_finite() && self.spawn_delay > 0.0) {
            return Err(ConfigError::InvalidSpawnDelay(self.spawn_delay));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttractorSettings {
    /// Per-axis amplitude of the attractor's sweep.
    pub range: Vec3,
    /// Per-axis angular rate in radians per simulated second.
    pub phase: Vec3,
}

impl Default for AttractorSettings {
    fn default() -> Self {
        Self {
            range: Vec3::new(40.0, 10.0, 40.0),
            phase: Vec3::new(0.5, 0.4, 0.1),
        }
    }
}

impl AttractorSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.range.is_finite() {
            return Err(ConfigError::InvalidAttractor { field: "range" });
        }
        if !self.phase.is_finite() {
            return Err(ConfigError::InvalidAttractor { field: "phase" });
        }
        Ok(())
    }
}

/// Everything needed to start a simulation; loaded once before the first tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimConfig {
    /// Seed for reproducible spawns; `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Length of one simulation step in seconds.
    pub fixed_dt: f32,
    /// Collider layers the obstacle probes react to.
    pub obstacle_layer: LayerMask,
    pub boids: BoidSettings,
    pub spawn: SpawnSettings,
    pub attractor: AttractorSettings,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: None,
            fixed_dt: 0.02,
            obstacle_layer: LayerMask::OBSTACLE,
            boids: BoidSettings::default(),
            spawn: SpawnSettings::default(),
            attractor: AttractorSettings::default(),
        }
    }
}

impl SimConfig {
    /// Parses and validates a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SimError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_dt.is_finite() && self.fixed_dt > 0.0) {
            return Err(ConfigError::InvalidFixedDt(self.fixed_dt));
        }
        self.boids.validate()?;
        self.spawn.validate()?;
        self.attractor.validate()
    }
}

fn non_negative(value: f32) -> bool {
    value.is_finite() && value >= 0.0
}

#[cfg(test)]
mod tests {
    use super::{BoidSettings, SimConfig};
    use crate::error::{ConfigError, SimError};

    #[test]
    fn defaults_are_valid() {
        assert!(SimConfig::default().validate().is_ok());
        assert_eq!(BoidSettings::default().neighbor_radius(), 5.0);
    }

    #[test]
    fn json_uses_flat_parameter_names() {
        let config = SimConfig::from_json_str(
            r#"{
                "seed": 7,
                "boids": { "velocity": 12, "neighborDist": 6, "velocityEasing": 0.5 },
                "spawn": { "numBoids": 3 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.seed, Some(7));
        assert_eq!(config.boids.velocity, 12.0);
        assert_eq!(config.boids.neighbor_radius(), 3.0);
        assert_eq!(config.boids.near_dist, 4.0);
        assert_eq!(config.spawn.num_boids, 3);
        assert_eq!(config.spawn.spawn_delay, 0.1);
    }

    #[test]
    fn rejects_nonsensical_parameters() {
        let mut settings = BoidSettings {
            velocity: 0.0,
            ..BoidSettings::default()
        };
        assert_eq!(settings.validate(), Err(ConfigError::InvalidVelocity(0.0)));

        settings.velocity = 10.0;
        settings.velocity_easing = 1.5;
        assert_eq!(
            settings.validate(),
            Err(ConfigError::InvalidVelocityEasing(1.5))
        );

        settings.velocity_easing = 0.5;
        settings.neighbor_dist = -1.0;
        assert_eq!(
            settings.validate(),
            Err(ConfigError::InvalidNeighborDist(-1.0))
        );

        settings.neighbor_dist = 10.0;
        settings.near_avoid = f32::NAN;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidWeight {
                name: "nearAvoid",
                ..
            })
        ));
    }

    #[test]
    fn invalid_json_config_is_rejected_at_load() {
        let err = SimConfig::from_json_str(r#"{ "boids": { "velocityEasing": -0.1 } }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            SimError::Config(ConfigError::InvalidVelocityEasing(_))
        ));

        let err = SimConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, SimError::Parse(_)));
    }
}
