use glam::{DVec3, Vec3};

use crate::config::AttractorSettings;

/// Drifting target point that every agent seeks (or flees when too close).
#[derive(Clone, Copy, Debug)]
pub struct AttractorMotion {
    range: Vec3,
    phase: Vec3,
}

impl AttractorMotion {
    pub fn new(settings: AttractorSettings) -> Self {
        Self {
            range: settings.range,
            phase: settings.phase,
        }
    }

    /// Position after `elapsed` simulated seconds. Each axis is an independent
    /// sine sweep, so the path never settles. The phase is evaluated in `f64`.
    pub fn position_at(&self, elapsed: f64) -> Vec3 {
        let angle = self.phase.as_dvec3() * elapsed;
        let sweep = DVec3::new(angle.x.sin(), angle.y.sin(), angle.z.sin());
        self.range * sweep.as_vec3()
    }

    /// Overwrites the shared attractor position for this tick.
    pub fn advance(&self, elapsed: f64, state: &mut Vec3) {
        *state = self.position_at(elapsed);
    }
}
