use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::BoidSettings;
use crate::math::{normalize_checked, yaw};

const PROBE_YAW_DEG: f32 = 10.0;
const AXIS_EPSILON: f32 = 1.0e-8;

/// Bitmask of collider layers a query is interested in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const DEFAULT: LayerMask = LayerMask(1);
    pub const OBSTACLE: LayerMask = LayerMask(1 << 1);
    pub const ALL: LayerMask = LayerMask(u32::MAX);

    pub fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub distance: f32,
}

/// Read-only ray queries against static obstacle geometry.
///
/// `direction` is unit length. Rays that start inside a collider do not hit
/// it, and only colliders on a layer in `layers` are considered.
pub trait ObstacleQuery: Sync {
    fn cast(&self, origin: Vec3, direction: Vec3, max_distance: f32, layers: LayerMask)
        -> Option<RayHit>;
}

/// Geometry without any colliders.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoObstacles;

impl ObstacleQuery for NoObstacles {
    fn cast(&self, _: Vec3, _: Vec3, _: f32, _: LayerMask) -> Option<RayHit> {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Collider {
    Sphere { center: Vec3, radius: f32 },
    Aabb { min: Vec3, max: Vec3 },
}

impl Collider {
    /// Entry distance along the ray, if the ray enters the collider from
    /// outside within `max_distance`.
    fn entry_distance(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<f32> {
        let t = match *self {
            Collider::Sphere { center, radius } => ray_sphere(origin, direction, center, radius)?,
            Collider::Aabb { min, max } => ray_aabb(origin, direction, min, max)?,
        };
        (t <= max_distance).then_some(t)
    }
}

fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let b = oc.dot(direction);
    let c = oc.length_squared() - radius * radius;
    if c < 0.0 {
        return None;
    }
    if b > 0.0 {
        return None;
    }
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    Some((-b - disc.sqrt()).max(0.0))
}

fn ray_aabb(origin: Vec3, direction: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        if d.abs() < AXIS_EPSILON {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let inv = d.recip();
        let mut t0 = (min[axis] - o) * inv;
        let mut t1 = (max[axis] - o) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_enter = t_enter.max(t0);
        t_exit = t_exit.min(t1);
    }

    if t_enter > t_exit || t_enter < 0.0 {
        return None;
    }
    Some(t_enter)
}

/// Flat list of layered colliders answering ray queries by brute force.
#[derive(Clone, Debug, Default)]
pub struct ObstacleField {
    colliders: Vec<(Collider, LayerMask)>,
}

impl ObstacleField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, collider: Collider, layer: LayerMask) {
        self.colliders.push((collider, layer));
    }

    pub fn with(mut self, collider: Collider, layer: LayerMask) -> Self {
        self.add(collider, layer);
        self
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }
}

impl ObstacleQuery for ObstacleField {
    fn cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        layers: LayerMask,
    ) -> Option<RayHit> {
        self.colliders
            .iter()
            .filter(|(_, layer)| layer.intersects(layers))
            .filter_map(|(collider, _)| collider.entry_distance(origin, direction, max_distance))
            .min_by(f32::total_cmp)
            .map(|distance| RayHit {
                point: origin + direction * distance,
                distance,
            })
    }
}

/// Two forward probes, yawed left and right of the heading, that push the
/// agent away from whatever they hit.
#[derive(Clone, Copy, Debug)]
pub struct ObstacleSensor {
    pub layers: LayerMask,
}

impl ObstacleSensor {
    pub fn new(layers: LayerMask) -> Self {
        Self { layers }
    }

    /// Repulsion already scaled by `avoidance_weight`. Each hit contributes
    /// `avoidance_distance - hit_distance + buffer_distance` along the
    /// direction from the hit point back to the agent.
    pub fn avoidance_force<Q>(
        &self,
        geometry: &Q,
        position: Vec3,
        forward: Vec3,
        settings: &BoidSettings,
    ) -> Vec3
    where
        Q: ObstacleQuery + ?Sized,
    {
        let Some(forward) = normalize_checked(forward) else {
            return Vec3::ZERO;
        };
        let reach = settings.obstacle_avoidance_distance;

        let mut force = Vec3::ZERO;
        for probe in [yaw(forward, -PROBE_YAW_DEG), yaw(forward, PROBE_YAW_DEG)] {
            let Some(probe) = normalize_checked(probe) else {
                continue;
            };
            let Some(hit) = geometry.cast(position, probe, reach, self.layers) else {
                continue;
            };
            if let Some(away) = normalize_checked(position - hit.point) {
                force += away * (reach - hit.distance + settings.obstacle_buffer_distance);
            }
        }

        force * settings.avoidance_weight
    }
}
