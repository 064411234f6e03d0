use glam::{Quat, Vec3};

use crate::config::BoidSettings;
use crate::math::{is_degenerate, look_rotation, normalize_checked};
use crate::neighborhood::NeighborAggregates;

/// Everything one agent reads to decide its next velocity.
#[derive(Clone, Copy, Debug)]
pub struct SteeringInput {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Current facing, used when the agent has no velocity to ease from.
    pub forward: Vec3,
    pub attractor: Vec3,
    pub neighbors: NeighborAggregates,
    /// Obstacle repulsion with its weight already applied.
    pub obstacle_force: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Steering {
    pub velocity: Vec3,
    pub rotation: Quat,
}

/// Weighted sum of every steering rule, before normalization.
pub fn accumulate(input: &SteeringInput, settings: &BoidSettings) -> Vec3 {
    let mut sum = Vec3::ZERO;
    let pos = input.position;

    let delta = input.attractor - pos;
    if let Some(toward) = normalize_checked(delta) {
        if delta.length() > settings.attract_push_dist {
            sum += toward * settings.attract_pull;
        } else {
            sum -= toward * settings.attract_push;
        }
    }

    // Zero aggregates mean "no neighbors": skip the rule.
    let aggregates = input.neighbors;
    if !is_degenerate(aggregates.avg_near_pos) {
        if let Some(away) = normalize_checked(pos - aggregates.avg_near_pos) {
            sum += away * settings.near_avoid;
        }
    }
    if let Some(align) = normalize_checked(aggregates.avg_vel) {
        sum += align * settings.vel_matching;
    }
    if !is_degenerate(aggregates.avg_pos) {
        if let Some(center) = normalize_checked(aggregates.avg_pos - pos) {
            sum += center * settings.flock_centering;
        }
    }

    sum + input.obstacle_force
}

/// Unit direction the agent would like to travel in, or `None` when the
/// rules cancel out.
pub fn desired_direction(input: &SteeringInput, settings: &BoidSettings) -> Option<Vec3> {
    normalize_checked(accumulate(input, settings))
}

/// Eases `current` toward `target` by `easing` and renormalizes. A missing
/// target, or one that cancels the current direction exactly, leaves the
/// direction unchanged.
pub fn ease_direction(current: Vec3, target: Option<Vec3>, easing: f32) -> Vec3 {
    match target {
        Some(target) => normalize_checked(current.lerp(target, easing)).unwrap_or(current),
        None => current,
    }
}

pub fn steer(input: &SteeringInput, settings: &BoidSettings) -> Steering {
    let target = desired_direction(input, settings);
    let current = normalize_checked(input.velocity)
        .or_else(|| normalize_checked(input.forward))
        .or(target)
        .unwrap_or(Vec3::Z);

    let direction = ease_direction(current, target, settings.velocity_easing);
    let velocity = direction * settings.velocity;
    let rotation = look_rotation(velocity).unwrap_or(Quat::IDENTITY);

    Steering { velocity, rotation }
}

#[cfg(test)]
mod tests {
    use super::{accumulate, desired_direction, ease_direction, steer, SteeringInput};
    use crate::config::BoidSettings;
    use crate::math::forward_of;
    use crate::neighborhood::NeighborAggregates;
    use glam::Vec3;

    fn lone_agent(position: Vec3, velocity: Vec3, attractor: Vec3) -> SteeringInput {
        SteeringInput {
            position,
            velocity,
            forward: Vec3::Z,
            attractor,
            neighbors: NeighborAggregates::default(),
            obstacle_force: Vec3::ZERO,
        }
    }

    #[test]
    fn far_attractor_pulls_near_attractor_pushes() {
        let settings = BoidSettings::default();

        let far = lone_agent(Vec3::ZERO, Vec3::X, Vec3::new(0.0, 0.0, 20.0));
        assert_eq!(accumulate(&far, &settings), Vec3::new(0.0, 0.0, 1.0));

        let near = lone_agent(Vec3::ZERO, Vec3::X, Vec3::new(0.0, 0.0, 2.0));
        assert_eq!(accumulate(&near, &settings), Vec3::new(0.0, 0.0, -20.0));
    }

    #[test]
    fn every_rule_contributes_with_its_weight() {
        let settings = BoidSettings {
            attract_pull: 1.0,
            near_avoid: 2.0,
            vel_matching: 3.0,
            flock_centering: 4.0,
            ..BoidSettings::default()
        };
        let input = SteeringInput {
            position: Vec3::new(10.0, 0.0, 0.0),
            velocity: Vec3::X,
            forward: Vec3::X,
            attractor: Vec3::new(10.0, 50.0, 0.0),
            neighbors: NeighborAggregates {
                avg_pos: Vec3::new(10.0, 0.0, 7.0),
                avg_vel: Vec3::new(-5.0, 0.0, 0.0),
                avg_near_pos: Vec3::new(10.0, 0.0, 1.0),
            },
            obstacle_force: Vec3::new(0.5, 0.0, 0.0),
        };

        let sum = accumulate(&input, &settings);
        // pull +Y, avoid -Z*2, align -X*3, center +Z*4, obstacle +X*0.5
        let expected = Vec3::new(-3.0 + 0.5, 1.0, -2.0 + 4.0);
        assert!((sum - expected).length() < 1.0e-5, "{sum:?}");
    }

    #[test]
    fn zero_aggregates_are_ignored() {
        let settings = BoidSettings::default();
        let empty = lone_agent(Vec3::new(5.0, 5.0, 5.0), Vec3::X, Vec3::new(50.0, 5.0, 5.0));
        let desired = desired_direction(&empty, &settings).unwrap();
        assert!((desired - Vec3::X).length() < 1.0e-6);
    }

    #[test]
    fn neighbor_on_top_of_agent_reads_like_no_neighbor() {
        let settings = BoidSettings::default();
        let position = Vec3::new(3.0, 1.0, -2.0);
        let base = lone_agent(position, Vec3::X, Vec3::new(40.0, 1.0, -2.0));
        let stacked = SteeringInput {
            neighbors: NeighborAggregates {
                avg_pos: position,
                avg_vel: Vec3::ZERO,
                avg_near_pos: position,
            },
            ..base
        };
        assert_eq!(accumulate(&base, &settings), accumulate(&stacked, &settings));
    }

    #[test]
    fn cancelled_rules_keep_current_direction() {
        let settings = BoidSettings::default();
        let input = lone_agent(Vec3::ONE, Vec3::new(0.0, 3.0, 4.0), Vec3::ONE);
        assert!(desired_direction(&input, &settings).is_none());

        let steering = steer(&input, &settings);
        let expected = Vec3::new(0.0, 0.6, 0.8) * settings.velocity;
        assert!((steering.velocity - expected).length() < 1.0e-4);
        assert!(steering.velocity.is_finite());
    }

    #[test]
    fn resting_agent_still_gets_full_speed() {
        let settings = BoidSettings::default();
        let steering = steer(&lone_agent(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO), &settings);
        assert!((steering.velocity.length() - settings.velocity).abs() < 1.0e-3);
        assert!(steering.velocity.is_finite());
    }

    #[test]
    fn speed_is_pinned_and_rotation_follows_velocity() {
        let settings = BoidSettings {
            velocity_easing: 0.4,
            ..BoidSettings::default()
        };
        let input = lone_agent(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(7.0, -1.0, 0.5),
            Vec3::new(-30.0, 4.0, 12.0),
        );
        let steering = steer(&input, &settings);
        assert!((steering.velocity.length() - settings.velocity).abs() < 1.0e-3);
        assert!(forward_of(steering.rotation).angle_between(steering.velocity) < 1.0e-3);
    }

    #[test]
    fn easing_bounds_the_turn() {
        let current = Vec3::X;
        let target = Some(Vec3::new(0.0, 0.0, 1.0));

        assert_eq!(ease_direction(current, target, 0.0), current);
        assert!((ease_direction(current, target, 1.0) - Vec3::Z).length() < 1.0e-6);

        let mut previous = 0.0;
        for step in 0..=20 {
            let easing = step as f32 / 20.0;
            let angle = ease_direction(current, target, easing).angle_between(current);
            assert!(angle + 1.0e-6 >= previous);
            previous = angle;
        }
    }

    #[test]
    fn opposite_target_at_half_easing_does_not_produce_nan() {
        let eased = ease_direction(Vec3::X, Some(Vec3::NEG_X), 0.5);
        assert_eq!(eased, Vec3::X);
    }
}
