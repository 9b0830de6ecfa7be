//! Movement controller.
//!
//! Turns state and facing into a velocity. Walls and edges are not checked
//! here; the state machine has already turned or halted the agent before
//! velocity is committed.

use glam::Vec2;

use rampart_common::Facing;

use crate::agent::{Agent, AgentState};
use crate::profile::MovementStyle;

/// Flyers closer than this to their hover point stop.
const HOVER_ARRIVAL_RADIUS: f32 = 0.1;

/// Turns the agent toward `target` if it is facing away. Returns whether a
/// flip happened. A target straight above or below leaves facing alone.
pub fn face_target(agent: &mut Agent, target: Vec2) -> bool {
    Facing::from_sign(target.x - agent.position.x).is_some_and(|facing| agent.face(facing))
}

/// Velocity for this tick.
///
/// Walkers keep the vertical component from physics (gravity, knockback).
/// Flyers have no gravity: they hold altitude while patrolling and steer to a
/// hover point next to the target while chasing.
pub fn compute_velocity(agent: &mut Agent, target: Option<Vec2>) -> Vec2 {
    let motion = agent.profile.motion;
    let vy = agent.velocity.y;
    let flying = !matches!(motion.style, MovementStyle::Ground);

    match agent.state {
        AgentState::NormalMoving => {
            let vx = agent.facing.sign() * motion.patrol_speed;
            Vec2::new(vx, if flying { 0.0 } else { vy })
        },
        AgentState::AttackMoving => {
            if let Some(target) = target {
                face_target(agent, target);
            }
            match (motion.style, target) {
                (MovementStyle::Flying { hover_offset }, Some(target)) => {
                    hover_velocity(agent.position, target, hover_offset, motion.aggro_speed)
                },
                (MovementStyle::Flying { .. }, None) => {
                    Vec2::new(agent.facing.sign() * motion.aggro_speed, 0.0)
                },
                (MovementStyle::Ground, _) => {
                    Vec2::new(agent.facing.sign() * motion.aggro_speed, vy)
                },
            }
        },
        AgentState::Passive
        | AgentState::Alert
        | AgentState::Attacking
        | AgentState::HitTaken
        | AgentState::Dead => {
            Vec2::new(0.0, if flying { 0.0 } else { vy })
        },
    }
}

/// Steering toward the point `hover_offset` away from the target, on the
/// side the flyer is already on.
fn hover_velocity(position: Vec2, target: Vec2, hover_offset: Vec2, speed: f32) -> Vec2 {
    let side = if position.x < target.x { -1.0 } else { 1.0 };
    let hover = target + Vec2::new(side * hover_offset.x, hover_offset.y);
    let delta = hover - position;
    if delta.length() < HOVER_ARRIVAL_RADIUS {
        Vec2::ZERO
    } else {
        delta.normalize_or_zero() * speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{AgentProfile, AgentVariant};
    use std::sync::Arc;

    fn agent(variant: AgentVariant, state: AgentState) -> Agent {
        let mut agent = Agent::new(
            Arc::new(AgentProfile::for_variant(variant)),
            Vec2::ZERO,
            Facing::Right,
        );
        agent.state = state;
        agent.velocity = Vec2::new(0.7, -3.0);
        agent
    }

    #[test]
    fn test_patrol_uses_patrol_speed() {
        let mut grunt = agent(AgentVariant::GroundMelee, AgentState::NormalMoving);
        let v = compute_velocity(&mut grunt, None);
        assert_eq!(v, Vec2::new(1.5, -3.0));
    }

    #[test]
    fn test_chase_faces_target_first() {
        let mut grunt = agent(AgentVariant::GroundMelee, AgentState::AttackMoving);
        let v = compute_velocity(&mut grunt, Some(Vec2::new(-4.0, 0.0)));
        assert_eq!(grunt.facing(), Facing::Left);
        assert_eq!(v, Vec2::new(-3.5, -3.0));
    }

    #[test]
    fn test_stopped_states_pass_vertical_through() {
        for state in [
            AgentState::Passive,
            AgentState::Alert,
            AgentState::Attacking,
            AgentState::HitTaken,
            AgentState::Dead,
        ] {
            let mut grunt = agent(AgentVariant::GroundMelee, state);
            assert_eq!(compute_velocity(&mut grunt, None), Vec2::new(0.0, -3.0));
        }
    }

    #[test]
    fn test_stopped_flyer_holds_altitude() {
        for state in [
            AgentState::Passive,
            AgentState::Alert,
            AgentState::Attacking,
            AgentState::HitTaken,
            AgentState::Dead,
        ] {
            let mut aero = agent(AgentVariant::FlyingRanged, state);
            assert_eq!(compute_velocity(&mut aero, None), Vec2::ZERO);
        }
    }

    #[test]
    fn test_flyer_patrol_holds_altitude() {
        let mut aero = agent(AgentVariant::FlyingRanged, AgentState::NormalMoving);
        let v = compute_velocity(&mut aero, None);
        assert_eq!(v, Vec2::new(2.0, 0.0));
    }

    #[test]
    fn test_flyer_steers_to_hover_point() {
        let mut aero = agent(AgentVariant::FlyingRanged, AgentState::AttackMoving);
        let v = compute_velocity(&mut aero, Some(Vec2::new(10.0, 0.0)));
        assert_eq!(aero.facing(), Facing::Right);
        assert!(v.x > 0.0 && v.y > 0.0);
        assert!((v.length() - 4.0).abs() < 1e-4);

        aero.position = Vec2::new(6.0, 3.0);
        assert_eq!(compute_velocity(&mut aero, Some(Vec2::new(10.0, 0.0))), Vec2::ZERO);
    }

    #[test]
    fn test_face_target_ignores_vertical() {
        let mut grunt = agent(AgentVariant::GroundMelee, AgentState::AttackMoving);
        assert!(!face_target(&mut grunt, Vec2::new(0.0, 5.0)));
        assert!(face_target(&mut grunt, Vec2::new(-1.0, 0.0)));
    }
}
