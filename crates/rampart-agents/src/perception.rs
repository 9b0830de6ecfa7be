//! Perception probes.
//!
//! Thin wrappers over [`WorldQuery`]. All of them are read-only and keep no
//! state, so they can run every tick.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use rampart_common::{Facing, TargetHandle};

use crate::agent::Agent;
use crate::physics::{HitTag, Ray, WorldQuery};

/// Host view of the hostile target.
pub trait TargetStatus {
    /// Target handle.
    fn handle(&self) -> TargetHandle;
    /// Target position.
    fn position(&self) -> Vec2;
    /// Whether the target is dead.
    fn is_dead(&self) -> bool;
    /// Whether the target's current attack is powered.
    fn has_powered_attack(&self) -> bool;
}

/// Plain copy of the target's status for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    /// Handle
    pub handle: TargetHandle,
    /// Position
    pub position: Vec2,
    /// Dead flag
    pub dead: bool,
    /// Powered-attack flag
    pub powered: bool,
}

impl TargetSnapshot {
    /// A live, unpowered target at `position`.
    #[must_use]
    pub const fn alive(handle: TargetHandle, position: Vec2) -> Self {
        Self {
            handle,
            position,
            dead: false,
            powered: false,
        }
    }
}

impl TargetStatus for TargetSnapshot {
    fn handle(&self) -> TargetHandle {
        self.handle
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn is_dead(&self) -> bool {
        self.dead
    }

    fn has_powered_attack(&self) -> bool {
        self.powered
    }
}

/// True when there is no ground under the agent's ground-check anchor.
#[must_use]
pub fn probe_ground_edge(agent: &Agent, world: &dyn WorldQuery) -> bool {
    let probes = &agent.profile.probes;
    let ray = Ray::new(
        agent.ground_anchor(),
        Vec2::NEG_Y,
        probes.ground_probe_distance,
        probes.ground_mask,
    );
    world.raycast(&ray).is_none()
}

/// True when a wall or hazard lies within half the collider width plus the
/// wall margin in `direction`.
#[must_use]
pub fn probe_wall(agent: &Agent, world: &dyn WorldQuery, direction: Facing) -> bool {
    let probes = &agent.profile.probes;
    let ray = Ray::new(
        agent.position,
        direction.unit(),
        probes.body_half_extents.x + probes.wall_margin,
        probes.wall_mask,
    );
    world.raycast(&ray).is_some()
}

/// First target overlapping the detection box.
#[must_use]
pub fn detect_target(agent: &Agent, world: &dyn WorldQuery) -> Option<TargetHandle> {
    world
        .overlap_box(&agent.detection_zone(), agent.profile.probes.target_mask)
        .into_iter()
        .find(|hit| hit.tag == HitTag::Target)
        .and_then(|hit| hit.handle)
}

/// True only if the first thing the sight ray hits is the target.
#[must_use]
pub fn has_line_of_sight(agent: &Agent, world: &dyn WorldQuery, direction: Vec2) -> bool {
    let probes = &agent.profile.probes;
    let ray = Ray::new(
        agent.position,
        direction,
        probes.sight_distance,
        probes.sight_mask,
    );
    if ray.direction == Vec2::ZERO {
        return false;
    }
    world
        .raycast(&ray)
        .is_some_and(|hit| hit.tag == HitTag::Target)
}

/// True when the target overlaps the attack hitbox.
#[must_use]
pub fn in_attack_range(agent: &Agent, world: &dyn WorldQuery) -> bool {
    world
        .overlap_box(&agent.attack_zone(), agent.profile.probes.target_mask)
        .iter()
        .any(|hit| hit.tag == HitTag::Target)
}
