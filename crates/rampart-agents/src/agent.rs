//! Per-agent state.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::error;

use rampart_common::{AgentId, Facing, TargetHandle, TaskHandle};

use crate::combat::AttackWindow;
use crate::events::{AgentNotice, CombatEvent};
use crate::physics::Aabb;
use crate::profile::{AgentProfile, AgentVariant, ProbeSettings};
use crate::tasks::TaskSet;

/// Behavior state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AgentState {
    /// Standing still (after a turn-around)
    Passive,
    /// Spotted the target, about to chase
    Alert,
    /// Patrolling
    #[default]
    NormalMoving,
    /// Chasing the target
    AttackMoving,
    /// Running an attack window
    Attacking,
    /// Stunned after a hit
    HitTaken,
    /// Dead (terminal)
    Dead,
}

impl AgentState {
    /// Whether the state machine allows `self -> to`.
    #[must_use]
    pub const fn can_transition(self, to: Self) -> bool {
        use AgentState::{Alert, AttackMoving, Attacking, Dead, HitTaken, NormalMoving, Passive};
        match (self, to) {
            (Dead, _) => false,
            (_, Dead) => true,
            (NormalMoving | Passive, Alert)
            | (Alert, AttackMoving)
            | (AttackMoving, Attacking | Passive | NormalMoving)
            | (Attacking | HitTaken | Passive, NormalMoving)
            | (NormalMoving | Alert | AttackMoving | Attacking, HitTaken) => true,
            _ => false,
        }
    }

    /// Whether the agent moves horizontally on its own in this state.
    #[must_use]
    pub const fn is_moving(self) -> bool {
        matches!(self, Self::NormalMoving | Self::AttackMoving)
    }

    /// Whether damage received in this state puts the agent into stun.
    #[must_use]
    pub const fn staggers(self) -> bool {
        matches!(
            self,
            Self::NormalMoving | Self::Alert | Self::AttackMoving | Self::Attacking
        )
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Facing-dependent anchors, stored in world orientation (already mirrored
/// for the current facing).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacingOffsets {
    /// Ground probe anchor
    pub ground_check: Vec2,
    /// Attack hitbox center
    pub attack: Vec2,
    /// Detection box center
    pub detection: Vec2,
}

impl FacingOffsets {
    /// Offsets from a profile for the given facing.
    #[must_use]
    pub fn new(probes: &ProbeSettings, facing: Facing) -> Self {
        Self {
            ground_check: facing.orient(probes.ground_check_offset),
            attack: facing.orient(probes.attack_offset),
            detection: facing.orient(probes.detection_offset),
        }
    }

    /// Mirrors every local x offset.
    pub fn mirror(&mut self) {
        self.ground_check.x = -self.ground_check.x;
        self.attack.x = -self.attack.x;
        self.detection.x = -self.detection.x;
    }
}

/// One NPC agent.
#[derive(Debug, Clone)]
pub struct Agent {
    pub(crate) id: AgentId,
    pub(crate) profile: Arc<AgentProfile>,
    pub(crate) position: Vec2,
    pub(crate) velocity: Vec2,
    pub(crate) facing: Facing,
    pub(crate) offsets: FacingOffsets,
    pub(crate) health: u32,
    pub(crate) state: AgentState,
    pub(crate) tasks: TaskSet,
    /// Entry tasks of the current state, cancelled when it is left
    pub(crate) state_tasks: Vec<TaskHandle>,
    pub(crate) attack: Option<AttackWindow>,
    pub(crate) dead: bool,
    pub(crate) hitbox_enabled: bool,
    pub(crate) collision_enabled: bool,
    pub(crate) functional: bool,
    pub(crate) despawn_ready: bool,
    pub(crate) target: Option<TargetHandle>,
    pub(crate) events: Vec<CombatEvent>,
    pub(crate) notices: Vec<AgentNotice>,
}

impl Agent {
    /// Creates an agent in `NormalMoving`.
    ///
    /// An invalid profile is logged and leaves the agent non-functional: it
    /// stays in the registry but every update is a no-op.
    #[must_use]
    pub fn new(profile: Arc<AgentProfile>, position: Vec2, facing: Facing) -> Self {
        let id = AgentId::new();
        let functional = match profile.validate() {
            Ok(()) => true,
            Err(e) => {
                error!(agent = %id, variant = %profile.variant, error = %e, "Agent profile rejected");
                false
            },
        };
        Self {
            id,
            offsets: FacingOffsets::new(&profile.probes, facing),
            health: profile.combat.max_health,
            position,
            velocity: Vec2::ZERO,
            facing,
            state: AgentState::NormalMoving,
            tasks: TaskSet::new(),
            state_tasks: Vec::new(),
            attack: None,
            dead: false,
            hitbox_enabled: false,
            collision_enabled: true,
            functional,
            despawn_ready: false,
            target: None,
            events: Vec::new(),
            notices: Vec::new(),
            profile,
        }
    }

    /// Agent id.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Agent variant.
    #[must_use]
    pub fn variant(&self) -> AgentVariant {
        self.profile.variant
    }

    /// Capability record.
    #[must_use]
    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> AgentState {
        self.state
    }

    /// Current facing.
    #[must_use]
    pub const fn facing(&self) -> Facing {
        self.facing
    }

    /// Facing-dependent anchors.
    #[must_use]
    pub const fn offsets(&self) -> &FacingOffsets {
        &self.offsets
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> u32 {
        self.health
    }

    /// Position of the collider center.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// Current velocity.
    #[must_use]
    pub const fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Whether the agent has died. Never reset once set.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.dead
    }

    /// Whether the profile passed validation.
    #[must_use]
    pub const fn is_functional(&self) -> bool {
        self.functional
    }

    /// Whether the attack hitbox is live.
    #[must_use]
    pub const fn hitbox_enabled(&self) -> bool {
        self.hitbox_enabled
    }

    /// Whether the body still collides.
    #[must_use]
    pub const fn collision_enabled(&self) -> bool {
        self.collision_enabled
    }

    /// Whether the death linger has finished.
    #[must_use]
    pub const fn is_despawn_ready(&self) -> bool {
        self.despawn_ready
    }

    /// Open attack window, if any.
    #[must_use]
    pub const fn attack_window(&self) -> Option<&AttackWindow> {
        self.attack.as_ref()
    }

    /// Target currently being pursued.
    #[must_use]
    pub const fn target(&self) -> Option<TargetHandle> {
        self.target
    }

    /// Pending scheduled tasks.
    #[must_use]
    pub const fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    /// Handles of the tasks the current state scheduled on entry.
    #[must_use]
    pub fn state_tasks(&self) -> &[TaskHandle] {
        &self.state_tasks
    }

    /// Moves the agent. Used by the host's physics step.
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    /// Overrides velocity. Used by the host's physics step (gravity, landing).
    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    /// Collider bounds in world space.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(self.position, self.profile.probes.body_half_extents)
    }

    /// Ground probe anchor in world space.
    #[must_use]
    pub fn ground_anchor(&self) -> Vec2 {
        self.position + self.offsets.ground_check
    }

    /// Detection box in world space, recomputed from position and facing.
    #[must_use]
    pub fn detection_zone(&self) -> Aabb {
        Aabb::from_center(
            self.position + self.offsets.detection,
            self.profile.probes.detection_half_extents,
        )
    }

    /// Attack hitbox in world space.
    #[must_use]
    pub fn attack_zone(&self) -> Aabb {
        Aabb::from_center(
            self.position + self.offsets.attack,
            self.profile.probes.attack_half_extents,
        )
    }

    /// Turns around. Facing and every facing-dependent anchor change
    /// together.
    pub fn flip(&mut self) {
        self.facing = self.facing.flipped();
        self.offsets.mirror();
    }

    /// Turns to `facing` if not already facing that way. Returns whether a
    /// flip happened.
    pub fn face(&mut self, facing: Facing) -> bool {
        if self.facing == facing {
            return false;
        }
        self.flip();
        true
    }

    /// Drains events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<CombatEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn drain_notices(&mut self) -> Vec<AgentNotice> {
        std::mem::take(&mut self.notices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn agent() -> Agent {
        Agent::new(
            Arc::new(AgentProfile::for_variant(AgentVariant::GroundMelee)),
            Vec2::ZERO,
            Facing::Right,
        )
    }

    #[test]
    fn test_new_agent() {
        let agent = agent();
        assert!(agent.is_functional());
        assert_eq!(agent.state(), AgentState::NormalMoving);
        assert_eq!(agent.health(), 4);
        assert!(!agent.is_dead());
        assert!(agent.collision_enabled());
        assert!(agent.attack_window().is_none());
    }

    #[test]
    fn test_invalid_profile_is_non_functional() {
        let mut profile = AgentProfile::default();
        profile.probes.wall_mask = crate::physics::LayerMask::NONE;
        let agent = Agent::new(Arc::new(profile), Vec2::ZERO, Facing::Left);
        assert!(!agent.is_functional());
    }

    #[test]
    fn test_flip_mirrors_offsets() {
        let mut agent = agent();
        let right = *agent.offsets();
        agent.flip();
        assert_eq!(agent.facing(), Facing::Left);
        assert_eq!(agent.offsets().ground_check.x, -right.ground_check.x);
        assert_eq!(agent.offsets().attack.x, -right.attack.x);
        assert_eq!(agent.offsets().ground_check.y, right.ground_check.y);
        assert!(agent.detection_zone().center().x < 0.0);
    }

    #[test]
    fn test_offsets_follow_initial_facing() {
        let profile = Arc::new(AgentProfile::default());
        let left = Agent::new(profile.clone(), Vec2::ZERO, Facing::Left);
        let mut right = Agent::new(profile, Vec2::ZERO, Facing::Right);
        right.flip();
        assert_eq!(left.offsets(), right.offsets());
    }

    #[test]
    fn test_face() {
        let mut agent = agent();
        assert!(!agent.face(Facing::Right));
        assert!(agent.face(Facing::Left));
        assert_eq!(agent.facing(), Facing::Left);
    }

    #[test]
    fn test_transition_table() {
        use AgentState::*;
        assert!(NormalMoving.can_transition(Alert));
        assert!(Passive.can_transition(Alert));
        assert!(Alert.can_transition(AttackMoving));
        assert!(AttackMoving.can_transition(Passive));
        assert!(HitTaken.can_transition(NormalMoving));
        assert!(Attacking.can_transition(Dead));
        assert!(!HitTaken.can_transition(HitTaken));
        assert!(!Passive.can_transition(HitTaken));
        assert!(!Alert.can_transition(Attacking));
        for to in [Passive, Alert, NormalMoving, AttackMoving, Attacking, HitTaken, Dead] {
            assert!(!Dead.can_transition(to));
        }
    }

    proptest! {
        #[test]
        fn prop_two_flips_restore_offsets(flips in 0usize..16) {
            let mut agent = agent();
            let original = *agent.offsets();
            let facing = agent.facing();
            for _ in 0..flips * 2 {
                agent.flip();
            }
            prop_assert_eq!(*agent.offsets(), original);
            prop_assert_eq!(agent.facing(), facing);
        }
    }
}
