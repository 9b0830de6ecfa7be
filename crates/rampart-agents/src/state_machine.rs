//! The agent state machine.
//!
//! One engine drives every variant; variant differences come from the
//! profile. Two entry points per agent and tick:
//! - [`update`] on the variable (render) tick: resumes due tasks, runs
//!   detection and hit registration.
//! - [`fixed_update`] on the fixed (physics) tick: edge/wall probing and
//!   velocity.
//!
//! Every state change goes through [`transition`], which rejects edges not in
//! the transition table, cancels tasks that may not outlive the old state and
//! schedules the entry tasks of the new one.

use glam::Vec2;
use tracing::{debug, trace};

use crate::agent::{Agent, AgentState};
use crate::combat::{advance_attack, open_window, register_hit};
use crate::error::AgentResult;
use crate::events::CombatEvent;
use crate::movement;
use crate::narrator::{AudioCue, AudioOutput, NarrationOutcome, Narrator, Speaker};
use crate::perception::{self, TargetStatus};
use crate::physics::WorldQuery;
use crate::profile::MovementStyle;
use crate::tasks::TaskKind;

/// Everything an agent needs from the outside world for one tick.
pub struct AgentContext<'a> {
    /// Simulation time in seconds
    pub now: f64,
    /// Physics queries
    pub world: &'a dyn WorldQuery,
    /// The hostile target
    pub target: &'a dyn TargetStatus,
    /// Clip picker and voice gate
    pub narrator: &'a mut Narrator,
    /// Camera and audio backend
    pub audio: AudioOutput<'a>,
}

impl AgentContext<'_> {
    /// Requests a voice line for `agent`.
    pub fn voice(
        &mut self,
        agent: &Agent,
        cue: AudioCue,
        forced: bool,
    ) -> AgentResult<NarrationOutcome> {
        let speaker = Speaker {
            agent: agent.id,
            position: agent.position,
            clips: &agent.profile.narration,
        };
        Ok(self
            .narrator
            .try_play_voice(speaker, cue, forced, self.now, &mut self.audio)?)
    }

    /// Requests a sound effect for `agent`.
    pub fn sound(&mut self, agent: &Agent, cue: AudioCue) -> AgentResult<NarrationOutcome> {
        let speaker = Speaker {
            agent: agent.id,
            position: agent.position,
            clips: &agent.profile.narration,
        };
        Ok(self.narrator.try_play_sound(speaker, cue, &mut self.audio)?)
    }
}

/// Moves `agent` to `to` if the transition table allows it.
///
/// Returns whether the state changed. Same-state and disallowed requests are
/// no-ops.
pub fn transition(
    agent: &mut Agent,
    ctx: &mut AgentContext<'_>,
    to: AgentState,
) -> AgentResult<bool> {
    let from = agent.state;
    if from == to || !from.can_transition(to) {
        trace!(agent = %agent.id, ?from, ?to, "Transition ignored");
        return Ok(false);
    }

    if from == AgentState::Attacking {
        agent.attack = None;
        agent.hitbox_enabled = false;
    }
    for handle in agent.state_tasks.drain(..) {
        agent.tasks.cancel(handle);
    }
    for kind in [TaskKind::IdleVoice, TaskKind::WalkSound] {
        if !kind.runs_in(to) {
            agent.tasks.cancel_kind(kind);
        }
    }
    agent.state = to;
    arm_loops(agent, ctx.now);
    agent.events.push(CombatEvent::StateChanged {
        agent: agent.id,
        from,
        to,
    });
    debug!(agent = %agent.id, ?from, ?to, "State changed");

    let now = ctx.now;
    let motion = agent.profile.motion;
    let entry = match to {
        AgentState::Alert => Some((TaskKind::AlertDelay, motion.alert_delay)),
        AgentState::AttackMoving => Some((TaskKind::PursuitTimeout, motion.max_pursuit)),
        AgentState::Passive => Some((TaskKind::TurnAround, motion.turn_around_delay)),
        AgentState::HitTaken => Some((TaskKind::Stun, agent.profile.combat.stun_duration)),
        AgentState::Dead => Some((TaskKind::DeathLinger, agent.profile.combat.death_linger)),
        AgentState::Attacking | AgentState::NormalMoving => None,
    };
    if let Some((kind, delay)) = entry {
        let handle = agent.tasks.schedule(kind, now, delay);
        agent.state_tasks.push(handle);
    }
    match to {
        AgentState::Alert => {
            ctx.voice(agent, AudioCue::Alert, false)?;
        },
        AgentState::Attacking => open_window(agent, ctx)?,
        AgentState::NormalMoving => agent.target = None,
        _ => {},
    }
    Ok(true)
}

/// Starts the periodic idle-voice and walk-sound loops the current state
/// calls for, if they are not running yet.
fn arm_loops(agent: &mut Agent, now: f64) {
    let narration = &agent.profile.narration;
    for (kind, period) in [
        (TaskKind::IdleVoice, narration.idle_voice_period),
        (TaskKind::WalkSound, narration.walk_sound_period),
    ] {
        if kind.runs_in(agent.state) && !agent.tasks.is_pending(kind) {
            agent.tasks.schedule_periodic(kind, now, period);
        }
    }
}

fn resume(agent: &mut Agent, ctx: &mut AgentContext<'_>, kind: TaskKind) -> AgentResult<()> {
    match kind {
        TaskKind::AlertDelay => {
            if !agent.dead {
                transition(agent, ctx, AgentState::AttackMoving)?;
            }
        },
        TaskKind::PursuitTimeout | TaskKind::Stun | TaskKind::TurnAround => {
            transition(agent, ctx, AgentState::NormalMoving)?;
        },
        TaskKind::AttackPhase => advance_attack(agent, ctx)?,
        TaskKind::IdleVoice => {
            ctx.voice(agent, AudioCue::Idle, false)?;
        },
        TaskKind::WalkSound => {
            ctx.sound(agent, AudioCue::Footstep)?;
        },
        TaskKind::DeathLinger => {
            agent.despawn_ready = true;
            debug!(agent = %agent.id, "Ready to despawn");
        },
    }
    Ok(())
}

/// Direction of the line-of-sight ray: straight ahead for walkers, at the
/// target for flyers.
fn sight_direction(agent: &Agent, target: Vec2) -> Vec2 {
    match agent.profile.motion.style {
        MovementStyle::Ground => agent.facing.unit(),
        MovementStyle::Flying { .. } => target - agent.position,
    }
}

/// Whether the path ahead is blocked by an edge or a wall.
fn path_blocked(agent: &Agent, world: &dyn WorldQuery) -> bool {
    let edge = agent.profile.motion.style.probes_edges() && perception::probe_ground_edge(agent, world);
    edge || perception::probe_wall(agent, world, agent.facing)
}

/// Variable-tick update.
pub fn update(agent: &mut Agent, ctx: &mut AgentContext<'_>) -> AgentResult<()> {
    if !agent.functional || agent.despawn_ready {
        return Ok(());
    }
    if !agent.dead {
        arm_loops(agent, ctx.now);
    }

    while let Some(task) = agent.tasks.pop_due(ctx.now) {
        resume(agent, ctx, task.kind)?;
    }
    if agent.dead {
        return Ok(());
    }

    let target_alive = !ctx.target.is_dead();
    match agent.state {
        AgentState::NormalMoving | AgentState::Passive if target_alive => {
            if let Some(handle) = perception::detect_target(agent, ctx.world) {
                let direction = sight_direction(agent, ctx.target.position());
                if perception::has_line_of_sight(agent, ctx.world, direction) {
                    agent.target = Some(handle);
                    transition(agent, ctx, AgentState::Alert)?;
                }
            }
        },
        AgentState::AttackMoving if target_alive => {
            if perception::in_attack_range(agent, ctx.world) {
                transition(agent, ctx, AgentState::Attacking)?;
            }
        },
        AgentState::Attacking => register_hit(agent, ctx)?,
        _ => {},
    }
    Ok(())
}

/// Fixed-tick update. Returns the velocity committed for this tick.
pub fn fixed_update(agent: &mut Agent, ctx: &mut AgentContext<'_>) -> AgentResult<Vec2> {
    if !agent.functional {
        return Ok(agent.velocity);
    }

    if !agent.dead {
        match agent.state {
            AgentState::NormalMoving => {
                if path_blocked(agent, ctx.world) {
                    agent.flip();
                    debug!(agent = %agent.id, facing = ?agent.facing, "Patrol turn");
                }
            },
            AgentState::AttackMoving => {
                movement::face_target(agent, ctx.target.position());
                if path_blocked(agent, ctx.world) {
                    agent.flip();
                    transition(agent, ctx, AgentState::Passive)?;
                }
            },
            _ => {},
        }
    }

    let velocity = movement::compute_velocity(agent, Some(ctx.target.position()));
    agent.velocity = velocity;
    Ok(velocity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrator::{AlwaysVisible, PlaybackRequest, VoiceGate};
    use crate::perception::TargetSnapshot;
    use crate::physics::{Aabb, Collider, StaticWorld};
    use crate::profile::{AgentProfile, AgentVariant};
    use rampart_common::{Facing, TargetHandle};
    use std::sync::Arc;

    fn arena() -> StaticWorld {
        StaticWorld::new().with(Collider::ground(Aabb::new(
            Vec2::new(-50.0, -1.5),
            Vec2::new(50.0, -0.5),
        )))
    }

    fn grunt() -> Agent {
        Agent::new(
            Arc::new(AgentProfile::for_variant(AgentVariant::GroundMelee)),
            Vec2::ZERO,
            Facing::Right,
        )
    }

    struct Rig {
        world: StaticWorld,
        target: TargetSnapshot,
        narrator: Narrator,
        sink: Vec<PlaybackRequest>,
    }

    impl Rig {
        fn new(world: StaticWorld) -> Self {
            Self {
                world,
                target: TargetSnapshot::alive(TargetHandle::PLAYER, Vec2::new(30.0, 0.0)),
                narrator: Narrator::new(VoiceGate::new(1.0), 3),
                sink: Vec::new(),
            }
        }

        fn tick(&mut self, agent: &mut Agent, now: f64) {
            let mut ctx = AgentContext {
                now,
                world: &self.world,
                target: &self.target,
                narrator: &mut self.narrator,
                audio: AudioOutput {
                    viewport: &AlwaysVisible,
                    sink: &mut self.sink,
                },
            };
            update(agent, &mut ctx).expect("update");
            fixed_update(agent, &mut ctx).expect("fixed update");
        }

        fn go(&mut self, agent: &mut Agent, now: f64, to: AgentState) -> bool {
            let mut ctx = AgentContext {
                now,
                world: &self.world,
                target: &self.target,
                narrator: &mut self.narrator,
                audio: AudioOutput {
                    viewport: &AlwaysVisible,
                    sink: &mut self.sink,
                },
            };
            transition(agent, &mut ctx, to).expect("transition")
        }
    }

    #[test]
    fn test_patrol_velocity() {
        let mut rig = Rig::new(arena());
        let mut agent = grunt();
        rig.tick(&mut agent, 0.0);
        assert_eq!(agent.state(), AgentState::NormalMoving);
        assert_eq!(agent.velocity().x, agent.profile().motion.patrol_speed);
    }

    #[test]
    fn test_patrol_turns_at_edge() {
        let world = StaticWorld::new().with(Collider::ground(Aabb::new(
            Vec2::new(-10.0, -1.5),
            Vec2::new(0.3, -0.5),
        )));
        let mut rig = Rig::new(world);
        let mut agent = grunt();
        rig.tick(&mut agent, 0.0);
        assert_eq!(agent.facing(), Facing::Left);
        assert_eq!(agent.state(), AgentState::NormalMoving);
        assert!(agent.velocity().x < 0.0);
    }

    #[test]
    fn test_periodic_loops_follow_state() {
        let mut rig = Rig::new(arena());
        let mut agent = grunt();
        rig.tick(&mut agent, 0.0);
        assert!(agent.tasks().is_pending(TaskKind::IdleVoice));
        assert!(agent.tasks().is_pending(TaskKind::WalkSound));

        rig.tick(&mut agent, 1.0);
        assert!(rig.sink.iter().any(|r| r.cue == AudioCue::Footstep));
    }

    #[test]
    fn test_detection_needs_line_of_sight() {
        let world = arena()
            .with(Collider::target(
                Aabb::from_center(Vec2::new(5.0, 0.0), Vec2::new(0.4, 0.5)),
                TargetHandle::PLAYER,
            ))
            .with(Collider::wall(Aabb::new(Vec2::new(2.0, -0.5), Vec2::new(2.5, 3.0))));
        let mut rig = Rig::new(world);
        rig.target.position = Vec2::new(5.0, 0.0);
        let mut agent = grunt();
        rig.tick(&mut agent, 0.0);
        assert_eq!(agent.state(), AgentState::NormalMoving);
    }

    #[test]
    fn test_dead_target_is_ignored() {
        let world = arena().with(Collider::target(
            Aabb::from_center(Vec2::new(5.0, 0.0), Vec2::new(0.4, 0.5)),
            TargetHandle::PLAYER,
        ));
        let mut rig = Rig::new(world);
        rig.target.position = Vec2::new(5.0, 0.0);
        rig.target.dead = true;
        let mut agent = grunt();
        rig.tick(&mut agent, 0.0);
        assert_eq!(agent.state(), AgentState::NormalMoving);
    }

    #[test]
    fn test_non_functional_agent_is_inert() {
        let mut profile = AgentProfile::default();
        profile.probes.target_mask = crate::physics::LayerMask::NONE;
        let mut agent = Agent::new(Arc::new(profile), Vec2::ZERO, Facing::Right);
        let mut rig = Rig::new(arena());
        rig.tick(&mut agent, 0.0);
        rig.tick(&mut agent, 5.0);
        assert_eq!(agent.velocity(), Vec2::ZERO);
        assert!(agent.tasks().is_empty());
        assert!(rig.sink.is_empty());
    }

    #[test]
    fn test_leaving_state_cancels_its_entry_tasks() {
        let mut rig = Rig::new(arena());
        let mut agent = grunt();
        assert!(rig.go(&mut agent, 0.0, AgentState::Alert));
        assert_eq!(agent.state_tasks().len(), 1);
        let alert_delay = agent.state_tasks()[0];

        assert!(rig.go(&mut agent, 0.1, AgentState::HitTaken));
        assert!(!agent.tasks().is_pending(TaskKind::AlertDelay));
        assert_eq!(agent.state_tasks().len(), 1);
        assert_ne!(agent.state_tasks()[0], alert_delay);
        assert!(agent.tasks().is_pending(TaskKind::Stun));
    }

    #[test]
    fn test_interrupted_attack_drops_its_phases() {
        let mut rig = Rig::new(arena());
        let mut agent = grunt();
        rig.go(&mut agent, 0.0, AgentState::Alert);
        rig.go(&mut agent, 0.1, AgentState::AttackMoving);
        assert!(rig.go(&mut agent, 0.2, AgentState::Attacking));
        assert_eq!(agent.state_tasks().len(), 3);
        assert!(agent.tasks().is_pending(TaskKind::AttackPhase));

        assert!(rig.go(&mut agent, 0.3, AgentState::HitTaken));
        assert!(!agent.tasks().is_pending(TaskKind::AttackPhase));
        assert!(!agent.tasks().is_pending(TaskKind::PursuitTimeout));
        assert!(agent.attack_window().is_none());
    }

    #[test]
    fn test_loops_stop_outside_their_states() {
        let mut rig = Rig::new(arena());
        let mut agent = grunt();
        rig.tick(&mut agent, 0.0);
        assert!(rig.go(&mut agent, 0.1, AgentState::Alert));
        assert!(!agent.tasks().is_pending(TaskKind::IdleVoice));
        assert!(!agent.tasks().is_pending(TaskKind::WalkSound));
    }
}
