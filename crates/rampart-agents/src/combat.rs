//! Combat controller: attack windows, hit registration, damage and death.
//!
//! Attack sequence:
//! 1. **Windup** - charge voice, hitbox off
//! 2. **Active** - hitbox on, at most one hit per window
//! 3. **Recovery** - hitbox off, then back to patrol
//!
//! Each phase boundary is an `AttackPhase` task, so leaving `Attacking` for
//! any reason (stun, death) cancels the remaining phases.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use rampart_common::Facing;

use crate::agent::{Agent, AgentState};
use crate::error::AgentResult;
use crate::events::{AgentNotice, CombatEvent};
use crate::narrator::AudioCue;
use crate::physics::HitTag;
use crate::profile::{AttackStyle, AttackTiming};
use crate::state_machine::{transition, AgentContext};
use crate::tasks::TaskKind;

/// Phase of an open attack window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackPhase {
    /// Wind-up before the hitbox goes live
    Windup,
    /// Hitbox live
    Active,
    /// Cool-down after the swing
    Recovery,
}

/// Timestamps of one attack, computed when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackWindow {
    /// When the attack started
    pub opened_at: f64,
    /// End of windup
    pub windup_end: f64,
    /// End of active phase
    pub active_end: f64,
    /// End of recovery
    pub recovery_end: f64,
    phase: AttackPhase,
    hit_registered: bool,
}

impl AttackWindow {
    /// Opens a window at `now`.
    #[must_use]
    pub fn open(now: f64, timing: &AttackTiming) -> Self {
        let windup_end = now + timing.windup;
        let active_end = windup_end + timing.active;
        Self {
            opened_at: now,
            windup_end,
            active_end,
            recovery_end: active_end + timing.recovery,
            phase: AttackPhase::Windup,
            hit_registered: false,
        }
    }

    /// Phase the window has advanced to.
    #[must_use]
    pub const fn phase(&self) -> AttackPhase {
        self.phase
    }

    /// Whether this window already landed its hit.
    #[must_use]
    pub const fn hit_registered(&self) -> bool {
        self.hit_registered
    }

    /// Whether a hit could still register.
    #[must_use]
    pub fn can_register_hit(&self) -> bool {
        self.phase == AttackPhase::Active && !self.hit_registered
    }
}

/// Result of [`start_attack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackStart {
    /// A new window was opened
    Started,
    /// A window is already open
    AlreadyOpen,
    /// The agent is dead
    Dead,
    /// The agent is not chasing or attacking
    NotReady,
}

/// Result of [`receive_damage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Dead, stunned or non-functional: nothing happened
    Ignored,
    /// Health dropped and the agent is now stunned
    Staggered,
    /// Health dropped without a stun
    Damaged,
    /// Health reached zero
    Killed,
}

/// Starts an attack.
///
/// A chasing agent switches to `Attacking`. No-op if a window is already
/// open or the agent is dead.
pub fn start_attack(agent: &mut Agent, ctx: &mut AgentContext<'_>) -> AgentResult<AttackStart> {
    if agent.dead {
        return Ok(AttackStart::Dead);
    }
    if agent.attack.is_some() {
        debug!(agent = %agent.id, "Attack already in progress");
        return Ok(AttackStart::AlreadyOpen);
    }
    if !agent.functional {
        return Ok(AttackStart::NotReady);
    }
    match agent.state {
        AgentState::AttackMoving => {
            transition(agent, ctx, AgentState::Attacking)?;
            Ok(AttackStart::Started)
        },
        AgentState::Attacking => {
            open_window(agent, ctx)?;
            Ok(AttackStart::Started)
        },
        _ => Ok(AttackStart::NotReady),
    }
}

pub(crate) fn open_window(agent: &mut Agent, ctx: &mut AgentContext<'_>) -> AgentResult<()> {
    let timing = agent.profile.combat.timing;
    let window = AttackWindow::open(ctx.now, &timing);
    for at in [
        timing.windup,
        timing.windup + timing.active,
        timing.total_duration(),
    ] {
        let handle = agent.tasks.schedule(TaskKind::AttackPhase, ctx.now, at);
        agent.state_tasks.push(handle);
    }
    agent.attack = Some(window);
    debug!(agent = %agent.id, until = window.recovery_end, "Attack window opened");
    ctx.voice(agent, AudioCue::Charge, false)?;
    Ok(())
}

/// Advances the open window by one phase. Runs when an `AttackPhase` task
/// resumes.
pub(crate) fn advance_attack(agent: &mut Agent, ctx: &mut AgentContext<'_>) -> AgentResult<()> {
    let Some(phase) = agent.attack.map(|w| w.phase) else {
        return Ok(());
    };
    match phase {
        AttackPhase::Windup => {
            if let Some(window) = agent.attack.as_mut() {
                window.phase = AttackPhase::Active;
            }
            agent.hitbox_enabled = true;
            ctx.sound(agent, AudioCue::Swing)?;
            if let AttackStyle::Ranged { projectile_speed } = agent.profile.combat.style {
                fire_projectile(agent, ctx, projectile_speed)?;
            } else {
                register_hit(agent, ctx)?;
            }
        },
        AttackPhase::Active => {
            if let Some(window) = agent.attack.as_mut() {
                window.phase = AttackPhase::Recovery;
            }
            agent.hitbox_enabled = false;
        },
        AttackPhase::Recovery => {
            agent.attack = None;
            agent.hitbox_enabled = false;
            transition(agent, ctx, AgentState::NormalMoving)?;
        },
    }
    Ok(())
}

/// Checks the melee hitbox against the target. Registers at most one hit
/// per window.
pub(crate) fn register_hit(agent: &mut Agent, ctx: &mut AgentContext<'_>) -> AgentResult<()> {
    if !agent.hitbox_enabled || ctx.target.is_dead() {
        return Ok(());
    }
    if !agent.attack.is_some_and(|w| w.can_register_hit()) {
        return Ok(());
    }
    let target = ctx
        .world
        .overlap_box(&agent.attack_zone(), agent.profile.probes.target_mask)
        .into_iter()
        .find(|hit| hit.tag == HitTag::Target)
        .and_then(|hit| hit.handle);
    let Some(target) = target else {
        return Ok(());
    };

    if let Some(window) = agent.attack.as_mut() {
        window.hit_registered = true;
    }
    let damage = agent.profile.combat.attack_damage;
    agent.events.push(CombatEvent::TargetHit {
        agent: agent.id,
        target,
        damage,
        direction: agent.facing,
    });
    debug!(agent = %agent.id, damage, "Hit registered");
    ctx.sound(agent, AudioCue::Impact)?;
    Ok(())
}

fn fire_projectile(agent: &mut Agent, ctx: &mut AgentContext<'_>, speed: f32) -> AgentResult<()> {
    if agent.attack.is_some_and(|w| w.hit_registered) {
        return Ok(());
    }
    let origin = agent.position + agent.facing.unit() * agent.profile.probes.body_half_extents.x;
    let mut direction = (ctx.target.position() - origin).normalize_or_zero();
    if direction == Vec2::ZERO {
        direction = agent.facing.unit();
    }
    if let Some(window) = agent.attack.as_mut() {
        window.hit_registered = true;
    }
    agent.events.push(CombatEvent::ProjectileFired {
        agent: agent.id,
        origin,
        velocity: direction * speed,
        damage: agent.profile.combat.attack_damage,
    });
    ctx.sound(agent, AudioCue::Projectile)?;
    Ok(())
}

/// Applies a hit.
///
/// `direction` is the way the blow travels; knockback pushes the agent that
/// way. Ignored while dead or already stunned. A powered attacker multiplies
/// the damage by the variant's multiplier.
pub fn receive_damage(
    agent: &mut Agent,
    ctx: &mut AgentContext<'_>,
    direction: Facing,
    amount: u32,
) -> AgentResult<DamageOutcome> {
    if !agent.functional || agent.dead || agent.state == AgentState::HitTaken {
        return Ok(DamageOutcome::Ignored);
    }

    let combat = agent.profile.combat;
    let multiplier = if ctx.target.has_powered_attack() {
        combat.powered_damage_multiplier
    } else {
        1
    };
    let damage = amount.saturating_mul(multiplier);
    agent.health = agent.health.saturating_sub(damage);
    agent.velocity = Vec2::new(combat.knockback.x * direction.sign(), combat.knockback.y);
    debug!(agent = %agent.id, damage, health = agent.health, "Damage received");

    if agent.health == 0 {
        die(agent, ctx)?;
        return Ok(DamageOutcome::Killed);
    }

    if direction != agent.facing {
        agent.flip();
    }
    if agent.state.staggers() {
        transition(agent, ctx, AgentState::HitTaken)?;
        ctx.voice(agent, AudioCue::Hurt, false)?;
        Ok(DamageOutcome::Staggered)
    } else {
        Ok(DamageOutcome::Damaged)
    }
}

fn die(agent: &mut Agent, ctx: &mut AgentContext<'_>) -> AgentResult<()> {
    agent.dead = true;
    agent.tasks.cancel_all();
    agent.state_tasks.clear();
    agent.attack = None;
    agent.hitbox_enabled = false;
    agent.collision_enabled = false;
    transition(agent, ctx, AgentState::Dead)?;
    agent.notices.push(AgentNotice::Died {
        agent: agent.id,
        variant: agent.profile.variant,
        position: agent.position,
        time: ctx.now,
    });
    info!(agent = %agent.id, variant = %agent.profile.variant, "Agent died");
    ctx.voice(agent, AudioCue::Death, true)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_timestamps() {
        let window = AttackWindow::open(2.0, &AttackTiming::new(0.5, 0.25, 1.0));
        assert_eq!(window.windup_end, 2.5);
        assert_eq!(window.active_end, 2.75);
        assert_eq!(window.recovery_end, 3.75);
        assert_eq!(window.phase(), AttackPhase::Windup);
    }

    #[test]
    fn test_hit_only_in_active_phase() {
        let mut window = AttackWindow::open(0.0, &AttackTiming::medium());
        assert!(!window.can_register_hit());
        window.phase = AttackPhase::Active;
        assert!(window.can_register_hit());
        window.hit_registered = true;
        assert!(!window.can_register_hit());
    }
}
