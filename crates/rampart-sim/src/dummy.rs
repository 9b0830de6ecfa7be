//! Scripted target dummy.
//!
//! Stands in the middle of the arena, swings at agents in reach on a fixed
//! cadence and goes down for a while when its health runs out. Every n-th
//! swing is powered.

use glam::Vec2;
use tracing::{debug, info};

use rampart_agents::{Aabb, TargetStatus};
use rampart_common::{Facing, TargetHandle};

use crate::config::SimConfig;

/// Half extents of the dummy's body.
const BODY_HALF_EXTENTS: Vec2 = Vec2::new(0.4, 0.5);

/// A swing the dummy just started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swing {
    /// Damage per agent struck
    pub damage: u32,
    /// Whether this swing is powered
    pub powered: bool,
}

/// The agents' target.
#[derive(Debug, Clone)]
pub struct Dummy {
    handle: TargetHandle,
    position: Vec2,
    max_health: u32,
    health: u32,
    down_until: Option<f64>,
    next_swing: f64,
    swings: u32,
    powered: bool,
    knockouts: u32,
    reach: f32,
    swing_interval: f64,
    damage: u32,
    powered_every: u32,
    revive_delay: f64,
}

impl Dummy {
    /// Create a dummy standing on the floor at `x`.
    #[must_use]
    pub fn new(config: &SimConfig, x: f32, floor_top: f32) -> Self {
        Self {
            handle: TargetHandle::PLAYER,
            position: Vec2::new(x, floor_top + BODY_HALF_EXTENTS.y),
            max_health: config.dummy_health,
            health: config.dummy_health,
            down_until: None,
            next_swing: config.dummy_swing_interval,
            swings: 0,
            powered: false,
            knockouts: 0,
            reach: config.dummy_reach,
            swing_interval: config.dummy_swing_interval,
            damage: config.dummy_damage,
            powered_every: config.powered_every,
            revive_delay: config.dummy_revive_delay,
        }
    }

    /// Collision bounds.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(self.position, BODY_HALF_EXTENTS)
    }

    /// Current health.
    #[must_use]
    pub fn health(&self) -> u32 {
        self.health
    }

    /// Times the dummy was knocked out.
    #[must_use]
    pub fn knockouts(&self) -> u32 {
        self.knockouts
    }

    /// Swings made so far.
    #[must_use]
    pub fn swings(&self) -> u32 {
        self.swings
    }

    /// Applies an agent's hit. Returns true if it knocked the dummy out.
    pub fn take_hit(&mut self, damage: u32, now: f64) -> bool {
        if self.down_until.is_some() {
            return false;
        }
        self.health = self.health.saturating_sub(damage);
        debug!(damage, health = self.health, "Dummy hit");
        if self.health > 0 {
            return false;
        }
        self.down_until = Some(now + self.revive_delay);
        self.powered = false;
        self.knockouts += 1;
        info!(knockouts = self.knockouts, "Dummy knocked out");
        true
    }

    /// Gets back up once the down time is over. Returns true on revival.
    pub fn revive_if_due(&mut self, now: f64) -> bool {
        match self.down_until {
            Some(at) if now >= at => {
                self.down_until = None;
                self.health = self.max_health;
                self.next_swing = now + self.swing_interval;
                info!("Dummy revived");
                true
            },
            _ => false,
        }
    }

    /// Starts a swing if one is due.
    pub fn try_swing(&mut self, now: f64) -> Option<Swing> {
        if self.down_until.is_some() || now < self.next_swing {
            return None;
        }
        self.swings += 1;
        self.next_swing = now + self.swing_interval;
        self.powered = self.powered_every > 0 && self.swings % self.powered_every == 0;
        Some(Swing {
            damage: self.damage,
            powered: self.powered,
        })
    }

    /// Direction a swing travels to reach `point`, if it is in reach.
    #[must_use]
    pub fn strike_direction(&self, point: Vec2) -> Option<Facing> {
        let delta = point - self.position;
        if delta.x.abs() > self.reach || delta.y.abs() > BODY_HALF_EXTENTS.y + self.reach {
            return None;
        }
        Some(Facing::from_sign(delta.x).unwrap_or(Facing::Right))
    }
}

impl TargetStatus for Dummy {
    fn handle(&self) -> TargetHandle {
        self.handle
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn is_dead(&self) -> bool {
        self.down_until.is_some()
    }

    fn has_powered_attack(&self) -> bool {
        self.powered
    }
}
