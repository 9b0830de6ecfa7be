//! Arena director: waves, respawns and kill counting.
//!
//! The director is a plain subscriber of the registry's notice bus. It keeps
//! its own [`Subscription`]; dropping the director drops the receiver and the
//! bus prunes it on the next publish. [`ArenaDirector::detach`] unsubscribes
//! explicitly.
//!
//! Only functional agents count toward a wave. Each tick the director also
//! checks its live agents against the registry, so an agent that died or
//! vanished without a notice reaching the director cannot stall the wave.

use ahash::AHashMap;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use rampart_common::{AgentId, Facing};

use crate::events::{AgentNotice, Subscription, SubscriptionId};
use crate::profile::AgentVariant;
use crate::agent::Agent;
use crate::registry::{AgentRegistry, SpawnRequest};

/// One spawn slot of a wave.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// Variant spawned in this slot
    pub variant: AgentVariant,
    /// Spawn position
    pub position: Vec2,
    /// Initial facing
    pub facing: Facing,
}

/// A wave of agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    /// Spawn slots
    pub spawns: Vec<SpawnPoint>,
    /// How many times each slot respawns after a death
    pub respawns_per_slot: u32,
}

/// Something the director did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaEvent {
    /// A wave was spawned (0-based index)
    WaveStarted(usize),
    /// A slot was refilled
    Respawned {
        /// Slot index within the wave
        slot: usize,
        /// New agent
        agent: AgentId,
    },
    /// Every agent of a wave is dead and no respawn is pending
    WaveCleared(usize),
    /// The last wave was cleared
    ArenaCleared,
}

#[derive(Debug, Clone, Copy)]
struct PendingRespawn {
    slot: usize,
    at: f64,
}

/// Drives waves of agents in an arena.
#[derive(Debug)]
pub struct ArenaDirector {
    waves: Vec<Wave>,
    current: Option<usize>,
    respawn_delay: f64,
    subscription: Subscription,
    /// Live agents of the current wave and their slots
    live: AHashMap<AgentId, usize>,
    budgets: Vec<u32>,
    pending: Vec<PendingRespawn>,
    kills: u32,
    finished: bool,
}

impl ArenaDirector {
    /// Creates a director subscribed to `registry`.
    #[must_use]
    pub fn new(registry: &mut AgentRegistry, waves: Vec<Wave>, respawn_delay: f64) -> Self {
        Self {
            waves,
            current: None,
            respawn_delay: respawn_delay.max(0.0),
            subscription: registry.subscribe(),
            live: AHashMap::new(),
            budgets: Vec::new(),
            pending: Vec::new(),
            kills: 0,
            finished: false,
        }
    }

    /// Spawns the first wave.
    pub fn start(&mut self, registry: &mut AgentRegistry) -> Vec<ArenaEvent> {
        let mut events = Vec::new();
        self.start_wave(registry, 0, &mut events);
        events
    }

    /// Processes notices and due respawns.
    pub fn tick(&mut self, registry: &mut AgentRegistry, now: f64) -> Vec<ArenaEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        for notice in self.subscription.drain() {
            if let AgentNotice::Died { agent, .. } = notice {
                self.on_death(agent, now);
            }
        }
        self.sweep(registry, now);

        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.at <= now);
        self.pending = later;
        if let Some(wave) = self.current.and_then(|i| self.waves.get(i)) {
            for respawn in due {
                if let Some(point) = wave.spawns.get(respawn.slot) {
                    let spawned = Self::spawn_slot(&mut self.live, registry, respawn.slot, point);
                    if let Some(agent) = spawned {
                        events.push(ArenaEvent::Respawned {
                            slot: respawn.slot,
                            agent,
                        });
                    }
                }
            }
        }

        if let Some(index) = self.current {
            if self.live.is_empty() && self.pending.is_empty() {
                info!(wave = index, kills = self.kills, "Wave cleared");
                events.push(ArenaEvent::WaveCleared(index));
                self.start_wave(registry, index + 1, &mut events);
            }
        }
        events
    }

    /// Spawns `point` into `slot`. Agents with a rejected profile are inert
    /// and never counted.
    fn spawn_slot(
        live: &mut AHashMap<AgentId, usize>,
        registry: &mut AgentRegistry,
        slot: usize,
        point: &SpawnPoint,
    ) -> Option<AgentId> {
        let request = SpawnRequest::new(point.variant, point.position).with_facing(point.facing);
        let agent = registry.spawn(&request);
        if !registry.get(agent).is_some_and(Agent::is_functional) {
            warn!(agent = %agent, slot, variant = %point.variant, "Agent not functional, slot skipped");
            return None;
        }
        live.insert(agent, slot);
        Some(agent)
    }

    /// Settles live agents whose notice never arrived: dead ones count as
    /// kills, missing ones are dropped without a respawn.
    fn sweep(&mut self, registry: &AgentRegistry, now: f64) {
        let mut stale: Vec<AgentId> = self
            .live
            .keys()
            .copied()
            .filter(|id| registry.get(*id).map_or(true, Agent::is_dead))
            .collect();
        stale.sort_unstable();
        for agent in stale {
            if registry.get(agent).is_some() {
                warn!(agent = %agent, "Death notice missed, counting kill");
                self.on_death(agent, now);
            } else {
                warn!(agent = %agent, "Agent left the registry while alive");
                self.live.remove(&agent);
            }
        }
    }

    fn on_death(&mut self, agent: AgentId, now: f64) {
        let Some(slot) = self.live.remove(&agent) else {
            return;
        };
        self.kills += 1;
        if let Some(budget) = self.budgets.get_mut(slot) {
            if *budget > 0 {
                *budget -= 1;
                self.pending.push(PendingRespawn {
                    slot,
                    at: now + self.respawn_delay,
                });
            }
        }
    }

    fn start_wave(&mut self, registry: &mut AgentRegistry, index: usize, events: &mut Vec<ArenaEvent>) {
        let Some(wave) = self.waves.get(index) else {
            self.current = None;
            self.finished = true;
            info!(kills = self.kills, "Arena cleared");
            events.push(ArenaEvent::ArenaCleared);
            return;
        };
        self.current = Some(index);
        self.budgets = vec![wave.respawns_per_slot; wave.spawns.len()];
        self.pending.clear();
        for (slot, point) in wave.spawns.iter().enumerate() {
            Self::spawn_slot(&mut self.live, registry, slot, point);
        }
        info!(wave = index, agents = self.live.len(), "Wave started");
        events.push(ArenaEvent::WaveStarted(index));
    }

    /// Unsubscribes from the registry.
    pub fn detach(self, registry: &mut AgentRegistry) {
        registry.unsubscribe(self.subscription.id());
    }

    /// Id of the director's notice subscription.
    #[must_use]
    pub const fn subscription_id(&self) -> SubscriptionId {
        self.subscription.id()
    }

    /// Total kills.
    #[must_use]
    pub const fn kills(&self) -> u32 {
        self.kills
    }

    /// Current wave index.
    #[must_use]
    pub const fn current_wave(&self) -> Option<usize> {
        self.current
    }

    /// Functional agents of the current wave still alive.
    #[must_use]
    pub fn alive(&self) -> usize {
        self.live.len()
    }

    /// Whether every wave was cleared.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::DamageOutcome;
    use crate::narrator::{AlwaysVisible, AudioOutput, Narrator, PlaybackRequest};
    use crate::perception::TargetSnapshot;
    use crate::physics::StaticWorld;
    use crate::profile::AgentProfile;
    use crate::state_machine::AgentContext;
    use rampart_common::TargetHandle;

    fn point(x: f32) -> SpawnPoint {
        SpawnPoint {
            variant: AgentVariant::FlyingRanged,
            position: Vec2::new(x, 4.0),
            facing: Facing::Left,
        }
    }

    fn kill(registry: &mut AgentRegistry, id: AgentId, now: f64) {
        let world = StaticWorld::new();
        let target = TargetSnapshot::alive(TargetHandle::PLAYER, Vec2::new(100.0, 0.0));
        let mut narrator = Narrator::default();
        let mut sink: Vec<PlaybackRequest> = Vec::new();
        let mut ctx = AgentContext {
            now,
            world: &world,
            target: &target,
            narrator: &mut narrator,
            audio: AudioOutput {
                viewport: &AlwaysVisible,
                sink: &mut sink,
            },
        };
        let outcome = registry.receive_damage(id, &mut ctx, Facing::Right, 100);
        assert_eq!(outcome.ok(), Some(DamageOutcome::Killed));
    }

    #[test]
    fn test_waves_advance_when_cleared() {
        let mut registry = AgentRegistry::new();
        let waves = vec![
            Wave {
                spawns: vec![point(0.0)],
                respawns_per_slot: 0,
            },
            Wave {
                spawns: vec![point(1.0), point(2.0)],
                respawns_per_slot: 0,
            },
        ];
        let mut director = ArenaDirector::new(&mut registry, waves, 1.0);
        assert_eq!(director.start(&mut registry), vec![ArenaEvent::WaveStarted(0)]);
        assert_eq!(director.alive(), 1);

        let first = registry.ids()[0];
        kill(&mut registry, first, 1.0);
        let events = director.tick(&mut registry, 1.0);
        assert_eq!(
            events,
            vec![ArenaEvent::WaveCleared(0), ArenaEvent::WaveStarted(1)]
        );
        assert_eq!(director.alive(), 2);

        let remaining: Vec<_> = registry
            .iter()
            .filter(|a| !a.is_dead())
            .map(|a| a.id())
            .collect();
        for id in remaining {
            kill(&mut registry, id, 2.0);
        }
        let events = director.tick(&mut registry, 2.0);
        assert_eq!(
            events,
            vec![ArenaEvent::WaveCleared(1), ArenaEvent::ArenaCleared]
        );
        assert!(director.is_finished());
        assert_eq!(director.kills(), 3);
    }

    #[test]
    fn test_respawn_after_delay() {
        let mut registry = AgentRegistry::new();
        let waves = vec![Wave {
            spawns: vec![point(0.0)],
            respawns_per_slot: 1,
        }];
        let mut director = ArenaDirector::new(&mut registry, waves, 2.0);
        director.start(&mut registry);

        let first = registry.ids()[0];
        kill(&mut registry, first, 1.0);
        assert!(director.tick(&mut registry, 1.0).is_empty());
        assert!(director.tick(&mut registry, 2.5).is_empty());

        let events = director.tick(&mut registry, 3.0);
        assert!(matches!(events.as_slice(), [ArenaEvent::Respawned { slot: 0, .. }]));
        assert_eq!(director.alive(), 1);

        let second = registry
            .iter()
            .find(|a| !a.is_dead())
            .map(|a| a.id())
            .expect("respawned agent");
        kill(&mut registry, second, 4.0);
        let events = director.tick(&mut registry, 4.0);
        assert_eq!(events, vec![ArenaEvent::WaveCleared(0), ArenaEvent::ArenaCleared]);
    }

    #[test]
    fn test_detach_unsubscribes() {
        let mut registry = AgentRegistry::new();
        let director = ArenaDirector::new(&mut registry, Vec::new(), 0.0);
        let id = director.subscription_id();
        director.detach(&mut registry);
        assert!(!registry.unsubscribe(id));
    }

    #[test]
    fn test_inert_agents_do_not_hold_a_wave() {
        let mut registry = AgentRegistry::new();
        let broken = AgentProfile::for_variant(AgentVariant::FlyingRanged).with_health(0);
        registry.set_profile(broken);
        let waves = vec![Wave {
            spawns: vec![point(0.0), point(1.0)],
            respawns_per_slot: 2,
        }];
        let mut director = ArenaDirector::new(&mut registry, waves, 0.0);
        assert_eq!(director.start(&mut registry), vec![ArenaEvent::WaveStarted(0)]);
        assert_eq!(director.alive(), 0);
        assert_eq!(registry.len(), 2);

        let events = director.tick(&mut registry, 0.0);
        assert_eq!(events, vec![ArenaEvent::WaveCleared(0), ArenaEvent::ArenaCleared]);
        assert_eq!(director.kills(), 0);
    }

    #[test]
    fn test_missed_death_notice_is_recovered() {
        let mut registry = AgentRegistry::new();
        let waves = vec![Wave {
            spawns: vec![point(0.0)],
            respawns_per_slot: 0,
        }];
        let mut director = ArenaDirector::new(&mut registry, waves, 0.0);
        director.start(&mut registry);

        let first = registry.ids()[0];
        kill(&mut registry, first, 1.0);
        // Lose the notice before the director sees it
        let _ = director.subscription.drain();

        let events = director.tick(&mut registry, 1.0);
        assert_eq!(events, vec![ArenaEvent::WaveCleared(0), ArenaEvent::ArenaCleared]);
        assert_eq!(director.kills(), 1);
    }

    #[test]
    fn test_removed_agent_does_not_stall_wave() {
        let mut registry = AgentRegistry::new();
        let waves = vec![Wave {
            spawns: vec![point(0.0)],
            respawns_per_slot: 3,
        }];
        let mut director = ArenaDirector::new(&mut registry, waves, 0.0);
        director.start(&mut registry);

        let first = registry.ids()[0];
        registry.remove(first).expect("spawned agent");
        let events = director.tick(&mut registry, 1.0);
        assert_eq!(events, vec![ArenaEvent::WaveCleared(0), ArenaEvent::ArenaCleared]);
        assert_eq!(director.kills(), 0);
        assert!(registry.is_empty());
    }
}
