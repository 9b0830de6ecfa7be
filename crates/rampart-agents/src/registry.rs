//! Registry of live agents.

use ahash::AHashMap;
use glam::Vec2;
use std::sync::Arc;
use tracing::{debug, info};

use rampart_common::{AgentId, Facing};

use crate::agent::{Agent, AgentState};
use crate::combat::{self, AttackStart, DamageOutcome};
use crate::error::{AgentError, AgentResult};
use crate::events::{AgentNotice, CombatEvent, NoticeBus, Subscription, SubscriptionId};
use crate::profile::{AgentProfile, AgentVariant};
use crate::state_machine::{self, AgentContext};

/// Spawn parameters supplied by a spawner.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    /// Variant to spawn
    pub variant: AgentVariant,
    /// Spawn position
    pub position: Vec2,
    /// Initial facing
    pub facing: Facing,
}

impl SpawnRequest {
    /// Creates a spawn request facing right.
    #[must_use]
    pub const fn new(variant: AgentVariant, position: Vec2) -> Self {
        Self {
            variant,
            position,
            facing: Facing::Right,
        }
    }

    /// Set initial facing.
    #[must_use]
    pub const fn with_facing(mut self, facing: Facing) -> Self {
        self.facing = facing;
        self
    }
}

/// Owns every live agent, ticks them and publishes their lifecycle notices.
#[derive(Debug)]
pub struct AgentRegistry {
    agents: AHashMap<AgentId, Agent>,
    /// Spawn order, so ticks are deterministic.
    order: Vec<AgentId>,
    profiles: AHashMap<AgentVariant, Arc<AgentProfile>>,
    bus: NoticeBus,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    /// Creates an empty registry using the default profile of each variant.
    #[must_use]
    pub fn new() -> Self {
        let profiles = AgentVariant::all()
            .into_iter()
            .map(|v| (v, Arc::new(AgentProfile::for_variant(v))))
            .collect();
        Self {
            agents: AHashMap::new(),
            order: Vec::new(),
            profiles,
            bus: NoticeBus::default(),
        }
    }

    /// Replaces the profile used for future spawns of its variant.
    pub fn set_profile(&mut self, profile: AgentProfile) {
        self.profiles.insert(profile.variant, Arc::new(profile));
    }

    /// Profile used for a variant.
    #[must_use]
    pub fn profile(&self, variant: AgentVariant) -> Option<&Arc<AgentProfile>> {
        self.profiles.get(&variant)
    }

    /// Spawns an agent.
    pub fn spawn(&mut self, request: &SpawnRequest) -> AgentId {
        let profile = self
            .profiles
            .get(&request.variant)
            .cloned()
            .unwrap_or_else(|| Arc::new(AgentProfile::for_variant(request.variant)));
        let agent = Agent::new(profile, request.position, request.facing);
        let id = agent.id();
        info!(agent = %id, variant = %request.variant, x = request.position.x, y = request.position.y, "Agent spawned");
        self.agents.insert(id, agent);
        self.order.push(id);
        id
    }

    /// Removes an agent immediately, without a despawn notice.
    pub fn remove(&mut self, id: AgentId) -> AgentResult<Agent> {
        let agent = self.agents.remove(&id).ok_or(AgentError::NotFound(id))?;
        self.order.retain(|other| *other != id);
        Ok(agent)
    }

    /// Looks up an agent.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// Looks up an agent mutably.
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// State of an agent.
    pub fn state(&self, id: AgentId) -> AgentResult<AgentState> {
        self.get(id).map(Agent::state).ok_or(AgentError::NotFound(id))
    }

    /// Facing of an agent.
    pub fn facing(&self, id: AgentId) -> AgentResult<Facing> {
        self.get(id).map(Agent::facing).ok_or(AgentError::NotFound(id))
    }

    /// Applies a hit to an agent.
    pub fn receive_damage(
        &mut self,
        id: AgentId,
        ctx: &mut AgentContext<'_>,
        direction: Facing,
        amount: u32,
    ) -> AgentResult<DamageOutcome> {
        let agent = self.agents.get_mut(&id).ok_or(AgentError::NotFound(id))?;
        let outcome = combat::receive_damage(agent, ctx, direction, amount)?;
        let notices = agent.drain_notices();
        self.publish(&notices);
        Ok(outcome)
    }

    /// Asks an agent to start an attack.
    pub fn start_attack(
        &mut self,
        id: AgentId,
        ctx: &mut AgentContext<'_>,
    ) -> AgentResult<AttackStart> {
        let agent = self.agents.get_mut(&id).ok_or(AgentError::NotFound(id))?;
        combat::start_attack(agent, ctx)
    }

    /// Variable-tick update of every agent, then removal of agents whose
    /// death linger finished. Returns the events produced this tick.
    pub fn update_all(&mut self, ctx: &mut AgentContext<'_>) -> AgentResult<Vec<CombatEvent>> {
        let mut events = Vec::new();
        let mut notices = Vec::new();
        for id in &self.order {
            if let Some(agent) = self.agents.get_mut(id) {
                state_machine::update(agent, ctx)?;
                events.append(&mut agent.drain_events());
                notices.append(&mut agent.drain_notices());
            }
        }
        self.publish(&notices);
        self.reap();
        Ok(events)
    }

    /// Fixed-tick update of every agent. Returns the events produced.
    pub fn fixed_update_all(&mut self, ctx: &mut AgentContext<'_>) -> AgentResult<Vec<CombatEvent>> {
        let mut events = Vec::new();
        for id in &self.order {
            if let Some(agent) = self.agents.get_mut(id) {
                state_machine::fixed_update(agent, ctx)?;
                events.append(&mut agent.drain_events());
            }
        }
        Ok(events)
    }

    fn reap(&mut self) {
        let ready: Vec<AgentId> = self
            .order
            .iter()
            .copied()
            .filter(|id| self.agents.get(id).is_some_and(Agent::is_despawn_ready))
            .collect();
        for id in ready {
            self.agents.remove(&id);
            self.order.retain(|other| *other != id);
            debug!(agent = %id, "Agent despawned");
            self.bus.publish(&AgentNotice::Despawned { agent: id });
        }
    }

    fn publish(&mut self, notices: &[AgentNotice]) {
        for notice in notices {
            self.bus.publish(notice);
        }
    }

    /// Subscribes to death and despawn notices.
    pub fn subscribe(&mut self) -> Subscription {
        self.bus.subscribe()
    }

    /// Cancels a subscription.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Live agent ids in spawn order.
    #[must_use]
    pub fn ids(&self) -> &[AgentId] {
        &self.order
    }

    /// Agents in spawn order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }

    /// Number of agents, dead ones still lingering included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Number of agents that are not dead.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.agents.values().filter(|a| !a.is_dead()).count()
    }
}
