//! Agent events.
//!
//! Two flavors:
//! - [`CombatEvent`]s are collected per tick and handed back to the host,
//!   which applies damage to the player, spawns projectiles and drives
//!   animation.
//! - [`AgentNotice`]s (death, despawn) are broadcast on a [`NoticeBus`] to
//!   explicit subscribers such as the arena director.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use rampart_common::{AgentId, Facing, TargetHandle};

use crate::agent::AgentState;
use crate::profile::AgentVariant;

/// Something an agent did during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// State transition.
    StateChanged {
        /// Agent
        agent: AgentId,
        /// Previous state
        from: AgentState,
        /// New state
        to: AgentState,
    },
    /// Melee hitbox connected with the target.
    TargetHit {
        /// Attacker
        agent: AgentId,
        /// Target that was hit
        target: TargetHandle,
        /// Damage to apply
        damage: u32,
        /// Direction of the blow
        direction: Facing,
    },
    /// Ranged attack launched a projectile.
    ProjectileFired {
        /// Shooter
        agent: AgentId,
        /// Spawn point
        origin: Vec2,
        /// Initial velocity
        velocity: Vec2,
        /// Damage on impact
        damage: u32,
    },
}

impl CombatEvent {
    /// Agent that produced the event.
    #[must_use]
    pub fn agent(&self) -> AgentId {
        match self {
            Self::StateChanged { agent, .. }
            | Self::TargetHit { agent, .. }
            | Self::ProjectileFired { agent, .. } => *agent,
        }
    }
}

/// Lifecycle notice broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentNotice {
    /// Health reached zero.
    Died {
        /// Agent
        agent: AgentId,
        /// Its variant
        variant: AgentVariant,
        /// Where it died
        position: Vec2,
        /// Simulation time of death
        time: f64,
    },
    /// The agent was removed from the registry after its death linger.
    Despawned {
        /// Agent
        agent: AgentId,
    },
}

/// Identifies a subscription on a [`NoticeBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: Receiver<AgentNotice>,
}

impl Subscription {
    /// Subscription id, used to unsubscribe.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Drains all pending notices.
    pub fn drain(&self) -> Vec<AgentNotice> {
        self.receiver.try_iter().collect()
    }

    /// Number of pending notices.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

/// Broadcasts agent notices to each subscriber over its own bounded channel.
#[derive(Debug)]
pub struct NoticeBus {
    subscribers: Vec<(SubscriptionId, Sender<AgentNotice>)>,
    capacity: usize,
    next_id: u64,
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NoticeBus {
    /// Creates a bus whose subscriptions buffer up to `capacity` notices.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Vec::new(),
            capacity: capacity.max(1),
            next_id: 0,
        }
    }

    /// Adds a subscriber.
    pub fn subscribe(&mut self) -> Subscription {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let (sender, receiver) = bounded(self.capacity);
        self.subscribers.push((id, sender));
        debug!(subscription = id.0, "Notice subscriber added");
        Subscription { id, receiver }
    }

    /// Removes a subscriber. Returns false if it was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        before != self.subscribers.len()
    }

    /// Sends a notice to every subscriber.
    ///
    /// Subscribers whose receiver was dropped are removed. A full subscriber
    /// loses the notice.
    pub fn publish(&mut self, notice: &AgentNotice) {
        self.subscribers
            .retain(|(id, sender)| match sender.try_send(notice.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(subscription = id.0, "Notice subscriber full, dropping notice");
                    true
                },
                Err(TrySendError::Disconnected(_)) => false,
            });
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Per-subscriber capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn died(raw: u64) -> AgentNotice {
        AgentNotice::Died {
            agent: AgentId::from_raw(raw),
            variant: AgentVariant::GroundMelee,
            position: Vec2::ZERO,
            time: 1.0,
        }
    }

    #[test]
    fn test_every_subscriber_receives() {
        let mut bus = NoticeBus::new(8);
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.publish(&died(1));

        assert_eq!(a.drain(), vec![died(1)]);
        assert_eq!(b.drain(), vec![died(1)]);
        assert_eq!(a.pending_count(), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = NoticeBus::new(8);
        let sub = bus.subscribe();
        assert!(bus.unsubscribe(sub.id()));
        assert!(!bus.unsubscribe(sub.id()));
        bus.publish(&died(1));
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut bus = NoticeBus::new(8);
        let sub = bus.subscribe();
        let _keep = bus.subscribe();
        drop(sub);
        bus.publish(&died(1));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_full_subscriber_drops_notice() {
        let mut bus = NoticeBus::new(1);
        let sub = bus.subscribe();
        bus.publish(&died(1));
        bus.publish(&died(2));
        assert_eq!(sub.drain(), vec![died(1)]);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_event_agent() {
        let event = CombatEvent::StateChanged {
            agent: AgentId::from_raw(3),
            from: AgentState::NormalMoving,
            to: AgentState::Alert,
        };
        assert_eq!(event.agent(), AgentId::from_raw(3));
    }
}
