//! # Rampart Agents
//!
//! Behavior core for the NPC combat agents of a 2D action platformer.
//!
//! One generic state machine drives every enemy variant. Variants differ only
//! by their [`AgentProfile`] (speeds, ranges, timings, clip pools) and two
//! small hooks (movement style and attack style).
//!
//! - Perception probes over an abstract [`WorldQuery`]
//! - Agent state machine with cancellable scheduled tasks
//! - Movement and combat controllers
//! - Cooldown and visibility gated audio narration
//! - Registry with death/despawn notices and an arena director
//!
//! Rendering, audio mixing, the physics engine and the camera are host
//! collaborators; the core only talks to them through traits.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod agent;
pub mod arena;
pub mod combat;
pub mod error;
pub mod events;
pub mod movement;
pub mod narrator;
pub mod perception;
pub mod physics;
pub mod profile;
pub mod registry;
pub mod state_machine;
pub mod tasks;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::agent::*;
    pub use crate::arena::*;
    pub use crate::combat::{AttackPhase, AttackStart, AttackWindow, DamageOutcome};
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::narrator::*;
    pub use crate::perception::{TargetSnapshot, TargetStatus};
    pub use crate::physics::*;
    pub use crate::profile::*;
    pub use crate::registry::*;
    pub use crate::state_machine::AgentContext;
    pub use crate::tasks::*;
}

pub use prelude::*;
