//! ID types for agents, targets, and scheduled tasks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for agent IDs.
static AGENT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an agent in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u64);

impl AgentId {
    /// Creates a new unique agent ID.
    #[must_use]
    pub fn new() -> Self {
        Self(AGENT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates an agent ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Null/invalid agent ID.
    pub const NULL: Self = Self(0);

    /// Checks if this is a valid (non-null) agent ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Opaque handle to a hostile target (usually the player) returned by
/// world overlap queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetHandle(u32);

impl TargetHandle {
    /// Creates a target handle from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The player target.
    pub const PLAYER: Self = Self(1);
}

/// Handle to a task scheduled on an agent.
///
/// Handles are only unique within the agent that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(u64);

impl TaskHandle {
    /// Creates a task handle from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}
