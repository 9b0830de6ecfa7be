//! Error types for the agent core.

use rampart_common::AgentId;
use thiserror::Error;

/// Problems found in an agent profile at initialization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A probe has no layers to query.
    #[error("{probe} probe has an empty layer mask")]
    MissingLayerMask {
        /// Which probe
        probe: &'static str,
    },
    /// A numeric field is out of range.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: &'static str,
    },
    /// Profile text could not be parsed.
    #[error("failed to parse profile: {0}")]
    Parse(String),
}

/// Errors raised while requesting narration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NarrationError {
    /// A cue was sent down the wrong channel.
    #[error("cue {cue} cannot be played as {channel}")]
    UnsupportedCue {
        /// Cue name
        cue: &'static str,
        /// Channel it was requested on
        channel: &'static str,
    },
}

/// Errors from agent and registry operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Agent not found
    #[error("agent not found: {0}")]
    NotFound(AgentId),
    /// Invalid profile
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Narration dispatch failed
    #[error("narration error: {0}")]
    Narration(#[from] NarrationError),
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
