//! # Rampart Common
//!
//! Common types shared by the Rampart crates:
//! - ID types (AgentId, TargetHandle, TaskHandle)
//! - Facing direction
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod facing;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::facing::*;
    pub use crate::ids::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use proptest::prelude::*;

    #[test]
    fn test_agent_id_generation() {
        let id1 = AgentId::new();
        let id2 = AgentId::new();
        assert_ne!(id1, id2);
        assert!(id1.is_valid());
        assert!(!AgentId::NULL.is_valid());
    }

    #[test]
    fn test_facing_sign_and_flip() {
        assert_eq!(Facing::Right.sign(), 1.0);
        assert_eq!(Facing::Left.sign(), -1.0);
        assert_eq!(Facing::Right.flipped(), Facing::Left);
        assert_eq!(Facing::Left.flipped().flipped(), Facing::Left);
    }

    #[test]
    fn test_facing_from_sign() {
        assert_eq!(Facing::from_sign(3.0), Some(Facing::Right));
        assert_eq!(Facing::from_sign(-0.5), Some(Facing::Left));
        assert_eq!(Facing::from_sign(0.0), None);
    }

    #[test]
    fn test_facing_orient() {
        let local = Vec2::new(0.4, -0.5);
        assert_eq!(Facing::Right.orient(local), local);
        assert_eq!(Facing::Left.orient(local), Vec2::new(-0.4, -0.5));
    }

    #[test]
    fn test_unsupported_variant_message() {
        let err = RampartError::unsupported("audio cue", "Yodel");
        assert_eq!(err.to_string(), "unsupported audio cue variant: Yodel");
    }

    proptest! {
        #[test]
        fn prop_orient_is_its_own_inverse(x in -100.0f32..100.0, y in -100.0f32..100.0) {
            let local = Vec2::new(x, y);
            let once = Facing::Left.orient(local);
            prop_assert_eq!(Facing::Left.orient(once), local);
        }
    }
}
