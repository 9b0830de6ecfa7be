//! Horizontal facing direction.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Which way an agent is looking along the x axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Facing {
    /// Looking toward negative x.
    Left,
    /// Looking toward positive x.
    #[default]
    Right,
}

impl Facing {
    /// Returns -1.0 for left and 1.0 for right.
    #[must_use]
    pub const fn sign(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }

    /// Returns the opposite facing.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Facing that points along the sign of `dx`.
    ///
    /// Returns `None` for zero (and NaN) so callers keep their current facing.
    #[must_use]
    pub fn from_sign(dx: f32) -> Option<Self> {
        if dx > 0.0 {
            Some(Self::Right)
        } else if dx < 0.0 {
            Some(Self::Left)
        } else {
            None
        }
    }

    /// Unit vector along this facing.
    #[must_use]
    pub const fn unit(self) -> Vec2 {
        Vec2::new(self.sign(), 0.0)
    }

    /// Maps a right-facing local offset into this facing's frame.
    #[must_use]
    pub fn orient(self, local: Vec2) -> Vec2 {
        Vec2::new(local.x * self.sign(), local.y)
    }
}
