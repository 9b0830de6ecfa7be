//! World query interface consumed by the agent core.
//!
//! The physics engine itself is external. Agents only ask two kinds of
//! questions: "what does this ray hit first?" and "what overlaps this box?".
//! [`WorldQuery`] abstracts both, and [`StaticWorld`] answers them for a set
//! of fixed axis-aligned colliders (used by tests and the headless simulator).

use glam::Vec2;
use rampart_common::TargetHandle;
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec2,
    /// Maximum corner
    pub max: Vec2,
}

impl Aabb {
    /// Creates a new AABB from its corners.
    #[must_use]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Creates an AABB from center and half-extents.
    #[must_use]
    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Returns the center of the AABB.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Returns the half-extents of the AABB.
    #[must_use]
    pub fn half_extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    /// Returns the width of the AABB.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    /// Returns the height of the AABB.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Checks if this AABB overlaps with another.
    #[must_use]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Checks if a point lies inside (or on the edge of) the box.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Returns the AABB translated by a vector.
    #[must_use]
    pub fn translated(&self, offset: Vec2) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Distance along a ray to the first point of this box, if the ray
    /// reaches it within `max_distance`. Origins inside the box report 0.
    #[must_use]
    pub fn ray_distance(&self, origin: Vec2, direction: Vec2, max_distance: f32) -> Option<f32> {
        let mut t_min = 0.0_f32;
        let mut t_max = max_distance;

        for axis in 0..2 {
            let o = origin[axis];
            let d = direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if d.abs() < f32::EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let mut t1 = (lo - o) * inv;
            let mut t2 = (hi - o) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }

        Some(t_min)
    }
}

/// Bit set of collision layers used to filter queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Matches nothing.
    pub const NONE: Self = Self(0);
    /// Walkable ground.
    pub const GROUND: Self = Self(1);
    /// Walls.
    pub const WALL: Self = Self(1 << 1);
    /// Spikes, pits and other hazards agents must not walk into.
    pub const HAZARD: Self = Self(1 << 2);
    /// Hostile targets (the player).
    pub const TARGET: Self = Self(1 << 3);
    /// Other agents.
    pub const AGENT: Self = Self(1 << 4);

    /// Checks whether the two masks share any layer.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Checks whether the mask is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for LayerMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Semantic tag attached to a collider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitTag {
    /// Floor or platform
    Ground,
    /// Wall
    Wall,
    /// Hazard
    Hazard,
    /// The hostile target
    Target,
    /// Anything else
    Other,
}

/// A ray query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Start point
    pub origin: Vec2,
    /// Unit direction
    pub direction: Vec2,
    /// Maximum travel distance
    pub max_distance: f32,
    /// Layers the ray can hit
    pub mask: LayerMask,
}

impl Ray {
    /// Creates a new ray.
    #[must_use]
    pub fn new(origin: Vec2, direction: Vec2, max_distance: f32, mask: LayerMask) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            max_distance,
            mask,
        }
    }
}

/// First hit of a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Distance from the ray origin
    pub distance: f32,
    /// Hit point
    pub point: Vec2,
    /// Tag of the collider that was hit
    pub tag: HitTag,
    /// Target handle, when the collider belongs to a target
    pub handle: Option<TargetHandle>,
}

/// A collider returned by a box overlap query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapHit {
    /// Tag of the overlapping collider
    pub tag: HitTag,
    /// Target handle, when the collider belongs to a target
    pub handle: Option<TargetHandle>,
}

/// Physics queries provided by the host engine.
pub trait WorldQuery {
    /// Returns the closest hit along the ray, if any.
    fn raycast(&self, ray: &Ray) -> Option<RayHit>;

    /// Returns every collider on `mask` that overlaps `area`.
    fn overlap_box(&self, area: &Aabb, mask: LayerMask) -> Vec<OverlapHit>;
}

/// A fixed collider in a [`StaticWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    /// Bounds in world space
    pub bounds: Aabb,
    /// Layer the collider lives on
    pub layer: LayerMask,
    /// Semantic tag
    pub tag: HitTag,
    /// Target handle for target colliders
    pub handle: Option<TargetHandle>,
}

impl Collider {
    /// Solid ground.
    #[must_use]
    pub fn ground(bounds: Aabb) -> Self {
        Self {
            bounds,
            layer: LayerMask::GROUND,
            tag: HitTag::Ground,
            handle: None,
        }
    }

    /// A wall.
    #[must_use]
    pub fn wall(bounds: Aabb) -> Self {
        Self {
            bounds,
            layer: LayerMask::WALL,
            tag: HitTag::Wall,
            handle: None,
        }
    }

    /// A hazard.
    #[must_use]
    pub fn hazard(bounds: Aabb) -> Self {
        Self {
            bounds,
            layer: LayerMask::HAZARD,
            tag: HitTag::Hazard,
            handle: None,
        }
    }

    /// A hostile target body.
    #[must_use]
    pub fn target(bounds: Aabb, handle: TargetHandle) -> Self {
        Self {
            bounds,
            layer: LayerMask::TARGET,
            tag: HitTag::Target,
            handle: Some(handle),
        }
    }
}

/// World made of static axis-aligned colliders.
#[derive(Debug, Clone, Default)]
pub struct StaticWorld {
    colliders: Vec<Collider>,
}

impl StaticWorld {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collider, builder style.
    #[must_use]
    pub fn with(mut self, collider: Collider) -> Self {
        self.colliders.push(collider);
        self
    }

    /// Adds a collider.
    pub fn insert(&mut self, collider: Collider) {
        self.colliders.push(collider);
    }

    /// Moves the collider owned by `handle`. Returns false if none exists.
    pub fn move_target(&mut self, handle: TargetHandle, bounds: Aabb) -> bool {
        match self
            .colliders
            .iter_mut()
            .find(|c| c.handle == Some(handle))
        {
            Some(collider) => {
                collider.bounds = bounds;
                true
            },
            None => false,
        }
    }

    /// Removes every collider owned by `handle`.
    pub fn remove_target(&mut self, handle: TargetHandle) {
        self.colliders.retain(|c| c.handle != Some(handle));
    }

    /// All colliders.
    #[must_use]
    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }
}

impl WorldQuery for StaticWorld {
    fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        self.colliders
            .iter()
            .filter(|c| c.layer.intersects(ray.mask))
            .filter_map(|c| {
                c.bounds
                    .ray_distance(ray.origin, ray.direction, ray.max_distance)
                    .map(|distance| (distance, c))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(distance, c)| RayHit {
                distance,
                point: ray.origin + ray.direction * distance,
                tag: c.tag,
                handle: c.handle,
            })
    }

    fn overlap_box(&self, area: &Aabb, mask: LayerMask) -> Vec<OverlapHit> {
        self.colliders
            .iter()
            .filter(|c| c.layer.intersects(mask) && c.bounds.overlaps(area))
            .map(|c| OverlapHit {
                tag: c.tag,
                handle: c.handle,
            })
            .collect()
    }
}
