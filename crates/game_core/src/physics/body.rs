use game_math::{Aabb, Vec2};
use serde::{Deserialize, Serialize};

use super::filter::CollisionFilter;

/// Opaque handle to a body inside a [`PhysicsEngine`](super::PhysicsEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle(pub u64);

/// An axis-aligned rigid body.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    /// Centre of the box.
    pub position: Vec2,
    /// Full width and height.
    pub size: Vec2,
    /// Units per second.
    pub velocity: Vec2,
    /// Static bodies never move.
    pub is_static: bool,
    /// Sensors report overlaps but are never pushed.
    pub is_sensor: bool,
    pub filter: CollisionFilter,
}

impl Body {
    /// A dynamic body centred on `position`.
    #[must_use]
    pub fn dynamic(position: Vec2, size: Vec2) -> Self {
        Self {
            position,
            size,
            velocity: Vec2::ZERO,
            is_static: false,
            is_sensor: false,
            filter: CollisionFilter::default(),
        }
    }

    /// A static body centred on `position`.
    #[must_use]
    pub fn fixed(position: Vec2, size: Vec2) -> Self {
        Self {
            is_static: true,
            ..Self::dynamic(position, size)
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    #[must_use]
    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }

    /// World-space bounds.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_size(self.position, self.size)
    }
}
