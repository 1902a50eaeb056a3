//! 2D transform.
//!
//! [`Transform2D`] is the placement every spawnable carries: a world-space
//! position, a rotation in radians, and a z-index used by the scene graph to
//! order sprites. It serialises to the definition format
//! `{ "position": { "x", "y" }, "rotation", "zIndex" }`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Position, rotation and draw order of an entity in the 2D world.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transform2D {
    /// World-space position.
    #[serde(with = "vec2_xy")]
    pub position: Vec2,
    /// Rotation in radians.
    pub rotation: f32,
    /// Draw order; higher values render on top.
    pub z_index: f32,
}

impl Transform2D {
    /// The identity transform: origin, no rotation, z-index 0.
    pub const IDENTITY: Self = Self {
        position: Vec2::ZERO,
        rotation: 0.0,
        z_index: 0.0,
    };

    /// Create a transform at the given position.
    #[must_use]
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Create a transform at `(x, y)`.
    #[must_use]
    pub fn from_xy(x: f32, y: f32) -> Self {
        Self::from_position(Vec2::new(x, y))
    }

    /// Translate the transform by the given offset.
    #[must_use]
    pub fn translated(mut self, offset: Vec2) -> Self {
        self.position += offset;
        self
    }

    /// Rotate the transform by `radians`.
    #[must_use]
    pub fn rotated(mut self, radians: f32) -> Self {
        self.rotation += radians;
        self
    }

    /// Replace the z-index.
    #[must_use]
    pub fn with_z_index(mut self, z_index: f32) -> Self {
        self.z_index = z_index;
        self
    }

    /// Position extrapolated by `velocity` over `seconds`.
    ///
    /// Used by render frames to smooth motion between fixed physics ticks.
    #[must_use]
    pub fn interpolated(&self, velocity: Vec2, seconds: f32) -> Vec2 {
        self.position + velocity * seconds
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// (De)serialise a [`Vec2`] as `{ "x": .., "y": .. }` rather than glam's
/// default `[x, y]`.
pub mod vec2_xy {
    use glam::Vec2;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Xy {
        x: f32,
        y: f32,
    }

    /// Serialise `v` as an `{x, y}` object.
    pub fn serialize<S: Serializer>(v: &Vec2, serializer: S) -> Result<S::Ok, S::Error> {
        Xy { x: v.x, y: v.y }.serialize(serializer)
    }

    /// Deserialise an `{x, y}` object.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec2, D::Error> {
        let xy = Xy::deserialize(deserializer)?;
        Ok(Vec2::new(xy.x, xy.y))
    }
}
