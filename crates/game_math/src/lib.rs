//! # game_math
//!
//! 2D spatial types shared by the game crates. Re-exports [`glam`] for
//! linear algebra and defines the [`Transform2D`] every spawnable carries.

pub mod aabb;
pub mod transform;

// Re-export glam types for convenience.
pub use glam::{Vec2, Vec3};

pub use aabb::Aabb;
pub use transform::Transform2D;
