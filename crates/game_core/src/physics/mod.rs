//! Physics adapter: the engine collaborator trait, collision filters, a
//! built-in simple world, and the entity → body registration table.

pub mod body;
pub mod engine;
pub mod filter;
pub mod simple;
pub mod world;

pub use body::{Body, BodyHandle};
pub use engine::PhysicsEngine;
pub use filter::{
    CATEGORY_DEFAULT, CATEGORY_NET_PLAYER, CATEGORY_PLAYER, CollisionFilter, MASK_ALL, can_collide,
};
pub use simple::SimpleWorld;
pub use world::{PhysicsHandle, PhysicsWorld};
