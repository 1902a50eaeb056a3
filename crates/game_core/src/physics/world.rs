//! The physics registration table.
//!
//! [`PhysicsWorld`] wraps a [`PhysicsEngine`] and records which entity owns
//! each body. A body is owned by at most one entity; unregistering removes
//! it from both the owner's set and the engine. [`PhysicsHandle`] is the
//! shared, lock-guarded view handed to entities, so body add/remove can
//! never interleave with a step.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use game_math::{Aabb, Vec2};
use tracing::trace;

use super::body::{Body, BodyHandle};
use super::engine::PhysicsEngine;
use super::filter::can_collide;
use crate::entity::EntityId;
use crate::error::PhysicsError;

pub struct PhysicsWorld {
    engine: Box<dyn PhysicsEngine>,
    owned: HashMap<EntityId, HashSet<BodyHandle>>,
    owners: HashMap<BodyHandle, EntityId>,
}

impl PhysicsWorld {
    #[must_use]
    pub fn new(engine: Box<dyn PhysicsEngine>) -> Self {
        Self {
            engine,
            owned: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    /// Add `body` to the engine and record `entity` as its owner.
    pub fn register(&mut self, entity: EntityId, body: Body) -> BodyHandle {
        let handle = self.engine.add_body(body);
        self.owned.entry(entity).or_default().insert(handle);
        self.owners.insert(handle, entity);
        trace!(%entity, body = handle.0, "registered body");
        handle
    }

    /// Record `entity` as the owner of a body already in the engine.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::UnknownBody`] if the engine has no such body,
    /// [`PhysicsError::BodyAlreadyOwned`] if another entity owns it.
    pub fn attach(&mut self, entity: EntityId, body: BodyHandle) -> Result<(), PhysicsError> {
        if self.engine.body(body).is_none() {
            return Err(PhysicsError::UnknownBody(body));
        }
        match self.owners.get(&body) {
            Some(owner) if *owner == entity => Ok(()),
            Some(owner) => Err(PhysicsError::BodyAlreadyOwned {
                body,
                owner: *owner,
            }),
            None => {
                self.owned.entry(entity).or_default().insert(body);
                self.owners.insert(body, entity);
                Ok(())
            }
        }
    }

    /// Remove one of `entity`'s bodies from the table and the engine.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::NotOwner`] if `entity` does not own `body`.
    pub fn unregister(&mut self, entity: EntityId, body: BodyHandle) -> Result<Body, PhysicsError> {
        if self.owners.get(&body) != Some(&entity) {
            return Err(PhysicsError::NotOwner { body, entity });
        }
        self.owners.remove(&body);
        if let Some(set) = self.owned.get_mut(&entity) {
            set.remove(&body);
            if set.is_empty() {
                self.owned.remove(&entity);
            }
        }
        self.engine
            .remove_body(body)
            .ok_or(PhysicsError::UnknownBody(body))
    }

    /// Remove every body `entity` owns. Returns how many were removed.
    pub fn unregister_all(&mut self, entity: EntityId) -> usize {
        let Some(bodies) = self.owned.remove(&entity) else {
            return 0;
        };
        for body in &bodies {
            self.owners.remove(body);
            self.engine.remove_body(*body);
        }
        bodies.len()
    }

    /// Bodies owned by `entity`, in handle order.
    #[must_use]
    pub fn bodies_of(&self, entity: EntityId) -> Vec<BodyHandle> {
        let mut bodies: Vec<_> = self
            .owned
            .get(&entity)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        bodies.sort();
        bodies
    }

    #[must_use]
    pub fn owner_of(&self, body: BodyHandle) -> Option<EntityId> {
        self.owners.get(&body).copied()
    }

    /// Returns `true` if any of `entity`'s bodies contains `point`.
    #[must_use]
    pub fn entity_contains_point(&self, entity: EntityId, point: Vec2) -> bool {
        self.owned.get(&entity).is_some_and(|set| {
            set.iter()
                .filter_map(|h| self.engine.body(*h))
                .any(|b| b.bounds().contains_point(point))
        })
    }

    /// Returns `true` if the two bodies' filters allow a collision and their
    /// bounds overlap.
    #[must_use]
    pub fn collides(&self, a: BodyHandle, b: BodyHandle) -> bool {
        match (self.engine.body(a), self.engine.body(b)) {
            (Some(a), Some(b)) => {
                can_collide(&a.filter, &b.filter) && a.bounds().intersects(&b.bounds())
            }
            _ => false,
        }
    }

    pub fn step(&mut self, dt_ms: f64) {
        self.engine.step(dt_ms);
    }

    #[must_use]
    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.engine.body(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.engine.body_mut(handle)
    }

    #[must_use]
    pub fn query_region(&self, region: &Aabb) -> Vec<BodyHandle> {
        self.engine.query_region(region)
    }

    #[must_use]
    pub fn query_point(&self, point: Vec2) -> Vec<BodyHandle> {
        self.engine.query_point(point)
    }

    #[must_use]
    pub fn body_count(&self) -> usize {
        self.engine.body_count()
    }

    /// Remove every body and forget every owner.
    pub fn clear(&mut self) {
        self.engine.clear();
        self.owned.clear();
        self.owners.clear();
    }
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("bodies", &self.engine.body_count())
            .field("owners", &self.owned.len())
            .finish()
    }
}

/// Shared handle to the [`PhysicsWorld`].
#[derive(Debug, Clone)]
pub struct PhysicsHandle {
    world: Arc<Mutex<PhysicsWorld>>,
}

impl PhysicsHandle {
    #[must_use]
    pub fn new(engine: Box<dyn PhysicsEngine>) -> Self {
        Self {
            world: Arc::new(Mutex::new(PhysicsWorld::new(engine))),
        }
    }

    /// Lock the world. Do not hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, PhysicsWorld> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, entity: EntityId, body: Body) -> BodyHandle {
        self.lock().register(entity, body)
    }

    /// See [`PhysicsWorld::attach`].
    ///
    /// # Errors
    ///
    /// Same as [`PhysicsWorld::attach`].
    pub fn attach(&self, entity: EntityId, body: BodyHandle) -> Result<(), PhysicsError> {
        self.lock().attach(entity, body)
    }

    /// See [`PhysicsWorld::unregister`].
    ///
    /// # Errors
    ///
    /// Same as [`PhysicsWorld::unregister`].
    pub fn unregister(&self, entity: EntityId, body: BodyHandle) -> Result<Body, PhysicsError> {
        self.lock().unregister(entity, body)
    }

    pub fn unregister_all(&self, entity: EntityId) -> usize {
        self.lock().unregister_all(entity)
    }

    #[must_use]
    pub fn bodies_of(&self, entity: EntityId) -> Vec<BodyHandle> {
        self.lock().bodies_of(entity)
    }

    #[must_use]
    pub fn owner_of(&self, body: BodyHandle) -> Option<EntityId> {
        self.lock().owner_of(body)
    }

    #[must_use]
    pub fn entity_contains_point(&self, entity: EntityId, point: Vec2) -> bool {
        self.lock().entity_contains_point(entity, point)
    }

    /// Copy a body out.
    #[must_use]
    pub fn body(&self, handle: BodyHandle) -> Option<Body> {
        self.lock().body(handle).cloned()
    }

    /// Edit a body in place.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::UnknownBody`] if there is no such body.
    pub fn with_body<R>(
        &self,
        handle: BodyHandle,
        f: impl FnOnce(&mut Body) -> R,
    ) -> Result<R, PhysicsError> {
        let mut world = self.lock();
        let body = world
            .body_mut(handle)
            .ok_or(PhysicsError::UnknownBody(handle))?;
        Ok(f(body))
    }

    pub fn step(&self, dt_ms: f64) {
        self.lock().step(dt_ms);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    #[must_use]
    pub fn body_count(&self) -> usize {
        self.lock().body_count()
    }
}

#[cfg(test)]
mod tests {
    use super::super::filter::{CATEGORY_NET_PLAYER, CollisionFilter};
    use super::super::simple::SimpleWorld;
    use super::*;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(Box::new(SimpleWorld::new()))
    }

    #[test]
    fn test_register_and_unregister_all() {
        let mut world = world();
        let a = world.register(EntityId(1), Body::fixed(Vec2::ZERO, Vec2::ONE));
        let b = world.register(EntityId(1), Body::fixed(Vec2::ONE, Vec2::ONE));
        world.register(EntityId(2), Body::fixed(Vec2::ZERO, Vec2::ONE));

        assert_eq!(world.bodies_of(EntityId(1)), vec![a, b]);
        assert_eq!(world.owner_of(b), Some(EntityId(1)));

        assert_eq!(world.unregister_all(EntityId(1)), 2);
        assert!(world.bodies_of(EntityId(1)).is_empty());
        assert_eq!(world.owner_of(a), None);
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_body_has_single_owner() {
        let mut world = world();
        let a = world.register(EntityId(1), Body::fixed(Vec2::ZERO, Vec2::ONE));

        assert_eq!(world.attach(EntityId(1), a), Ok(()));
        assert_eq!(
            world.attach(EntityId(2), a),
            Err(PhysicsError::BodyAlreadyOwned {
                body: a,
                owner: EntityId(1),
            })
        );
        assert_eq!(
            world.unregister(EntityId(2), a),
            Err(PhysicsError::NotOwner {
                body: a,
                entity: EntityId(2),
            })
        );
        assert!(world.unregister(EntityId(1), a).is_ok());
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_attach_unknown_body() {
        let mut world = world();
        assert_eq!(
            world.attach(EntityId(1), BodyHandle(99)),
            Err(PhysicsError::UnknownBody(BodyHandle(99)))
        );
    }

    #[test]
    fn test_entity_contains_point() {
        let mut world = world();
        world.register(EntityId(5), Body::fixed(Vec2::ZERO, Vec2::new(4.0, 4.0)));
        assert!(world.entity_contains_point(EntityId(5), Vec2::new(1.0, -1.0)));
        assert!(!world.entity_contains_point(EntityId(5), Vec2::new(3.0, 0.0)));
        assert!(!world.entity_contains_point(EntityId(6), Vec2::ZERO));
    }

    #[test]
    fn test_collides_respects_filter() {
        let mut world = world();
        let mut platform_filter = CollisionFilter::default();
        platform_filter.set_mask_bits(CATEGORY_NET_PLAYER, false);
        let platform = world.register(
            EntityId(1),
            Body::fixed(Vec2::ZERO, Vec2::new(10.0, 1.0)).with_filter(platform_filter),
        );
        let remote = world.register(
            EntityId(2),
            Body::dynamic(Vec2::ZERO, Vec2::ONE)
                .with_filter(CollisionFilter::default().with_category(CATEGORY_NET_PLAYER)),
        );
        let local = world.register(EntityId(3), Body::dynamic(Vec2::ZERO, Vec2::ONE));

        assert!(!world.collides(platform, remote));
        assert!(world.collides(platform, local));
    }

    #[test]
    fn test_handle_with_body() {
        let handle = PhysicsHandle::new(Box::new(SimpleWorld::new()));
        let b = handle.register(EntityId(1), Body::dynamic(Vec2::ZERO, Vec2::ONE));
        handle
            .with_body(b, |body| body.velocity = Vec2::new(2.0, 0.0))
            .unwrap();
        handle.step(500.0);
        assert_eq!(handle.body(b).unwrap().position, Vec2::new(1.0, 0.0));

        handle.clear();
        assert!(handle.with_body(b, |_| ()).is_err());
    }
}
