//! Read-side queries over live entities.

use std::str::FromStr;
use std::sync::Arc;

use game_math::Vec2;

use super::Game;
use crate::entity::{Entity, EntityId, downcast_entity};
use crate::error::GameError;
use crate::spawnable::SpawnedEntity;

/// Predicate for [`TagQuery::Custom`]: `(entity tags, query tags) -> matches`.
pub type TagPredicate = Arc<dyn Fn(&[String], &[String]) -> bool + Send + Sync>;

/// How [`Game::query_tags`] matches an entity's tags against the query.
#[derive(Clone)]
pub enum TagQuery {
    /// The entity carries every queried tag.
    All,
    /// The entity carries at least one queried tag.
    Any,
    Custom(TagPredicate),
}

impl TagQuery {
    /// A custom matcher.
    pub fn custom(f: impl Fn(&[String], &[String]) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    #[must_use]
    pub fn matches(&self, entity_tags: &[String], query: &[String]) -> bool {
        match self {
            Self::All => query.iter().all(|q| entity_tags.contains(q)),
            Self::Any => query.iter().any(|q| entity_tags.contains(q)),
            Self::Custom(f) => f(entity_tags, query),
        }
    }
}

impl FromStr for TagQuery {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "any" => Ok(Self::Any),
            other => Err(GameError::InvalidQuery(format!(
                "unknown tag query mode '{other}', expected 'all' or 'any'"
            ))),
        }
    }
}

impl std::fmt::Debug for TagQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Any => f.write_str("Any"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Game {
    /// The live spawnable with `uid`.
    #[must_use]
    pub fn lookup(&self, uid: &str) -> Option<SpawnedEntity> {
        self.inner.spawned.get(uid).map(|s| s.value().clone())
    }

    /// Every live spawnable, by entity id.
    #[must_use]
    pub fn spawned(&self) -> Vec<SpawnedEntity> {
        let mut all: Vec<_> = self
            .inner
            .spawned
            .iter()
            .map(|s| s.value().clone())
            .collect();
        all.sort_by_key(SpawnedEntity::id);
        all
    }

    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<Arc<dyn Entity>> {
        self.lock_entities()
            .get(id)
            .map(|e| Arc::clone(&e.entity))
    }

    /// Live entity ids in tick order.
    #[must_use]
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entity_snapshot().iter().map(|e| e.id).collect()
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.lock_entities().entries.len()
    }

    /// Non-preview spawnables containing `point`.
    #[must_use]
    pub fn query_position(&self, point: Vec2) -> Vec<SpawnedEntity> {
        self.spawned()
            .into_iter()
            .filter(|s| !s.is_preview())
            .filter(|s| match s.entity().spawnable() {
                Some(hooks) => hooks.contains_point(self, s.id(), point),
                None => self.physics().entity_contains_point(s.id(), point),
            })
            .collect()
    }

    /// Spawnables whose tags match `tags` under `mode`.
    #[must_use]
    pub fn query_tags<S: AsRef<str>>(&self, mode: &TagQuery, tags: &[S]) -> Vec<SpawnedEntity> {
        let query: Vec<String> = tags.iter().map(|t| t.as_ref().to_string()).collect();
        self.spawned()
            .into_iter()
            .filter(|s| mode.matches(s.tags(), &query))
            .collect()
    }

    /// [`query_tags`](Self::query_tags) with the mode given by name.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidQuery`] for a mode other than `all` or `any`.
    pub fn query_tags_by_name<S: AsRef<str>>(
        &self,
        mode: &str,
        tags: &[S],
    ) -> Result<Vec<SpawnedEntity>, GameError> {
        let mode: TagQuery = mode.parse()?;
        Ok(self.query_tags(&mode, tags))
    }

    /// The first live entity of type `T`, in tick order.
    #[must_use]
    pub fn query_type<T: Entity>(&self) -> Option<Arc<T>> {
        self.entity_snapshot()
            .iter()
            .find_map(|e| downcast_entity::<T>(&e.entity))
    }

    /// Every live entity of type `T`, in tick order.
    #[must_use]
    pub fn query_type_all<T: Entity>(&self) -> Vec<Arc<T>> {
        self.entity_snapshot()
            .iter()
            .filter_map(|e| downcast_entity::<T>(&e.entity))
            .collect()
    }
}
