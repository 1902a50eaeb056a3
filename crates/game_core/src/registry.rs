//! Entity data registry: the entity → record association.
//!
//! Each entity has up to two opaque records: simulation data (set after
//! `init`) and render data (set after `init_render_context`, client only).
//! The registry never inspects or copies them. Reading a record that was
//! never set is a contract violation reported as
//! [`RegistryError::NotInitialized`], which names the missing record so a
//! server-side entity asking for render data is told exactly that.
//!
//! Records are erased explicitly when the entity is destroyed.

use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

use crate::entity::{EntityData, EntityId};
use crate::error::{RecordKind, RegistryError};

type Slot = Arc<Mutex<EntityData>>;

/// Opaque per-entity storage for simulation and render records.
#[derive(Debug, Default)]
pub struct EntityDataRegistry {
    data: DashMap<EntityId, Slot>,
    render_data: DashMap<EntityId, Slot>,
}

impl EntityDataRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the simulation record for `entity`, replacing any previous one.
    pub fn set_data(&self, entity: EntityId, data: EntityData) {
        self.data.insert(entity, Arc::new(Mutex::new(data)));
    }

    /// Store the render record for `entity`, replacing any previous one.
    pub fn set_render_data(&self, entity: EntityId, data: EntityData) {
        self.render_data.insert(entity, Arc::new(Mutex::new(data)));
    }

    /// Run `f` with mutable access to the simulation record.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotInitialized`] if no record was set,
    /// [`RegistryError::TypeMismatch`] if it is not a `T`.
    pub fn with_data<T: Any, R>(
        &self,
        entity: EntityId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, RegistryError> {
        Self::access(&self.data, RecordKind::Data, entity, f)
    }

    /// Run `f` with mutable access to the render record.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotInitialized`] if no record was set,
    /// [`RegistryError::TypeMismatch`] if it is not a `T`.
    pub fn with_render_data<T: Any, R>(
        &self,
        entity: EntityId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, RegistryError> {
        Self::access(&self.render_data, RecordKind::RenderData, entity, f)
    }

    /// Clone the simulation record out.
    ///
    /// # Errors
    ///
    /// Same as [`with_data`](Self::with_data).
    pub fn data<T: Any + Clone>(&self, entity: EntityId) -> Result<T, RegistryError> {
        self.with_data(entity, |d: &mut T| d.clone())
    }

    /// Clone the render record out.
    ///
    /// # Errors
    ///
    /// Same as [`with_render_data`](Self::with_render_data).
    pub fn render_data<T: Any + Clone>(&self, entity: EntityId) -> Result<T, RegistryError> {
        self.with_render_data(entity, |d: &mut T| d.clone())
    }

    /// Returns `true` if a simulation record is set.
    #[must_use]
    pub fn has_data(&self, entity: EntityId) -> bool {
        self.data.contains_key(&entity)
    }

    /// Returns `true` if a render record is set.
    #[must_use]
    pub fn has_render_data(&self, entity: EntityId) -> bool {
        self.render_data.contains_key(&entity)
    }

    /// Erase and return the simulation record.
    pub fn remove_data(&self, entity: EntityId) -> Option<EntityData> {
        self.data.remove(&entity).map(|(_, slot)| Self::unwrap_slot(slot))
    }

    /// Erase and return the render record.
    pub fn remove_render_data(&self, entity: EntityId) -> Option<EntityData> {
        self.render_data
            .remove(&entity)
            .map(|(_, slot)| Self::unwrap_slot(slot))
    }

    /// Number of entities with a simulation record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no simulation records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn access<T: Any, R>(
        map: &DashMap<EntityId, Slot>,
        record: RecordKind,
        entity: EntityId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, RegistryError> {
        // Clone the slot out so the shard lock is released before `f` runs;
        // `f` may well touch another entity's record.
        let slot = map
            .get(&entity)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RegistryError::NotInitialized { entity, record })?;
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let typed = (**guard)
            .downcast_mut::<T>()
            .ok_or(RegistryError::TypeMismatch {
                entity,
                record,
                expected: std::any::type_name::<T>(),
            })?;
        Ok(f(typed))
    }

    fn unwrap_slot(slot: Slot) -> EntityData {
        match Arc::try_unwrap(slot) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
            // A reader still holds the slot; hand back an empty record rather
            // than blocking on it.
            Err(_) => Box::new(()),
        }
    }
}
