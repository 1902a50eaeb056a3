//! Synced values: server-owned cells mirrored to clients.
//!
//! A [`SyncedValue`] is keyed by `(entity uid, key)` and holds a
//! JSON-serialisable `T`. Every change that leaves the cell different from
//! before is pushed once, as the full value, through a [`SyncHook`]. Setting
//! a deep-equal value pushes nothing. Nested edits go through
//! [`SyncedValue::modify`] or the [`SyncedValue::get_mut`] guard.
//!
//! Once [`destroy`](SyncedValue::destroy)ed, every read and write fails with
//! [`SyncedValueError::Destroyed`].

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{trace, warn};

use crate::error::SyncedValueError;

/// Bounds every synced payload type satisfies.
pub trait SyncedData: Serialize + DeserializeOwned + PartialEq + Clone + Send + Sync + 'static {}

impl<T> SyncedData for T where T: Serialize + DeserializeOwned + PartialEq + Clone + Send + Sync + 'static {}

/// Outbound side of a synced value.
pub trait SyncHook: Send + Sync {
    /// Called once per effective change with the full new value.
    fn push(&self, entity_id: &str, key: &str, value: &Value);
}

/// A hook that drops every update. Useful for cells with no network.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHook;

impl SyncHook for NullHook {
    fn push(&self, entity_id: &str, key: &str, _value: &Value) {
        trace!(entity_id, key, "synced value change with no hook");
    }
}

pub(crate) struct SyncedInner<T> {
    entity_id: String,
    key: String,
    // `None` once destroyed.
    state: Mutex<Option<T>>,
    hook: Arc<dyn SyncHook>,
}

impl<T: SyncedData> SyncedInner<T> {
    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn destroyed(&self) -> SyncedValueError {
        SyncedValueError::Destroyed {
            entity_id: self.entity_id.clone(),
            key: self.key.clone(),
        }
    }

    fn to_json(&self, value: &T) -> Result<Value, SyncedValueError> {
        serde_json::to_value(value).map_err(|source| SyncedValueError::Json {
            entity_id: self.entity_id.clone(),
            key: self.key.clone(),
            source,
        })
    }

    fn from_json(&self, value: Value) -> Result<T, SyncedValueError> {
        serde_json::from_value(value).map_err(|source| SyncedValueError::Json {
            entity_id: self.entity_id.clone(),
            key: self.key.clone(),
            source,
        })
    }

    fn push(&self, value: &Value) {
        self.hook.push(&self.entity_id, &self.key, value);
    }

    fn set(&self, value: T) -> Result<bool, SyncedValueError> {
        let json = {
            let mut state = self.lock();
            let current = state.as_mut().ok_or_else(|| self.destroyed())?;
            if *current == value {
                return Ok(false);
            }
            let json = self.to_json(&value)?;
            *current = value;
            json
        };
        self.push(&json);
        Ok(true)
    }

    fn modify<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, SyncedValueError> {
        let (out, json) = {
            let mut state = self.lock();
            let current = state.as_mut().ok_or_else(|| self.destroyed())?;
            let before = current.clone();
            let out = f(current);
            let json = if *current == before {
                None
            } else {
                Some(self.to_json(current)?)
            };
            (out, json)
        };
        if let Some(json) = json {
            self.push(&json);
        }
        Ok(out)
    }

    fn sync(&self) -> Result<(), SyncedValueError> {
        let json = {
            let state = self.lock();
            let current = state.as_ref().ok_or_else(|| self.destroyed())?;
            self.to_json(current)?
        };
        self.push(&json);
        Ok(())
    }

    fn apply_remote(&self, value: T) -> Result<(), SyncedValueError> {
        let mut state = self.lock();
        let current = state.as_mut().ok_or_else(|| self.destroyed())?;
        *current = value;
        Ok(())
    }
}

/// Type-erased view of a cell, used by the game's synced-value table to
/// route inbound JSON updates.
pub(crate) trait ErasedCell: Send + Sync {
    fn apply_remote_json(&self, value: Value) -> Result<(), SyncedValueError>;
    fn set_json(&self, value: Value) -> Result<bool, SyncedValueError>;
    fn sync(&self) -> Result<(), SyncedValueError>;
    fn is_destroyed(&self) -> bool;
}

impl<T: SyncedData> ErasedCell for SyncedInner<T> {
    fn apply_remote_json(&self, value: Value) -> Result<(), SyncedValueError> {
        let value = self.from_json(value)?;
        self.apply_remote(value)
    }

    fn set_json(&self, value: Value) -> Result<bool, SyncedValueError> {
        let value = self.from_json(value)?;
        self.set(value)
    }

    fn sync(&self) -> Result<(), SyncedValueError> {
        SyncedInner::sync(self)
    }

    fn is_destroyed(&self) -> bool {
        self.lock().is_none()
    }
}

/// A replicated cell. Cloning yields another handle to the same cell.
pub struct SyncedValue<T> {
    inner: Arc<SyncedInner<T>>,
}

impl<T> Clone for SyncedValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: SyncedData> SyncedValue<T> {
    /// Create a live cell. Prefer [`Game::synced_value`](crate::Game::synced_value),
    /// which also routes inbound updates to it.
    pub fn new(
        entity_id: impl Into<String>,
        key: impl Into<String>,
        initial: T,
        hook: Arc<dyn SyncHook>,
    ) -> Self {
        Self {
            inner: Arc::new(SyncedInner {
                entity_id: entity_id.into(),
                key: key.into(),
                state: Mutex::new(Some(initial)),
                hook,
            }),
        }
    }

    /// UID of the owning entity.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.inner.entity_id
    }

    /// Key within the owning entity.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Clone the current value out.
    ///
    /// # Errors
    ///
    /// [`SyncedValueError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn get(&self) -> Result<T, SyncedValueError> {
        self.with(T::clone)
    }

    /// Borrow the current value without cloning.
    ///
    /// # Errors
    ///
    /// [`SyncedValueError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, SyncedValueError> {
        let state = self.inner.lock();
        let current = state.as_ref().ok_or_else(|| self.inner.destroyed())?;
        Ok(f(current))
    }

    /// Store `value` and push it if it differs from the current value.
    /// Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// [`SyncedValueError::Destroyed`] after [`destroy`](Self::destroy), or
    /// [`SyncedValueError::Json`] if `value` cannot be serialised.
    pub fn set(&self, value: T) -> Result<bool, SyncedValueError> {
        self.inner.set(value)
    }

    /// Push the current value unconditionally.
    ///
    /// # Errors
    ///
    /// [`SyncedValueError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn sync(&self) -> Result<(), SyncedValueError> {
        self.inner.sync()
    }

    /// Edit the value in place. Pushes once if the edit changed it.
    ///
    /// # Errors
    ///
    /// [`SyncedValueError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn modify<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, SyncedValueError> {
        self.inner.modify(f)
    }

    /// A guard over a working copy. On drop, the copy is committed with
    /// [`set`](Self::set) semantics.
    ///
    /// # Errors
    ///
    /// [`SyncedValueError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn get_mut(&self) -> Result<SyncedMut<'_, T>, SyncedValueError> {
        let working = self.get()?;
        Ok(SyncedMut {
            cell: self,
            working,
        })
    }

    /// Inbound setter: store without change detection or outbound push.
    ///
    /// # Errors
    ///
    /// [`SyncedValueError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn apply_remote(&self, value: T) -> Result<(), SyncedValueError> {
        self.inner.apply_remote(value)
    }

    /// Move the cell to its terminal state. Idempotent.
    pub fn destroy(&self) {
        self.inner.lock().take();
    }

    /// Returns `true` once [`destroy`](Self::destroy) has been called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().is_none()
    }

    pub(crate) fn erased(&self) -> std::sync::Weak<dyn ErasedCell> {
        let weak: std::sync::Weak<SyncedInner<T>> = Arc::downgrade(&self.inner);
        weak
    }
}

impl<T: SyncedData + std::fmt::Debug> std::fmt::Debug for SyncedValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncedValue")
            .field("entity_id", &self.inner.entity_id)
            .field("key", &self.inner.key)
            .field("value", &*self.inner.lock())
            .finish()
    }
}

/// Mutable guard returned by [`SyncedValue::get_mut`].
pub struct SyncedMut<'a, T: SyncedData> {
    cell: &'a SyncedValue<T>,
    working: T,
}

impl<T: SyncedData> Deref for SyncedMut<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.working
    }
}

impl<T: SyncedData> DerefMut for SyncedMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.working
    }
}

impl<T: SyncedData> Drop for SyncedMut<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.cell.set(self.working.clone()) {
            warn!(
                entity_id = self.cell.entity_id(),
                key = self.cell.key(),
                error = %e,
                "dropping edit to synced value"
            );
        }
    }
}
