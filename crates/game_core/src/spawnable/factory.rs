//! Registry of spawnable constructors, keyed by type name.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::SpawnableContext;
use super::schema::ArgsSchema;
use crate::entity::Entity;
use crate::error::{GameError, ValidationError};

/// Builds an entity from a validated context.
pub type SpawnConstructor =
    Arc<dyn Fn(SpawnableContext) -> Result<Arc<dyn Entity>, ValidationError> + Send + Sync>;

/// A registered spawnable type.
#[derive(Clone)]
pub struct SpawnableFn {
    name: String,
    schema: Option<ArgsSchema>,
    constructor: SpawnConstructor,
}

impl SpawnableFn {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn schema(&self) -> Option<&ArgsSchema> {
        self.schema.as_ref()
    }

    /// Check an `args` object against the schema, if this type has one.
    ///
    /// # Errors
    ///
    /// A [`ValidationError`] on a path under `args`.
    pub fn validate_args(&self, args: &Value) -> Result<(), ValidationError> {
        match &self.schema {
            Some(schema) => schema.validate(args, "args"),
            None => Ok(()),
        }
    }

    /// Check `args` against the schema, then run the constructor.
    ///
    /// # Errors
    ///
    /// A [`ValidationError`] from the schema or from the constructor.
    pub fn build(&self, ctx: SpawnableContext) -> Result<Arc<dyn Entity>, ValidationError> {
        self.validate_args(&ctx.definition.args)?;
        (self.constructor)(ctx)
    }
}

impl std::fmt::Debug for SpawnableFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnableFn")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct SpawnableRegistry {
    fns: HashMap<String, SpawnableFn>,
}

impl SpawnableRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `name`.
    ///
    /// # Errors
    ///
    /// [`GameError::DuplicateSpawnable`] if `name` is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        schema: Option<ArgsSchema>,
        constructor: SpawnConstructor,
    ) -> Result<(), GameError> {
        let name = name.into();
        if self.fns.contains_key(&name) {
            return Err(GameError::DuplicateSpawnable(name));
        }
        self.fns.insert(
            name.clone(),
            SpawnableFn {
                name,
                schema,
                constructor,
            },
        );
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SpawnableFn> {
        self.fns.get(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.fns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }
}
