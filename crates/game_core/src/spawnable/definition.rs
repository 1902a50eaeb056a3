//! The serialisable description of a spawnable entity.

use game_math::Transform2D;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::schema::{ArgsSchema, FieldType};
use crate::error::ValidationError;

/// `{ entity, uid?, transform, tags?, args }`, as found in level files and
/// full-state snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnableDefinition {
    /// Registered spawnable type name.
    pub entity: String,
    /// Stable id; generated at spawn time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub transform: Transform2D,
    /// `null` reads as no tags.
    #[serde(default, deserialize_with = "tags_or_null")]
    pub tags: Vec<String>,
    /// Type-specific arguments.
    pub args: Value,
}

fn tags_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn general_schema() -> ArgsSchema {
    let position = ArgsSchema::new()
        .field("x", FieldType::Number)
        .field("y", FieldType::Number);
    let transform = ArgsSchema::new()
        .field("position", FieldType::Object(position))
        .field("rotation", FieldType::Number)
        .field("zIndex", FieldType::Number);
    ArgsSchema::new()
        .field("entity", FieldType::String)
        .field("uid", FieldType::optional(FieldType::String))
        .field("transform", FieldType::Object(transform))
        .field("tags", FieldType::optional(FieldType::list(FieldType::String)))
        .field("args", FieldType::Any)
}

impl SpawnableDefinition {
    /// A definition with identity transform, no tags and no uid.
    #[must_use]
    pub fn new(entity: impl Into<String>, args: Value) -> Self {
        Self {
            entity: entity.into(),
            uid: None,
            transform: Transform2D::IDENTITY,
            tags: Vec::new(),
            args,
        }
    }

    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Transform2D) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Validate `value` against the general definition schema and parse it.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] whose `path` names the failing field,
    /// e.g. `transform.position.x` or `tags[2]`.
    pub fn parse(value: &Value) -> Result<Self, ValidationError> {
        general_schema().validate(value, "")?;
        if value["entity"].as_str().is_some_and(str::is_empty) {
            return Err(ValidationError::new("entity", "must not be empty"));
        }
        serde_json::from_value(value.clone()).map_err(|e| ValidationError::new("", e.to_string()))
    }

    /// Serialise back to the definition format.
    ///
    /// # Errors
    ///
    /// Propagates [`serde_json::Error`].
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
