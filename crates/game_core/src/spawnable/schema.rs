//! Per-type argument schemas.
//!
//! A spawnable type may declare the shape of its `args` so malformed level
//! data is rejected with the failing field path (`args.width`,
//! `args.points[2].x`) before the constructor runs.

use serde_json::Value;

use crate::error::ValidationError;

/// The expected JSON shape of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Bool,
    Number,
    String,
    /// An array whose elements all have the inner type.
    List(Box<FieldType>),
    /// A nested object.
    Object(ArgsSchema),
    /// May be missing or null.
    Optional(Box<FieldType>),
    /// Any JSON value, but it must be present.
    Any,
}

impl FieldType {
    #[must_use]
    pub fn list(inner: FieldType) -> Self {
        Self::List(Box::new(inner))
    }

    #[must_use]
    pub fn optional(inner: FieldType) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Check `value` against this type.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the innermost failing path.
    pub fn validate(&self, value: &Value, path: &str) -> Result<(), ValidationError> {
        let err = |expected: &str| ValidationError::new(path, format!("expected {expected}"));
        match self {
            Self::Bool => {
                value.as_bool().ok_or_else(|| err("bool"))?;
            }
            Self::Number => {
                value.as_number().ok_or_else(|| err("number"))?;
            }
            Self::String => {
                value.as_str().ok_or_else(|| err("string"))?;
            }
            Self::List(inner) => {
                let items = value.as_array().ok_or_else(|| err("array"))?;
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item, &format!("{path}[{i}]"))?;
                }
            }
            Self::Object(schema) => schema.validate(value, path)?,
            Self::Optional(inner) => {
                if !value.is_null() {
                    inner.validate(value, path)?;
                }
            }
            Self::Any => {}
        }
        Ok(())
    }
}

/// Named fields an `args` object must carry. Undeclared fields are allowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgsSchema {
    fields: Vec<(String, FieldType)>,
}

impl ArgsSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push((name.into(), ty));
        self
    }

    /// Check that `value` is an object matching the declared fields.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first failing path.
    pub fn validate(&self, value: &Value, path: &str) -> Result<(), ValidationError> {
        let object = value
            .as_object()
            .ok_or_else(|| ValidationError::new(path, "expected object"))?;
        for (name, ty) in &self.fields {
            let field_path = if path.is_empty() {
                name.clone()
            } else {
                format!("{path}.{name}")
            };
            match object.get(name) {
                Some(v) => ty.validate(v, &field_path)?,
                None if matches!(ty, FieldType::Optional(_)) => {}
                None => return Err(ValidationError::new(field_path, "missing field")),
            }
        }
        Ok(())
    }
}
