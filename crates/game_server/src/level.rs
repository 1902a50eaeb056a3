//! Level files: JSON lists of spawnable definitions.
//!
//! Either a bare array or an object with an `entities` array is accepted.
//! Definitions are not validated here; the game does that per entry when
//! they are spawned.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;

pub fn load(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading level {}", path.display()))?;
    parse(&text).with_context(|| format!("parsing level {}", path.display()))
}

pub fn parse(text: &str) -> Result<Vec<Value>> {
    match serde_json::from_str(text)? {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut root) => match root.remove("entities") {
            Some(Value::Array(entries)) => Ok(entries),
            Some(_) => bail!("'entities' must be an array"),
            None => bail!("level object has no 'entities'"),
        },
        _ => bail!("a level is an array of definitions or {{\"entities\": [...]}}"),
    }
}
