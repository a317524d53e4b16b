//! Path-addressed JSON document.
//!
//! [`Document`] wraps an ordered JSON object and exposes get/set by
//! dot-separated path (see [`crate::path`]). Writes create intermediate
//! objects and arrays as needed:
//!
//! - an indexed segment past the end of an array extends it with empty objects
//! - writing an object onto an existing object deep-merges the two
//! - any other write overwrites the existing value
//!
//! Reads never fail; a missing or malformed path reads as `None`.

use crate::error::{Error, Result};
use crate::path::{parse_path, Segment};
use serde::Serialize;
use serde_json::{Map, Value};

/// An ordered JSON object addressed by path.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document {
    root: Map<String, Value>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(Error::invalid_input(format!(
                "document root must be an object, got {}",
                kind_name(&other)
            ))),
        }
    }

    pub fn from_map(root: Map<String, Value>) -> Self {
        Self { root }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.root
    }

    /// Read the value at `path`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let segments = parse_path(path).ok()?;
        let (last, parents) = segments.split_last()?;

        let mut map = &self.root;
        for segment in parents {
            map = read_segment(map, segment)?.as_object()?;
        }
        read_segment(map, last)
    }

    /// Mutable access to the value at `path`, without creating anything.
    pub fn get_mut(&mut self, path: &str) -> Option<&mut Value> {
        let segments = parse_path(path).ok()?;
        let (last, parents) = segments.split_last()?;

        let mut map = &mut self.root;
        for segment in parents {
            map = read_segment_mut(map, segment)?.as_object_mut()?;
        }
        read_segment_mut(map, last)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Read the object at `path`, if there is one.
    pub fn get_nested(&self, path: &str) -> Option<&Map<String, Value>> {
        self.get(path)?.as_object()
    }

    /// Make sure an object exists at `path` and return it.
    ///
    /// Non-object values along the way are replaced.
    pub fn ensure_path(&mut self, path: &str) -> Result<&mut Map<String, Value>> {
        let segments = parse_path(path)?;
        let mut map = &mut self.root;
        for segment in &segments {
            map = object_slot(child_slot(map, segment));
        }
        Ok(map)
    }

    /// Write `value` at `path`, merging objects and extending arrays.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        let segments = parse_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(Error::invalid_path(path, "empty path"));
        };

        let mut map = &mut self.root;
        for segment in parents {
            map = object_slot(child_slot(map, segment));
        }

        match last.index {
            None => match map.get_mut(&last.key) {
                Some(existing) => merge_value(existing, value),
                None => {
                    map.insert(last.key.clone(), value);
                }
            },
            Some(_) => merge_value(child_slot(map, last), value),
        }
        Ok(())
    }

    /// Write `value` at `path` only when nothing is there yet.
    ///
    /// Returns whether the value was written.
    pub fn set_default(&mut self, path: &str, value: Value) -> Result<bool> {
        if self.contains(path) {
            return Ok(false);
        }
        self.set(path, value)?;
        Ok(true)
    }

    /// Remove and return the value at `path`.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let segments = parse_path(path).ok()?;
        let (last, parents) = segments.split_last()?;

        let mut map = &mut self.root;
        for segment in parents {
            map = read_segment_mut(map, segment)?.as_object_mut()?;
        }

        match last.index {
            None => map.shift_remove(&last.key),
            Some(index) => {
                let items = map.get_mut(&last.key)?.as_array_mut()?;
                (index < items.len()).then(|| items.remove(index))
            }
        }
    }
}

impl TryFrom<Value> for Document {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(root: Map<String, Value>) -> Self {
        Self::from_map(root)
    }
}

/// Merge `incoming` into `existing`.
///
/// Objects merge key by key, recursively. Anything else overwrites.
pub fn merge_value(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(current), Value::Object(incoming)) => merge_objects(current, incoming),
        (slot, incoming) => *slot = incoming,
    }
}

/// Merge every key of `incoming` into `target`.
pub fn merge_objects(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match target.get_mut(&key) {
            Some(existing) => merge_value(existing, value),
            None => {
                target.insert(key, value);
            }
        }
    }
}

/// Short name of a value's kind, for messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn read_segment<'a>(map: &'a Map<String, Value>, segment: &Segment) -> Option<&'a Value> {
    let value = map.get(&segment.key)?;
    match segment.index {
        Some(index) => value.as_array()?.get(index),
        None => Some(value),
    }
}

fn read_segment_mut<'a>(
    map: &'a mut Map<String, Value>,
    segment: &Segment,
) -> Option<&'a mut Value> {
    let value = map.get_mut(&segment.key)?;
    match segment.index {
        Some(index) => value.as_array_mut()?.get_mut(index),
        None => Some(value),
    }
}

/// Slot addressed by `segment`, creating the key and extending arrays as needed.
fn child_slot<'a>(map: &'a mut Map<String, Value>, segment: &Segment) -> &'a mut Value {
    let slot = map.entry(segment.key.clone()).or_insert(Value::Null);
    match segment.index {
        Some(index) => element_slot(slot, index),
        None => slot,
    }
}

fn element_slot(slot: &mut Value, index: usize) -> &mut Value {
    if !slot.is_array() {
        if !slot.is_null() {
            tracing::debug!("Replacing {} with an array", kind_name(slot));
        }
        *slot = Value::Array(Vec::new());
    }
    let Value::Array(items) = slot else {
        unreachable!("slot was just replaced with an array");
    };
    if items.len() <= index {
        items.resize_with(index + 1, || Value::Object(Map::new()));
    }
    &mut items[index]
}

fn object_slot(slot: &mut Value) -> &mut Map<String, Value> {
    if !slot.is_object() {
        if !slot.is_null() {
            tracing::debug!("Replacing {} with an object", kind_name(slot));
        }
        *slot = Value::Object(Map::new());
    }
    let Value::Object(map) = slot else {
        unreachable!("slot was just replaced with an object");
    };
    map
}
