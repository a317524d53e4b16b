//! Settings produced by the codec decision tables.

use profileforge_common::path::join;
use profileforge_common::{Document, Value};

/// What happened to one source field consumed by a decision table.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumedField {
    pub field: &'static str,
    /// Key (relative to the patch base) and value written for the field.
    /// `None` means the field is unsupported by the target and was dropped.
    pub mapped: Option<(String, Value)>,
}

/// A block of settings to merge at `base`, relative to one output.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsPatch {
    pub base: String,
    pub values: Document,
    pub consumed: Vec<ConsumedField>,
}

impl SettingsPatch {
    pub fn new<S: Into<String>>(base: S) -> Self {
        Self {
            base: base.into(),
            values: Document::new(),
            consumed: Vec::new(),
        }
    }

    /// Set a value that no single source field is responsible for.
    pub fn set(&mut self, key: &str, value: Value) {
        if let Err(e) = self.values.set(key, value) {
            tracing::warn!("Could not write patch key {}: {}", key, e);
        }
    }

    /// Write `value` at `key` (dot-separated within the patch) on behalf of `field`.
    pub fn map(&mut self, field: &'static str, key: &str, value: Value) {
        self.set(key, value.clone());
        self.consumed.push(ConsumedField {
            field,
            mapped: Some((key.to_string(), value)),
        });
    }

    /// Record `field` as consumed but unsupported.
    pub fn ignore(&mut self, field: &'static str) {
        tracing::debug!("Parameter {} has no equivalent, ignoring", field);
        self.consumed.push(ConsumedField {
            field,
            mapped: None,
        });
    }

    /// Record `field` as the reason for the value already written at `key`.
    pub fn consume(&mut self, field: &'static str, key: &str) {
        let mapped = self
            .values
            .get(key)
            .map(|value| (key.to_string(), value.clone()));
        self.consumed.push(ConsumedField { field, mapped });
    }

    pub fn is_empty(&self) -> bool {
        self.values.as_map().is_empty() && self.consumed.is_empty()
    }

    pub fn consumes(&self, field: &str) -> bool {
        self.consumed.iter().any(|c| c.field == field)
    }

    /// Absolute path of a patch key below `output_path`.
    pub fn target_path(&self, output_path: &str, key: &str) -> String {
        join(&join(output_path, &self.base), key)
    }

    /// Value written at `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn into_value(self) -> Value {
        self.values.into_value()
    }
}
