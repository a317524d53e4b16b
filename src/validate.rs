//! JSON Schema validation of produced jobs.

use anyhow::{Context, Result};
use serde_json::Value;

/// Compiled job schema.
pub struct JobValidator {
    validator: jsonschema::Validator,
}

impl JobValidator {
    pub fn new(schema: &Value) -> Result<Self> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| anyhow::anyhow!("failed to compile schema: {}", e))?;
        Ok(Self { validator })
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let schema = crate::loader::load_json(path)?;
        Self::new(&schema).with_context(|| format!("Invalid schema file: {:?}", path))
    }

    /// Every violation in `job`, one message each. Empty when the job is valid.
    pub fn errors(&self, job: &Value) -> Vec<String> {
        self.validator
            .iter_errors(job)
            .map(|e| format!("{}", e))
            .collect()
    }

    pub fn is_valid(&self, job: &Value) -> bool {
        self.validator.is_valid(job)
    }
}
