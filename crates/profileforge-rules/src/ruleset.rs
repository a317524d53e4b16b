//! The parsed rule document.

use crate::rule::Rule;
use crate::transformers::Transformers;
use profileforge_common::{Error, Result, Value};
use std::collections::{BTreeSet, HashMap};

/// Rules plus transformer tables, indexed by source path.
///
/// Dummy rules are kept apart from ordinary rules; ordinary rules are looked
/// up by their exact source path while the source tree is walked. Rules for
/// the same path keep their document order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    transformers: Transformers,
    dummies: Vec<usize>,
    by_path: HashMap<String, Vec<usize>>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>, transformers: Transformers) -> Self {
        let mut dummies = Vec::new();
        let mut by_path: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, rule) in rules.iter().enumerate() {
            if rule.is_dummy() {
                dummies.push(i);
            } else {
                by_path.entry(rule.source.path.clone()).or_default().push(i);
            }
        }

        Self {
            rules,
            transformers,
            dummies,
            by_path,
        }
    }

    /// Parse a rule document: `{"rules": [...], "transformers": {...}}`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::rule_document("rule document must be an object"))?;
        let rules = obj
            .get("rules")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::rule_document("missing \"rules\" array"))?
            .iter()
            .enumerate()
            .map(|(i, rule)| Rule::from_value(i, rule))
            .collect::<Result<Vec<_>>>()?;

        let transformers = match obj.get("transformers") {
            None | Some(Value::Null) => Transformers::default(),
            Some(tables) => Transformers::from_value(tables)?,
        };

        tracing::debug!(
            "Loaded {} rules and {} transformer tables",
            rules.len(),
            transformers.names().count()
        );
        Ok(Self::new(rules, transformers))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn transformers(&self) -> &Transformers {
        &self.transformers
    }

    pub fn dummy_rules(&self) -> impl Iterator<Item = &Rule> {
        self.dummies.iter().map(|&i| &self.rules[i])
    }

    /// Ordinary rules whose source path is exactly `path`.
    pub fn rules_for<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.by_path
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&i| &self.rules[i])
    }

    pub fn has_rules_for(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    /// Every transform name referenced by any target.
    pub fn transform_names(&self) -> BTreeSet<&str> {
        self.rules.iter().flat_map(Rule::transform_names).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RuleSet {
        RuleSet::from_value(&json!({
            "rules": [
                {"source": {"path": "notify", "type": "dummy"}},
                {"source": {"path": "bitrate"}, "target": {"path": "A", "transform": "bitrate_bps"}},
                {"source": {"path": "size"}, "target": {"path": "B"}},
                {"source": {"path": "bitrate"}, "target": {"path": "C", "transform": "rate_map"}}
            ],
            "transformers": {"rate_map": {"1000k": 1}}
        }))
        .unwrap()
    }

    #[test]
    fn test_partition_and_index() {
        let rules = sample();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules.dummy_rules().count(), 1);
        assert!(rules.has_rules_for("bitrate"));
        assert!(!rules.has_rules_for("notify"));

        let targets: Vec<_> = rules
            .rules_for("bitrate")
            .map(|r| r.targets[0].path.as_str())
            .collect();
        assert_eq!(targets, vec!["A", "C"]);
        assert_eq!(rules.rules_for("missing").count(), 0);
    }

    #[test]
    fn test_transform_names() {
        let binding = sample();
        let names: Vec<_> = binding.transform_names().into_iter().collect();
        assert_eq!(names, vec!["bitrate_bps", "rate_map"]);
    }

    #[test]
    fn test_document_errors() {
        assert!(RuleSet::from_value(&json!([])).is_err());
        assert!(RuleSet::from_value(&json!({"transformers": {}})).is_err());
        assert!(RuleSet::from_json("{not json").is_err());

        let err = RuleSet::from_value(&json!({
            "rules": [{"source": {"path": "a"}, "target": {"path": "b"}}, {"source": {}}]
        }))
        .unwrap_err();
        assert!(err.to_string().starts_with("Invalid rule #1"));
    }

    #[test]
    fn test_empty_rules_are_allowed() {
        let rules = RuleSet::from_json(r#"{"rules": []}"#).unwrap();
        assert!(rules.is_empty());
    }
}
