//! Transform-name resolution.
//!
//! A target may name a transform to apply to the source value. Names resolve,
//! in order, to a registered custom function, a built-in [`Formula`], an
//! enumerated table from the rule document, or nothing at all. A table miss
//! is a skip; an unresolved name is identity unless the engine runs with
//! strict transforms.

use crate::alternate::AudioSelectorMap;
use crate::context::ConversionContext;
use crate::engine::ConversionEngine;
use crate::stream;
use profileforge_common::{Result, Value};
use profileforge_rules::{Formula, Lookup, RuleSet, Transformers};
use std::collections::HashMap;

/// A custom transform. It sees the engine and the whole conversion context.
pub type CustomTransform =
    for<'s> fn(&ConversionEngine, &Value, &mut ConversionContext<'s>) -> Result<Value>;

/// Builds input audio selectors from an `alternate_source` list.
pub const PROCESS_ALTERNATE_SOURCES: &str = "process_alternate_sources";
/// Expands renditions into fully configured outputs.
pub const GENERATE_OUTPUTS_WITH_SETTINGS: &str = "generate_outputs_with_settings";
/// Expands renditions into output skeletons only.
pub const GENERATE_OUTPUTS_FROM_STREAMS: &str = "generate_outputs_from_streams";

/// Transforms that must not run while renditions are being expanded.
const STREAM_EXPANSION: [&str; 2] = [GENERATE_OUTPUTS_WITH_SETTINGS, GENERATE_OUTPUTS_FROM_STREAMS];

/// What a transform name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Custom,
    Formula(Formula),
    Table,
    Unresolved,
}

/// Result of applying a transform.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Value(Value),
    /// The named table has no entry for the value.
    NoMatch,
    /// Strict mode only: the name resolves to nothing.
    Unresolved,
}

#[derive(Clone)]
pub struct TransformRegistry {
    custom: HashMap<String, CustomTransform>,
    strict: bool,
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.custom.keys().collect();
        names.sort();
        f.debug_struct("TransformRegistry")
            .field("custom", &names)
            .field("strict", &self.strict)
            .finish()
    }
}

impl TransformRegistry {
    /// A registry holding the built-in custom transforms.
    pub fn new(strict: bool) -> Self {
        let mut registry = Self::empty(strict);
        registry.register(PROCESS_ALTERNATE_SOURCES, process_alternate_sources);
        registry.register(GENERATE_OUTPUTS_WITH_SETTINGS, stream::generate_outputs_with_settings);
        registry.register(GENERATE_OUTPUTS_FROM_STREAMS, stream::generate_outputs_from_streams);
        registry
    }

    pub fn empty(strict: bool) -> Self {
        Self {
            custom: HashMap::new(),
            strict,
        }
    }

    pub fn register<S: Into<String>>(&mut self, name: S, func: CustomTransform) {
        let name = name.into();
        if self.custom.insert(name.clone(), func).is_some() {
            tracing::debug!("Replaced custom transform {}", name);
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn resolve(&self, name: &str, tables: &Transformers) -> Resolution {
        if self.custom.contains_key(name) {
            Resolution::Custom
        } else if let Some(formula) = Formula::by_name(name) {
            Resolution::Formula(formula)
        } else if tables.contains(name) {
            Resolution::Table
        } else {
            Resolution::Unresolved
        }
    }

    /// Names used by `rules` that resolve to nothing.
    pub fn unresolved(&self, rules: &RuleSet) -> Vec<String> {
        rules
            .transform_names()
            .into_iter()
            .filter(|name| self.resolve(name, rules.transformers()) == Resolution::Unresolved)
            .map(String::from)
            .collect()
    }

    /// Apply transform `name` to `value`.
    ///
    /// Errors come only from custom functions; the caller turns them into a
    /// skip for the one target being mapped.
    pub fn apply(
        &self,
        engine: &ConversionEngine,
        name: &str,
        value: &Value,
        ctx: &mut ConversionContext<'_>,
    ) -> Result<Applied> {
        match self.resolve(name, engine.rules().transformers()) {
            Resolution::Custom => {
                if STREAM_EXPANSION.contains(&name) && ctx.in_stream_expansion() {
                    tracing::warn!("Recursive call to {} while expanding renditions, skipping", name);
                    return Ok(Applied::Value(value.clone()));
                }
                let Some(func) = self.custom.get(name) else {
                    return Ok(Applied::Unresolved);
                };
                func(engine, value, ctx).map(Applied::Value)
            }
            Resolution::Formula(formula) => Ok(Applied::Value(formula.apply(value))),
            Resolution::Table => match engine.rules().transformers().lookup(name, value) {
                Lookup::Hit(mapped) => Ok(Applied::Value(mapped.clone())),
                Lookup::Miss | Lookup::NoTable => {
                    tracing::warn!("Value {} not found in transformer '{}'", value, name);
                    Ok(Applied::NoMatch)
                }
            },
            Resolution::Unresolved if self.strict => {
                tracing::warn!("Transform '{}' is not registered", name);
                Ok(Applied::Unresolved)
            }
            Resolution::Unresolved => {
                tracing::debug!("Transform '{}' is not registered, passing value through", name);
                Ok(Applied::Value(value.clone()))
            }
        }
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new(false)
    }
}

/// `process_alternate_sources`: selectors for the job input.
///
/// Also replaces the context's selector map so renditions resolve
/// `use_alternate_id` against the same list.
pub fn process_alternate_sources(
    _engine: &ConversionEngine,
    value: &Value,
    ctx: &mut ConversionContext<'_>,
) -> Result<Value> {
    let selectors = AudioSelectorMap::from_value(Some(value));
    let rendered = selectors.to_value();
    ctx.audio_selectors = selectors;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use profileforge_common::{Document, Error};
    use serde_json::json;

    fn engine() -> ConversionEngine {
        let rules = RuleSet::from_value(&json!({
            "rules": [
                {"source": {"path": "video_codec"}, "target": {"path": "A", "transform": "codec_map"}},
                {"source": {"path": "volume"}, "target": {"path": "B", "transform": "audio_volume_format"}},
                {"source": {"path": "x"}, "target": {"path": "C", "transform": "passthrough"}}
            ],
            "transformers": {"codec_map": {"libx264": "H_264"}}
        }))
        .unwrap();
        ConversionEngine::new(rules)
    }

    fn failing(_: &ConversionEngine, _: &Value, _: &mut ConversionContext<'_>) -> Result<Value> {
        Err(Error::transform("failing", "always fails"))
    }

    #[test]
    fn test_resolution_order() {
        let engine = engine();
        let registry = TransformRegistry::new(false);
        let tables = engine.rules().transformers();
        assert_eq!(registry.resolve(PROCESS_ALTERNATE_SOURCES, tables), Resolution::Custom);
        assert_eq!(
            registry.resolve("audio_volume_format", tables),
            Resolution::Formula(Formula::AudioVolume)
        );
        assert_eq!(registry.resolve("codec_map", tables), Resolution::Table);
        assert_eq!(registry.resolve("passthrough", tables), Resolution::Unresolved);
        assert_eq!(registry.unresolved(engine.rules()), vec!["passthrough".to_string()]);
    }

    #[test]
    fn test_table_miss_is_no_match() {
        let engine = engine();
        let source = Document::new();
        let mut ctx = ConversionContext::new(&source, Document::new());
        let registry = TransformRegistry::new(false);

        let hit = registry
            .apply(&engine, "codec_map", &json!("libx264"), &mut ctx)
            .unwrap();
        assert_eq!(hit, Applied::Value(json!("H_264")));

        let miss = registry
            .apply(&engine, "codec_map", &json!("theora"), &mut ctx)
            .unwrap();
        assert_eq!(miss, Applied::NoMatch);
    }

    #[test]
    fn test_unresolved_identity_unless_strict() {
        let engine = engine();
        let source = Document::new();
        let mut ctx = ConversionContext::new(&source, Document::new());

        let lenient = TransformRegistry::new(false);
        assert_eq!(
            lenient.apply(&engine, "passthrough", &json!(7), &mut ctx).unwrap(),
            Applied::Value(json!(7))
        );

        let strict = TransformRegistry::new(true);
        assert_eq!(
            strict.apply(&engine, "passthrough", &json!(7), &mut ctx).unwrap(),
            Applied::Unresolved
        );
    }

    #[test]
    fn test_formula_applies() {
        let engine = engine();
        let source = Document::new();
        let mut ctx = ConversionContext::new(&source, Document::new());
        let registry = TransformRegistry::new(false);
        assert_eq!(
            registry
                .apply(&engine, "audio_volume_format", &json!(100), &mut ctx)
                .unwrap(),
            Applied::Value(json!(-2.0))
        );
    }

    #[test]
    fn test_stream_expansion_guarded() {
        let engine = engine();
        let source = Document::new();
        let mut ctx = ConversionContext::new(&source, Document::new());
        let registry = TransformRegistry::new(false);
        let streams = json!([{"size": "640x360"}]);

        let mut guard = ctx.enter_stream_expansion();
        let result = registry
            .apply(&engine, GENERATE_OUTPUTS_WITH_SETTINGS, &streams, &mut guard)
            .unwrap();
        assert_eq!(result, Applied::Value(streams.clone()));
        assert!(guard.target.as_map().is_empty());
        assert!(guard.report.mapped.is_empty());
    }

    #[test]
    fn test_custom_errors_propagate() {
        let engine = engine();
        let source = Document::new();
        let mut ctx = ConversionContext::new(&source, Document::new());
        let mut registry = TransformRegistry::new(false);
        registry.register("failing", failing);
        assert!(registry.apply(&engine, "failing", &json!(1), &mut ctx).is_err());
    }

    #[test]
    fn test_process_alternate_sources_updates_context() {
        let engine = engine();
        let source = Document::new();
        let mut ctx = ConversionContext::new(&source, Document::new());
        let registry = TransformRegistry::new(false);
        let selectors = registry
            .apply(
                &engine,
                PROCESS_ALTERNATE_SOURCES,
                &json!([{"language": "fr"}]),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(
            selectors,
            Applied::Value(json!({
                "Audio Selector 1": {
                    "SelectorType": "LANGUAGE_CODE",
                    "LanguageCode": "FRA",
                    "DefaultSelection": "NOT_DEFAULT"
                }
            }))
        );
        assert_eq!(ctx.audio_selectors.len(), 1);
    }
}
