//! The conversion engine.
//!
//! [`ConversionEngine::convert`] turns one legacy profile into one job
//! descriptor:
//!
//! 1. start from the template, or an empty job skeleton
//! 2. consume dummy-rule paths and alternate audio sources
//! 3. expand renditions into outputs, or resolve the single output from
//!    top-level fields
//! 4. derive output group settings from the output format
//! 5. walk what is left of the source and apply the rules
//! 6. post-process
//!
//! Only malformed input is fatal. Anything that goes wrong for one target
//! is recorded as a skip and the conversion carries on.

use crate::alternate::AudioSelectorMap;
use crate::audio;
use crate::config::EngineConfig;
use crate::context::ConversionContext;
use crate::format::{OutputFormat, VideoCodec};
use crate::groups;
use crate::patch::SettingsPatch;
use crate::postprocess;
use crate::rate_control;
use crate::report::{ConversionReport, ConversionStatus, MappingOutcome, MappingRecord};
use crate::stream::{StreamExpander, OUTPUTS_PATH};
use crate::transform::{Applied, CustomTransform, TransformRegistry};
use crate::transpose::{self, RenditionSet};
use profileforge_common::document::kind_name;
use profileforge_common::path::{join, with_index};
use profileforge_common::units::{is_present, stringify};
use profileforge_common::{Document, Error, Map, Result, Value};
use profileforge_rules::{evaluate, Rendered, Rule, RuleSet, SourcePattern, Target};
use serde_json::json;

/// The output written in single-rendition mode.
pub const SINGLE_OUTPUT: &str = "Settings.OutputGroups[0].Outputs[0]";

/// The output group every output is attached to.
pub const FIRST_GROUP: &str = "Settings.OutputGroups[0]";

const INPUT_AUDIO_SELECTORS: &str = "Settings.Inputs[0].AudioSelectors";

/// Result of one conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub target: Value,
    pub report: ConversionReport,
}

impl Conversion {
    pub fn status(&self) -> ConversionStatus {
        self.report.status()
    }
}

/// Rule-driven profile converter.
///
/// The engine holds no per-call state; one engine can serve any number of
/// conversions, including from several threads at once.
#[derive(Debug, Clone)]
pub struct ConversionEngine {
    rules: RuleSet,
    registry: TransformRegistry,
    config: EngineConfig,
    unresolved: Vec<String>,
}

impl ConversionEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self::with_config(rules, EngineConfig::default())
    }

    pub fn with_config(rules: RuleSet, config: EngineConfig) -> Self {
        let registry = TransformRegistry::new(config.strict_transforms);
        let unresolved = registry.unresolved(&rules);
        if !unresolved.is_empty() {
            tracing::warn!(
                "Rules reference transforms that resolve to nothing: {}",
                unresolved.join(", ")
            );
        }
        Self {
            rules,
            registry,
            config,
            unresolved,
        }
    }

    /// Register an extra custom transform.
    pub fn register_transform<S: Into<String>>(&mut self, name: S, func: CustomTransform) {
        self.registry.register(name, func);
        self.unresolved = self.registry.unresolved(&self.rules);
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    /// Transform names used by the rules that resolve to nothing.
    pub fn unresolved_transforms(&self) -> &[String] {
        &self.unresolved
    }

    /// Convert `source` into a job, starting from `template` when given.
    pub fn convert(&self, source: &Value, template: Option<&Value>) -> Result<Conversion> {
        let source = match source {
            Value::Object(map) => Document::from_map(map.clone()),
            other => {
                return Err(Error::invalid_input(format!(
                    "source profile must be an object, got {}",
                    kind_name(other)
                )))
            }
        };
        let target = match template {
            None => Document::from_value(json!({"Settings": {"OutputGroups": [{}], "Inputs": [{}]}}))?,
            Some(Value::Object(map)) => Document::from_map(map.clone()),
            Some(other) => {
                return Err(Error::template(format!(
                    "template must be an object, got {}",
                    kind_name(other)
                )))
            }
        };

        let mut ctx = ConversionContext::new(&source, target);
        ctx.audio_selectors = AudioSelectorMap::from_value(source.get("alternate_source"));

        self.apply_dummy_rules(&mut ctx);
        self.map_alternate_sources(&mut ctx);

        let format = OutputFormat::from_fields(source.as_map());
        if self.stream_rule_applies(&source) {
            tracing::debug!("Renditions are expanded by the rule for stream");
        } else if let Some(set) = transpose::detect(source.as_map(), &self.config.rendition_fields) {
            self.expand_renditions(&set, format, &mut ctx);
        } else {
            self.resolve_single_output(format, &mut ctx);
        }
        self.resolve_group_settings(format, &mut ctx);

        self.walk(&mut ctx);
        self.apply_defaults(&mut ctx);

        let mut target = ctx.target;
        postprocess::run(&mut target, &self.config);

        tracing::info!("Conversion finished: {}", ctx.report.summary());
        Ok(Conversion {
            target: target.into_value(),
            report: ctx.report,
        })
    }

    fn apply_dummy_rules(&self, ctx: &mut ConversionContext<'_>) {
        for rule in self.rules.dummy_rules() {
            let path = rule.source.path.as_str();
            if !ctx.mark_processed(path) {
                continue;
            }
            if let Some(value) = ctx.source_value(path) {
                tracing::debug!("Dummy rule consumes {}", path);
                ctx.record(MappingRecord::with_outcome(
                    path,
                    value.clone(),
                    None,
                    MappingOutcome::Dummy,
                ));
            }
        }
    }

    /// Write input audio selectors unless a rule maps `alternate_source` itself.
    fn map_alternate_sources(&self, ctx: &mut ConversionContext<'_>) {
        const FIELD: &str = "alternate_source";
        let Some(value) = ctx.source_value(FIELD).filter(|v| !v.is_null()) else {
            return;
        };
        if self.rules.has_rules_for(FIELD) || ctx.is_processed(FIELD) {
            return;
        }

        let selectors = ctx.audio_selectors.to_value();
        if let Err(e) = ctx.target.set(INPUT_AUDIO_SELECTORS, selectors.clone()) {
            tracing::warn!("Could not write audio selectors: {}", e);
            return;
        }
        ctx.mark_processed(FIELD);
        ctx.record(MappingRecord::mapped(
            FIELD,
            value.clone(),
            INPUT_AUDIO_SELECTORS,
            selectors,
        ));
    }

    /// Whether a rule for `stream` takes the expansion over through its
    /// transform during the walk.
    fn stream_rule_applies(&self, source: &Document) -> bool {
        self.rules.has_rules_for("stream") && is_present(source.get("stream"))
    }

    fn expand_renditions(
        &self,
        set: &RenditionSet,
        format: OutputFormat,
        ctx: &mut ConversionContext<'_>,
    ) {
        let outputs = match StreamExpander::new(self, format).expand(set, ctx) {
            Ok(outputs) => outputs,
            Err(e) => {
                tracing::warn!("Rendition expansion failed, leaving renditions unmapped: {}", e);
                return;
            }
        };
        if let Err(e) = ctx.target.set(OUTPUTS_PATH, Value::Array(outputs)) {
            tracing::warn!("Could not attach rendition outputs: {}", e);
            return;
        }
        for path in &set.consumed {
            ctx.mark_processed(path.clone());
        }
    }

    /// Container, codec, rate control and audio for a one-output job.
    fn resolve_single_output(&self, format: OutputFormat, ctx: &mut ConversionContext<'_>) {
        let source = ctx.source;
        let fields = source.as_map();

        if !self.rules.has_rules_for("output") {
            let at = join(SINGLE_OUTPUT, "ContainerSettings");
            let container = format.container().skeleton();
            let written = if is_present(fields.get("output")) {
                ctx.target.set(&at, container).map(|_| true)
            } else {
                ctx.target.set_default(&at, container)
            };
            if let Err(e) = written {
                tracing::warn!("Could not write container settings: {}", e);
            }
        }

        if !self.rules.has_rules_for("video_codec") {
            let codec = VideoCodec::from_fields(fields);
            let at = join(SINGLE_OUTPUT, "VideoDescription.CodecSettings.Codec");
            let name = json!(codec.codec_name());
            match fields.get("video_codec").filter(|v| !v.is_null()) {
                Some(raw) => {
                    if let Err(e) = ctx.target.set(&at, name.clone()) {
                        tracing::warn!("Could not write video codec: {}", e);
                    } else {
                        ctx.mark_processed("video_codec");
                        ctx.record(MappingRecord::mapped("video_codec", raw.clone(), at, name));
                    }
                }
                None => {
                    if let Err(e) = ctx.target.set_default(&at, name) {
                        tracing::warn!("Could not write video codec: {}", e);
                    }
                }
            }
        }

        ctx.apply_patch(SINGLE_OUTPUT, &self.yield_to_rules(rate_control::resolve(fields)));
        ctx.apply_patch(SINGLE_OUTPUT, &self.yield_to_rules(audio::resolve(fields)));
    }

    fn resolve_group_settings(&self, format: OutputFormat, ctx: &mut ConversionContext<'_>) {
        let source = ctx.source;
        let has_settings = ctx
            .target
            .contains(&join(FIRST_GROUP, "OutputGroupSettings"));
        if !has_settings {
            let patch = self.yield_to_rules(groups::resolve(format, source.as_map()));
            ctx.apply_patch(FIRST_GROUP, &patch);
        }

        // The output token also chose the containers.
        if let Some(value) = source.get("output").filter(|v| !v.is_null()) {
            if !self.rules.has_rules_for("output") && ctx.mark_processed("output") {
                ctx.record(MappingRecord::structural(
                    "output",
                    value.clone(),
                    "selects the output container",
                ));
            }
        }
    }

    /// Drop consumed fields that rules map themselves. Their values stay in
    /// the patch; the rule walk overwrites them later.
    pub(crate) fn yield_to_rules(&self, mut patch: SettingsPatch) -> SettingsPatch {
        patch
            .consumed
            .retain(|consumed| !self.rules.has_rules_for(consumed.field));
        patch
    }

    /// Apply rules to every source path not yet processed, reporting leaves
    /// no rule covers.
    pub(crate) fn walk(&self, ctx: &mut ConversionContext<'_>) {
        let source = ctx.source;
        self.walk_map(ctx, source.as_map(), "");
    }

    fn walk_map<'s>(
        &self,
        ctx: &mut ConversionContext<'s>,
        map: &'s Map<String, Value>,
        prefix: &str,
    ) {
        for (key, value) in map {
            let path = join(prefix, key);
            // Keys with path syntax in them cannot be addressed by a rule.
            if key.contains(['.', '[', ']']) {
                if !value.is_null() {
                    tracing::debug!("Parameter key {:?} is not addressable, left unmapped", path);
                    ctx.report.unmapped(path, value.clone());
                }
                continue;
            }
            self.walk_value(ctx, &path, value);
        }
    }

    fn walk_value<'s>(&self, ctx: &mut ConversionContext<'s>, path: &str, value: &'s Value) {
        if ctx.is_processed(path) {
            tracing::trace!("Skipping processed parameter {}", path);
            return;
        }
        if self.rules.has_rules_for(path) {
            ctx.mark_processed(path);
            for rule in self.rules.rules_for(path) {
                self.apply_rule(ctx, rule, path, Some(value));
            }
            return;
        }

        match value {
            Value::Null => {}
            Value::Object(map) => self.walk_map(ctx, map, path),
            Value::Array(items) if items.is_empty() => {}
            Value::Array(items) if items.iter().all(Value::is_object) => {
                for (i, item) in items.iter().enumerate() {
                    self.walk_value(ctx, &with_index(path, i), item);
                }
            }
            leaf => {
                tracing::debug!("No rule for parameter {}={}", path, leaf);
                ctx.mark_processed(path);
                ctx.report.unmapped(path, leaf.clone());
            }
        }
    }

    /// Rules with a default for paths the profile does not carry.
    fn apply_defaults(&self, ctx: &mut ConversionContext<'_>) {
        for rule in self.rules.rules() {
            if rule.is_dummy() || rule.source.default.is_none() {
                continue;
            }
            let path = rule.source.path.as_str();
            if ctx.is_processed(path) || ctx.source_value(path).is_some() {
                continue;
            }
            tracing::debug!("Parameter {} absent, applying rule default", path);
            self.apply_rule(ctx, rule, path, None);
        }
        // Mark only after every default rule for a path has run.
        for rule in self.rules.rules() {
            if rule.source.default.is_some() && ctx.source_value(&rule.source.path).is_none() {
                ctx.mark_processed(rule.source.path.clone());
            }
        }
    }

    fn apply_rule(
        &self,
        ctx: &mut ConversionContext<'_>,
        rule: &Rule,
        path: &str,
        value: Option<&Value>,
    ) {
        let value = match value.filter(|v| !v.is_null()) {
            Some(value) => {
                if let Some(condition) = &rule.source.condition {
                    if !evaluate(condition, Some(value), ctx.source) {
                        tracing::debug!("Source condition false for {}", path);
                        for target in &rule.targets {
                            ctx.record(
                                skip(path, value, target, MappingOutcome::SkippedCondition)
                                    .because("source condition is false"),
                            );
                        }
                        return;
                    }
                }
                value.clone()
            }
            None => match &rule.source.default {
                Some(default) => default.clone(),
                None => {
                    let absent = value.cloned().unwrap_or(Value::Null);
                    for target in &rule.targets {
                        ctx.record(skip(path, &absent, target, MappingOutcome::SkippedAbsent));
                    }
                    return;
                }
            },
        };

        for target in &rule.targets {
            let record = self.apply_target(ctx, rule, path, &value, target);
            ctx.record(record);
        }
    }

    fn apply_target(
        &self,
        ctx: &mut ConversionContext<'_>,
        rule: &Rule,
        path: &str,
        value: &Value,
        target: &Target,
    ) -> MappingRecord {
        if let Some(condition) = &target.condition {
            if !evaluate(condition, Some(value), ctx.source) {
                tracing::debug!("Target condition false for {} -> {}", path, target.path);
                return skip(path, value, target, MappingOutcome::SkippedCondition)
                    .because("target condition is false");
            }
        }

        let pattern = rule.source.pattern.as_ref();
        let rendered = match target.render(pattern, value) {
            Some(Rendered::Value(rendered)) => rendered,
            Some(Rendered::NoMatch) => return regex_mismatch(path, value, target, pattern),
            None => {
                if let Some(pattern) = pattern {
                    if !pattern.regex().is_match(&stringify(value)) {
                        return regex_mismatch(path, value, target, Some(pattern));
                    }
                }
                match &target.transform {
                    None => value.clone(),
                    Some(name) => match self.registry.apply(self, name, value, ctx) {
                        Ok(Applied::Value(transformed)) => transformed,
                        Ok(Applied::NoMatch) => {
                            return skip(path, value, target, MappingOutcome::SkippedNoMatch)
                                .because(format!("no entry in transformer '{}'", name));
                        }
                        Ok(Applied::Unresolved) => {
                            return skip(
                                path,
                                value,
                                target,
                                MappingOutcome::SkippedUnresolvedTransform,
                            )
                            .because(format!("transform '{}' is not registered", name));
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Transform '{}' failed for {} -> {}: {}",
                                name,
                                path,
                                target.path,
                                e
                            );
                            return skip(path, value, target, MappingOutcome::SkippedError)
                                .because(e.to_string());
                        }
                    },
                }
            }
        };

        if let Err(e) = ctx.target.set(&target.path, rendered.clone()) {
            tracing::warn!("Could not write {} for {}: {}", target.path, path, e);
            return skip(path, value, target, MappingOutcome::SkippedError).because(e.to_string());
        }
        tracing::debug!("Mapped {} -> {}", path, target.path);
        MappingRecord::mapped(path, value.clone(), target.path.clone(), rendered)
    }
}

fn skip(path: &str, value: &Value, target: &Target, outcome: MappingOutcome) -> MappingRecord {
    MappingRecord::with_outcome(path, value.clone(), Some(target.path.clone()), outcome)
}

fn regex_mismatch(
    path: &str,
    value: &Value,
    target: &Target,
    pattern: Option<&SourcePattern>,
) -> MappingRecord {
    let pattern = pattern.map_or("", |p| p.as_str());
    tracing::warn!("Value {} of {} does not match /{}/", value, path, pattern);
    skip(path, value, target, MappingOutcome::SkippedRegexMismatch)
        .because(format!("value does not match /{}/", pattern))
}
