//! Rendition expansion.
//!
//! Every rendition becomes one output of the first output group, in
//! rendition order. An output is built in three passes:
//!
//! 1. a skeleton with container settings and only the video and audio
//!    blocks the rendition needs
//! 2. the rate-control and audio decision tables, fed with the rendition's
//!    own fields
//! 3. the ordinary rule walk over the rendition, writing into a scratch job
//!    whose single output is the one being built
//!
//! The scratch job keeps rule target paths (`Settings.OutputGroups[0].Outputs[0]...`)
//! valid for every rendition. Mapped targets outside that output are copied
//! into the real job, so a rendition can still set job-wide fields.

use crate::alternate::{AudioSelector, AudioSelectorMap};
use crate::audio::{self, AudioCodec};
use crate::context::ConversionContext;
use crate::engine::ConversionEngine;
use crate::format::{Container, OutputFormat, VideoCodec};
use crate::rate_control;
use crate::report::{ConversionReport, MappingOutcome, MappingRecord};
use crate::transpose::{self, RenditionSet};
use profileforge_common::path::{join, with_index};
use profileforge_common::units::{as_integer, is_present, is_yes, parse_bitrate, parse_size, token};
use profileforge_common::{Document, Map, Result, Value};
use serde_json::json;

/// Where rendition outputs are attached in the job.
pub const OUTPUTS_PATH: &str = "Settings.OutputGroups[0].Outputs";

/// The output being built inside the scratch job.
pub const SCRATCH_OUTPUT: &str = "Settings.OutputGroups[0].Outputs[0]";

/// Name of the HLS audio rendition group shared by audio-only outputs.
const HLS_AUDIO_GROUP: &str = "audio";

/// Which media a rendition carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub video: bool,
    pub audio: bool,
}

impl Capabilities {
    /// Classify a rendition. Explicit `video_only`/`audio_only` flags win over
    /// inference from the fields present.
    pub fn classify(rendition: &Map<String, Value>) -> Self {
        if flag(rendition, "video_only") {
            return Self {
                video: true,
                audio: false,
            };
        }
        if flag(rendition, "audio_only") {
            return Self {
                video: false,
                audio: true,
            };
        }

        let video = present(rendition, "size") || present(rendition, "bitrate");
        let audio = present(rendition, "audio_bitrate") || present(rendition, "audio_sample_rate");
        if !video && !audio {
            tracing::warn!("Rendition declares neither video nor audio, treating it as both");
            return Self {
                video: true,
                audio: true,
            };
        }
        Self { video, audio }
    }

    pub fn is_audio_only(&self) -> bool {
        self.audio && !self.video
    }
}

/// Expands a [`RenditionSet`] into outputs.
pub struct StreamExpander<'e> {
    engine: &'e ConversionEngine,
    format: OutputFormat,
    with_settings: bool,
}

impl<'e> StreamExpander<'e> {
    pub fn new(engine: &'e ConversionEngine, format: OutputFormat) -> Self {
        Self {
            engine,
            format,
            with_settings: true,
        }
    }

    /// Stop after the skeleton pass.
    pub fn skeletons_only(mut self) -> Self {
        self.with_settings = false;
        self
    }

    /// Build one output per rendition.
    ///
    /// Re-entry while an expansion is already running yields no outputs.
    pub fn expand(&self, set: &RenditionSet, ctx: &mut ConversionContext<'_>) -> Result<Vec<Value>> {
        if ctx.in_stream_expansion() {
            tracing::warn!("Rendition expansion re-entered, returning no outputs");
            return Ok(Vec::new());
        }
        let mut ctx = ctx.enter_stream_expansion();

        let capabilities: Vec<Capabilities> =
            set.renditions.iter().map(Capabilities::classify).collect();
        let audio_siblings = capabilities.iter().any(Capabilities::is_audio_only);

        let mut outputs = Vec::with_capacity(set.len());
        for (index, rendition) in set.renditions.iter().enumerate() {
            let layout = Layout {
                index,
                capabilities: capabilities[index],
                audio_siblings,
            };
            let output = self.build_output(set, rendition, layout, &mut ctx)?;
            outputs.push(output);
        }

        tracing::info!(
            "Expanded {} renditions into {} {} outputs",
            set.len(),
            outputs.len(),
            self.format.container().name()
        );
        Ok(outputs)
    }

    fn build_output(
        &self,
        set: &RenditionSet,
        rendition: &Map<String, Value>,
        layout: Layout,
        ctx: &mut ConversionContext<'_>,
    ) -> Result<Value> {
        let selector = alternate_selector(rendition, &ctx.audio_selectors, layout.capabilities);
        let skeleton = self.skeleton(rendition, layout, selector);

        if !self.with_settings {
            let mut output = skeleton;
            cleanup(&mut output, rendition);
            return Ok(Value::Object(output));
        }

        let rendition_doc = Document::from_map(rendition.clone());
        let mut scratch = Document::new();
        scratch.set(SCRATCH_OUTPUT, Value::Object(skeleton))?;

        let mut child = ctx.child(&rendition_doc, scratch);
        for rule in self.engine.rules().dummy_rules() {
            child.mark_processed(rule.source.path.clone());
        }
        child.mark_processed("stream");

        self.consume_layout(&mut child, rendition, layout, selector);
        if layout.capabilities.video {
            let codec = VideoCodec::from_fields(rendition);
            let patch = self.engine.yield_to_rules(rate_control::resolve_for(rendition, codec));
            child.apply_patch(SCRATCH_OUTPUT, &patch);
        }
        if layout.capabilities.audio {
            let patch = self.engine.yield_to_rules(audio::resolve(rendition));
            child.apply_patch(SCRATCH_OUTPUT, &patch);
        }
        self.engine.walk(&mut child);

        let report = carry_job_writes(child.report, &mut ctx.target);
        let mut scratch = child.target;
        let mut output = match scratch.remove(SCRATCH_OUTPUT) {
            Some(Value::Object(output)) => output,
            _ => {
                tracing::warn!("Rendition {} lost its output during the rule walk", layout.index);
                Map::new()
            }
        };
        cleanup(&mut output, rendition);

        let output_path = with_index(OUTPUTS_PATH, layout.index);
        ctx.report
            .absorb(report, &set.prefix(layout.index), SCRATCH_OUTPUT, &output_path);
        Ok(Value::Object(output))
    }

    fn skeleton(
        &self,
        rendition: &Map<String, Value>,
        layout: Layout,
        selector: Option<&AudioSelector>,
    ) -> Map<String, Value> {
        let container = self.format.container();
        let caps = layout.capabilities;
        let mut output = Map::new();

        output.insert(
            "NameModifier".into(),
            json!(name_modifier(rendition, caps, layout.index, selector)),
        );
        output.insert("ContainerSettings".into(), container.skeleton());

        if caps.video {
            let mut video = Map::new();
            if let Some((width, height)) = rendition.get("size").and_then(parse_size) {
                video.insert("Width".into(), json!(width));
                video.insert("Height".into(), json!(height));
            }
            let codec = VideoCodec::from_fields(rendition);
            video.insert("CodecSettings".into(), json!({"Codec": codec.codec_name()}));
            output.insert("VideoDescription".into(), Value::Object(video));
        }

        if caps.audio {
            let mut description = Map::new();
            if let Some(selector) = selector {
                description.insert("AudioSourceName".into(), json!(selector.name));
                if let Some(code) = &selector.language_code {
                    description.insert("LanguageCode".into(), json!(code));
                }
            }
            description.insert("CodecSettings".into(), json!({"Codec": "AAC"}));
            output.insert(
                "AudioDescriptions".into(),
                Value::Array(vec![Value::Object(description)]),
            );
        }

        if container == Container::M3u8 {
            if caps.is_audio_only() {
                output.insert(
                    "OutputSettings".into(),
                    json!({"HlsSettings": {"AudioGroupId": HLS_AUDIO_GROUP}}),
                );
            } else if caps.video && layout.audio_siblings {
                output.insert(
                    "OutputSettings".into(),
                    json!({"HlsSettings": {"AudioRenditionSets": HLS_AUDIO_GROUP}}),
                );
            }
        }

        output
    }

    /// Account for the fields the skeleton already used.
    fn consume_layout(
        &self,
        ctx: &mut ConversionContext<'_>,
        rendition: &Map<String, Value>,
        layout: Layout,
        selector: Option<&AudioSelector>,
    ) {
        let caps = layout.capabilities;

        for field in ["video_only", "audio_only"] {
            if let Some(value) = rendition.get(field).filter(|v| !v.is_null()) {
                ctx.mark_processed(field);
                ctx.record(MappingRecord::structural(field, value.clone(), "selects the output layout"));
            }
        }

        if caps.video {
            if let Some(size) = rendition.get("size") {
                if let Some((width, height)) = parse_size(size) {
                    ctx.mark_processed("size");
                    let video = join(SCRATCH_OUTPUT, "VideoDescription");
                    ctx.record(MappingRecord::mapped(
                        "size",
                        size.clone(),
                        join(&video, "Width"),
                        json!(width),
                    ));
                    ctx.record(MappingRecord::mapped(
                        "size",
                        size.clone(),
                        join(&video, "Height"),
                        json!(height),
                    ));
                }
            }

            if let Some(codec) = rendition.get("video_codec").filter(|v| !v.is_null()) {
                if !self.engine.rules().has_rules_for("video_codec") {
                    ctx.mark_processed("video_codec");
                    ctx.record(MappingRecord::mapped(
                        "video_codec",
                        codec.clone(),
                        join(SCRATCH_OUTPUT, "VideoDescription.CodecSettings.Codec"),
                        json!(VideoCodec::from_fields(rendition).codec_name()),
                    ));
                }
            }
        }

        if let Some(id) = rendition.get("use_alternate_id").filter(|v| !v.is_null()) {
            ctx.mark_processed("use_alternate_id");
            let record = match selector {
                Some(selector) => MappingRecord::mapped(
                    "use_alternate_id",
                    id.clone(),
                    join(SCRATCH_OUTPUT, "AudioDescriptions[0].AudioSourceName"),
                    json!(selector.name),
                ),
                None => MappingRecord::with_outcome(
                    "use_alternate_id",
                    id.clone(),
                    None,
                    MappingOutcome::SkippedNoMatch,
                )
                .because("no alternate audio source with that index"),
            };
            ctx.record(record);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    index: usize,
    capabilities: Capabilities,
    /// Whether any rendition of the set is audio-only.
    audio_siblings: bool,
}

/// The alternate audio source a rendition points at, if any.
fn alternate_selector<'m>(
    rendition: &Map<String, Value>,
    selectors: &'m AudioSelectorMap,
    caps: Capabilities,
) -> Option<&'m AudioSelector> {
    if !caps.audio {
        return None;
    }
    let raw = rendition.get("use_alternate_id").filter(|v| !v.is_null())?;
    let found = as_integer(raw)
        .and_then(|id| usize::try_from(id).ok())
        .and_then(|id| selectors.get(id));
    if found.is_none() {
        tracing::warn!("use_alternate_id {} does not name an alternate audio source", raw);
    }
    found
}

/// Deterministic name modifier for a rendition output.
///
/// Video outputs start with `WxH` and the bitrate in kbps (`_1280x720_2500K`),
/// audio-only outputs with `audio` and the audio bitrate. Audio-carrying
/// outputs then add the codec family, a channel label and the alternate
/// source's language.
pub fn name_modifier(
    rendition: &Map<String, Value>,
    caps: Capabilities,
    index: usize,
    selector: Option<&AudioSelector>,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if caps.video {
        if let Some((width, height)) = rendition.get("size").and_then(parse_size) {
            parts.push(format!("{}x{}", width, height));
        }
        if let Some(kbps) = kbps(rendition, "bitrate") {
            parts.push(format!("{}K", kbps));
        }
        if parts.is_empty() {
            parts.push(format!("video_{}", index + 1));
        }
    } else {
        parts.push("audio".into());
        match kbps(rendition, "audio_bitrate") {
            Some(kbps) => parts.push(format!("{}K", kbps)),
            None => parts.push((index + 1).to_string()),
        }
    }

    if caps.audio {
        let codec = rendition
            .get("audio_codec")
            .and_then(token)
            .and_then(|t| AudioCodec::from_token(&t));
        if let Some(codec) = codec {
            parts.push(codec.label().to_string());
        }
        if let Some(channels) = rendition.get("audio_channels_number").and_then(as_integer) {
            parts.push(channel_label(channels));
        }
        if let Some(label) = selector.and_then(AudioSelector::label) {
            parts.push(label);
        }
    }

    format!("_{}", parts.join("_"))
}

fn channel_label(channels: i64) -> String {
    match channels {
        1 => "mono".into(),
        2 => "stereo".into(),
        6 => "surround".into(),
        n => format!("{}ch", n),
    }
}

fn kbps(rendition: &Map<String, Value>, field: &str) -> Option<u64> {
    let value = rendition.get(field).filter(|v| is_present(Some(*v)))?;
    let bps = parse_bitrate(value);
    (bps > 0).then_some(bps / 1000)
}

/// Drop the media blocks an explicit `*_only` flag excludes.
fn cleanup(output: &mut Map<String, Value>, rendition: &Map<String, Value>) {
    if flag(rendition, "video_only") && output.shift_remove("AudioDescriptions").is_some() {
        tracing::debug!("Removed AudioDescriptions from video-only output");
    }
    if flag(rendition, "audio_only") && output.shift_remove("VideoDescription").is_some() {
        tracing::debug!("Removed VideoDescription from audio-only output");
    }
}

fn flag(rendition: &Map<String, Value>, field: &str) -> bool {
    rendition.get(field).is_some_and(is_yes)
}

fn present(rendition: &Map<String, Value>, field: &str) -> bool {
    is_present(rendition.get(field))
}

/// Whether `path` lies inside the scratch output.
fn within_scratch_output(path: &str) -> bool {
    path.strip_prefix(SCRATCH_OUTPUT)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.') || rest.starts_with('['))
}

/// Copy the rendition walk's mapped targets outside the scratch output into
/// `target`. A target that cannot be written is reported as a skip.
fn carry_job_writes(report: ConversionReport, target: &mut Document) -> ConversionReport {
    let mut carried = ConversionReport::new();
    for record in report.mapped {
        let outside = match (&record.target_path, record.outcome) {
            (Some(path), MappingOutcome::Mapped) => !within_scratch_output(path),
            _ => false,
        };
        if !outside {
            carried.record(record);
            continue;
        }

        let path = record.target_path.clone().unwrap_or_default();
        match target.set(&path, record.target_value.clone()) {
            Ok(()) => {
                tracing::debug!("Rendition field {} written to job at {}", record.source_path, path);
                carried.record(record);
            }
            Err(e) => {
                tracing::warn!("Could not write {} for {}: {}", path, record.source_path, e);
                carried.record(
                    MappingRecord::with_outcome(
                        record.source_path,
                        record.source_value,
                        Some(path),
                        MappingOutcome::SkippedError,
                    )
                    .because(e.to_string()),
                );
            }
        }
    }
    carried.unmapped = report.unmapped;
    carried
}

/// `generate_outputs_with_settings`: fully configured outputs for a `stream` value.
pub fn generate_outputs_with_settings(
    engine: &ConversionEngine,
    value: &Value,
    ctx: &mut ConversionContext<'_>,
) -> Result<Value> {
    expand_value(engine, value, ctx, true)
}

/// `generate_outputs_from_streams`: output skeletons for a `stream` value.
pub fn generate_outputs_from_streams(
    engine: &ConversionEngine,
    value: &Value,
    ctx: &mut ConversionContext<'_>,
) -> Result<Value> {
    expand_value(engine, value, ctx, false)
}

fn expand_value(
    engine: &ConversionEngine,
    value: &Value,
    ctx: &mut ConversionContext<'_>,
    with_settings: bool,
) -> Result<Value> {
    if ctx.in_stream_expansion() {
        tracing::warn!("Rendition expansion re-entered, returning no outputs");
        return Ok(Value::Array(Vec::new()));
    }
    let Some(set) = transpose::from_stream(value) else {
        return Ok(Value::Array(Vec::new()));
    };
    let format = OutputFormat::from_fields(ctx.source.as_map());
    let mut expander = StreamExpander::new(engine, format);
    if !with_settings {
        expander = expander.skeletons_only();
    }
    Ok(Value::Array(expander.expand(&set, ctx)?))
}
