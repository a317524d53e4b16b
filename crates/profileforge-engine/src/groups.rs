//! Output group settings derived from the output format.

use crate::format::{GroupType, OutputFormat};
use crate::patch::SettingsPatch;
use profileforge_common::units::{as_integer, is_present, token};
use profileforge_common::{Map, Value};
use serde_json::json;

/// Placeholder destination, filled in when the job is submitted.
pub const DESTINATION_PLACEHOLDER: &str = "S3_OUTPUT_URL";

const DEFAULT_SEGMENT_LENGTH: i64 = 2;
const PROGRAM_DATE_TIME_PERIOD: i64 = 600;

/// Build `OutputGroupSettings` for `format`, relative to one output group.
pub fn resolve(format: OutputFormat, fields: &Map<String, Value>) -> SettingsPatch {
    let group = format.group_type();
    let mut patch = SettingsPatch::new("OutputGroupSettings");
    patch.set("Type", json!(group.name()));
    if present(fields, "output").is_some() {
        patch.consume("output", "Type");
    }

    let key = group.settings_key();
    let segment = segment_length(fields);
    let fragment = fragment_length(fields, segment);
    let at = |name: &str| format!("{key}.{name}");

    match group {
        GroupType::Cmaf => {
            patch.set(&at("WriteDashManifest"), json!("DISABLED"));
            map_segment(&mut patch, &at("SegmentLength"), segment);
            patch.set(&at("Destination"), json!(DESTINATION_PLACEHOLDER));
            map_fragment(&mut patch, &at("FragmentLength"), fragment);
            patch.set(&at("SegmentControl"), json!("SEGMENTED_FILES"));
            patch.set(&at("ManifestDurationFormat"), json!("FLOATING_POINT"));
            let hls = if format.writes_hls_manifest() {
                "ENABLED"
            } else {
                "DISABLED"
            };
            patch.set(&at("WriteHlsManifest"), json!(hls));
        }
        GroupType::Hls => {
            map_segment(&mut patch, &at("SegmentLength"), segment);
            patch.set(&at("Destination"), json!(DESTINATION_PLACEHOLDER));
            patch.set(&at("MinSegmentLength"), json!(0));
            patch.set(&at("SegmentControl"), json!("SEGMENTED_FILES"));
            patch.set(&at("ManifestDurationFormat"), json!("FLOATING_POINT"));
            let live = present(fields, "playlist_type")
                .and_then(token)
                .is_some_and(|t| t == "live");
            if live {
                patch.set(&at("ProgramDateTime"), json!("INCLUDE"));
                patch.set(&at("ProgramDateTimePeriod"), json!(PROGRAM_DATE_TIME_PERIOD));
                patch.consume("playlist_type", &at("ProgramDateTime"));
            } else {
                patch.set(&at("PlaylistType"), json!("VOD"));
                if present(fields, "playlist_type").is_some() {
                    patch.consume("playlist_type", &at("PlaylistType"));
                }
            }
        }
        GroupType::DashIso => {
            map_segment(&mut patch, &at("SegmentLength"), segment);
            patch.set(&at("Destination"), json!(DESTINATION_PLACEHOLDER));
            map_fragment(&mut patch, &at("FragmentLength"), fragment);
            patch.set(&at("SegmentControl"), json!("SEGMENTED_FILES"));
            patch.set(&at("MpdProfile"), json!("MAIN_PROFILE"));
        }
        GroupType::File => {
            patch.set(&at("Destination"), json!(DESTINATION_PLACEHOLDER));
        }
        GroupType::MsSmooth => {
            map_fragment(&mut patch, &at("FragmentLength"), fragment);
            patch.set(&at("Destination"), json!(DESTINATION_PLACEHOLDER));
        }
    }

    tracing::debug!("Output group settings for {}: {:?}", group.name(), patch.values);
    patch
}

/// Length read from a field, with whether the field supplied it.
#[derive(Debug, Clone, Copy)]
struct Length {
    value: i64,
    field: Option<&'static str>,
}

fn segment_length(fields: &Map<String, Value>) -> Length {
    match present(fields, "segment_duration") {
        Some(raw) => match as_integer(raw) {
            Some(value) => Length {
                value,
                field: Some("segment_duration"),
            },
            None => {
                tracing::warn!("Invalid segment_duration {}, using default", raw);
                Length {
                    value: DEFAULT_SEGMENT_LENGTH,
                    field: Some("segment_duration"),
                }
            }
        },
        None => Length {
            value: DEFAULT_SEGMENT_LENGTH,
            field: None,
        },
    }
}

fn fragment_length(fields: &Map<String, Value>, segment: Length) -> Length {
    match present(fields, "fragment_duration") {
        Some(raw) => match as_integer(raw) {
            Some(value) => Length {
                value,
                field: Some("fragment_duration"),
            },
            None => {
                tracing::warn!("Invalid fragment_duration {}, using segment length", raw);
                Length {
                    value: segment.value,
                    field: Some("fragment_duration"),
                }
            }
        },
        None => Length {
            value: segment.value,
            field: None,
        },
    }
}

fn map_segment(patch: &mut SettingsPatch, key: &str, length: Length) {
    patch.set(key, json!(length.value));
    if length.field.is_some() && !patch.consumes("segment_duration") {
        patch.consume("segment_duration", key);
    }
}

fn map_fragment(patch: &mut SettingsPatch, key: &str, length: Length) {
    patch.set(key, json!(length.value));
    if length.field.is_some() && !patch.consumes("fragment_duration") {
        patch.consume("fragment_duration", key);
    }
}

fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let value = fields.get(key);
    is_present(value).then_some(value).flatten()
}
