//! Final touches applied to the target job after all mapping is done.

use crate::config::EngineConfig;
use crate::format::Container;
use profileforge_common::{Document, Map, Value};

/// Scratch section rule tables may write into to park values.
pub const SCRATCH_SECTION: &str = "_dummy";

/// Tidy the target job in place.
pub fn run(target: &mut Document, config: &EngineConfig) {
    for path in [SCRATCH_SECTION.to_string(), format!("Settings.{}", SCRATCH_SECTION)] {
        if target.remove(&path).is_some() {
            tracing::debug!("Removed scratch section {}", path);
        }
    }

    let Some(Value::Array(groups)) = target.get_mut("Settings.OutputGroups") else {
        return;
    };
    for (g, group) in groups.iter_mut().enumerate() {
        let Some(Value::Array(outputs)) = group.get_mut("Outputs") else {
            continue;
        };
        for (o, output) in outputs.iter_mut().enumerate() {
            let Value::Object(output) = output else {
                continue;
            };
            if config.derive_name_modifiers && !output.contains_key("NameModifier") {
                let modifier = derive_name_modifier(output);
                tracing::info!(
                    "Added missing NameModifier {} to OutputGroups[{}].Outputs[{}]",
                    modifier,
                    g,
                    o
                );
                output.insert("NameModifier".into(), Value::String(modifier));
            }
            if is_fragmented(output) && !output.contains_key("Extension") {
                output.insert(
                    "Extension".into(),
                    Value::String(config.segment_extension.clone()),
                );
            }
        }
    }
}

/// `_{W}x{H}_{bitrate}_mc`, dropping the parts the output does not carry.
pub fn derive_name_modifier(output: &Map<String, Value>) -> String {
    let Some(video) = output.get("VideoDescription").and_then(Value::as_object) else {
        return "_mc".into();
    };
    let (Some(width), Some(height)) = (video.get("Width"), video.get("Height")) else {
        return "_mc".into();
    };

    let resolution = format!("_{}x{}", width, height);
    match codec_bitrate(video) {
        Some(bitrate) => format!("{}_{}_mc", resolution, bitrate),
        None => format!("{}_mc", resolution),
    }
}

/// `Bitrate`, else `MaxBitrate`, of the first `*Settings` block under `CodecSettings`.
fn codec_bitrate(video: &Map<String, Value>) -> Option<&Value> {
    let codec = video.get("CodecSettings")?.as_object()?;
    let settings = codec
        .iter()
        .filter(|(key, _)| key.ends_with("Settings"))
        .find_map(|(_, value)| value.as_object())?;
    settings.get("Bitrate").or_else(|| settings.get("MaxBitrate"))
}

fn is_fragmented(output: &Map<String, Value>) -> bool {
    output
        .get("ContainerSettings")
        .and_then(|c| c.get("Container"))
        .and_then(Value::as_str)
        .and_then(Container::from_name)
        .is_some_and(|c| c.is_fragmented())
}
