use serde::{Deserialize, Serialize};

/// Engine behaviour switches, read from the `[engine]` section of the app config.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Treat transform names that resolve to nothing as skips instead of
    /// identity pass-through markers.
    #[serde(default)]
    pub strict_transforms: bool,

    /// Fields that may hold one value per rendition as parallel arrays.
    #[serde(default = "default_rendition_fields")]
    pub rendition_fields: Vec<String>,

    /// Extension given to fragmented outputs that have none.
    #[serde(default = "default_segment_extension")]
    pub segment_extension: String,

    /// Derive a name modifier for outputs that have none.
    #[serde(default = "default_true")]
    pub derive_name_modifiers: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_transforms: false,
            rendition_fields: default_rendition_fields(),
            segment_extension: default_segment_extension(),
            derive_name_modifiers: true,
        }
    }
}

fn default_rendition_fields() -> Vec<String> {
    [
        "size",
        "bitrate",
        "framerate",
        "keyframe",
        "maxrate",
        "minrate",
        "cbr",
        "cabr",
        "audio_bitrate",
        "audio_sample_rate",
        "audio_channels_number",
        "audio_codec",
        "video_codec",
        "profile",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_segment_extension() -> String {
    "m4s".to_string()
}

fn default_true() -> bool {
    true
}
