//! Audio-codec decision table.
//!
//! Chooses the codec settings of the first audio description from the legacy
//! `audio_codec` token and fills in bitrate and sample rate where the codec
//! supports them. Fields a codec cannot use are still consumed, so that they
//! are reported as handled rather than unmapped.

use crate::patch::SettingsPatch;
use profileforge_common::units::{as_integer, is_present, parse_bitrate, token};
use profileforge_common::{Map, Value};
use serde_json::json;

/// Path of the patched block, relative to one output.
pub const AUDIO_CODEC_SETTINGS: &str = "AudioDescriptions[0].CodecSettings";

const DEFAULT_AAC_BITRATE: u64 = 96_000;
const DEFAULT_SAMPLE_RATE: i64 = 48_000;

/// Audio codec family of a legacy token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Aac,
    Ac3,
    Eac3,
    Mp2,
    Vorbis,
}

impl AudioCodec {
    /// Map a legacy token. `None` for tokens outside the supported families.
    pub fn from_token(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "dolby_aac" | "dolby_heaac" | "dolby_heaacv2" | "libfaac" | "libfdk_aac" | "aac" => {
                Some(Self::Aac)
            }
            "ac3" | "dolby_ac3" => Some(Self::Ac3),
            "eac3" | "dolby_eac3" => Some(Self::Eac3),
            "mp2" => Some(Self::Mp2),
            "libvorbis" | "vorbis" => Some(Self::Vorbis),
            _ => None,
        }
    }

    /// Value written to `CodecSettings.Codec`.
    pub fn codec_name(&self) -> &'static str {
        match self {
            Self::Aac => "AAC",
            Self::Ac3 => "AC3",
            Self::Eac3 => "EAC3",
            Self::Mp2 => "MP2",
            Self::Vorbis => "VORBIS",
        }
    }

    pub fn settings_key(&self) -> &'static str {
        match self {
            Self::Aac => "AacSettings",
            Self::Ac3 => "Ac3Settings",
            Self::Eac3 => "Eac3Settings",
            Self::Mp2 => "Mp2Settings",
            Self::Vorbis => "VorbisSettings",
        }
    }

    /// Short lowercase label used in output name modifiers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Ac3 => "ac3",
            Self::Eac3 => "eac3",
            Self::Mp2 => "mp2",
            Self::Vorbis => "vorbis",
        }
    }
}

/// Map a channel count onto an AAC coding mode.
pub fn coding_mode(channels: i64) -> Option<&'static str> {
    match channels {
        1 => Some("CODING_MODE_1_0"),
        2 => Some("CODING_MODE_2_0"),
        6 => Some("CODING_MODE_5_1"),
        _ => None,
    }
}

/// Resolve the audio settings for `fields`.
pub fn resolve(fields: &Map<String, Value>) -> SettingsPatch {
    let mut patch = SettingsPatch::new(AUDIO_CODEC_SETTINGS);
    let codec_token = present(fields, "audio_codec").and_then(token);

    let codec = match codec_token.as_deref() {
        None => AudioCodec::Aac,
        Some(raw) => match AudioCodec::from_token(raw) {
            Some(codec) => codec,
            None => {
                tracing::warn!("Unsupported audio codec '{}', consuming its settings", raw);
                patch.ignore("audio_codec");
                for field in RELATED_FIELDS {
                    if present(fields, field).is_some() {
                        patch.ignore(field);
                    }
                }
                return patch;
            }
        },
    };

    patch.set("Codec", json!(codec.codec_name()));
    if codec_token.is_some() {
        patch.consume("audio_codec", "Codec");
    }

    let key = codec.settings_key();
    let bitrate = present(fields, "audio_bitrate").map(parse_bitrate).filter(|b| *b > 0);
    let sample_rate = present(fields, "audio_sample_rate").and_then(as_integer);

    match codec {
        AudioCodec::Aac => {
            match bitrate {
                Some(b) => patch.map("audio_bitrate", &format!("{key}.Bitrate"), json!(b)),
                None => patch.set(&format!("{key}.Bitrate"), json!(DEFAULT_AAC_BITRATE)),
            }
            match sample_rate {
                Some(r) => patch.map("audio_sample_rate", &format!("{key}.SampleRate"), json!(r)),
                None => patch.set(&format!("{key}.SampleRate"), json!(DEFAULT_SAMPLE_RATE)),
            }
            let mode = present(fields, "audio_channels_number")
                .and_then(as_integer)
                .and_then(coding_mode);
            match mode {
                Some(mode) => {
                    patch.map("audio_channels_number", &format!("{key}.CodingMode"), json!(mode))
                }
                None => patch.set(&format!("{key}.CodingMode"), json!("CODING_MODE_2_0")),
            }
        }
        AudioCodec::Ac3 | AudioCodec::Eac3 => {
            if let Some(b) = bitrate {
                patch.map("audio_bitrate", &format!("{key}.Bitrate"), json!(b));
            }
            if sample_rate.is_some() {
                patch.ignore("audio_sample_rate");
            }
        }
        AudioCodec::Mp2 => {
            if let Some(b) = bitrate {
                patch.map("audio_bitrate", &format!("{key}.Bitrate"), json!(b));
            }
            if let Some(r) = sample_rate {
                patch.map("audio_sample_rate", &format!("{key}.SampleRate"), json!(r));
            }
        }
        AudioCodec::Vorbis => {
            patch.set(&format!("{key}.Channels"), json!(2));
            match sample_rate {
                Some(r) => patch.map("audio_sample_rate", &format!("{key}.SampleRate"), json!(r)),
                None => patch.set(&format!("{key}.SampleRate"), json!(DEFAULT_SAMPLE_RATE)),
            }
            if bitrate.is_some() {
                patch.ignore("audio_bitrate");
            }
        }
    }

    // A bitrate that failed to parse is still spent.
    if present(fields, "audio_bitrate").is_some() && !patch.consumes("audio_bitrate") {
        patch.ignore("audio_bitrate");
    }
    for field in ["audio_maxrate", "audio_minrate"] {
        if present(fields, field).is_some() {
            patch.ignore(field);
        }
    }

    tracing::debug!("Audio settings: {:?}", patch.values);
    patch
}

const RELATED_FIELDS: [&str; 5] = [
    "audio_bitrate",
    "audio_sample_rate",
    "audio_channels_number",
    "audio_maxrate",
    "audio_minrate",
];

fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let value = fields.get(key);
    is_present(value).then_some(value).flatten()
}
