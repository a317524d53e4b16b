//! Output-format and video-codec tables.
//!
//! The legacy `output` token decides both the container of every output and
//! the kind of output group they belong to; the `video_codec` token decides
//! which codec settings block rate-control values are written into.

use profileforge_common::units::token;
use profileforge_common::{Map, Value};
use serde_json::json;

/// Packaging format requested by the legacy `output` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Mp4,
    AdvancedHls,
    Fmp4Hls,
    AdvancedFmp4,
    Cmaf,
    AdvancedDash,
    SmoothStreaming,
}

/// Output container written into `ContainerSettings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mp4,
    M3u8,
    Cmfc,
    Mpd,
    Ism,
}

/// Output group type written into `OutputGroupSettings.Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupType {
    File,
    Hls,
    Cmaf,
    DashIso,
    MsSmooth,
}

impl OutputFormat {
    /// Map a legacy token, falling back to MP4.
    pub fn from_token(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Mp4;
        };
        match raw.trim().to_lowercase().as_str() {
            "mp4" | "" => Self::Mp4,
            "advanced_hls" => Self::AdvancedHls,
            "fmp4_hls" => Self::Fmp4Hls,
            "advanced_fmp4" => Self::AdvancedFmp4,
            "cmaf" => Self::Cmaf,
            "advanced_dash" => Self::AdvancedDash,
            "smooth" | "smooth_streaming" => Self::SmoothStreaming,
            other => {
                tracing::warn!("Unknown output format '{}', using MP4", other);
                Self::Mp4
            }
        }
    }

    /// Read the format from a profile's `output` field.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let raw = fields.get("output").and_then(token);
        Self::from_token(raw.as_deref())
    }

    pub fn container(&self) -> Container {
        match self {
            Self::Mp4 => Container::Mp4,
            Self::AdvancedHls => Container::M3u8,
            Self::Fmp4Hls | Self::AdvancedFmp4 | Self::Cmaf => Container::Cmfc,
            Self::AdvancedDash => Container::Mpd,
            Self::SmoothStreaming => Container::Ism,
        }
    }

    pub fn group_type(&self) -> GroupType {
        match self {
            Self::Mp4 => GroupType::File,
            Self::AdvancedHls => GroupType::Hls,
            Self::Fmp4Hls | Self::AdvancedFmp4 | Self::Cmaf => GroupType::Cmaf,
            Self::AdvancedDash => GroupType::DashIso,
            Self::SmoothStreaming => GroupType::MsSmooth,
        }
    }

    /// Whether a CMAF group should also write an HLS manifest.
    pub fn writes_hls_manifest(&self) -> bool {
        matches!(self, Self::Fmp4Hls | Self::AdvancedFmp4)
    }
}

impl Container {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mp4 => "MP4",
            Self::M3u8 => "M3U8",
            Self::Cmfc => "CMFC",
            Self::Mpd => "MPD",
            Self::Ism => "ISM",
        }
    }

    /// Key of the container-specific settings block, if the container has one.
    pub fn settings_key(&self) -> Option<&'static str> {
        match self {
            Self::Mp4 => Some("Mp4Settings"),
            Self::M3u8 => Some("M3u8Settings"),
            Self::Cmfc => Some("CmfcSettings"),
            Self::Mpd => Some("MpdSettings"),
            Self::Ism => None,
        }
    }

    /// Containers whose outputs are written as fragment files.
    pub fn is_fragmented(&self) -> bool {
        matches!(self, Self::Cmfc)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "MP4" => Some(Self::Mp4),
            "M3U8" => Some(Self::M3u8),
            "CMFC" => Some(Self::Cmfc),
            "MPD" => Some(Self::Mpd),
            "ISM" => Some(Self::Ism),
            _ => None,
        }
    }

    /// `ContainerSettings` block with an empty settings object.
    pub fn skeleton(&self) -> Value {
        let mut settings = Map::new();
        settings.insert("Container".into(), Value::String(self.name().into()));
        if let Some(key) = self.settings_key() {
            settings.insert(key.into(), json!({}));
        }
        Value::Object(settings)
    }
}

impl GroupType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::File => "FILE_GROUP_SETTINGS",
            Self::Hls => "HLS_GROUP_SETTINGS",
            Self::Cmaf => "CMAF_GROUP_SETTINGS",
            Self::DashIso => "DASH_ISO_GROUP_SETTINGS",
            Self::MsSmooth => "MS_SMOOTH_GROUP_SETTINGS",
        }
    }

    /// Key of the type-specific block inside `OutputGroupSettings`.
    pub fn settings_key(&self) -> &'static str {
        match self {
            Self::File => "FileGroupSettings",
            Self::Hls => "HlsGroupSettings",
            Self::Cmaf => "CmafGroupSettings",
            Self::DashIso => "DashIsoGroupSettings",
            Self::MsSmooth => "MsSmoothGroupSettings",
        }
    }
}

/// Video codec family, as far as rate control is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
    H265,
    Vp9,
    Mpeg2,
}

impl VideoCodec {
    /// Map a legacy `video_codec` token. Missing and unknown tokens mean H.264.
    pub fn from_token(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::H264;
        };
        match raw.trim().to_lowercase().as_str() {
            "libx264" | "h264" | "avc" | "mpeg4" | "" => Self::H264,
            "libx265" | "hevc" | "h265" => Self::H265,
            "libvpx-vp9" | "vp9" => Self::Vp9,
            "mpeg2video" | "mpeg2" => Self::Mpeg2,
            other => {
                tracing::warn!("Unknown video codec '{}', using H.264 settings", other);
                Self::H264
            }
        }
    }

    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let raw = fields.get("video_codec").and_then(token);
        Self::from_token(raw.as_deref())
    }

    /// Value written to `CodecSettings.Codec`.
    pub fn codec_name(&self) -> &'static str {
        match self {
            Self::H264 => "H_264",
            Self::H265 => "H_265",
            Self::Vp9 => "VP9",
            Self::Mpeg2 => "MPEG2",
        }
    }

    /// Key of the codec settings block under `CodecSettings`.
    pub fn settings_key(&self) -> &'static str {
        match self {
            Self::H264 => "H264Settings",
            Self::H265 => "H265Settings",
            Self::Vp9 => "Vp9Settings",
            Self::Mpeg2 => "Mpeg2Settings",
        }
    }
}
