//! Rate-control decision table.
//!
//! Legacy profiles express bitrate management through the `cbr`, `cabr`,
//! `bitrate`, `maxrate` and `minrate` fields. The target descriptor wants a
//! `RateControlMode` plus `Bitrate`/`MaxBitrate` in the codec settings block:
//!
//! | cbr    | cabr   | bitrate | maxrate         | result                               |
//! |--------|--------|---------|-----------------|--------------------------------------|
//! | yes    | -      | present | ignored         | CBR, Bitrate                         |
//! | no     | yes    | ignored | required        | QVBR, MaxBitrate = maxrate           |
//! | no     | no     | present | present         | VBR, Bitrate, MaxBitrate = maxrate   |
//! | no     | absent | present | absent          | VBR, Bitrate, MaxBitrate = 2.5 x     |
//! | absent | -      | present | absent          | VBR, Bitrate, MaxBitrate = 2.5 x     |
//! | absent | -      | present | above bitrate   | VBR, Bitrate, MaxBitrate = maxrate   |
//! | absent | -      | present | equal bitrate   | CBR, Bitrate                         |
//!
//! `minrate` has no counterpart and is always consumed without output.

use crate::format::VideoCodec;
use crate::patch::SettingsPatch;
use profileforge_common::units::{is_present, parse_bitrate, token};
use profileforge_common::{Map, Value};
use serde_json::json;

/// Headroom applied when only a target bitrate is known.
pub const IMPLIED_MAX_FACTOR: f64 = 2.5;

/// Bitrate management strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControlMode {
    Cbr,
    Vbr,
    Qvbr,
}

impl RateControlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cbr => "CBR",
            Self::Vbr => "VBR",
            Self::Qvbr => "QVBR",
        }
    }
}

/// Resolve rate control for `fields`, picking the settings block from `video_codec`.
pub fn resolve(fields: &Map<String, Value>) -> SettingsPatch {
    resolve_for(fields, VideoCodec::from_fields(fields))
}

/// Resolve rate control into the settings block of `codec`.
pub fn resolve_for(fields: &Map<String, Value>, codec: VideoCodec) -> SettingsPatch {
    let mut table = Table {
        patch: SettingsPatch::new(format!(
            "VideoDescription.CodecSettings.{}",
            codec.settings_key()
        )),
        bitrate: present(fields, "bitrate").map(parse_bitrate),
        maxrate: present(fields, "maxrate").map(parse_bitrate),
    };

    let cbr = present(fields, "cbr").and_then(token);
    let cabr = present(fields, "cabr").and_then(token);

    match cbr.as_deref() {
        Some("yes") => table.constant(),
        Some("no") => match cabr.as_deref() {
            Some("yes") => table.quality_defined(),
            Some("no") => table.explicit_variable(),
            other => {
                if let Some(value) = other {
                    tracing::warn!("Unrecognised cabr value '{}', treating as absent", value);
                    table.patch.ignore("cabr");
                }
                table.variable_without_cabr();
            }
        },
        other => {
            if let Some(value) = other {
                tracing::warn!("Unrecognised cbr value '{}', treating as absent", value);
                table.patch.ignore("cbr");
            }
            table.implied();
        }
    }

    // Once a mode is decided the remaining rate fields are spent.
    if table.patch.get("RateControlMode").is_some() {
        for field in ["cbr", "cabr", "bitrate", "maxrate"] {
            if present(fields, field).is_some() && !table.patch.consumes(field) {
                table.patch.ignore(field);
            }
        }
    }

    if present(fields, "minrate").is_some() {
        table.patch.ignore("minrate");
    }

    tracing::debug!(
        "Rate control for {}: {:?}",
        table.patch.base,
        table.patch.values
    );
    table.patch
}

fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let value = fields.get(key);
    is_present(value).then_some(value).flatten()
}

fn implied_max(bitrate: u64) -> u64 {
    (bitrate as f64 * IMPLIED_MAX_FACTOR).round() as u64
}

struct Table {
    patch: SettingsPatch,
    bitrate: Option<u64>,
    maxrate: Option<u64>,
}

impl Table {
    fn mode(&mut self, mode: RateControlMode) {
        self.patch.set("RateControlMode", json!(mode.as_str()));
    }

    fn map_bitrate(&mut self) {
        if let Some(bitrate) = self.bitrate {
            self.patch.map("bitrate", "Bitrate", json!(bitrate));
        }
    }

    fn map_maxrate(&mut self) {
        if let Some(maxrate) = self.maxrate {
            self.patch.map("maxrate", "MaxBitrate", json!(maxrate));
        }
    }

    /// cbr = yes
    fn constant(&mut self) {
        self.mode(RateControlMode::Cbr);
        self.patch.consume("cbr", "RateControlMode");
        self.map_bitrate();
        if self.maxrate.is_some() {
            self.patch.ignore("maxrate");
        }
    }

    /// cbr = no, cabr = yes
    fn quality_defined(&mut self) {
        self.mode(RateControlMode::Qvbr);
        self.patch.consume("cbr", "RateControlMode");
        self.patch.consume("cabr", "RateControlMode");
        if self.maxrate.is_some() {
            self.map_maxrate();
        } else {
            tracing::warn!("QVBR requested (cabr=yes) but no maxrate given");
        }
        if self.bitrate.is_some() {
            self.patch.ignore("bitrate");
        }
    }

    /// cbr = no, cabr = no
    fn explicit_variable(&mut self) {
        self.mode(RateControlMode::Vbr);
        self.patch.consume("cbr", "RateControlMode");
        self.patch.consume("cabr", "RateControlMode");
        self.map_bitrate();
        self.map_maxrate();
    }

    /// cbr = no, cabr absent
    fn variable_without_cabr(&mut self) {
        let Some(bitrate) = self.bitrate else {
            self.patch.consume("cbr", "RateControlMode");
            return;
        };
        self.mode(RateControlMode::Vbr);
        self.patch.consume("cbr", "RateControlMode");
        self.map_bitrate();
        self.patch.set("MaxBitrate", json!(implied_max(bitrate)));
    }

    /// cbr absent: infer the mode from bitrate and maxrate.
    fn implied(&mut self) {
        let Some(bitrate) = self.bitrate else {
            return;
        };
        match self.maxrate {
            None => {
                self.mode(RateControlMode::Vbr);
                self.map_bitrate();
                self.patch.set("MaxBitrate", json!(implied_max(bitrate)));
            }
            Some(maxrate) if maxrate > bitrate => {
                self.mode(RateControlMode::Vbr);
                self.map_bitrate();
                self.map_maxrate();
            }
            Some(maxrate) if maxrate == bitrate => {
                self.mode(RateControlMode::Cbr);
                self.map_bitrate();
                self.patch.ignore("maxrate");
            }
            Some(maxrate) => {
                tracing::warn!(
                    "maxrate {} is below bitrate {}, capping MaxBitrate at bitrate",
                    maxrate,
                    bitrate
                );
                self.mode(RateControlMode::Vbr);
                self.map_bitrate();
                self.patch.set("MaxBitrate", json!(bitrate));
                self.patch.consume("maxrate", "MaxBitrate");
            }
        }
    }
}
