//! Enumerated transformer tables and built-in formulas.

use profileforge_common::units::{as_float, parse_bitrate, stringify};
use profileforge_common::{Error, Map, Result, Value};

/// Outcome of looking a value up in a transformer table.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<'a> {
    Hit(&'a Value),
    /// The table exists but has no entry for the value.
    Miss,
    /// There is no table with that name.
    NoTable,
}

/// Named lookup tables: `transformers[name][stringified value] -> mapped value`.
#[derive(Debug, Clone, Default)]
pub struct Transformers {
    tables: Map<String, Value>,
}

impl Transformers {
    pub fn from_value(value: &Value) -> Result<Self> {
        let tables = value
            .as_object()
            .ok_or_else(|| Error::rule_document("\"transformers\" must be an object"))?;
        for (name, table) in tables {
            if !table.is_object() {
                return Err(Error::rule_document(format!(
                    "transformer '{}' must be an object",
                    name
                )));
            }
        }
        Ok(Self {
            tables: tables.clone(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn lookup(&self, name: &str, value: &Value) -> Lookup<'_> {
        let Some(table) = self.tables.get(name).and_then(Value::as_object) else {
            return Lookup::NoTable;
        };
        match table.get(&stringify(value)) {
            Some(mapped) => Lookup::Hit(mapped),
            None => Lookup::Miss,
        }
    }
}

/// Built-in parametric transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formula {
    /// Legacy 0-100+ volume percentage to a gain in dB: `-27 + 25 * v / 100`.
    AudioVolume,
    /// Bitrate string (`"1000k"`) to bits per second.
    BitrateBps,
}

impl Formula {
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "audio_volume_format" => Some(Self::AudioVolume),
            "bitrate_bps" => Some(Self::BitrateBps),
            _ => None,
        }
    }

    pub fn apply(&self, value: &Value) -> Value {
        match self {
            Self::AudioVolume => match as_float(value) {
                Some(v) => serde_json::Number::from_f64(-27.0 + 25.0 * v / 100.0)
                    .map(Value::Number)
                    .unwrap_or_else(|| value.clone()),
                None => {
                    tracing::warn!("Invalid audio volume value {}, leaving unchanged", value);
                    value.clone()
                }
            },
            Self::BitrateBps => Value::from(parse_bitrate(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tables() -> Transformers {
        Transformers::from_value(&json!({
            "video_codec_map": {"libx264": "H_264", "libx265": "H_265"},
            "channels": {"2": "CODING_MODE_2_0", "6": "CODING_MODE_5_1"}
        }))
        .unwrap()
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let t = tables();
        assert_eq!(
            t.lookup("video_codec_map", &json!("libx264")),
            Lookup::Hit(&json!("H_264"))
        );
        assert_eq!(t.lookup("video_codec_map", &json!("vp8")), Lookup::Miss);
        assert_eq!(t.lookup("nope", &json!("x")), Lookup::NoTable);
    }

    #[test]
    fn test_lookup_stringifies_numbers() {
        let t = tables();
        assert_eq!(
            t.lookup("channels", &json!(6)),
            Lookup::Hit(&json!("CODING_MODE_5_1"))
        );
    }

    #[test]
    fn test_rejects_non_object_tables() {
        assert!(Transformers::from_value(&json!([])).is_err());
        assert!(Transformers::from_value(&json!({"x": "y"})).is_err());
    }

    #[test]
    fn test_audio_volume_formula() {
        let f = Formula::by_name("audio_volume_format").unwrap();
        assert_eq!(f.apply(&json!(100)), json!(-2.0));
        assert_eq!(f.apply(&json!(0)), json!(-27.0));
        assert_eq!(f.apply(&json!("200")), json!(23.0));
        assert_eq!(f.apply(&json!("loud")), json!("loud"));
    }

    #[test]
    fn test_bitrate_formula() {
        let f = Formula::by_name("bitrate_bps").unwrap();
        assert_eq!(f.apply(&json!("1000k")), json!(1_000_000));
        assert!(Formula::by_name("unknown").is_none());
    }
}
