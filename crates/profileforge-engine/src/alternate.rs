//! Alternate audio sources.
//!
//! A legacy profile may list extra audio tracks under `alternate_source`.
//! Each becomes an input audio selector, and renditions point at one of them
//! by its zero-based position through `use_alternate_id`.

use profileforge_common::units::{is_yes, stringify};
use profileforge_common::{Map, Value};
use serde_json::json;

/// Two-letter codes with a fixed three-letter equivalent.
const LANGUAGE_CODES: [(&str, &str); 10] = [
    ("es", "SPA"),
    ("fr", "FRA"),
    ("en", "ENG"),
    ("de", "DEU"),
    ("it", "ITA"),
    ("ja", "JPN"),
    ("ko", "KOR"),
    ("pt", "POR"),
    ("ru", "RUS"),
    ("zh", "CHI"),
];

/// Map a legacy language spelling onto a target language code.
pub fn language_code(raw: &str) -> String {
    let language = raw.trim().to_lowercase();
    if let Some((_, code)) = LANGUAGE_CODES.iter().find(|(short, _)| *short == language) {
        return code.to_string();
    }
    match language.as_str() {
        "eng" | "english" => "ENG".into(),
        "spa" | "spanish" => "SPA".into(),
        "fre" | "fra" | "french" => "FRA".into(),
        "ger" | "deu" | "german" => "DEU".into(),
        _ => language.to_uppercase(),
    }
}

/// One input audio selector derived from an alternate source.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSelector {
    pub name: String,
    pub language_code: Option<String>,
    pub audio_name: Option<String>,
    pub is_default: bool,
}

impl AudioSelector {
    fn from_source(index: usize, source: &Map<String, Value>) -> Self {
        Self {
            name: format!("Audio Selector {}", index + 1),
            language_code: source
                .get("language")
                .filter(|v| !v.is_null())
                .map(|v| language_code(&stringify(v))),
            audio_name: source
                .get("audio_name")
                .filter(|v| !v.is_null())
                .map(stringify),
            is_default: source.get("alternate_default").is_some_and(is_yes),
        }
    }

    /// Selector settings in target form.
    pub fn to_value(&self) -> Value {
        let mut selector = Map::new();
        selector.insert("SelectorType".into(), json!("LANGUAGE_CODE"));
        if let Some(code) = &self.language_code {
            selector.insert("LanguageCode".into(), json!(code));
        }
        if let Some(name) = &self.audio_name {
            selector.insert("CustomLanguageCode".into(), json!(name));
        }
        let selection = if self.is_default {
            "DEFAULT"
        } else {
            "NOT_DEFAULT"
        };
        selector.insert("DefaultSelection".into(), json!(selection));
        Value::Object(selector)
    }

    /// Label used in output name modifiers: the language code, else a
    /// sanitised custom name.
    pub fn label(&self) -> Option<String> {
        if let Some(code) = &self.language_code {
            return Some(code.to_lowercase());
        }
        self.audio_name.as_deref().map(sanitize).filter(|s| !s.is_empty())
    }
}

/// Alternate audio sources indexed by their position in the profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioSelectorMap {
    selectors: Vec<AudioSelector>,
}

impl AudioSelectorMap {
    /// Build from an `alternate_source` value: a list of objects or a single object.
    pub fn from_value(value: Option<&Value>) -> Self {
        let sources: Vec<&Map<String, Value>> = match value {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
            Some(Value::Object(obj)) => vec![obj],
            _ => Vec::new(),
        };
        let selectors = sources
            .into_iter()
            .enumerate()
            .map(|(i, source)| AudioSelector::from_source(i, source))
            .collect::<Vec<_>>();
        tracing::debug!("Built {} alternate audio selectors", selectors.len());
        Self { selectors }
    }

    pub fn get(&self, index: usize) -> Option<&AudioSelector> {
        self.selectors.get(index)
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// The `AudioSelectors` object for the job input. An empty map still
    /// yields a single default selector.
    pub fn to_value(&self) -> Value {
        let mut selectors = Map::new();
        if self.selectors.is_empty() {
            selectors.insert(
                "Audio Selector 1".into(),
                json!({"DefaultSelection": "DEFAULT", "SelectorType": "LANGUAGE_CODE"}),
            );
        }
        for selector in &self.selectors {
            selectors.insert(selector.name.clone(), selector.to_value());
        }
        Value::Object(selectors)
    }
}

fn sanitize(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}
