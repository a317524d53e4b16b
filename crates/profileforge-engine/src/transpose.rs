//! Multi-rendition detection.
//!
//! Renditions come either from a `stream` field (a list of objects, or one
//! object) or from parallel arrays: `bitrate: ["1000k", "2000k"]` next to
//! `size: ["640x360", "1280x720"]` describes two renditions.

use profileforge_common::path::with_index;
use profileforge_common::{Map, Value};

/// Where the renditions were found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenditionOrigin {
    Stream,
    Transposed,
}

/// Renditions found in a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct RenditionSet {
    pub origin: RenditionOrigin,
    pub renditions: Vec<Map<String, Value>>,
    /// Top-level source paths the renditions were built from.
    pub consumed: Vec<String>,
}

impl RenditionSet {
    pub fn len(&self) -> usize {
        self.renditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renditions.is_empty()
    }

    /// Report prefix for fields of rendition `index`.
    pub fn prefix(&self, index: usize) -> String {
        match self.origin {
            RenditionOrigin::Stream => format!("{}.", with_index("stream", index)),
            RenditionOrigin::Transposed => format!("{}.", with_index("rendition", index)),
        }
    }
}

/// Renditions of a `stream` value.
pub fn from_stream(value: &Value) -> Option<RenditionSet> {
    let renditions: Vec<Map<String, Value>> = match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| match item {
                Value::Object(obj) => Some(obj.clone()),
                other => {
                    tracing::warn!("Ignoring stream[{}]: expected an object, got {}", i, other);
                    None
                }
            })
            .collect(),
        Value::Object(obj) => vec![obj.clone()],
        _ => Vec::new(),
    };
    if renditions.is_empty() {
        return None;
    }
    Some(RenditionSet {
        origin: RenditionOrigin::Stream,
        renditions,
        consumed: vec!["stream".to_string()],
    })
}

/// Renditions described by parallel arrays among `fields_of_interest`.
pub fn transpose(fields: &Map<String, Value>, fields_of_interest: &[String]) -> Option<RenditionSet> {
    let mut arrays: Vec<(&str, &Vec<Value>)> = Vec::new();
    let mut scalars: Vec<(&str, &Value)> = Vec::new();

    for name in fields_of_interest {
        match fields.get(name.as_str()) {
            Some(Value::Array(items)) if items.iter().all(is_scalar) => {
                arrays.push((name.as_str(), items));
            }
            Some(value) if is_scalar(value) && !value.is_null() => {
                scalars.push((name.as_str(), value));
            }
            _ => {}
        }
    }

    let count = arrays.first()?.1.len();
    if arrays.iter().any(|(_, items)| items.len() != count) {
        let lengths: Vec<String> = arrays
            .iter()
            .map(|(name, items)| format!("{}={}", name, items.len()))
            .collect();
        tracing::warn!(
            "Multi-valued fields have different lengths ({}), treating profile as a single rendition",
            lengths.join(", ")
        );
        return None;
    }
    if count < 2 {
        return None;
    }

    let renditions = (0..count)
        .map(|i| {
            let mut rendition = Map::new();
            for name in fields_of_interest {
                if let Some((_, items)) = arrays.iter().find(|(n, _)| *n == name.as_str()) {
                    rendition.insert(name.clone(), items[i].clone());
                } else if let Some((_, value)) = scalars.iter().find(|(n, _)| *n == name.as_str()) {
                    rendition.insert(name.clone(), (*value).clone());
                }
            }
            rendition
        })
        .collect();

    let consumed = fields_of_interest
        .iter()
        .filter(|name| {
            arrays.iter().any(|(n, _)| *n == name.as_str())
                || scalars.iter().any(|(n, _)| *n == name.as_str())
        })
        .cloned()
        .collect();

    tracing::debug!("Transposed {} renditions from parallel fields", count);
    Some(RenditionSet {
        origin: RenditionOrigin::Transposed,
        renditions,
        consumed,
    })
}

/// Look for renditions: a `stream` field first, then parallel arrays.
pub fn detect(fields: &Map<String, Value>, fields_of_interest: &[String]) -> Option<RenditionSet> {
    match fields.get("stream") {
        Some(stream) if !stream.is_null() => from_stream(stream),
        _ => transpose(fields, fields_of_interest),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn interest() -> Vec<String> {
        ["size", "bitrate", "framerate", "audio_codec"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_stream_list() {
        let set = detect(
            &fields(json!({"stream": [{"size": "640x360"}, {"audio_only": "yes"}]})),
            &interest(),
        )
        .unwrap();
        assert_eq!(set.origin, RenditionOrigin::Stream);
        assert_eq!(set.len(), 2);
        assert_eq!(set.consumed, vec!["stream".to_string()]);
        assert_eq!(set.prefix(1), "stream[1].");
    }

    #[test]
    fn test_single_stream_object() {
        let set = detect(&fields(json!({"stream": {"size": "640x360"}})), &interest()).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.renditions[0]["size"], json!("640x360"));
    }

    #[test]
    fn test_transpose_parallel_arrays() {
        let set = detect(
            &fields(json!({
                "size": ["640x360", "1280x720"],
                "bitrate": ["800k", "2500k"],
                "framerate": 30,
                "output": "advanced_hls"
            })),
            &interest(),
        )
        .unwrap();
        assert_eq!(set.origin, RenditionOrigin::Transposed);
        assert_eq!(
            set.renditions,
            vec![
                fields(json!({"size": "640x360", "bitrate": "800k", "framerate": 30})),
                fields(json!({"size": "1280x720", "bitrate": "2500k", "framerate": 30})),
            ]
        );
        assert_eq!(set.consumed, vec!["size", "bitrate", "framerate"]);
        assert_eq!(set.prefix(0), "rendition[0].");
    }

    #[test]
    fn test_mismatched_lengths_fall_back() {
        let found = detect(
            &fields(json!({"size": ["640x360", "1280x720"], "bitrate": ["800k"]})),
            &interest(),
        );
        assert!(found.is_none());
    }

    #[test]
    fn test_single_values_are_not_renditions() {
        assert!(detect(&fields(json!({"size": "640x360", "bitrate": "800k"})), &interest()).is_none());
        assert!(detect(&fields(json!({"bitrate": ["800k"]})), &interest()).is_none());
    }
}
