//! Rule types and parsing.
//!
//! A rule maps one source path onto one or more target paths:
//!
//! ```json
//! {
//!   "source": { "path": "size", "regex": "(\\d+)x(\\d+)" },
//!   "target": [
//!     { "path": "Settings.OutputGroups[0].Outputs[0].VideoDescription.Width", "value": "$1" },
//!     { "path": "Settings.OutputGroups[0].Outputs[0].VideoDescription.Height", "value": "$2" }
//!   ]
//! }
//! ```

use crate::condition::{condition_from_value, Condition};
use profileforge_common::path::parse_path;
use profileforge_common::units::stringify;
use profileforge_common::{Error, Result, Value};
use regex::Regex;
use serde_json::Map;

/// How a rule treats its source path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Map the value onto the targets.
    Scalar,
    /// Mark the path as handled without producing anything.
    Dummy,
}

/// A compiled source regex together with the pattern it came from.
#[derive(Debug, Clone)]
pub struct SourcePattern {
    pattern: String,
    regex: Regex,
}

impl SourcePattern {
    /// Compile a pattern anchored at the start of the value.
    pub fn new(pattern: &str) -> std::result::Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})", pattern))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// The source half of a rule.
#[derive(Debug, Clone)]
pub struct Source {
    pub path: String,
    pub kind: SourceKind,
    pub pattern: Option<SourcePattern>,
    pub condition: Option<Condition>,
    pub default: Option<Value>,
}

/// One destination of a rule.
#[derive(Debug, Clone)]
pub struct Target {
    pub path: String,
    /// Static value, possibly a `$1`-style template when the source has a regex.
    pub value: Option<Value>,
    pub transform: Option<String>,
    pub condition: Option<Condition>,
}

/// Result of rendering a target's static value.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Value(Value),
    /// The source regex did not match the value.
    NoMatch,
}

impl Target {
    /// Render the static value for `source_value`.
    ///
    /// With a source pattern, `$N` references in a string template are
    /// replaced by capture groups and the result is coerced to an integer or
    /// float when it looks like one. Without a pattern the value is used as is.
    pub fn render(&self, pattern: Option<&SourcePattern>, source_value: &Value) -> Option<Rendered> {
        let template = self.value.as_ref()?;
        let Some(pattern) = pattern else {
            return Some(Rendered::Value(template.clone()));
        };

        let subject = stringify(source_value);
        let Some(captures) = pattern.regex().captures(&subject) else {
            return Some(Rendered::NoMatch);
        };

        let Value::String(template) = template else {
            return Some(Rendered::Value(template.clone()));
        };

        let mut text = template.clone();
        // Highest group first so `$1` does not eat the front of `$10`.
        for group in (1..captures.len()).rev() {
            let replacement = captures.get(group).map_or("", |m| m.as_str());
            text = text.replace(&format!("${}", group), replacement);
        }
        Some(Rendered::Value(coerce_number(text)))
    }
}

/// Turn an all-digit string into an integer and a decimal string into a float.
pub fn coerce_number(text: String) -> Value {
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = text.parse::<u64>() {
            return Value::from(n);
        }
    }
    match text.trim().parse::<f64>() {
        Ok(f) if f.is_finite() => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::String(text)),
        _ => Value::String(text),
    }
}

/// A parsed mapping rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub source: Source,
    pub targets: Vec<Target>,
}

impl Rule {
    pub fn is_dummy(&self) -> bool {
        self.source.kind == SourceKind::Dummy
    }

    /// Parse the rule at position `index` of a rule document.
    pub fn from_value(index: usize, value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::invalid_rule(index, "?", "rule must be an object"))?;
        let source_obj = obj
            .get("source")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::invalid_rule(index, "?", "missing \"source\" object"))?;

        let path = required_path(index, source_obj, "?")?;
        let fail = |msg: String| Error::invalid_rule(index, path.as_str(), msg);

        let kind = match source_obj.get("type") {
            None | Some(Value::Null) => SourceKind::Scalar,
            Some(Value::String(kind)) => match kind.as_str() {
                "scalar" | "string" => SourceKind::Scalar,
                "dummy" => SourceKind::Dummy,
                other => return Err(fail(format!("unknown source type '{}'", other))),
            },
            Some(other) => return Err(fail(format!("source type must be a string, got {}", other))),
        };

        let pattern = match source_obj.get("regex") {
            None | Some(Value::Null) => None,
            Some(Value::String(p)) => Some(
                SourcePattern::new(p).map_err(|e| fail(format!("invalid regex '{}': {}", p, e)))?,
            ),
            Some(other) => return Err(fail(format!("regex must be a string, got {}", other))),
        };

        let condition = source_obj
            .get("condition")
            .map(condition_from_value)
            .transpose()
            .map_err(|e| fail(format!("invalid source condition: {}", e)))?;

        let targets = match obj.get("target") {
            None | Some(Value::Null) if kind == SourceKind::Dummy => Vec::new(),
            None | Some(Value::Null) => return Err(fail("missing \"target\"".into())),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| parse_target(index, &path, item))
                .collect::<Result<Vec<_>>>()?,
            Some(item) => vec![parse_target(index, &path, item)?],
        };

        if targets.is_empty() && kind == SourceKind::Scalar {
            return Err(fail("rule has no targets".into()));
        }

        Ok(Self {
            source: Source {
                path: path.clone(),
                kind,
                pattern,
                condition,
                default: source_obj.get("default").cloned(),
            },
            targets,
        })
    }

    /// Names of every transform the rule refers to.
    pub fn transform_names(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().filter_map(|t| t.transform.as_deref())
    }
}

fn required_path(index: usize, obj: &Map<String, Value>, owner: &str) -> Result<String> {
    let path = obj
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_rule(index, owner, "missing \"path\""))?;
    parse_path(path).map_err(|e| Error::invalid_rule(index, owner, e.to_string()))?;
    Ok(path.to_string())
}

fn parse_target(index: usize, source_path: &str, value: &Value) -> Result<Target> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::invalid_rule(index, source_path, "target must be an object"))?;
    let path = required_path(index, obj, source_path)?;

    let transform = match obj.get("transform") {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name.clone()),
        Some(other) => {
            return Err(Error::invalid_rule(
                index,
                source_path,
                format!("transform must be a string, got {}", other),
            ))
        }
    };

    let condition = obj
        .get("condition")
        .map(condition_from_value)
        .transpose()
        .map_err(|e| {
            Error::invalid_rule(index, source_path, format!("invalid target condition: {}", e))
        })?;

    Ok(Target {
        path,
        value: obj.get("value").cloned(),
        transform,
        condition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_single_target_rule() {
        let rule = Rule::from_value(
            0,
            &json!({
                "source": {"path": "keyframe"},
                "target": {"path": "Settings.OutputGroups[0].Outputs[0].VideoDescription.CodecSettings.H264Settings.GopSize"}
            }),
        )
        .unwrap();
        assert_eq!(rule.source.path, "keyframe");
        assert_eq!(rule.source.kind, SourceKind::Scalar);
        assert_eq!(rule.targets.len(), 1);
        assert!(!rule.is_dummy());
    }

    #[test]
    fn test_parse_dummy_without_target() {
        let rule = Rule::from_value(
            4,
            &json!({"source": {"path": "notify", "type": "dummy"}}),
        )
        .unwrap();
        assert!(rule.is_dummy());
        assert!(rule.targets.is_empty());
    }

    #[test]
    fn test_parse_errors_name_the_rule() {
        let err = Rule::from_value(7, &json!({"source": {"path": "size"}})).unwrap_err();
        assert_eq!(err.to_string(), "Invalid rule #7 (size): missing \"target\"");

        let err = Rule::from_value(
            2,
            &json!({"source": {"path": "size", "regex": "("}, "target": {"path": "a"}}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid regex"));

        assert!(Rule::from_value(0, &json!({"target": {"path": "a"}})).is_err());
        assert!(Rule::from_value(0, &json!({"source": {"path": "a"}, "target": {}})).is_err());
        assert!(Rule::from_value(0, &json!({"source": {"path": "a[x]"}, "target": {"path": "b"}})).is_err());
    }

    #[test]
    fn test_render_regex_template() {
        let rule = Rule::from_value(
            0,
            &json!({
                "source": {"path": "size", "regex": "(\\d+)x(\\d+)"},
                "target": [
                    {"path": "W", "value": "$1"},
                    {"path": "H", "value": "$2"},
                    {"path": "Label", "value": "res_$1_$2"}
                ]
            }),
        )
        .unwrap();
        let pattern = rule.source.pattern.as_ref();
        let size = json!("1280x720");

        assert_eq!(
            rule.targets[0].render(pattern, &size),
            Some(Rendered::Value(json!(1280)))
        );
        assert_eq!(
            rule.targets[1].render(pattern, &size),
            Some(Rendered::Value(json!(720)))
        );
        assert_eq!(
            rule.targets[2].render(pattern, &size),
            Some(Rendered::Value(json!("res_1280_720")))
        );
        assert_eq!(
            rule.targets[0].render(pattern, &json!("hd720")),
            Some(Rendered::NoMatch)
        );
    }

    #[test]
    fn test_render_static_value_without_regex() {
        let rule = Rule::from_value(
            0,
            &json!({"source": {"path": "deinterlacing"}, "target": {"path": "X", "value": {"Mode": "DEINTERLACE"}}}),
        )
        .unwrap();
        assert_eq!(
            rule.targets[0].render(None, &json!("yes")),
            Some(Rendered::Value(json!({"Mode": "DEINTERLACE"})))
        );

        let no_value = Target {
            path: "Y".into(),
            value: None,
            transform: None,
            condition: None,
        };
        assert_eq!(no_value.render(None, &json!(1)), None);
    }

    #[test]
    fn test_regex_is_anchored_at_start() {
        let pattern = SourcePattern::new("(\\d+)k").unwrap();
        let target = Target {
            path: "B".into(),
            value: Some(json!("$1000")),
            transform: None,
            condition: None,
        };
        assert_eq!(
            target.render(Some(&pattern), &json!("96k")),
            Some(Rendered::Value(json!(96000)))
        );
        assert_eq!(target.render(Some(&pattern), &json!("abc96k")), Some(Rendered::NoMatch));
    }

    #[test]
    fn test_source_type_must_be_known() {
        let scalar = Rule::from_value(
            0,
            &json!({"source": {"path": "size", "type": "string"}, "target": {"path": "W"}}),
        )
        .unwrap();
        assert_eq!(scalar.source.kind, SourceKind::Scalar);

        for kind in [json!("dumy"), json!("iteration"), json!(1)] {
            let err = Rule::from_value(
                3,
                &json!({"source": {"path": "notify", "type": kind}, "target": {"path": "Settings.X"}}),
            )
            .unwrap_err();
            assert!(matches!(err, Error::InvalidRule { index: 3, .. }));
        }
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number("42".into()), json!(42));
        assert_eq!(coerce_number("29.97".into()), json!(29.97));
        assert_eq!(coerce_number("-5".into()), json!(-5.0));
        assert_eq!(coerce_number("H_264".into()), json!("H_264"));
        assert_eq!(coerce_number("".into()), json!(""));
    }
}
