//! Conditions guarding rule sources and targets.
//!
//! A [`Condition`] is either a leaf comparison against the value being mapped
//! (or another field of the source document, via `source_path`) or an
//! AND/OR/NOT composition of other conditions.
//!
//! JSON format:
//!
//! ```json
//! { "operator": "eq", "value": "yes" }
//! { "operator": "gt", "value": 1000, "source_path": "bitrate" }
//! { "operator": "AND", "conditions": [ ... ] }
//! { "operator": "NOT", "condition": { ... } }
//! ```
//!
//! `Serialize` and `Deserialize` go through [`serde_json::Value`] so that
//! parse errors read naturally and the recursive type is walked at runtime.

use profileforge_common::{Document, Value};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Map;
use std::cmp::Ordering;

/// Comparison operator of a leaf condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    /// The value is a member of the condition's list (or substring of its string).
    In,
    /// The value (list, string or object) contains the condition's value.
    Contains,
    /// The value is present and not null.
    Exists,
    /// Unrecognised operator name. Always evaluates to false.
    Unknown(String),
}

impl Operator {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "gt" => Self::Gt,
            "lt" => Self::Lt,
            "gte" => Self::Gte,
            "lte" => Self::Lte,
            "in" => Self::In,
            "contains" => Self::Contains,
            "exists" => Self::Exists,
            _ => Self::Unknown(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::In => "in",
            Self::Contains => "contains",
            Self::Exists => "exists",
            Self::Unknown(name) => name,
        }
    }
}

/// A condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Compare the source value against `value`.
    Compare {
        operator: Operator,
        value: Option<Value>,
        source_path: Option<String>,
    },
    /// All sub-conditions must hold.
    And(Vec<Condition>),
    /// At least one sub-condition must hold.
    Or(Vec<Condition>),
    /// Negates the inner condition.
    Not(Box<Condition>),
}

impl Condition {
    /// Shorthand for a leaf comparison against the mapped value.
    pub fn compare(operator: Operator, value: Value) -> Self {
        Self::Compare {
            operator,
            value: Some(value),
            source_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Manual Serialize / Deserialize via serde_json::Value
// ---------------------------------------------------------------------------

fn condition_to_value(condition: &Condition) -> Value {
    match condition {
        Condition::Compare {
            operator,
            value,
            source_path,
        } => {
            let mut map = Map::new();
            map.insert("operator".into(), Value::String(operator.as_str().into()));
            if let Some(value) = value {
                map.insert("value".into(), value.clone());
            }
            if let Some(path) = source_path {
                map.insert("source_path".into(), Value::String(path.clone()));
            }
            Value::Object(map)
        }
        Condition::And(conditions) => serde_json::json!({
            "operator": "AND",
            "conditions": conditions.iter().map(condition_to_value).collect::<Vec<_>>()
        }),
        Condition::Or(conditions) => serde_json::json!({
            "operator": "OR",
            "conditions": conditions.iter().map(condition_to_value).collect::<Vec<_>>()
        }),
        Condition::Not(inner) => serde_json::json!({
            "operator": "NOT",
            "condition": condition_to_value(inner)
        }),
    }
}

/// Parse a condition from its JSON form.
///
/// A missing `operator` defaults to `eq`.
pub fn condition_from_value(val: &Value) -> Result<Condition, String> {
    let obj = val.as_object().ok_or("condition must be a JSON object")?;
    let operator = match obj.get("operator") {
        None => "eq",
        Some(Value::String(op)) => op.as_str(),
        Some(other) => return Err(format!("condition operator must be a string, got {other}")),
    };

    match operator.trim().to_ascii_uppercase().as_str() {
        "AND" => Ok(Condition::And(children(obj, "AND")?)),
        "OR" => Ok(Condition::Or(children(obj, "OR")?)),
        "NOT" => {
            let inner = obj
                .get("condition")
                .ok_or("NOT condition must have a \"condition\" field")?;
            Ok(Condition::Not(Box::new(condition_from_value(inner)?)))
        }
        _ => {
            let source_path = match obj.get("source_path") {
                None | Some(Value::Null) => None,
                Some(Value::String(path)) => Some(path.clone()),
                Some(other) => return Err(format!("source_path must be a string, got {other}")),
            };
            Ok(Condition::Compare {
                operator: Operator::parse(operator),
                value: obj.get("value").cloned(),
                source_path,
            })
        }
    }
}

fn children(obj: &Map<String, Value>, name: &str) -> Result<Vec<Condition>, String> {
    obj.get("conditions")
        .and_then(|v| v.as_array())
        .ok_or_else(|| format!("{name} condition must have a \"conditions\" array"))?
        .iter()
        .map(condition_from_value)
        .collect()
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        condition_to_value(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        condition_from_value(&value).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate a condition for `source_value`.
///
/// Leaf conditions with a `source_path` read their value from `source_doc`
/// instead. Strings are compared lower-cased and trimmed.
pub fn evaluate(condition: &Condition, source_value: Option<&Value>, source_doc: &Document) -> bool {
    match condition {
        Condition::And(conditions) => conditions
            .iter()
            .all(|c| evaluate(c, source_value, source_doc)),
        Condition::Or(conditions) => conditions
            .iter()
            .any(|c| evaluate(c, source_value, source_doc)),
        Condition::Not(inner) => !evaluate(inner, source_value, source_doc),
        Condition::Compare {
            operator,
            value,
            source_path,
        } => {
            let subject = match source_path {
                Some(path) => source_doc.get(path),
                None => source_value,
            };
            let result = compare(operator, subject, value.as_ref());
            tracing::debug!(
                "Condition {} {:?} {:?} = {}",
                operator.as_str(),
                subject,
                value,
                result
            );
            result
        }
    }
}

fn compare(operator: &Operator, subject: Option<&Value>, expected: Option<&Value>) -> bool {
    let subject = subject.map(normalize).unwrap_or(Value::Null);
    let expected = expected.map(normalize).unwrap_or(Value::Null);

    match operator {
        Operator::Eq => loose_eq(&subject, &expected),
        Operator::Ne => !loose_eq(&subject, &expected),
        Operator::Gt => ordering(&subject, &expected) == Some(Ordering::Greater),
        Operator::Lt => ordering(&subject, &expected) == Some(Ordering::Less),
        Operator::Gte => matches!(
            ordering(&subject, &expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lte => matches!(
            ordering(&subject, &expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::In => member_of(&subject, &expected),
        Operator::Contains => member_of(&expected, &subject),
        Operator::Exists => !subject.is_null(),
        Operator::Unknown(name) => {
            tracing::warn!("Unknown condition operator '{}', treating as false", name);
            false
        }
    }
}

fn normalize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_lowercase()),
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        other => other.clone(),
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn ordering(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(_), _) | (_, Value::Number(_)) => numeric(a)?.partial_cmp(&numeric(b)?),
        _ => None,
    }
}

/// Whether `needle` is an element of (or substring of, or key of) `haystack`.
fn member_of(needle: &Value, haystack: &Value) -> bool {
    match (needle, haystack) {
        (_, Value::Array(items)) => items.iter().any(|item| loose_eq(needle, item)),
        (Value::String(n), Value::String(h)) => h.contains(n.as_str()),
        (Value::String(n), Value::Object(map)) => map.contains_key(n),
        _ => false,
    }
}
