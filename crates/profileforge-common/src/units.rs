//! Parsing helpers for the loosely typed values found in legacy profiles.
//!
//! Legacy profiles spell bitrates as `"1000k"` or `"4.5m"`, sizes as
//! `"1280x720"` and flags as `"yes"`/`"no"`. Numeric-looking strings have
//! usually been coerced to numbers already, so every helper accepts both.

use serde_json::Value;

/// Parse a bitrate into bits per second.
///
/// `k` and `m` suffixes scale by 1,000 and 1,000,000; anything else is parsed
/// as a plain number. Unparseable input logs a warning and yields 0.
pub fn parse_bitrate(value: &Value) -> u64 {
    match value {
        Value::Number(n) => {
            if let Some(bps) = n.as_u64() {
                return bps;
            }
            match n.as_f64() {
                Some(bps) if bps >= 0.0 => bps.round() as u64,
                _ => {
                    tracing::warn!("Could not parse bitrate {}, using 0", n);
                    0
                }
            }
        }
        Value::String(s) => parse_bitrate_str(s),
        other => {
            tracing::warn!("Could not parse bitrate {}, using 0", other);
            0
        }
    }
}

/// Parse a bitrate string such as `"1000k"`, `"1.5m"` or `"96000"`.
pub fn parse_bitrate_str(raw: &str) -> u64 {
    let text = raw.trim().to_lowercase();

    let (digits, scale) = if let Some(rest) = text.strip_suffix('k') {
        (rest.trim(), 1_000.0)
    } else if let Some(rest) = text.strip_suffix('m') {
        (rest.trim(), 1_000_000.0)
    } else {
        (text.as_str(), 1.0)
    };

    if scale == 1.0 {
        if let Ok(bps) = digits.parse::<u64>() {
            return bps;
        }
    }

    match digits.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => (n * scale).round() as u64,
        _ => {
            tracing::warn!("Could not parse bitrate '{}', using 0", raw);
            0
        }
    }
}

/// Parse a `WIDTHxHEIGHT` frame size.
pub fn parse_size(value: &Value) -> Option<(u64, u64)> {
    let text = value.as_str()?.trim().to_lowercase();
    let (width, height) = text.split_once('x')?;
    let width = leading_digits(width.trim())?;
    let height = leading_digits(height.trim())?;
    Some((width, height))
}

fn leading_digits(text: &str) -> Option<u64> {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    text[..end].parse().ok()
}

/// Read an integer from a number or a numeric string.
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

/// Read a float from a number or a numeric string.
pub fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whether a flag field reads as "yes".
pub fn is_yes(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("yes"),
        _ => false,
    }
}

/// Lower-cased, trimmed token for a string or scalar value.
pub fn token(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Array(_) | Value::Object(_) => None,
        other => Some(stringify(other).trim().to_lowercase()),
    }
}

/// Whether a field carries a usable value (not null, not an empty string).
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// String form of a value, used for table lookups and regex matching.
///
/// Strings are returned verbatim, everything else uses its JSON spelling.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
