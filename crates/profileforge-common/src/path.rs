//! Dot-separated document paths.
//!
//! A path such as `Settings.OutputGroups[0].Outputs[2].NameModifier` is a list
//! of segments, each naming an object key and optionally indexing into the
//! array stored under that key.

use crate::error::{Error, Result};
use std::fmt;

/// One segment of a document path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub key: String,
    pub index: Option<usize>,
}

impl Segment {
    pub fn key<S: Into<String>>(key: S) -> Self {
        Self {
            key: key.into(),
            index: None,
        }
    }

    pub fn indexed<S: Into<String>>(key: S, index: usize) -> Self {
        Self {
            key: key.into(),
            index: Some(index),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]", self.key, index),
            None => f.write_str(&self.key),
        }
    }
}

/// Parse a path string into segments.
pub fn parse_path(path: &str) -> Result<Vec<Segment>> {
    if path.is_empty() {
        return Err(Error::invalid_path(path, "empty path"));
    }

    path.split('.')
        .map(|raw| parse_segment(path, raw))
        .collect()
}

fn parse_segment(path: &str, raw: &str) -> Result<Segment> {
    let Some(body) = raw.strip_suffix(']') else {
        if raw.is_empty() || raw.contains('[') || raw.contains(']') {
            return Err(Error::invalid_path(path, format!("bad segment '{}'", raw)));
        }
        return Ok(Segment::key(raw));
    };

    let (key, index) = body
        .rsplit_once('[')
        .ok_or_else(|| Error::invalid_path(path, format!("unbalanced brackets in '{}'", raw)))?;

    if key.is_empty() || key.contains('[') || key.contains(']') {
        return Err(Error::invalid_path(path, format!("bad segment '{}'", raw)));
    }

    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|_| Error::invalid_path(path, format!("bad index '{}'", index)))?;

    Ok(Segment::indexed(key, index))
}

/// Join a child key onto a parent path.
pub fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// Append an array index to a path.
pub fn with_index(path: &str, index: usize) -> String {
    format!("{}[{}]", path, index)
}
