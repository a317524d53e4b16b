//! Reading rule documents, profiles and templates from disk.
//!
//! Profiles come either as JSON or as legacy XML exports, where the profile
//! sits in a `<format>` element and repeated children (usually `<stream>`)
//! form a list.

use anyhow::{Context, Result};
use profileforge_rules::rule::coerce_number;
use profileforge_rules::RuleSet;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// File name endings recognized as profiles, longest first.
const PROFILE_EXTENSIONS: [&str; 3] = [".format.xml", ".xml", ".json"];

/// Read and parse a JSON file.
pub fn load_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON in {:?}", path))
}

/// Load a profile, dispatching on the file extension.
pub fn load_profile(path: &Path) -> Result<Value> {
    if !is_xml(path) {
        return load_json(path);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {:?}", path))?;
    parse_profile_xml(&content).with_context(|| format!("Failed to parse XML in {:?}", path))
}

fn is_xml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "xml")
}

/// Profile base name: `hd.json`, `hd.xml` and `hd.format.xml` are all `hd`.
pub fn profile_stem(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    PROFILE_EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .or_else(|| path.file_stem().and_then(|s| s.to_str()))
}

/// Whether `name` ends in one of the profile extensions.
pub fn has_profile_extension(name: &str) -> bool {
    PROFILE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn named(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            ..Self::default()
        }
    }

    fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// Leaves become coerced text (`null` when empty); other elements become
    /// objects keyed by child name, a later duplicate replacing an earlier one.
    fn to_value(&self) -> Value {
        if self.children.is_empty() {
            if self.text.is_empty() {
                return Value::Null;
            }
            return coerce_number(self.text.clone());
        }
        let map: Map<String, Value> = self
            .children
            .iter()
            .map(|child| (child.name.clone(), child.to_value()))
            .collect();
        Value::Object(map)
    }
}

/// Parse a legacy XML profile into the same shape a JSON profile has.
///
/// Only the first `<format>` element is read. Children of it that occur more
/// than once become an array in document order. A document without a
/// `<format>` element yields an empty profile.
pub fn parse_profile_xml(text: &str) -> Result<Value> {
    let document = read_elements(text)?;
    let Some(format) = document.find("format") else {
        tracing::warn!("No <format> element in XML profile");
        return Ok(Value::Object(Map::new()));
    };

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for child in &format.children {
        *counts.entry(child.name.as_str()).or_default() += 1;
    }

    let mut profile = Map::new();
    for child in &format.children {
        let value = child.to_value();
        if counts[child.name.as_str()] == 1 {
            profile.insert(child.name.clone(), value);
            continue;
        }
        match profile.get_mut(&child.name) {
            Some(Value::Array(items)) => items.push(value),
            _ => {
                profile.insert(child.name.clone(), Value::Array(vec![value]));
            }
        }
    }
    Ok(Value::Object(profile))
}

/// Read `text` into an element tree under an unnamed document node.
fn read_elements(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack = vec![Element::default()];
    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(Element::named(e.name().as_ref())),
            Event::Empty(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Element::named(e.name().as_ref()));
                }
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(_) => {
                let Some(element) = stack.pop() else {
                    anyhow::bail!("Unbalanced closing tag");
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => anyhow::bail!("Unbalanced closing tag </{}>", element.name),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(document), true) => Ok(document),
        _ => anyhow::bail!("Unexpected end of XML document"),
    }
}

/// Load and parse a rule document.
pub fn load_rules(path: &Path) -> Result<RuleSet> {
    let value = load_json(path)?;
    let rules = RuleSet::from_value(&value)
        .with_context(|| format!("Invalid rule file: {:?}", path))?;
    tracing::info!("Loaded {} rules from {:?}", rules.len(), path);
    Ok(rules)
}

/// Load a job template. Templates must be JSON objects.
pub fn load_template(path: &Path) -> Result<Value> {
    let value = load_json(path)?;
    if !value.is_object() {
        anyhow::bail!("Template {:?} is not a JSON object", path);
    }
    Ok(value)
}

/// Write `value` as pretty-printed JSON, creating parent directories.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content + "\n")
        .with_context(|| format!("Failed to write file: {:?}", path))
}
