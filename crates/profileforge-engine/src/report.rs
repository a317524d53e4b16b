//! Conversion report: what happened to every source parameter.

use profileforge_common::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of one mapping attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingOutcome {
    Mapped,
    /// Marked handled by a dummy rule.
    Dummy,
    /// An enumerated transform had no entry for the value.
    SkippedNoMatch,
    SkippedRegexMismatch,
    SkippedCondition,
    SkippedAbsent,
    SkippedUnresolvedTransform,
    SkippedError,
    /// Consumed on purpose; the target format has no equivalent.
    IgnoredUnsupported,
}

impl MappingOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mapped => "MAPPED",
            Self::Dummy => "DUMMY",
            Self::SkippedNoMatch => "SKIPPED_NO_MATCH",
            Self::SkippedRegexMismatch => "SKIPPED_REGEX_MISMATCH",
            Self::SkippedCondition => "SKIPPED_CONDITION",
            Self::SkippedAbsent => "SKIPPED_ABSENT",
            Self::SkippedUnresolvedTransform => "SKIPPED_UNRESOLVED_TRANSFORM",
            Self::SkippedError => "SKIPPED_ERROR",
            Self::IgnoredUnsupported => "IGNORED_UNSUPPORTED",
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::SkippedNoMatch
                | Self::SkippedRegexMismatch
                | Self::SkippedCondition
                | Self::SkippedAbsent
                | Self::SkippedUnresolvedTransform
                | Self::SkippedError
        )
    }
}

impl fmt::Display for MappingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt to map a source parameter onto a target path.
///
/// For anything other than [`MappingOutcome::Mapped`] the target value is
/// the outcome's sentinel string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingRecord {
    pub source_path: String,
    pub source_value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    pub target_value: Value,
    pub outcome: MappingOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl MappingRecord {
    pub fn mapped<S: Into<String>, T: Into<String>>(
        source_path: S,
        source_value: Value,
        target_path: T,
        target_value: Value,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            source_value,
            target_path: Some(target_path.into()),
            target_value,
            outcome: MappingOutcome::Mapped,
            reason: None,
        }
    }

    pub fn with_outcome<S: Into<String>>(
        source_path: S,
        source_value: Value,
        target_path: Option<String>,
        outcome: MappingOutcome,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            source_value,
            target_path,
            target_value: Value::String(outcome.as_str().to_string()),
            outcome,
            reason: None,
        }
    }

    /// A field that shaped the output without being copied anywhere.
    pub fn structural<S: Into<String>, R: Into<String>>(
        source_path: S,
        source_value: Value,
        reason: R,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            target_value: source_value.clone(),
            source_value,
            target_path: None,
            outcome: MappingOutcome::Mapped,
            reason: Some(reason.into()),
        }
    }

    pub fn because<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// A source leaf no rule or built-in handler touched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmappedParam {
    pub path: String,
    pub value: Value,
}

/// Overall classification of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    FullyMapped,
    Partial,
    Failed,
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullyMapped => write!(f, "fully mapped"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionReport {
    pub mapped: Vec<MappingRecord>,
    pub unmapped: Vec<UnmappedParam>,
    pub counts: BTreeMap<MappingOutcome, usize>,
}

impl ConversionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: MappingRecord) {
        *self.counts.entry(record.outcome).or_default() += 1;
        self.mapped.push(record);
    }

    pub fn unmapped<S: Into<String>>(&mut self, path: S, value: Value) {
        self.unmapped.push(UnmappedParam {
            path: path.into(),
            value,
        });
    }

    pub fn count(&self, outcome: MappingOutcome) -> usize {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    pub fn skipped(&self) -> usize {
        self.counts
            .iter()
            .filter(|(outcome, _)| outcome.is_skip())
            .map(|(_, n)| n)
            .sum()
    }

    /// Records whose source path is exactly `path`.
    pub fn records_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a MappingRecord> {
        self.mapped.iter().filter(move |r| r.source_path == path)
    }

    pub fn is_unmapped(&self, path: &str) -> bool {
        self.unmapped.iter().any(|u| u.path == path)
    }

    pub fn status(&self) -> ConversionStatus {
        if self.unmapped.is_empty() {
            ConversionStatus::FullyMapped
        } else {
            ConversionStatus::Partial
        }
    }

    /// Fold a rendition's report into this one.
    ///
    /// Source paths gain `source_prefix`; target paths starting with
    /// `target_from` are rewritten to start with `target_to`.
    pub fn absorb(
        &mut self,
        child: ConversionReport,
        source_prefix: &str,
        target_from: &str,
        target_to: &str,
    ) {
        for mut record in child.mapped {
            record.source_path = format!("{}{}", source_prefix, record.source_path);
            if let Some(path) = record.target_path.as_mut() {
                if let Some(rest) = path.strip_prefix(target_from) {
                    *path = format!("{}{}", target_to, rest);
                }
            }
            self.record(record);
        }
        for param in child.unmapped {
            self.unmapped(format!("{}{}", source_prefix, param.path), param.value);
        }
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} mapped, {} skipped, {} ignored, {} unmapped",
            self.count(MappingOutcome::Mapped),
            self.skipped(),
            self.count(MappingOutcome::IgnoredUnsupported),
            self.unmapped.len()
        )
    }
}
