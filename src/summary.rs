//! Human-readable conversion summaries.

use profileforge_engine::{ConversionReport, ConversionStatus, MappingOutcome};
use std::fmt::Write;

/// Outcome of converting one profile, as listed in batch summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub name: String,
    pub status: ConversionStatus,
    pub unmapped: usize,
    pub schema_errors: usize,
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn failed<S: Into<String>>(name: S, error: String) -> Self {
        Self {
            name: name.into(),
            status: ConversionStatus::Failed,
            unmapped: 0,
            schema_errors: 0,
            error: Some(error),
        }
    }
}

/// Multi-line summary of one report: status, counts per outcome, then every
/// unmapped parameter.
pub fn format_report(report: &ConversionReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Status: {}", report.status());
    let _ = writeln!(out, "  {}", report.summary());

    for (outcome, count) in &report.counts {
        if *outcome != MappingOutcome::Mapped {
            let _ = writeln!(out, "  {}: {}", outcome, count);
        }
    }

    if !report.unmapped.is_empty() {
        let _ = writeln!(out, "\nUnmapped parameters: {}", report.unmapped.len());
        for param in &report.unmapped {
            let _ = writeln!(out, "  {} = {}", param.path, param.value);
        }
    }
    out
}

/// Table of batch results followed by totals.
pub fn format_batch(outcomes: &[FileOutcome]) -> String {
    let mut out = String::new();
    let width = outcomes.iter().map(|o| o.name.len()).max().unwrap_or(4).max(4);

    for outcome in outcomes {
        let mark = match outcome.status {
            ConversionStatus::FullyMapped if outcome.schema_errors == 0 => "✓",
            ConversionStatus::Failed => "✗",
            _ => "~",
        };
        let _ = write!(
            out,
            "{} {:width$}  {}",
            mark,
            outcome.name,
            outcome.status,
            width = width
        );
        if outcome.unmapped > 0 {
            let _ = write!(out, ", {} unmapped", outcome.unmapped);
        }
        if outcome.schema_errors > 0 {
            let _ = write!(out, ", {} schema errors", outcome.schema_errors);
        }
        if let Some(error) = &outcome.error {
            let _ = write!(out, ": {}", error);
        }
        out.push('\n');
    }

    let count = |status: ConversionStatus| outcomes.iter().filter(|o| o.status == status).count();
    let _ = writeln!(
        out,
        "\n{} files: {} fully mapped, {} partial, {} failed",
        outcomes.len(),
        count(ConversionStatus::FullyMapped),
        count(ConversionStatus::Partial),
        count(ConversionStatus::Failed)
    );
    out
}
