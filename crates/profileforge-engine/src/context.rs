//! Per-call conversion state.

use crate::alternate::AudioSelectorMap;
use crate::patch::SettingsPatch;
use crate::report::{ConversionReport, MappingOutcome, MappingRecord};
use profileforge_common::path::join;
use profileforge_common::{Document, Value};
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

/// Everything one `convert` call reads and mutates.
///
/// The source is borrowed for the whole call; the target, the processed
/// set and the report are owned and handed back when the call ends.
#[derive(Debug)]
pub struct ConversionContext<'s> {
    pub source: &'s Document,
    pub target: Document,
    pub processed: HashSet<String>,
    pub report: ConversionReport,
    pub audio_selectors: AudioSelectorMap,
    in_stream_expansion: bool,
}

impl<'s> ConversionContext<'s> {
    pub fn new(source: &'s Document, target: Document) -> Self {
        Self {
            source,
            target,
            processed: HashSet::new(),
            report: ConversionReport::new(),
            audio_selectors: AudioSelectorMap::default(),
            in_stream_expansion: false,
        }
    }

    /// A context for one rendition. It shares the selector map and the
    /// expansion flag with its parent but nothing else.
    pub fn child<'c>(&self, source: &'c Document, target: Document) -> ConversionContext<'c> {
        ConversionContext {
            source,
            target,
            processed: HashSet::new(),
            report: ConversionReport::new(),
            audio_selectors: self.audio_selectors.clone(),
            in_stream_expansion: self.in_stream_expansion,
        }
    }

    pub fn is_processed(&self, path: &str) -> bool {
        self.processed.contains(path)
    }

    /// Mark `path` handled. Returns false if it already was.
    pub fn mark_processed<S: Into<String>>(&mut self, path: S) -> bool {
        self.processed.insert(path.into())
    }

    pub fn record(&mut self, record: MappingRecord) {
        self.report.record(record);
    }

    /// Merge `patch` into the output at `output_path` and account for the
    /// source fields it consumed.
    pub fn apply_patch(&mut self, output_path: &str, patch: &SettingsPatch) {
        if !patch.values.as_map().is_empty() {
            let at = join(output_path, &patch.base);
            if let Err(e) = self.target.set(&at, patch.values.clone().into_value()) {
                tracing::warn!("Could not write settings at {}: {}", at, e);
            }
        }

        for consumed in &patch.consumed {
            let source_value = self.source.get(consumed.field).cloned().unwrap_or(Value::Null);
            self.mark_processed(consumed.field);
            let record = match &consumed.mapped {
                Some((key, value)) => MappingRecord::mapped(
                    consumed.field,
                    source_value,
                    patch.target_path(output_path, key),
                    value.clone(),
                ),
                None => MappingRecord::with_outcome(
                    consumed.field,
                    source_value,
                    None,
                    MappingOutcome::IgnoredUnsupported,
                ),
            };
            self.record(record);
        }
    }

    pub fn source_value(&self, path: &str) -> Option<&'s Value> {
        self.source.get(path)
    }

    pub fn in_stream_expansion(&self) -> bool {
        self.in_stream_expansion
    }

    /// Raise the expansion flag for as long as the returned guard lives.
    pub fn enter_stream_expansion(&mut self) -> ExpansionGuard<'_, 's> {
        self.in_stream_expansion = true;
        ExpansionGuard { context: self }
    }
}

/// Clears the stream-expansion flag when dropped, on every exit path.
pub struct ExpansionGuard<'a, 's> {
    context: &'a mut ConversionContext<'s>,
}

impl<'s> Deref for ExpansionGuard<'_, 's> {
    type Target = ConversionContext<'s>;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl DerefMut for ExpansionGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl Drop for ExpansionGuard<'_, '_> {
    fn drop(&mut self) {
        self.context.in_stream_expansion = false;
    }
}
