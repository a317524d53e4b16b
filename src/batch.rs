//! Directory conversion.
//!
//! Every profile under the input directory is converted independently; a
//! failure in one file never stops the others.

use crate::config::BatchConfig;
use crate::loader::{
    has_profile_extension, load_profile, load_template, profile_stem, write_json,
};
use crate::summary::FileOutcome;
use crate::validate::JobValidator;
use anyhow::{Context, Result};
use profileforge_engine::ConversionEngine;
use rayon::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Inputs shared by every file of a batch.
pub struct BatchJob<'a> {
    pub engine: &'a ConversionEngine,
    pub output_dir: &'a Path,
    /// Template used when a profile has no template of its own.
    pub default_template: Option<&'a Value>,
    pub validator: Option<&'a JobValidator>,
    pub config: &'a BatchConfig,
}

/// Profiles under `dir`: `*.json` and `*.xml` files that are not templates,
/// reports or one of `exclude`. Sorted for stable output.
pub fn collect_sources(dir: &Path, config: &BatchConfig, exclude: &[PathBuf]) -> Vec<PathBuf> {
    let exclude: Vec<PathBuf> = exclude
        .iter()
        .filter_map(|p| p.canonicalize().ok())
        .collect();

    let mut sources: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            has_profile_extension(name)
                && !name.ends_with(&config.template_suffix)
                && !name.ends_with(".report.json")
        })
        .filter(|path| {
            path.canonicalize()
                .map(|p| !exclude.contains(&p))
                .unwrap_or(true)
        })
        .collect();
    sources.sort();
    sources
}

/// The per-profile template next to `source`, if there is one. XML profiles
/// share the JSON naming, so `27.format.xml` pairs with `27-setting.json`.
pub fn sibling_template(source: &Path, suffix: &str) -> Option<PathBuf> {
    let stem = profile_stem(source)?;
    let candidate = source.with_file_name(format!("{}{}", stem, suffix));
    candidate.is_file().then_some(candidate)
}

/// Convert every profile under `input_dir`.
pub fn run(job: &BatchJob<'_>, input_dir: &Path, exclude: &[PathBuf]) -> Result<Vec<FileOutcome>> {
    if !input_dir.is_dir() {
        anyhow::bail!("Input directory does not exist: {:?}", input_dir);
    }
    std::fs::create_dir_all(job.output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", job.output_dir))?;

    let sources = collect_sources(input_dir, job.config, exclude);
    info!("Converting {} profiles from {:?}", sources.len(), input_dir);

    let convert = |source: &PathBuf| {
        let name = output_name(input_dir, source);
        match convert_file(job, source, &name) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Failed to convert {:?}: {:#}", source, e);
                FileOutcome::failed(name, format!("{:#}", e))
            }
        }
    };

    let outcomes: Vec<FileOutcome> = if job.config.parallel {
        sources.par_iter().map(convert).collect()
    } else {
        sources.iter().map(convert).collect()
    };
    Ok(outcomes)
}

fn convert_file(job: &BatchJob<'_>, source_path: &Path, name: &str) -> Result<FileOutcome> {
    let source = load_profile(source_path)?;

    let own_template = match sibling_template(source_path, &job.config.template_suffix) {
        Some(path) => {
            debug!("Using template {:?} for {:?}", path, source_path);
            Some(load_template(&path)?)
        }
        None => None,
    };
    let template = own_template.as_ref().or(job.default_template);

    let conversion = job
        .engine
        .convert(&source, template)
        .with_context(|| format!("Conversion of {:?} failed", source_path))?;

    write_json(&job.output_dir.join(format!("{}.json", name)), &conversion.target)?;
    if job.config.write_reports {
        write_json(
            &job.output_dir.join(format!("{}.report.json", name)),
            &conversion.report,
        )?;
    }

    let schema_errors = match job.validator {
        Some(validator) => validator.errors(&conversion.target),
        None => Vec::new(),
    };
    if !schema_errors.is_empty() {
        let path = job.output_dir.join(format!("{}.err", name));
        std::fs::write(&path, schema_errors.join("\n") + "\n")
            .with_context(|| format!("Failed to write file: {:?}", path))?;
    }

    Ok(FileOutcome {
        name: name.to_string(),
        status: conversion.status(),
        unmapped: conversion.report.unmapped.len(),
        schema_errors: schema_errors.len(),
        error: None,
    })
}

/// Output base name: the source path relative to the input directory,
/// without its profile extension.
fn output_name(input_dir: &Path, source: &Path) -> String {
    let relative = source.strip_prefix(input_dir).unwrap_or(source);
    let relative = match profile_stem(relative) {
        Some(stem) => relative.with_file_name(stem),
        None => relative.to_path_buf(),
    };
    relative
        .to_string_lossy()
        .replace(std::path::MAIN_SEPARATOR, "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_json;
    use profileforge_engine::ConversionStatus;
    use profileforge_rules::RuleSet;
    use serde_json::json;
    use tempfile::tempdir;

    fn engine() -> ConversionEngine {
        let rules = RuleSet::from_value(&json!({
            "rules": [{"source": {"path": "notify", "type": "dummy"}}]
        }))
        .unwrap();
        ConversionEngine::new(rules)
    }

    #[test]
    fn test_collect_sources_skips_templates_and_reports() {
        let dir = tempdir().unwrap();
        for name in ["a.json", "a-setting.json", "b.report.json", "rules.json", "notes.txt"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let sources = collect_sources(
            dir.path(),
            &BatchConfig::default(),
            &[dir.path().join("rules.json")],
        );
        let names: Vec<_> = sources
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.json"]);
    }

    #[test]
    fn test_run_writes_outputs_and_isolates_failures() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        std::fs::write(
            input.path().join("hd.json"),
            r#"{"bitrate": "5000k", "notify": "x"}"#,
        )
        .unwrap();
        std::fs::write(
            input.path().join("hd-setting.json"),
            r#"{"Queue": "premium", "Settings": {"OutputGroups": [{}], "Inputs": [{}]}}"#,
        )
        .unwrap();
        std::fs::write(input.path().join("odd.json"), r#"{"watermark": "logo.png"}"#).unwrap();
        std::fs::write(input.path().join("broken.json"), "{not json").unwrap();

        let engine = engine();
        let config = BatchConfig {
            parallel: false,
            ..BatchConfig::default()
        };
        let job = BatchJob {
            engine: &engine,
            output_dir: output.path(),
            default_template: None,
            validator: None,
            config: &config,
        };
        let outcomes = run(&job, input.path(), &[]).unwrap();

        let status: Vec<_> = outcomes.iter().map(|o| (o.name.as_str(), o.status)).collect();
        assert_eq!(
            status,
            vec![
                ("broken", ConversionStatus::Failed),
                ("hd", ConversionStatus::FullyMapped),
                ("odd", ConversionStatus::Partial),
            ]
        );

        let hd = load_json(&output.path().join("hd.json")).unwrap();
        assert_eq!(hd["Queue"], json!("premium"));
        assert!(output.path().join("hd.report.json").is_file());
        assert!(!output.path().join("broken.json").exists());
    }

    #[test]
    fn test_xml_profiles_collected_and_paired() {
        let dir = tempdir().unwrap();
        for name in ["1.format.xml", "1-setting.json", "27.xml", "27-setting.json", "a.json"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let sources = collect_sources(dir.path(), &BatchConfig::default(), &[]);
        let names: Vec<_> = sources
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["1.format.xml", "27.xml", "a.json"]);

        let suffix = BatchConfig::default().template_suffix;
        assert_eq!(
            sibling_template(&sources[0], &suffix),
            Some(dir.path().join("1-setting.json"))
        );
        assert_eq!(
            sibling_template(&sources[1], &suffix),
            Some(dir.path().join("27-setting.json"))
        );
        assert_eq!(sibling_template(&sources[2], &suffix), None);

        assert_eq!(output_name(dir.path(), &sources[0]), "1");
        assert_eq!(
            output_name(dir.path(), &dir.path().join("mobile/low.format.xml")),
            "mobile/low"
        );
    }

    #[test]
    fn test_run_converts_xml_profile() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        std::fs::write(
            input.path().join("27.format.xml"),
            "<query><format><bitrate>800k</bitrate><notify>x</notify></format></query>",
        )
        .unwrap();
        std::fs::write(
            input.path().join("27-setting.json"),
            r#"{"Queue": "legacy", "Settings": {"OutputGroups": [{}], "Inputs": [{}]}}"#,
        )
        .unwrap();

        let engine = engine();
        let config = BatchConfig::default();
        let job = BatchJob {
            engine: &engine,
            output_dir: output.path(),
            default_template: None,
            validator: None,
            config: &config,
        };
        let outcomes = run(&job, input.path(), &[]).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].name, "27");
        let converted = load_json(&output.path().join("27.json")).unwrap();
        assert_eq!(converted["Queue"], json!("legacy"));
    }

    #[test]
    fn test_schema_errors_written() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        std::fs::write(input.path().join("job.json"), r#"{"bitrate": "800k"}"#).unwrap();

        let validator = JobValidator::new(&json!({"required": ["Role"]})).unwrap();
        let engine = engine();
        let config = BatchConfig::default();
        let job = BatchJob {
            engine: &engine,
            output_dir: output.path(),
            default_template: None,
            validator: Some(&validator),
            config: &config,
        };
        let outcomes = run(&job, input.path(), &[]).unwrap();

        assert_eq!(outcomes[0].schema_errors, 1);
        let errors = std::fs::read_to_string(output.path().join("job.err")).unwrap();
        assert!(errors.contains("Role"));
    }
}
