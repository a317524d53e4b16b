mod cli;

use profileforge::{
    batch::{self, BatchJob},
    config::{self, Config},
    loader, summary,
    validate::JobValidator,
};
use profileforge_engine::{ConversionEngine, ConversionStatus};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "profileforge=trace,profileforge_engine=trace,profileforge_rules=debug,profileforge_common=debug".to_string()
        } else {
            "profileforge=info,profileforge_engine=warn,profileforge_rules=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_config_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Convert {
            source,
            rules,
            template,
            output,
            report,
            schema,
        } => convert(
            &config,
            &source,
            rules,
            template,
            output.as_deref(),
            report.as_deref(),
            schema,
        ),
        Commands::Batch {
            input,
            output,
            rules,
            template,
            schema,
        } => run_batch(&config, &input, &output, rules, template, schema),
        Commands::Validate { job, schema } => validate_job(&config, &job, schema),
        Commands::CheckRules { rules } => check_rules(&config, &rules),
        Commands::Version => {
            println!("profileforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn require(path: Option<PathBuf>, fallback: &Option<PathBuf>, what: &str) -> Result<PathBuf> {
    path.or_else(|| fallback.clone()).with_context(|| {
        format!(
            "No {} file given; pass --{} or set paths.{} in the config",
            what, what, what
        )
    })
}

fn build_engine(config: &Config, rules_path: &Path) -> Result<ConversionEngine> {
    let rules = loader::load_rules(rules_path)?;
    Ok(ConversionEngine::with_config(rules, config.engine.clone()))
}

fn load_validator(path: Option<PathBuf>, config: &Config) -> Result<Option<JobValidator>> {
    path.or_else(|| config.paths.schema.clone())
        .map(|p| JobValidator::from_file(&p))
        .transpose()
}

fn convert(
    config: &Config,
    source_path: &Path,
    rules: Option<PathBuf>,
    template: Option<PathBuf>,
    output: Option<&Path>,
    report_path: Option<&Path>,
    schema: Option<PathBuf>,
) -> Result<()> {
    let rules_path = require(rules, &config.paths.rules, "rules")?;
    let engine = build_engine(config, &rules_path)?;

    let source = loader::load_profile(source_path)?;
    let template = match template.or_else(|| {
        batch::sibling_template(source_path, &config.batch.template_suffix)
            .or_else(|| config.paths.template.clone())
    }) {
        Some(path) => Some(loader::load_template(&path)?),
        None => None,
    };

    let conversion = engine
        .convert(&source, template.as_ref())
        .with_context(|| format!("Conversion of {:?} failed", source_path))?;

    match output {
        Some(path) => {
            loader::write_json(path, &conversion.target)?;
            tracing::info!("Wrote job to {:?}", path);
        }
        None => println!("{}", serde_json::to_string_pretty(&conversion.target)?),
    }
    if let Some(path) = report_path {
        loader::write_json(path, &conversion.report)?;
    }

    eprint!("{}", summary::format_report(&conversion.report));

    if let Some(validator) = load_validator(schema, config)? {
        let errors = validator.errors(&conversion.target);
        if !errors.is_empty() {
            for error in &errors {
                eprintln!("  schema: {}", error);
            }
            anyhow::bail!("Job does not match the schema ({} errors)", errors.len());
        }
        eprintln!("✓ Job matches the schema");
    }

    Ok(())
}

fn run_batch(
    config: &Config,
    input: &Path,
    output: &Path,
    rules: Option<PathBuf>,
    template: Option<PathBuf>,
    schema: Option<PathBuf>,
) -> Result<()> {
    let rules_path = require(rules, &config.paths.rules, "rules")?;
    let engine = build_engine(config, &rules_path)?;

    let default_template = match template.or_else(|| config.paths.template.clone()) {
        Some(path) => Some(loader::load_template(&path)?),
        None => None,
    };
    let validator = load_validator(schema, config)?;

    let job = BatchJob {
        engine: &engine,
        output_dir: output,
        default_template: default_template.as_ref(),
        validator: validator.as_ref(),
        config: &config.batch,
    };
    let outcomes = batch::run(&job, input, &[rules_path])?;

    print!("{}", summary::format_batch(&outcomes));

    let failed = outcomes
        .iter()
        .filter(|o| o.status == ConversionStatus::Failed)
        .count();
    if failed > 0 {
        anyhow::bail!("{} of {} profiles failed to convert", failed, outcomes.len());
    }
    Ok(())
}

fn validate_job(config: &Config, job_path: &Path, schema: Option<PathBuf>) -> Result<()> {
    let schema_path = require(schema, &config.paths.schema, "schema")?;
    let validator = JobValidator::from_file(&schema_path)?;
    let job = loader::load_json(job_path)?;

    println!("Validating job: {:?}", job_path);
    let errors = validator.errors(&job);
    if errors.is_empty() {
        println!("✓ Job is valid");
        return Ok(());
    }

    for error in &errors {
        println!("  ✗ {}", error);
    }
    anyhow::bail!("{} schema errors", errors.len())
}

fn check_rules(config: &Config, rules_path: &Path) -> Result<()> {
    let engine = build_engine(config, rules_path)?;
    let rules = engine.rules();

    println!(
        "✓ {} rules ({} dummy), {} transformer tables",
        rules.len(),
        rules.dummy_rules().count(),
        rules.transformers().names().count()
    );

    let unresolved = engine.unresolved_transforms();
    if unresolved.is_empty() {
        println!("All transforms resolve");
    } else {
        let mode = if config.engine.strict_transforms {
            "skipped"
        } else {
            "passed through"
        };
        println!("Unresolved transforms ({}):", mode);
        for name in unresolved {
            println!("  {}", name);
        }
    }
    Ok(())
}
