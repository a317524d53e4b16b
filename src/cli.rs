use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "profileforge")]
#[command(
    author,
    version,
    about = "Convert legacy transcoding profiles into cloud transcoding jobs"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a single profile into a job
    Convert {
        /// Legacy profile (JSON or XML)
        #[arg(required = true)]
        source: PathBuf,

        /// Rule document (defaults to paths.rules from the config)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Job template to start from
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Write the job here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the conversion report here
        #[arg(long)]
        report: Option<PathBuf>,

        /// Validate the job against this JSON Schema
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Convert every profile in a directory
    Batch {
        /// Directory holding legacy profiles
        #[arg(required = true)]
        input: PathBuf,

        /// Directory to write jobs and reports into
        #[arg(long = "out", required = true)]
        output: PathBuf,

        /// Rule document (defaults to paths.rules from the config)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Template for profiles without their own
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Validate every job against this JSON Schema
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Validate a job against a JSON Schema
    Validate {
        /// Job file to validate
        #[arg(required = true)]
        job: PathBuf,

        /// Schema to validate against (defaults to paths.schema from the config)
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Parse a rule document and list transforms it cannot resolve
    CheckRules {
        /// Rule document to check
        #[arg(required = true)]
        rules: PathBuf,
    },

    /// Display version information
    Version,
}
