use profileforge_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

/// Default input files, used when the command line does not name them.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Rule document
    #[serde(default)]
    pub rules: Option<PathBuf>,

    /// Job template the conversion starts from
    #[serde(default)]
    pub template: Option<PathBuf>,

    /// JSON Schema produced jobs are validated against
    #[serde(default)]
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Suffix marking a per-profile template next to its source
    #[serde(default = "default_template_suffix")]
    pub template_suffix: String,

    /// Convert files on all cores
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Write `<name>.report.json` next to each converted job
    #[serde(default = "default_true")]
    pub write_reports: bool,
}

fn default_template_suffix() -> String {
    "-setting.json".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            template_suffix: default_template_suffix(),
            parallel: true,
            write_reports: true,
        }
    }
}
