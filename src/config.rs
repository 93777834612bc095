use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::plugins::RewriteRule;
use crate::selection::{DEFAULT_IGNORE_FILE, DEFAULT_PIPELINE_FILE};

/// Configuration file structure for local-run-ci.
///
/// Lets a project pin its pipeline file, ignore file, extra skip rules and
/// built-in hooks instead of repeating them on every invocation.
/// Command-line flags take precedence over anything set here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Pipeline definition to replay
    #[serde(default = "default_pipeline_file")]
    pub file: PathBuf,

    /// Ignore rules file
    #[serde(default = "default_ignore_file")]
    pub ignore_file: PathBuf,

    /// Skip commands containing any of these substrings
    #[serde(default)]
    pub skip: Vec<String>,

    /// Skip commands matching any of these patterns
    #[serde(default)]
    pub skip_re: Vec<String>,

    /// Value exported as `CI` to every command (defaults to the inherited
    /// `CI` variable, else "true")
    #[serde(default)]
    pub ci: Option<String>,

    /// Built-in hooks
    #[serde(default)]
    pub hooks: HooksConfig,

    /// Exact command replacements applied by the rewrite hook
    #[serde(default)]
    pub rewrite: Vec<RewriteRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HooksConfig {
    /// Report the CI flag before the run
    #[serde(default = "enabled")]
    pub pre_env: bool,

    /// Print ran/skipped/failed counts after the run
    #[serde(default = "enabled")]
    pub post_summary: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file: default_pipeline_file(),
            ignore_file: default_ignore_file(),
            skip: Vec::new(),
            skip_re: Vec::new(),
            ci: None,
            hooks: HooksConfig::default(),
            rewrite: Vec::new(),
        }
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            pre_env: true,
            post_summary: true,
        }
    }
}

fn default_pipeline_file() -> PathBuf {
    PathBuf::from(DEFAULT_PIPELINE_FILE)
}

fn default_ignore_file() -> PathBuf {
    PathBuf::from(DEFAULT_IGNORE_FILE)
}

fn enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path (must exist)
    /// 2. ./local-ci.toml
    /// 3. ./local-ci.json
    /// 4. ./local-ci.yaml
    /// 5. ./local-ci.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            return Self::load_from_path(path);
        }

        let candidates = ["local-ci.toml", "local-ci.json", "local-ci.yaml", "local-ci.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }
}
