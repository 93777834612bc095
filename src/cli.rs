use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use crate::config::Config;
use crate::engine::{Engine, RunSummary};
use crate::plugins::builtin_hooks;
use crate::selection::SelectionArgs;

#[derive(Parser, Debug)]
#[command(name = "local-run-ci")]
#[command(author, version, about = "Run .gitlab-ci.yml stages locally", long_about = None)]
#[command(after_help = "Ignore file: one regex per line, blank lines and `#` comments skipped.\n\
Patterns use Rust regex syntax: lookaround and backreferences are not supported.")]
pub struct Cli {
    /// Pipeline definition [default: .gitlab-ci.yml]
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Ignore rules file [default: local-build/.ci-ignore]
    #[arg(long, value_name = "PATH")]
    ignore_file: Option<PathBuf>,

    /// Only run these stages
    #[arg(long, value_name = "a,b,c", value_delimiter = ',')]
    only_stages: Option<Vec<String>>,

    /// Only run these jobs
    #[arg(long, value_name = "j1,j2", value_delimiter = ',')]
    only_jobs: Option<Vec<String>>,

    /// Skip commands containing this substring (repeatable)
    #[arg(long, value_name = "SUBSTRING")]
    skip: Vec<String>,

    /// Skip commands matching this regex (repeatable, no lookaround or backreferences)
    #[arg(long = "skip-re", value_name = "REGEX")]
    skip_re: Vec<String>,

    /// Only list the commands that would run or be skipped
    #[arg(long)]
    list: bool,

    /// Print commands without executing them
    #[arg(long)]
    dry_run: bool,

    /// Configuration file [default: local-ci.{toml,json,yaml,yml} if present]
    #[arg(short, long, value_name = "PATH", env = "LOCAL_CI_CONFIG")]
    config: Option<PathBuf>,

    /// Write the run summary as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, default_value_t = false)]
    pretty: bool,
}

/// Exit code for a command line clap rejected.
///
/// Help and version requests exit with `0`; usage errors exit with `1` so
/// they cannot be mistaken for a failed command's own exit code.
pub fn parse_exit_code(err: &clap::Error) -> i32 {
    if err.use_stderr() {
        1
    } else {
        0
    }
}

impl Cli {
    /// Merges flags over `config` into the selection for one run.
    ///
    /// Skip rules from the config come first, then those from the command
    /// line; the built-in install skips apply only if both are empty.
    fn selection(&self, config: &Config) -> Result<SelectionArgs> {
        let file = self.file.clone().unwrap_or_else(|| config.file.clone());
        let ignore_file = self
            .ignore_file
            .clone()
            .unwrap_or_else(|| config.ignore_file.clone());

        let mut args = SelectionArgs::new(file, ignore_file)
            .list(self.list)
            .dry_run(self.dry_run);

        if let Some(stages) = &self.only_stages {
            args = args.only_stages(stages.iter().map(|s| s.trim()));
        }
        if let Some(jobs) = &self.only_jobs {
            args = args.only_jobs(jobs.iter().map(|j| j.trim()));
        }

        for substring in config.skip.iter().chain(&self.skip) {
            args = args.skip(substring.as_str());
        }
        for pattern in config.skip_re.iter().chain(&self.skip_re) {
            args = args
                .skip_pattern(pattern)
                .with_context(|| format!("Invalid --skip-re value: {pattern}"))?;
        }

        Ok(args.with_default_skips())
    }

    pub async fn execute(&self) -> Result<RunSummary> {
        let config = Config::load(self.config.as_deref())?;
        let args = self.selection(&config)?;

        let mut engine = Engine::new(builtin_hooks(&config));
        if let Some(ci) = &config.ci {
            engine = engine.with_ci_flag(ci.clone());
        }
        info!("Hooks: {:?}", engine.hooks().names());

        let summary = engine.run(args).await?;

        if let Some(output_path) = &self.output {
            let json_output = if self.pretty {
                serde_json::to_string_pretty(&summary)?
            } else {
                serde_json::to_string(&summary)?
            };
            std::fs::write(output_path, json_output)
                .with_context(|| format!("Failed to write summary: {}", output_path.display()))?;
            info!("Summary written to: {}", output_path.display());
        }

        Ok(summary)
    }
}
