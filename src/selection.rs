use std::path::PathBuf;

use indexmap::IndexSet;
use regex::Regex;
use serde::Serialize;

use crate::error::{LocalCiError, Result};
use crate::ignore::IgnoreRules;

pub const DEFAULT_PIPELINE_FILE: &str = ".gitlab-ci.yml";
pub const DEFAULT_IGNORE_FILE: &str = "local-build/.ci-ignore";

/// Package-manager install invocations skipped when no explicit skip rule is
/// given. Dependencies are assumed to be installed already on a local machine.
pub const DEFAULT_SKIP_PATTERNS: [&str; 3] = [
    r"^npm (i|ci)(\s|$)",
    r"^yarn( install)?(\s|$)",
    r"^pnpm i(\s|$)",
];

/// How commands are treated once selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Commands are spawned.
    Normal,
    /// Commands are echoed, not spawned.
    DryRun,
    /// Only lists the commands that would run or be skipped.
    List,
}

impl RunMode {
    /// True when commands are only printed.
    pub fn is_simulated(self) -> bool {
        !matches!(self, Self::Normal)
    }
}

/// User selection for one run: which stages and jobs to enter, which
/// commands to skip, and whether to execute at all.
#[derive(Debug, Clone)]
pub struct SelectionArgs {
    pub file: PathBuf,
    pub ignore_file: PathBuf,
    pub only_stages: Option<IndexSet<String>>,
    pub only_jobs: Option<IndexSet<String>>,
    pub skip: Vec<String>,
    pub skip_re: Vec<Regex>,
    pub list: bool,
    pub dry_run: bool,
}

impl Default for SelectionArgs {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_PIPELINE_FILE),
            ignore_file: PathBuf::from(DEFAULT_IGNORE_FILE),
            only_stages: None,
            only_jobs: None,
            skip: Vec::new(),
            skip_re: Vec::new(),
            list: false,
            dry_run: false,
        }
    }
}

impl SelectionArgs {
    pub fn new(file: impl Into<PathBuf>, ignore_file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            ignore_file: ignore_file.into(),
            ..Self::default()
        }
    }

    /// Restricts the run to the given stages. Empty names are dropped.
    #[must_use]
    pub fn only_stages<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only_stages = Some(non_empty_set(stages));
        self
    }

    /// Restricts the run to the given jobs. Empty names are dropped.
    #[must_use]
    pub fn only_jobs<I, S>(mut self, jobs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only_jobs = Some(non_empty_set(jobs));
        self
    }

    #[must_use]
    pub fn skip(mut self, substring: impl Into<String>) -> Self {
        self.skip.push(substring.into());
        self
    }

    /// Adds a skip pattern.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` if `pattern` is not a valid regex.
    pub fn skip_pattern(mut self, pattern: &str) -> Result<Self> {
        self.skip_re.push(compile(pattern)?);
        Ok(self)
    }

    #[must_use]
    pub fn list(mut self, list: bool) -> Self {
        self.list = list;
        self
    }

    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Installs the built-in install-skip patterns, but only if no explicit
    /// skip substring or pattern was supplied. Explicit rules replace the
    /// defaults rather than extend them.
    #[must_use]
    pub fn with_default_skips(mut self) -> Self {
        if self.skip.is_empty() && self.skip_re.is_empty() {
            self.skip_re = default_skip_patterns();
        }
        self
    }

    pub fn mode(&self) -> RunMode {
        if self.list {
            RunMode::List
        } else if self.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Normal
        }
    }

    pub fn stage_selected(&self, stage: &str) -> bool {
        self.only_stages
            .as_ref()
            .map_or(true, |stages| stages.contains(stage))
    }

    pub fn job_selected(&self, job: &str) -> bool {
        self.only_jobs
            .as_ref()
            .map_or(true, |jobs| jobs.contains(job))
    }
}

/// Decides whether a single command is skipped.
///
/// First match wins: ignore rules, then skip substrings, then skip patterns.
/// Stage and job filtering happens before this is consulted.
pub fn should_skip(command: &str, args: &SelectionArgs, ignore: &IgnoreRules) -> bool {
    if command.is_empty() {
        return false;
    }

    if ignore.is_match(command) {
        return true;
    }

    if args
        .skip
        .iter()
        .any(|s| !s.is_empty() && command.contains(s.as_str()))
    {
        return true;
    }

    args.skip_re.iter().any(|re| re.is_match(command))
}

pub fn default_skip_patterns() -> Vec<Regex> {
    DEFAULT_SKIP_PATTERNS
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| LocalCiError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn non_empty_set<I, S>(items: I) -> IndexSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items
        .into_iter()
        .map(Into::into)
        .filter(|item: &String| !item.is_empty())
        .collect()
}
