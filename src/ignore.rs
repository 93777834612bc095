use std::fs;
use std::path::Path;

use log::debug;
use regex::Regex;

use crate::error::{LocalCiError, Result};

/// Compiled ignore rules.
///
/// Loaded once per run from the ignore file (one regular expression per
/// line, `#` comments and blank lines skipped) and immutable afterwards.
/// A command matching any rule is always skipped.
///
/// Rules use the `regex` crate's syntax, which has no lookaround or
/// backreferences; such lines fail to load.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<Regex>,
}

impl IgnoreRules {
    /// Loads rules from `path`. A missing file yields an empty rule set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` for the first line that is not a valid regex,
    /// or an IO error if the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No ignore file at {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let rules = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                Regex::new(line).map_err(|source| LocalCiError::InvalidPattern {
                    pattern: line.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Returns true if any rule matches somewhere in `command`.
    pub fn is_match(&self, command: &str) -> bool {
        self.rules.iter().any(|rule| rule.is_match(command))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
