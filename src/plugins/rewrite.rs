use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::hooks::Hook;

/// Replaces a command with another one when it matches exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub from: String,
    pub to: String,
}

/// Swaps commands that only make sense on the CI server for local variants.
#[derive(Debug, Default)]
pub struct Rewrite {
    rules: Vec<RewriteRule>,
}

impl Rewrite {
    pub fn new(rules: Vec<RewriteRule>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl Hook for Rewrite {
    fn name(&self) -> &str {
        "rewrite"
    }

    async fn before_cmd(&self, ctx: &mut ExecutionContext) -> anyhow::Result<Option<String>> {
        let Some(command) = ctx.command() else {
            return Ok(None);
        };

        let replacement = self
            .rules
            .iter()
            .find(|rule| rule.from == command)
            .map(|rule| rule.to.clone());

        if let Some(to) = &replacement {
            debug!("Rewriting `{command}` to `{to}`");
        }

        Ok(replacement)
    }
}
