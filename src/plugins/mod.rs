//! Built-in hooks.
//!
//! These are ordinary [`Hook`](crate::hooks::Hook) implementations; projects
//! can register their own alongside or instead of them.

mod post_summary;
mod pre_env;
mod rewrite;

pub use post_summary::{JobStats, PostSummary, RunStats};
pub use pre_env::PreEnv;
pub use rewrite::{Rewrite, RewriteRule};

use crate::config::Config;
use crate::hooks::HookRegistry;

/// Builds the hook registry enabled by `config`.
///
/// Registration order is pre-env, post-summary, rewrite.
pub fn builtin_hooks(config: &Config) -> HookRegistry {
    let mut hooks = HookRegistry::new();

    if config.hooks.pre_env {
        hooks.register(PreEnv);
    }
    if config.hooks.post_summary {
        hooks.register(PostSummary);
    }
    if !config.rewrite.is_empty() {
        hooks.register(Rewrite::new(config.rewrite.clone()));
    }

    hooks
}
