//! Replays the stages and jobs of a `.gitlab-ci.yml` on the local machine.
//!
//! The [`Engine`] walks stages in declaration order, runs each job's script
//! through a shell, and fires [`Hook`]s at every step of the lifecycle.
//! Commands can be filtered by stage, job, skip rules and an ignore file.

pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod ignore;
pub mod output;
pub mod pipeline;
pub mod plugins;
pub mod process;
pub mod selection;

pub use config::Config;
pub use context::{ExecutionContext, Extensions};
pub use engine::{Engine, RunSummary};
pub use error::{LocalCiError, Result};
pub use hooks::{FnHook, Hook, HookRegistry, LifecycleEvent};
pub use ignore::IgnoreRules;
pub use pipeline::{JobSpec, PipelineDefinition};
pub use process::{CommandResult, CommandRunner, ProcessExecutor, ShellRunner};
pub use selection::{should_skip, RunMode, SelectionArgs};
