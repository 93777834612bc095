use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use tokio::process::Command;

use crate::error::Result;
use crate::output::Console;
use crate::selection::RunMode;

/// Outcome of one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub code: i32,
    /// False when the command was only printed (list / dry-run).
    pub executed: bool,
}

impl CommandResult {
    pub fn simulated() -> Self {
        Self {
            code: 0,
            executed: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Spawns a command for real.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` to completion and returns its exit status.
    ///
    /// `ci_flag` is exported to the child as the `CI` environment variable.
    async fn run(&self, command: &str, ci_flag: &str) -> Result<CommandResult>;
}

/// Runs commands through the platform shell with inherited stdio.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, ci_flag: &str) -> Result<CommandResult> {
        let mut cmd = shell_command(command);
        cmd.env("CI", ci_flag);

        let status = cmd.status().await?;
        debug!("`{command}` exited with {status}");

        // Killed by a signal: no exit code to propagate.
        let code = status.code().unwrap_or(1);

        Ok(CommandResult {
            code,
            executed: true,
        })
    }
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

/// Echoes commands and hands them to a [`CommandRunner`] unless the run
/// only simulates execution.
#[derive(Clone)]
pub struct ProcessExecutor {
    runner: Arc<dyn CommandRunner>,
    console: Console,
}

impl ProcessExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            console: Console,
        }
    }

    /// Echoes `command`, then spawns it in normal mode.
    ///
    /// In list and dry-run mode the runner is never called and the result is
    /// a synthetic success with `executed == false`.
    pub async fn run(&self, command: &str, mode: RunMode, ci_flag: &str) -> Result<CommandResult> {
        self.console.command(command);

        if mode.is_simulated() {
            return Ok(CommandResult::simulated());
        }

        self.runner.run(command, ci_flag).await
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(Arc::new(ShellRunner))
    }
}

impl std::fmt::Debug for ProcessExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessExecutor").finish_non_exhaustive()
    }
}
