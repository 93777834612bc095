use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;

use crate::context::ExecutionContext;
use crate::error::{LocalCiError, Result};
use crate::hooks::{HookRegistry, LifecycleEvent};
use crate::ignore::IgnoreRules;
use crate::output::{bright_green, cyan, magenta, Console};
use crate::pipeline::{JobSpec, PipelineDefinition};
use crate::process::{CommandRunner, ProcessExecutor};
use crate::selection::{should_skip, RunMode, SelectionArgs};

#[cfg(test)]
mod tests;

/// Counts from a run that reached the end of its last stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub mode: RunMode,
    pub stages_run: usize,
    pub stages_skipped: usize,
    pub jobs_run: usize,
    pub jobs_skipped: usize,
    /// Commands executed, or printed in list / dry-run mode
    pub commands_run: usize,
    pub commands_skipped: usize,
}

impl RunSummary {
    fn new(mode: RunMode) -> Self {
        Self {
            mode,
            stages_run: 0,
            stages_skipped: 0,
            jobs_run: 0,
            jobs_skipped: 0,
            commands_run: 0,
            commands_skipped: 0,
        }
    }
}

/// Replays a pipeline definition locally.
///
/// Walks stages in declared order, the jobs of each stage in declaration
/// order and the commands of each job in order, firing lifecycle hooks at
/// every boundary. The first command that exits non-zero ends the run.
pub struct Engine {
    hooks: HookRegistry,
    executor: ProcessExecutor,
    ci_flag: Option<String>,
}

impl Engine {
    /// Creates an engine that runs commands through the system shell.
    pub fn new(hooks: HookRegistry) -> Self {
        Self {
            hooks,
            executor: ProcessExecutor::default(),
            ci_flag: None,
        }
    }

    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.executor = ProcessExecutor::new(runner);
        self
    }

    /// Fixes the `CI` value exported to commands instead of inheriting it.
    #[must_use]
    pub fn with_ci_flag(mut self, flag: impl Into<String>) -> Self {
        self.ci_flag = Some(flag.into());
        self
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Runs the pipeline selected by `args`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the ignore file holds an invalid pattern
    /// - the pipeline definition is missing, unparsable or has no `stages`
    /// - a hook fails
    /// - a command exits non-zero (`CommandFailure`); `onError` has fired but
    ///   `afterJob`, `afterStage` and `afterAll` have not
    pub async fn run(&self, args: SelectionArgs) -> Result<RunSummary> {
        let console = Console;

        let ignore = IgnoreRules::load(&args.ignore_file)?;
        if !ignore.is_empty() {
            console.info(format!(
                "Loaded {} ignore rules from {}",
                ignore.len(),
                args.ignore_file.display()
            ));
        }

        let definition = PipelineDefinition::load(&args.file)?;
        let file = args.file.clone();
        let mode = args.mode();

        let mut ctx = ExecutionContext::new(
            args,
            definition,
            ignore,
            self.executor.clone(),
            self.resolve_ci_flag(),
        );
        info!(
            "Running {} in {mode:?} mode with {} hooks",
            file.display(),
            self.hooks.len()
        );

        self.hooks.dispatch(LifecycleEvent::BeforeAll, &mut ctx).await?;
        console.out(format!("{}{}", bright_green("✅ Loaded "), cyan(file.display())));

        let (_, definition, _) = ctx.shared();
        let mut summary = RunSummary::new(mode);

        for stage in definition.stages() {
            self.run_stage(stage, &mut ctx, &mut summary).await?;
        }

        self.hooks.dispatch(LifecycleEvent::AfterAll, &mut ctx).await?;

        match mode {
            RunMode::List => console.out(format!(
                "\n{}",
                cyan("(--list mode: commands listed, nothing executed)")
            )),
            RunMode::DryRun => console.out(format!(
                "\n{}",
                cyan("(--dry-run mode: commands printed, nothing executed)")
            )),
            RunMode::Normal => console.out(format!("\n{}", bright_green("🎉 All stages completed"))),
        }

        Ok(summary)
    }

    async fn run_stage(
        &self,
        stage: &str,
        ctx: &mut ExecutionContext,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let (args, definition, _) = ctx.shared();
        let console = *ctx.console();

        if !args.stage_selected(stage) {
            console.notice(format!("\n⏭ Skipping stage: {stage} (not in --only-stages)"));
            summary.stages_skipped += 1;
            return Ok(());
        }

        console.out("");
        console.banner(&format!("🚩 Stage: {stage}"));
        ctx.enter_stage(stage);
        self.hooks.dispatch(LifecycleEvent::BeforeStage, ctx).await?;

        let jobs = definition.jobs_in_stage(stage);
        if jobs.is_empty() {
            console.notice(format!("(no jobs in stage {stage})"));
        }

        for job in jobs {
            self.run_job(stage, job, ctx, summary).await?;
        }

        self.hooks.dispatch(LifecycleEvent::AfterStage, ctx).await?;
        ctx.leave_stage();
        summary.stages_run += 1;

        Ok(())
    }

    async fn run_job(
        &self,
        stage: &str,
        job: &JobSpec,
        ctx: &mut ExecutionContext,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let (args, _, ignore) = ctx.shared();
        let console = *ctx.console();

        if !args.job_selected(&job.name) {
            console.notice(format!("\n⏭ Skipping job: {} (not in --only-jobs)", job.name));
            summary.jobs_skipped += 1;
            return Ok(());
        }

        console.out(format!("\n{}", magenta(format!("▶ Job: {}", job.name))));
        ctx.enter_job(&job.name);
        self.hooks.dispatch(LifecycleEvent::BeforeJob, ctx).await?;

        for original in &job.script {
            ctx.set_command(original);

            if should_skip(original, &args, &ignore) {
                console.skipped_command(original);
                summary.commands_skipped += 1;
                self.hooks.dispatch(LifecycleEvent::OnSkip, ctx).await?;
                continue;
            }

            self.hooks.rewrite_command(ctx).await?;
            let command = ctx.command().unwrap_or(original).to_string();

            let result = ctx
                .executor()
                .run(&command, ctx.mode(), ctx.ci_flag())
                .await?;
            summary.commands_run += 1;

            ctx.set_result(result);
            self.hooks.dispatch(LifecycleEvent::AfterCmd, ctx).await?;

            if !result.is_success() {
                debug!("{stage}/{} failed with exit code {}", job.name, result.code);
                self.hooks.dispatch(LifecycleEvent::OnError, ctx).await?;
                return Err(LocalCiError::CommandFailure {
                    stage: stage.to_string(),
                    job: job.name.clone(),
                    command,
                    code: result.code,
                });
            }
        }

        ctx.clear_command();
        self.hooks.dispatch(LifecycleEvent::AfterJob, ctx).await?;
        console.success(format!("✅ Job {} done", job.name));
        ctx.leave_job();
        summary.jobs_run += 1;

        Ok(())
    }

    fn resolve_ci_flag(&self) -> String {
        self.ci_flag.clone().unwrap_or_else(|| {
            std::env::var("CI")
                .ok()
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "true".to_string())
        })
    }
}
