use async_trait::async_trait;
use comfy_table::Color as TableColor;
use indexmap::IndexMap;

use crate::context::ExecutionContext;
use crate::hooks::Hook;
use crate::output::{count_cell, create_table, cyan_header};

/// Command counts collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ran: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Per `(stage, job)` counts, in the order jobs were entered
    pub jobs: IndexMap<(String, String), JobStats>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    pub ran: usize,
    pub skipped: usize,
}

impl RunStats {
    fn job_mut(&mut self, ctx_stage: Option<&str>, ctx_job: Option<&str>) -> &mut JobStats {
        let key = (
            ctx_stage.unwrap_or_default().to_string(),
            ctx_job.unwrap_or_default().to_string(),
        );
        self.jobs.entry(key).or_default()
    }
}

/// Counts ran / skipped / failed commands and prints them once the run ends.
///
/// Commands printed in list or dry-run mode are not counted as ran.
#[derive(Debug, Default)]
pub struct PostSummary;

#[async_trait]
impl Hook for PostSummary {
    fn name(&self) -> &str {
        "post-summary"
    }

    async fn before_all(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        ctx.extensions.insert(RunStats::default());
        Ok(())
    }

    async fn before_job(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        let (stage, job) = coordinates(ctx);
        ctx.extensions
            .get_or_default::<RunStats>()
            .job_mut(stage.as_deref(), job.as_deref());
        Ok(())
    }

    async fn on_skip(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        let (stage, job) = coordinates(ctx);
        let stats = ctx.extensions.get_or_default::<RunStats>();
        stats.skipped += 1;
        stats.job_mut(stage.as_deref(), job.as_deref()).skipped += 1;
        Ok(())
    }

    async fn after_cmd(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        if ctx.mode().is_simulated() {
            return Ok(());
        }
        let (stage, job) = coordinates(ctx);
        let stats = ctx.extensions.get_or_default::<RunStats>();
        stats.ran += 1;
        stats.job_mut(stage.as_deref(), job.as_deref()).ran += 1;
        Ok(())
    }

    async fn on_error(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        ctx.extensions.get_or_default::<RunStats>().failed += 1;
        Ok(())
    }

    async fn after_all(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        let stats = ctx.extensions.get::<RunStats>().cloned().unwrap_or_default();
        let console = ctx.console();

        if !stats.jobs.is_empty() {
            console.out(render_table(&stats));
        }
        console.info(format!(
            "[post-summary] ran={}, skipped={}, failed={}",
            stats.ran, stats.skipped, stats.failed
        ));
        Ok(())
    }
}

fn coordinates(ctx: &ExecutionContext) -> (Option<String>, Option<String>) {
    (
        ctx.stage().map(str::to_string),
        ctx.job_name().map(str::to_string),
    )
}

fn render_table(stats: &RunStats) -> String {
    let mut table = create_table();
    table.set_header(cyan_header(&["Stage", "Job", "Ran", "Skipped"]));

    for ((stage, job), counts) in &stats.jobs {
        table.add_row(vec![
            comfy_table::Cell::new(stage),
            comfy_table::Cell::new(job),
            count_cell(counts.ran, TableColor::Green),
            count_cell(counts.skipped, TableColor::Yellow),
        ]);
    }

    table.to_string()
}
