use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::ignore::IgnoreRules;
use crate::output::Console;
use crate::pipeline::{JobSpec, PipelineDefinition};
use crate::process::{CommandResult, ProcessExecutor};
use crate::selection::{RunMode, SelectionArgs};

/// Type-keyed side table for state that hooks attach to a run.
///
/// Holds at most one value per type. Everything stored here lives exactly as
/// long as the run's [`ExecutionContext`].
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Inserts a value, returning the previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|previous| previous.downcast::<T>().ok().map(|boxed| *boxed))
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Returns the value of type `T`, inserting `T::default()` first if absent.
    pub fn get_or_default<T: Default + Send + Sync + 'static>(&mut self) -> &mut T {
        self.map
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()))
            .downcast_mut::<T>()
            .unwrap_or_else(|| unreachable!("extension stored under a foreign TypeId"))
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok().map(|boxed| *boxed))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

/// State shared by the engine and every hook over one run.
///
/// The loaded definition, ignore rules, selection and CI flag are fixed for
/// the run. The stage/job/command coordinates are filled in as the walk
/// descends and cleared on the way back up. Hooks keep their own state in
/// [`ExecutionContext::extensions`].
#[derive(Debug)]
pub struct ExecutionContext {
    console: Console,
    args: Arc<SelectionArgs>,
    definition: Arc<PipelineDefinition>,
    ignore: Arc<IgnoreRules>,
    executor: ProcessExecutor,
    ci_flag: String,
    stage: Option<String>,
    job: Option<String>,
    command: Option<String>,
    result: Option<CommandResult>,
    current_hook: Option<String>,
    pub extensions: Extensions,
}

impl ExecutionContext {
    pub fn new(
        args: SelectionArgs,
        definition: PipelineDefinition,
        ignore: IgnoreRules,
        executor: ProcessExecutor,
        ci_flag: impl Into<String>,
    ) -> Self {
        Self {
            console: Console,
            args: Arc::new(args),
            definition: Arc::new(definition),
            ignore: Arc::new(ignore),
            executor,
            ci_flag: ci_flag.into(),
            stage: None,
            job: None,
            command: None,
            result: None,
            current_hook: None,
            extensions: Extensions::default(),
        }
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn args(&self) -> &SelectionArgs {
        &self.args
    }

    pub fn mode(&self) -> RunMode {
        self.args.mode()
    }

    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    pub fn ignore_rules(&self) -> &IgnoreRules {
        &self.ignore
    }

    pub fn executor(&self) -> &ProcessExecutor {
        &self.executor
    }

    /// Value of the `CI` flag exported to every command of this run.
    pub fn ci_flag(&self) -> &str {
        &self.ci_flag
    }

    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    pub fn job_name(&self) -> Option<&str> {
        self.job.as_deref()
    }

    /// Definition of the job currently being walked.
    pub fn job(&self) -> Option<&JobSpec> {
        self.job
            .as_deref()
            .and_then(|name| self.definition.job(name))
    }

    /// Command currently being skipped or executed.
    ///
    /// During `beforeCmd` this reflects any rewrite made by an earlier hook.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Result of the last command; set for `afterCmd` and `onError`.
    pub fn result(&self) -> Option<&CommandResult> {
        self.result.as_ref()
    }

    /// Name of the hook currently being invoked.
    pub fn current_hook(&self) -> Option<&str> {
        self.current_hook.as_deref()
    }

    pub(crate) fn shared(&self) -> (Arc<SelectionArgs>, Arc<PipelineDefinition>, Arc<IgnoreRules>) {
        (
            Arc::clone(&self.args),
            Arc::clone(&self.definition),
            Arc::clone(&self.ignore),
        )
    }

    pub(crate) fn enter_stage(&mut self, stage: &str) {
        self.stage = Some(stage.to_string());
    }

    pub(crate) fn leave_stage(&mut self) {
        self.stage = None;
    }

    pub(crate) fn enter_job(&mut self, job: &str) {
        self.job = Some(job.to_string());
    }

    pub(crate) fn leave_job(&mut self) {
        self.job = None;
        self.clear_command();
    }

    pub(crate) fn set_command(&mut self, command: &str) {
        self.command = Some(command.to_string());
        self.result = None;
    }

    pub(crate) fn set_result(&mut self, result: CommandResult) {
        self.result = Some(result);
    }

    pub(crate) fn clear_command(&mut self) {
        self.command = None;
        self.result = None;
    }

    pub(crate) fn swap_current_hook(&mut self, hook: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.current_hook, hook)
    }
}
