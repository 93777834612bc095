//! Lifecycle hooks.
//!
//! A [`Hook`] implements only the events it cares about; every other event
//! is a no-op. The [`HookRegistry`] invokes hooks strictly one after another
//! in registration order, handing each the same mutable
//! [`ExecutionContext`], so a hook can rely on state written by the hooks
//! registered before it.
//!
//! Events fire in this order over one run:
//!
//! ```text
//! beforeAll
//!   beforeStage
//!     beforeJob
//!       onSkip | beforeCmd -> (execute) -> afterCmd [-> onError]
//!     afterJob
//!   afterStage
//! afterAll
//! ```
//!
//! A hook returning an error aborts the run.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use async_trait::async_trait;
use log::debug;

use crate::context::ExecutionContext;
use crate::error::{LocalCiError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    BeforeAll,
    BeforeStage,
    BeforeJob,
    OnSkip,
    BeforeCmd,
    AfterCmd,
    OnError,
    AfterJob,
    AfterStage,
    AfterAll,
}

impl LifecycleEvent {
    pub const ALL: [Self; 10] = [
        Self::BeforeAll,
        Self::BeforeStage,
        Self::BeforeJob,
        Self::OnSkip,
        Self::BeforeCmd,
        Self::AfterCmd,
        Self::OnError,
        Self::AfterJob,
        Self::AfterStage,
        Self::AfterAll,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::BeforeAll => "beforeAll",
            Self::BeforeStage => "beforeStage",
            Self::BeforeJob => "beforeJob",
            Self::OnSkip => "onSkip",
            Self::BeforeCmd => "beforeCmd",
            Self::AfterCmd => "afterCmd",
            Self::OnError => "onError",
            Self::AfterJob => "afterJob",
            Self::AfterStage => "afterStage",
            Self::AfterAll => "afterAll",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LifecycleEvent {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|event| event.name() == s)
            .ok_or_else(|| anyhow!("unknown lifecycle event `{s}`"))
    }
}

/// An extension observing or altering the pipeline walk.
///
/// Every method defaults to a no-op. `before_cmd` is the only event with a
/// return contract: a non-empty string replaces the command about to run.
#[async_trait]
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;

    async fn before_all(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn before_stage(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn before_job(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_skip(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn before_cmd(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    async fn after_cmd(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_error(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_job(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_stage(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_all(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        Ok(())
    }
}

type HookFn = Box<dyn Fn(&mut ExecutionContext) -> anyhow::Result<Option<String>> + Send + Sync>;

/// A hook assembled from closures keyed by event.
///
/// ```
/// use local_run_ci::{FnHook, LifecycleEvent};
///
/// let hook = FnHook::new("replace-build")
///     .rewrite(|ctx| {
///         Ok((ctx.command() == Some("npm build prod")).then(|| "npm build test".to_string()))
///     })
///     .on(LifecycleEvent::AfterAll, |ctx| {
///         ctx.console().info("done");
///         Ok(())
///     });
/// # let _ = hook;
/// ```
pub struct FnHook {
    name: String,
    handlers: HashMap<LifecycleEvent, HookFn>,
}

impl FnHook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler for `event`, replacing any previous one.
    #[must_use]
    pub fn on<F>(mut self, event: LifecycleEvent, handler: F) -> Self
    where
        F: Fn(&mut ExecutionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers
            .insert(event, Box::new(move |ctx: &mut ExecutionContext| {
                handler(ctx).map(|()| None)
            }));
        self
    }

    /// Registers a handler by event name (`"beforeAll"`, `"onSkip"`, ...).
    ///
    /// # Errors
    ///
    /// Returns an error if `event` is not a known lifecycle event.
    pub fn on_named<F>(self, event: &str, handler: F) -> anyhow::Result<Self>
    where
        F: Fn(&mut ExecutionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let event = event.parse()?;
        Ok(self.on(event, handler))
    }

    /// Registers a `beforeCmd` handler that may return a replacement command.
    #[must_use]
    pub fn rewrite<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut ExecutionContext) -> anyhow::Result<Option<String>> + Send + Sync + 'static,
    {
        self.handlers
            .insert(LifecycleEvent::BeforeCmd, Box::new(handler));
        self
    }

    fn call(&self, event: LifecycleEvent, ctx: &mut ExecutionContext) -> anyhow::Result<Option<String>> {
        match self.handlers.get(&event) {
            Some(handler) => handler(ctx),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Hook for FnHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn before_all(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.call(LifecycleEvent::BeforeAll, ctx).map(drop)
    }

    async fn before_stage(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.call(LifecycleEvent::BeforeStage, ctx).map(drop)
    }

    async fn before_job(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.call(LifecycleEvent::BeforeJob, ctx).map(drop)
    }

    async fn on_skip(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.call(LifecycleEvent::OnSkip, ctx).map(drop)
    }

    async fn before_cmd(&self, ctx: &mut ExecutionContext) -> anyhow::Result<Option<String>> {
        self.call(LifecycleEvent::BeforeCmd, ctx)
    }

    async fn after_cmd(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.call(LifecycleEvent::AfterCmd, ctx).map(drop)
    }

    async fn on_error(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.call(LifecycleEvent::OnError, ctx).map(drop)
    }

    async fn after_job(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.call(LifecycleEvent::AfterJob, ctx).map(drop)
    }

    async fn after_stage(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.call(LifecycleEvent::AfterStage, ctx).map(drop)
    }

    async fn after_all(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.call(LifecycleEvent::AfterAll, ctx).map(drop)
    }
}

/// Ordered set of hooks for one engine.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Box<dyn Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H: Hook + 'static>(&mut self, hook: H) {
        self.hooks.push(Box::new(hook));
    }

    #[must_use]
    pub fn with<H: Hook + 'static>(mut self, hook: H) -> Self {
        self.register(hook);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|hook| hook.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Fires `event` on every hook in registration order.
    ///
    /// For `BeforeCmd` any rewrite is applied to the context's command; use
    /// [`HookRegistry::rewrite_command`] to also get the replacement back.
    ///
    /// # Errors
    ///
    /// Returns `LocalCiError::Hook` for the first hook that fails; later hooks
    /// are not invoked.
    pub async fn dispatch(&self, event: LifecycleEvent, ctx: &mut ExecutionContext) -> Result<()> {
        self.fire(event, ctx).await.map(drop)
    }

    /// Fires `beforeCmd` and returns the last non-empty replacement, if any.
    ///
    /// Each replacement is written to the context as soon as it is returned,
    /// so later hooks see the rewritten command.
    pub async fn rewrite_command(&self, ctx: &mut ExecutionContext) -> Result<Option<String>> {
        self.fire(LifecycleEvent::BeforeCmd, ctx).await
    }

    async fn fire(&self, event: LifecycleEvent, ctx: &mut ExecutionContext) -> Result<Option<String>> {
        let mut replacement = None;

        for hook in &self.hooks {
            let previous = ctx.swap_current_hook(Some(hook.name().to_string()));
            let outcome = invoke(hook.as_ref(), event, ctx).await;
            ctx.swap_current_hook(previous);

            match outcome {
                Ok(Some(command)) if !command.is_empty() => {
                    debug!("Hook {} rewrote command to `{command}`", hook.name());
                    ctx.set_command(&command);
                    replacement = Some(command);
                }
                Ok(_) => {}
                Err(err) => {
                    return Err(LocalCiError::Hook {
                        hook: hook.name().to_string(),
                        event: event.name().to_string(),
                        message: format!("{err:#}"),
                    });
                }
            }
        }

        Ok(replacement)
    }
}

async fn invoke(
    hook: &dyn Hook,
    event: LifecycleEvent,
    ctx: &mut ExecutionContext,
) -> anyhow::Result<Option<String>> {
    let unit = match event {
        LifecycleEvent::BeforeCmd => return hook.before_cmd(ctx).await,
        LifecycleEvent::BeforeAll => hook.before_all(ctx).await,
        LifecycleEvent::BeforeStage => hook.before_stage(ctx).await,
        LifecycleEvent::BeforeJob => hook.before_job(ctx).await,
        LifecycleEvent::OnSkip => hook.on_skip(ctx).await,
        LifecycleEvent::AfterCmd => hook.after_cmd(ctx).await,
        LifecycleEvent::OnError => hook.on_error(ctx).await,
        LifecycleEvent::AfterJob => hook.after_job(ctx).await,
        LifecycleEvent::AfterStage => hook.after_stage(ctx).await,
        LifecycleEvent::AfterAll => hook.after_all(ctx).await,
    };
    unit.map(|()| None)
}
