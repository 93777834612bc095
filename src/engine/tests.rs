use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use tempfile::TempDir;

use super::*;
use crate::hooks::{FnHook, Hook};
use crate::process::CommandResult;

/// Runner that never spawns anything; exit codes are scripted per command.
#[derive(Default)]
struct ScriptedRunner {
    codes: HashMap<String, i32>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedRunner {
    fn failing(command: &str, code: i32) -> Self {
        Self {
            codes: HashMap::from([(command.to_string(), code)]),
            ..Self::default()
        }
    }

    fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(command, _)| command.clone())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str, ci_flag: &str) -> Result<CommandResult> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), ci_flag.to_string()));
        Ok(CommandResult {
            code: self.codes.get(command).copied().unwrap_or(0),
            executed: true,
        })
    }
}

/// Records every event with the coordinates visible on the context.
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn record(&self, event: LifecycleEvent, ctx: &ExecutionContext) {
        let mut line = event.name().to_string();
        for part in [ctx.stage(), ctx.job_name(), ctx.command()].into_iter().flatten() {
            line.push(' ');
            line.push_str(part);
        }
        if let Some(result) = ctx.result() {
            line.push_str(&format!(" code={} executed={}", result.code, result.executed));
        }
        self.events.lock().unwrap().push(line);
    }
}

#[async_trait]
impl Hook for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn before_all(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.record(LifecycleEvent::BeforeAll, ctx);
        Ok(())
    }

    async fn before_stage(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.record(LifecycleEvent::BeforeStage, ctx);
        Ok(())
    }

    async fn before_job(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.record(LifecycleEvent::BeforeJob, ctx);
        Ok(())
    }

    async fn on_skip(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.record(LifecycleEvent::OnSkip, ctx);
        Ok(())
    }

    async fn before_cmd(&self, ctx: &mut ExecutionContext) -> anyhow::Result<Option<String>> {
        self.record(LifecycleEvent::BeforeCmd, ctx);
        Ok(None)
    }

    async fn after_cmd(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.record(LifecycleEvent::AfterCmd, ctx);
        Ok(())
    }

    async fn on_error(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.record(LifecycleEvent::OnError, ctx);
        Ok(())
    }

    async fn after_job(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.record(LifecycleEvent::AfterJob, ctx);
        Ok(())
    }

    async fn after_stage(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.record(LifecycleEvent::AfterStage, ctx);
        Ok(())
    }

    async fn after_all(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.record(LifecycleEvent::AfterAll, ctx);
        Ok(())
    }
}

struct Fixture {
    dir: TempDir,
    events: Arc<Mutex<Vec<String>>>,
    runner: Arc<ScriptedRunner>,
}

impl Fixture {
    fn new(pipeline: &str) -> Self {
        Self::with_runner(pipeline, ScriptedRunner::default())
    }

    fn with_runner(pipeline: &str, runner: ScriptedRunner) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitlab-ci.yml"), pipeline).unwrap();
        Self {
            dir,
            events: Arc::new(Mutex::new(Vec::new())),
            runner: Arc::new(runner),
        }
    }

    fn write_ignore(&self, content: &str) {
        std::fs::write(self.path().join(".ci-ignore"), content).unwrap();
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn args(&self) -> SelectionArgs {
        SelectionArgs::new(
            self.path().join(".gitlab-ci.yml"),
            self.path().join(".ci-ignore"),
        )
    }

    fn engine(&self) -> Engine {
        self.engine_with(HookRegistry::new())
    }

    /// Recorder is registered after `hooks`.
    fn engine_with(&self, hooks: HookRegistry) -> Engine {
        let hooks = hooks.with(Recorder {
            events: Arc::clone(&self.events),
        });
        Engine::new(hooks)
            .with_runner(self.runner.clone())
            .with_ci_flag("true")
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn events_named(&self, event: LifecycleEvent) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|line| line.split(' ').next() == Some(event.name()))
            .collect()
    }
}

const TWO_STAGES: &str = r#"
stages: [build, test]
variables:
  NODE_ENV: test
lint:
  stage: test
  script: npm run lint
compile:
  stage: build
  script:
    - make
    - make install
unit:
  stage: test
  script:
    - cargo test
"#;

#[tokio::test]
async fn test_full_walk_follows_declaration_order() {
    let fixture = Fixture::new(TWO_STAGES);

    let summary = fixture.engine().run(fixture.args()).await.unwrap();

    assert_eq!(
        fixture.events(),
        [
            "beforeAll",
            "beforeStage build",
            "beforeJob build compile",
            "beforeCmd build compile make",
            "afterCmd build compile make code=0 executed=true",
            "beforeCmd build compile make install",
            "afterCmd build compile make install code=0 executed=true",
            "afterJob build compile",
            "afterStage build",
            "beforeStage test",
            "beforeJob test lint",
            "beforeCmd test lint npm run lint",
            "afterCmd test lint npm run lint code=0 executed=true",
            "afterJob test lint",
            "beforeJob test unit",
            "beforeCmd test unit cargo test",
            "afterCmd test unit cargo test code=0 executed=true",
            "afterJob test unit",
            "afterStage test",
            "afterAll",
        ]
    );
    assert_eq!(
        fixture.runner.commands(),
        ["make", "make install", "npm run lint", "cargo test"]
    );
    assert_eq!(summary.stages_run, 2);
    assert_eq!(summary.jobs_run, 3);
    assert_eq!(summary.commands_run, 4);
    assert_eq!(summary.mode, RunMode::Normal);
}

#[tokio::test]
async fn test_only_stages_skips_whole_stage() {
    let fixture = Fixture::new(TWO_STAGES);
    let args = fixture.args().only_stages(["test"]);

    let summary = fixture.engine().run(args).await.unwrap();

    assert_eq!(fixture.events_named(LifecycleEvent::BeforeStage), ["beforeStage test"]);
    assert_eq!(fixture.events_named(LifecycleEvent::AfterStage), ["afterStage test"]);
    assert!(fixture
        .events_named(LifecycleEvent::BeforeJob)
        .iter()
        .all(|line| line.starts_with("beforeJob test ")));
    assert!(!fixture.runner.commands().contains(&"make".to_string()));
    assert_eq!(summary.stages_skipped, 1);
    assert_eq!(summary.stages_run, 1);
}

#[tokio::test]
async fn test_only_jobs_skips_whole_job() {
    let fixture = Fixture::new(TWO_STAGES);
    let args = fixture.args().only_jobs(["unit"]);

    let summary = fixture.engine().run(args).await.unwrap();

    assert_eq!(fixture.events_named(LifecycleEvent::BeforeJob), ["beforeJob test unit"]);
    assert_eq!(fixture.events_named(LifecycleEvent::OnSkip), Vec::<String>::new());
    // Stages are still entered even when none of their jobs are selected.
    assert_eq!(
        fixture.events_named(LifecycleEvent::BeforeStage),
        ["beforeStage build", "beforeStage test"]
    );
    assert_eq!(fixture.runner.commands(), ["cargo test"]);
    assert_eq!(summary.jobs_skipped, 2);
}

#[tokio::test]
async fn test_command_failure_stops_the_run() {
    let pipeline = r#"
stages: [test, deploy]
build:
  stage: test
  script:
    - make
    - exit 2
    - echo unreachable
report:
  stage: test
  script: echo report
ship:
  stage: deploy
  script: ./ship.sh
"#;
    let fixture = Fixture::with_runner(pipeline, ScriptedRunner::failing("exit 2", 2));

    let err = fixture.engine().run(fixture.args()).await.unwrap_err();

    match &err {
        LocalCiError::CommandFailure {
            stage,
            job,
            command,
            code,
        } => {
            assert_eq!(stage, "test");
            assert_eq!(job, "build");
            assert_eq!(command, "exit 2");
            assert_eq!(*code, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), 2);

    let events = fixture.events();
    assert_eq!(
        &events[events.len() - 2..],
        [
            "afterCmd test build exit 2 code=2 executed=true",
            "onError test build exit 2 code=2 executed=true",
        ]
    );
    assert!(fixture.events_named(LifecycleEvent::AfterJob).is_empty());
    assert!(fixture.events_named(LifecycleEvent::AfterStage).is_empty());
    assert!(fixture.events_named(LifecycleEvent::AfterAll).is_empty());
    assert_eq!(fixture.runner.commands(), ["make", "exit 2"]);
}

#[tokio::test]
async fn test_list_and_dry_run_never_execute() {
    for args_mode in [RunMode::List, RunMode::DryRun] {
        let fixture = Fixture::new(TWO_STAGES);
        let args = match args_mode {
            RunMode::List => fixture.args().list(true),
            _ => fixture.args().dry_run(true),
        };

        let summary = fixture.engine().run(args).await.unwrap();

        assert!(fixture.runner.commands().is_empty());
        assert_eq!(summary.mode, args_mode);
        assert_eq!(summary.commands_run, 4);

        let before = fixture.events_named(LifecycleEvent::BeforeCmd);
        let after = fixture.events_named(LifecycleEvent::AfterCmd);
        assert_eq!(before.len(), 4);
        assert_eq!(after.len(), 4);
        assert!(after.iter().all(|line| line.ends_with("code=0 executed=false")));
        assert_eq!(fixture.events().last().map(String::as_str), Some("afterAll"));
    }
}

#[tokio::test]
async fn test_before_cmd_rewrites_executed_command() {
    let pipeline = r#"
stages: [build]
bundle:
  stage: build
  script:
    - npm build prod
    - npm test
"#;
    let fixture = Fixture::new(pipeline);
    let hooks = HookRegistry::new()
        .with(FnHook::new("replace-build").rewrite(|ctx| {
            Ok((ctx.command() == Some("npm build prod")).then(|| "npm build test".to_string()))
        }))
        .with(FnHook::new("suffix").rewrite(|ctx| {
            Ok(ctx
                .command()
                .filter(|command| command.starts_with("npm build"))
                .map(|command| format!("{command} --verbose")))
        }));

    fixture.engine_with(hooks).run(fixture.args()).await.unwrap();

    assert_eq!(
        fixture.runner.commands(),
        ["npm build test --verbose", "npm test"]
    );
    // The recorder runs last and sees the rewritten command.
    assert_eq!(
        fixture.events_named(LifecycleEvent::BeforeCmd)[0],
        "beforeCmd build bundle npm build test --verbose"
    );
}

#[tokio::test]
async fn test_ignore_rules_and_default_skips() {
    let pipeline = r#"
stages: [build]
bundle:
  stage: build
  script:
    - npm ci
    - docker push registry/app
    - npm run build
"#;
    let fixture = Fixture::new(pipeline);
    fixture.write_ignore("# never push from a laptop\ndocker push\n");
    let args = fixture.args().with_default_skips();

    let summary = fixture.engine().run(args).await.unwrap();

    assert_eq!(fixture.runner.commands(), ["npm run build"]);
    assert_eq!(
        fixture.events_named(LifecycleEvent::OnSkip),
        [
            "onSkip build bundle npm ci",
            "onSkip build bundle docker push registry/app",
        ]
    );
    assert_eq!(summary.commands_skipped, 2);
    assert_eq!(summary.commands_run, 1);
}

#[tokio::test]
async fn test_stage_without_jobs_still_fires_stage_hooks() {
    let pipeline = r#"
stages: [prepare, build]
compile:
  stage: build
  script: make
"#;
    let fixture = Fixture::new(pipeline);

    fixture.engine().run(fixture.args()).await.unwrap();

    assert_eq!(
        &fixture.events()[..3],
        ["beforeAll", "beforeStage prepare", "afterStage prepare"]
    );
}

#[tokio::test]
async fn test_job_in_undeclared_stage_is_never_visited() {
    let pipeline = r#"
stages: [build]
compile:
  stage: build
  script: make
publish:
  stage: release
  script: ./publish.sh
"#;
    let fixture = Fixture::new(pipeline);

    fixture.engine().run(fixture.args()).await.unwrap();

    assert_eq!(fixture.runner.commands(), ["make"]);
}

#[tokio::test]
async fn test_missing_definition_fires_no_hooks() {
    let fixture = Fixture::new("stages: [build]\n");
    let args = SelectionArgs::new(
        fixture.path().join("missing.yml"),
        fixture.path().join(".ci-ignore"),
    );

    let err = fixture.engine().run(args).await.unwrap_err();

    assert!(matches!(err, LocalCiError::NotFound { .. }));
    assert_eq!(err.exit_code(), 1);
    assert!(fixture.events().is_empty());
}

#[tokio::test]
async fn test_invalid_ignore_pattern_aborts_before_loading() {
    let fixture = Fixture::new(TWO_STAGES);
    fixture.write_ignore("(unclosed\n");

    let err = fixture.engine().run(fixture.args()).await.unwrap_err();

    assert!(matches!(err, LocalCiError::InvalidPattern { .. }));
    assert!(fixture.events().is_empty());
}

#[tokio::test]
async fn test_hook_failure_aborts_the_run() {
    let fixture = Fixture::new(TWO_STAGES);
    let hooks = HookRegistry::new().with(
        FnHook::new("guard").on(LifecycleEvent::BeforeJob, |ctx| {
            if ctx.job_name() == Some("compile") {
                return Err(anyhow!("compile is not allowed here"));
            }
            Ok(())
        }),
    );

    let err = fixture.engine_with(hooks).run(fixture.args()).await.unwrap_err();

    match &err {
        LocalCiError::Hook { hook, event, .. } => {
            assert_eq!(hook, "guard");
            assert_eq!(event, "beforeJob");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(fixture.runner.commands().is_empty());
    assert!(fixture.events_named(LifecycleEvent::AfterAll).is_empty());
}

#[tokio::test]
async fn test_hooks_share_state_across_events() {
    #[derive(Default)]
    struct Ran(usize);

    let fixture = Fixture::new(TWO_STAGES);
    let seen = Arc::new(Mutex::new(None));
    let seen_at_end = Arc::clone(&seen);
    let hooks = HookRegistry::new()
        .with(FnHook::new("counter").on(LifecycleEvent::AfterCmd, |ctx| {
            ctx.extensions.get_or_default::<Ran>().0 += 1;
            Ok(())
        }))
        .with(FnHook::new("report").on(LifecycleEvent::AfterAll, move |ctx| {
            *seen_at_end.lock().unwrap() = ctx.extensions.get::<Ran>().map(|ran| ran.0);
            Ok(())
        }));

    fixture.engine_with(hooks).run(fixture.args()).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), Some(4));
}

#[tokio::test]
async fn test_ci_flag_reaches_the_runner() {
    let fixture = Fixture::new("stages: [build]\ncompile:\n  stage: build\n  script: make\n");
    let engine = Engine::new(HookRegistry::new())
        .with_runner(fixture.runner.clone())
        .with_ci_flag("local");

    engine.run(fixture.args()).await.unwrap();

    let calls = fixture.runner.calls.lock().unwrap().clone();
    assert_eq!(calls, [("make".to_string(), "local".to_string())]);
}

#[tokio::test]
async fn test_stages_follow_declared_order_not_name_order() {
    let pipeline = r#"
stages: [test, build, assemble]
pack:
  stage: assemble
  script: tar czf out.tgz out
compile:
  stage: build
  script: make
unit:
  stage: test
  script: cargo test
"#;
    let fixture = Fixture::new(pipeline);

    fixture.engine().run(fixture.args()).await.unwrap();

    assert_eq!(
        fixture.events_named(LifecycleEvent::BeforeStage),
        ["beforeStage test", "beforeStage build", "beforeStage assemble"]
    );
    assert_eq!(
        fixture.runner.commands(),
        ["cargo test", "make", "tar czf out.tgz out"]
    );
}
