use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::hooks::Hook;

/// Reports the `CI` value commands will see.
#[derive(Debug, Default)]
pub struct PreEnv;

#[async_trait]
impl Hook for PreEnv {
    fn name(&self) -> &str {
        "pre-env"
    }

    async fn before_all(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        ctx.console().info(format!("[pre-env] CI={}", ctx.ci_flag()));
        Ok(())
    }
}
