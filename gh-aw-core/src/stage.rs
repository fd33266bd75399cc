use async_trait::async_trait;

use crate::context::CompileContext;

#[async_trait]
pub trait Stage: Send + Sync {
    async fn run(&self, ctx: &mut CompileContext) -> anyhow::Result<()>;
    fn name(&self) -> &str;
}
