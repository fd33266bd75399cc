use async_trait::async_trait;

use crate::context::CompileContext;
use crate::model;
use crate::stage::Stage;

/// Builds the normalized `WorkflowData` from validated frontmatter (spec §4.5).
pub struct ModelStage;

#[async_trait]
impl Stage for ModelStage {
    async fn run(&self, ctx: &mut CompileContext) -> anyhow::Result<()> {
        if ctx.diagnostics.has_errors_in_strict(ctx.strict) {
            return Ok(());
        }
        ctx.data = Some(model::build(
            &ctx.path,
            &ctx.frontmatter,
            ctx.markdown_body.clone(),
            ctx.imports.clone(),
            &mut ctx.diagnostics,
        ));
        Ok(())
    }

    fn name(&self) -> &str {
        "Model"
    }
}
