use async_trait::async_trait;

use crate::context::CompileContext;
use crate::schema;
use crate::stage::Stage;

/// Validates the merged frontmatter against the workflow/shared-workflow
/// JSON schema (spec §4.2).
pub struct SchemaStage;

#[async_trait]
impl Stage for SchemaStage {
    async fn run(&self, ctx: &mut CompileContext) -> anyhow::Result<()> {
        if ctx.diagnostics.has_errors() {
            return Ok(());
        }
        let kind = schema::select_kind(&ctx.frontmatter, false);
        schema::validate(&ctx.path, &ctx.frontmatter, kind, ctx.strict, &mut ctx.diagnostics);
        Ok(())
    }

    fn name(&self) -> &str {
        "Schema"
    }
}
