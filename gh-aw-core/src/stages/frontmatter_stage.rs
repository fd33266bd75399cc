use async_trait::async_trait;

use crate::context::CompileContext;
use crate::frontmatter;
use crate::stage::Stage;

/// Splits the raw source into frontmatter + body (spec §4.1).
pub struct FrontmatterStage;

#[async_trait]
impl Stage for FrontmatterStage {
    async fn run(&self, ctx: &mut CompileContext) -> anyhow::Result<()> {
        match frontmatter::parse(&ctx.path, &ctx.raw_source) {
            Ok(parsed) => {
                ctx.frontmatter = parsed.frontmatter;
                ctx.markdown_body = parsed.body;
                ctx.body_line_offset = parsed.body_line_offset;
            }
            Err(diag) => ctx.diagnostics.push(diag),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Frontmatter"
    }
}
