use async_trait::async_trait;

use crate::context::CompileContext;
use crate::expression::{self, SecretAllowList};
use crate::stage::Stage;

/// Allow-lists every `${{ ... }}` expression in the merged frontmatter and
/// body (spec §4.4). A forbidden expression is an error; an untrusted
/// context is rewritten to an env-var indirection.
pub struct ExpressionStage;

#[async_trait]
impl Stage for ExpressionStage {
    async fn run(&self, ctx: &mut CompileContext) -> anyhow::Result<()> {
        if ctx.diagnostics.has_errors_in_strict(ctx.strict) {
            return Ok(());
        }
        let allow_list = SecretAllowList::from_frontmatter(&ctx.frontmatter);
        let report = expression::validate(
            &ctx.path,
            &ctx.frontmatter,
            &ctx.markdown_body,
            &allow_list,
            &mut ctx.diagnostics,
        );
        for rewrite in report.rewrites {
            ctx.markdown_body = ctx.markdown_body.replace(
                &format!("${{{{ {} }}}}", rewrite.original),
                &format!("${{{{ env.{} }}}}", rewrite.env_var_name),
            );
            ctx.expression_rewrites.push(rewrite);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Expression"
    }
}
