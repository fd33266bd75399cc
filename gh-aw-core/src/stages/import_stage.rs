use std::path::PathBuf;

use async_trait::async_trait;

use crate::context::CompileContext;
use crate::diagnostics::ErrorCode;
use crate::import::{GitHubClient, ImportCache, ImportResolver};
use crate::stage::Stage;

/// Resolves `imports:` and `@include` directives into the merged
/// frontmatter and expanded body (spec §4.3).
pub struct ImportStage {
    workspace_root: PathBuf,
    github: GitHubClient,
    cache: ImportCache,
}

impl ImportStage {
    pub fn new(workspace_root: PathBuf, github: GitHubClient, cache: ImportCache) -> Self {
        Self {
            workspace_root,
            github,
            cache,
        }
    }
}

#[async_trait]
impl Stage for ImportStage {
    async fn run(&self, ctx: &mut CompileContext) -> anyhow::Result<()> {
        if ctx.diagnostics.has_errors() {
            return Ok(());
        }

        let resolver = ImportResolver::new(&self.workspace_root, &self.github, &self.cache);
        let entry_id = ctx.path.to_string_lossy().to_string();
        let result = resolver
            .resolve(
                &entry_id,
                &ctx.path,
                ctx.frontmatter.clone(),
                ctx.markdown_body.clone(),
                &mut ctx.diagnostics,
            )
            .await;

        match result {
            Ok((merged_frontmatter, body, imports)) => {
                ctx.frontmatter = merged_frontmatter;
                ctx.markdown_body = body;
                ctx.imports = imports;
            }
            Err(e) => {
                ctx.diagnostics.push(crate::diagnostics::Diagnostic::error(
                    ErrorCode::ImportFetchFailed,
                    &ctx.path,
                    format!("import resolution failed: {e:#}"),
                ));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Import"
    }
}
