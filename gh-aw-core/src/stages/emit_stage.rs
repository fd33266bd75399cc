use std::path::PathBuf;

use async_trait::async_trait;

use crate::actions_lock::ActionsLock;
use crate::context::CompileContext;
use crate::emit;
use crate::stage::Stage;

/// SHA-pins every `uses:` line against the actions lock and emits the
/// final YAML with its header comment (spec §4.8).
pub struct EmitStage {
    lock_path: PathBuf,
}

impl EmitStage {
    pub fn new(lock_path: PathBuf) -> Self {
        Self { lock_path }
    }
}

#[async_trait]
impl Stage for EmitStage {
    async fn run(&self, ctx: &mut CompileContext) -> anyhow::Result<()> {
        if ctx.diagnostics.has_errors_in_strict(ctx.strict) {
            return Ok(());
        }
        let Some(mut document) = ctx.document.take() else {
            return Ok(());
        };

        let lock = ActionsLock::load_or_default(&self.lock_path)?;
        let mut jobs: Vec<_> = document.jobs.0.iter().map(|(_, job)| job.clone()).collect();
        emit::pin_actions(&mut jobs, &lock, ctx.strict, &ctx.path, &mut ctx.diagnostics);
        for (slot, pinned) in document.jobs.0.iter_mut().zip(jobs) {
            slot.1 = pinned;
        }

        if ctx.diagnostics.has_errors_in_strict(ctx.strict) {
            ctx.document = Some(document);
            return Ok(());
        }

        let header = emit::header_comment(&ctx.path, &ctx.raw_source, &ctx.imports);
        ctx.rendered_yaml = Some(emit::render(&document, &header)?);
        ctx.document = Some(document);
        Ok(())
    }

    fn name(&self) -> &str {
        "Emit"
    }
}
