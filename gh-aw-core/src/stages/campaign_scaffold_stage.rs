use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::campaign::{self, CampaignSpec};
use crate::context::CompileContext;
use crate::stage::Stage;
use crate::value::Value;

/// Prepends campaign scaffolding to a worker workflow's `safe-outputs:`
/// config before the Schema/Model stages see it, for every worker path a
/// discovered campaign spec names (spec §4.9 "per-worker scaffolding").
/// Workflows not referenced by any campaign pass through unchanged.
pub struct CampaignScaffoldStage {
    membership: BTreeMap<PathBuf, CampaignSpec>,
}

impl CampaignScaffoldStage {
    pub fn new(membership: BTreeMap<PathBuf, CampaignSpec>) -> Self {
        Self { membership }
    }
}

#[async_trait]
impl Stage for CampaignScaffoldStage {
    async fn run(&self, ctx: &mut CompileContext) -> anyhow::Result<()> {
        let Some(spec) = self.membership.get(&ctx.path) else {
            return Ok(());
        };

        let Some(fm) = ctx.frontmatter.as_map_mut() else {
            return Ok(());
        };
        let Some(Value::Map(safe_outputs)) = fm.get_mut("safe-outputs") else {
            return Ok(());
        };

        let kinds: Vec<String> = safe_outputs.keys().cloned().collect();
        for kind in kinds {
            if let Some(raw) = safe_outputs.remove(&kind) {
                safe_outputs.insert(kind.clone(), campaign::scaffold_worker_safe_outputs(spec, &kind, raw));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "CampaignScaffold"
    }
}
