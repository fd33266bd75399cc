//! Engine Renderer (spec §4.6): one module per supported coding agent,
//! looked up through a small plugin registry the way `AdvisoryProvider`
//! implementations are looked up by name elsewhere in this codebase.

mod claude;
mod codex;
mod copilot;

use std::sync::Arc;

use crate::gha::Step;
use crate::model::{EngineKind, WorkflowData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpConfigFormat {
    Json,
    Toml,
}

pub struct RenderedEngine {
    pub setup_steps: Vec<Step>,
    pub mcp_config_path: String,
    pub mcp_config: String,
    pub invocation_step: Step,
    pub log_parser: &'static str,
}

pub trait EngineRenderer: Send + Sync {
    fn id(&self) -> &'static str;
    fn mcp_config_format(&self) -> McpConfigFormat;
    fn render(&self, data: &WorkflowData, prompt_path: &str) -> RenderedEngine;
}

/// Exactly one engine runs per workflow; there is no multiplexing.
pub fn renderer_for(kind: &EngineKind) -> anyhow::Result<Arc<dyn EngineRenderer>> {
    match kind {
        EngineKind::Claude => Ok(Arc::new(claude::ClaudeEngine)),
        EngineKind::Codex => Ok(Arc::new(codex::CodexEngine)),
        EngineKind::Copilot => Ok(Arc::new(copilot::CopilotEngine)),
        EngineKind::Custom(id) => anyhow::bail!("unknown custom engine '{id}'"),
    }
}

/// Rewrites every MCP server entry to route through the gateway when
/// `sandbox.mcp` is set (spec §4.6 "MCP gateway mode").
pub fn gateway_rewrite(servers: &[(&str, String)], port: u16) -> Vec<(String, String)> {
    servers
        .iter()
        .map(|(name, _original)| {
            (
                name.to_string(),
                format!("http://localhost:{port}/mcp/{name}"),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EngineKind;

    #[test]
    fn renderer_for_dispatches_by_kind() {
        assert_eq!(renderer_for(&EngineKind::Claude).unwrap().id(), "claude");
        assert_eq!(renderer_for(&EngineKind::Codex).unwrap().id(), "codex");
        assert_eq!(renderer_for(&EngineKind::Copilot).unwrap().id(), "copilot");
    }

    #[test]
    fn unknown_custom_engine_is_error() {
        assert!(renderer_for(&EngineKind::Custom("bogus".into())).is_err());
    }

    #[test]
    fn gateway_rewrite_produces_localhost_urls() {
        let servers = vec![("github", "npx @gh/mcp".to_string())];
        let rewritten = gateway_rewrite(&servers, 4000);
        assert_eq!(rewritten[0].1, "http://localhost:4000/mcp/github");
    }
}
