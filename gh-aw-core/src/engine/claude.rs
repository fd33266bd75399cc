use std::collections::BTreeMap;

use serde_json::json;

use crate::engine::{EngineRenderer, McpConfigFormat, RenderedEngine};
use crate::gha::Step;
use crate::model::WorkflowData;

pub struct ClaudeEngine;

impl EngineRenderer for ClaudeEngine {
    fn id(&self) -> &'static str {
        "claude"
    }

    fn mcp_config_format(&self) -> McpConfigFormat {
        McpConfigFormat::Json
    }

    fn render(&self, data: &WorkflowData, prompt_path: &str) -> RenderedEngine {
        let setup_steps = vec![Step::run("npm install -g @anthropic-ai/claude-code").named("Install Claude Code")];

        let servers: serde_json::Map<String, serde_json::Value> = data
            .tools
            .mcp_servers
            .keys()
            .map(|name| (name.clone(), json!({ "command": "npx", "args": [format!("@{name}/mcp-server")] })))
            .collect();
        let mcp_config = serde_json::to_string_pretty(&json!({ "mcpServers": servers })).unwrap();

        let mut env = BTreeMap::new();
        env.insert("ANTHROPIC_API_KEY".to_string(), "${{ secrets.ANTHROPIC_API_KEY }}".to_string());
        if let Some(model) = &data.engine.model {
            env.insert("ANTHROPIC_MODEL".to_string(), model.clone());
        }

        let invocation_step = Step::run(format!(
            "claude --print --output-format stream-json --mcp-config /tmp/gh-aw/mcp-config.json < {prompt_path}"
        ))
        .named("Run Claude Code")
        .with_env(env);

        RenderedEngine {
            setup_steps,
            mcp_config_path: "/tmp/gh-aw/mcp-config.json".to_string(),
            mcp_config,
            invocation_step,
            log_parser: "claude",
        }
    }
}

trait StepExt {
    fn with_env(self, env: BTreeMap<String, String>) -> Self;
}

impl StepExt for Step {
    fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> WorkflowData {
        crate::model::build(
            std::path::Path::new("wf.md"),
            &crate::value::Value::from(serde_yaml::from_str::<serde_yaml::Value>("on: push\nengine:\n  id: claude\n  model: opus\n").unwrap()),
            String::new(),
            vec![],
            &mut crate::diagnostics::DiagnosticCollector::new(),
        )
    }

    #[test]
    fn render_sets_model_env_and_mcp_json() {
        let data = sample_data();
        let rendered = ClaudeEngine.render(&data, "/tmp/gh-aw/prompt.md");
        assert_eq!(ClaudeEngine.mcp_config_format(), McpConfigFormat::Json);
        assert!(rendered.invocation_step.env.get("ANTHROPIC_MODEL").is_some());
        assert!(rendered.mcp_config.contains("mcpServers"));
    }
}
