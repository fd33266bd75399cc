use serde_json::json;

use crate::engine::{EngineRenderer, McpConfigFormat, RenderedEngine};
use crate::gha::Step;
use crate::model::WorkflowData;

pub struct CopilotEngine;

impl EngineRenderer for CopilotEngine {
    fn id(&self) -> &'static str {
        "copilot"
    }

    fn mcp_config_format(&self) -> McpConfigFormat {
        McpConfigFormat::Json
    }

    fn render(&self, data: &WorkflowData, prompt_path: &str) -> RenderedEngine {
        let setup_steps = vec![Step::run("gh extension install github/gh-copilot").named("Install Copilot CLI")];

        let servers: serde_json::Map<String, serde_json::Value> = data
            .tools
            .mcp_servers
            .keys()
            .map(|name| (name.clone(), json!({ "command": "npx", "args": [format!("@{name}/mcp-server")] })))
            .collect();
        let mcp_config = serde_json::to_string_pretty(&json!({ "mcpServers": servers })).unwrap();

        let invocation_step =
            Step::run(format!("gh copilot suggest --config /tmp/gh-aw/mcp-config.json < {prompt_path}"))
                .named("Run Copilot");

        RenderedEngine {
            setup_steps,
            mcp_config_path: "/tmp/gh-aw/mcp-config.json".to_string(),
            mcp_config,
            invocation_step,
            log_parser: "copilot",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_uses_gh_copilot_invocation() {
        let data = crate::model::build(
            std::path::Path::new("wf.md"),
            &crate::value::Value::from(serde_yaml::from_str::<serde_yaml::Value>("on: workflow_dispatch\nengine: copilot\n").unwrap()),
            String::new(),
            vec![],
            &mut crate::diagnostics::DiagnosticCollector::new(),
        );
        let rendered = CopilotEngine.render(&data, "/tmp/gh-aw/prompt.md");
        assert!(rendered.invocation_step.run.unwrap().contains("gh copilot"));
    }
}
