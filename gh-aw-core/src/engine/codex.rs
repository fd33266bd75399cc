use std::collections::BTreeMap;

use crate::engine::{EngineRenderer, McpConfigFormat, RenderedEngine};
use crate::gha::Step;
use crate::model::WorkflowData;

pub struct CodexEngine;

impl EngineRenderer for CodexEngine {
    fn id(&self) -> &'static str {
        "codex"
    }

    fn mcp_config_format(&self) -> McpConfigFormat {
        McpConfigFormat::Toml
    }

    fn render(&self, data: &WorkflowData, prompt_path: &str) -> RenderedEngine {
        let setup_steps = vec![Step::run("npm install -g @openai/codex").named("Install Codex CLI")];

        let mut servers = toml::value::Table::new();
        for name in data.tools.mcp_servers.keys() {
            let mut server = toml::value::Table::new();
            server.insert("command".to_string(), toml::Value::String("npx".to_string()));
            server.insert(
                "args".to_string(),
                toml::Value::Array(vec![toml::Value::String(format!("@{name}/mcp-server"))]),
            );
            servers.insert(name.clone(), toml::Value::Table(server));
        }
        let mut root = toml::value::Table::new();
        root.insert("mcp_servers".to_string(), toml::Value::Table(servers));
        let mcp_config = toml::to_string_pretty(&toml::Value::Table(root)).unwrap();

        let mut env = BTreeMap::new();
        env.insert("OPENAI_API_KEY".to_string(), "${{ secrets.OPENAI_API_KEY }}".to_string());
        if let Some(model) = &data.engine.model {
            env.insert("CODEX_MODEL".to_string(), model.clone());
        }

        let mut invocation_step = Step::run(format!("codex exec --config /tmp/gh-aw/mcp-config.toml < {prompt_path}"))
            .named("Run Codex");
        invocation_step.env = env;

        RenderedEngine {
            setup_steps,
            mcp_config_path: "/tmp/gh-aw/mcp-config.toml".to_string(),
            mcp_config,
            invocation_step,
            log_parser: "codex",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> WorkflowData {
        crate::model::build(
            std::path::Path::new("wf.md"),
            &crate::value::Value::from(
                serde_yaml::from_str::<serde_yaml::Value>("on: push\nengine: codex\ntools:\n  github: true\n").unwrap(),
            ),
            String::new(),
            vec![],
            &mut crate::diagnostics::DiagnosticCollector::new(),
        )
    }

    #[test]
    fn render_emits_toml_mcp_config() {
        let data = sample_data();
        let rendered = CodexEngine.render(&data, "/tmp/gh-aw/prompt.md");
        assert_eq!(CodexEngine.mcp_config_format(), McpConfigFormat::Toml);
        assert!(rendered.mcp_config.contains("[mcp_servers"));
    }
}
