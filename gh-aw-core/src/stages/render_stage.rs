use async_trait::async_trait;

use crate::context::CompileContext;
use crate::engine::{self, McpConfigFormat};
use crate::gha::{Job, Jobs, Step, WorkflowDocument};
use crate::safe_outputs;
use crate::stage::Stage;
use crate::value::Value;

const PROMPT_PATH: &str = "/tmp/gh-aw/prompt.md";
const DEFAULT_GATEWAY_PORT: u16 = 3333;

/// Renders the engine's agent job and every safe-output job into a single
/// `WorkflowDocument` (spec §4.6, §4.7). Key ordering within the document
/// and within each job follows the `Job`/`WorkflowDocument` field order;
/// SHA-pinning and the header comment are left to [`super::EmitStage`].
pub struct RenderStage;

#[async_trait]
impl Stage for RenderStage {
    async fn run(&self, ctx: &mut CompileContext) -> anyhow::Result<()> {
        if ctx.diagnostics.has_errors_in_strict(ctx.strict) {
            return Ok(());
        }
        let Some(data) = ctx.data.clone() else {
            return Ok(());
        };

        let renderer = match engine::renderer_for(&data.engine.kind) {
            Ok(r) => r,
            Err(e) => {
                ctx.diagnostics.push(crate::diagnostics::Diagnostic::error(
                    crate::diagnostics::ErrorCode::ToolUndefined,
                    &ctx.path,
                    e.to_string(),
                ));
                return Ok(());
            }
        };
        let mut rendered = renderer.render(&data, PROMPT_PATH);

        // MCP gateway mode (spec §4.6): route every MCP server entry through a
        // local gateway process instead of the engine's direct command/URL.
        let gateway_step = data.sandbox.mcp_gateway.as_ref().map(|gateway_cfg| {
            let port = gateway_port(gateway_cfg);
            rendered.mcp_config = gateway_mcp_config(
                renderer.mcp_config_format(),
                port,
                data.tools.mcp_servers.keys().cloned().collect(),
            );
            Step::run(format!("gh-aw-mcp-gateway --port {port} &")).named("Start MCP gateway")
        });

        let write_prompt = Step::run(format!(
            "cat <<'GH_AW_PROMPT_EOF' > {PROMPT_PATH}\n{}\nGH_AW_PROMPT_EOF",
            data.markdown_body
        ))
        .named("Write agent prompt");

        let write_mcp_config = Step::run(format!(
            "mkdir -p $(dirname {0}) && cat <<'GH_AW_MCP_CONFIG_EOF' > {0}\n{1}\nGH_AW_MCP_CONFIG_EOF",
            rendered.mcp_config_path, rendered.mcp_config
        ))
        .named("Write MCP configuration");

        let mut steps = vec![Step::uses("actions/checkout@v4").named("Checkout")];
        steps.extend(rendered.setup_steps);
        if let Some(gateway_step) = gateway_step {
            steps.push(gateway_step);
        }
        steps.push(write_mcp_config);
        steps.push(write_prompt);
        steps.push(rendered.invocation_step);

        // Untrusted-context expressions were rewritten to `${{ env.GH_AW_EXPR_... }}`
        // indirection in the prompt text (spec §4.4); the indirection only holds if
        // the job actually sets that env var to the original expression.
        let env = ctx
            .expression_rewrites
            .iter()
            .map(|rewrite| (rewrite.env_var_name.clone(), format!("${{{{ {} }}}}", rewrite.original)))
            .collect();

        let agent_job = Job {
            name: Some("Agent".to_string()),
            runs_on: "ubuntu-latest".to_string(),
            permissions: data.permissions.clone(),
            env,
            timeout_minutes: data.timeout_minutes,
            steps,
            ..Default::default()
        };

        let mut jobs = Jobs::default();
        jobs.push("agent", agent_job);

        for safe_output_job in safe_outputs::build_jobs(&ctx.path, &data, &mut ctx.diagnostics) {
            jobs.push(safe_output_job.job_id, safe_output_job.job);
        }

        ctx.document = Some(WorkflowDocument {
            name: data.name.clone(),
            on: data.on.clone().into(),
            permissions: data.permissions.clone(),
            concurrency: None,
            env: Default::default(),
            defaults: None,
            jobs,
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "Render"
    }
}

/// `sandbox.mcp` is either `true` (use the default port) or a mapping with
/// an explicit `port`.
fn gateway_port(gateway_cfg: &Value) -> u16 {
    match gateway_cfg.get("port") {
        Some(Value::Int(port)) => *port as u16,
        _ => DEFAULT_GATEWAY_PORT,
    }
}

/// Rebuilds the engine's MCP config in its native format, pointing every
/// server at the gateway instead of its original command/URL.
fn gateway_mcp_config(format: McpConfigFormat, port: u16, server_names: Vec<String>) -> String {
    let servers: Vec<(&str, String)> = server_names.iter().map(|name| (name.as_str(), String::new())).collect();
    let rewritten = engine::gateway_rewrite(&servers, port);

    match format {
        McpConfigFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = rewritten
                .into_iter()
                .map(|(name, url)| (name, serde_json::json!({ "url": url, "headers": { "Authorization": "Bearer ${{ secrets.GITHUB_TOKEN }}" } })))
                .collect();
            serde_json::to_string_pretty(&serde_json::json!({ "mcpServers": map })).unwrap()
        }
        McpConfigFormat::Toml => {
            let mut servers_table = toml::value::Table::new();
            for (name, url) in rewritten {
                let mut server = toml::value::Table::new();
                server.insert("url".to_string(), toml::Value::String(url));
                servers_table.insert(name, toml::Value::Table(server));
            }
            let mut root = toml::value::Table::new();
            root.insert("mcp_servers".to_string(), toml::Value::Table(servers_table));
            toml::to_string_pretty(&toml::Value::Table(root)).unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn gateway_config_rewrites_server_urls_and_emits_start_step() {
        let dir = tempfile::tempdir().unwrap();
        let workflows_dir = dir.path().join(".github/workflows");
        std::fs::create_dir_all(&workflows_dir).unwrap();
        let wf_path = workflows_dir.join("sample.md");
        std::fs::write(
            &wf_path,
            "---\non: workflow_dispatch\nengine: claude\ntools:\n  custom-server:\n    command: npx\nsandbox:\n  mcp:\n    port: 4100\n---\nbody\n",
        )
        .unwrap();

        let config = Config::resolve(dir.path(), None, None);
        let mut results = crate::compile(dir.path(), &config, vec![wf_path], false).await;
        let ctx = results.remove(0);
        assert!(!ctx.diagnostics.has_errors(), "{:?}", ctx.diagnostics.iter().collect::<Vec<_>>());
        let yaml = ctx.rendered_yaml.unwrap();
        assert!(yaml.contains("gh-aw-mcp-gateway --port 4100"));
        assert!(yaml.contains("http://localhost:4100/mcp/custom-server"));
    }
}
