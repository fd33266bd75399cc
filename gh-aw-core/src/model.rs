//! `WorkflowData`, the normalized post-validation intermediate model, and
//! the Intermediate Model Builder that produces it (spec §3, §4.5).

use std::collections::BTreeMap;
use std::path::Path;

use crate::diagnostics::{Diagnostic, DiagnosticCollector, ErrorCode};
use crate::import::ResolvedImport;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineKind {
    Claude,
    Codex,
    Copilot,
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub kind: EngineKind,
    pub model: Option<String>,
    pub version: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::Claude,
            model: None,
            version: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum BashCapability {
    #[default]
    Disabled,
    Unrestricted,
    Commands(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    pub github: bool,
    pub playwright: bool,
    pub bash: BashCapability,
    pub edit: bool,
    pub write: bool,
    pub web_fetch: bool,
    pub mcp_servers: BTreeMap<String, Value>,
}

impl ToolSet {
    fn merge_bash_commands(&mut self, extra: &[&str]) {
        match &mut self.bash {
            BashCapability::Disabled => {
                self.bash = BashCapability::Commands(extra.iter().map(|s| s.to_string()).collect());
            }
            BashCapability::Commands(cmds) => {
                for c in extra {
                    if !cmds.iter().any(|existing| existing == c) {
                        cmds.push(c.to_string());
                    }
                }
            }
            BashCapability::Unrestricted => {}
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SafeOutputsConfig {
    /// kind identifier (`create-issue`, `add-comment`, ...) -> raw config.
    pub kinds: BTreeMap<String, Value>,
    pub github_token: Option<String>,
    pub runs_on: Option<String>,
    pub max_patch_size: Option<u32>,
    pub threat_detection: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum NetworkPolicy {
    #[default]
    Unspecified,
    Defaults,
    None,
    Allowed(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct SandboxConfig {
    pub network: NetworkPolicy,
    pub mcp_gateway: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct Provenance {
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub commit_sha: String,
}

#[derive(Debug, Clone)]
pub struct WorkflowData {
    pub name: Option<String>,
    pub description: Option<String>,
    pub on: Value,
    pub permissions: BTreeMap<String, String>,
    pub engine: EngineConfig,
    pub tools: ToolSet,
    pub safe_outputs: SafeOutputsConfig,
    pub sandbox: SandboxConfig,
    pub imports: Vec<ResolvedImport>,
    pub markdown_body: String,
    pub expires: Option<String>,
    pub stop_after: Option<String>,
    pub timeout_minutes: Option<u32>,
    pub source: Option<Provenance>,
}

const PULL_REQUEST_SAFE_OUTPUTS: &[&str] = &["create-pull-request", "push-to-pull-request-branch"];
const CURATED_GIT_COMMANDS: &[&str] = &["git add", "git commit", "git checkout -b", "git push"];

pub fn build(
    path: &Path,
    frontmatter: &Value,
    markdown_body: String,
    imports: Vec<ResolvedImport>,
    collector: &mut DiagnosticCollector,
) -> WorkflowData {
    let name = frontmatter.get("name").and_then(Value::as_str).map(str::to_string);
    let description = frontmatter
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);

    let on = frontmatter.get("on").cloned().unwrap_or(Value::Null);

    let mut permissions: BTreeMap<String, String> = frontmatter
        .get("permissions")
        .and_then(Value::as_map)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();
    permissions.entry("contents".to_string()).or_insert_with(|| "read".to_string());

    let engine = build_engine(frontmatter, path, collector);
    let mut tools = build_tools(frontmatter);
    let safe_outputs = build_safe_outputs(frontmatter);
    let sandbox = build_sandbox(frontmatter);

    if safe_outputs
        .kinds
        .keys()
        .any(|k| PULL_REQUEST_SAFE_OUTPUTS.contains(&k.as_str()))
    {
        tools.edit = true;
        tools.write = true;
        tools.merge_bash_commands(CURATED_GIT_COMMANDS);
    }

    let expires = frontmatter.get("expires").and_then(Value::as_str).map(str::to_string);
    let stop_after = frontmatter
        .get("stop-after")
        .and_then(Value::as_str)
        .map(str::to_string);
    let timeout_minutes = frontmatter
        .get("timeout-minutes")
        .and_then(|v| match v {
            Value::Int(i) => Some(*i as u32),
            _ => None,
        });

    WorkflowData {
        name,
        description,
        on,
        permissions,
        engine,
        tools,
        safe_outputs,
        sandbox,
        imports,
        markdown_body,
        expires,
        stop_after,
        timeout_minutes,
        source: None,
    }
}

fn build_engine(frontmatter: &Value, path: &Path, collector: &mut DiagnosticCollector) -> EngineConfig {
    match frontmatter.get("engine") {
        Some(Value::String(s)) => EngineConfig {
            kind: parse_engine_kind(s),
            model: None,
            version: None,
        },
        Some(Value::Map(m)) => {
            let id = m.get("id").and_then(Value::as_str).unwrap_or("claude");
            EngineConfig {
                kind: parse_engine_kind(id),
                model: m.get("model").and_then(Value::as_str).map(str::to_string),
                version: m.get("version").and_then(Value::as_str).map(str::to_string),
            }
        }
        Some(_) | None => {
            collector.push(Diagnostic::warning(
                ErrorCode::ToolUndefined,
                path,
                "no 'engine' specified; defaulting to claude",
            ));
            EngineConfig::default()
        }
    }
}

fn parse_engine_kind(id: &str) -> EngineKind {
    match id {
        "claude" => EngineKind::Claude,
        "codex" => EngineKind::Codex,
        "copilot" => EngineKind::Copilot,
        other => EngineKind::Custom(other.to_string()),
    }
}

fn build_tools(frontmatter: &Value) -> ToolSet {
    let mut tools = ToolSet::default();
    let Some(map) = frontmatter.get("tools").and_then(Value::as_map) else {
        return tools;
    };

    tools.github = map.get("github").map(truthy).unwrap_or(false);
    tools.playwright = map.get("playwright").map(truthy).unwrap_or(false);
    tools.edit = map.get("edit").map(truthy).unwrap_or(false);
    tools.web_fetch = map.get("web-fetch").map(truthy).unwrap_or(false);

    tools.bash = match map.get("bash") {
        Some(Value::List(items)) => {
            if items.iter().any(|v| v.as_str() == Some("*")) {
                BashCapability::Unrestricted
            } else {
                BashCapability::Commands(
                    items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
                )
            }
        }
        Some(Value::Bool(true)) => BashCapability::Unrestricted,
        _ => BashCapability::Disabled,
    };

    for (key, value) in map {
        if !matches!(key.as_str(), "github" | "playwright" | "bash" | "edit" | "web-fetch") {
            tools.mcp_servers.insert(key.clone(), value.clone());
        }
    }

    tools
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::List(l) => !l.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

const SAFE_OUTPUT_GLOBAL_KEYS: &[&str] = &["github-token", "runs-on", "max-patch-size", "threat-detection"];

fn build_safe_outputs(frontmatter: &Value) -> SafeOutputsConfig {
    let mut config = SafeOutputsConfig {
        threat_detection: false,
        ..Default::default()
    };
    let Some(map) = frontmatter.get("safe-outputs").and_then(Value::as_map) else {
        return config;
    };

    config.github_token = map.get("github-token").and_then(Value::as_str).map(str::to_string);
    config.runs_on = map.get("runs-on").and_then(Value::as_str).map(str::to_string);
    config.max_patch_size = map.get("max-patch-size").and_then(|v| match v {
        Value::Int(i) => Some(*i as u32),
        _ => None,
    });

    let mut any_kind = false;
    for (key, value) in map {
        if SAFE_OUTPUT_GLOBAL_KEYS.contains(&key.as_str()) {
            continue;
        }
        any_kind = true;
        config.kinds.insert(key.clone(), value.clone());
    }

    config.threat_detection = map
        .get("threat-detection")
        .map(truthy)
        .unwrap_or(any_kind);

    config
}

fn build_sandbox(frontmatter: &Value) -> SandboxConfig {
    let Some(sandbox) = frontmatter.get("sandbox").and_then(Value::as_map) else {
        return SandboxConfig::default();
    };

    let network = match sandbox.get("network") {
        Some(Value::String(s)) if s == "defaults" => NetworkPolicy::Defaults,
        Some(Value::String(s)) if s == "none" => NetworkPolicy::None,
        Some(Value::Map(m)) => {
            let domains = m
                .get("allowed-domains")
                .and_then(Value::as_list)
                .map(|l| l.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            NetworkPolicy::Allowed(domains)
        }
        _ => NetworkPolicy::Unspecified,
    };

    SandboxConfig {
        network,
        mcp_gateway: sandbox.get("mcp").cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn fm(src: &str) -> Value {
        Value::from(serde_yaml::from_str::<serde_yaml::Value>(src).unwrap())
    }

    #[test]
    fn defaults_contents_read_permission() {
        let frontmatter = fm("on: push\n");
        let mut collector = DiagnosticCollector::new();
        let data = build(Path::new("wf.md"), &frontmatter, String::new(), vec![], &mut collector);
        assert_eq!(data.permissions.get("contents"), Some(&"read".to_string()));
    }

    #[test]
    fn explicit_permissions_are_kept() {
        let frontmatter = fm("on: push\npermissions:\n  contents: write\n  issues: write\n");
        let mut collector = DiagnosticCollector::new();
        let data = build(Path::new("wf.md"), &frontmatter, String::new(), vec![], &mut collector);
        assert_eq!(data.permissions.get("contents"), Some(&"write".to_string()));
        assert_eq!(data.permissions.get("issues"), Some(&"write".to_string()));
    }

    #[test]
    fn engine_string_form() {
        let frontmatter = fm("on: push\nengine: copilot\n");
        let mut collector = DiagnosticCollector::new();
        let data = build(Path::new("wf.md"), &frontmatter, String::new(), vec![], &mut collector);
        assert_eq!(data.engine.kind, EngineKind::Copilot);
    }

    #[test]
    fn engine_mapping_form_with_model() {
        let frontmatter = fm("on: push\nengine:\n  id: claude\n  model: opus\n  version: \"1\"\n");
        let mut collector = DiagnosticCollector::new();
        let data = build(Path::new("wf.md"), &frontmatter, String::new(), vec![], &mut collector);
        assert_eq!(data.engine.kind, EngineKind::Claude);
        assert_eq!(data.engine.model.as_deref(), Some("opus"));
    }

    #[test]
    fn missing_engine_defaults_with_warning() {
        let frontmatter = fm("on: push\n");
        let mut collector = DiagnosticCollector::new();
        let data = build(Path::new("wf.md"), &frontmatter, String::new(), vec![], &mut collector);
        assert_eq!(data.engine.kind, EngineKind::Claude);
        assert!(!collector.has_errors());
        assert_eq!(collector.into_vec().len(), 1);
    }

    #[test]
    fn bash_wildcard_expands_to_unrestricted() {
        let frontmatter = fm("on: push\ntools:\n  bash: [\"*\"]\n");
        let mut collector = DiagnosticCollector::new();
        let data = build(Path::new("wf.md"), &frontmatter, String::new(), vec![], &mut collector);
        assert_eq!(data.tools.bash, BashCapability::Unrestricted);
    }

    #[test]
    fn bash_command_list_is_preserved() {
        let frontmatter = fm("on: push\ntools:\n  bash: [\"ls\", \"cat\"]\n");
        let mut collector = DiagnosticCollector::new();
        let data = build(Path::new("wf.md"), &frontmatter, String::new(), vec![], &mut collector);
        assert_eq!(
            data.tools.bash,
            BashCapability::Commands(vec!["ls".to_string(), "cat".to_string()])
        );
    }

    #[test]
    fn create_pull_request_pulls_in_edit_and_git_commands() {
        let frontmatter = fm("on: push\nsafe-outputs:\n  create-pull-request:\n    max: 1\n");
        let mut collector = DiagnosticCollector::new();
        let data = build(Path::new("wf.md"), &frontmatter, String::new(), vec![], &mut collector);
        assert!(data.tools.edit);
        assert!(data.tools.write);
        assert!(matches!(data.tools.bash, BashCapability::Commands(_)));
    }

    #[test]
    fn threat_detection_defaults_on_when_any_safe_output_configured() {
        let frontmatter = fm("on: push\nsafe-outputs:\n  create-issue:\n    max: 1\n");
        let mut collector = DiagnosticCollector::new();
        let data = build(Path::new("wf.md"), &frontmatter, String::new(), vec![], &mut collector);
        assert!(data.safe_outputs.threat_detection);
    }

    #[test]
    fn no_safe_outputs_means_no_threat_detection() {
        let frontmatter = fm("on: push\n");
        let mut collector = DiagnosticCollector::new();
        let data = build(Path::new("wf.md"), &frontmatter, String::new(), vec![], &mut collector);
        assert!(!data.safe_outputs.threat_detection);
    }

    #[test]
    fn sandbox_network_defaults_string() {
        let frontmatter = fm("on: push\nsandbox:\n  network: defaults\n");
        let mut collector = DiagnosticCollector::new();
        let data = build(Path::new("wf.md"), &frontmatter, String::new(), vec![], &mut collector);
        assert_eq!(data.sandbox.network, NetworkPolicy::Defaults);
    }
}
