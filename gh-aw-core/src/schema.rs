//! Schema Validator: validates parsed frontmatter against the workflow,
//! shared-workflow, or campaign-spec JSON schema, plus strict-mode extras.

use std::path::Path;
use std::sync::OnceLock;

use crate::diagnostics::{Diagnostic, DiagnosticCollector, ErrorCode};
use crate::value::Value;

const WORKFLOW_SCHEMA: &str = include_str!("schemas/workflow.json");
const SHARED_WORKFLOW_SCHEMA: &str = include_str!("schemas/shared-workflow.json");
const CAMPAIGN_SPEC_SCHEMA: &str = include_str!("schemas/campaign-spec.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Workflow,
    SharedWorkflow,
    CampaignSpec,
}

impl SchemaKind {
    fn source(self) -> &'static str {
        match self {
            SchemaKind::Workflow => WORKFLOW_SCHEMA,
            SchemaKind::SharedWorkflow => SHARED_WORKFLOW_SCHEMA,
            SchemaKind::CampaignSpec => CAMPAIGN_SPEC_SCHEMA,
        }
    }

    fn validator(self) -> &'static jsonschema::Validator {
        static WORKFLOW: OnceLock<jsonschema::Validator> = OnceLock::new();
        static SHARED: OnceLock<jsonschema::Validator> = OnceLock::new();
        static CAMPAIGN: OnceLock<jsonschema::Validator> = OnceLock::new();

        let cell = match self {
            SchemaKind::Workflow => &WORKFLOW,
            SchemaKind::SharedWorkflow => &SHARED,
            SchemaKind::CampaignSpec => &CAMPAIGN,
        };
        cell.get_or_init(|| {
            let schema: serde_json::Value = serde_json::from_str(self.source())
                .expect("embedded schema document is valid JSON");
            jsonschema::validator_for(&schema).expect("embedded schema document compiles")
        })
    }
}

/// Chooses the schema to validate against: a file without an `on` field is
/// a shared workflow, validated against the relaxed schema.
pub fn select_kind(frontmatter: &Value, is_campaign: bool) -> SchemaKind {
    if is_campaign {
        SchemaKind::CampaignSpec
    } else if frontmatter.get("on").is_some() {
        SchemaKind::Workflow
    } else {
        SchemaKind::SharedWorkflow
    }
}

pub fn validate(
    path: &Path,
    frontmatter: &Value,
    kind: SchemaKind,
    strict: bool,
    collector: &mut DiagnosticCollector,
) {
    let instance: serde_json::Value = frontmatter.clone().into();
    let validator = kind.validator();

    for error in validator.iter_errors(&instance) {
        let field = error.instance_path.to_string();
        let field = if field.is_empty() { "<root>".to_string() } else { field };
        collector.push(Diagnostic::error(
            ErrorCode::SchemaViolation,
            path,
            format!("{field}: {error}"),
        ));
    }

    if let Some(map) = frontmatter.as_map() {
        let known = known_top_level_keys(kind);
        for key in map.keys() {
            if !known.contains(&key.as_str()) {
                let diag = Diagnostic::warning(
                    ErrorCode::SchemaViolation,
                    path,
                    format!("unknown top-level key '{key}'"),
                );
                if strict {
                    collector.push(Diagnostic {
                        severity: crate::diagnostics::Severity::Error,
                        ..diag
                    });
                } else {
                    collector.push(diag);
                }
            }
        }
    }

    if strict {
        validate_strict(path, frontmatter, collector);
    }
}

fn known_top_level_keys(kind: SchemaKind) -> &'static [&'static str] {
    match kind {
        SchemaKind::Workflow => &[
            "name",
            "description",
            "on",
            "permissions",
            "engine",
            "tools",
            "safe-outputs",
            "sandbox",
            "imports",
            "expires",
            "stop-after",
            "timeout-minutes",
            "network",
        ],
        SchemaKind::SharedWorkflow => &[
            "name",
            "description",
            "tools",
            "safe-outputs",
            "sandbox",
            "imports",
        ],
        SchemaKind::CampaignSpec => &[
            "id",
            "name",
            "workflows",
            "tracker-label",
            "allowed-safe-outputs",
            "approval-policy",
        ],
    }
}

fn validate_strict(path: &Path, frontmatter: &Value, collector: &mut DiagnosticCollector) {
    if let Some(permissions) = frontmatter.get("permissions").and_then(Value::as_map) {
        for (scope, level) in permissions {
            if level.as_str() == Some("write") {
                collector.push(Diagnostic::error(
                    ErrorCode::SchemaViolation,
                    path,
                    format!(
                        "strict mode forbids 'write' permission on '{scope}' outside the generated safe-output job"
                    ),
                ));
            }
        }
    }

    if frontmatter.get("network").is_none() {
        collector.push(Diagnostic::error(
            ErrorCode::SchemaViolation,
            path,
            "strict mode requires an explicit 'network' configuration",
        ));
    }

    let allowed_domains = frontmatter
        .get_path("sandbox.network.allowed-domains")
        .or_else(|| frontmatter.get_path("network.allowed-domains"));
    if let Some(Value::List(domains)) = allowed_domains {
        for domain in domains {
            if domain.as_str() == Some("*") {
                collector.push(Diagnostic::error(
                    ErrorCode::SchemaViolation,
                    path,
                    "strict mode forbids wildcard domains in 'allowed-domains'",
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn yaml(src: &str) -> Value {
        Value::from(serde_yaml::from_str::<serde_yaml::Value>(src).unwrap())
    }

    #[test]
    fn select_kind_shared_workflow_without_on() {
        let fm = yaml("tools:\n  bash: []\n");
        assert_eq!(select_kind(&fm, false), SchemaKind::SharedWorkflow);
    }

    #[test]
    fn select_kind_workflow_with_on() {
        let fm = yaml("on: push\n");
        assert_eq!(select_kind(&fm, false), SchemaKind::Workflow);
    }

    #[test]
    fn missing_required_on_is_schema_violation() {
        let fm = yaml("engine: copilot\n");
        let mut collector = DiagnosticCollector::new();
        validate(Path::new("wf.md"), &fm, SchemaKind::Workflow, false, &mut collector);
        assert!(collector.has_errors());
    }

    #[test]
    fn unknown_key_is_warning_unless_strict() {
        let fm = yaml("on: push\nbogus-field: 1\n");
        let mut collector = DiagnosticCollector::new();
        validate(Path::new("wf.md"), &fm, SchemaKind::Workflow, false, &mut collector);
        assert!(!collector.has_errors());

        let mut strict_collector = DiagnosticCollector::new();
        validate(Path::new("wf.md"), &fm, SchemaKind::Workflow, true, &mut strict_collector);
        assert!(strict_collector.has_errors());
    }

    #[test]
    fn strict_mode_forbids_write_permissions() {
        let fm = yaml("on: push\npermissions:\n  contents: write\nnetwork: defaults\n");
        let mut collector = DiagnosticCollector::new();
        validate(Path::new("wf.md"), &fm, SchemaKind::Workflow, true, &mut collector);
        assert!(collector.has_errors());
    }

    #[test]
    fn strict_mode_requires_network_config() {
        let fm = yaml("on: push\n");
        let mut collector = DiagnosticCollector::new();
        validate(Path::new("wf.md"), &fm, SchemaKind::Workflow, true, &mut collector);
        assert!(collector.iter().any(|d| d.message.contains("network")));
    }

    #[test]
    fn strict_mode_forbids_wildcard_domains() {
        let fm = yaml("on: push\nnetwork:\n  allowed-domains:\n    - \"*\"\n");
        let mut collector = DiagnosticCollector::new();
        validate(Path::new("wf.md"), &fm, SchemaKind::Workflow, true, &mut collector);
        assert!(collector.iter().any(|d| d.message.contains("wildcard")));
    }
}
