//! Campaign Coordinator (spec §4.9): generates a coordinator workflow that
//! discovers work items and dispatches per-worker jobs, plus scaffolding
//! that prepends the campaign id/label to each worker's safe outputs.

use std::collections::BTreeMap;
use std::path::Path;

use crate::diagnostics::{Diagnostic, DiagnosticCollector, ErrorCode};
use crate::gha::{Job, Jobs, Step, WorkflowDocument};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct CampaignSpec {
    pub id: String,
    pub name: String,
    pub workflows: Vec<String>,
    pub tracker_label: String,
    pub allowed_safe_outputs: Vec<String>,
    pub approval_policy: Option<String>,
}

pub fn parse(path: &Path, frontmatter: &Value, collector: &mut DiagnosticCollector) -> Option<CampaignSpec> {
    let id = frontmatter.get("id").and_then(Value::as_str).map(str::to_string);
    let name = frontmatter.get("name").and_then(Value::as_str).map(str::to_string);
    let tracker_label = frontmatter
        .get("tracker-label")
        .and_then(Value::as_str)
        .map(str::to_string);
    let workflows: Vec<String> = frontmatter
        .get("workflows")
        .and_then(Value::as_list)
        .map(|l| l.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    let (Some(id), Some(name), Some(tracker_label)) = (id, name, tracker_label) else {
        collector.push(Diagnostic::error(
            ErrorCode::CampaignInvalid,
            path,
            "campaign spec requires 'id', 'name', and 'tracker-label'",
        ));
        return None;
    };
    if workflows.is_empty() {
        collector.push(Diagnostic::error(
            ErrorCode::CampaignInvalid,
            path,
            "campaign spec requires at least one entry in 'workflows'",
        ));
        return None;
    }

    let allowed_safe_outputs = frontmatter
        .get("allowed-safe-outputs")
        .and_then(Value::as_list)
        .map(|l| l.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let approval_policy = frontmatter
        .get("approval-policy")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(CampaignSpec {
        id,
        name,
        workflows,
        tracker_label,
        allowed_safe_outputs,
        approval_policy,
    })
}

/// Builds the coordinator workflow: discovers work items matching the
/// tracker label, then dispatches each named worker workflow against them.
pub fn build_coordinator(spec: &CampaignSpec) -> WorkflowDocument {
    let discover = Step::run(format!(
        "gh issue list --label '{}' --json number,title,url --jq '.' > /tmp/gh-aw/campaign-items.json",
        spec.tracker_label
    ))
    .named("Discover campaign work items");

    let mut dispatch_steps = vec![discover];
    for workflow in &spec.workflows {
        dispatch_steps.push(
            Step::uses("actions/github-script@v7")
                .named(format!("Dispatch {workflow}"))
                .with_with([(
                    "script".to_string(),
                    format!(
                        "for (const item of JSON.parse(require('fs').readFileSync('/tmp/gh-aw/campaign-items.json'))) {{ await github.rest.actions.createWorkflowDispatch({{ owner: context.repo.owner, repo: context.repo.repo, workflow_id: '{workflow}', ref: context.ref, inputs: {{ campaign_id: '{}', item: String(item.number) }} }}); }}",
                        spec.id
                    ),
                )]),
        );
    }

    let job = Job {
        name: Some(format!("Campaign coordinator: {}", spec.name)),
        runs_on: "ubuntu-latest".to_string(),
        permissions: [
            ("contents".to_string(), "read".to_string()),
            ("actions".to_string(), "write".to_string()),
            ("issues".to_string(), "read".to_string()),
        ]
        .into_iter()
        .collect(),
        steps: dispatch_steps,
        ..Default::default()
    };

    let mut jobs = Jobs::default();
    jobs.push("coordinate", job);

    WorkflowDocument {
        name: Some(format!("Campaign: {}", spec.name)),
        on: serde_yaml::Value::String("workflow_dispatch".to_string()),
        permissions: BTreeMap::new(),
        concurrency: None,
        env: BTreeMap::new(),
        defaults: None,
        jobs,
    }
}

/// Prepends the campaign id and tracker label to a worker's safe-output
/// kind config so aggregated items are attributable to the campaign run.
pub fn scaffold_worker_safe_outputs(spec: &CampaignSpec, kind: &str, mut raw_config: Value) -> Value {
    if !spec.allowed_safe_outputs.is_empty() && !spec.allowed_safe_outputs.iter().any(|k| k == kind) {
        return raw_config;
    }
    if let Value::Map(map) = &mut raw_config {
        map.entry("campaign-id".to_string()).or_insert_with(|| Value::String(spec.id.clone()));
        let labels = map.entry("labels".to_string()).or_insert_with(|| Value::List(vec![]));
        if let Value::List(list) = labels {
            let label = Value::String(spec.tracker_label.clone());
            if !list.contains(&label) {
                list.push(label);
            }
        }
    }
    raw_config
}

trait StepWithExt {
    fn with_with(self, pairs: impl IntoIterator<Item = (String, String)>) -> Self;
}

impl StepWithExt for Step {
    fn with_with(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.with = pairs.into_iter().collect();
        self
    }
}
