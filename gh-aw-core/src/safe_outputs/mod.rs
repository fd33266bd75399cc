//! Safe-Output Job Generator (spec §4.7): turns `safe-outputs:` frontmatter
//! into dedicated auxiliary jobs that run after the (read-only) agent job
//! with precisely the write permissions their kind requires.

pub mod kinds;
pub mod target;
pub mod threat_detection;

use std::path::Path;

use crate::diagnostics::{Diagnostic, DiagnosticCollector, ErrorCode};
use crate::gha::{Job, Step};
use crate::model::{SafeOutputsConfig, WorkflowData};
use crate::value::Value;
use kinds::{default_cap, required_permissions, Cap};
use target::{Target, TargetRepo};

const DEFAULT_RUNS_ON: &str = "ubuntu-latest";

#[derive(Debug, Clone)]
pub struct SafeOutputJob {
    pub kind: String,
    pub job_id: String,
    pub job: Job,
}

/// Builds one job per configured safe-output kind, plus the shared
/// threat-detection job when at least one is present.
pub fn build_jobs(
    path: &Path,
    data: &WorkflowData,
    collector: &mut DiagnosticCollector,
) -> Vec<SafeOutputJob> {
    let config = &data.safe_outputs;
    if config.kinds.is_empty() {
        return vec![];
    }

    let runs_on = config.runs_on.as_deref().unwrap_or(DEFAULT_RUNS_ON);
    let mut jobs = Vec::new();

    if config.threat_detection {
        jobs.push(SafeOutputJob {
            kind: "threat-detection".to_string(),
            job_id: threat_detection::JOB_ID.to_string(),
            job: threat_detection::build_job(runs_on),
        });
    }

    for (kind, raw_config) in &config.kinds {
        if let Some(job) = build_one(path, kind, raw_config, config, runs_on, collector) {
            jobs.push(job);
        }
    }

    jobs
}

fn build_one(
    path: &Path,
    kind: &str,
    raw_config: &Value,
    config: &SafeOutputsConfig,
    runs_on: &str,
    collector: &mut DiagnosticCollector,
) -> Option<SafeOutputJob> {
    let max = raw_config
        .as_map()
        .and_then(|m| m.get("max"))
        .and_then(|v| match v {
            Value::Int(n) if *n >= 0 => Some(*n as u32),
            _ => None,
        })
        .unwrap_or(1);

    let cap = default_cap(kind);
    if !cap.allows(max) {
        collector.push(Diagnostic::error(
            ErrorCode::SafeOutputConflict,
            path,
            format!("safe-outputs.{kind}.max ({max}) exceeds the per-kind cap ({cap})"),
        ));
        return None;
    }

    let target_repo = raw_config
        .as_map()
        .and_then(|m| m.get("target-repo"))
        .and_then(Value::as_str)
        .and_then(TargetRepo::parse);

    let target = Target::parse(raw_config.as_map().and_then(|m| m.get("target")));

    let mut permissions: Vec<(String, String)> = vec![("contents".to_string(), "read".to_string())];
    for (scope, level) in required_permissions(kind) {
        permissions.push((scope.to_string(), level.to_string()));
    }

    let job_id = kind.replace('-', "_");
    let mut if_condition = format!(
        "needs.agent.result == 'success' && contains(needs.agent.outputs.safe_output_kinds, '{kind}')"
    );
    if config.threat_detection {
        if_condition = format!("{} && {}", threat_detection::guard_expression(), if_condition);
    }

    let mut needs = vec!["agent".to_string()];
    if config.threat_detection {
        needs.push(threat_detection::JOB_ID.to_string());
    }

    if let Target::Literal(n) = target {
        if_condition.push_str(&format!(" && {n} > 0"));
    }

    let mut env = std::collections::BTreeMap::new();
    if let Some(repo) = &target_repo {
        env.insert(
            "GH_AW_TARGET_REPO".to_string(),
            format!("{}/{}", repo.owner, repo.repo),
        );
    }
    if let Some(token) = &config.github_token {
        env.insert("GH_AW_TARGET_TOKEN".to_string(), token.clone());
    }

    let step = Step::run(format!(
        "node /opt/gh-aw/safe-outputs/{kind}.cjs /tmp/gh-aw/safe-output.jsonl"
    ))
    .named(format!("Apply {kind}"));
    let mut step = step;
    step.env = env;

    let job = Job {
        name: Some(format!("Safe output: {kind}")),
        runs_on: runs_on.to_string(),
        needs,
        if_: Some(if_condition),
        permissions: permissions.into_iter().collect(),
        steps: vec![step],
        ..Default::default()
    };

    Some(SafeOutputJob {
        kind: kind.to_string(),
        job_id,
        job,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn data_with(safe_outputs_yaml: &str) -> WorkflowData {
        let src = format!("on: push\nsafe-outputs:\n{safe_outputs_yaml}");
        let frontmatter = Value::from(serde_yaml::from_str::<serde_yaml::Value>(&src).unwrap());
        crate::model::build(
            Path::new("wf.md"),
            &frontmatter,
            String::new(),
            vec![],
            &mut DiagnosticCollector::new(),
        )
    }

    #[test]
    fn no_safe_outputs_means_no_jobs() {
        let data = crate::model::build(
            Path::new("wf.md"),
            &Value::from(serde_yaml::from_str::<serde_yaml::Value>("on: push\n").unwrap()),
            String::new(),
            vec![],
            &mut DiagnosticCollector::new(),
        );
        let mut collector = DiagnosticCollector::new();
        assert!(build_jobs(Path::new("wf.md"), &data, &mut collector).is_empty());
    }

    #[test]
    fn single_kind_generates_job_and_threat_detection() {
        let data = data_with("  create-issue:\n    max: 1\n");
        let mut collector = DiagnosticCollector::new();
        let jobs = build_jobs(Path::new("wf.md"), &data, &mut collector);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].kind, "threat-detection");
        assert_eq!(jobs[1].kind, "create-issue");
        assert_eq!(jobs[1].job.needs, vec!["agent", "threat_detection"]);
        assert_eq!(jobs[1].job.permissions.get("issues"), Some(&"write".to_string()));
    }

    #[test]
    fn exceeding_cap_is_an_error_and_drops_job() {
        let data = data_with("  create-issue:\n    max: 5\n");
        let mut collector = DiagnosticCollector::new();
        let jobs = build_jobs(Path::new("wf.md"), &data, &mut collector);
        assert!(collector.has_errors());
        assert!(jobs.iter().all(|j| j.kind != "create-issue"));
    }

    #[test]
    fn update_project_allows_up_to_ten() {
        let data = data_with("  update-project:\n    max: 10\n");
        let mut collector = DiagnosticCollector::new();
        let jobs = build_jobs(Path::new("wf.md"), &data, &mut collector);
        assert!(!collector.has_errors());
        assert!(jobs.iter().any(|j| j.kind == "update-project"));
    }

    #[test]
    fn target_repo_sets_env_var() {
        let data = data_with("  create-issue:\n    target-repo: other-org/other-repo\n");
        let mut collector = DiagnosticCollector::new();
        let jobs = build_jobs(Path::new("wf.md"), &data, &mut collector);
        let job = jobs.iter().find(|j| j.kind == "create-issue").unwrap();
        assert_eq!(
            job.job.steps[0].env.get("GH_AW_TARGET_REPO"),
            Some(&"other-org/other-repo".to_string())
        );
    }
}
