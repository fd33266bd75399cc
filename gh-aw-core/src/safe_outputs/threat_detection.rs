//! Threat-detection job: scans agent output for prompt-injection markers,
//! leaked secrets, and suspicious patches before any safe-output job runs
//! (spec §4.7).

use crate::gha::{Job, Step};

pub const JOB_ID: &str = "threat_detection";

/// Built whenever at least one safe output is configured, unless the
/// author explicitly opted out with `safe-outputs.threat-detection: false`.
pub fn build_job(runs_on: &str) -> Job {
    let step = Step::run("node /opt/gh-aw/threat-detection.cjs < /tmp/gh-aw/safe-output.jsonl")
        .named("Scan agent output for threats");

    Job {
        name: Some("Detect threats".to_string()),
        runs_on: runs_on.to_string(),
        needs: vec!["agent".to_string()],
        if_: Some("needs.agent.result == 'success'".to_string()),
        permissions: [("contents".to_string(), "read".to_string())].into_iter().collect(),
        steps: vec![step],
        ..Default::default()
    }
}

/// The `if:` expression a downstream safe-output job gets appended to
/// skip itself when the threat-detection job flagged the run.
pub fn guard_expression() -> &'static str {
    "needs.threat_detection.result == 'success' && needs.threat_detection.outputs.flagged != 'true'"
}
