//! Emitter (spec §4.8): renders the final workflow YAML with stable key
//! ordering, SHA-pinned `uses:` lines, and a generated header comment.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::action_ref::ActionRef;
use crate::actions_lock::ActionsLock;
use crate::diagnostics::{Diagnostic, DiagnosticCollector, ErrorCode};
use crate::gha::{Job, Step, WorkflowDocument};
use crate::import::ResolvedImport;

pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Computes the fingerprint hash over the resolved input graph: the entry
/// source plus every transitively-resolved import, in resolution order.
pub fn fingerprint(entry_source: &str, imports: &[ResolvedImport]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entry_source.as_bytes());
    for import in imports {
        hasher.update(import.spec.to_string().as_bytes());
        hasher.update(import.content.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub fn header_comment(source_path: &Path, entry_source: &str, imports: &[ResolvedImport]) -> String {
    format!(
        "# This file was automatically generated by gh-aw. DO NOT EDIT.\n# source: {}\n# compiler: {COMPILER_VERSION}\n# fingerprint: {}\n",
        source_path.display(),
        fingerprint(entry_source, imports),
    )
}

/// Rewrites every `uses:` step in every job to its SHA-pinned form, reading
/// the pin from `lock`. In strict mode, a `uses:` the lock doesn't cover is
/// an error; otherwise a warning with an inline comment is left in place.
pub fn pin_actions(
    jobs: &mut [Job],
    lock: &ActionsLock,
    strict: bool,
    source_path: &Path,
    collector: &mut DiagnosticCollector,
) {
    for job in jobs {
        for step in &mut job.steps {
            pin_step(step, lock, strict, source_path, collector);
        }
    }
}

fn pin_step(step: &mut Step, lock: &ActionsLock, strict: bool, source_path: &Path, collector: &mut DiagnosticCollector) {
    let Some(uses) = step.uses.clone() else { return };
    let Ok(action_ref) = uses.parse::<ActionRef>() else {
        return;
    };
    if action_ref.is_pinned() {
        return;
    }

    match lock.resolve(&action_ref) {
        Some(entry) => {
            step.uses = Some(action_ref.pinned_uses_line(&entry.sha));
        }
        None => {
            let message = format!(
                "actions lock does not cover '{}'; run `gh-aw update --actions`",
                action_ref.repo_key()
            );
            if strict {
                collector.push(Diagnostic::error(ErrorCode::ImportShaMismatch, source_path, message));
            } else {
                collector.push(Diagnostic::warning(ErrorCode::ImportShaMismatch, source_path, &message));
                step.uses = Some(format!("{uses}  # UNPINNED: {message}"));
            }
        }
    }
}

pub fn render(document: &WorkflowDocument, header: &str) -> anyhow::Result<String> {
    let body = serde_yaml::to_string(document)?;
    Ok(format!("{header}\n{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::gha::Jobs;
    use crate::import::ImportSpec;

    #[test]
    fn fingerprint_is_stable_for_same_inputs() {
        let imports = vec![ResolvedImport {
            spec: ImportSpec::Local("shared.md".to_string()),
            content: "shared".to_string(),
            commit_sha: None,
            local_cache_path: None,
        }];
        let a = fingerprint("entry", &imports);
        let b = fingerprint("entry", &imports);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_changes_with_import_content() {
        let imports_v1 = vec![ResolvedImport {
            spec: ImportSpec::Local("shared.md".to_string()),
            content: "v1".to_string(),
            commit_sha: None,
            local_cache_path: None,
        }];
        let imports_v2 = vec![ResolvedImport {
            spec: ImportSpec::Local("shared.md".to_string()),
            content: "v2".to_string(),
            commit_sha: None,
            local_cache_path: None,
        }];
        assert_ne!(fingerprint("entry", &imports_v1), fingerprint("entry", &imports_v2));
    }

    #[test]
    fn pin_actions_rewrites_covered_step() {
        let mut lock = ActionsLock::default();
        let ar: ActionRef = "actions/checkout@v4".parse().unwrap();
        lock.set(&ar, "4".to_string(), "b4ffde65f46336ab88eb53be808477a3936bae11".to_string());

        let mut jobs = vec![Job {
            runs_on: "ubuntu-latest".into(),
            steps: vec![Step::uses("actions/checkout@v4")],
            ..Default::default()
        }];
        let mut collector = DiagnosticCollector::new();
        pin_actions(&mut jobs, &lock, false, Path::new("wf.md"), &mut collector);
        assert_eq!(
            jobs[0].steps[0].uses.as_deref(),
            Some("actions/checkout@b4ffde65f46336ab88eb53be808477a3936bae11  # v4")
        );
        assert!(!collector.has_errors());
    }

    #[test]
    fn strict_mode_errors_on_uncovered_action() {
        let lock = ActionsLock::default();
        let mut jobs = vec![Job {
            runs_on: "ubuntu-latest".into(),
            steps: vec![Step::uses("actions/checkout@v4")],
            ..Default::default()
        }];
        let mut collector = DiagnosticCollector::new();
        pin_actions(&mut jobs, &lock, true, Path::new("wf.md"), &mut collector);
        assert!(collector.has_errors());
    }

    #[test]
    fn non_strict_mode_warns_and_leaves_inline_comment() {
        let lock = ActionsLock::default();
        let mut jobs = vec![Job {
            runs_on: "ubuntu-latest".into(),
            steps: vec![Step::uses("actions/checkout@v4")],
            ..Default::default()
        }];
        let mut collector = DiagnosticCollector::new();
        pin_actions(&mut jobs, &lock, false, Path::new("wf.md"), &mut collector);
        assert!(!collector.has_errors());
        assert!(jobs[0].steps[0].uses.as_deref().unwrap().contains("UNPINNED"));
    }

    #[test]
    fn render_includes_header_before_yaml() {
        let document = WorkflowDocument {
            name: Some("wf".to_string()),
            on: serde_yaml::Value::String("push".to_string()),
            permissions: BTreeMap::new(),
            concurrency: None,
            env: BTreeMap::new(),
            defaults: None,
            jobs: Jobs::default(),
        };
        let rendered = render(&document, "# header").unwrap();
        assert!(rendered.starts_with("# header"));
        assert!(rendered.contains("name: wf"));
    }
}
