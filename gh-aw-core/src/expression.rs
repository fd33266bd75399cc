//! Expression Validator (spec §4.4): every `${{ ... }}` expression in the
//! normalized model and the Markdown body must match a small allow-list
//! grammar. Anything outside it is a hard error — agent-authored prompts
//! are data, and unrestricted secret access inside a prompt is a
//! secret-exfiltration primitive.

use std::path::Path;

use crate::diagnostics::{Diagnostic, DiagnosticCollector, ErrorCode};
use crate::value::Value;

/// Secrets reachable via `secrets.X` beyond the always-allowed `GITHUB_TOKEN`.
/// Populated from `safe-outputs.*.github-token` overrides and app-token
/// inputs discovered in the frontmatter; anything else is forbidden.
#[derive(Debug, Clone, Default)]
pub struct SecretAllowList {
    extra: Vec<String>,
}

impl SecretAllowList {
    pub fn from_frontmatter(frontmatter: &Value) -> Self {
        let mut extra = Vec::new();
        if let Some(safe_outputs) = frontmatter.get("safe-outputs").and_then(Value::as_map) {
            for kind_config in safe_outputs.values() {
                if let Some(token) = kind_config
                    .get("github-token")
                    .and_then(Value::as_str)
                {
                    if let Some(name) = extract_secret_name(token) {
                        extra.push(name.to_string());
                    }
                }
            }
        }
        if let Some(inputs) = frontmatter.get("inputs").and_then(Value::as_map) {
            for (name, spec) in inputs {
                let is_app_token = spec
                    .get("app-token")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if is_app_token {
                    extra.push(name.clone());
                }
            }
        }
        Self { extra }
    }

    fn allows(&self, secret_name: &str) -> bool {
        secret_name == "GITHUB_TOKEN" || self.extra.iter().any(|s| s == secret_name)
    }
}

/// `${{ secrets.FOO }}` -> `FOO`, if the raw string is exactly a secrets reference.
fn extract_secret_name(raw: &str) -> Option<&str> {
    let inner = raw.trim().strip_prefix("${{")?.strip_suffix("}}")?.trim();
    inner.strip_prefix("secrets.").map(str::trim)
}

const ALLOWED_CONTEXTS: &[&str] = &[
    "github", "inputs", "vars", "env", "steps", "runner", "matrix", "needs",
];

const ALLOWED_FUNCTIONS: &[&str] = &[
    "contains", "startswith", "endswith", "join", "tojson", "fromjson", "format",
];

/// Untrusted-input contexts that trigger the env-var-indirection rewrite
/// instead of an outright failure (spec §4.4 "additional checks").
const UNTRUSTED_CONTEXTS: &[&str] = &[
    "github.event.issue.body",
    "github.event.comment.body",
    "github.event.pull_request.body",
    "github.event.discussion.body",
    "github.event.review.body",
];

#[derive(Debug, Clone)]
pub struct ExpressionRewrite {
    pub original: String,
    pub env_var_name: String,
}

pub struct ExpressionReport {
    pub rewrites: Vec<ExpressionRewrite>,
}

/// Scans every string in `frontmatter` (post-merge) and every line of
/// `body` for `${{ ... }}` expressions.
pub fn validate(
    path: &Path,
    frontmatter: &Value,
    body: &str,
    allow_list: &SecretAllowList,
    collector: &mut DiagnosticCollector,
) -> ExpressionReport {
    let mut strings: Vec<&str> = Vec::new();
    frontmatter.walk_strings(&mut strings);

    let mut rewrites = Vec::new();
    for s in strings {
        check_expressions_in(path, s, None, allow_list, collector, &mut rewrites);
    }
    for (lineno, line) in body.lines().enumerate() {
        check_expressions_in(path, line, Some(lineno + 1), allow_list, collector, &mut rewrites);
    }

    ExpressionReport { rewrites }
}

fn check_expressions_in(
    path: &Path,
    text: &str,
    line: Option<usize>,
    allow_list: &SecretAllowList,
    collector: &mut DiagnosticCollector,
    rewrites: &mut Vec<ExpressionRewrite>,
) {
    for expr in find_expressions(text) {
        match classify(&expr, allow_list) {
            Classification::Allowed => {}
            Classification::UntrustedButIndirectable => {
                rewrites.push(ExpressionRewrite {
                    original: expr.clone(),
                    env_var_name: env_var_name_for(&expr),
                });
            }
            Classification::Forbidden(reason) => {
                let mut diag = Diagnostic::error(
                    ErrorCode::ForbiddenExpression,
                    path,
                    format!("expression '{{{{ {expr} }}}}' is not allowed: {reason}"),
                );
                if let Some(l) = line {
                    diag = diag.with_line(l);
                }
                collector.push(diag);
            }
        }
    }
}

/// Extracts the inner text of every `${{ ... }}` occurrence in `text`.
fn find_expressions(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("${{") {
        let after = &rest[start + 3..];
        if let Some(end) = after.find("}}") {
            out.push(after[..end].trim().to_string());
            rest = &after[end + 2..];
        } else {
            break;
        }
    }
    out
}

enum Classification {
    Allowed,
    UntrustedButIndirectable,
    Forbidden(String),
}

fn classify(expr: &str, allow_list: &SecretAllowList) -> Classification {
    let lower = expr.to_ascii_lowercase();

    // A `secrets.X` reference anywhere in the expression is a potential
    // exfiltration primitive, not just when it's the whole expression —
    // `format('{0}', secrets.X)` and `contains(secrets.X, 'y')` smuggle it
    // through a whitelisted function just as easily as a bare reference.
    for secret_name in find_secret_names(expr) {
        if !allow_list.allows(secret_name) {
            return Classification::Forbidden(format!("'secrets.{secret_name}' is not whitelisted"));
        }
    }

    if UNTRUSTED_CONTEXTS.iter().any(|c| lower.starts_with(c)) {
        return Classification::UntrustedButIndirectable;
    }

    let root = lower.split(['.', '(', ' ']).next().unwrap_or("");
    if root == "secrets" || ALLOWED_CONTEXTS.contains(&root) {
        return Classification::Allowed;
    }
    if ALLOWED_FUNCTIONS.iter().any(|f| lower.starts_with(f)) {
        return Classification::Allowed;
    }
    if is_arithmetic_or_comparison(&lower) {
        return Classification::Allowed;
    }

    Classification::Forbidden(format!("unknown context '{root}'"))
}

/// Every `secrets.NAME` occurrence anywhere in `expr`, not just a whole-expr match.
fn find_secret_names(expr: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = expr;
    while let Some(idx) = rest.find("secrets.") {
        let after = &rest[idx + "secrets.".len()..];
        let end = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        out.push(&after[..end]);
        rest = &after[end..];
    }
    out
}

fn is_arithmetic_or_comparison(expr: &str) -> bool {
    expr.chars()
        .all(|c| c.is_ascii_digit() || "+-*/()<>=! .".contains(c))
        && !expr.trim().is_empty()
}

fn env_var_name_for(expr: &str) -> String {
    let sanitized: String = expr
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("GH_AW_EXPR_{sanitized}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn fm(src: &str) -> Value {
        Value::from(serde_yaml::from_str::<serde_yaml::Value>(src).unwrap())
    }

    #[test]
    fn github_token_is_always_allowed() {
        let allow_list = SecretAllowList::default();
        let mut collector = DiagnosticCollector::new();
        validate(
            Path::new("wf.md"),
            &Value::Map(Default::default()),
            "Token: ${{ secrets.GITHUB_TOKEN }}",
            &allow_list,
            &mut collector,
        );
        assert!(!collector.has_errors());
    }

    #[test]
    fn unwhitelisted_secret_is_forbidden() {
        let allow_list = SecretAllowList::default();
        let mut collector = DiagnosticCollector::new();
        validate(
            Path::new("wf.md"),
            &Value::Map(Default::default()),
            "Token: ${{ secrets.MY_CUSTOM }}",
            &allow_list,
            &mut collector,
        );
        assert!(collector.has_errors());
        assert_eq!(collector.into_vec()[0].code, ErrorCode::ForbiddenExpression);
    }

    #[test]
    fn allow_listed_secret_from_safe_outputs_passes() {
        let frontmatter = fm("safe-outputs:\n  create-issue:\n    github-token: \"${{ secrets.MY_CUSTOM }}\"\n");
        let allow_list = SecretAllowList::from_frontmatter(&frontmatter);
        let mut collector = DiagnosticCollector::new();
        validate(
            Path::new("wf.md"),
            &Value::Map(Default::default()),
            "${{ secrets.MY_CUSTOM }}",
            &allow_list,
            &mut collector,
        );
        assert!(!collector.has_errors());
    }

    #[test]
    fn known_contexts_are_allowed() {
        let allow_list = SecretAllowList::default();
        let mut collector = DiagnosticCollector::new();
        validate(
            Path::new("wf.md"),
            &Value::Map(Default::default()),
            "${{ github.event.issue.number }} ${{ steps.foo.outputs.bar }}",
            &allow_list,
            &mut collector,
        );
        assert!(!collector.has_errors());
    }

    #[test]
    fn functions_are_allowed() {
        let allow_list = SecretAllowList::default();
        let mut collector = DiagnosticCollector::new();
        validate(
            Path::new("wf.md"),
            &Value::Map(Default::default()),
            "${{ contains(github.event.issue.labels.*.name, 'bug') }}",
            &allow_list,
            &mut collector,
        );
        assert!(!collector.has_errors());
    }

    #[test]
    fn unknown_context_is_forbidden() {
        let allow_list = SecretAllowList::default();
        let mut collector = DiagnosticCollector::new();
        validate(
            Path::new("wf.md"),
            &Value::Map(Default::default()),
            "${{ nonsense.value }}",
            &allow_list,
            &mut collector,
        );
        assert!(collector.has_errors());
        assert_eq!(collector.into_vec()[0].code, ErrorCode::ForbiddenExpression);
    }

    #[test]
    fn unwhitelisted_secret_inside_allowed_function_is_still_forbidden() {
        let allow_list = SecretAllowList::default();
        let mut collector = DiagnosticCollector::new();
        validate(
            Path::new("wf.md"),
            &Value::Map(Default::default()),
            "${{ format('{0}', secrets.MY_CUSTOM) }}",
            &allow_list,
            &mut collector,
        );
        assert!(collector.has_errors());
        assert_eq!(collector.into_vec()[0].code, ErrorCode::ForbiddenExpression);
    }

    #[test]
    fn unwhitelisted_secret_inside_contains_is_still_forbidden() {
        let allow_list = SecretAllowList::default();
        let mut collector = DiagnosticCollector::new();
        validate(
            Path::new("wf.md"),
            &Value::Map(Default::default()),
            "${{ contains(secrets.MY_CUSTOM, 'x') }}",
            &allow_list,
            &mut collector,
        );
        assert!(collector.has_errors());
        assert_eq!(collector.into_vec()[0].code, ErrorCode::ForbiddenExpression);
    }

    #[test]
    fn untrusted_body_context_is_rewritten_not_rejected() {
        let allow_list = SecretAllowList::default();
        let mut collector = DiagnosticCollector::new();
        let report = validate(
            Path::new("wf.md"),
            &Value::Map(Default::default()),
            "${{ github.event.issue.body }}",
            &allow_list,
            &mut collector,
        );
        assert!(!collector.has_errors());
        assert_eq!(report.rewrites.len(), 1);
    }
}
