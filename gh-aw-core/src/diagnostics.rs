//! Stable, machine-readable diagnostics.
//!
//! Every problem the pipeline finds — parse failure, schema violation,
//! forbidden expression, import cycle — becomes a `Diagnostic` carrying a
//! stable `ErrorCode` rather than a free-form string, so `--json` output
//! and downstream tooling can match on identifiers that don't drift with
//! wording changes.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Parse,
    Schema,
    Import,
    Expression,
    Semantic,
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Parse => "parse",
            ErrorCategory::Schema => "schema",
            ErrorCategory::Import => "import",
            ErrorCategory::Expression => "expression",
            ErrorCategory::Semantic => "semantic",
            ErrorCategory::Io => "io",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    FrontmatterUnterminated,
    FrontmatterNotMapping,
    YamlSyntax,
    MarkdownInclude,
    SchemaViolation,
    ImportNotFound,
    ImportCycle,
    ImportFetchFailed,
    ImportShaMismatch,
    ForbiddenExpression,
    UnknownContext,
    ToolUndefined,
    SafeOutputConflict,
    CampaignInvalid,
    ReadFailed,
    WriteFailed,
    LockContended,
}

impl ErrorCode {
    pub fn category(self) -> ErrorCategory {
        use ErrorCode::*;
        match self {
            FrontmatterUnterminated | FrontmatterNotMapping | YamlSyntax | MarkdownInclude => {
                ErrorCategory::Parse
            }
            SchemaViolation => ErrorCategory::Schema,
            ImportNotFound | ImportCycle | ImportFetchFailed | ImportShaMismatch => {
                ErrorCategory::Import
            }
            ForbiddenExpression | UnknownContext => ErrorCategory::Expression,
            ToolUndefined | SafeOutputConflict | CampaignInvalid => ErrorCategory::Semantic,
            ReadFailed | WriteFailed | LockContended => ErrorCategory::Io,
        }
    }

    pub fn as_str(self) -> &'static str {
        use ErrorCode::*;
        match self {
            FrontmatterUnterminated => "FRONTMATTER_UNTERMINATED",
            FrontmatterNotMapping => "FRONTMATTER_NOT_MAPPING",
            YamlSyntax => "YAML_SYNTAX",
            MarkdownInclude => "MARKDOWN_INCLUDE",
            SchemaViolation => "SCHEMA_VIOLATION",
            ImportNotFound => "IMPORT_NOT_FOUND",
            ImportCycle => "IMPORT_CYCLE",
            ImportFetchFailed => "IMPORT_FETCH_FAILED",
            ImportShaMismatch => "IMPORT_SHA_MISMATCH",
            ForbiddenExpression => "FORBIDDEN_EXPRESSION",
            UnknownContext => "UNKNOWN_CONTEXT",
            ToolUndefined => "TOOL_UNDEFINED",
            SafeOutputConflict => "SAFE_OUTPUT_CONFLICT",
            CampaignInvalid => "CAMPAIGN_INVALID",
            ReadFailed => "READ_FAILED",
            WriteFailed => "WRITE_FAILED",
            LockContended => "LOCK_CONTENDED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    pub file: PathBuf,
    pub line: Option<usize>,
}

impl Diagnostic {
    pub fn error(code: ErrorCode, file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            file: file.into(),
            line: None,
        }
    }

    pub fn warning(code: ErrorCode, file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Warning,
            message: message.into(),
            file: file.into(),
            line: None,
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.file.display())?;
        if let Some(line) = self.line {
            write!(f, "{line}:")?;
        }
        write!(f, " [{}] {}", self.code, self.message)
    }
}

/// An unexpected stage failure (panics aside), distinct from a `Diagnostic`:
/// these represent pipeline infrastructure problems, not source-file defects.
#[derive(Debug, Clone)]
pub struct StageError {
    pub stage: String,
    pub message: String,
}

/// Passed by `&mut` through every stage; stages append, never propagate early.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn has_errors_in_strict(&self, strict: bool) -> bool {
        self.has_errors() || (strict && self.iter().any(|d| d.severity == Severity::Warning))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn extend(&mut self, other: DiagnosticCollector) {
        self.diagnostics.extend(other.diagnostics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_groups_match_spec() {
        assert_eq!(ErrorCode::ImportCycle.category(), ErrorCategory::Import);
        assert_eq!(
            ErrorCode::ForbiddenExpression.category(),
            ErrorCategory::Expression
        );
        assert_eq!(ErrorCode::LockContended.category(), ErrorCategory::Io);
    }

    #[test]
    fn serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::ImportCycle).unwrap();
        assert_eq!(json, "\"IMPORT_CYCLE\"");
    }

    #[test]
    fn collector_tracks_errors_vs_warnings() {
        let mut collector = DiagnosticCollector::new();
        assert!(!collector.has_errors());
        collector.push(Diagnostic::warning(ErrorCode::ToolUndefined, "a.md", "unused"));
        assert!(!collector.has_errors());
        assert!(collector.has_errors_in_strict(true));
        collector.push(Diagnostic::error(ErrorCode::ImportCycle, "a.md", "a -> b -> a"));
        assert!(collector.has_errors());
    }

    #[test]
    fn display_includes_code_and_location() {
        let d = Diagnostic::error(ErrorCode::ImportCycle, "a.md", "cycle").with_line(12);
        let rendered = d.to_string();
        assert!(rendered.contains("IMPORT_CYCLE"));
        assert!(rendered.contains("a.md:12"));
    }
}
