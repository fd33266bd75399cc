//! Per-file compile state threaded through the pipeline's stages
//! (spec §5: "within one source file, the pipeline is strictly sequential").

use std::path::PathBuf;

use crate::diagnostics::{DiagnosticCollector, StageError};
use crate::expression::ExpressionRewrite;
use crate::gha::WorkflowDocument;
use crate::import::ResolvedImport;
use crate::model::WorkflowData;
use crate::value::Value;

pub struct CompileContext {
    pub path: PathBuf,
    pub strict: bool,
    pub raw_source: String,
    pub frontmatter: Value,
    pub markdown_body: String,
    pub body_line_offset: usize,
    pub imports: Vec<ResolvedImport>,
    /// Untrusted-context expressions rewritten to env-var indirection by
    /// `ExpressionStage`; `RenderStage` wires these into the agent job's
    /// `env:` so the indirection actually resolves at runtime.
    pub expression_rewrites: Vec<ExpressionRewrite>,
    pub data: Option<WorkflowData>,
    pub document: Option<WorkflowDocument>,
    pub diagnostics: DiagnosticCollector,
    pub stage_errors: Vec<StageError>,
    pub rendered_yaml: Option<String>,
}

impl CompileContext {
    pub fn new(path: PathBuf, strict: bool) -> Self {
        Self {
            path,
            strict,
            raw_source: String::new(),
            frontmatter: Value::Null,
            markdown_body: String::new(),
            body_line_offset: 0,
            imports: Vec::new(),
            expression_rewrites: Vec::new(),
            data: None,
            document: None,
            diagnostics: DiagnosticCollector::new(),
            stage_errors: Vec::new(),
            rendered_yaml: None,
        }
    }

    pub fn failed(&self) -> bool {
        self.diagnostics.has_errors_in_strict(self.strict) || !self.stage_errors.is_empty()
    }
}
