//! Compiles Markdown-with-YAML-frontmatter agentic workflow sources into
//! GitHub Actions workflow YAML.

pub mod action_ref;
pub mod actions_lock;
pub mod campaign;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod emit;
pub mod engine;
pub mod expression;
pub mod frontmatter;
pub mod gha;
pub mod import;
pub mod model;
pub mod pipeline;
pub mod safe_outputs;
pub mod sandbox;
pub mod schema;
pub mod stage;
pub mod stages;
pub mod value;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use campaign::CampaignSpec;
use config::Config;
use context::CompileContext;
use diagnostics::DiagnosticCollector;
use import::{GitHubClient, ImportCache};
use pipeline::Pipeline;
use value::Value;

/// Every `.md` file under `.github/workflows`, skipping the `shared/`
/// subtree (import targets, not standalone sources).
fn walk_markdown_sources(workspace_root: &Path) -> Vec<PathBuf> {
    let root = workspace_root.join(".github/workflows");
    if !root.is_dir() {
        return vec![];
    }
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(&root).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "md")
            && !path.components().any(|c| c.as_os_str() == "shared")
        {
            out.push(path.to_path_buf());
        }
    }
    out.sort();
    out
}

/// A campaign spec declares `workflows`/`tracker-label` and no `on:`
/// trigger; anything else discovered under `.github/workflows` is a
/// workflow source.
pub fn is_campaign_spec(frontmatter: &Value) -> bool {
    frontmatter.get("on").is_none() && frontmatter.get("workflows").is_some()
}

/// Discovers every candidate workflow source under `workspace_root`
/// (`.github/workflows/*.md`, skipping the `shared/` subtree and any
/// campaign specs, which are compiled separately by [`compile_campaigns`]).
pub fn discover_sources(workspace_root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in walk_markdown_sources(workspace_root) {
        let raw = std::fs::read_to_string(&path)?;
        let is_campaign = frontmatter::parse(&path, &raw)
            .map(|parsed| is_campaign_spec(&parsed.frontmatter))
            .unwrap_or(false);
        if !is_campaign {
            out.push(path);
        }
    }
    Ok(out)
}

/// Discovers every campaign spec under `workspace_root`.
pub fn discover_campaign_sources(workspace_root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in walk_markdown_sources(workspace_root) {
        let raw = std::fs::read_to_string(&path)?;
        let is_campaign = frontmatter::parse(&path, &raw)
            .map(|parsed| is_campaign_spec(&parsed.frontmatter))
            .unwrap_or(false);
        if is_campaign {
            out.push(path);
        }
    }
    Ok(out)
}

/// Builds the standard compile pipeline (spec §4.1-§4.8 in sequence), with
/// scaffolding applied to any path named in `membership` (spec §4.9).
pub fn build_pipeline(workspace_root: &Path, config: &Config, membership: BTreeMap<PathBuf, CampaignSpec>) -> Pipeline {
    build_pipeline_without_emit(workspace_root, config, membership)
        .stage(stages::EmitStage::new(config.actions_lock_path.clone()))
        .build()
}

/// The same stage sequence as [`build_pipeline`] but stopping before the
/// Emitter, so callers can inspect a file's rendered [`gha::WorkflowDocument`]
/// with its `uses:` lines still unpinned (used by the `update` subcommand to
/// discover which actions need a fresh lock entry).
pub fn build_pipeline_without_emit(
    workspace_root: &Path,
    config: &Config,
    membership: BTreeMap<PathBuf, CampaignSpec>,
) -> pipeline::PipelineBuilder {
    let github = GitHubClient::new(config.github_token.clone());
    let cache = ImportCache::new(config.import_cache_path.clone());

    Pipeline::builder()
        .stage(stages::FrontmatterStage)
        .stage(stages::CampaignScaffoldStage::new(membership))
        .stage(stages::ImportStage::new(workspace_root.to_path_buf(), github, cache))
        .stage(stages::SchemaStage)
        .stage(stages::ExpressionStage)
        .stage(stages::ModelStage)
        .stage(stages::RenderStage)
}

/// Compiles every source under `paths`, returning one [`CompileContext`]
/// per file in input order. Compilation of one file failing never stops
/// compilation of its siblings (spec §7 "Propagation policy"). Worker
/// workflows named by a discovered campaign spec get their safe-output
/// scaffolding applied automatically.
pub async fn compile(workspace_root: &Path, config: &Config, paths: Vec<PathBuf>, strict: bool) -> Vec<CompileContext> {
    let membership = campaign_membership(workspace_root).unwrap_or_default();
    let pipeline = build_pipeline(workspace_root, config, membership);
    pipeline.run(paths, strict).await
}

/// A compiled campaign spec: the generated coordinator's rendered YAML, or
/// the diagnostics explaining why it couldn't be generated.
pub struct CampaignResult {
    pub path: PathBuf,
    pub spec: Option<CampaignSpec>,
    pub diagnostics: DiagnosticCollector,
    pub rendered_yaml: Option<String>,
}

/// Parses and compiles every discovered campaign spec into a coordinator
/// workflow (spec §4.9).
pub async fn compile_campaigns(workspace_root: &Path, strict: bool) -> anyhow::Result<Vec<CampaignResult>> {
    let mut out = Vec::new();
    for path in discover_campaign_sources(workspace_root)? {
        let raw = std::fs::read_to_string(&path)?;
        let mut diagnostics = DiagnosticCollector::new();
        let parsed = match frontmatter::parse(&path, &raw) {
            Ok(p) => p,
            Err(diag) => {
                diagnostics.push(diag);
                out.push(CampaignResult { path, spec: None, diagnostics, rendered_yaml: None });
                continue;
            }
        };

        let kind = schema::select_kind(&parsed.frontmatter, true);
        schema::validate(&path, &parsed.frontmatter, kind, strict, &mut diagnostics);

        let spec = campaign::parse(&path, &parsed.frontmatter, &mut diagnostics);
        let rendered_yaml = spec.as_ref().filter(|_| !diagnostics.has_errors_in_strict(strict)).map(|spec| {
            let document = campaign::build_coordinator(spec);
            let header = emit::header_comment(&path, &raw, &[]);
            emit::render(&document, &header).unwrap_or_default()
        });

        out.push(CampaignResult { path, spec, diagnostics, rendered_yaml });
    }
    Ok(out)
}

/// Maps every worker workflow path named by a campaign spec's `workflows`
/// list back to that spec, for [`build_pipeline`]'s scaffolding stage.
/// Workflow ids are resolved relative to `.github/workflows`.
fn campaign_membership(workspace_root: &Path) -> anyhow::Result<BTreeMap<PathBuf, CampaignSpec>> {
    let mut membership = BTreeMap::new();
    for path in discover_campaign_sources(workspace_root)? {
        let raw = std::fs::read_to_string(&path)?;
        let mut diagnostics = DiagnosticCollector::new();
        let Ok(parsed) = frontmatter::parse(&path, &raw) else { continue };
        let Some(spec) = campaign::parse(&path, &parsed.frontmatter, &mut diagnostics) else { continue };
        for workflow in &spec.workflows {
            let worker_path = workspace_root.join(".github/workflows").join(workflow);
            membership.insert(worker_path, spec.clone());
        }
    }
    Ok(membership)
}
