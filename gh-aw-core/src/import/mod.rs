//! Import Resolver (spec §4.3): resolves `imports:` and inline `@include`
//! directives, local or remote, with a content-addressed cache and cycle
//! detection.

pub mod cache;
pub mod github;
pub mod spec;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::diagnostics::{Diagnostic, DiagnosticCollector, ErrorCode};
use crate::frontmatter;
use crate::value::Value;

pub use cache::ImportCache;
pub use github::GitHubClient;
pub use spec::ImportSpec;

/// Local lookup order for a relative import path, tried in this order.
const LOCAL_ROOTS: &[&str] = &[
    ".github/workflows",
    ".github/workflows/shared",
    ".github/workflows/shared/mcp",
];

#[derive(Debug, Clone)]
pub struct ResolvedImport {
    pub spec: ImportSpec,
    pub content: String,
    pub commit_sha: Option<String>,
    pub local_cache_path: Option<PathBuf>,
}

pub struct ImportResolver<'a> {
    pub workspace_root: &'a Path,
    pub github: &'a GitHubClient,
    pub cache: &'a ImportCache,
}

impl<'a> ImportResolver<'a> {
    pub fn new(workspace_root: &'a Path, github: &'a GitHubClient, cache: &'a ImportCache) -> Self {
        Self {
            workspace_root,
            github,
            cache,
        }
    }

    /// Resolves every import transitively reachable from `frontmatter`/`body`,
    /// merging them into the entry file's skeleton. `entry_id` identifies the
    /// entry file on the cycle-detection stack. Imported Markdown bodies are
    /// appended after the entry's own body, in import order, separated by a
    /// blank line.
    pub async fn resolve(
        &self,
        entry_id: &str,
        entry_path: &Path,
        frontmatter: Value,
        body: String,
        collector: &mut DiagnosticCollector,
    ) -> Result<(Value, String, Vec<ResolvedImport>)> {
        let mut stack = vec![entry_id.to_string()];
        let mut manifest = Vec::new();
        let mut imported_bodies = Vec::new();
        let merged = self
            .resolve_node(
                entry_path,
                frontmatter,
                &mut stack,
                &mut manifest,
                &mut imported_bodies,
                collector,
            )
            .await?;
        let mut body = self
            .resolve_includes(entry_path, &body, &mut stack.clone(), collector)
            .await?;
        for imported_body in imported_bodies {
            body.push_str("\n\n");
            body.push_str(imported_body.trim_end_matches('\n'));
        }
        Ok((merged, body, manifest))
    }

    async fn resolve_node(
        &self,
        current_path: &Path,
        frontmatter: Value,
        stack: &mut Vec<String>,
        manifest: &mut Vec<ResolvedImport>,
        imported_bodies: &mut Vec<String>,
        collector: &mut DiagnosticCollector,
    ) -> Result<Value> {
        let import_specs: Vec<String> = frontmatter
            .get("imports")
            .and_then(Value::as_list)
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let mut accumulated = Value::Map(BTreeMap::new());

        for raw_spec in import_specs {
            let parsed: ImportSpec = match raw_spec.parse() {
                Ok(s) => s,
                Err(e) => {
                    collector.push(Diagnostic::error(
                        ErrorCode::ImportNotFound,
                        current_path,
                        format!("invalid import spec '{raw_spec}': {e}"),
                    ));
                    continue;
                }
            };
            let identity = parsed.to_string();

            if stack.contains(&identity) {
                let mut chain = stack.clone();
                chain.push(identity.clone());
                collector.push(Diagnostic::error(
                    ErrorCode::ImportCycle,
                    current_path,
                    format!("import cycle: {}", chain.join(" \u{2192} ")),
                ));
                continue;
            }

            let fetch = match self.fetch(&parsed).await {
                Ok(f) => f,
                Err(e) => {
                    collector.push(Diagnostic::error(
                        ErrorCode::ImportFetchFailed,
                        current_path,
                        format!("failed to resolve import '{raw_spec}': {e:#}"),
                    ));
                    continue;
                }
            };

            let parsed_import = match frontmatter::parse(Path::new(&identity), &fetch.content) {
                Ok(p) => p,
                Err(diag) => {
                    collector.push(diag);
                    continue;
                }
            };

            stack.push(identity.clone());
            imported_bodies.push(parsed_import.body);
            let child_merged = Box::pin(self.resolve_node(
                Path::new(&identity),
                parsed_import.frontmatter,
                stack,
                manifest,
                imported_bodies,
                collector,
            ))
            .await?;
            stack.pop();

            accumulated = deep_merge(accumulated, child_merged);

            manifest.push(ResolvedImport {
                spec: parsed,
                content: fetch.content,
                commit_sha: fetch.commit_sha,
                local_cache_path: fetch.local_cache_path,
            });
        }

        Ok(deep_merge(accumulated, frontmatter))
    }

    /// Replaces `@include path` / `@include? path` lines in `body` with the
    /// referenced file's body (not its frontmatter), recursively.
    async fn resolve_includes(
        &self,
        current_path: &Path,
        body: &str,
        stack: &mut Vec<String>,
        collector: &mut DiagnosticCollector,
    ) -> Result<String> {
        let mut out = Vec::new();
        for line in body.lines() {
            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix("@include") {
                let (optional, rest) = match rest.strip_prefix('?') {
                    Some(r) => (true, r),
                    None => (false, rest),
                };
                let include_path = rest.trim();
                if include_path.is_empty() {
                    collector.push(Diagnostic::error(
                        ErrorCode::MarkdownInclude,
                        current_path,
                        "@include directive missing a path",
                    ));
                    continue;
                }

                let spec: ImportSpec = match include_path.parse() {
                    Ok(s) => s,
                    Err(e) => {
                        collector.push(Diagnostic::error(
                            ErrorCode::MarkdownInclude,
                            current_path,
                            format!("invalid @include path '{include_path}': {e}"),
                        ));
                        continue;
                    }
                };
                let identity = spec.to_string();

                if stack.contains(&identity) {
                    let mut chain = stack.clone();
                    chain.push(identity.clone());
                    collector.push(Diagnostic::error(
                        ErrorCode::ImportCycle,
                        current_path,
                        format!("include cycle: {}", chain.join(" \u{2192} ")),
                    ));
                    continue;
                }

                match self.fetch(&spec).await {
                    Ok(fetch) => {
                        let parsed = frontmatter::parse(Path::new(&identity), &fetch.content);
                        let included_body = match parsed {
                            Ok(p) => p.body,
                            Err(_) => fetch.content.clone(),
                        };
                        stack.push(identity.clone());
                        let expanded = Box::pin(self.resolve_includes(
                            Path::new(&identity),
                            &included_body,
                            stack,
                            collector,
                        ))
                        .await?;
                        stack.pop();
                        out.push(expanded);
                    }
                    Err(e) => {
                        if optional {
                            continue;
                        }
                        collector.push(Diagnostic::error(
                            ErrorCode::MarkdownInclude,
                            current_path,
                            format!("@include '{include_path}' not found: {e:#}"),
                        ));
                    }
                }
                continue;
            }
            out.push(line.to_string());
        }
        Ok(out.join("\n"))
    }

    async fn fetch(&self, spec: &ImportSpec) -> Result<Fetched> {
        match spec {
            ImportSpec::Local(path) => self.fetch_local(path),
            ImportSpec::Remote {
                owner,
                repo,
                path,
                git_ref,
            } => self.fetch_remote(owner, repo, path, git_ref.as_deref()).await,
        }
    }

    fn fetch_local(&self, path: &str) -> Result<Fetched> {
        for root in LOCAL_ROOTS {
            let candidate = self.workspace_root.join(root).join(path);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                return Ok(Fetched {
                    content,
                    commit_sha: None,
                    local_cache_path: Some(candidate),
                });
            }
        }
        anyhow::bail!("local import '{path}' not found under any of {LOCAL_ROOTS:?}");
    }

    async fn fetch_remote(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Fetched> {
        let requested_ref = git_ref.unwrap_or("HEAD");
        let sha = if requested_ref == "HEAD" {
            self.github
                .resolve_ref(owner, repo, "HEAD")
                .await
                .context("resolving default branch HEAD")?
        } else {
            self.github.resolve_ref(owner, repo, requested_ref).await?
        };

        if let Some(cached) = self.cache.get(owner, repo, &sha, path)? {
            return Ok(Fetched {
                content: cached,
                commit_sha: Some(sha.clone()),
                local_cache_path: Some(self.cache.root().join(owner).join(repo).join(&sha).join(path)),
            });
        }

        let content = self.github.get_raw_content(owner, repo, &sha, path).await?;
        self.cache.put(owner, repo, &sha, path, &content)?;

        Ok(Fetched {
            content,
            commit_sha: Some(sha.clone()),
            local_cache_path: Some(self.cache.root().join(owner).join(repo).join(&sha).join(path)),
        })
    }
}

struct Fetched {
    content: String,
    commit_sha: Option<String>,
    local_cache_path: Option<PathBuf>,
}

/// Recursively merges `from` over `into`; `from` wins leaf conflicts, maps
/// merge key-by-key.
fn deep_merge(into: Value, from: Value) -> Value {
    match (into, from) {
        (Value::Map(mut base), Value::Map(overlay)) => {
            for (k, v) in overlay {
                let merged = match base.remove(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => v,
                };
                base.insert(k, merged);
            }
            Value::Map(base)
        }
        (_, from) => from,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn map(pairs: Vec<(&str, Value)>) -> Value {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn deep_merge_importer_wins_leaf_conflict() {
        let imported = map(vec![("engine", Value::String("claude".into()))]);
        let importer = map(vec![("engine", Value::String("copilot".into()))]);
        let merged = deep_merge(imported, importer);
        assert_eq!(merged.get("engine").unwrap().as_str(), Some("copilot"));
    }

    #[test]
    fn deep_merge_recurses_into_nested_maps() {
        let imported = map(vec![(
            "tools",
            map(vec![("github", Value::Bool(true)), ("bash", Value::Bool(true))]),
        )]);
        let importer = map(vec![("tools", map(vec![("edit", Value::Bool(true))]))]);
        let merged = deep_merge(imported, importer);
        let tools = merged.get("tools").unwrap().as_map().unwrap();
        assert_eq!(tools.len(), 3);
    }

    #[tokio::test]
    async fn fetch_local_tries_lookup_order() {
        let dir = tempfile::tempdir().unwrap();
        let shared_mcp = dir.path().join(".github/workflows/shared/mcp");
        std::fs::create_dir_all(&shared_mcp).unwrap();
        std::fs::write(shared_mcp.join("github.md"), "shared content").unwrap();

        let github = GitHubClient::new(None);
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = ImportCache::new(cache_dir.path());
        let resolver = ImportResolver::new(dir.path(), &github, &cache);

        let fetched = resolver.fetch_local("github.md").unwrap();
        assert_eq!(fetched.content, "shared content");
    }

    #[tokio::test]
    async fn fetch_local_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let github = GitHubClient::new(None);
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = ImportCache::new(cache_dir.path());
        let resolver = ImportResolver::new(dir.path(), &github, &cache);
        assert!(resolver.fetch_local("nope.md").is_err());
    }

    #[tokio::test]
    async fn direct_self_import_is_reported_as_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let github = GitHubClient::new(None);
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = ImportCache::new(cache_dir.path());
        let resolver = ImportResolver::new(dir.path(), &github, &cache);

        let mut stack = vec!["entry.md".to_string(), "entry.md".to_string()];
        let mut manifest = Vec::new();
        let mut bodies = Vec::new();
        let mut collector = DiagnosticCollector::new();
        let fm = map(vec![("imports", Value::List(vec![Value::String("entry.md".into())]))]);
        let _ = resolver
            .resolve_node(
                Path::new("entry.md"),
                fm,
                &mut stack,
                &mut manifest,
                &mut bodies,
                &mut collector,
            )
            .await;
        assert!(collector.iter().any(|d| d.code == ErrorCode::ImportCycle));
    }

    #[tokio::test]
    async fn imported_bodies_are_appended_after_entrys_own_body() {
        let dir = tempfile::tempdir().unwrap();
        let workflows = dir.path().join(".github/workflows");
        std::fs::create_dir_all(&workflows).unwrap();
        std::fs::write(workflows.join("shared.md"), "---\n---\nShared instructions.\n").unwrap();

        let github = GitHubClient::new(None);
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = ImportCache::new(cache_dir.path());
        let resolver = ImportResolver::new(dir.path(), &github, &cache);

        let frontmatter = map(vec![("imports", Value::List(vec![Value::String("shared.md".into())]))]);
        let mut collector = DiagnosticCollector::new();
        let (_, body, manifest) = resolver
            .resolve(
                "entry.md",
                Path::new("entry.md"),
                frontmatter,
                "Entry body.".to_string(),
                &mut collector,
            )
            .await
            .unwrap();

        assert!(!collector.has_errors());
        assert_eq!(manifest.len(), 1);
        assert_eq!(body, "Entry body.\n\nShared instructions.");
    }
}
