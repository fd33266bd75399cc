mod cli;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use cli::{Cli, Command};
use gh_aw_core::action_ref::ActionRef;
use gh_aw_core::actions_lock::ActionsLock;
use gh_aw_core::config::Config;
use gh_aw_core::context::CompileContext;
use gh_aw_core::import::GitHubClient;
use notify_debouncer_full::{new_debouncer, notify::RecursiveMode};

fn main() -> ExitCode {
    let args = Cli::parse();

    let filter = std::env::var("GH_AW_LOG_FILTER").unwrap_or_else(|_| args.verbosity.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let runtime = tokio::runtime::Runtime::new().expect("failed to start async runtime");
    runtime.block_on(run(args))
}

async fn run(args: Cli) -> ExitCode {
    let workspace_root = args.workspace_root();
    let config = Config::resolve(&workspace_root, args.github_token.clone(), None);

    match &args.command {
        Command::Compile {
            workflow_ids,
            validate,
            strict,
            fix: _,
            watch,
            purge,
            json,
        } => {
            let paths = match resolve_paths(&workspace_root, workflow_ids) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("error: {e}");
                    return ExitCode::from(2);
                }
            };

            let mut code = run_compile(&workspace_root, &config, paths.clone(), *strict, *validate, *purge, *json).await;

            if workflow_ids.is_empty() {
                let campaign_code = run_campaigns(&workspace_root, *strict, *validate, *json).await;
                if campaign_code != ExitCode::SUCCESS {
                    code = campaign_code;
                }
            }

            if *watch {
                code = watch_and_recompile(&workspace_root, &config, paths, *strict, *validate, *purge, *json).await;
            }
            code
        }
        Command::Update {
            workflow_ids,
            major,
            force,
            merge,
            no_actions,
        } => {
            if *no_actions {
                println!("skipping actions lock refresh (--no-actions)");
                return ExitCode::SUCCESS;
            }
            match resolve_paths(&workspace_root, workflow_ids) {
                Ok(paths) => run_update(&workspace_root, &config, paths, *major, *force, *merge).await,
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::from(2)
                }
            }
        }
    }
}

/// Re-resolves every `uses:` action reference across `paths` to its current
/// commit SHA and writes the result to the actions lock (spec §4.8,
/// `update` subcommand flags per spec §6).
async fn run_update(workspace_root: &Path, config: &Config, paths: Vec<PathBuf>, major: bool, force: bool, merge: bool) -> ExitCode {
    let pipeline = gh_aw_core::build_pipeline_without_emit(workspace_root, config, Default::default()).build();
    let results = pipeline.run(paths, false).await;

    let mut refs: Vec<ActionRef> = Vec::new();
    let mut seen = HashSet::new();
    for ctx in &results {
        let Some(document) = &ctx.document else { continue };
        for (_, job) in &document.jobs.0 {
            for step in &job.steps {
                let Some(uses) = &step.uses else { continue };
                let Ok(action_ref) = uses.parse::<ActionRef>() else { continue };
                if seen.insert(action_ref.repo_key()) {
                    refs.push(action_ref);
                }
            }
        }
    }

    let existing = match ActionsLock::load_or_default(&config.actions_lock_path) {
        Ok(lock) => lock,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };
    let mut lock = if merge { existing.clone() } else { ActionsLock::default() };

    let github = GitHubClient::new(config.github_token.clone());
    let mut any_failed = false;
    for action_ref in &refs {
        if !force && existing.covers(action_ref) && !is_major_bump(&existing, action_ref) {
            if let Some(entry) = existing.resolve(action_ref) {
                lock.set(action_ref, entry.version.clone(), entry.sha.clone());
            }
            continue;
        }
        if is_major_bump(&existing, action_ref) && !major {
            eprintln!(
                "skipping {} (major version change, pass --major to allow)",
                action_ref.repo_key()
            );
            if let Some(entry) = existing.resolve(action_ref) {
                lock.set(action_ref, entry.version.clone(), entry.sha.clone());
            }
            continue;
        }
        match github.resolve_ref(&action_ref.owner, &action_ref.repo, &action_ref.git_ref).await {
            Ok(sha) => {
                let version = action_ref.version().unwrap_or(action_ref.git_ref.as_str()).to_string();
                lock.set(action_ref, version, sha);
            }
            Err(e) => {
                eprintln!("error: failed to resolve {}: {e}", action_ref.repo_key());
                any_failed = true;
            }
        }
    }

    if let Err(e) = lock.save(&config.actions_lock_path) {
        eprintln!("error: failed to write actions lock: {e}");
        return ExitCode::from(1);
    }

    println!("refreshed {} action pin(s)", refs.len());
    if any_failed { ExitCode::from(1) } else { ExitCode::SUCCESS }
}

/// A major-version bump is detected when the lock already pins this repo
/// under a different leading version number than the declared ref resolves to.
fn is_major_bump(lock: &ActionsLock, action_ref: &ActionRef) -> bool {
    let (Some(entry), Some(declared)) = (lock.resolve(action_ref), action_ref.version()) else {
        return false;
    };
    let existing_major = entry.version.split('.').next().unwrap_or(&entry.version);
    let declared_major = declared.split('.').next().unwrap_or(declared);
    existing_major != declared_major
}

fn resolve_paths(workspace_root: &Path, workflow_ids: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    if workflow_ids.is_empty() {
        return gh_aw_core::discover_sources(workspace_root);
    }
    Ok(workflow_ids
        .iter()
        .map(|id| workspace_root.join(".github/workflows").join(format!("{id}.md")))
        .collect())
}

async fn run_compile(
    workspace_root: &Path,
    config: &Config,
    paths: Vec<PathBuf>,
    strict: bool,
    validate_only: bool,
    purge: bool,
    json: bool,
) -> ExitCode {
    if purge {
        purge_stale_outputs(workspace_root, &paths);
    }

    let results = gh_aw_core::compile(workspace_root, config, paths, strict).await;
    let mut any_failed = false;

    for ctx in &results {
        if ctx.failed() {
            any_failed = true;
        }
        report(ctx, json);

        if !validate_only && !ctx.failed() {
            if let Some(yaml) = &ctx.rendered_yaml {
                if let Some(output_path) = lock_output_path(&ctx.path) {
                    if let Err(e) = std::fs::write(&output_path, yaml) {
                        eprintln!("error: failed to write {}: {e}", output_path.display());
                        any_failed = true;
                    }
                }
            }
        }
    }

    if any_failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

/// Compiles every discovered campaign spec into a coordinator workflow
/// (spec §4.9), writing `<stem>.lock.yml` next to the spec the same way
/// `run_compile` does for ordinary workflows.
async fn run_campaigns(workspace_root: &Path, strict: bool, validate_only: bool, json: bool) -> ExitCode {
    let results = match gh_aw_core::compile_campaigns(workspace_root, strict).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: failed to discover campaign specs: {e}");
            return ExitCode::from(1);
        }
    };

    let mut any_failed = false;
    for result in &results {
        let failed = result.diagnostics.has_errors_in_strict(strict);
        any_failed |= failed;

        if json {
            let diagnostics: Vec<_> = result.diagnostics.iter().collect();
            if let Ok(rendered) = serde_json::to_string(&diagnostics) {
                println!("{rendered}");
            }
        } else {
            for diag in result.diagnostics.iter() {
                eprintln!("{diag}");
            }
        }

        if !validate_only && !failed {
            if let Some(yaml) = &result.rendered_yaml {
                if let Some(output_path) = lock_output_path(&result.path) {
                    if let Err(e) = std::fs::write(&output_path, yaml) {
                        eprintln!("error: failed to write {}: {e}", output_path.display());
                        any_failed = true;
                    }
                }
            }
        }
    }

    if any_failed { ExitCode::from(1) } else { ExitCode::SUCCESS }
}

fn lock_output_path(source: &Path) -> Option<PathBuf> {
    let stem = source.file_stem()?.to_str()?;
    Some(source.with_file_name(format!("{stem}.lock.yml")))
}

fn purge_stale_outputs(workspace_root: &Path, live_sources: &[PathBuf]) {
    let workflows_dir = workspace_root.join(".github/workflows");
    let Ok(entries) = walkdir::WalkDir::new(&workflows_dir).into_iter().collect::<Result<Vec<_>, _>>() else {
        return;
    };
    for entry in entries {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yml") {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        let Some(stem) = name.strip_suffix(".lock.yml") else { continue };
        let source_still_exists = live_sources
            .iter()
            .any(|s| s.file_stem().and_then(|s| s.to_str()) == Some(stem));
        if !source_still_exists {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn report(ctx: &CompileContext, json: bool) {
    if json {
        let diagnostics: Vec<_> = ctx.diagnostics.iter().collect();
        if let Ok(rendered) = serde_json::to_string(&diagnostics) {
            println!("{rendered}");
        }
        return;
    }
    for diag in ctx.diagnostics.iter() {
        eprintln!("{diag}");
    }
    for err in &ctx.stage_errors {
        eprintln!("{}: {} failed: {}", ctx.path.display(), err.stage, err.message);
    }
}

async fn watch_and_recompile(
    workspace_root: &Path,
    config: &Config,
    paths: Vec<PathBuf>,
    strict: bool,
    validate_only: bool,
    purge: bool,
    json: bool,
) -> ExitCode {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = match new_debouncer(Duration::from_millis(300), None, tx) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: failed to start filesystem watcher: {e}");
            return ExitCode::from(1);
        }
    };

    let watch_root = workspace_root.join(".github/workflows");
    if debouncer.watch(&watch_root, RecursiveMode::Recursive).is_err() {
        eprintln!("error: cannot watch {}", watch_root.display());
        return ExitCode::from(1);
    }

    println!("watching {} for changes (ctrl-c to stop)", watch_root.display());
    let mut last_code = ExitCode::SUCCESS;
    for result in rx {
        if result.is_err() {
            continue;
        }
        last_code = run_compile(workspace_root, config, paths.clone(), strict, validate_only, purge, json).await;
    }
    last_code
}
