use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::Verbosity;

/// Compile agentic workflow sources into GitHub Actions workflow YAML
#[derive(Parser)]
#[command(name = "gh-aw", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub verbosity: Verbosity,

    /// GitHub personal access token (or set GH_TOKEN / GITHUB_TOKEN)
    #[arg(long, global = true, env = "GITHUB_TOKEN")]
    pub github_token: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile one or more workflow sources
    Compile {
        /// Workflow ids (source file stems) to compile; all discovered sources if omitted
        workflow_ids: Vec<String>,

        /// Validate only, without writing output
        #[arg(long)]
        validate: bool,

        /// Treat warnings as errors and enforce strict-mode schema checks
        #[arg(long)]
        strict: bool,

        /// Auto-fix fixable diagnostics before emitting
        #[arg(long)]
        fix: bool,

        /// Recompile on source changes until interrupted
        #[arg(long)]
        watch: bool,

        /// Remove stale compiled outputs with no matching source
        #[arg(long)]
        purge: bool,

        /// Emit diagnostics as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },

    /// Refresh the actions lock file
    Update {
        /// Workflow ids to update; all discovered sources if omitted
        workflow_ids: Vec<String>,

        /// Allow major version bumps when refreshing pinned actions
        #[arg(long)]
        major: bool,

        /// Overwrite existing lock entries even if already pinned
        #[arg(long)]
        force: bool,

        /// Merge with the existing lock file instead of replacing it
        #[arg(long)]
        merge: bool,

        /// Skip refreshing the actions lock file
        #[arg(long = "no-actions")]
        no_actions: bool,
    },
}

impl Cli {
    pub fn workspace_root(&self) -> PathBuf {
        std::env::current_dir().expect("failed to read current directory")
    }
}
