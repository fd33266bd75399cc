//! `.github/aw/actions-lock.json` (spec §4.8): maps `owner/repo` to the
//! pinned `{version, sha}` the emitter substitutes into every `uses:` line.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::action_ref::ActionRef;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockEntry {
    pub repo: String,
    pub version: String,
    pub sha: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActionsLock {
    pub entries: BTreeMap<String, LockEntry>,
}

impl ActionsLock {
    pub fn load(path: &Path) -> Result<ActionsLock> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading actions lock {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing actions lock {}", path.display()))
    }

    pub fn load_or_default(path: &Path) -> Result<ActionsLock> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(ActionsLock::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        std::fs::write(path, json).with_context(|| format!("writing actions lock {}", path.display()))
    }

    /// The key a lock entry is stored under: `owner/repo`, never including
    /// a subpath, since all actions from one repo share a commit.
    pub fn key_for(action_ref: &ActionRef) -> String {
        action_ref.repo_key()
    }

    pub fn resolve(&self, action_ref: &ActionRef) -> Option<&LockEntry> {
        self.entries.get(&Self::key_for(action_ref))
    }

    pub fn covers(&self, action_ref: &ActionRef) -> bool {
        self.entries.contains_key(&Self::key_for(action_ref))
    }

    pub fn set(&mut self, action_ref: &ActionRef, version: String, sha: String) {
        let repo = Self::key_for(action_ref);
        self.entries.insert(repo.clone(), LockEntry { repo, version, sha });
    }
}
