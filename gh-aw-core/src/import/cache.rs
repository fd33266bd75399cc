//! Content-addressed cache for resolved remote imports.
//!
//! Layout: `<root>/<owner>/<repo>/<sha>/<path>`. Writes are atomic
//! (write-to-temp, then rename) so a concurrent reader never observes a
//! partially written entry; the directory is safe to delete wholesale and
//! will be repopulated on the next compile.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct ImportCache {
    root: PathBuf,
}

impl ImportCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, owner: &str, repo: &str, sha: &str, path: &str) -> PathBuf {
        self.root.join(owner).join(repo).join(sha).join(path)
    }

    pub fn get(&self, owner: &str, repo: &str, sha: &str, path: &str) -> Result<Option<String>> {
        let entry = self.entry_path(owner, repo, sha, path);
        match std::fs::read_to_string(&entry) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading cache entry {}", entry.display())),
        }
    }

    /// Atomic write-to-temp + rename. Single-writer-per-key is a caller
    /// invariant; concurrent readers always see either the old or new
    /// content, never a torn write.
    pub fn put(&self, owner: &str, repo: &str, sha: &str, path: &str, content: &str) -> Result<()> {
        let entry = self.entry_path(owner, repo, sha, path);
        let dir = entry
            .parent()
            .context("cache entry path has no parent directory")?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating cache directory {}", dir.display()))?;

        let mut temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        use std::io::Write;
        temp.write_all(content.as_bytes())
            .with_context(|| format!("writing temp cache entry for {}", entry.display()))?;
        temp.persist(&entry)
            .with_context(|| format!("persisting cache entry {}", entry.display()))?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
