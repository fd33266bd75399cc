//! `Import Spec` parsing: `owner/repo/path@ref` (remote, ref optional — an
//! absent ref means the repository's default branch) or a relative path
//! (local).

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSpec {
    Local(String),
    Remote {
        owner: String,
        repo: String,
        path: String,
        git_ref: Option<String>,
    },
}

impl FromStr for ImportSpec {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        if !raw.contains('/') {
            bail!("import spec must be a local path or owner/repo/path@ref: {raw}");
        }

        let Some((name_part, git_ref)) = raw.rsplit_once('@') else {
            return Ok(ImportSpec::Local(raw.to_string()));
        };

        let segments: Vec<&str> = name_part.split('/').collect();
        if segments.len() < 3 || segments[0].is_empty() || segments[1].is_empty() {
            bail!("remote import spec must be owner/repo/path@ref: {raw}");
        }

        Ok(ImportSpec::Remote {
            owner: segments[0].to_string(),
            repo: segments[1].to_string(),
            path: segments[2..].join("/"),
            git_ref: if git_ref.is_empty() {
                None
            } else {
                Some(git_ref.to_string())
            },
        })
    }
}

impl fmt::Display for ImportSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportSpec::Local(path) => write!(f, "{path}"),
            ImportSpec::Remote {
                owner,
                repo,
                path,
                git_ref,
            } => match git_ref {
                Some(r) => write!(f, "{owner}/{repo}/{path}@{r}"),
                None => write!(f, "{owner}/{repo}/{path}"),
            },
        }
    }
}
