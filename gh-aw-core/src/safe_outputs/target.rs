//! Target resolution for safe outputs that operate on an issue, PR, or
//! discussion number (spec §4.7).

use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Error at runtime if the workflow was not triggered by the matching event.
    Triggering,
    /// Use whatever number the agent put in the JSON line.
    FromPayload,
    /// A fixed issue/PR/discussion number.
    Literal(u64),
}

impl Target {
    pub fn parse(value: Option<&Value>) -> Target {
        match value {
            Some(Value::String(s)) if s == "triggering" => Target::Triggering,
            Some(Value::String(s)) if s == "*" => Target::FromPayload,
            Some(Value::Int(n)) if *n >= 0 => Target::Literal(*n as u64),
            Some(Value::String(s)) => s
                .parse::<u64>()
                .map(Target::Literal)
                .unwrap_or(Target::Triggering),
            _ => Target::Triggering,
        }
    }
}

/// `target-repo: owner/repo` resolution for cross-repository safe outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRepo {
    pub owner: String,
    pub repo: String,
}

impl TargetRepo {
    pub fn parse(raw: &str) -> Option<TargetRepo> {
        let (owner, repo) = raw.split_once('/')?;
        if owner.is_empty() || repo.is_empty() {
            return None;
        }
        Some(TargetRepo {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}
