//! GitHub Actions YAML shapes produced by the Engine Renderer and
//! Safe-Output Job Generator, consumed by the Emitter.
//!
//! Field declaration order is the emission order (spec §4.8's canonical
//! key ordering); `serde_yaml` serializes structs field-by-field, so the
//! ordering lives in the type definitions rather than in a separate
//! hand-rolled mapping builder.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Step {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "if")]
    pub if_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Step {
    pub fn uses(uses: impl Into<String>) -> Self {
        Self {
            uses: Some(uses.into()),
            ..Default::default()
        }
    }

    pub fn run(run: impl Into<String>) -> Self {
        Self {
            run: Some(run.into()),
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Job {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "runs-on")]
    pub runs_on: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "if")]
    pub if_: Option<String>,
    pub permissions: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "timeout-minutes")]
    pub timeout_minutes: Option<u32>,
    pub steps: Vec<Step>,
}

/// Preserves job registration order (agent job first, then safe-output
/// jobs in the fixed kind-enumeration order) rather than sorting keys.
#[derive(Debug, Clone, Default)]
pub struct Jobs(pub Vec<(String, Job)>);

impl Jobs {
    pub fn push(&mut self, id: impl Into<String>, job: Job) {
        self.0.push((id.into(), job));
    }
}

impl Serialize for Jobs {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, job) in &self.0 {
            map.serialize_entry(id, job)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub on: serde_yaml::Value,
    pub permissions: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<serde_yaml::Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<serde_yaml::Value>,
    pub jobs: Jobs,
}
