//! Pipeline domain types

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

use super::resource::ResourceConfig;

/// Named instantiation variables of a templated pipeline.
///
/// Keys are kept sorted so the rendered form is stable and can be used
/// as part of a cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceVars(BTreeMap<String, JsonValue>);

impl InstanceVars {
    pub fn new(vars: BTreeMap<String, JsonValue>) -> Self {
        Self(vars)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON object form, as expected by the `vars` query parameter.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

impl<K: Into<String>, V: Into<JsonValue>> FromIterator<(K, V)> for InstanceVars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Display for InstanceVars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match value {
                JsonValue::String(s) => write!(f, "{key}:{s}")?,
                other => write!(f, "{key}:{other}")?,
            }
        }
        Ok(())
    }
}

/// Reference to a pipeline within a team: name plus optional instance vars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_vars: Option<InstanceVars>,
}

impl PipelineRef {
    pub fn new(name: impl Into<String>, instance_vars: Option<InstanceVars>) -> Self {
        Self {
            name: name.into(),
            instance_vars: instance_vars.filter(|vars| !vars.is_empty()),
        }
    }

    /// Value of the `vars` query parameter, if the pipeline is instanced.
    pub fn vars_query(&self) -> Option<String> {
        self.instance_vars.as_ref().map(InstanceVars::to_json)
    }
}

impl fmt::Display for PipelineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance_vars {
            Some(vars) => write!(f, "{}/{}", self.name, vars),
            None => f.write_str(&self.name),
        }
    }
}

/// One pipeline instance on one cluster.
///
/// A `Pipeline` is never mutated after construction; the cache replaces it
/// wholesale whenever the upstream config version changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    /// Canonical base URL of the owning cluster (credentials stripped).
    pub cluster: String,
    pub team: String,
    pub name: String,
    pub instance_vars: Option<InstanceVars>,
    /// Config version token reported by the cluster.
    pub version: String,
    /// Resources that carry a webhook token.
    pub resources: Vec<ResourceConfig>,
}

impl Pipeline {
    /// Builds a pipeline, keeping only resources that have a webhook token.
    pub fn new(
        id: i64,
        cluster: impl Into<String>,
        team: impl Into<String>,
        pipeline: PipelineRef,
        version: impl Into<String>,
        resources: impl IntoIterator<Item = ResourceConfig>,
    ) -> Self {
        Self {
            id,
            cluster: cluster.into(),
            team: team.into(),
            name: pipeline.name,
            instance_vars: pipeline.instance_vars,
            version: version.into(),
            resources: resources
                .into_iter()
                .filter(ResourceConfig::has_webhook_token)
                .collect(),
        }
    }

    pub fn pipeline_ref(&self) -> PipelineRef {
        PipelineRef::new(self.name.clone(), self.instance_vars.clone())
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.team, self.pipeline_ref())
    }
}
