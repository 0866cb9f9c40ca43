//! Pipeline DTOs

use serde::{Deserialize, Serialize};

use crate::domain::pipeline::{InstanceVars, PipelineRef};
use crate::domain::resource::ResourceConfig;

/// Entry of `GET /api/v1/teams/{team}/pipelines`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub instance_vars: Option<InstanceVars>,
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub archived: bool,
}

impl PipelineSummary {
    pub fn pipeline_ref(&self) -> PipelineRef {
        PipelineRef::new(self.name.clone(), self.instance_vars.clone())
    }
}

/// The part of a pipeline config the broadcaster cares about
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

/// Body of `GET /api/v1/teams/{team}/pipelines/{pipeline}/config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfigResponse {
    #[serde(default)]
    pub config: PipelineConfig,
}

/// A pipeline config together with its version token
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedConfig {
    pub config: PipelineConfig,
    pub version: String,
}
