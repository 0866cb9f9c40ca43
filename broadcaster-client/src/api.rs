//! Cluster API abstraction
//!
//! The cache refresher and the dispatch queue only see this trait, so tests
//! can swap in an in-memory cluster.

use async_trait::async_trait;

use broadcaster_core::domain::PipelineRef;
use broadcaster_core::dto::pipeline::{PipelineSummary, VersionedConfig};
use broadcaster_core::dto::team::Team;

use crate::ClusterClient;
use crate::error::Result;

/// Operations the broadcaster needs from one cluster
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Canonical cluster URL with credentials stripped, ending in `/`
    fn url(&self) -> &str;

    /// Stable cache key for a pipeline of this cluster
    fn pipeline_identity(&self, team: &str, pipeline: &PipelineRef) -> String {
        crate::pipeline_identity(self.url(), team, pipeline)
    }

    /// Make sure a valid access token is held
    async fn refresh_token(&self) -> Result<()>;

    async fn list_teams(&self) -> Result<Vec<Team>>;

    async fn list_pipelines(&self, team: &str) -> Result<Vec<PipelineSummary>>;

    /// `Ok(None)` when the pipeline has disappeared
    async fn pipeline_config(
        &self,
        team: &str,
        pipeline: &PipelineRef,
    ) -> Result<Option<VersionedConfig>>;

    async fn check_resource(&self, team: &str, pipeline: &PipelineRef, resource: &str)
    -> Result<()>;
}

#[async_trait]
impl ClusterApi for ClusterClient {
    fn url(&self) -> &str {
        ClusterClient::url(self)
    }

    async fn refresh_token(&self) -> Result<()> {
        ClusterClient::refresh_token(self).await.map(|_| ())
    }

    async fn list_teams(&self) -> Result<Vec<Team>> {
        ClusterClient::list_teams(self).await
    }

    async fn list_pipelines(&self, team: &str) -> Result<Vec<PipelineSummary>> {
        ClusterClient::list_pipelines(self, team).await
    }

    async fn pipeline_config(
        &self,
        team: &str,
        pipeline: &PipelineRef,
    ) -> Result<Option<VersionedConfig>> {
        ClusterClient::pipeline_config(self, team, pipeline).await
    }

    async fn check_resource(
        &self,
        team: &str,
        pipeline: &PipelineRef,
        resource: &str,
    ) -> Result<()> {
        ClusterClient::check_resource(self, team, pipeline, resource).await
    }
}
