//! Pipeline-related API endpoints

use broadcaster_core::domain::PipelineRef;
use broadcaster_core::dto::pipeline::{PipelineConfigResponse, PipelineSummary, VersionedConfig};
use reqwest::StatusCode;

use crate::ClusterClient;
use crate::error::Result;

/// Response header carrying the config version token
pub const CONFIG_VERSION_HEADER: &str = "X-Concourse-Config-Version";

impl ClusterClient {
    // =============================================================================
    // Pipeline Discovery
    // =============================================================================

    /// List the pipelines of a team
    ///
    /// # Arguments
    /// * `team` - Team name as returned by [`ClusterClient::list_teams`]
    pub async fn list_pipelines(&self, team: &str) -> Result<Vec<PipelineSummary>> {
        let url = self.endpoint(&["api", "v1", "teams", team, "pipelines"])?;
        self.get_json(url).await
    }

    /// Fetch a pipeline's config together with its version token
    ///
    /// # Returns
    /// `None` when the cluster no longer knows the pipeline
    pub async fn pipeline_config(
        &self,
        team: &str,
        pipeline: &PipelineRef,
    ) -> Result<Option<VersionedConfig>> {
        let url = self.pipeline_endpoint(team, pipeline, &["config"])?;
        let token = self.refresh_token().await?;
        let response = self.client.get(url).bearer_auth(token).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let version = response
            .headers()
            .get(CONFIG_VERSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body: PipelineConfigResponse = self.handle_response(response).await?;

        Ok(Some(VersionedConfig {
            config: body.config,
            version,
        }))
    }
}
