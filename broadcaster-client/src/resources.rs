//! Resource check endpoint

use broadcaster_core::domain::PipelineRef;
use reqwest::StatusCode;
use serde_json::json;
use tracing::debug;

use crate::ClusterClient;
use crate::error::{ClientError, Result};

impl ClusterClient {
    /// Ask the cluster to check a resource for new versions now
    ///
    /// # Errors
    /// [`ClientError::NotFound`] when the team, pipeline or resource does not
    /// exist; the check can never succeed in that case.
    pub async fn check_resource(
        &self,
        team: &str,
        pipeline: &PipelineRef,
        resource: &str,
    ) -> Result<()> {
        let url = self.pipeline_endpoint(team, pipeline, &["resources", resource, "check"])?;
        let token = self.refresh_token().await?;

        debug!(cluster = %self.url, %team, %pipeline, %resource, "requesting resource check");

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "from": null }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(format!(
                "{team}/{pipeline}/{resource}"
            )));
        }

        self.check_status(response).await?;
        Ok(())
    }
}
