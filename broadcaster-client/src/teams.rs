//! Team-related API endpoints

use broadcaster_core::dto::team::Team;

use crate::ClusterClient;
use crate::error::Result;

impl ClusterClient {
    /// List all teams visible to the configured user
    pub async fn list_teams(&self) -> Result<Vec<Team>> {
        let url = self.endpoint(&["api", "v1", "teams"])?;
        self.get_json(url).await
    }
}
