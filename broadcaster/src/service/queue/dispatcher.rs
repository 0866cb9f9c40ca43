//! Execution of dispatch items against the clusters

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, header};
use thiserror::Error;
use tracing::{debug, info};

use broadcaster_client::{ClientError, Clusters};
use broadcaster_core::domain::{DispatchItem, ResourceCheck, redact_webhook_token};

/// Terminal, non-error outcome of one dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// The resource no longer exists; retrying cannot help.
    NotFound,
}

/// Retryable dispatch failure. URLs are always redacted.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("no configured cluster owns {0}")]
    UnknownCluster(String),

    #[error("cluster call for {check} failed: {source}")]
    Cluster {
        check: String,
        #[source]
        source: ClientError,
    },
}

/// Performs one dispatch attempt
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, item: &DispatchItem) -> Result<DispatchOutcome, DispatchError>;
}

/// Dispatcher doing real HTTP calls, or only logging them in dry-run mode
pub struct HttpDispatcher {
    client: Client,
    clusters: Arc<Clusters>,
    dry_run: bool,
}

impl HttpDispatcher {
    pub fn new(clusters: Arc<Clusters>, dry_run: bool) -> Self {
        Self::with_client(Client::new(), clusters, dry_run)
    }

    pub fn with_client(client: Client, clusters: Arc<Clusters>, dry_run: bool) -> Self {
        Self {
            client,
            clusters,
            dry_run,
        }
    }

    async fn post_webhook(&self, url: &str) -> Result<DispatchOutcome, DispatchError> {
        let redacted = redact_webhook_token(url);

        if self.dry_run {
            info!(url = %redacted, "DRY RUN: calling POST");
            return Ok(DispatchOutcome::Delivered);
        }

        info!(url = %redacted, "calling POST");

        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| DispatchError::Request {
                url: redacted.clone(),
                source: e.without_url(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status {
                url: redacted,
                status: status.as_u16(),
            });
        }

        Ok(DispatchOutcome::Delivered)
    }

    async fn check_resource(&self, check: &ResourceCheck) -> Result<DispatchOutcome, DispatchError> {
        if self.dry_run {
            info!(%check, "DRY RUN: refreshing resource via api");
            return Ok(DispatchOutcome::Delivered);
        }

        info!(%check, "refreshing resource via api");

        let cluster = self
            .clusters
            .find(&check.cluster)
            .ok_or_else(|| DispatchError::UnknownCluster(check.cluster.clone()))?;

        let cluster_error = |source| DispatchError::Cluster {
            check: check.to_string(),
            source,
        };

        cluster.refresh_token().await.map_err(cluster_error)?;

        match cluster
            .check_resource(&check.team, &check.pipeline, &check.resource)
            .await
        {
            Ok(()) => {
                debug!(%check, "refreshed successfully");
                Ok(DispatchOutcome::Delivered)
            }
            Err(e) if e.is_not_found() => {
                info!(%check, "resource not found");
                Ok(DispatchOutcome::NotFound)
            }
            Err(e) => Err(cluster_error(e)),
        }
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, item: &DispatchItem) -> Result<DispatchOutcome, DispatchError> {
        match item {
            DispatchItem::WebhookUrl { url } => self.post_webhook(url).await,
            DispatchItem::ResourceCheck(check) => self.check_resource(check).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broadcaster_client::ClusterApi;
    use broadcaster_core::domain::PipelineRef;
    use broadcaster_core::dto::pipeline::{PipelineSummary, VersionedConfig};
    use broadcaster_core::dto::team::Team;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Cluster whose check call answers with a fixed result
    struct CheckingCluster {
        url: String,
        not_found: bool,
        checks: AtomicUsize,
    }

    #[async_trait]
    impl ClusterApi for CheckingCluster {
        fn url(&self) -> &str {
            &self.url
        }

        async fn refresh_token(&self) -> broadcaster_client::Result<()> {
            Ok(())
        }

        async fn list_teams(&self) -> broadcaster_client::Result<Vec<Team>> {
            Ok(Vec::new())
        }

        async fn list_pipelines(&self, _team: &str) -> broadcaster_client::Result<Vec<PipelineSummary>> {
            Ok(Vec::new())
        }

        async fn pipeline_config(
            &self,
            _team: &str,
            _pipeline: &PipelineRef,
        ) -> broadcaster_client::Result<Option<VersionedConfig>> {
            Ok(None)
        }

        async fn check_resource(
            &self,
            team: &str,
            pipeline: &PipelineRef,
            resource: &str,
        ) -> broadcaster_client::Result<()> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            if self.not_found {
                return Err(ClientError::NotFound(format!("{team}/{pipeline}/{resource}")));
            }
            Ok(())
        }
    }

    fn cluster(not_found: bool) -> (Arc<CheckingCluster>, Arc<Clusters>) {
        let cluster = Arc::new(CheckingCluster {
            url: "https://ci.example/".to_string(),
            not_found,
            checks: AtomicUsize::new(0),
        });
        let clusters = Clusters::new(vec![cluster.clone() as Arc<dyn ClusterApi>]);
        (cluster, Arc::new(clusters))
    }

    fn check_item() -> DispatchItem {
        DispatchItem::resource_check(
            "https://ci.example/",
            "main",
            PipelineRef::new("deploy", None),
            "repo",
        )
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_call() {
        let (cluster, clusters) = cluster(false);
        let dispatcher = HttpDispatcher::new(clusters, true);

        // Nothing listens on the discard port; a real call would fail.
        let webhook = DispatchItem::webhook_url(
            "http://127.0.0.1:9/api/v1/teams/main/pipelines/p/resources/r/check/webhook?webhook_token=t",
        );
        assert_eq!(
            dispatcher.dispatch(&webhook).await.unwrap(),
            DispatchOutcome::Delivered
        );
        assert_eq!(
            dispatcher.dispatch(&check_item()).await.unwrap(),
            DispatchOutcome::Delivered
        );
        assert_eq!(cluster.checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_webhook_error_is_redacted() {
        let (_, clusters) = cluster(false);
        let dispatcher = HttpDispatcher::new(clusters, false);

        let webhook = DispatchItem::webhook_url(
            "http://127.0.0.1:9/api/v1/teams/main/pipelines/p/resources/r/check/webhook?webhook_token=s3cret",
        );
        let err = dispatcher.dispatch(&webhook).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("webhook_token=[REDACTED]"));
        assert!(!message.contains("s3cret"));
    }

    #[tokio::test]
    async fn test_resource_check_goes_through_cluster() {
        let (cluster, clusters) = cluster(false);
        let dispatcher = HttpDispatcher::new(clusters, false);

        assert_eq!(
            dispatcher.dispatch(&check_item()).await.unwrap(),
            DispatchOutcome::Delivered
        );
        assert_eq!(cluster.checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resource_check_uses_owning_cluster() {
        let root = Arc::new(CheckingCluster {
            url: "https://ci.example/".to_string(),
            not_found: false,
            checks: AtomicUsize::new(0),
        });
        let nested = Arc::new(CheckingCluster {
            url: "https://ci.example/other/".to_string(),
            not_found: false,
            checks: AtomicUsize::new(0),
        });
        let clusters = Clusters::new(vec![
            root.clone() as Arc<dyn ClusterApi>,
            nested.clone() as Arc<dyn ClusterApi>,
        ]);
        let dispatcher = HttpDispatcher::new(Arc::new(clusters), false);

        let item = DispatchItem::resource_check(
            "https://ci.example/other/",
            "main",
            PipelineRef::new("deploy", None),
            "repo",
        );
        dispatcher.dispatch(&item).await.unwrap();

        assert_eq!(root.checks.load(Ordering::SeqCst), 0);
        assert_eq!(nested.checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_resource_is_terminal() {
        let (_, clusters) = cluster(true);
        let dispatcher = HttpDispatcher::new(clusters, false);

        assert_eq!(
            dispatcher.dispatch(&check_item()).await.unwrap(),
            DispatchOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_unknown_cluster_is_an_error() {
        let dispatcher = HttpDispatcher::new(Arc::new(Clusters::default()), false);

        let err = dispatcher.dispatch(&check_item()).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownCluster(_)));
    }
}
