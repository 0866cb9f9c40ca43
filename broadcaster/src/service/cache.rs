//! Resource Inventory Cache
//!
//! Mirrors `{cluster × team × pipeline}` into a concurrent map keyed by
//! pipeline identity. Entries are `Arc<Pipeline>` values that are swapped,
//! never mutated, so a scan sees every pipeline either before or after an
//! update and never in between.

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;

use dashmap::DashMap;
use metrics::{counter, gauge};
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, info, warn};

use broadcaster_client::{ClientError, ClusterApi, Clusters, pipeline_identity};
use broadcaster_core::domain::{Pipeline, ResourceConfig};

/// Limits which clusters, teams and pipelines are mirrored or listed.
///
/// `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheFilter {
    pub cluster: Option<String>,
    pub team: Option<String>,
    pub pipeline: Option<String>,
}

impl CacheFilter {
    /// Trailing slashes are ignored, so `https://ci.example` selects
    /// the cluster `https://ci.example/`.
    pub fn allows_cluster(&self, url: &str) -> bool {
        self.cluster
            .as_deref()
            .is_none_or(|c| c.trim_end_matches('/') == url.trim_end_matches('/'))
    }

    pub fn allows_team(&self, team: &str) -> bool {
        self.team.as_deref().is_none_or(|t| t == team)
    }

    pub fn allows_pipeline(&self, name: &str) -> bool {
        self.pipeline.as_deref().is_none_or(|p| p == name)
    }

    /// Team and pipeline name check for an already cached pipeline.
    pub fn matches(&self, pipeline: &Pipeline) -> bool {
        self.allows_team(&pipeline.team) && self.allows_pipeline(&pipeline.name)
    }
}

/// Scope of a refresh failure that kept stale entries alive
#[derive(Debug)]
pub struct RefreshFailure {
    /// Cluster URL, or cluster URL plus team
    pub scope: String,
    pub error: ClientError,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache refresh incomplete: {}", describe(.failures))]
    Refresh { failures: Vec<RefreshFailure> },
}

fn describe(failures: &[RefreshFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.scope, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Cluster, or team of a cluster, whose entries survive a failed refresh
#[derive(Debug)]
struct PreservedScope {
    cluster: String,
    team: Option<String>,
}

impl PreservedScope {
    fn covers(&self, pipeline: &Pipeline) -> bool {
        pipeline.cluster == self.cluster && self.team.as_ref().is_none_or(|team| *team == pipeline.team)
    }
}

/// Counts from one refresh cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub pipelines_seen: usize,
    pub replaced: usize,
    pub removed: usize,
    pub config_errors: usize,
}

/// Concurrent inventory of webhook-eligible resources
#[derive(Debug, Default)]
pub struct ResourceCache {
    entries: DashMap<String, Arc<Pipeline>>,
    filter: CacheFilter,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: CacheFilter) -> Self {
        Self {
            entries: DashMap::new(),
            filter,
        }
    }

    // =============================================================================
    // Refresh
    // =============================================================================

    /// Pull the current inventory from every cluster.
    ///
    /// Per-pipeline failures keep the previous entry and are only logged.
    /// Cluster and team level failures keep every entry in their scope and
    /// are returned as [`CacheError::Refresh`] once all clusters were visited.
    pub async fn update(&self, clusters: &Clusters) -> Result<UpdateSummary, CacheError> {
        info!(clusters = clusters.len(), "starting cache update");

        let mut summary = UpdateSummary::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut preserved: Vec<PreservedScope> = Vec::new();
        let mut failures: Vec<RefreshFailure> = Vec::new();

        for cluster in clusters.iter() {
            let url = cluster.url().to_string();

            if !self.filter.allows_cluster(&url) {
                debug!(cluster = %url, "skipping cluster due to filter");
                continue;
            }

            if let Err(error) = self
                .update_cluster(cluster.as_ref(), &mut seen, &mut preserved, &mut failures, &mut summary)
                .await
            {
                warn!(cluster = %url, %error, "failed to refresh cluster, keeping cached pipelines");
                preserved.push(PreservedScope {
                    cluster: url.clone(),
                    team: None,
                });
                failures.push(RefreshFailure { scope: url, error });
            }
        }

        summary.removed = self.delete_unseen(&seen, &preserved);
        summary.pipelines_seen = seen.len();

        counter!("cache_updates_total").increment(1);
        gauge!("cache_pipelines").set(self.entries.len() as f64);

        info!(
            pipelines = self.entries.len(),
            replaced = summary.replaced,
            removed = summary.removed,
            "cache update finished"
        );

        if failures.is_empty() {
            Ok(summary)
        } else {
            counter!("cache_update_errors_total").increment(failures.len() as u64);
            Err(CacheError::Refresh { failures })
        }
    }

    async fn update_cluster(
        &self,
        cluster: &dyn ClusterApi,
        seen: &mut HashSet<String>,
        preserved: &mut Vec<PreservedScope>,
        failures: &mut Vec<RefreshFailure>,
        summary: &mut UpdateSummary,
    ) -> Result<(), ClientError> {
        cluster.refresh_token().await?;
        let teams = cluster.list_teams().await?;

        debug!(cluster = %cluster.url(), count = teams.len(), "updating teams");

        for team in teams {
            if !self.filter.allows_team(&team.name) {
                continue;
            }

            let pipelines = match cluster.list_pipelines(&team.name).await {
                Ok(pipelines) => pipelines,
                Err(error) => {
                    let scope = format!("{}{}/", cluster.url(), team.name);
                    warn!(cluster = %cluster.url(), team = %team.name, %error, "failed to list pipelines, keeping cached pipelines");
                    preserved.push(PreservedScope {
                        cluster: cluster.url().to_string(),
                        team: Some(team.name.clone()),
                    });
                    failures.push(RefreshFailure { scope, error });
                    continue;
                }
            };

            for summary_entry in pipelines {
                if !self.filter.allows_pipeline(&summary_entry.name) {
                    continue;
                }

                let pipeline_ref = summary_entry.pipeline_ref();
                let key = cluster.pipeline_identity(&team.name, &pipeline_ref);
                seen.insert(key.clone());

                let config = match cluster.pipeline_config(&team.name, &pipeline_ref).await {
                    Ok(Some(config)) => config,
                    Ok(None) => {
                        debug!(pipeline = %key, "pipeline vanished before its config was fetched");
                        seen.remove(&key);
                        continue;
                    }
                    Err(error) => {
                        warn!(pipeline = %key, %error, "failed to fetch pipeline config");
                        summary.config_errors += 1;
                        continue;
                    }
                };

                let unchanged = self
                    .entries
                    .get(&key)
                    .is_some_and(|entry| entry.version == config.version);
                if unchanged {
                    continue;
                }

                debug!(pipeline = %key, version = %config.version, "updating pipeline");

                let pipeline = Pipeline::new(
                    summary_entry.id,
                    cluster.url(),
                    team.name.clone(),
                    pipeline_ref,
                    config.version,
                    config.config.resources,
                );
                self.entries.insert(key, Arc::new(pipeline));
                summary.replaced += 1;
            }
        }

        Ok(())
    }

    /// Drop entries not seen this cycle, except those under a preserved scope.
    fn delete_unseen(&self, seen: &HashSet<String>, preserved: &[PreservedScope]) -> usize {
        let before = self.entries.len();

        self.entries.retain(|key, pipeline| {
            let keep = seen.contains(key) || preserved.iter().any(|scope| scope.covers(pipeline));
            if !keep {
                info!(pipeline = %key, "removing vanished pipeline");
            }
            keep
        });

        before.saturating_sub(self.entries.len())
    }

    // =============================================================================
    // Reads
    // =============================================================================

    /// Visit every resource of every cached pipeline until the visitor breaks.
    ///
    /// The set of pipelines is snapshotted first, so the visitor never runs
    /// while a map shard is locked.
    pub fn scan<F>(&self, mut visit: F)
    where
        F: FnMut(&Pipeline, &ResourceConfig) -> ControlFlow<()>,
    {
        let snapshot: Vec<Arc<Pipeline>> = self
            .entries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for pipeline in &snapshot {
            for resource in &pipeline.resources {
                if visit(pipeline, resource).is_break() {
                    return;
                }
            }
        }
    }

    /// Store a pipeline under its identity, replacing any previous entry.
    pub fn insert(&self, pipeline: Pipeline) -> String {
        let key = pipeline_identity(&pipeline.cluster, &pipeline.team, &pipeline.pipeline_ref());
        self.entries.insert(key.clone(), Arc::new(pipeline));
        key
    }

    pub fn get(&self, key: &str) -> Option<Arc<Pipeline>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Sorted cache keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Unauthenticated webhook-check URL for one resource.
///
/// `None` if the pipeline's cluster URL cannot be a base URL.
pub fn webhook_url(pipeline: &Pipeline, resource: &ResourceConfig) -> Option<String> {
    let mut url = Url::parse(&pipeline.cluster).ok()?;

    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend([
            "api",
            "v1",
            "teams",
            pipeline.team.as_str(),
            "pipelines",
            pipeline.name.as_str(),
            "resources",
            resource.name.as_str(),
            "check",
            "webhook",
        ]);

    {
        let mut query = url.query_pairs_mut();
        if let Some(vars) = pipeline.pipeline_ref().vars_query() {
            query.append_pair("vars", &vars);
        }
        query.append_pair("webhook_token", &resource.webhook_token);
    }

    Some(url.to_string())
}
