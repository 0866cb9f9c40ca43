//! Change event routing
//!
//! Each platform has a [`MatchPolicy`] saying which resources a change event
//! can affect and what kind of dispatch item to enqueue for them. One scan of
//! the cache applies the policy to every cached resource.

use std::fmt;
use std::ops::ControlFlow;

use tracing::{debug, info, warn};

use broadcaster_core::domain::{ChangeEvent, DispatchItem, Pipeline, ResourceConfig};
use broadcaster_core::matching::{construct_uri, path_filter_allows, same_repository};

use super::cache::{ResourceCache, webhook_url};
use super::queue::RequestQueue;

/// Version-control platform a webhook came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    GitHub,
    GitLab,
    Bitbucket,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::GitHub, Platform::Bitbucket, Platform::GitLab];

    /// User-agent prefix the platform sends with its webhooks
    pub fn user_agent_prefix(self) -> &'static str {
        match self {
            Platform::GitHub => "GitHub-Hookshot/",
            Platform::GitLab => "Gitlab/",
            Platform::Bitbucket => "Bitbucket-Webhooks/",
        }
    }

    pub fn from_user_agent(user_agent: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|platform| user_agent.starts_with(platform.user_agent_prefix()))
    }

    pub fn policy(self) -> MatchPolicy {
        match self {
            Platform::GitHub => MatchPolicy::GITHUB,
            Platform::GitLab => MatchPolicy::GITLAB,
            Platform::Bitbucket => MatchPolicy::BITBUCKET,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::GitHub => "github",
            Platform::GitLab => "gitlab",
            Platform::Bitbucket => "bitbucket",
        })
    }
}

/// Where a resource's repository URL is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriSource {
    /// The `uri` source field only
    SourceUri,
    /// Whatever [`construct_uri`] derives from the source
    Constructed,
}

/// How the event branch restricts matching resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchRule {
    Ignore,
    /// For these types the configured branch, or the repository default
    /// branch, must equal the event branch.
    RequireMatch(&'static [&'static str]),
    /// For these types skip only when both branches are known and differ.
    SkipOnMismatch(&'static [&'static str]),
}

/// Kind of dispatch item produced for a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    WebhookUrl,
    ResourceCheck,
}

/// Per-platform rules deciding which resources an event triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    /// Allowed resource types; `None` allows any type.
    pub resource_types: Option<&'static [&'static str]>,
    pub uri: UriSource,
    pub branch: BranchRule,
    /// Whether the resource `paths` filter applies.
    pub path_filter: bool,
    pub dispatch: DispatchKind,
}

impl MatchPolicy {
    pub const GITHUB: Self = Self {
        resource_types: Some(&["git", "pull-request", "git-proxy"]),
        uri: UriSource::SourceUri,
        branch: BranchRule::RequireMatch(&["git", "git-proxy"]),
        path_filter: true,
        dispatch: DispatchKind::WebhookUrl,
    };

    pub const GITLAB: Self = Self {
        resource_types: None,
        uri: UriSource::Constructed,
        branch: BranchRule::Ignore,
        path_filter: false,
        dispatch: DispatchKind::WebhookUrl,
    };

    pub const BITBUCKET: Self = Self {
        resource_types: None,
        uri: UriSource::Constructed,
        branch: BranchRule::SkipOnMismatch(&["git"]),
        path_filter: false,
        dispatch: DispatchKind::ResourceCheck,
    };

    fn allows_type(&self, resource: &ResourceConfig) -> bool {
        self.resource_types.is_none_or(|types| resource.is_type(types))
    }

    fn resource_uri(&self, resource: &ResourceConfig) -> Option<String> {
        match self.uri {
            UriSource::SourceUri => resource.source.get_str("uri").map(str::to_string),
            UriSource::Constructed => construct_uri(&resource.source),
        }
    }

    fn branch_allows(&self, resource: &ResourceConfig, event: &ChangeEvent) -> bool {
        match self.branch {
            BranchRule::Ignore => true,
            BranchRule::RequireMatch(types) => {
                if !resource.is_type(types) {
                    return true;
                }
                let expected = resource
                    .source
                    .get_str("branch")
                    .filter(|b| !b.is_empty())
                    .or(event.default_branch.as_deref());
                expected == event.branch.as_deref()
            }
            BranchRule::SkipOnMismatch(types) => {
                if !resource.is_type(types) {
                    return true;
                }
                match (
                    resource.source.get_str("branch").filter(|b| !b.is_empty()),
                    event.branch.as_deref(),
                ) {
                    (Some(configured), Some(changed)) => configured == changed,
                    _ => true,
                }
            }
        }
    }

    fn paths_allow(&self, resource: &ResourceConfig, event: &ChangeEvent) -> bool {
        if !self.path_filter {
            return true;
        }
        match resource.source.get_str_list("paths") {
            Some(patterns) => path_filter_allows(&patterns, &event.changed_files),
            None => true,
        }
    }
}

/// The dispatch item `event` produces for one cached resource, if any.
pub fn select(
    policy: &MatchPolicy,
    event: &ChangeEvent,
    pipeline: &Pipeline,
    resource: &ResourceConfig,
) -> Option<DispatchItem> {
    if !policy.allows_type(resource) {
        return None;
    }

    let uri = policy.resource_uri(resource)?;
    if !same_repository(&uri, &event.repository_url) {
        return None;
    }

    if !policy.branch_allows(resource, event) {
        debug!(
            pipeline = %pipeline,
            resource = %resource.name,
            branch = ?event.branch,
            "skipping resource due to branch"
        );
        return None;
    }

    if !policy.paths_allow(resource, event) {
        debug!(
            pipeline = %pipeline,
            resource = %resource.name,
            "skipping resource due to path filter"
        );
        return None;
    }

    match policy.dispatch {
        DispatchKind::WebhookUrl => match webhook_url(pipeline, resource) {
            Some(url) => Some(DispatchItem::webhook_url(url)),
            None => {
                warn!(pipeline = %pipeline, cluster = %pipeline.cluster, "cannot build webhook URL");
                None
            }
        },
        DispatchKind::ResourceCheck => Some(DispatchItem::resource_check(
            pipeline.cluster.clone(),
            pipeline.team.clone(),
            pipeline.pipeline_ref(),
            resource.name.clone(),
        )),
    }
}

/// Enqueue one item per matching resource and return how many were queued.
pub fn route(
    cache: &ResourceCache,
    queue: &RequestQueue,
    event: &ChangeEvent,
    policy: &MatchPolicy,
) -> usize {
    let mut queued = 0;

    cache.scan(|pipeline, resource| {
        if let Some(item) = select(policy, event, pipeline, resource) {
            debug!(%item, "queueing dispatch");
            queue.add(item);
            queued += 1;
        }
        ControlFlow::Continue(())
    });

    info!(
        repo = %event.repository_url,
        branch = ?event.branch,
        count = queued,
        "resources found"
    );

    queued
}
