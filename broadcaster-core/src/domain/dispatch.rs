//! Dispatch items: units of outbound work for the request queue

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use super::pipeline::PipelineRef;

static WEBHOOK_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"webhook_token=[^&#]+").unwrap());

/// One unit of outbound work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchItem {
    /// A complete webhook-check URL carrying its own `webhook_token`.
    WebhookUrl { url: String },
    /// A check that must go through an authenticated cluster client.
    ResourceCheck(ResourceCheck),
}

impl DispatchItem {
    pub fn webhook_url(url: impl Into<String>) -> Self {
        Self::WebhookUrl { url: url.into() }
    }

    pub fn resource_check(
        cluster: impl Into<String>,
        team: impl Into<String>,
        pipeline: PipelineRef,
        resource: impl Into<String>,
    ) -> Self {
        Self::ResourceCheck(ResourceCheck {
            cluster: cluster.into(),
            team: team.into(),
            pipeline,
            resource: resource.into(),
        })
    }
}

impl fmt::Display for DispatchItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebhookUrl { url } => f.write_str(&redact_webhook_token(url)),
            Self::ResourceCheck(check) => fmt::Display::fmt(check, f),
        }
    }
}

/// Reference to one resource of one pipeline on one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCheck {
    /// Canonical base URL of the owning cluster.
    pub cluster: String,
    pub team: String,
    pub pipeline: PipelineRef,
    pub resource: String,
}

impl fmt::Display for ResourceCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/{}/{}",
            self.cluster, self.team, self.pipeline, self.resource
        )
    }
}

/// Replaces every `webhook_token` query value in `url` with a marker.
pub fn redact_webhook_token(url: &str) -> String {
    WEBHOOK_TOKEN_RE
        .replace_all(url, "webhook_token=[REDACTED]")
        .into_owned()
}
