//! Debug API Handlers
//!
//! Plain-text listing of the cached resources, and a remote shutdown switch.

use std::fmt::Write;
use std::ops::ControlFlow;

use axum::{
    body::Bytes,
    extract::{Query, State},
};
use serde::Deserialize;

use broadcaster_core::matching::{construct_uri, same_repository};

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::CacheFilter;

#[derive(Debug, Default, Deserialize)]
pub struct DebugRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DebugQuery {
    pub team: Option<String>,
    pub pipeline: Option<String>,
}

/// POST /debug
/// List cached resources, optionally only those of one repository
pub async fn list_resources(
    State(state): State<AppState>,
    Query(query): Query<DebugQuery>,
    body: Bytes,
) -> ApiResult<String> {
    let request: DebugRequest = if body.is_empty() {
        DebugRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("debug: body parse error: {e}")))?
    };

    let filter = CacheFilter {
        cluster: None,
        team: query.team.filter(|t| !t.is_empty()),
        pipeline: query.pipeline.filter(|p| !p.is_empty()),
    };
    let repo = request.url.as_deref().filter(|url| !url.is_empty());

    let mut out = String::new();
    let mut searched = 0;
    let mut result = Ok(());

    writeln!(out, "Request: url={}", repo.unwrap_or_default())?;

    state.cache.scan(|pipeline, resource| {
        if !filter.matches(pipeline) {
            return ControlFlow::Continue(());
        }
        searched += 1;

        let uri = construct_uri(&resource.source);
        let listed = match repo {
            Some(repo) => uri.as_deref().is_some_and(|uri| same_repository(uri, repo)),
            None => true,
        };
        if !listed {
            return ControlFlow::Continue(());
        }

        result = writeln!(
            out,
            "Found: {} {:?} [{}] - {}",
            pipeline,
            resource.name,
            resource.resource_type,
            uri.as_deref().unwrap_or_default()
        );
        if result.is_err() {
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    });
    result?;

    writeln!(out, "# Searched {searched} entries")?;
    Ok(out)
}

/// POST /debug/shutdown
pub async fn shutdown(State(state): State<AppState>) -> &'static str {
    tracing::warn!("shutdown requested via debug endpoint");
    state.shutdown.cancel();
    "shutting down\n"
}
