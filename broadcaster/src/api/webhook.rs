//! Webhook API Handlers
//!
//! One endpoint per platform, plus `/` which picks the platform from the
//! `User-Agent` header.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::payload::{self, Decoded};
use crate::service::{Platform, ingest};

/// POST /github
pub async fn github(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    handle(&state, Platform::GitHub, &body)
}

/// POST /gitlab
pub async fn gitlab(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    handle(&state, Platform::GitLab, &body)
}

/// POST /bitbucket
pub async fn bitbucket(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    handle(&state, Platform::Bitbucket, &body)
}

/// POST /
/// Dispatch on the sender's user agent
pub async fn by_user_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let platform = Platform::from_user_agent(user_agent)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown user agent: {user_agent:?}")))?;

    handle(&state, platform, &body)
}

fn handle(state: &AppState, platform: Platform, body: &[u8]) -> ApiResult<Response> {
    let event = match payload::decode(platform, body)? {
        Decoded::Event(event) => event,
        Decoded::Ignored(reason) => {
            tracing::info!(%platform, "{}", reason);
            return Ok((StatusCode::OK, reason).into_response());
        }
    };

    tracing::debug!(%platform, repo = %event.repository_url, "received change event");

    let matched = ingest::route(&state.cache, &state.queue, &event, &platform.policy());
    if matched == 0 {
        return Err(ApiError::NotFound(format!(
            "no resources found for {}",
            event.repository_url
        )));
    }

    Ok((StatusCode::ACCEPTED, Json(json!({ "matched": matched }))).into_response())
}
