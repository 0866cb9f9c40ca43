//! API Module
//!
//! HTTP front door of the broadcaster: platform webhook endpoints, the
//! debug listing and health checks.

pub mod debug;
pub mod error;
pub mod health;
pub mod webhook;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::payload::MAX_BODY_BYTES;
use crate::service::{RequestQueue, ResourceCache};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ResourceCache>,
    pub queue: Arc<RequestQueue>,
    pub shutdown: CancellationToken,
}

/// Create the webhook router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Webhook endpoints
        .route("/", post(webhook::by_user_agent))
        .route("/github", post(webhook::github))
        .route("/gitlab", post(webhook::gitlab))
        .route("/bitbucket", post(webhook::bitbucket))
        // Debug endpoints
        .route("/debug", post(debug::list_resources))
        .route("/debug/shutdown", post(debug::shutdown))
        // Health checks
        .route("/health", get(health::health_check))
        .route("/healthz", get(health::health_check))
        // Add state and middleware
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(count_requests))
        .layer(TraceLayer::new_for_http())
}

async fn count_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;

    counter!(
        "http_requests_total",
        "code" => response.status().as_u16().to_string(),
        "method" => method
    )
    .increment(1);

    response
}
