use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use broadcaster::api::{self, AppState};
use broadcaster::config::{Cli, Command};
use broadcaster::metrics::{init_metrics, metrics_router};
use broadcaster::service::queue::HttpDispatcher;
use broadcaster::service::refresh::CacheRefresher;
use broadcaster::service::{RequestQueue, ResourceCache};
use broadcaster::supervisor::{Supervisor, watch_signals};
use broadcaster_client::Clusters;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = cli.command {
        println!("broadcaster {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let config = cli.config;

    // Initialize tracing
    let default_filter = if config.debug {
        "broadcaster=debug,broadcaster_client=debug,tower_http=debug"
    } else {
        "broadcaster=info,broadcaster_client=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate().context("invalid configuration")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dry_run = config.debug,
        "Starting broadcaster..."
    );

    let clusters = Arc::new(
        Clusters::from_urls(&config.concourse_url).context("failed to set up concourse clients")?,
    );
    tracing::info!(?clusters, "configured clusters");

    let metrics_handle = init_metrics().context("failed to install metrics recorder")?;

    let filter = config.cache_filter();
    if filter != Default::default() {
        tracing::info!(?filter, "limiting resource cache");
    }
    let cache = Arc::new(ResourceCache::with_filter(filter));
    let dispatcher = Arc::new(HttpDispatcher::new(Arc::clone(&clusters), config.debug));
    let queue = Arc::new(RequestQueue::new(dispatcher, config.webhook_concurrency));

    let shutdown = CancellationToken::new();
    let app = api::create_router(AppState {
        cache: Arc::clone(&cache),
        queue: Arc::clone(&queue),
        shutdown: shutdown.clone(),
    });

    let ext_listener = TcpListener::bind(config.ext_listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.ext_listen_addr))?;
    let int_listener = TcpListener::bind(config.int_listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.int_listen_addr))?;

    tracing::info!("Listening for webhooks on {}", config.ext_listen_addr);
    tracing::info!("Serving metrics on {}", config.int_listen_addr);

    let mut supervisor = Supervisor::new(shutdown.clone());

    supervisor.spawn("signals", watch_signals(shutdown.clone()));

    let refresher = CacheRefresher::new(cache, clusters, config.refresh_interval);
    supervisor.spawn("cache", refresher.run(shutdown.clone()));

    supervisor.spawn("workqueue", queue.run(shutdown.clone()));

    let token = shutdown.clone();
    supervisor.spawn("webhook server", async move {
        if let Err(e) = axum::serve(ext_listener, app)
            .with_graceful_shutdown(token.cancelled_owned())
            .await
        {
            tracing::error!("webhook server failed: {}", e);
        }
    });

    let token = shutdown.clone();
    let metrics_app = metrics_router(metrics_handle);
    supervisor.spawn("metrics server", async move {
        if let Err(e) = axum::serve(int_listener, metrics_app)
            .with_graceful_shutdown(token.cancelled_owned())
            .await
        {
            tracing::error!("metrics server failed: {}", e);
        }
    });

    supervisor.run().await;
    tracing::info!("broadcaster stopped");

    Ok(())
}
