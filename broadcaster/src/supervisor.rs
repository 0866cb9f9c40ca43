//! Run group
//!
//! Long-running tasks share one [`CancellationToken`]. The first task to
//! return cancels it, and [`Supervisor::run`] then waits for the rest.

use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct Supervisor {
    shutdown: CancellationToken,
    tasks: JoinSet<&'static str>,
}

impl Supervisor {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            tasks: JoinSet::new(),
        }
    }

    /// Token the supervised tasks must watch
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Start a task. `name` is logged when it exits.
    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(async move {
            task.await;
            name
        });
    }

    /// Wait for the first task to exit, cancel the rest and wait for them.
    pub async fn run(mut self) {
        let mut first = true;

        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(name) => info!(task = name, "task stopped"),
                Err(e) => error!("task failed: {}", e),
            }

            if first {
                first = false;
                info!("shutting down");
                self.shutdown.cancel();
            }
        }
    }
}

/// Resolve once Ctrl-C or SIGTERM arrives, or `shutdown` is cancelled.
pub async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received interrupt"),
        _ = terminate => info!("received SIGTERM"),
        _ = shutdown.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_exit_stops_everyone() {
        let mut supervisor = Supervisor::new(CancellationToken::new());
        let stopped = Arc::new(AtomicBool::new(false));

        let token = supervisor.shutdown_token();
        let flag = Arc::clone(&stopped);
        supervisor.spawn("waiter", async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });
        supervisor.spawn("quitter", async {
            tokio::time::sleep(Duration::from_millis(10)).await;
        });

        let token = supervisor.shutdown_token();
        tokio::time::timeout(Duration::from_secs(1), supervisor.run())
            .await
            .expect("supervisor did not return");

        assert!(token.is_cancelled());
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_signal_watcher_returns_on_cancel() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), watch_signals(shutdown))
            .await
            .expect("watcher did not return");
    }
}
