//! Dispatch Work Queue
//!
//! A fixed pool of workers drains one shared queue of dispatch items.
//! Failed items are requeued after an exponential backoff delay, at most
//! [`RetryPolicy::max_requeues`] times, and then dropped and counted as a
//! final error. Success and error counters move once per item, never per
//! attempt.

pub mod backoff;
pub mod dispatcher;

pub use backoff::RetryPolicy;
pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher, HttpDispatcher};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use broadcaster_core::domain::DispatchItem;

/// A queued item together with its retry history
#[derive(Debug)]
struct Envelope {
    item: DispatchItem,
    requeues: u32,
    enqueued_at: Instant,
}

/// Terminal outcome counters, readable at any time
#[derive(Debug, Default)]
pub struct QueueStats {
    added: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

/// Point-in-time copy of [`QueueStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatsSnapshot {
    pub added: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub retried: u64,
}

impl QueueStats {
    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            added: self.added.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
        }
    }
}

/// Rate-limited, retrying work queue for dispatch items
pub struct RequestQueue {
    tx: mpsc::UnboundedSender<Envelope>,
    rx: Mutex<mpsc::UnboundedReceiver<Envelope>>,
    dispatcher: Arc<dyn Dispatcher>,
    policy: RetryPolicy,
    workers: usize,
    depth: AtomicUsize,
    /// Failed items waiting out their backoff delay
    delayed: AtomicUsize,
    stats: QueueStats,
}

impl RequestQueue {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, workers: usize) -> Self {
        Self::with_policy(dispatcher, workers, RetryPolicy::DEFAULT)
    }

    pub fn with_policy(dispatcher: Arc<dyn Dispatcher>, workers: usize, policy: RetryPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            dispatcher,
            policy,
            workers: workers.max(1),
            depth: AtomicUsize::new(0),
            delayed: AtomicUsize::new(0),
            stats: QueueStats::default(),
        }
    }

    /// Enqueue an item. Never blocks; identical items are not merged.
    pub fn add(&self, item: DispatchItem) {
        self.stats.added.fetch_add(1, Ordering::Relaxed);
        counter!("webhook_adds_total").increment(1);
        self.push(Envelope {
            item,
            requeues: 0,
            enqueued_at: Instant::now(),
        });
    }

    /// Items waiting to be picked up by a worker
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items waiting for their retry delay to pass
    pub fn delayed(&self) -> usize {
        self.delayed.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        self.stats.snapshot()
    }

    fn push(&self, envelope: Envelope) {
        // Counted before sending so a worker never sees the depth go negative.
        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        gauge!("webhook_depth").set(depth as f64);

        // The receiver lives in `self`, so the channel cannot be closed here.
        if self.tx.send(envelope).is_err() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
    }

    async fn next(&self) -> Option<Envelope> {
        let envelope = self.rx.lock().await.recv().await?;
        let depth = self.depth.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        gauge!("webhook_depth").set(depth as f64);
        Some(envelope)
    }

    // =============================================================================
    // Workers
    // =============================================================================

    /// Run the worker pool until `shutdown` is cancelled.
    ///
    /// Workers finish the item they are processing before exiting; items
    /// still queued or waiting for a retry are dropped, logged and counted
    /// in `webhook_dropped_total`.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(workers = self.workers, "starting request workqueue");

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            workers.spawn(Arc::clone(&self).worker(id, shutdown.clone()));
        }

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!("dispatch worker panicked: {}", e);
            }
        }

        let queued = self.len();
        let delayed = self.delayed();
        if queued + delayed > 0 {
            warn!(queued, delayed, "dropping undelivered items on shutdown");
            counter!("webhook_dropped_total").increment((queued + delayed) as u64);
        }

        info!("request workqueue stopped");
    }

    async fn worker(self: Arc<Self>, id: usize, shutdown: CancellationToken) {
        debug!(worker = id, "dispatch worker started");

        loop {
            let envelope = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                envelope = self.next() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            self.process(envelope, &shutdown).await;
        }

        debug!(worker = id, "dispatch worker stopped");
    }

    async fn process(self: &Arc<Self>, envelope: Envelope, shutdown: &CancellationToken) {
        histogram!("webhook_queue_latency_seconds").record(envelope.enqueued_at.elapsed().as_secs_f64());

        let started = Instant::now();
        let result = self.dispatcher.dispatch(&envelope.item).await;
        histogram!("webhook_work_duration_seconds").record(started.elapsed().as_secs_f64());

        match result {
            Ok(outcome) => {
                if outcome == DispatchOutcome::NotFound {
                    debug!(item = %envelope.item, "resource gone, dropping item");
                }
                self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
                counter!("webhook_success_total").increment(1);
            }
            Err(e) if self.policy.may_requeue(envelope.requeues) => {
                let delay = self.policy.delay_for_requeue(envelope.requeues);
                warn!(
                    item = %envelope.item,
                    attempt = envelope.requeues + 1,
                    retry_in = ?delay,
                    error = %e,
                    "error sending webhook, will retry"
                );
                self.stats.retried.fetch_add(1, Ordering::Relaxed);
                counter!("webhook_retries_total").increment(1);
                self.requeue_after(envelope, delay, shutdown.clone());
            }
            Err(e) => {
                error!(
                    item = %envelope.item,
                    attempts = envelope.requeues + 1,
                    error = %e,
                    "error sending webhook, giving up"
                );
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                counter!("webhook_errors_total").increment(1);
            }
        }
    }

    fn requeue_after(self: &Arc<Self>, envelope: Envelope, delay: std::time::Duration, shutdown: CancellationToken) {
        // Stays counted when shutdown wins, so `run` can report the drop.
        self.delayed.fetch_add(1, Ordering::Relaxed);

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    queue.delayed.fetch_sub(1, Ordering::Relaxed);
                    queue.push(Envelope {
                        item: envelope.item,
                        requeues: envelope.requeues + 1,
                        enqueued_at: Instant::now(),
                    });
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Dispatcher returning a fixed result and counting attempts
    struct FakeDispatcher {
        result: fn() -> Result<DispatchOutcome, DispatchError>,
        attempts: AtomicUsize,
    }

    impl FakeDispatcher {
        fn new(result: fn() -> Result<DispatchOutcome, DispatchError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                attempts: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Dispatcher for FakeDispatcher {
        async fn dispatch(&self, _item: &DispatchItem) -> Result<DispatchOutcome, DispatchError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn failing() -> Result<DispatchOutcome, DispatchError> {
        Err(DispatchError::Status {
            url: "https://ci.example/".to_string(),
            status: 500,
        })
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(5, Duration::from_millis(1), Duration::from_millis(4))
    }

    fn item() -> DispatchItem {
        DispatchItem::webhook_url("https://ci.example/check/webhook?webhook_token=t")
    }

    /// Wait until `done` holds for the queue's stats, or panic after 5s.
    async fn wait_for(queue: &RequestQueue, done: impl Fn(QueueStatsSnapshot) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done(queue.stats()) {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("queue did not settle in time");
    }

    #[tokio::test]
    async fn test_failing_item_retries_up_to_cap() {
        let dispatcher = FakeDispatcher::new(failing);
        let queue = Arc::new(RequestQueue::with_policy(dispatcher.clone(), 2, fast_policy()));
        let shutdown = CancellationToken::new();
        let runner = tokio::spawn(Arc::clone(&queue).run(shutdown.clone()));

        queue.add(item());
        wait_for(&queue, |s| s.failed == 1).await;

        // Nothing else may arrive after the final failure.
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();
        runner.await.unwrap();

        assert_eq!(dispatcher.attempts.load(Ordering::SeqCst), 6);
        assert_eq!(
            queue.stats(),
            QueueStatsSnapshot {
                added: 1,
                succeeded: 0,
                failed: 1,
                retried: 5,
            }
        );
    }

    #[tokio::test]
    async fn test_not_found_is_terminal_success() {
        let dispatcher = FakeDispatcher::new(|| Ok(DispatchOutcome::NotFound));
        let queue = Arc::new(RequestQueue::with_policy(dispatcher.clone(), 1, fast_policy()));
        let shutdown = CancellationToken::new();
        let runner = tokio::spawn(Arc::clone(&queue).run(shutdown.clone()));

        queue.add(item());
        wait_for(&queue, |s| s.succeeded == 1).await;
        shutdown.cancel();
        runner.await.unwrap();

        assert_eq!(dispatcher.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(queue.stats().retried, 0);
        assert_eq!(queue.stats().failed, 0);
    }

    #[tokio::test]
    async fn test_duplicates_are_not_merged() {
        let dispatcher = FakeDispatcher::new(|| Ok(DispatchOutcome::Delivered));
        let queue = Arc::new(RequestQueue::with_policy(dispatcher.clone(), 3, fast_policy()));

        for _ in 0..4 {
            queue.add(item());
        }
        assert_eq!(queue.len(), 4);

        let shutdown = CancellationToken::new();
        let runner = tokio::spawn(Arc::clone(&queue).run(shutdown.clone()));
        wait_for(&queue, |s| s.succeeded == 4).await;
        shutdown.cancel();
        runner.await.unwrap();

        assert_eq!(dispatcher.attempts.load(Ordering::SeqCst), 4);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_reports_undelivered_items() {
        let dispatcher = FakeDispatcher::new(failing);
        let slow_retry = RetryPolicy::new(5, Duration::from_secs(3600), Duration::from_secs(3600));
        let queue = Arc::new(RequestQueue::with_policy(dispatcher.clone(), 1, slow_retry));
        let shutdown = CancellationToken::new();
        let runner = tokio::spawn(Arc::clone(&queue).run(shutdown.clone()));

        queue.add(item());
        wait_for(&queue, |s| s.retried == 1).await;
        assert_eq!(queue.delayed(), 1);

        shutdown.cancel();
        runner.await.unwrap();

        assert_eq!(dispatcher.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(queue.delayed(), 1);
        assert_eq!(queue.stats().failed, 0);
    }

    #[tokio::test]
    async fn test_run_returns_on_shutdown() {
        let dispatcher = FakeDispatcher::new(|| Ok(DispatchOutcome::Delivered));
        let queue = Arc::new(RequestQueue::new(dispatcher, 4));
        let shutdown = CancellationToken::new();
        let runner = tokio::spawn(Arc::clone(&queue).run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .expect("workers did not stop")
            .unwrap();
    }
}
