//! Per-item exponential backoff for requeued dispatch items

use std::time::Duration;

/// Exponential backoff policy for failed dispatch items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of requeues after the first attempt.
    pub max_requeues: u32,

    /// Delay before the first requeue.
    pub base_delay: Duration,

    /// Cap for exponential growth.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// 5 requeues, 5s base delay doubling up to 60s.
    pub const DEFAULT: Self = Self {
        max_requeues: 5,
        base_delay: Duration::from_secs(5),
        max_delay: Duration::from_secs(60),
    };

    pub fn new(max_requeues: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_requeues,
            base_delay,
            max_delay,
        }
    }

    /// Delay before requeue number `requeue` (0-indexed): `base * 2^requeue`,
    /// capped at `max_delay`.
    pub fn delay_for_requeue(&self, requeue: u32) -> Duration {
        let factor = 2u32.checked_pow(requeue).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Whether an item that has been requeued `requeues` times may go again.
    pub fn may_requeue(&self, requeues: u32) -> bool {
        requeues < self.max_requeues
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}
