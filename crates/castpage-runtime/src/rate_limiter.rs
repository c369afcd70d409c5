//! Sliding-window admission control for generation provider calls.
//!
//! The window is the half-open interval `(now - window, now]`: a grant recorded at `t` stops
//! counting at exactly `t + window`. Grants live in a non-decreasing deque so expiry only ever
//! touches the front. Grants stamped after `now` (the clock stepped backwards) are clamped to
//! `now` before anything else looks at the queue.

use std::{collections::VecDeque, time::Duration};

use castpage_core::is_outside_window;

use crate::clock::{duration_to_ms, Clock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    /// Caller must wait this long before the oldest grant leaves the window.
    Wait(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct SlidingWindowLimiter {
    window_ms: u64,
    quota: usize,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, quota: usize) -> Self {
        Self {
            window_ms: duration_to_ms(window),
            quota: quota.max(1),
        }
    }

    /// Clamps future-dated grants, then removes grants that have left the window ending at `now_ms`.
    pub fn purge(&self, queue: &mut VecDeque<u64>, now_ms: u64) {
        clamp_future_grants(queue, now_ms);
        while let Some(oldest) = queue.front().copied() {
            if !is_outside_window(oldest, now_ms, self.window_ms) {
                break;
            }
            queue.pop_front();
        }
    }

    /// Purges, then either records a grant at `now_ms` or reports how long to wait.
    pub fn admit(&self, queue: &mut VecDeque<u64>, now_ms: u64) -> Admission {
        self.purge(queue, now_ms);
        if queue.len() < self.quota {
            queue.push_back(now_ms);
            return Admission::Granted;
        }

        let oldest = queue.front().copied().unwrap_or(now_ms);
        let elapsed = now_ms.saturating_sub(oldest);
        Admission::Wait(Duration::from_millis(
            self.window_ms.saturating_sub(elapsed).max(1),
        ))
    }

    /// Waits at most once for admission and returns the grant timestamp.
    ///
    /// If the second evaluation still finds the window full (clock skew or a foreign writer),
    /// the grant is recorded anyway so a single caller never loops on the limiter.
    pub async fn acquire(&self, queue: &mut VecDeque<u64>, clock: &dyn Clock) -> u64 {
        let now_ms = clock.now_unix_ms();
        let delay = match self.admit(queue, now_ms) {
            Admission::Granted => return now_ms,
            Admission::Wait(delay) => delay,
        };

        tracing::info!(
            delay_ms = duration_to_ms(delay),
            queued = queue.len(),
            "generation rate limit reached, waiting for window"
        );
        clock.sleep(delay).await;

        let now_ms = clock.now_unix_ms();
        if let Admission::Wait(remaining) = self.admit(queue, now_ms) {
            tracing::warn!(
                remaining_ms = duration_to_ms(remaining),
                "generation window still full after waiting, granting anyway"
            );
            queue.push_back(now_ms);
        }
        now_ms
    }
}

/// Clamping keeps the queue sorted and keeps every future grant counting against the window.
fn clamp_future_grants(queue: &mut VecDeque<u64>, now_ms: u64) {
    for granted in queue.iter_mut().rev() {
        if *granted <= now_ms {
            break;
        }
        *granted = now_ms;
    }
}
