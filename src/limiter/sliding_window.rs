//! Sliding-window rate limiter for outbound generation calls
//!
//! The provider meters image and video calls separately, so each media class
//! gets its own lane: a rolling 60 second window capped at
//! `requests_per_minute` grants plus a mandatory minimum gap between
//! consecutive grants. `acquire` suspends the caller until a slot is free.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{ClassLimitConfig, RateLimitConfig};
use crate::resource::MediaClass;

const WINDOW: Duration = Duration::from_secs(60);
// Small cushion when sleeping until the oldest grant ages out, so a wake-up
// right at the boundary does not spin.
const WINDOW_SLACK: Duration = Duration::from_millis(100);

struct Lane {
    requests_per_minute: usize,
    min_gap: Duration,
    // Grant timestamps within the rolling window, oldest first. Waiters queue
    // on this mutex; tokio's Mutex is fair, which gives FIFO among them, and
    // holding it across the sleep keeps later arrivals behind earlier ones.
    grants: Mutex<VecDeque<Instant>>,
}

impl Lane {
    fn new(config: &ClassLimitConfig) -> Self {
        Self {
            requests_per_minute: config.requests_per_minute.max(1) as usize,
            min_gap: Duration::from_millis(config.min_gap_ms),
            grants: Mutex::new(VecDeque::new()),
        }
    }

    async fn acquire(&self, class: MediaClass) {
        let mut grants = self.grants.lock().await;

        loop {
            let now = Instant::now();

            while let Some(front) = grants.front() {
                if now.duration_since(*front) > WINDOW {
                    grants.pop_front();
                } else {
                    break;
                }
            }

            let mut wait = Duration::ZERO;
            if let Some(last) = grants.back() {
                let since_last = now.duration_since(*last);
                if since_last < self.min_gap {
                    wait = self.min_gap - since_last;
                }
            }
            if wait.is_zero() && grants.len() >= self.requests_per_minute {
                // Window is full; wait for the oldest grant to age out.
                if let Some(oldest) = grants.front() {
                    wait = WINDOW
                        .saturating_sub(now.duration_since(*oldest))
                        .saturating_add(WINDOW_SLACK);
                }
            }

            if wait.is_zero() {
                grants.push_back(Instant::now());
                return;
            }

            debug!(
                class = class.as_str(),
                wait_ms = wait.as_millis() as u64,
                in_window = grants.len(),
                "rate limiter waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }

}

/// Per-class rate limiter shared by all workers.
pub struct RateLimiter {
    image: Lane,
    video: Lane,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            image: Lane::new(&config.image),
            video: Lane::new(&config.video),
        }
    }

    fn lane(&self, class: MediaClass) -> &Lane {
        match class {
            MediaClass::Image => &self.image,
            MediaClass::Video => &self.video,
        }
    }

    /// Suspend until a slot is free for `class`, then take it.
    ///
    /// Guarantees: grants for one class are at least `min_gap` apart, at most
    /// `requests_per_minute` fall inside any rolling 60 s window, and waiters
    /// are served in arrival order. Classes do not contend with each other.
    pub async fn acquire(&self, class: MediaClass) {
        self.lane(class).acquire(class).await;
    }
}
