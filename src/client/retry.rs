//! Retry policy with exponential backoff and jitter

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::client::traits::GenerationError;
use crate::config::GenerationConfig;
use crate::limiter::RateLimiter;
use crate::resource::MediaClass;

/// Backoff schedule for retryable provider failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Adds up to 25% random extra delay to de-synchronize workers.
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig, class: MediaClass) -> Self {
        let max_attempts = match class {
            MediaClass::Image => config.image_max_attempts,
            MediaClass::Video => config.video_max_attempts,
        };
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_secs(config.backoff_base_secs),
            multiplier: 2.0,
            max_delay: Duration::from_secs(config.backoff_max_secs),
            jitter: true,
        }
    }

    /// Delay before retry number `retries_done + 1`.
    ///
    /// base=2s, multiplier=2.0 gives the 2, 4, 8, 16, 32 s ladder, capped at
    /// `max_delay` before jitter is applied.
    pub fn delay_for(&self, retries_done: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * self.multiplier.powi(retries_done as i32);
        let capped = exp.min(self.max_delay.as_secs_f64());
        let jittered = if self.jitter {
            capped * (1.0 + rand::thread_rng().gen_range(0.0..0.25))
        } else {
            capped
        };
        Duration::from_secs_f64(jittered)
    }
}

/// Successful call plus how many retries it took.
#[derive(Debug)]
pub struct CallOutcome {
    pub bytes: Vec<u8>,
    pub retry_count: u32,
}

/// Exhausted or terminal failure.
#[derive(Debug)]
pub struct CallFailure {
    pub message: String,
    pub retry_count: u32,
    pub terminal: bool,
}

/// Run one provider call under the retry policy.
///
/// Every attempt, including retries, consumes a rate-limiter slot for
/// `class`. Terminal errors fail immediately with `retry_count == 0`;
/// retryable errors back off and retry up to `policy.max_attempts` total
/// attempts before surfacing the last error.
pub async fn call_with_retry<F, Fut>(
    policy: &RetryPolicy,
    limiter: &RateLimiter,
    class: MediaClass,
    call: F,
) -> std::result::Result<CallOutcome, CallFailure>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<Vec<u8>, GenerationError>>,
{
    let mut retry_count = 0u32;

    loop {
        limiter.acquire(class).await;

        match call().await {
            Ok(bytes) => {
                return Ok(CallOutcome { bytes, retry_count });
            }
            Err(GenerationError::Terminal(message)) => {
                return Err(CallFailure {
                    message,
                    retry_count,
                    terminal: true,
                });
            }
            Err(GenerationError::Retryable(message)) => {
                if retry_count + 1 >= policy.max_attempts {
                    return Err(CallFailure {
                        message,
                        retry_count,
                        terminal: false,
                    });
                }
                let delay = policy.delay_for(retry_count);
                retry_count += 1;
                warn!(
                    class = class.as_str(),
                    attempt = retry_count,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "provider call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
