//! Bounded retry with an injected backoff policy.

use log::debug;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Delay between two consecutive attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    Fixed(Duration),
    /// `min(base * 2^attempt, max)`, optionally with full jitter.
    Exponential {
        base: Duration,
        max: Duration,
        jitter: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Backoff::Exponential {
                base: Duration::from_millis(100),
                max: Duration::from_secs(2),
                jitter: true,
            },
        }
    }
}

impl RetryPolicy {
    pub fn immediate() -> Self {
        Self {
            backoff: Backoff::None,
        }
    }

    pub fn new(backoff: Backoff) -> Self {
        Self { backoff }
    }

    /// Delay to wait after the failed attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential { base, max, jitter } => {
                let factor = 2u32.saturating_pow(attempt.min(16));
                let ceiling = base.saturating_mul(factor).min(*max);
                if *jitter && !ceiling.is_zero() {
                    let millis = ceiling.as_millis().min(u64::MAX as u128) as u64;
                    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
                } else {
                    ceiling
                }
            }
        }
    }
}

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    /// HTTP status when a response was received, `None` for transport errors.
    pub status: Option<u16>,
    pub message: String,
}

impl AttemptFailure {
    pub fn transport(err: impl fmt::Display) -> Self {
        Self {
            status: None,
            message: err.to_string(),
        }
    }

    pub fn status(status: u16, status_line: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: status_line.into(),
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Runs `operation` once plus up to `max_retries` more times until it
/// succeeds. The last failure is returned when every attempt failed.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    max_retries: u32,
    mut operation: F,
) -> Result<T, AttemptFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptFailure>>,
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(failure) if attempt >= max_retries => return Err(failure),
            Err(failure) => {
                let delay = policy.delay_for(attempt);
                debug!(
                    "attempt {}/{} failed: {}, retrying in {:?}",
                    attempt + 1,
                    max_retries + 1,
                    failure,
                    delay
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
