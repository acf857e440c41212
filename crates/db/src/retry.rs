//! Backoff for transient SQLite failures.
//!
//! Concurrent writers on one SQLite file surface as SQLITE_BUSY (5),
//! SQLITE_LOCKED (6) or, under WAL + mmap, one of the SQLITE_IOERR (10)
//! codes. sqlx reports extended result codes, so `SQLITE_BUSY_SNAPSHOT`
//! arrives as 517 and is matched on its primary code in the low byte.

use std::future::Future;
use std::time::Duration;

use sqlx::Error as SqlxError;

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// First backoff; doubles on each further attempt.
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction (0.0..=1.0) of the delay added as jitter.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 25,
            max_delay_ms: 1000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    /// No retries at all; the first error is returned.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let capped = exp.min(self.max_delay_ms);

        let jitter_range = (capped as f64 * self.jitter_factor.clamp(0.0, 1.0)) as u64;
        let jitter = if jitter_range == 0 {
            0
        } else {
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos() as u64;
            nanos % jitter_range
        };

        Duration::from_millis(capped + jitter)
    }
}

/// True for any BUSY, LOCKED or IOERR code, extended variants included.
pub fn is_retryable_error(e: &SqlxError) -> bool {
    let SqlxError::Database(db_err) = e else {
        return false;
    };
    db_err
        .code()
        .and_then(|code| code.parse::<u32>().ok())
        .is_some_and(is_retryable_code)
}

fn is_retryable_code(code: u32) -> bool {
    matches!(code & 0xff, 5 | 6 | 10)
}

/// Run `f`, retrying transient SQLite errors with capped exponential backoff.
///
/// Non-transient errors and the error after the last attempt are returned
/// unchanged.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation: &str,
    mut f: F,
) -> Result<T, SqlxError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SqlxError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(operation, attempts = attempt + 1, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < config.max_retries && is_retryable_error(&e) => {
                let delay = config.delay_for(attempt);
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient SQLite error, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt > 0 {
                    tracing::error!(operation, attempts = attempt + 1, error = %e, "Giving up after retries");
                }
                return Err(e);
            }
        }
    }
}
