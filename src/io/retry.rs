use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Progress, RangeFetch};
use crate::error::{Error, Result};

/// Bounded retry around a single [`RangeFetch`] attempt.
///
/// Every attempt restarts from the requested offset; bytes received by a
/// failed attempt are discarded (but stay counted as transferred).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before retry `n` is `base_delay * n`.
    pub base_delay: Duration,
    /// Decides which failures are worth another attempt.
    pub classify: fn(&Error) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            classify: Error::is_transient,
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Fill `buf` from `offset`, retrying transient failures.
    ///
    /// Cancelling `cancel` drops the in-flight attempt and returns [`Error::Cancelled`].
    pub async fn fetch<F: RangeFetch + ?Sized>(
        &self,
        fetcher: &F,
        offset: u64,
        buf: &mut [u8],
        progress: &mut Progress<'_>,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let mut attempt = 1;
        loop {
            progress.restart();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = fetcher.fetch_once(offset, buf, progress) => result,
            };

            match result {
                Ok(n) => return Ok(n),
                Err(err) => {
                    debug!(offset, len = buf.len(), "range fetch attempt failed");
                    self.backoff(attempt, err, cancel).await?;
                    attempt += 1;
                }
            }
        }
    }

    /// Run an operation that owns its inputs, retrying transient failures.
    pub async fn run<T, Fut, Op>(&self, cancel: &CancellationToken, mut op: Op) -> Result<T>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = op() => result,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    self.backoff(attempt, err, cancel).await?;
                    attempt += 1;
                }
            }
        }
    }

    /// Wait before the next attempt, or hand back `err` when it should surface.
    async fn backoff(&self, attempt: u32, err: Error, cancel: &CancellationToken) -> Result<()> {
        if attempt >= self.max_attempts || !(self.classify)(&err) {
            return Err(err);
        }
        warn!(
            attempt,
            max_attempts = self.max_attempts,
            error = %err,
            "attempt failed, retrying"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(self.delay(attempt)) => Ok(()),
        }
    }
}
