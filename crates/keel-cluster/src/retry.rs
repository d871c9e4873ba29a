// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Constant-interval retry bounded by a wall-clock budget.
//!
//! Each attempt classifies its failure as [`Attempt::Expected`] (wait and
//! try again) or [`Attempt::Fatal`] (stop now). Waiting between attempts
//! is cancellable; an attempt already running is allowed to finish, but its
//! result is discarded once cancellation has been observed.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Failure classification for one attempt.
#[derive(Debug)]
pub enum Attempt<E> {
    /// The operation may succeed later.
    Expected(E),
    /// Retrying cannot help.
    Fatal(E),
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The budget ran out; carries the last expected error.
    Exhausted {
        /// Error from the final attempt.
        last: E,
        /// Number of attempts made.
        attempts: u32,
    },
    /// An attempt failed fatally.
    Fatal(E),
    /// Cancellation was requested.
    Cancelled,
}

/// Retry policy with a constant interval between attempts.
#[derive(Debug, Clone, Copy)]
pub struct ConstantRetry {
    budget: Duration,
    interval: Duration,
}

impl ConstantRetry {
    /// Creates a policy that keeps retrying for `budget`, waiting
    /// `interval` between attempts.
    #[must_use]
    pub const fn new(budget: Duration, interval: Duration) -> Self {
        Self { budget, interval }
    }

    /// Returns the total time budget.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Returns the wait between attempts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs `op` until it succeeds, fails fatally, runs out of budget or is
    /// cancelled. `op` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Exhausted`] if the next wait would overrun the
    /// budget, [`RetryError::Fatal`] on a fatal attempt, and
    /// [`RetryError::Cancelled`] if `cancel` fires.
    pub async fn run<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, Attempt<E>>>,
    {
        // A budget too large to represent never runs out
        let deadline = Instant::now().checked_add(self.budget);
        let mut attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            attempts += 1;
            let result = op(attempts).await;

            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            let err = match result {
                Ok(value) => return Ok(value),
                Err(Attempt::Fatal(err)) => return Err(RetryError::Fatal(err)),
                Err(Attempt::Expected(err)) => err,
            };

            if let Some(deadline) = deadline {
                let overruns = Instant::now()
                    .checked_add(self.interval)
                    .map_or(true, |next_attempt| next_attempt > deadline);
                if overruns {
                    return Err(RetryError::Exhausted { last: err, attempts });
                }
            }

            debug!(attempt = attempts, error = %err, "Attempt failed, retrying");

            tokio::select! {
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = sleep(self.interval) => {}
            }
        }
    }
}
