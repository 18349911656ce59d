//! Concurrency and retry policy.
//!
//! Two independent [`Semaphore`]s gate generation and verification jobs, grounded in the same
//! `worker_semaphore`/retry-loop shape used by orchestrator-style examples in the pack
//! (`deepresearch-rs`'s `RigOrchestrator::execute_task`, `apex`'s `worker_semaphore`).

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorKind, OrchestratorError};

pub struct ConcurrencyGovernor {
    generation: Arc<Semaphore>,
    verification: Arc<Semaphore>,
}

/// Held for the lifetime of a job; dropping it releases the permit on every exit path, including
/// cancellation and panics.
pub struct Permit<'a> {
    _inner: SemaphorePermit<'a>,
}

impl ConcurrencyGovernor {
    pub fn new(generation_permits: usize, verification_permits: usize) -> Self {
        ConcurrencyGovernor {
            generation: Arc::new(Semaphore::new(generation_permits)),
            verification: Arc::new(Semaphore::new(verification_permits)),
        }
    }

    pub async fn acquire_generation(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Permit<'_>, OrchestratorError> {
        tokio::select! {
            permit = self.generation.acquire() => {
                let permit = permit.map_err(|_| OrchestratorError::internal("generation semaphore closed"))?;
                Ok(Permit { _inner: permit })
            }
            _ = cancel.cancelled() => Err(OrchestratorError::cancelled("cancelled while waiting for a generation permit")),
        }
    }

    pub async fn acquire_verification(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Permit<'_>, OrchestratorError> {
        tokio::select! {
            permit = self.verification.acquire() => {
                let permit = permit.map_err(|_| OrchestratorError::internal("verification semaphore closed"))?;
                Ok(Permit { _inner: permit })
            }
            _ = cancel.cancelled() => Err(OrchestratorError::cancelled("cancelled while waiting for a verification permit")),
        }
    }

    pub fn available_generation_permits(&self) -> usize {
        self.generation.available_permits()
    }

    pub fn available_verification_permits(&self) -> usize {
        self.verification.available_permits()
    }
}

/// Exponential backoff with jitter, grounded in the spec's retry policy: base 500ms, factor 2,
/// up to 2 retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub factor: f64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { max_retries: 2, base_delay: Duration::from_millis(500), factor: 2.0, jitter: 0.2 }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: usize, rand_unit: f64) -> Duration {
        let backoff_ms = self.base_delay.as_millis() as f64 * self.factor.powi(attempt as i32);
        let jitter_factor = 1.0 + (rand_unit * 2.0 - 1.0) * self.jitter;
        Duration::from_millis((backoff_ms * jitter_factor).max(0.0) as u64)
    }

    /// Runs `op` under this retry policy. Only [`OrchestratorError::is_retryable`] errors
    /// (Timeout, transient Unavailable) are retried; anything else propagates immediately.
    pub async fn run<F, Fut, T>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, OrchestratorError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, OrchestratorError>>,
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(OrchestratorError::cancelled("cancelled before LLM call"));
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && e.is_retryable() => {
                    attempt += 1;
                    let rand_unit = pseudo_random_unit(attempt);
                    let delay = self.delay_for(attempt - 1, rand_unit);
                    log::warn!("retrying after {:?} (attempt {}/{}): {}", delay, attempt, self.max_retries, e);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = cancel.cancelled() => return Err(OrchestratorError::cancelled("cancelled during retry backoff")),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// A small deterministic jitter source. `Math.random()`/wall-clock entropy would make retry
/// timing non-reproducible in tests; this is good enough for jitter, not for security.
fn pseudo_random_unit(seed: usize) -> f64 {
    let x = (seed as u64).wrapping_mul(2654435761).wrapping_add(1);
    ((x % 1000) as f64) / 1000.0
}

/// Runs `fut` with a deadline; cancels `cancel` if the deadline is hit so downstream suspension
/// points (LLM calls, tool I/O, store writes) observe it promptly.
pub async fn with_timeout<F, T>(
    duration: Option<Duration>,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, OrchestratorError>
where
    F: std::future::Future<Output = Result<T, OrchestratorError>>,
{
    match duration {
        None => fut.await,
        Some(duration) => {
            tokio::select! {
                result = fut => result,
                _ = tokio::time::sleep(duration) => {
                    cancel.cancel();
                    Err(OrchestratorError::new(ErrorKind::Timeout, format!("deadline of {:?} exceeded", duration)))
                }
            }
        }
    }
}
