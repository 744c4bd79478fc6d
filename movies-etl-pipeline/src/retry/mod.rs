//! Exponential backoff for calls to external services.
//!
//! A failed call is retried after `start * factor^n` for the n-th retry. Once
//! the next sleep would exceed `border` the error is surfaced as
//! [`PipelineError::RetryExhausted`]. Only transient errors are retried.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::errors::PipelineError;

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    start: Duration,
    factor: f64,
    border: Duration,
}

impl RetryPolicy {
    /// Create a policy, rejecting parameters that would never back off.
    pub fn new(start: Duration, factor: f64, border: Duration) -> Result<Self, PipelineError> {
        if start.is_zero() {
            return Err(PipelineError::config("backoff start must be positive"));
        }
        if !factor.is_finite() || factor <= 1.0 {
            return Err(PipelineError::config(format!(
                "backoff factor must be greater than 1, got {factor}"
            )));
        }
        if border < start {
            return Err(PipelineError::config(format!(
                "backoff border {border:?} is shorter than start {start:?}"
            )));
        }

        Ok(Self {
            start,
            factor,
            border,
        })
    }

    pub fn start(&self) -> Duration {
        self.start
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn border(&self) -> Duration {
        self.border
    }

    /// Sleep before the retry following failed attempt `attempt` (0-based).
    ///
    /// `None` once the sleep would exceed the border.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        let exponent = i32::try_from(attempt).ok()?;
        let secs = self.start.as_secs_f64() * self.factor.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|delay| *delay <= self.border)
    }

    /// Total number of attempts made before giving up.
    pub fn max_attempts(&self) -> u32 {
        let mut attempt = 0;
        while self.delay_for(attempt).is_some() {
            attempt += 1;
        }
        attempt + 1
    }

    /// Run `operation` until it succeeds, fails permanently or the backoff
    /// budget is spent.
    pub async fn execute<T, E, F, Fut>(&self, name: &str, mut operation: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<PipelineError>,
    {
        let mut attempt: u32 = 0;
        loop {
            let err: PipelineError = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation = %name, attempts = attempt + 1, "Recovered after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e.into(),
            };

            if !err.is_transient() {
                return Err(err);
            }

            match self.delay_for(attempt) {
                Some(delay) => {
                    warn!(
                        operation = %name,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Call failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    error!(
                        operation = %name,
                        attempts = attempt + 1,
                        error = %err,
                        "Giving up after exhausting backoff"
                    );
                    return Err(PipelineError::RetryExhausted {
                        operation: name.to_string(),
                        attempts: attempt + 1,
                        source: Box::new(err),
                    });
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            start: Duration::from_millis(100),
            factor: 2.0,
            border: Duration::from_secs(10),
        }
    }
}
