//! Circuit breaker with bounded retry and exponential backoff
//!
//! ```text
//!   CLOSED ──threshold reached──▶ OPEN ──recovery timeout──▶ HALF_OPEN
//!     ▲                            ▲                             │
//!     └─────success_threshold──────┼─────────────────────────────┤
//!                                  └───────any failure───────────┘
//! ```
//!
//! All counters live behind one mutex per breaker and are mutated only while
//! it is held. The lock is never held across an `.await`.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::core::{RagError, Result};

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls flow through
    Closed,
    /// Calls are rejected without invoking the dependency
    Open,
    /// Probing whether the dependency recovered
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        })
    }
}

/// Breaker parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Failures that trip the breaker; also the retry budget of one call
    pub failure_threshold: u32,
    /// Time spent OPEN before a probe is allowed, in milliseconds
    pub recovery_timeout_ms: u64,
    /// Consecutive HALF_OPEN successes needed to close again
    pub success_threshold: u32,
    /// Multiplier applied to the retry delay after each failed attempt
    pub backoff_factor: f64,
    /// Delay before the first retry, in milliseconds
    pub initial_backoff_ms: u64,
    /// Upper bound for any retry delay, in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
            success_threshold: 2,
            backoff_factor: 2.0,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

impl BreakerConfig {
    /// Recovery timeout as a `Duration`
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }

    /// First retry delay as a `Duration`
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms).min(self.max_backoff())
    }

    /// Retry delay ceiling as a `Duration`
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Delay following `delay`, scaled by `backoff_factor` and capped at
    /// `max_backoff`
    pub fn next_backoff(&self, delay: Duration) -> Duration {
        let max = self.max_backoff();
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.backoff_factor)
            .map_or(max, |next| next.min(max))
    }
}

/// Point-in-time view of a breaker's counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    /// Breaker name
    pub name: String,
    /// Current state
    pub state: CircuitState,
    /// Failures counted in the current state
    pub failure_count: u32,
    /// HALF_OPEN successes counted so far
    pub success_count: u32,
    /// When the last counted failure happened
    pub last_failure: Option<Instant>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

impl BreakerState {
    fn transition(&mut self, next: CircuitState) {
        self.state = next;
        self.failure_count = 0;
        self.success_count = 0;
    }
}

/// Failure-isolation guard for one call site
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// New breaker in state CLOSED
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Breaker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Breaker parameters
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Current counters
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure: inner.last_failure,
        }
    }

    /// Force the breaker back to CLOSED
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.transition(CircuitState::Closed);
        inner.last_failure = None;
        tracing::info!(breaker = %self.name, "circuit breaker reset manually");
    }

    /// Run `operation` under the breaker.
    ///
    /// Every dependency failure is counted, and transient ones are retried
    /// with exponential backoff until the breaker trips. A permanent failure
    /// is counted and then returned as is. Local contract errors leave the
    /// counters untouched. Once OPEN, calls fail with
    /// [`RagError::CircuitOpen`] without invoking `operation` until the
    /// recovery timeout has elapsed.
    pub async fn call<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.admit()?;

        let attempts = self.config.failure_threshold.max(1);
        let mut delay = self.config.initial_backoff();
        let mut last_error = None;

        for attempt in 1..=attempts {
            match operation().await {
                Ok(value) => {
                    self.on_success();
                    return Ok(value);
                },
                Err(e) if !e.is_dependency_failure() => return Err(e),
                Err(e) => {
                    if self.on_failure() == CircuitState::Open {
                        return Err(self.open_error("failure threshold reached", Some(e)));
                    }
                    if !e.is_transient() {
                        return Err(e);
                    }
                    tracing::warn!(
                        breaker = %self.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                        delay = self.config.next_backoff(delay);
                    }
                },
            }
        }

        // concurrent successes kept resetting the count; give up on this call
        self.trip();
        Err(self.open_error("retry budget exhausted", last_error))
    }

    fn admit(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let recovered = inner
            .last_failure
            .map_or(true, |at| at.elapsed() >= self.config.recovery_timeout());
        if recovered {
            inner.transition(CircuitState::HalfOpen);
            tracing::info!(breaker = %self.name, state = %CircuitState::HalfOpen, "probing dependency");
            return Ok(());
        }

        drop(inner);
        tracing::debug!(breaker = %self.name, "call rejected, circuit open");
        Err(self.open_error("rejected while open", None))
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.transition(CircuitState::Closed);
                    tracing::info!(breaker = %self.name, state = %CircuitState::Closed, "dependency recovered");
                }
            },
            _ => inner.failure_count = 0,
        }
    }

    fn on_failure(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        let trip = inner.state == CircuitState::HalfOpen
            || inner.failure_count >= self.config.failure_threshold;
        if trip {
            inner.transition(CircuitState::Open);
            tracing::warn!(breaker = %self.name, state = %CircuitState::Open, "circuit breaker tripped");
        }
        inner.state
    }

    fn trip(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            inner.transition(CircuitState::Open);
            inner.last_failure = Some(Instant::now());
            tracing::warn!(breaker = %self.name, state = %CircuitState::Open, "circuit breaker tripped");
        }
    }

    fn open_error(&self, reason: &str, source: Option<RagError>) -> RagError {
        RagError::CircuitOpen {
            breaker: self.name.clone(),
            reason: reason.to_string(),
            source: source.map(Box::new),
        }
    }
}
