//! Circuit breaker wrapping a fallible async thunk (spec.md §4.F).
//!
//! Grounded in the teacher's per-tool-endpoint circuit breaker: the same
//! `Closed → Open → HalfOpen` machine, generalized from a `tool_name`-keyed
//! registry to a generic `execute(thunk) -> T` contract with a sliding
//! window that decays exponentially instead of hard-resetting.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open { opened_at: Instant },
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub name: String,
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub sliding_window: Duration,
}

impl CircuitBreakerConfig {
    /// `5 failures / 30s cooldown / 2min window`.
    pub fn default_preset(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            sliding_window: Duration::from_secs(120),
        }
    }

    /// `3 / 60s / 1min` — trips faster, recovers slower.
    pub fn sensitive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
            sliding_window: Duration::from_secs(60),
        }
    }

    /// `10 / 15s / 5min` — tolerates bursts, recovers fast.
    pub fn tolerant(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: 10,
            recovery_timeout: Duration::from_secs(15),
            sliding_window: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("circuit '{name}' open: {consecutive_failures} failures in window, recovery in {recovery_remaining:?}")]
pub struct CircuitOpenError {
    pub name: String,
    pub consecutive_failures: u32,
    pub recovery_remaining: Duration,
}

/// Either the circuit rejected the call outright, or the wrapped thunk
/// itself failed.
#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    #[error(transparent)]
    Open(#[from] CircuitOpenError),
    #[error(transparent)]
    Inner(E),
}

struct Inner {
    state: CircuitState,
    failures: f64,
    successes: f64,
    window_started_at: Instant,
    half_open_in_flight: bool,
}

/// Wraps a fallible async operation, fast-failing while open.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0.0,
                successes: 0.0,
                window_started_at: Instant::now(),
                half_open_in_flight: false,
            }),
            config,
        }
    }

    pub fn shared(config: CircuitBreakerConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    fn decay_if_expired(&self, inner: &mut Inner) {
        if inner.window_started_at.elapsed() > self.config.sliding_window {
            inner.failures /= 2.0;
            inner.successes /= 2.0;
            inner.window_started_at = Instant::now();
        }
    }

    fn admit(&self) -> Result<bool, CircuitOpenError> {
        let mut inner = self.inner.lock();
        self.decay_if_expired(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(false),
            CircuitState::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_in_flight = true;
                    info!(circuit = %self.config.name, "transitioning to half-open probe");
                    Ok(true)
                } else {
                    Err(CircuitOpenError {
                        name: self.config.name.clone(),
                        consecutive_failures: inner.failures as u32,
                        recovery_remaining: self.config.recovery_timeout - opened_at.elapsed(),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight {
                    Err(CircuitOpenError {
                        name: self.config.name.clone(),
                        consecutive_failures: inner.failures as u32,
                        recovery_remaining: Duration::from_secs(0),
                    })
                } else {
                    inner.half_open_in_flight = true;
                    Ok(true)
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => inner.successes += 1.0,
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.failures = 0.0;
                inner.successes = 1.0;
                inner.half_open_in_flight = false;
                info!(circuit = %self.config.name, "probe succeeded, circuit closed");
            }
            CircuitState::Open { .. } => {
                inner.state = CircuitState::Closed;
                inner.failures = 0.0;
            }
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failures += 1.0;
                if inner.failures as u32 >= self.config.failure_threshold {
                    inner.state = CircuitState::Open { opened_at: Instant::now() };
                    warn!(circuit = %self.config.name, failures = inner.failures, "circuit tripped open");
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open { opened_at: Instant::now() };
                inner.half_open_in_flight = false;
                warn!(circuit = %self.config.name, "probe failed, circuit re-opened");
            }
            CircuitState::Open { .. } => {
                inner.failures += 1.0;
            }
        }
    }

    /// Execute `thunk`, fast-failing with [`CircuitError::Open`] while the
    /// circuit is open.
    pub async fn execute<F, Fut, T, E>(&self, thunk: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit()?;
        match thunk().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(CircuitError::Inner(e))
            }
        }
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        matches!(self.inner.lock().state, CircuitState::Open { .. })
    }
}
