//! Consecutive-failure circuit breaker guarding calls to an external dependency.

use serde::Serialize;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CircuitState {
    /// Calls flow through.
    Closed,
    /// Calls are rejected without reaching the dependency.
    Open,
    /// The cool-down elapsed; the next call is a probe.
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a probe.
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_duration: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// Rejected without running the operation.
    Open,
    /// The operation ran and failed; the failure was recorded.
    Failed(E),
}

#[derive(Debug)]
enum State {
    Closed { consecutive_failures: u32 },
    Open { until: Instant },
    HalfOpen { probing: bool },
}

/// Shared breaker for one dependency endpoint. Wrap it in an `Arc` to share it across callers.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(State::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        match *self.lock() {
            State::Closed { .. } => CircuitState::Closed,
            State::Open { until } if Instant::now() >= until => CircuitState::HalfOpen,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Runs `operation` unless the circuit is open. `Ok` counts as a success, `Err` as a failure.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.admit().ok_or(CircuitBreakerError::Open)?;
        let result = operation().await;
        permit.finish(result.is_ok());
        result.map_err(CircuitBreakerError::Failed)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self) -> Option<Permit<'_>> {
        let mut state = self.lock();
        let probe = match *state {
            State::Closed { .. } => false,
            State::Open { until } if Instant::now() >= until => {
                info!(breaker = %self.name, "Circuit breaker half-open, admitting probe");
                *state = State::HalfOpen { probing: true };
                true
            }
            State::Open { .. } => return None,
            State::HalfOpen { probing: true } => return None,
            State::HalfOpen { probing: false } => {
                *state = State::HalfOpen { probing: true };
                true
            }
        };
        Some(Permit {
            breaker: self,
            probe,
            finished: false,
        })
    }

    fn record(&self, probe: bool, success: bool) {
        let mut state = self.lock();
        let next = match *state {
            State::Closed { .. } if probe => return,
            State::Closed { .. } if success => State::Closed {
                consecutive_failures: 0,
            },
            State::Closed {
                consecutive_failures,
            } => {
                let failures = consecutive_failures + 1;
                if failures >= self.config.failure_threshold.max(1) {
                    warn!(breaker = %self.name, failures, "Circuit breaker opened");
                    State::Open {
                        until: Instant::now() + self.config.open_duration,
                    }
                } else {
                    State::Closed {
                        consecutive_failures: failures,
                    }
                }
            }
            // Late result of a call admitted while closed. Only the probe settles half-open.
            State::HalfOpen { .. } if !probe => return,
            State::HalfOpen { .. } if success => {
                info!(breaker = %self.name, "Circuit breaker closed after successful probe");
                State::Closed {
                    consecutive_failures: 0,
                }
            }
            State::HalfOpen { .. } => {
                warn!(breaker = %self.name, "Circuit breaker probe failed, reopening");
                State::Open {
                    until: Instant::now() + self.config.open_duration,
                }
            }
            // A call admitted before the circuit opened finished late.
            State::Open { .. } => return,
        };
        *state = next;
    }

    fn abandon_probe(&self) {
        let mut state = self.lock();
        if let State::HalfOpen { probing: true } = *state {
            *state = State::HalfOpen { probing: false };
        }
    }
}

/// Admission to run one operation. A probe that is dropped unfinished frees the half-open slot.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    finished: bool,
}

impl Permit<'_> {
    fn finish(mut self, success: bool) {
        self.finished = true;
        self.breaker.record(self.probe, success);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.probe && !self.finished {
            self.breaker.abandon_probe();
        }
    }
}
