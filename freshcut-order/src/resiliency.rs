use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,   // Normal operation
    Open,     // Carrier considered down, calls fail fast
    HalfOpen, // One probe call allowed through
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: usize,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Circuit breaker around a flaky downstream.
///
/// Trips after `failure_threshold` consecutive failures; after `reset_timeout` a single
/// probe is let through and its outcome decides between closing and re-opening.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: usize,
    reset_timeout: Duration,
    inner: RwLock<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, reset_timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            failure_threshold: threshold.max(1),
            reset_timeout,
            inner: RwLock::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.read().await.state
    }

    /// Whether a call may go out now
    pub async fn check(&self) -> bool {
        if self.inner.read().await.state == CircuitState::Closed {
            return true;
        }

        let mut inner = self.inner.write().await;
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled = inner.opened_at.is_some_and(|at| at.elapsed() >= self.reset_timeout);
                if cooled {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    tracing::info!("Circuit breaker [{}] moving to half-open", self.name);
                }
                cooled
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    false
                } else {
                    inner.probe_in_flight = true;
                    true
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.write().await;
        if inner.state != CircuitState::Closed {
            tracing::info!("Circuit breaker [{}] recovered to closed", self.name);
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.write().await;
        inner.consecutive_failures += 1;
        inner.probe_in_flight = false;

        if inner.state == CircuitState::HalfOpen || inner.consecutive_failures >= self.failure_threshold {
            if inner.state != CircuitState::Open {
                tracing::error!(
                    "Circuit breaker [{}] tripped to open after {} failures",
                    self.name,
                    inner.consecutive_failures
                );
            }
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    /// Release a half-open probe whose call ended in neither success nor an outage
    pub async fn release_probe(&self) {
        let mut inner = self.inner.write().await;
        inner.probe_in_flight = false;
    }
}
