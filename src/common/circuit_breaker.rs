//! Circuit breaker guarding a single price vendor
//!
//! After `failure_threshold` consecutive failed fetches the vendor is skipped
//! for `cooldown`, then probed again. A failed probe re-opens the breaker;
//! `success_threshold` successful probes close it.

use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitState {
    /// Requests pass through
    #[default]
    Closed,
    /// Vendor is failing; requests are rejected until the cooldown elapses
    Open,
    /// Cooldown elapsed; probing
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 1,
            cooldown: Duration::from_secs(120),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: CircuitState,
    consecutive_failures: u32,
    probe_successes: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            probe_successes: 0,
            opened_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether a request may go out now; moves Open to HalfOpen once the
    /// cooldown has elapsed
    pub fn can_attempt(&mut self) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled = self
                    .opened_at
                    .is_none_or(|at| at.elapsed() >= self.config.cooldown);
                if cooled {
                    info!(source = %self.name, "Circuit half-open, probing source");
                    self.state = CircuitState::HalfOpen;
                    self.probe_successes = 0;
                }
                cooled
            }
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        if self.state == CircuitState::HalfOpen {
            self.probe_successes += 1;
            if self.probe_successes >= self.config.success_threshold {
                info!(source = %self.name, "Circuit closed, source recovered");
                self.state = CircuitState::Closed;
                self.probe_successes = 0;
                self.opened_at = None;
            }
        }
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        let trip = match self.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => self.consecutive_failures >= self.config.failure_threshold,
            CircuitState::Open => false,
        };
        if trip {
            warn!(
                source = %self.name,
                failures = self.consecutive_failures,
                cooldown_secs = self.config.cooldown.as_secs(),
                "Circuit opened"
            );
            self.state = CircuitState::Open;
            self.opened_at = Some(Instant::now());
            self.probe_successes = 0;
        }
    }

    pub fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.probe_successes = 0;
        self.opened_at = None;
    }
}
