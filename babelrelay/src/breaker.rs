//! Per-provider circuit breaker.
//!
//! ```text
//! CLOSED ──[open_threshold consecutive failures]──► OPEN
//!                                                    │
//!                                         [now >= next_retry]
//!                                                    ▼
//!                                         HALF-OPEN (one probe)
//!                                                    │
//!                                  ┌─────────────────┴─────────────────┐
//!                             [success]                           [failure]
//!                                  ▼                                   ▼
//!                               CLOSED                  OPEN (longer cooldown)
//! ```
//!
//! An open breaker is only re-examined when somebody asks [`CircuitBreaker::should_attempt`];
//! nothing runs in the background.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive qualifying failures before the breaker opens. `1` opens on the first one.
    pub open_threshold: u32,
    pub base_cooldown: Duration,
    pub max_cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            open_threshold: 3,
            base_cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(300),
        }
    }
}

impl BreakerConfig {
    pub fn open_on_first_failure() -> Self {
        Self {
            open_threshold: 1,
            ..Self::default()
        }
    }

    /// `min(base × 2^(failure_count − open_threshold), max)`.
    pub fn cooldown_for(&self, failure_count: u32) -> Duration {
        let exponent = failure_count.saturating_sub(self.open_threshold);
        1u32.checked_shl(exponent)
            .and_then(|factor| self.base_cooldown.checked_mul(factor))
            .map_or(self.max_cooldown, |cooldown| cooldown.min(self.max_cooldown))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    /// Cooldown elapsed and a probe was granted; the next outcome decides.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub failure_count: u32,
    pub is_open: bool,
    pub last_failure: Option<Instant>,
    pub next_retry: Option<Instant>,
    pub state: CircuitState,
}

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure: Option<Instant>,
    is_open: bool,
    next_retry: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// `true` while closed, or once an open breaker's cooldown has elapsed. In the latter
    /// case the breaker is flipped to not-open so the caller gets its probe.
    pub fn should_attempt(&self) -> bool {
        let mut state = self.state.lock();
        if !state.is_open {
            return true;
        }
        match state.next_retry {
            Some(next_retry) if Instant::now() < next_retry => false,
            _ => {
                state.is_open = false;
                debug!(
                    provider = %self.name,
                    failure_count = state.failure_count,
                    "Cooldown elapsed, granting probe attempt"
                );
                true
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if state.failure_count > 0 {
            info!(
                provider = %self.name,
                previous_failures = state.failure_count,
                "Provider recovered, closing breaker"
            );
        }
        state.failure_count = 0;
        state.is_open = false;
        state.next_retry = None;
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure = Some(now);

        if state.failure_count >= self.config.open_threshold {
            let cooldown = self.config.cooldown_for(state.failure_count);
            state.is_open = true;
            state.next_retry = Some(now + cooldown);
            warn!(
                provider = %self.name,
                failure_count = state.failure_count,
                cooldown_ms = cooldown.as_millis() as u64,
                "Breaker opened"
            );
        } else {
            debug!(
                provider = %self.name,
                failure_count = state.failure_count,
                open_threshold = self.config.open_threshold,
                "Failure recorded, breaker still closed"
            );
        }
    }

    pub fn state(&self) -> CircuitState {
        let state = self.state.lock();
        self.state_of(&state)
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state.lock();
        BreakerSnapshot {
            failure_count: state.failure_count,
            is_open: state.is_open,
            last_failure: state.last_failure,
            next_retry: state.next_retry,
            state: self.state_of(&state),
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.state.lock().failure_count
    }

    fn state_of(&self, state: &BreakerState) -> CircuitState {
        if state.is_open {
            CircuitState::Open
        } else if state.failure_count >= self.config.open_threshold {
            CircuitState::HalfOpen
        } else {
            CircuitState::Closed
        }
    }
}
