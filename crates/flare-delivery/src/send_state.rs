//! Failure-gated send state for the delivery pipeline.
//!
//! Stops the client from hammering a collector that is already down. After
//! a run of consecutive failures the gate closes and only lets a single probe
//! through once a cooldown has elapsed; any success reopens it fully.
//!
//! # State Machine
//!
//! ```text
//!   ┌──────────────────────────┐   failure() reaching threshold   ┌───────────────────────────┐
//!   │         HEALTHY          │ ───────────────────────────────▶ │        SUPPRESSED         │
//!   │                          │   or failure with Retry-After    │                           │
//!   │ ● every send is tried    │                                  │ ● sends skipped           │
//!   │ ● counting failures      │ ◀─────────────────────────────── │ ● one probe per cooldown  │
//!   └──────────────────────────┘            success()             └───────────────────────────┘
//! ```
//!
//! The cooldown grows quadratically with the number of failures past the
//! threshold and is capped at 36 seconds. A `Retry-After` from the collector
//! replaces the computed cooldown.
//!
//! While suppressed, [`SendState::try_acquire`] hands the probe to exactly one
//! caller; concurrent callers keep being skipped until that probe records its
//! outcome.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use flare_core::RealClock;
//! use flare_delivery::send_state::SendState;
//!
//! # async fn example() {
//! let state = SendState::new(Arc::new(RealClock::new()));
//!
//! if state.try_acquire().await {
//!     let outcome: Result<(), &str> = Ok(());
//!     match outcome {
//!         Ok(()) => state.success().await,
//!         Err(_) => {
//!             state.failure().await;
//!         },
//!     }
//! }
//! # }
//! ```

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use flare_core::Clock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Consecutive failures after which sending is suppressed.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Cap on the cooldown multiplier; 6² = 36 seconds.
const MAX_COOLDOWN_STEPS: u32 = 6;

/// Health of the send gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendHealth {
    /// Failures below threshold, every send is attempted.
    Healthy,
    /// Failures at or above threshold, sends are skipped until a probe.
    Suppressed,
}

impl std::fmt::Display for SendHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Suppressed => write!(f, "suppressed"),
        }
    }
}

/// Snapshot of the send gate.
#[derive(Debug, Clone)]
pub struct SendStats {
    /// Current health.
    pub health: SendHealth,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// When the last failure was recorded.
    pub last_failure_at: Option<Instant>,
    /// Back-off requested by the collector on the last failure.
    pub retry_after: Option<Duration>,
    /// A probe was handed out and has not recorded an outcome yet.
    pub probe_in_flight: bool,
}

impl SendStats {
    fn new() -> Self {
        Self {
            health: SendHealth::Healthy,
            consecutive_failures: 0,
            last_failure_at: None,
            retry_after: None,
            probe_in_flight: false,
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Thread-safe send gate shared by every send attempt of one client.
#[derive(Debug)]
pub struct SendState {
    threshold: u32,
    clock: Arc<dyn Clock>,
    stats: Mutex<SendStats>,
}

impl SendState {
    /// Creates a gate with the default failure threshold.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_threshold(DEFAULT_FAILURE_THRESHOLD, clock)
    }

    /// Creates a gate with a custom threshold. A threshold of zero is
    /// treated as one.
    pub fn with_threshold(threshold: u32, clock: Arc<dyn Clock>) -> Self {
        Self { threshold: threshold.max(1), clock, stats: Mutex::new(SendStats::new()) }
    }

    /// Failure threshold in effect.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Whether a new send attempt is permitted.
    ///
    /// Reads the state without modifying it. Use [`SendState::try_acquire`]
    /// before actually sending.
    pub async fn should_try(&self) -> bool {
        let stats = self.stats.lock().await;
        self.permits(&stats)
    }

    /// Reserves a send attempt.
    ///
    /// Always succeeds while healthy. While suppressed, only the first caller
    /// after the cooldown gets the probe; the reservation holds until
    /// [`success`](Self::success), a failure or
    /// [`release_probe`](Self::release_probe).
    pub async fn try_acquire(&self) -> bool {
        let mut stats = self.stats.lock().await;

        if !self.permits(&stats) {
            return false;
        }
        if stats.health == SendHealth::Suppressed {
            stats.probe_in_flight = true;
        }
        true
    }

    /// Gives back a probe that ended without reaching the collector.
    pub async fn release_probe(&self) {
        self.stats.lock().await.probe_in_flight = false;
    }

    /// Records a successful delivery and reopens the gate.
    pub async fn success(&self) {
        let mut stats = self.stats.lock().await;

        if stats.health == SendHealth::Suppressed {
            tracing::info!(
                failures = stats.consecutive_failures,
                "collector reachable again, resuming event delivery"
            );
        }
        stats.reset();
    }

    /// Records a failed delivery.
    pub async fn failure(&self) -> SendHealth {
        self.failure_with_retry_after(None).await
    }

    /// Records a failed delivery, honouring a collector back-off when given,
    /// and returns the resulting health.
    ///
    /// A `Retry-After` suppresses immediately regardless of the threshold.
    pub async fn failure_with_retry_after(&self, retry_after: Option<Duration>) -> SendHealth {
        let mut stats = self.stats.lock().await;

        stats.consecutive_failures = stats.consecutive_failures.saturating_add(1);
        stats.last_failure_at = Some(self.clock.now());
        stats.retry_after = retry_after;
        stats.probe_in_flight = false;

        if stats.health == SendHealth::Healthy
            && (retry_after.is_some() || stats.consecutive_failures >= self.threshold)
        {
            tracing::debug!(
                failures = stats.consecutive_failures,
                cooldown_secs = self.cooldown(&stats).as_secs(),
                "suppressing event delivery after repeated failures"
            );
            stats.health = SendHealth::Suppressed;
        }
        stats.health
    }

    /// Returns a snapshot of the current state.
    pub async fn stats(&self) -> SendStats {
        self.stats.lock().await.clone()
    }

    fn permits(&self, stats: &SendStats) -> bool {
        match stats.health {
            SendHealth::Healthy => true,
            SendHealth::Suppressed if stats.probe_in_flight => false,
            SendHealth::Suppressed => match stats.last_failure_at {
                Some(failed_at) => {
                    self.clock.now().saturating_duration_since(failed_at) >= self.cooldown(stats)
                },
                None => true,
            },
        }
    }

    /// Cooldown before the next probe for the given state.
    fn cooldown(&self, stats: &SendStats) -> Duration {
        if let Some(retry_after) = stats.retry_after {
            return retry_after;
        }
        let steps = stats
            .consecutive_failures
            .saturating_sub(self.threshold)
            .saturating_add(1)
            .min(MAX_COOLDOWN_STEPS);
        Duration::from_secs(u64::from(steps * steps))
    }
}
