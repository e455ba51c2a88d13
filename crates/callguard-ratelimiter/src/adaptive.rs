//! Feedback-driven tuning of the admission rate.
//!
//! The controller is not an admission primitive itself: it watches call
//! outcomes and moves a target rate that the limiter applies to its token
//! bucket before every admission check.
//!
//! # Algorithm
//!
//! - An explicit rate-limit answer from the remote multiplies the rate by
//!   `backoff_factor` immediately.
//! - Otherwise the rate is reconsidered at most once per [`ADJUSTMENT_INTERVAL`]:
//!   - error ratio below 1% and mean latency below 500ms: multiply by `increase_factor`
//!   - error ratio above 5% or mean latency above 2s: multiply by `backoff_factor`
//!   - anything in between: unchanged
//! - The rate always stays within `[adaptive_min, adaptive_max]`.
//!
//! ```rust
//! use callguard_ratelimiter::AdaptiveController;
//! use callguard_core::FailureKind;
//!
//! let controller = AdaptiveController::new(10.0, 1.0, 100.0, 0.5, 1.1);
//! controller.record_error(FailureKind::RateLimited);
//! assert_eq!(controller.current_rate(), 5.0);
//! ```

use crate::config::RateLimitConfig;
use crate::events::AdjustmentReason;
use crate::lock;
use callguard_core::FailureKind;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Minimum time between two periodic adjustments.
pub const ADJUSTMENT_INTERVAL: Duration = Duration::from_secs(10);

const LATENCY_HISTORY: usize = 100;
const HEALTHY_ERROR_RATIO: f64 = 0.01;
const DEGRADED_ERROR_RATIO: f64 = 0.05;
const HEALTHY_LATENCY: Duration = Duration::from_millis(500);
const DEGRADED_LATENCY: Duration = Duration::from_secs(2);

/// A rate change made by the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateAdjustment {
    /// Rate before the change.
    pub from: f64,
    /// Rate after the change.
    pub to: f64,
    /// What triggered it.
    pub reason: AdjustmentReason,
}

#[derive(Debug)]
struct AdaptiveState {
    current_rate: f64,
    successes: u64,
    errors: u64,
    latencies: VecDeque<Duration>,
    last_adjustment: Instant,
}

impl AdaptiveState {
    fn mean_latency(&self) -> Duration {
        if self.latencies.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.latencies.iter().sum();
        total / self.latencies.len() as u32
    }

    fn start_interval(&mut self, now: Instant) {
        self.successes = 0;
        self.errors = 0;
        self.latencies.clear();
        self.last_adjustment = now;
    }
}

/// Tunes an admission rate from observed latencies and errors.
#[derive(Debug)]
pub struct AdaptiveController {
    baseline: f64,
    min_rate: f64,
    max_rate: f64,
    backoff_factor: f64,
    increase_factor: f64,
    state: Mutex<AdaptiveState>,
}

impl AdaptiveController {
    /// Creates a controller starting at `baseline`.
    ///
    /// `baseline` is clamped into `[min_rate, max_rate]`.
    pub fn new(
        baseline: f64,
        min_rate: f64,
        max_rate: f64,
        backoff_factor: f64,
        increase_factor: f64,
    ) -> Self {
        let baseline = baseline.clamp(min_rate, max_rate);
        Self {
            baseline,
            min_rate,
            max_rate,
            backoff_factor,
            increase_factor,
            state: Mutex::new(AdaptiveState {
                current_rate: baseline,
                successes: 0,
                errors: 0,
                latencies: VecDeque::with_capacity(LATENCY_HISTORY),
                last_adjustment: Instant::now(),
            }),
        }
    }

    /// Creates a controller from a limiter configuration.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.requests_per_second,
            config.adaptive_min,
            config.adaptive_max,
            config.backoff_factor,
            config.increase_factor,
        )
    }

    /// The rate the limiter should currently admit at.
    pub fn current_rate(&self) -> f64 {
        lock(&self.state).current_rate
    }

    /// Records a successful call and its latency.
    pub fn record_success(&self, latency: Duration) -> Option<RateAdjustment> {
        let mut state = lock(&self.state);
        state.successes += 1;
        if state.latencies.len() == LATENCY_HISTORY {
            state.latencies.pop_front();
        }
        state.latencies.push_back(latency);
        self.adjust_locked(&mut state, Instant::now())
    }

    /// Records a failed call.
    ///
    /// [`FailureKind::RateLimited`] backs off right away, independent of the
    /// periodic adjustment; other kinds only count towards the error ratio.
    pub fn record_error(&self, kind: FailureKind) -> Option<RateAdjustment> {
        let mut state = lock(&self.state);
        state.errors += 1;

        if kind.is_rate_limited() {
            let from = state.current_rate;
            state.current_rate = (from * self.backoff_factor).max(self.min_rate);
            return changed(from, state.current_rate, AdjustmentReason::RemoteRateLimit);
        }

        self.adjust_locked(&mut state, Instant::now())
    }

    /// Reconsiders the rate if the adjustment interval has elapsed.
    pub fn maybe_adjust(&self) -> Option<RateAdjustment> {
        let mut state = lock(&self.state);
        self.adjust_locked(&mut state, Instant::now())
    }

    fn adjust_locked(&self, state: &mut AdaptiveState, now: Instant) -> Option<RateAdjustment> {
        if now.saturating_duration_since(state.last_adjustment) < ADJUSTMENT_INTERVAL {
            return None;
        }

        let observed = state.successes + state.errors;
        if observed == 0 {
            // No traffic, no evidence either way.
            state.start_interval(now);
            return None;
        }

        let error_ratio = state.errors as f64 / observed as f64;
        let mean_latency = state.mean_latency();
        let from = state.current_rate;

        let adjustment = if error_ratio < HEALTHY_ERROR_RATIO && mean_latency < HEALTHY_LATENCY {
            state.current_rate = (from * self.increase_factor).min(self.max_rate);
            changed(from, state.current_rate, AdjustmentReason::Healthy)
        } else if error_ratio > DEGRADED_ERROR_RATIO || mean_latency > DEGRADED_LATENCY {
            state.current_rate = (from * self.backoff_factor).max(self.min_rate);
            changed(from, state.current_rate, AdjustmentReason::Degraded)
        } else {
            None
        };

        state.start_interval(now);
        adjustment
    }

    /// Returns to the baseline rate and discards collected samples.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.current_rate = self.baseline;
        state.start_interval(Instant::now());
    }

    /// Rate the controller started at.
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Lower and upper bound of the rate.
    pub fn bounds(&self) -> (f64, f64) {
        (self.min_rate, self.max_rate)
    }
}

fn changed(from: f64, to: f64, reason: AdjustmentReason) -> Option<RateAdjustment> {
    (from != to).then_some(RateAdjustment { from, to, reason })
}
