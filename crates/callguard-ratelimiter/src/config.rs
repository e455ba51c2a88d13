use crate::error::ConfigError;
use crate::events::{AdjustmentReason, RateLimiterEvent};
use callguard_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Admission algorithm used by a [`RateLimiter`](crate::RateLimiter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Strategy {
    /// Continuous refill at `requests_per_second`, bursts up to `burst_size`.
    #[default]
    TokenBucket,
    /// At most `floor(rps × window)` admissions in any trailing window.
    SlidingWindow,
    /// At most `floor(rps × window)` admissions per window, reset at each boundary.
    FixedWindow,
    /// Token bucket whose rate is tuned by latency and error feedback.
    Adaptive,
}

impl Strategy {
    /// Stable lowercase label, used in metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::TokenBucket => "token_bucket",
            Strategy::SlidingWindow => "sliding_window",
            Strategy::FixedWindow => "fixed_window",
            Strategy::Adaptive => "adaptive",
        }
    }
}

const DEFAULT_ADAPTIVE_MIN: f64 = 1.0;
const DEFAULT_ADAPTIVE_MAX: f64 = 100.0;

/// Immutable configuration of one rate limiter.
///
/// Built with [`RateLimitConfig::builder`]; the builder validates every invariant,
/// so a `RateLimitConfig` in hand is always consistent.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub(crate) requests_per_second: f64,
    pub(crate) burst_size: usize,
    pub(crate) window_size: Duration,
    pub(crate) strategy: Strategy,
    pub(crate) adaptive_min: f64,
    pub(crate) adaptive_max: f64,
    pub(crate) backoff_factor: f64,
    pub(crate) increase_factor: f64,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
    pub(crate) name: String,
}

impl RateLimitConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }

    /// Baseline admission rate.
    pub fn requests_per_second(&self) -> f64 {
        self.requests_per_second
    }

    /// Token bucket capacity and number of concurrency slots.
    pub fn burst_size(&self) -> usize {
        self.burst_size
    }

    /// Length of the sliding or fixed window.
    pub fn window_size(&self) -> Duration {
        self.window_size
    }

    /// Selected admission algorithm.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Lower and upper bound of the adaptive rate.
    pub fn adaptive_bounds(&self) -> (f64, f64) {
        (self.adaptive_min, self.adaptive_max)
    }

    /// Multiplier applied when backing off.
    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    /// Multiplier applied when the upstream looks healthy.
    pub fn increase_factor(&self) -> f64 {
        self.increase_factor
    }

    /// Name used in events, logs and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Admissions allowed per window by the window strategies.
    pub fn window_limit(&self) -> usize {
        ((self.requests_per_second * self.window_size.as_secs_f64()).floor() as usize).max(1)
    }

    /// Copy of this configuration under a different name, listeners included.
    pub(crate) fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }
}

/// Builder for [`RateLimitConfig`].
pub struct RateLimitConfigBuilder {
    requests_per_second: f64,
    burst_size: usize,
    window_size: Duration,
    strategy: Strategy,
    adaptive_min: Option<f64>,
    adaptive_max: Option<f64>,
    backoff_factor: f64,
    increase_factor: f64,
    event_listeners: EventListeners<RateLimiterEvent>,
    name: String,
}

impl Default for RateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - requests_per_second: 10
    /// - burst_size: 20
    /// - window_size: 60 seconds
    /// - strategy: [`Strategy::TokenBucket`]
    /// - adaptive bounds: 1 to 100, widened to include `requests_per_second`
    /// - backoff_factor: 0.5
    /// - increase_factor: 1.1
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            requests_per_second: 10.0,
            burst_size: 20,
            window_size: Duration::from_secs(60),
            strategy: Strategy::TokenBucket,
            adaptive_min: None,
            adaptive_max: None,
            backoff_factor: 0.5,
            increase_factor: 1.1,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the steady-state admission rate.
    pub fn requests_per_second(mut self, rate: f64) -> Self {
        self.requests_per_second = rate;
        self
    }

    /// Sets the bucket capacity, which is also the number of concurrency slots.
    pub fn burst_size(mut self, size: usize) -> Self {
        self.burst_size = size;
        self
    }

    /// Sets the window length used by the window strategies.
    ///
    /// Sub-second precision is accepted but the window must be at least one second.
    pub fn window_size(mut self, window: Duration) -> Self {
        self.window_size = window;
        self
    }

    /// Selects the admission algorithm.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the range the adaptive controller may move the rate within.
    pub fn adaptive_bounds(mut self, min: f64, max: f64) -> Self {
        self.adaptive_min = Some(min);
        self.adaptive_max = Some(max);
        self
    }

    /// Sets the multiplier applied on backoff. Must be in `(0, 1)`.
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Sets the multiplier applied when the upstream is healthy. Must be `> 1`.
    pub fn increase_factor(mut self, factor: f64) -> Self {
        self.increase_factor = factor;
        self
    }

    /// Sets the name for this limiter (used in events, logs and metrics).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when a permit is granted.
    ///
    /// The callback receives how long the caller waited; zero when the permit
    /// was available immediately.
    ///
    /// ```rust
    /// use callguard_ratelimiter::RateLimitConfig;
    ///
    /// let config = RateLimitConfig::builder()
    ///     .on_permit_acquired(|waited| {
    ///         if !waited.is_zero() {
    ///             println!("waited {waited:?} for a permit");
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn on_permit_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitAcquired { wait_duration, .. } = event {
                f(*wait_duration);
            }
        }));
        self
    }

    /// Registers a callback invoked when admission is refused.
    ///
    /// The callback receives the suggested retry delay, if one is known.
    pub fn on_permit_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<Duration>) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitRejected { retry_after, .. } = event {
                f(*retry_after);
            }
        }));
        self
    }

    /// Registers a callback invoked when the adaptive controller changes the rate.
    ///
    /// # Callback Signature
    /// `Fn(f64, f64, AdjustmentReason)`: previous rate, new rate, and why.
    pub fn on_rate_adjusted<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, f64, AdjustmentReason) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::RateAdjusted {
                from, to, reason, ..
            } = event
            {
                f(*from, *to, *reason);
            }
        }));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<RateLimitConfig, ConfigError> {
        let rate = self.requests_per_second;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(ConfigError::NonPositiveRate(rate));
        }
        if self.burst_size == 0 {
            return Err(ConfigError::ZeroBurst);
        }
        if self.window_size < Duration::from_secs(1) {
            return Err(ConfigError::WindowTooShort(self.window_size));
        }

        let min = self
            .adaptive_min
            .unwrap_or_else(|| DEFAULT_ADAPTIVE_MIN.min(rate));
        let max = self
            .adaptive_max
            .unwrap_or_else(|| DEFAULT_ADAPTIVE_MAX.max(rate));
        if !(min > 0.0 && min <= rate && rate <= max && max.is_finite()) {
            return Err(ConfigError::AdaptiveBounds { min, rate, max });
        }

        if !(self.backoff_factor > 0.0 && self.backoff_factor < 1.0) {
            return Err(ConfigError::BackoffFactor(self.backoff_factor));
        }
        if !(self.increase_factor > 1.0 && self.increase_factor.is_finite()) {
            return Err(ConfigError::IncreaseFactor(self.increase_factor));
        }

        Ok(RateLimitConfig {
            requests_per_second: rate,
            burst_size: self.burst_size,
            window_size: self.window_size,
            strategy: self.strategy,
            adaptive_min: min,
            adaptive_max: max,
            backoff_factor: self.backoff_factor,
            increase_factor: self.increase_factor,
            event_listeners: self.event_listeners,
            name: self.name,
        })
    }
}

/// Plain-data form of [`RateLimitConfig`], as handed over by a configuration loader.
///
/// Every field is optional in the serialized form and falls back to the builder
/// default. Convert with [`RateLimitSettings::into_config`] or `TryFrom`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RateLimitSettings {
    /// See [`RateLimitConfigBuilder::requests_per_second`].
    pub requests_per_second: f64,
    /// See [`RateLimitConfigBuilder::burst_size`].
    pub burst_size: usize,
    /// Window length in whole seconds.
    pub window_size_seconds: u64,
    /// See [`RateLimitConfigBuilder::strategy`].
    pub strategy: Strategy,
    /// Lower adaptive bound; derived from the rate when absent.
    pub adaptive_min: Option<f64>,
    /// Upper adaptive bound; derived from the rate when absent.
    pub adaptive_max: Option<f64>,
    /// See [`RateLimitConfigBuilder::backoff_factor`].
    pub backoff_factor: f64,
    /// See [`RateLimitConfigBuilder::increase_factor`].
    pub increase_factor: f64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_second: 10.0,
            burst_size: 20,
            window_size_seconds: 60,
            strategy: Strategy::TokenBucket,
            adaptive_min: None,
            adaptive_max: None,
            backoff_factor: 0.5,
            increase_factor: 1.1,
        }
    }
}

impl RateLimitSettings {
    /// Builds a named configuration from these settings.
    pub fn into_config<S: Into<String>>(self, name: S) -> Result<RateLimitConfig, ConfigError> {
        let mut builder = RateLimitConfig::builder()
            .name(name)
            .requests_per_second(self.requests_per_second)
            .burst_size(self.burst_size)
            .window_size(Duration::from_secs(self.window_size_seconds))
            .strategy(self.strategy)
            .backoff_factor(self.backoff_factor)
            .increase_factor(self.increase_factor);
        builder.adaptive_min = self.adaptive_min;
        builder.adaptive_max = self.adaptive_max;
        builder.build()
    }
}

impl TryFrom<RateLimitSettings> for RateLimitConfig {
    type Error = ConfigError;

    fn try_from(settings: RateLimitSettings) -> Result<Self, Self::Error> {
        settings.into_config("<unnamed>")
    }
}
