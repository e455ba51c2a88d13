use crate::circuit::CircuitState;
use crate::error::ConfigError;
use crate::events::CircuitBreakerEvent;
use callguard_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for one circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub(crate) name: String,
    pub(crate) failure_threshold: u32,
    pub(crate) cooldown: Duration,
    pub(crate) half_open_probe: bool,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Breaker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consecutive failures that open the circuit.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// How long the circuit stays open after the last failure.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether an expired cooldown admits a single trial call instead of closing.
    pub fn half_open_probe(&self) -> bool {
        self.half_open_probe
    }
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder {
    name: String,
    failure_threshold: u32,
    cooldown: Duration,
    half_open_probe: bool,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - failure_threshold: 5
    /// - cooldown: 60 seconds
    /// - half_open_probe: off
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
            half_open_probe: false,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the breaker name (used in events, logs, metrics and errors).
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Sets how many consecutive failures open the circuit.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets how long the circuit stays open after the last recorded failure.
    ///
    /// The circuit becomes attemptable once strictly more than `cooldown` has
    /// passed.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Admits exactly one trial call once the cooldown expires.
    ///
    /// Off by default: an expired cooldown closes the circuit outright and
    /// lets every caller through. With the probe on, the circuit moves to
    /// [`CircuitState::HalfOpen`] and the trial call's outcome decides between
    /// closing and reopening.
    pub fn half_open_probe(mut self, enabled: bool) -> Self {
        self.half_open_probe = enabled;
        self
    }

    /// Registers a callback when the circuit breaker transitions between states.
    ///
    /// # Callback Signature
    /// `Fn(CircuitState, CircuitState)`: the previous state and the new state.
    ///
    /// # Example
    ///
    /// ```rust
    /// use callguard_circuitbreaker::{CircuitBreakerConfig, CircuitState};
    ///
    /// let config = CircuitBreakerConfig::builder()
    ///     .on_state_transition(|from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("circuit opened (was {from})");
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback when a call is refused because the circuit is open.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallRejected { .. } = event {
                    f();
                }
            }));
        self
    }

    /// Registers a callback when a failure is recorded.
    ///
    /// # Callback Signature
    /// `Fn(u32)`: consecutive failures including this one.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::FailureRecorded {
                    consecutive_failures,
                    ..
                } = event
                {
                    f(*consecutive_failures);
                }
            }));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<CircuitBreakerConfig, ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        Ok(CircuitBreakerConfig {
            name: self.name,
            failure_threshold: self.failure_threshold,
            cooldown: self.cooldown,
            half_open_probe: self.half_open_probe,
            event_listeners: self.event_listeners,
        })
    }
}

/// Plain-data form of [`CircuitBreakerConfig`], as handed over by a configuration loader.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BreakerSettings {
    /// See [`CircuitBreakerConfigBuilder::failure_threshold`].
    pub failure_threshold: u32,
    /// Cooldown in whole seconds.
    pub cooldown_seconds: u64,
    /// See [`CircuitBreakerConfigBuilder::half_open_probe`].
    pub half_open_probe: bool,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_seconds: 60,
            half_open_probe: false,
        }
    }
}

impl BreakerSettings {
    /// Builds a named configuration from these settings.
    pub fn into_config<N: Into<String>>(self, name: N) -> Result<CircuitBreakerConfig, ConfigError> {
        CircuitBreakerConfig::builder()
            .name(name)
            .failure_threshold(self.failure_threshold)
            .cooldown(Duration::from_secs(self.cooldown_seconds))
            .half_open_probe(self.half_open_probe)
            .build()
    }
}
