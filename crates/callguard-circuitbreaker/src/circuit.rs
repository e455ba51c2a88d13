use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls pass through.
    Closed = 0,
    /// Calls are rejected without being attempted.
    Open = 1,
    /// The cooldown elapsed and a single trial call is in flight.
    ///
    /// Only reachable when the half-open probe is enabled.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Stable label, used in metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change made by [`Circuit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: CircuitState,
    pub(crate) to: CircuitState,
}

/// The breaker's state machine, without locking or side effects.
///
/// Every mutating method takes `now` and returns the transition it made, if
/// any, so the caller can emit events after releasing its lock.
#[derive(Debug)]
pub(crate) struct Circuit {
    failure_threshold: u32,
    cooldown: Duration,
    half_open_probe: bool,
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    probe_started: Option<Instant>,
}

impl Circuit {
    pub(crate) fn new(failure_threshold: u32, cooldown: Duration, half_open_probe: bool) -> Self {
        Self {
            failure_threshold,
            cooldown,
            half_open_probe,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            probe_started: None,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub(crate) fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    fn cooled_down(&self, since: Option<Instant>, now: Instant) -> bool {
        since.is_none_or(|since| now.saturating_duration_since(since) > self.cooldown)
    }

    /// Whether a call may be attempted now.
    ///
    /// An open circuit whose cooldown has strictly elapsed either closes again
    /// (resetting the failure count) or, with the half-open probe enabled,
    /// admits exactly one trial call.
    pub(crate) fn can_attempt(&mut self, now: Instant) -> (bool, Option<Transition>) {
        match self.state {
            CircuitState::Closed => (true, None),
            CircuitState::Open => {
                if !self.cooled_down(self.last_failure, now) {
                    return (false, None);
                }
                if self.half_open_probe {
                    self.probe_started = Some(now);
                    (true, self.transition_to(CircuitState::HalfOpen))
                } else {
                    self.consecutive_failures = 0;
                    (true, self.transition_to(CircuitState::Closed))
                }
            }
            CircuitState::HalfOpen => {
                // A probe that never reported back is replaced after another cooldown.
                if self.cooled_down(self.probe_started, now) {
                    self.probe_started = Some(now);
                    (true, None)
                } else {
                    (false, None)
                }
            }
        }
    }

    pub(crate) fn record_success(&mut self) -> Option<Transition> {
        self.consecutive_failures = 0;
        self.probe_started = None;
        self.transition_to(CircuitState::Closed)
    }

    pub(crate) fn record_failure(&mut self, now: Instant) -> Option<Transition> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(now);

        match self.state {
            CircuitState::Closed if self.consecutive_failures >= self.failure_threshold => {
                self.transition_to(CircuitState::Open)
            }
            CircuitState::HalfOpen => {
                self.probe_started = None;
                self.transition_to(CircuitState::Open)
            }
            _ => None,
        }
    }

    pub(crate) fn force_open(&mut self, now: Instant) -> Option<Transition> {
        self.last_failure = Some(now);
        self.probe_started = None;
        self.transition_to(CircuitState::Open)
    }

    pub(crate) fn reset(&mut self) -> Option<Transition> {
        self.consecutive_failures = 0;
        self.last_failure = None;
        self.probe_started = None;
        self.transition_to(CircuitState::Closed)
    }

    fn transition_to(&mut self, to: CircuitState) -> Option<Transition> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        Some(Transition { from, to })
    }
}
