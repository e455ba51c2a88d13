use crate::circuit::CircuitState;
use callguard_core::events::GuardEvent;
use tokio::time::Instant;

/// Events emitted by a circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The breaker changed state.
    StateTransition {
        name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was refused because the circuit is open.
    CallRejected { name: String, timestamp: Instant },
    /// A wrapped call succeeded.
    SuccessRecorded {
        name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A wrapped call failed.
    FailureRecorded {
        name: String,
        timestamp: Instant,
        state: CircuitState,
        consecutive_failures: u32,
    },
}

impl GuardEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "StateTransition",
            CircuitBreakerEvent::CallRejected { .. } => "CallRejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "SuccessRecorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "FailureRecorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { name, .. }
            | CircuitBreakerEvent::CallRejected { name, .. }
            | CircuitBreakerEvent::SuccessRecorded { name, .. }
            | CircuitBreakerEvent::FailureRecorded { name, .. } => name,
        }
    }
}
