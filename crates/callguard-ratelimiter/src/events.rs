use callguard_core::events::GuardEvent;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Why the adaptive controller moved the rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentReason {
    /// The remote answered with an explicit rate-limit error.
    RemoteRateLimit,
    /// Low error ratio and fast responses over the last interval.
    Healthy,
    /// High error ratio or slow responses over the last interval.
    Degraded,
}

impl fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdjustmentReason::RemoteRateLimit => "remote_rate_limit",
            AdjustmentReason::Healthy => "healthy",
            AdjustmentReason::Degraded => "degraded",
        })
    }
}

/// Events emitted by a rate limiter.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A permit was granted.
    PermitAcquired {
        name: String,
        timestamp: Instant,
        wait_duration: Duration,
    },
    /// Admission was refused.
    PermitRejected {
        name: String,
        timestamp: Instant,
        retry_after: Option<Duration>,
    },
    /// The adaptive controller changed the admission rate.
    RateAdjusted {
        name: String,
        timestamp: Instant,
        from: f64,
        to: f64,
        reason: AdjustmentReason,
    },
    /// The limiter was manually reset to its configured baseline.
    Reset { name: String, timestamp: Instant },
}

impl GuardEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::PermitAcquired { .. } => "PermitAcquired",
            RateLimiterEvent::PermitRejected { .. } => "PermitRejected",
            RateLimiterEvent::RateAdjusted { .. } => "RateAdjusted",
            RateLimiterEvent::Reset { .. } => "Reset",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::PermitAcquired { timestamp, .. }
            | RateLimiterEvent::PermitRejected { timestamp, .. }
            | RateLimiterEvent::RateAdjusted { timestamp, .. }
            | RateLimiterEvent::Reset { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            RateLimiterEvent::PermitAcquired { name, .. }
            | RateLimiterEvent::PermitRejected { name, .. }
            | RateLimiterEvent::RateAdjusted { name, .. }
            | RateLimiterEvent::Reset { name, .. } => name,
        }
    }
}
