//! Classification of failed outbound calls.

use std::fmt;

/// Why an outbound call failed.
///
/// Callers map their transport or protocol errors onto this closed set so the
/// adaptive rate controller can react without inspecting error strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FailureKind {
    /// The remote service rejected the call for exceeding its rate limit
    /// (for example an HTTP 429). Triggers an immediate rate backoff.
    RateLimited,
    /// The call did not complete in time.
    Timeout,
    /// The remote service failed (5xx-style).
    Server,
    /// The request was refused as malformed or unauthorized (4xx-style).
    Client,
    /// Connection-level failure: DNS, refused connection, reset.
    Network,
    /// Anything else.
    Other,
}

impl FailureKind {
    /// Returns `true` if the remote explicitly asked us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FailureKind::RateLimited)
    }

    /// Stable lowercase label, used in metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Timeout => "timeout",
            FailureKind::Server => "server",
            FailureKind::Client => "client",
            FailureKind::Network => "network",
            FailureKind::Other => "other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
