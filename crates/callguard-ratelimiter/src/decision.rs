use std::time::Duration;

/// Outcome of a single admission check against a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The call may proceed now.
    Admitted,
    /// The call may not proceed; capacity is expected after `retry_after`.
    Rejected { retry_after: Duration },
}

impl Decision {
    /// Returns `true` if the call was admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted)
    }

    /// Time until admission is expected to succeed; zero when admitted.
    pub fn retry_after(&self) -> Duration {
        match self {
            Decision::Admitted => Duration::ZERO,
            Decision::Rejected { retry_after } => *retry_after,
        }
    }

    pub(crate) fn rejected(retry_after: Duration) -> Self {
        Decision::Rejected { retry_after }
    }
}
