//! Turning call results into [`FailureKind`]s.
//!
//! Both the rate limiter and the circuit breaker need to know whether a call
//! failed, and the adaptive rate limiter also needs to know *how*. A
//! [`FailureClassifier`] answers both questions: `None` means the call
//! succeeded, `Some(kind)` means it failed with `kind`.

use crate::failure::FailureKind;
use std::sync::Arc;

/// Classifies the result of an outbound call.
pub trait FailureClassifier<Res, Err>: Send + Sync {
    /// Returns the kind of failure, or `None` if the call counts as a success.
    fn classify(&self, result: &Result<Res, Err>) -> Option<FailureKind>;
}

/// Treats every `Err` as [`FailureKind::Other`] and every `Ok` as success.
///
/// ```rust
/// use callguard_core::classifier::{DefaultClassifier, FailureClassifier};
/// use callguard_core::FailureKind;
///
/// let classifier = DefaultClassifier;
/// assert_eq!(FailureClassifier::<(), &str>::classify(&classifier, &Ok(())), None);
/// assert_eq!(
///     FailureClassifier::<(), &str>::classify(&classifier, &Err("boom")),
///     Some(FailureKind::Other)
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<Res, Err> FailureClassifier<Res, Err> for DefaultClassifier {
    fn classify(&self, result: &Result<Res, Err>) -> Option<FailureKind> {
        result.as_ref().err().map(|_| FailureKind::Other)
    }
}

/// A classifier backed by a closure.
///
/// ```rust
/// use callguard_core::classifier::{FailureClassifier, FnClassifier};
/// use callguard_core::FailureKind;
///
/// // HTTP-ish status codes: 429 is the remote throttling us.
/// let classifier = FnClassifier::new(|result: &Result<u16, ()>| match result {
///     Ok(429) => Some(FailureKind::RateLimited),
///     Ok(status) if *status >= 500 => Some(FailureKind::Server),
///     Ok(_) => None,
///     Err(()) => Some(FailureKind::Network),
/// });
///
/// assert_eq!(classifier.classify(&Ok(200)), None);
/// assert_eq!(classifier.classify(&Ok(429)), Some(FailureKind::RateLimited));
/// ```
#[derive(Clone)]
pub struct FnClassifier<F> {
    f: Arc<F>,
}

impl<F> FnClassifier<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F, Res, Err> FailureClassifier<Res, Err> for FnClassifier<F>
where
    F: Fn(&Result<Res, Err>) -> Option<FailureKind> + Send + Sync,
{
    fn classify(&self, result: &Result<Res, Err>) -> Option<FailureKind> {
        (self.f)(result)
    }
}

impl<F> std::fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClassifier")
            .field("f", &"<closure>")
            .finish()
    }
}
