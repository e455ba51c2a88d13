use crate::adaptive::{AdaptiveController, RateAdjustment};
use crate::bucket::TokenBucket;
use crate::config::{RateLimitConfig, Strategy};
use crate::decision::Decision;
use crate::error::RateLimitExceeded;
use crate::events::RateLimiterEvent;
use crate::window::{FixedWindowCounter, SlidingWindowCounter};
use callguard_core::FailureKind;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[derive(Debug)]
enum Admission {
    TokenBucket(TokenBucket),
    SlidingWindow(SlidingWindowCounter),
    FixedWindow(FixedWindowCounter),
    Adaptive {
        bucket: TokenBucket,
        controller: AdaptiveController,
    },
}

impl Admission {
    fn for_config(config: &RateLimitConfig) -> Self {
        let rate = config.requests_per_second;
        match config.strategy {
            Strategy::TokenBucket => Admission::TokenBucket(TokenBucket::new(config.burst_size, rate)),
            Strategy::SlidingWindow => Admission::SlidingWindow(SlidingWindowCounter::new(
                config.window_limit(),
                config.window_size,
            )),
            Strategy::FixedWindow => Admission::FixedWindow(FixedWindowCounter::new(
                config.window_limit(),
                config.window_size,
            )),
            Strategy::Adaptive => Admission::Adaptive {
                bucket: TokenBucket::new(config.burst_size, rate),
                controller: AdaptiveController::from_config(config),
            },
        }
    }

    fn check(&self) -> Decision {
        match self {
            Admission::TokenBucket(bucket) => bucket.try_consume(1),
            Admission::SlidingWindow(window) => window.try_admit(),
            Admission::FixedWindow(window) => window.try_admit(),
            Admission::Adaptive { bucket, controller } => {
                // The controller only tunes the bucket; admission is the bucket's call.
                bucket.set_rate(controller.current_rate());
                bucket.try_consume(1)
            }
        }
    }

    fn available(&self) -> f64 {
        match self {
            Admission::TokenBucket(bucket) | Admission::Adaptive { bucket, .. } => {
                bucket.available_tokens()
            }
            Admission::SlidingWindow(window) => {
                window.max_requests().saturating_sub(window.current_count()) as f64
            }
            Admission::FixedWindow(window) => {
                window.limit().saturating_sub(window.current_count()) as f64
            }
        }
    }
}

#[derive(Debug)]
struct Shared {
    config: RateLimitConfig,
    admission: Admission,
    slots: Semaphore,
    in_flight: AtomicUsize,
    total_requests: AtomicU64,
    rejected_requests: AtomicU64,
}

impl Shared {
    fn reserve_slot(self: &Arc<Self>) -> Option<RateLimiterPermit> {
        let permit = self.slots.try_acquire().ok()?;
        permit.forget();
        Some(self.slot_reserved())
    }

    async fn reserve_slot_within(self: &Arc<Self>, timeout: Duration) -> Option<RateLimiterPermit> {
        let permit = tokio::time::timeout(timeout, self.slots.acquire())
            .await
            .ok()?
            .ok()?;
        permit.forget();
        Some(self.slot_reserved())
    }

    fn slot_reserved(self: &Arc<Self>) -> RateLimiterPermit {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        RateLimiterPermit {
            shared: Some(Arc::clone(self)),
        }
    }

    /// Returns one slot; refuses when nothing is outstanding.
    fn release_slot(&self) -> bool {
        let released = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if released {
            self.slots.add_permits(1);
        }
        released
    }

    fn finish(
        &self,
        decision: Decision,
        permit: RateLimiterPermit,
        start: Instant,
    ) -> Result<RateLimiterPermit, RateLimitExceeded> {
        match decision {
            Decision::Admitted => {
                self.permitted(start.elapsed());
                Ok(permit)
            }
            Decision::Rejected { retry_after } => {
                drop(permit);
                Err(self.reject(Some(retry_after)))
            }
        }
    }

    fn permitted(&self, wait_duration: Duration) {
        self.config
            .event_listeners
            .emit(&RateLimiterEvent::PermitAcquired {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                wait_duration,
            });

        #[cfg(feature = "tracing")]
        tracing::trace!(ratelimiter = %self.config.name, ?wait_duration, "permit acquired");

        #[cfg(feature = "metrics")]
        {
            counter!("ratelimiter_calls_total", "ratelimiter" => self.config.name.clone(), "result" => "permitted")
                .increment(1);
            histogram!("ratelimiter_wait_duration_seconds", "ratelimiter" => self.config.name.clone())
                .record(wait_duration.as_secs_f64());
        }
    }

    fn reject(&self, retry_after: Option<Duration>) -> RateLimitExceeded {
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);

        self.config
            .event_listeners
            .emit(&RateLimiterEvent::PermitRejected {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                retry_after,
            });

        #[cfg(feature = "tracing")]
        tracing::debug!(ratelimiter = %self.config.name, ?retry_after, "permit rejected");

        #[cfg(feature = "metrics")]
        counter!("ratelimiter_calls_total", "ratelimiter" => self.config.name.clone(), "result" => "rejected")
            .increment(1);

        RateLimitExceeded {
            name: self.config.name.clone(),
            retry_after,
        }
    }

    fn adjusted(&self, adjustment: RateAdjustment) {
        if let Admission::Adaptive { bucket, .. } = &self.admission {
            bucket.set_rate(adjustment.to);
        }

        self.config
            .event_listeners
            .emit(&RateLimiterEvent::RateAdjusted {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                from: adjustment.from,
                to: adjustment.to,
                reason: adjustment.reason,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(
            ratelimiter = %self.config.name,
            from = adjustment.from,
            to = adjustment.to,
            reason = %adjustment.reason,
            "adaptive rate adjusted"
        );

        #[cfg(feature = "metrics")]
        gauge!("ratelimiter_rate", "ratelimiter" => self.config.name.clone()).set(adjustment.to);
    }
}

/// A reserved concurrency slot of a [`RateLimiter`].
///
/// The slot is returned to the limiter when the permit is dropped.
#[must_use = "dropping the permit immediately releases its slot"]
#[derive(Debug)]
pub struct RateLimiterPermit {
    shared: Option<Arc<Shared>>,
}

impl RateLimiterPermit {
    /// Keeps the slot reserved until [`RateLimiter::release`] is called.
    fn detach(mut self) {
        self.shared = None;
    }
}

impl Drop for RateLimiterPermit {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.release_slot();
        }
    }
}

/// Point-in-time view of a limiter, for observability.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RateLimiterStatus {
    /// Limiter name.
    pub name: String,
    /// Active admission algorithm.
    pub strategy: Strategy,
    /// Rate currently admitted at; moves only under [`Strategy::Adaptive`].
    pub current_rate: f64,
    /// Admissions available right now (tokens, or free window places).
    pub available_tokens: f64,
    /// `true` when the next call would be rejected or made to wait.
    pub is_throttled: bool,
    /// Admission attempts since construction.
    pub total_requests: u64,
    /// Rejected admission attempts since construction.
    pub rejected_requests: u64,
    /// Concurrency slots currently reserved.
    pub in_flight: usize,
}

/// Admission control for calls to one external dependency.
///
/// A `RateLimiter` combines one admission algorithm (see [`Strategy`]) with a set
/// of `burst_size` concurrency slots. Every admission attempt reserves a slot
/// first; the slot stays reserved until the returned [`RateLimiterPermit`] is
/// dropped, or, for the boolean [`acquire`](Self::acquire), until
/// [`release`](Self::release) is called.
///
/// Cloning is cheap and clones share all state.
///
/// # Examples
///
/// ```rust
/// use callguard_ratelimiter::{RateLimitConfig, RateLimiter};
///
/// let limiter = RateLimiter::new(
///     RateLimitConfig::builder()
///         .name("github")
///         .requests_per_second(5.0)
///         .burst_size(5)
///         .build()
///         .unwrap(),
/// );
///
/// let permit = limiter.try_acquire(None).expect("bucket starts full");
/// // ... issue the request ...
/// drop(permit);
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Shared>,
}

impl RateLimiter {
    /// Creates a limiter with a full bucket (or empty window) and all slots free.
    pub fn new(config: RateLimitConfig) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "ratelimiter_calls_total",
                    "Total number of admission attempts by result (permitted or rejected)"
                );
                describe_histogram!(
                    "ratelimiter_wait_duration_seconds",
                    "Time spent waiting for a permit"
                );
                describe_gauge!(
                    "ratelimiter_rate",
                    "Current admission rate of an adaptive rate limiter"
                );
            });
            gauge!("ratelimiter_rate", "ratelimiter" => config.name.clone())
                .set(config.requests_per_second);
        }

        Self {
            inner: Arc::new(Shared {
                admission: Admission::for_config(&config),
                slots: Semaphore::new(config.burst_size),
                in_flight: AtomicUsize::new(0),
                total_requests: AtomicU64::new(0),
                rejected_requests: AtomicU64::new(0),
                config,
            }),
        }
    }

    /// Name used in events, logs and errors.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// The configuration this limiter was built from.
    pub fn config(&self) -> &RateLimitConfig {
        &self.inner.config
    }

    /// Asks for admission, blocking the current thread for at most one wait.
    ///
    /// Returns `true` when admitted. The reserved slot must then be handed back
    /// with [`release`](Self::release). Prefer [`try_acquire`](Self::try_acquire),
    /// whose permit releases itself.
    ///
    /// Do not call this from inside an async task; use
    /// [`acquire_async`](Self::acquire_async) there.
    pub fn acquire(&self, timeout: Option<Duration>) -> bool {
        self.try_acquire(timeout).map(RateLimiterPermit::detach).is_ok()
    }

    /// Asks for admission, blocking the current thread for at most one wait.
    ///
    /// If the call is not admitted right away and `timeout` covers the reported
    /// wait, the thread sleeps for that wait and tries exactly once more. When
    /// every concurrency slot is taken the call is rejected immediately with no
    /// `retry_after`.
    pub fn try_acquire(
        &self,
        timeout: Option<Duration>,
    ) -> Result<RateLimiterPermit, RateLimitExceeded> {
        let shared = &self.inner;
        shared.total_requests.fetch_add(1, Ordering::Relaxed);

        let start = Instant::now();
        let Some(permit) = shared.reserve_slot() else {
            return Err(shared.reject(None));
        };

        let mut decision = shared.admission.check();
        if let Decision::Rejected { retry_after } = decision {
            if timeout.is_some_and(|timeout| timeout >= retry_after) {
                std::thread::sleep(retry_after);
                decision = shared.admission.check();
            }
        }
        shared.finish(decision, permit, start)
    }

    /// Async form of [`acquire`](Self::acquire); suspends the task instead of the thread.
    pub async fn acquire_async(&self, timeout: Option<Duration>) -> bool {
        self.try_acquire_async(timeout)
            .await
            .map(RateLimiterPermit::detach)
            .is_ok()
    }

    /// Async form of [`try_acquire`](Self::try_acquire).
    ///
    /// With a timeout, the task may also wait for a concurrency slot to free up;
    /// the slot wait and the token wait together stay within `timeout`.
    pub async fn try_acquire_async(
        &self,
        timeout: Option<Duration>,
    ) -> Result<RateLimiterPermit, RateLimitExceeded> {
        let shared = &self.inner;
        shared.total_requests.fetch_add(1, Ordering::Relaxed);

        let start = Instant::now();
        let reserved = match timeout {
            Some(timeout) => shared.reserve_slot_within(timeout).await,
            None => shared.reserve_slot(),
        };
        let Some(permit) = reserved else {
            return Err(shared.reject(None));
        };

        let mut decision = shared.admission.check();
        if let Decision::Rejected { retry_after } = decision {
            let remaining = timeout.map(|timeout| timeout.saturating_sub(start.elapsed()));
            if remaining.is_some_and(|remaining| remaining >= retry_after) {
                tokio::time::sleep(retry_after).await;
                decision = shared.admission.check();
            }
        }
        shared.finish(decision, permit, start)
    }

    /// Returns a slot reserved by [`acquire`](Self::acquire).
    ///
    /// Returns `false`, and changes nothing, when no slot is outstanding.
    pub fn release(&self) -> bool {
        self.inner.release_slot()
    }

    /// Reports a successful call and its latency.
    ///
    /// Only the adaptive strategy uses feedback; other strategies ignore it.
    pub fn record_success(&self, latency: Duration) {
        if let Admission::Adaptive { controller, .. } = &self.inner.admission {
            if let Some(adjustment) = controller.record_success(latency) {
                self.inner.adjusted(adjustment);
            }
        }
    }

    /// Reports a failed call.
    ///
    /// Under the adaptive strategy [`FailureKind::RateLimited`] lowers the rate
    /// by `backoff_factor` immediately.
    pub fn record_failure(&self, kind: FailureKind) {
        if let Admission::Adaptive { controller, .. } = &self.inner.admission {
            if let Some(adjustment) = controller.record_error(kind) {
                self.inner.adjusted(adjustment);
            }
        }
    }

    /// Reports a call outcome. Failures are recorded as [`FailureKind::Other`].
    pub fn record_response(&self, success: bool, latency: Duration) {
        if success {
            self.record_success(latency);
        } else {
            self.record_failure(FailureKind::Other);
        }
    }

    /// Current capacity and cumulative counters.
    pub fn status(&self) -> RateLimiterStatus {
        let shared = &self.inner;
        let current_rate = match &shared.admission {
            Admission::Adaptive { controller, .. } => controller.current_rate(),
            _ => shared.config.requests_per_second,
        };
        let available_tokens = shared.admission.available();

        RateLimiterStatus {
            name: shared.config.name.clone(),
            strategy: shared.config.strategy,
            current_rate,
            available_tokens,
            is_throttled: available_tokens < 1.0,
            total_requests: shared.total_requests.load(Ordering::Relaxed),
            rejected_requests: shared.rejected_requests.load(Ordering::Relaxed),
            in_flight: shared.in_flight.load(Ordering::Acquire),
        }
    }

    /// Restores full capacity and the baseline rate.
    ///
    /// Counters and reserved slots are left alone. Meant for tests and manual
    /// recovery, not for routine error handling.
    pub fn reset(&self) {
        let shared = &self.inner;
        match &shared.admission {
            Admission::TokenBucket(bucket) => bucket.reset(shared.config.requests_per_second),
            Admission::SlidingWindow(window) => window.clear(),
            Admission::FixedWindow(window) => window.clear(),
            Admission::Adaptive { bucket, controller } => {
                controller.reset();
                bucket.reset(controller.current_rate());
            }
        }

        shared.config.event_listeners.emit(&RateLimiterEvent::Reset {
            name: shared.config.name.clone(),
            timestamp: Instant::now(),
        });

        #[cfg(feature = "tracing")]
        tracing::info!(ratelimiter = %shared.config.name, "rate limiter reset");
    }
}
