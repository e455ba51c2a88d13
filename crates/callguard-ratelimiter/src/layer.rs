use crate::limiter::RateLimiter;
use callguard_core::classifier::{DefaultClassifier, FailureClassifier};
use callguard_core::GuardError;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tower::{Layer, Service};

/// A Tower [`Layer`] that admits every request through a [`RateLimiter`].
///
/// Each request acquires a permit (waiting up to the configured timeout), runs
/// the inner service, and reports the latency and outcome back to the limiter
/// so an adaptive limiter can tune itself. The permit is held for the duration
/// of the inner call.
///
/// # Examples
///
/// ```
/// use callguard_ratelimiter::{RateLimitConfig, RateLimitLayer, RateLimiter, Strategy};
/// use tower::ServiceBuilder;
/// use std::time::Duration;
///
/// # async fn example() {
/// let limiter = RateLimiter::new(
///     RateLimitConfig::builder()
///         .strategy(Strategy::Adaptive)
///         .requests_per_second(20.0)
///         .build()
///         .unwrap(),
/// );
///
/// let service = ServiceBuilder::new()
///     .layer(RateLimitLayer::new(limiter).with_timeout(Duration::from_millis(250)))
///     .service(my_service());
/// # }
/// # fn my_service() -> impl tower::Service<String, Response = String, Error = std::io::Error> + Clone {
/// #     tower::service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) })
/// # }
/// ```
#[derive(Clone)]
pub struct RateLimitLayer<C = DefaultClassifier> {
    limiter: RateLimiter,
    timeout: Option<Duration>,
    classifier: Arc<C>,
}

impl RateLimitLayer {
    /// Creates a layer that rejects immediately when no permit is available.
    pub fn new(limiter: RateLimiter) -> Self {
        Self {
            limiter,
            timeout: None,
            classifier: Arc::new(DefaultClassifier),
        }
    }
}

impl<C> RateLimitLayer<C> {
    /// Waits up to `timeout` for a permit before rejecting.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replaces the classifier that decides which responses count as failures.
    pub fn with_classifier<C2>(self, classifier: C2) -> RateLimitLayer<C2> {
        RateLimitLayer {
            limiter: self.limiter,
            timeout: self.timeout,
            classifier: Arc::new(classifier),
        }
    }
}

impl<S, C> Layer<S> for RateLimitLayer<C> {
    type Service = RateLimited<S, C>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimited {
            inner: service,
            limiter: self.limiter.clone(),
            timeout: self.timeout,
            classifier: Arc::clone(&self.classifier),
        }
    }
}

/// Service produced by [`RateLimitLayer`].
#[derive(Clone)]
pub struct RateLimited<S, C = DefaultClassifier> {
    inner: S,
    limiter: RateLimiter,
    timeout: Option<Duration>,
    classifier: Arc<C>,
}

impl<S, C> RateLimited<S, C> {
    /// The limiter guarding this service.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

impl<S, C, Req> Service<Req> for RateLimited<S, C>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    C: FailureClassifier<S::Response, S::Error> + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = GuardError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(GuardError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let limiter = self.limiter.clone();
        let classifier = Arc::clone(&self.classifier);
        let timeout = self.timeout;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let _permit = limiter.try_acquire_async(timeout).await?;

            let start = Instant::now();
            let result = inner.call(req).await;
            let latency = start.elapsed();

            match classifier.classify(&result) {
                None => limiter.record_success(latency),
                Some(kind) => limiter.record_failure(kind),
            }
            result.map_err(GuardError::Inner)
        })
    }
}
