use crate::breaker::CircuitBreaker;
use crate::error::CircuitBreakerError;
use callguard_core::classifier::{DefaultClassifier, FailureClassifier};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A Tower [`Layer`] that runs requests through a shared [`CircuitBreaker`].
///
/// Every service built from the layer reports to the same breaker, so the
/// breaker can also be inspected or registered elsewhere.
///
/// # Examples
///
/// ```
/// use callguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerLayer};
/// use tower::ServiceBuilder;
///
/// let breaker = CircuitBreaker::new(CircuitBreakerConfig::builder().name("api").build().unwrap());
/// let service = ServiceBuilder::new()
///     .layer(CircuitBreakerLayer::new(breaker.clone()))
///     .service(tower::service_fn(|req: String| async move {
///         Ok::<_, std::io::Error>(req)
///     }));
/// ```
#[derive(Clone)]
pub struct CircuitBreakerLayer<C = DefaultClassifier> {
    breaker: CircuitBreaker,
    classifier: Arc<C>,
}

impl CircuitBreakerLayer {
    /// Creates a layer that counts every `Err` as a failure.
    pub fn new(breaker: CircuitBreaker) -> Self {
        Self {
            breaker,
            classifier: Arc::new(DefaultClassifier),
        }
    }
}

impl<C> CircuitBreakerLayer<C> {
    /// Replaces the classifier that decides which responses count as failures.
    pub fn with_classifier<C2>(self, classifier: C2) -> CircuitBreakerLayer<C2> {
        CircuitBreakerLayer {
            breaker: self.breaker,
            classifier: Arc::new(classifier),
        }
    }
}

impl<S, C> Layer<S> for CircuitBreakerLayer<C> {
    type Service = CircuitBreakerService<S, C>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreakerService {
            inner: service,
            breaker: self.breaker.clone(),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

/// Service produced by [`CircuitBreakerLayer`].
#[derive(Clone)]
pub struct CircuitBreakerService<S, C = DefaultClassifier> {
    inner: S,
    breaker: CircuitBreaker,
    classifier: Arc<C>,
}

impl<S, C> CircuitBreakerService<S, C> {
    /// The breaker guarding this service.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<S, C, Req> Service<Req> for CircuitBreakerService<S, C>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
    C: FailureClassifier<S::Response, S::Error> + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let breaker = self.breaker.clone();
        let classifier = Arc::clone(&self.classifier);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            breaker.admit::<S::Error>()?;

            let result = inner.call(req).await;
            if classifier.classify(&result).is_some() {
                breaker.record_failure();
            } else {
                breaker.record_success();
            }
            result.map_err(CircuitBreakerError::Inner)
        })
    }
}
