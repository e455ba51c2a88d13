//! Circuit breaker metrics regression tests

use super::helpers::*;
use serial_test::serial;

use callguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerLayer};
use tower::{Layer, Service, ServiceExt};

#[tokio::test]
#[serial]
async fn circuitbreaker_metrics_exist() {
    init_recorder();

    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("test_breaker")
            .failure_threshold(2)
            .build()
            .unwrap(),
    );
    let mut service = CircuitBreakerLayer::new(breaker).layer(tower::service_fn(|fail: bool| async move {
        if fail {
            Err("failure")
        } else {
            Ok("success")
        }
    }));

    let _ = service.ready().await.unwrap().call(false).await;
    let _ = service.ready().await.unwrap().call(true).await;

    assert_counter_exists("circuitbreaker_calls_total");
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "test_breaker");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "success");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "failure");

    assert_gauge_exists("circuitbreaker_state");
    assert_metric_has_label("circuitbreaker_state", "circuitbreaker", "test_breaker");
}

#[tokio::test]
#[serial]
async fn circuitbreaker_transition_and_rejection_metrics() {
    init_recorder();

    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("transition_breaker")
            .failure_threshold(1)
            .build()
            .unwrap(),
    );

    let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
    let _ = breaker.call(|| async { Ok::<_, &str>(()) }).await;

    assert_counter_exists("circuitbreaker_transitions_total");
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "Closed");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "Open");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected");
}
