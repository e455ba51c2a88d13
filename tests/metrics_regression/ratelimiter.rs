//! Rate limiter metrics regression tests

use super::helpers::*;
use serial_test::serial;

use callguard_core::FailureKind;
use callguard_ratelimiter::{RateLimitConfig, RateLimitLayer, RateLimiter, Strategy};
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};

#[tokio::test]
#[serial]
async fn ratelimiter_metrics_exist() {
    init_recorder();

    let limiter = RateLimiter::new(
        RateLimitConfig::builder()
            .name("test_ratelimiter")
            .requests_per_second(100.0)
            .burst_size(10)
            .build()
            .unwrap(),
    );
    let mut service = RateLimitLayer::new(limiter).layer(tower::service_fn(|_: u64| async {
        Ok::<_, &'static str>("success")
    }));

    for i in 0..3 {
        let _ = service.ready().await.unwrap().call(i).await;
    }

    assert_counter_exists("ratelimiter_calls_total");
    assert_metric_has_label("ratelimiter_calls_total", "ratelimiter", "test_ratelimiter");
    assert_metric_has_label("ratelimiter_calls_total", "result", "permitted");

    assert_histogram_exists("ratelimiter_wait_duration_seconds");
    assert_metric_has_label(
        "ratelimiter_wait_duration_seconds",
        "ratelimiter",
        "test_ratelimiter",
    );

    assert_gauge_exists("ratelimiter_rate");
    assert_metric_has_label("ratelimiter_rate", "ratelimiter", "test_ratelimiter");
}

#[tokio::test]
#[serial]
async fn ratelimiter_rejection_metrics() {
    init_recorder();

    let limiter = RateLimiter::new(
        RateLimitConfig::builder()
            .name("reject_ratelimiter")
            .requests_per_second(1.0)
            .burst_size(2)
            .build()
            .unwrap(),
    );

    for _ in 0..10 {
        let _ = limiter.try_acquire(None);
    }

    assert_metric_has_label("ratelimiter_calls_total", "result", "rejected");
    assert_metric_has_label(
        "ratelimiter_calls_total",
        "ratelimiter",
        "reject_ratelimiter",
    );
}

#[tokio::test]
#[serial]
async fn adaptive_rate_gauge_tracks_adjustments() {
    init_recorder();

    let limiter = RateLimiter::new(
        RateLimitConfig::builder()
            .name("adaptive_ratelimiter")
            .strategy(Strategy::Adaptive)
            .requests_per_second(10.0)
            .build()
            .unwrap(),
    );
    limiter.record_failure(FailureKind::RateLimited);
    limiter.record_success(Duration::from_millis(5));

    assert_gauge_exists("ratelimiter_rate");
    assert_metric_has_label("ratelimiter_rate", "ratelimiter", "adaptive_ratelimiter");
}
