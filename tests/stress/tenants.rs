//! Multi-tenant stress tests

use callguard::{OutboundGuard, RateLimitConfig, Strategy};
use callguard_ratelimiter::TenantLimiters;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Test: lazily creating 10,000 tenants from many threads
#[test]
#[ignore]
fn stress_ten_thousand_tenants() {
    let tenants = TenantLimiters::new(
        RateLimitConfig::builder()
            .requests_per_second(1.0)
            .burst_size(1)
            .build()
            .unwrap(),
    );
    let admitted = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let tenants = tenants.clone();
            let admitted = Arc::clone(&admitted);
            std::thread::spawn(move || {
                for key in 0..10_000 {
                    if tenants.try_acquire(&format!("tenant-{key}"), None).is_ok() {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    println!("10k tenants x 8 threads in {:?}", start.elapsed());
    assert_eq!(tenants.len(), 10_000);
    // One token per tenant, whichever thread got there first.
    assert_eq!(admitted.load(Ordering::Relaxed), 10_000);
}

/// Test: a guard shared by many tasks keeps tenants apart
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_guard_isolates_tenants() {
    let guard = OutboundGuard::new(
        RateLimitConfig::builder()
            .strategy(Strategy::Adaptive)
            .requests_per_second(1.0)
            .burst_size(10)
            .build()
            .unwrap(),
    );
    guard
        .register_breaker("remote", 1_000_000, Duration::from_secs(60))
        .unwrap();

    let mut handles = Vec::new();
    for tenant in 0..50 {
        for _ in 0..20 {
            let guard = guard.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("tenant-{tenant}");
                guard
                    .call(&key, "remote", || async { Ok::<_, ()>(()) })
                    .await
                    .is_ok()
            }));
        }
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }

    // Every tenant gets its own burst of 10, no more.
    assert!(admitted <= 50 * 10 + 50, "admitted {admitted}");
    for status in guard.status_all().limiters {
        assert_eq!(status.total_requests, 20);
        assert_eq!(status.in_flight, 0);
    }
}
