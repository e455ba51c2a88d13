//! Rate limiter stress tests

use callguard_ratelimiter::{AsyncRateLimiter, RateLimitConfig, RateLimiter, Strategy};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::ConcurrencyTracker;

fn limiter(strategy: Strategy, rps: f64, burst: usize) -> RateLimiter {
    RateLimiter::new(
        RateLimitConfig::builder()
            .name("stress")
            .strategy(strategy)
            .requests_per_second(rps)
            .burst_size(burst)
            .build()
            .unwrap(),
    )
}

/// Test: 1 million admission checks with a limit high enough to never throttle
#[test]
#[ignore]
fn stress_one_million_admissions_no_throttling() {
    let limiter = limiter(Strategy::TokenBucket, 1e9, 1_000_000);
    let start = Instant::now();

    for _ in 0..1_000_000 {
        assert!(limiter.try_acquire(None).is_ok());
    }

    let elapsed = start.elapsed();
    println!("1M admissions completed in {:?}", elapsed);
    println!(
        "Throughput: {:.0} admissions/sec",
        1_000_000.0 / elapsed.as_secs_f64()
    );

    let status = limiter.status();
    assert_eq!(status.total_requests, 1_000_000);
    assert_eq!(status.rejected_requests, 0);
    assert_eq!(status.in_flight, 0);
}

/// Test: every strategy holds its limit under contention from many threads
#[test]
#[ignore]
fn stress_strategies_hold_limit_under_contention() {
    for strategy in [
        Strategy::TokenBucket,
        Strategy::SlidingWindow,
        Strategy::FixedWindow,
        Strategy::Adaptive,
    ] {
        // 0.5 rps over the default 60s window allows 30 admissions; the bucket
        // strategies start with 30 tokens and refill negligibly during the test.
        let limiter = limiter(strategy, 0.5, 30);
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let limiter = limiter.clone();
                let admitted = Arc::clone(&admitted);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        if limiter.try_acquire(None).is_ok() {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let admitted = admitted.load(Ordering::Relaxed);
        println!("{strategy:?}: {admitted} of 32000 admitted");
        assert!(admitted <= 31, "{strategy:?} admitted {admitted}");
        assert!(admitted >= 30, "{strategy:?} admitted {admitted}");

        let status = limiter.status();
        assert_eq!(status.total_requests, 32_000);
        assert_eq!(status.rejected_requests as usize, 32_000 - admitted);
        assert_eq!(status.in_flight, 0);
    }
}

/// Test: concurrently held permits never exceed the burst
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_slots_bound_concurrency() {
    let limiter = limiter(Strategy::TokenBucket, 1e6, 16);
    let tracker = ConcurrencyTracker::new();
    let completed = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..2_000 {
        let limiter = limiter.clone();
        let tracker = Arc::clone(&tracker);
        let completed = Arc::clone(&completed);
        handles.push(tokio::spawn(async move {
            if let Ok(_permit) = limiter
                .try_acquire_async(Some(Duration::from_secs(10)))
                .await
            {
                tracker.enter();
                tokio::time::sleep(Duration::from_millis(1)).await;
                tracker.exit();
                completed.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    println!(
        "Completed: {}, peak concurrency: {}",
        completed.load(Ordering::Relaxed),
        tracker.peak()
    );
    assert!(tracker.peak() <= 16);
    assert_eq!(limiter.status().in_flight, 0);
}

/// Test: async waiters are all eventually served at the configured rate
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn stress_async_waiters_drain_at_rate() {
    let limiter = AsyncRateLimiter::new(
        &RateLimitConfig::builder()
            .name("async_stress")
            .requests_per_second(500.0)
            .burst_size(50)
            .build()
            .unwrap(),
    );
    let served = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..1_000 {
        let limiter = limiter.clone();
        let served = Arc::clone(&served);
        handles.push(tokio::spawn(async move {
            limiter.acquire().await;
            served.fetch_add(1, Ordering::Relaxed);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let elapsed = start.elapsed();
    println!("1000 waiters served in {:?}", elapsed);
    assert_eq!(served.load(Ordering::Relaxed), 1_000);
    // 50 from the initial burst, the rest at 500/s.
    assert!(elapsed >= Duration::from_millis(1_800));
    assert_eq!(limiter.waiting(), 0);
}
