//! Property tests for the rate limiter strategies.
//!
//! Invariants tested:
//! - A token bucket never admits more than `burst + rate × elapsed`
//! - A sliding window never admits more than its limit in any trailing window
//! - Concurrency slots are never exceeded and are all returned
//! - Release never drives the in-flight count below zero

use super::paused_runtime;
use callguard_ratelimiter::{self as ratelimiter, RateLimitConfig, RateLimiter};
use proptest::prelude::*;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{advance, Instant};

fn limiter(strategy: ratelimiter::Strategy, rps: f64, burst: usize) -> RateLimiter {
    RateLimiter::new(
        RateLimitConfig::builder()
            .strategy(strategy)
            .requests_per_second(rps)
            .burst_size(burst)
            .window_size(Duration::from_secs(1))
            .build()
            .unwrap(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Property: admissions are bounded by the initial burst plus what refilled
    #[test]
    fn token_bucket_bounds_admissions(
        rps in 1u32..=50,
        burst in 1usize..=20,
        gaps_ms in prop::collection::vec(0u64..=200, 1..=100),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let limiter = limiter(ratelimiter::Strategy::TokenBucket, f64::from(rps), burst);
            let start = Instant::now();
            let mut admitted = 0usize;

            for gap in &gaps_ms {
                advance(Duration::from_millis(*gap)).await;
                if limiter.try_acquire_async(None).await.is_ok() {
                    admitted += 1;
                }
            }

            let elapsed = start.elapsed().as_secs_f64();
            let bound = burst as f64 + f64::from(rps) * elapsed;
            prop_assert!(
                admitted as f64 <= bound + 1e-6,
                "admitted {} but bound was {}",
                admitted,
                bound
            );
            Ok(())
        })?;
    }

    /// Property: no trailing 1s window ever holds more than the limit
    #[test]
    fn sliding_window_never_exceeds_limit(
        rps in 1u32..=20,
        gaps_ms in prop::collection::vec(0u64..=300, 1..=150),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let limiter = limiter(ratelimiter::Strategy::SlidingWindow, f64::from(rps), 50);
            let limit = rps as usize;
            let mut recent: VecDeque<Instant> = VecDeque::new();

            for gap in &gaps_ms {
                advance(Duration::from_millis(*gap)).await;
                let now = Instant::now();
                if limiter.try_acquire_async(None).await.is_ok() {
                    while recent
                        .front()
                        .is_some_and(|t| now.duration_since(*t) > Duration::from_secs(1))
                    {
                        recent.pop_front();
                    }
                    recent.push_back(now);
                    prop_assert!(
                        recent.len() <= limit,
                        "{} admissions within one window, limit {}",
                        recent.len(),
                        limit
                    );
                }
            }
            Ok(())
        })?;
    }

    /// Property: held permits never exceed the burst, and dropping them frees every slot
    #[test]
    fn slots_never_oversubscribed(
        burst in 1usize..=10,
        attempts in 1usize..=40,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let limiter = limiter(ratelimiter::Strategy::TokenBucket, 1000.0, burst);
            let mut held = Vec::new();

            for _ in 0..attempts {
                advance(Duration::from_millis(10)).await;
                if let Ok(permit) = limiter.try_acquire_async(None).await {
                    held.push(permit);
                }
                prop_assert!(limiter.status().in_flight <= burst);
            }
            prop_assert_eq!(held.len(), attempts.min(burst));

            drop(held);
            prop_assert_eq!(limiter.status().in_flight, 0);
            Ok(())
        })?;
    }

    /// Property: extra releases are refused and never create capacity
    #[test]
    fn release_saturates_at_zero(
        acquires in 0usize..=5,
        releases in 0usize..=10,
    ) {
        let limiter = limiter(ratelimiter::Strategy::TokenBucket, 1000.0, 5);
        let mut admitted = 0;
        for _ in 0..acquires {
            if limiter.acquire(None) {
                admitted += 1;
            }
        }

        let released = (0..releases).filter(|_| limiter.release()).count();
        prop_assert_eq!(released, releases.min(admitted));
        prop_assert_eq!(limiter.status().in_flight, admitted - released);
    }
}
