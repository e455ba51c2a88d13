//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - The circuit is open exactly when the trailing run of failures reaches the threshold
//! - An open circuit never lets a call through before its cooldown has strictly elapsed
//! - A rejected call is never executed

use super::paused_runtime;
use callguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::advance;

fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
    CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("property")
            .failure_threshold(threshold)
            .cooldown(cooldown)
            .build()
            .unwrap(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Property: with no time passing, the state follows the consecutive failure count
    #[test]
    fn opens_exactly_at_threshold(
        threshold in 1u32..=10,
        outcomes in prop::collection::vec(any::<bool>(), 1..=60),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let breaker = breaker(threshold, Duration::from_secs(60));
            let mut run = 0u32;
            let mut opened = false;

            for success in &outcomes {
                if opened {
                    prop_assert!(!breaker.can_attempt());
                    continue;
                }
                if *success {
                    breaker.record_success();
                    run = 0;
                } else {
                    breaker.record_failure();
                    run += 1;
                }
                opened = run >= threshold;
                let expected = if opened { CircuitState::Open } else { CircuitState::Closed };
                prop_assert_eq!(breaker.state(), expected);
                prop_assert_eq!(breaker.consecutive_failures(), run);
            }
            Ok(())
        })?;
    }

    /// Property: the cooldown is measured from the last failure and must strictly elapse
    #[test]
    fn cooldown_is_strict(
        cooldown_secs in 1u64..=120,
        probe_offsets in prop::collection::vec(0u64..=240, 1..=20),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let cooldown = Duration::from_secs(cooldown_secs);
            let breaker = breaker(1, cooldown);
            breaker.record_failure();

            let mut offsets = probe_offsets.clone();
            offsets.sort_unstable();
            let mut elapsed = 0u64;

            for offset in offsets {
                advance(Duration::from_secs(offset - elapsed)).await;
                elapsed = offset;
                let allowed = breaker.can_attempt();
                prop_assert_eq!(allowed, elapsed > cooldown_secs);
                if allowed {
                    break;
                }
            }
            Ok(())
        })?;
    }

    /// Property: calls refused by an open circuit are never run
    #[test]
    fn rejected_calls_are_not_executed(
        threshold in 1u32..=5,
        extra_calls in 1usize..=20,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let breaker = breaker(threshold, Duration::from_secs(30));
            let executed = AtomicUsize::new(0);

            for _ in 0..(threshold as usize + extra_calls) {
                let _ = breaker
                    .call(|| async {
                        executed.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>("down")
                    })
                    .await;
            }

            prop_assert_eq!(executed.load(Ordering::SeqCst), threshold as usize);
            prop_assert_eq!(breaker.snapshot().total_rejections, extra_calls as u64);
            Ok(())
        })?;
    }
}
