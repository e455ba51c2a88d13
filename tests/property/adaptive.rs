//! Property tests for the adaptive controller.
//!
//! Invariants tested:
//! - The rate always stays within the configured bounds
//! - Every reported adjustment is a real change and chains from the previous one

use super::paused_runtime;
use callguard_core::FailureKind;
use callguard_ratelimiter::{AdaptiveController, ADJUSTMENT_INTERVAL};
use proptest::prelude::*;
use std::time::Duration;
use tokio::time::advance;

#[derive(Debug, Clone)]
enum Feedback {
    Success(u64),
    Failure(FailureKind),
    Wait(u64),
}

fn feedback() -> impl Strategy<Value = Feedback> {
    prop_oneof![
        (0u64..=3_000).prop_map(Feedback::Success),
        prop_oneof![
            Just(FailureKind::RateLimited),
            Just(FailureKind::Timeout),
            Just(FailureKind::Server),
            Just(FailureKind::Network),
        ]
        .prop_map(Feedback::Failure),
        (0u64..=ADJUSTMENT_INTERVAL.as_millis() as u64 * 2).prop_map(Feedback::Wait),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Property: any feedback sequence keeps the rate inside [min, max]
    #[test]
    fn rate_stays_within_bounds(
        min in 0.5f64..=5.0,
        span in 1.0f64..=200.0,
        backoff in 0.1f64..=0.9,
        increase in 1.05f64..=3.0,
        steps in prop::collection::vec(feedback(), 1..=200),
    ) {
        let max = min + span;
        let rt = paused_runtime();
        rt.block_on(async {
            let controller = AdaptiveController::new((min + max) / 2.0, min, max, backoff, increase);
            let mut rate = controller.current_rate();

            for step in &steps {
                let adjustment = match step {
                    Feedback::Success(ms) => controller.record_success(Duration::from_millis(*ms)),
                    Feedback::Failure(kind) => controller.record_error(*kind),
                    Feedback::Wait(ms) => {
                        advance(Duration::from_millis(*ms)).await;
                        controller.maybe_adjust()
                    }
                };

                if let Some(adjustment) = adjustment {
                    prop_assert_eq!(adjustment.from, rate);
                    prop_assert!(adjustment.to != adjustment.from);
                    rate = adjustment.to;
                }
                prop_assert_eq!(controller.current_rate(), rate);
                prop_assert!(rate >= min && rate <= max, "rate {} outside [{}, {}]", rate, min, max);
            }
            Ok(())
        })?;
    }
}
