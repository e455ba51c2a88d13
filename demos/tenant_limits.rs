//! Per-tenant rate limiting with the four admission strategies
//!
//! Fires a burst of calls per tenant against each strategy and prints how many
//! got through.
//!
//! Run with: cargo run --example tenant_limits

use callguard::ratelimiter::{RateLimitConfig, Strategy, TenantLimiters};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    for strategy in [
        Strategy::TokenBucket,
        Strategy::SlidingWindow,
        Strategy::FixedWindow,
        Strategy::Adaptive,
    ] {
        let tenants = TenantLimiters::new(
            RateLimitConfig::builder()
                .strategy(strategy)
                .requests_per_second(2.0)
                .burst_size(4)
                .window_size(Duration::from_secs(2))
                .build()?,
        );

        println!("{strategy:?}");
        for tenant in ["acme", "globex"] {
            let admitted = (0..10)
                .filter(|_| tenants.try_acquire(tenant, None).is_ok())
                .count();
            println!("  {tenant}: {admitted}/10 admitted immediately");
        }

        // One more call that is willing to wait for capacity.
        let waited = tenants.acquire("acme", Some(Duration::from_secs(2)));
        println!("  acme, waiting up to 2s: {}", if waited { "admitted" } else { "rejected" });
        if waited {
            tenants.release("acme");
        }
    }
    Ok(())
}
