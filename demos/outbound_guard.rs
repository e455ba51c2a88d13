//! Multi-tenant outbound client guarded by rate limits and a circuit breaker
//!
//! A simulated remote API throttles one noisy tenant and later goes down
//! entirely. Watch the noisy tenant's adaptive rate drop while the quiet
//! tenant is unaffected, then the breaker open for everyone.
//!
//! Run with: cargo run --example outbound_guard

use callguard::{FailureKind, GuardError, OutboundGuard, RateLimitConfig, Strategy};
use callguard::core::classifier::FnClassifier;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Simulated API errors
#[derive(Debug, Clone, PartialEq)]
enum ApiError {
    /// HTTP 429
    TooManyRequests,
    /// HTTP 503
    Unavailable,
}

/// Simulated remote API
struct RemoteApi {
    down: AtomicBool,
}

impl RemoteApi {
    async fn fetch(&self, tenant: &str) -> Result<String, ApiError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.down.load(Ordering::SeqCst) {
            return Err(ApiError::Unavailable);
        }
        if tenant == "noisy" {
            return Err(ApiError::TooManyRequests);
        }
        Ok(format!("data for {tenant}"))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let guard = OutboundGuard::new(
        RateLimitConfig::builder()
            .strategy(Strategy::Adaptive)
            .requests_per_second(20.0)
            .burst_size(5)
            .on_rate_adjusted(|from, to, reason| {
                println!("  rate adjusted {from:.2} -> {to:.2} ({reason})");
            })
            .build()?,
    )
    .with_acquire_timeout(Duration::from_millis(250));
    guard.register_breaker("remote", 5, Duration::from_secs(2))?;

    let api = Arc::new(RemoteApi {
        down: AtomicBool::new(false),
    });
    let classifier = FnClassifier::new(|result: &Result<String, ApiError>| match result {
        Ok(_) => None,
        Err(ApiError::TooManyRequests) => Some(FailureKind::RateLimited),
        Err(ApiError::Unavailable) => Some(FailureKind::Server),
    });

    println!("Phase 1: noisy tenant gets throttled by the remote");
    for _ in 0..4 {
        for tenant in ["noisy", "quiet"] {
            let result = guard
                .call_classified(tenant, "remote", &classifier, || api.fetch(tenant))
                .await;
            report(tenant, &result);
        }
    }
    for tenant in ["noisy", "quiet"] {
        if let Some(status) = guard.status(tenant) {
            println!("  {tenant}: {:.2} rps", status.current_rate);
        }
    }

    println!("\nPhase 2: remote goes down");
    api.down.store(true, Ordering::SeqCst);
    for _ in 0..8 {
        let result = guard
            .call_classified("quiet", "remote", &classifier, || api.fetch("quiet"))
            .await;
        report("quiet", &result);
    }

    println!("\nPhase 3: remote recovers, breaker closes after its cooldown");
    api.down.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(2_100)).await;
    let result = guard
        .call_classified("quiet", "remote", &classifier, || api.fetch("quiet"))
        .await;
    report("quiet", &result);

    println!("\nFinal status:");
    let status = guard.status_all();
    for limiter in &status.limiters {
        println!(
            "  tenant {}: {} requests, {} rejected",
            limiter.name, limiter.total_requests, limiter.rejected_requests
        );
    }
    for breaker in &status.breakers {
        println!(
            "  breaker {}: {} ({} failures, {} rejections)",
            breaker.name, breaker.state, breaker.total_failures, breaker.total_rejections
        );
    }
    Ok(())
}

fn report(tenant: &str, result: &Result<String, GuardError<ApiError>>) {
    match result {
        Ok(body) => println!("  {tenant}: ok ({body})"),
        Err(GuardError::RateLimited { retry_after, .. }) => {
            println!("  {tenant}: rate limited, retry after {retry_after:?}")
        }
        Err(GuardError::CircuitOpen { name }) => println!("  {tenant}: breaker '{name}' open"),
        Err(GuardError::Inner(e)) => println!("  {tenant}: remote error {e:?}"),
    }
}
