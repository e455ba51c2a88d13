use crate::config::RateLimitConfig;
use crate::error::RateLimitExceeded;
use crate::limiter::{RateLimiter, RateLimiterPermit, RateLimiterStatus};
use crate::{read, write};
use callguard_core::FailureKind;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// One [`RateLimiter`] per tenant key, created on first use from a shared template.
///
/// Tenants never share admission state. The registry lock is taken for writing
/// only while inserting a new tenant, and the new limiter is built before the
/// lock is taken, so admission checks on existing tenants are never held up by
/// a tenant being added.
///
/// Each tenant's limiter is named after its key.
///
/// ```rust
/// use callguard_ratelimiter::{RateLimitConfig, TenantLimiters};
///
/// let tenants = TenantLimiters::new(
///     RateLimitConfig::builder().requests_per_second(1.0).burst_size(1).build().unwrap(),
/// );
///
/// assert!(tenants.acquire("org-a", None));
/// assert!(!tenants.acquire("org-a", None));
/// assert!(tenants.acquire("org-b", None));
/// ```
#[derive(Debug, Clone)]
pub struct TenantLimiters {
    template: RateLimitConfig,
    limiters: Arc<RwLock<HashMap<String, RateLimiter>>>,
}

impl TenantLimiters {
    /// Creates an empty registry; every tenant gets a copy of `template`.
    pub fn new(template: RateLimitConfig) -> Self {
        Self {
            template,
            limiters: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The configuration new tenants are created from.
    pub fn template(&self) -> &RateLimitConfig {
        &self.template
    }

    /// Returns the limiter for `key`, creating it if needed.
    pub fn for_key(&self, key: &str) -> RateLimiter {
        if let Some(limiter) = read(&self.limiters).get(key) {
            return limiter.clone();
        }

        let candidate = RateLimiter::new(self.template.renamed(key));
        // Another caller may have raced us here; whoever inserted first wins.
        write(&self.limiters)
            .entry(key.to_string())
            .or_insert(candidate)
            .clone()
    }

    /// [`RateLimiter::acquire`] on the limiter for `key`.
    pub fn acquire(&self, key: &str, timeout: Option<Duration>) -> bool {
        self.for_key(key).acquire(timeout)
    }

    /// [`RateLimiter::try_acquire`] on the limiter for `key`.
    pub fn try_acquire(
        &self,
        key: &str,
        timeout: Option<Duration>,
    ) -> Result<RateLimiterPermit, RateLimitExceeded> {
        self.for_key(key).try_acquire(timeout)
    }

    /// [`RateLimiter::try_acquire_async`] on the limiter for `key`.
    pub async fn try_acquire_async(
        &self,
        key: &str,
        timeout: Option<Duration>,
    ) -> Result<RateLimiterPermit, RateLimitExceeded> {
        self.for_key(key).try_acquire_async(timeout).await
    }

    /// [`RateLimiter::release`] on the limiter for `key`.
    ///
    /// Returns `false` for unknown keys.
    pub fn release(&self, key: &str) -> bool {
        self.get(key).is_some_and(|limiter| limiter.release())
    }

    /// [`RateLimiter::record_response`] on the limiter for `key`.
    pub fn record_response(&self, key: &str, success: bool, latency: Duration) {
        self.for_key(key).record_response(success, latency);
    }

    /// [`RateLimiter::record_success`] on the limiter for `key`.
    pub fn record_success(&self, key: &str, latency: Duration) {
        self.for_key(key).record_success(latency);
    }

    /// [`RateLimiter::record_failure`] on the limiter for `key`.
    pub fn record_failure(&self, key: &str, kind: FailureKind) {
        self.for_key(key).record_failure(kind);
    }

    /// The limiter for `key`, if it exists.
    pub fn get(&self, key: &str) -> Option<RateLimiter> {
        read(&self.limiters).get(key).cloned()
    }

    /// Keys of all tenants created so far, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = read(&self.limiters).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of tenants.
    pub fn len(&self) -> usize {
        read(&self.limiters).len()
    }

    /// Returns `true` if no tenant has been created yet.
    pub fn is_empty(&self) -> bool {
        read(&self.limiters).is_empty()
    }

    /// Forgets a tenant. A later call for the same key starts from a fresh limiter.
    pub fn remove(&self, key: &str) -> Option<RateLimiter> {
        write(&self.limiters).remove(key)
    }

    /// Status of every tenant, sorted by key.
    pub fn status_all(&self) -> Vec<RateLimiterStatus> {
        let limiters: Vec<RateLimiter> = read(&self.limiters).values().cloned().collect();
        let mut statuses: Vec<_> = limiters.iter().map(RateLimiter::status).collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }
}
