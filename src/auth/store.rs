/// Token state storage
///
/// Holds the mutable state shared by concurrent authority calls:
/// - the per-identity rate limit table
/// - the set of consumed (rotated or revoked) refresh token ids
///
/// Consumed ids are kept only until the token would have expired anyway;
/// after that the signature check alone rejects it.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::rate_limit::{RateDecision, RateLimitKey, RateLimitPolicy, RateLimitTable};

/// Outcome of marking a refresh token consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// First use; the token is now spent
    Consumed,
    /// The token was already spent
    AlreadyConsumed,
}

/// State the authority needs across calls
///
/// Implementations must make `hit_rate_limit` and `consume_refresh` atomic
/// per key: two concurrent callers never both observe the last free slot,
/// and never both consume the same refresh token.
pub trait TokenStore: Send + Sync {
    fn hit_rate_limit(&self, key: &RateLimitKey, policy: &RateLimitPolicy, now: i64)
        -> RateDecision;

    /// Give back a slot taken by `hit_rate_limit` for a request that failed
    fn refund_rate_limit(&self, key: &RateLimitKey, policy: &RateLimitPolicy, now: i64);

    fn consume_refresh(&self, token_id: &str, expires_at: i64, now: i64) -> ConsumeOutcome;

    fn is_consumed(&self, token_id: &str) -> bool;

    /// Drop state that can no longer affect a decision; returns removed entries
    fn purge_expired(&self, window_seconds: i64, now: i64) -> usize;
}

/// Entries beyond this count trigger a sweep of expired ids
const SWEEP_THRESHOLD: usize = 4096;

#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    rate_limits: RateLimitTable,
    // token id -> expiry of the consumed token
    consumed: Mutex<HashMap<String, i64>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate_limits(&self) -> &RateLimitTable {
        &self.rate_limits
    }

    pub fn consumed_count(&self) -> usize {
        self.consumed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn hit_rate_limit(
        &self,
        key: &RateLimitKey,
        policy: &RateLimitPolicy,
        now: i64,
    ) -> RateDecision {
        self.rate_limits.hit(key, policy, now)
    }

    fn refund_rate_limit(&self, key: &RateLimitKey, policy: &RateLimitPolicy, now: i64) {
        self.rate_limits.refund(key, policy, now)
    }

    fn consume_refresh(&self, token_id: &str, expires_at: i64, now: i64) -> ConsumeOutcome {
        let mut consumed = self
            .consumed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if consumed.len() >= SWEEP_THRESHOLD {
            consumed.retain(|_, &mut exp| exp > now);
        }

        if consumed.contains_key(token_id) {
            return ConsumeOutcome::AlreadyConsumed;
        }
        consumed.insert(token_id.to_string(), expires_at);
        ConsumeOutcome::Consumed
    }

    fn is_consumed(&self, token_id: &str) -> bool {
        self.consumed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(token_id)
    }

    fn purge_expired(&self, window_seconds: i64, now: i64) -> usize {
        let removed_windows = self.rate_limits.purge(window_seconds, now);

        let mut consumed = self
            .consumed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = consumed.len();
        consumed.retain(|_, &mut exp| exp > now);

        removed_windows + (before - consumed.len())
    }
}
