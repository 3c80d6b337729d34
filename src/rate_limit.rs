/// Fixed-window rate limiting for token issuance
/// Features:
/// - One counter per (user, endpoint) key
/// - Check and increment in a single lock acquisition
/// - Retry hint carrying the remaining window duration

use std::collections::HashMap;
use std::sync::Mutex;

/// Window and budget applied to every key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Max requests per window per key
    pub limit: u32,
    pub window_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub user_id: String,
    pub endpoint: String,
}

impl RateLimitKey {
    pub fn new(user_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// Requests seen for one key in the current window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub user_id: String,
    pub endpoint: String,
    pub window_start: i64,
    pub count: u32,
}

impl RateLimitEntry {
    fn new(key: &RateLimitKey, now: i64) -> Self {
        Self {
            user_id: key.user_id.clone(),
            endpoint: key.endpoint.clone(),
            window_start: now,
            count: 0,
        }
    }

    fn window_elapsed(&self, window_seconds: i64, now: i64) -> bool {
        now.saturating_sub(self.window_start) >= window_seconds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Entries beyond this count trigger a sweep of elapsed windows
const SWEEP_THRESHOLD: usize = 4096;

/// Rate limit table - tracks request counts per key
#[derive(Debug, Default)]
pub struct RateLimitTable {
    entries: Mutex<HashMap<RateLimitKey, RateLimitEntry>>,
}

impl RateLimitTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request against `key`, refusing it once the budget is spent
    pub fn hit(&self, key: &RateLimitKey, policy: &RateLimitPolicy, now: i64) -> RateDecision {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if entries.len() >= SWEEP_THRESHOLD {
            entries.retain(|_, entry| !entry.window_elapsed(policy.window_seconds, now));
        }

        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| RateLimitEntry::new(key, now));

        if entry.window_elapsed(policy.window_seconds, now) {
            entry.window_start = now;
            entry.count = 0;
        }

        if entry.count < policy.limit {
            entry.count += 1;
            RateDecision::Allowed {
                remaining: policy.limit - entry.count,
            }
        } else {
            let remaining_window = entry
                .window_start
                .saturating_add(policy.window_seconds)
                .saturating_sub(now);
            RateDecision::Limited {
                retry_after_secs: remaining_window.max(1) as u64,
            }
        }
    }

    /// Current entry for `key`, if one exists
    pub fn entry(&self, key: &RateLimitKey) -> Option<RateLimitEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    /// Drop entries whose window has elapsed; returns how many were removed
    pub fn purge(&self, window_seconds: i64, now: i64) -> usize {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !entry.window_elapsed(window_seconds, now));
        before - entries.len()
    }

    /// Give back a slot taken by `hit` whose request did not go through
    ///
    /// Only the window that is still open at `now` is credited.
    pub fn refund(&self, key: &RateLimitKey, policy: &RateLimitPolicy, now: i64) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(entry) = entries.get_mut(key) {
            if !entry.window_elapsed(policy.window_seconds, now) && entry.count > 0 {
                entry.count -= 1;
            }
        }
    }
}
