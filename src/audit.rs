/// Security audit events
///
/// The authority reports issuance, rotation, revocation, reuse, and
/// rate-limit trips through an injected `AuditSink`. Sink failures are
/// logged and otherwise ignored.

use std::error::Error as StdError;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityAction {
    TokenIssued,
    TokenRotated,
    RefreshRevoked,
    RefreshReuse,
    RateLimited,
}

impl SecurityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityAction::TokenIssued => "token_issued",
            SecurityAction::TokenRotated => "token_rotated",
            SecurityAction::RefreshRevoked => "refresh_revoked",
            SecurityAction::RefreshReuse => "refresh_reuse",
            SecurityAction::RateLimited => "rate_limited",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityEvent {
    pub action: SecurityAction,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    /// Token id the event refers to, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SecurityEvent {
    pub fn new(action: SecurityAction, user_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            action,
            user_id: user_id.into(),
            timestamp,
            token_id: None,
            detail: None,
        }
    }

    pub fn with_token_id(mut self, token_id: impl Into<String>) -> Self {
        self.token_id = Some(token_id.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn level(&self) -> AuditLevel {
        match self.action {
            SecurityAction::TokenIssued
            | SecurityAction::TokenRotated
            | SecurityAction::RefreshRevoked => AuditLevel::Info,
            SecurityAction::RefreshReuse | SecurityAction::RateLimited => AuditLevel::Warn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditError(pub String);

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Audit sink error: {}", self.0)
    }
}

impl StdError for AuditError {}

/// Destination for security events
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &SecurityEvent) -> Result<(), AuditError>;
}

/// Writes events to `tracing` under the `audit` target
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &SecurityEvent) -> Result<(), AuditError> {
        let action = event.action.as_str();
        let user_id = event.user_id.as_str();
        let timestamp = event.timestamp.to_rfc3339();
        let token_id = event.token_id.as_deref().unwrap_or("");
        let detail = event.detail.as_deref().unwrap_or("");

        match event.level() {
            AuditLevel::Info => {
                info!(target: "audit", event = action, user_id, timestamp = timestamp.as_str(), token_id, detail);
            }
            AuditLevel::Warn => {
                warn!(target: "audit", event = action, user_id, timestamp = timestamp.as_str(), token_id, detail);
            }
        }
        Ok(())
    }
}

/// Discards every event
#[derive(Debug, Clone, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &SecurityEvent) -> Result<(), AuditError> {
        Ok(())
    }
}
