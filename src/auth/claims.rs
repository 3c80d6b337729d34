/// Token payload and claims
///
/// `AuthPayload` is what callers hand in and get back; `TokenClaims` is the
/// signed body of every access and refresh token (RFC 7519 names plus
/// `roles`, `auth_time`, and `typ`).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity a token pair is minted for
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AuthPayload {
    pub user_id: String,
    pub roles: BTreeSet<String>,
    /// When the identity authenticated (Unix timestamp)
    pub issued_at: i64,
}

impl AuthPayload {
    /// Create a payload; an `issued_at` of 0 is stamped at issuance
    pub fn new<I, S>(user_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id: user_id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            issued_at: 0,
        }
    }

    pub fn with_issued_at(mut self, issued_at: i64) -> Self {
        self.issued_at = issued_at;
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Signed claims carried by every token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Subject (user id)
    pub sub: String,
    pub roles: BTreeSet<String>,
    /// Original authentication time, kept across rotations
    pub auth_time: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Unique token id
    pub jti: String,
    pub typ: TokenKind,
}

impl TokenClaims {
    pub fn new(
        payload: &AuthPayload,
        kind: TokenKind,
        now: i64,
        expiry_seconds: i64,
        issuer: &str,
    ) -> Self {
        Self {
            sub: payload.user_id.clone(),
            roles: payload.roles.clone(),
            auth_time: payload.issued_at,
            iat: now,
            exp: now.saturating_add(expiry_seconds),
            iss: issuer.to_string(),
            jti: Uuid::new_v4().to_string(),
            typ: kind,
        }
    }

    /// Check if token has expired at `now`
    pub fn is_expired(&self, now: i64) -> bool {
        self.exp <= now
    }

    pub fn payload(&self) -> AuthPayload {
        AuthPayload {
            user_id: self.sub.clone(),
            roles: self.roles.clone(),
            issued_at: self.auth_time,
        }
    }
}
