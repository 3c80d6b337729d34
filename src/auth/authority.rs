/// Token Authority
///
/// Issues, validates, and rotates paired access/refresh tokens for a user
/// identity. Issuance is bounded by a per-identity rate limit and every
/// security-relevant step is reported to the audit sink.
///
/// Refresh tokens follow `ISSUED -> ROTATED | REVOKED | EXPIRED`; every state
/// after `ISSUED` is terminal. Access tokens are validated statelessly until
/// they expire.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditSink, SecurityAction, SecurityEvent, TracingAuditSink};
use crate::auth::claims::{AuthPayload, TokenClaims, TokenKind};
use crate::auth::clock::{Clock, SystemClock};
use crate::auth::jwt::TokenCodec;
use crate::auth::store::{ConsumeOutcome, InMemoryTokenStore, TokenStore};
use crate::configuration::AuthoritySettings;
use crate::error::{AuthError, AuthResult, ConfigError};
use crate::rate_limit::{RateDecision, RateLimitKey, RateLimitPolicy};
use crate::validators::{validate_roles, validate_user_id};

/// Rate limit endpoint charged by issuance (and by rotation when configured)
pub const ISSUE_ENDPOINT: &str = "token";

/// Access and refresh token minted together
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

pub struct TokenAuthority {
    settings: AuthoritySettings,
    codec: TokenCodec,
    policy: RateLimitPolicy,
    store: Arc<dyn TokenStore>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl TokenAuthority {
    /// Build an authority with an in-memory store, tracing audit sink, and
    /// the system clock
    ///
    /// # Errors
    /// Returns error if the settings are invalid (short secret, zero limits)
    pub fn new(settings: AuthoritySettings) -> Result<Self, ConfigError> {
        settings.validate()?;

        Ok(Self {
            codec: TokenCodec::new(settings.secret.as_bytes(), &settings.issuer),
            policy: RateLimitPolicy {
                limit: settings.rate_limit,
                window_seconds: settings.window_seconds,
            },
            store: Arc::new(InMemoryTokenStore::new()),
            audit: Arc::new(TracingAuditSink::new()),
            clock: Arc::new(SystemClock),
            settings,
        })
    }

    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Mint an access/refresh pair for `payload`
    ///
    /// # Errors
    /// - `InvalidPayload` if the user id or a role is unusable
    /// - `RateLimitExceeded` once the identity spent its window budget
    pub fn generate_token_pair(&self, payload: &AuthPayload) -> AuthResult<TokenPair> {
        let user_id = validate_user_id(&payload.user_id)?;
        validate_roles(&payload.roles)?;

        let now = self.clock.now();
        self.check_rate_limit(&user_id, now)?;

        let payload = AuthPayload {
            user_id,
            roles: payload.roles.clone(),
            issued_at: if payload.issued_at > 0 {
                payload.issued_at
            } else {
                now.timestamp()
            },
        };
        let (pair, refresh_id) = self.mint_pair(&payload, now.timestamp())?;

        tracing::info!(user_id = %payload.user_id, "Token pair issued");
        self.record(
            SecurityEvent::new(SecurityAction::TokenIssued, payload.user_id, now)
                .with_token_id(refresh_id),
        );
        Ok(pair)
    }

    /// Decode an access token back into its payload
    ///
    /// # Errors
    /// Returns `InvalidToken` if the token is malformed, tampered with,
    /// expired, issued by someone else, or is not an access token
    pub fn validate_token(&self, token: &str) -> AuthResult<AuthPayload> {
        let claims = self
            .codec
            .decode(token, TokenKind::Access)
            .map_err(|failure| {
                tracing::warn!(?failure, "Access token rejected");
                AuthError::InvalidToken
            })?;

        if claims.is_expired(self.clock.timestamp()) {
            tracing::info!(user_id = %claims.sub, "Access token expired");
            return Err(AuthError::InvalidToken);
        }

        Ok(claims.payload())
    }

    /// Exchange an unconsumed refresh token for a new pair
    ///
    /// The old refresh token is consumed in the same step that checks it, so
    /// concurrent rotations of one token have exactly one winner.
    ///
    /// # Errors
    /// - `InvalidRefreshToken` if the token is malformed, expired, or spent
    /// - `RateLimitExceeded` only when rotations are configured to count
    pub fn rotate_refresh_token(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let now = self.clock.now();
        let claims = self.verify_refresh(refresh_token, now)?;

        let charged = self.settings.rotation_consumes_rate_limit;
        if charged {
            self.check_rate_limit(&claims.sub, now)?;
        }

        let consumed = self
            .mint_pair(&claims.payload(), now.timestamp())
            .and_then(|minted| self.consume_refresh(&claims, now).map(|()| minted));
        let (pair, new_refresh_id) = match consumed {
            Ok(minted) => minted,
            Err(e) => {
                if charged {
                    // Losing a concurrent rotation must not spend the budget
                    let key = RateLimitKey::new(claims.sub.as_str(), ISSUE_ENDPOINT);
                    self.store
                        .refund_rate_limit(&key, &self.policy, now.timestamp());
                }
                return Err(e);
            }
        };

        tracing::info!(user_id = %claims.sub, "Refresh token rotated");
        self.record(
            SecurityEvent::new(SecurityAction::TokenRotated, claims.sub, now)
                .with_token_id(claims.jti)
                .with_detail(format!("replaced_by={}", new_refresh_id)),
        );
        Ok(pair)
    }

    /// Spend a refresh token without minting a replacement (logout)
    ///
    /// # Errors
    /// Returns `InvalidRefreshToken` if the token is malformed, expired, or spent
    pub fn revoke_refresh_token(&self, refresh_token: &str) -> AuthResult<()> {
        let now = self.clock.now();
        let claims = self.verify_refresh(refresh_token, now)?;
        self.consume_refresh(&claims, now)?;

        tracing::info!(user_id = %claims.sub, "Refresh token revoked");
        self.record(
            SecurityEvent::new(SecurityAction::RefreshRevoked, claims.sub, now)
                .with_token_id(claims.jti),
        );
        Ok(())
    }

    /// Drop elapsed rate-limit windows and consumed ids past their expiry
    pub fn purge_expired(&self) -> usize {
        let removed = self
            .store
            .purge_expired(self.policy.window_seconds, self.clock.timestamp());
        tracing::debug!(removed, "Purged expired token state");
        removed
    }

    fn check_rate_limit(&self, user_id: &str, now: DateTime<Utc>) -> AuthResult<()> {
        let key = RateLimitKey::new(user_id, ISSUE_ENDPOINT);
        match self.store.hit_rate_limit(&key, &self.policy, now.timestamp()) {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Limited { retry_after_secs } => {
                tracing::warn!(user_id, retry_after_secs, "Token issuance rate limited");
                self.record(
                    SecurityEvent::new(SecurityAction::RateLimited, user_id, now)
                        .with_detail(format!("retry_after={}", retry_after_secs)),
                );
                Err(AuthError::RateLimitExceeded { retry_after_secs })
            }
        }
    }

    fn verify_refresh(&self, token: &str, now: DateTime<Utc>) -> AuthResult<TokenClaims> {
        let claims = self
            .codec
            .decode(token, TokenKind::Refresh)
            .map_err(|failure| {
                tracing::warn!(?failure, "Refresh token rejected");
                AuthError::InvalidRefreshToken
            })?;

        if claims.is_expired(now.timestamp()) {
            tracing::info!(user_id = %claims.sub, "Refresh token expired");
            return Err(AuthError::InvalidRefreshToken);
        }

        if self.store.is_consumed(&claims.jti) {
            self.report_reuse(&claims, now);
            return Err(AuthError::InvalidRefreshToken);
        }

        Ok(claims)
    }

    fn consume_refresh(&self, claims: &TokenClaims, now: DateTime<Utc>) -> AuthResult<()> {
        match self
            .store
            .consume_refresh(&claims.jti, claims.exp, now.timestamp())
        {
            ConsumeOutcome::Consumed => Ok(()),
            ConsumeOutcome::AlreadyConsumed => {
                self.report_reuse(claims, now);
                Err(AuthError::InvalidRefreshToken)
            }
        }
    }

    fn report_reuse(&self, claims: &TokenClaims, now: DateTime<Utc>) {
        tracing::warn!(user_id = %claims.sub, "Attempt to reuse consumed refresh token");
        self.record(
            SecurityEvent::new(SecurityAction::RefreshReuse, claims.sub.as_str(), now)
                .with_token_id(claims.jti.as_str()),
        );
    }

    /// Returns the pair and the new refresh token's id
    fn mint_pair(&self, payload: &AuthPayload, now: i64) -> AuthResult<(TokenPair, String)> {
        let access = TokenClaims::new(
            payload,
            TokenKind::Access,
            now,
            self.settings.access_token_expiry,
            self.codec.issuer(),
        );
        let refresh = TokenClaims::new(
            payload,
            TokenKind::Refresh,
            now,
            self.settings.refresh_token_expiry,
            self.codec.issuer(),
        );

        let pair = TokenPair {
            access_token: self.codec.encode(&access)?,
            refresh_token: self.codec.encode(&refresh)?,
            token_type: "Bearer".to_string(),
            expires_in: self.settings.access_token_expiry,
        };
        Ok((pair, refresh.jti))
    }

    /// Best effort: neither an error nor a panic in the sink reaches the caller
    fn record(&self, event: SecurityEvent) {
        match catch_unwind(AssertUnwindSafe(|| self.audit.record(&event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    event = event.action.as_str(),
                    "Failed to record security event"
                );
            }
            Err(_) => {
                tracing::error!(
                    event = event.action.as_str(),
                    "Audit sink panicked while recording security event"
                );
            }
        }
    }
}
