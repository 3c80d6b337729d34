/// Error Handling Module
///
/// Every public TokenAuthority operation returns `AuthResult<T>`; internal
/// failures are converted to an `AuthError` kind and never cross the public
/// boundary as panics.
///
/// It covers:
/// 1. Domain error kinds (payload, token, refresh token, rate limit)
/// 2. Configuration errors
/// 3. HTTP response mapping for the handler layer

use actix_web::{error::ResponseError, http::header, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

use crate::response::ResultEnvelope;

/// ============================================================================
/// 1. AUTHENTICATION ERROR KINDS
/// ============================================================================

/// Failure kinds produced by the token authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Missing or malformed field on issuance
    InvalidPayload(String),
    /// Malformed, tampered, or expired access token
    InvalidToken,
    /// Malformed, tampered, expired, or already consumed refresh token
    InvalidRefreshToken,
    /// Identity exceeded its issuance budget for the current window
    RateLimitExceeded { retry_after_secs: u64 },
    /// Signing the claims failed
    TokenEncoding(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidPayload(reason) => write!(f, "Invalid payload: {}", reason),
            AuthError::InvalidToken => write!(f, "Invalid or expired token"),
            AuthError::InvalidRefreshToken => write!(f, "Invalid or expired refresh token"),
            AuthError::RateLimitExceeded { retry_after_secs } => write!(
                f,
                "Rate limit exceeded, retry in {} seconds",
                retry_after_secs
            ),
            AuthError::TokenEncoding(msg) => write!(f, "Token generation failed: {}", msg),
        }
    }
}

impl StdError for AuthError {}

impl AuthError {
    /// Stable error code for client-side handling
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidPayload(_) => "INVALID_PAYLOAD",
            AuthError::InvalidToken => "TOKEN_INVALID",
            AuthError::InvalidRefreshToken => "REFRESH_TOKEN_INVALID",
            AuthError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AuthError::TokenEncoding(_) => "INTERNAL_ERROR",
        }
    }

    /// Seconds the caller should wait before retrying, if any
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AuthError::RateLimitExceeded { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// Shorthand used by every public authority operation
pub type AuthResult<T> = Result<T, AuthError>;

/// ============================================================================
/// 2. CONFIGURATION ERRORS
/// ============================================================================

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
    ParseError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => ConfigError::MissingRequired(key),
            other => ConfigError::ParseError(other.to_string()),
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidToken | AuthError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            AuthError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::TokenEncoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AuthError::TokenEncoding(msg) => {
                tracing::error!(error = %msg, "Token encoding error");
            }
            other => {
                tracing::warn!(code = other.code(), error = %other, "Authentication error");
            }
        }

        let mut builder = HttpResponse::build(self.status_code());
        if let Some(secs) = self.retry_after() {
            builder.insert_header((header::RETRY_AFTER, secs.to_string()));
        }
        builder.json(ResultEnvelope::<()>::from_error(self))
    }
}
