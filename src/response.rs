/// JSON result envelope
///
/// Serializes an `AuthResult<T>` as
/// `{ "success": true, "data": ... }` or
/// `{ "success": false, "error": { "code", "message", "retry_after" } }`
/// so handlers switch on the error code rather than on Rust types.

use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::error::{AuthError, AuthResult};

/// Error body carried by a failed envelope
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<&AuthError> for ErrorBody {
    fn from(err: &AuthError) -> Self {
        let message = match err {
            // Signing details stay in the logs
            AuthError::TokenEncoding(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        Self {
            code: err.code().to_string(),
            message,
            retry_after: err.retry_after(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> ResultEnvelope<T> {
    pub fn from_data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn from_error(err: &AuthError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody::from(err)),
        }
    }
}

impl<T> From<AuthResult<T>> for ResultEnvelope<T> {
    fn from(result: AuthResult<T>) -> Self {
        match result {
            Ok(data) => Self::from_data(data),
            Err(err) => Self::from_error(&err),
        }
    }
}

/// Render an authority result as an HTTP response (200 on success)
pub fn into_http_response<T: Serialize>(result: AuthResult<T>) -> HttpResponse {
    match result {
        Ok(data) => HttpResponse::Ok().json(ResultEnvelope::from_data(data)),
        Err(err) => err.error_response(),
    }
}
