/// Payload validators - guard token issuance against unusable identities
/// Features:
/// 1. Empty identity rejection
/// 2. DoS Protection: identity length limit
/// 3. Control character rejection in identities and roles

use std::collections::BTreeSet;

use crate::error::AuthError;

pub const MAX_USER_ID_LENGTH: usize = 256;
pub const MAX_ROLE_LENGTH: usize = 64;

/// Validates a user identifier
/// - Trims surrounding whitespace
/// - Rejects empty and overly long identifiers
/// - Rejects control characters
pub fn validate_user_id(user_id: &str) -> Result<String, AuthError> {
    let trimmed = user_id.trim();

    if trimmed.is_empty() {
        return Err(AuthError::InvalidPayload("user_id is empty".to_string()));
    }

    if trimmed.len() > MAX_USER_ID_LENGTH {
        return Err(AuthError::InvalidPayload(format!(
            "user_id is too long (maximum {} bytes)",
            MAX_USER_ID_LENGTH
        )));
    }

    if trimmed.chars().any(char::is_control) {
        return Err(AuthError::InvalidPayload(
            "user_id contains control characters".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

/// Validates role names: non-empty, bounded, no whitespace or control characters
pub fn validate_roles(roles: &BTreeSet<String>) -> Result<(), AuthError> {
    for role in roles {
        if role.is_empty() {
            return Err(AuthError::InvalidPayload("role is empty".to_string()));
        }
        if role.len() > MAX_ROLE_LENGTH {
            return Err(AuthError::InvalidPayload(format!(
                "role is too long (maximum {} bytes)",
                MAX_ROLE_LENGTH
            )));
        }
        if role.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(AuthError::InvalidPayload(format!(
                "role '{}' has invalid format",
                role.escape_debug()
            )));
        }
    }
    Ok(())
}
