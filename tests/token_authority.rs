//! Integration tests for the token authority public API

use std::sync::{Arc, Barrier};
use std::thread;

use token_authority::auth::{InMemoryTokenStore, ManualClock, ISSUE_ENDPOINT};
use token_authority::audit::NoopAuditSink;
use token_authority::configuration::AuthoritySettings;
use token_authority::rate_limit::RateLimitKey;
use token_authority::response::ResultEnvelope;
use token_authority::{AuthError, AuthPayload, TokenAuthority};

const START: i64 = 1_700_000_000;
const RATE_LIMIT: u32 = 5;

struct TestAuthority {
    authority: Arc<TokenAuthority>,
    clock: Arc<ManualClock>,
    store: Arc<InMemoryTokenStore>,
}

fn test_settings() -> AuthoritySettings {
    let mut settings =
        AuthoritySettings::with_secret("integration-secret-key-at-least-32-bytes");
    settings.rate_limit = RATE_LIMIT;
    settings.window_seconds = 60;
    settings
}

fn spawn_authority() -> TestAuthority {
    spawn_authority_with(test_settings())
}

fn spawn_authority_with(settings: AuthoritySettings) -> TestAuthority {
    let clock = Arc::new(ManualClock::new(START));
    let store = Arc::new(InMemoryTokenStore::new());
    let authority = TokenAuthority::new(settings)
        .expect("Failed to build authority")
        .with_clock(clock.clone())
        .with_store(store.clone())
        .with_audit_sink(Arc::new(NoopAuditSink));

    TestAuthority {
        authority: Arc::new(authority),
        clock,
        store,
    }
}

fn payload(user_id: &str) -> AuthPayload {
    AuthPayload::new(user_id, ["uploader"])
}

// --- Issuance ---

#[test]
fn generate_token_pair_returns_distinct_non_empty_tokens() {
    let app = spawn_authority();

    for user_id in ["user-1", "a", "6f1c1a8e-2d7b-4c3e-9f00-1b2c3d4e5f60", "josé@example.com"] {
        let pair = app
            .authority
            .generate_token_pair(&payload(user_id))
            .expect("Failed to issue token pair");

        assert!(!pair.access_token.is_empty());
        assert!(!pair.refresh_token.is_empty());
        assert_ne!(pair.access_token, pair.refresh_token);
    }
}

#[test]
fn generate_token_pair_rejects_empty_user_id() {
    let app = spawn_authority();

    let result = app.authority.generate_token_pair(&payload(""));

    assert!(matches!(result, Err(AuthError::InvalidPayload(_))));
}

// --- Validation ---

#[test]
fn access_token_round_trips_to_payload() {
    let app = spawn_authority();
    let original = AuthPayload::new("user-1", ["admin", "uploader"]).with_issued_at(START - 5);

    let pair = app.authority.generate_token_pair(&original).unwrap();
    let decoded = app
        .authority
        .validate_token(&pair.access_token)
        .expect("Failed to validate token");

    assert_eq!(decoded.user_id, "user-1");
    assert_eq!(decoded, original);
}

#[test]
fn validate_token_rejects_malformed_token() {
    let app = spawn_authority();

    assert_eq!(
        app.authority.validate_token("invalid.token"),
        Err(AuthError::InvalidToken)
    );
    assert_eq!(app.authority.validate_token(""), Err(AuthError::InvalidToken));
}

#[test]
fn validate_token_rejects_tampered_token() {
    let app = spawn_authority();
    let pair = app.authority.generate_token_pair(&payload("user-1")).unwrap();

    let parts: Vec<&str> = pair.access_token.split('.').collect();
    let forged_body: String = parts[1].chars().rev().collect();
    let forged = format!("{}.{}.{}", parts[0], forged_body, parts[2]);

    assert_eq!(
        app.authority.validate_token(&forged),
        Err(AuthError::InvalidToken)
    );
}

#[test]
fn validate_token_rejects_tokens_from_another_secret() {
    let app = spawn_authority();
    let other = TokenAuthority::new(AuthoritySettings::with_secret(
        "a-different-secret-key-at-least-32-bytes",
    ))
    .unwrap();

    let pair = other.generate_token_pair(&payload("user-1")).unwrap();

    assert_eq!(
        app.authority.validate_token(&pair.access_token),
        Err(AuthError::InvalidToken)
    );
}

#[test]
fn validate_token_is_idempotent_until_expiry() {
    let app = spawn_authority();
    let pair = app.authority.generate_token_pair(&payload("user-1")).unwrap();

    let first = app.authority.validate_token(&pair.access_token).unwrap();
    app.clock.advance(120);
    let second = app.authority.validate_token(&pair.access_token).unwrap();
    assert_eq!(first, second);

    app.clock.advance(900);
    assert_eq!(
        app.authority.validate_token(&pair.access_token),
        Err(AuthError::InvalidToken)
    );
}

// --- Rate limiting ---

#[test]
fn issuance_beyond_rate_limit_is_rejected() {
    let app = spawn_authority();

    for _ in 0..RATE_LIMIT {
        assert!(app.authority.generate_token_pair(&payload("user-1")).is_ok());
    }

    app.clock.advance(20);
    assert_eq!(
        app.authority.generate_token_pair(&payload("user-1")),
        Err(AuthError::RateLimitExceeded {
            retry_after_secs: 40
        })
    );

    // Other identities keep their own budget
    assert!(app.authority.generate_token_pair(&payload("user-2")).is_ok());
}

#[test]
fn rate_limit_resets_after_window() {
    let app = spawn_authority();

    for _ in 0..RATE_LIMIT {
        app.authority.generate_token_pair(&payload("user-1")).unwrap();
    }
    assert!(app.authority.generate_token_pair(&payload("user-1")).is_err());

    app.clock.advance(60);
    assert!(app.authority.generate_token_pair(&payload("user-1")).is_ok());

    let entry = app
        .store
        .rate_limits()
        .entry(&RateLimitKey::new("user-1", ISSUE_ENDPOINT))
        .unwrap();
    assert_eq!(entry.count, 1);
    assert_eq!(entry.window_start, START + 60);
}

#[test]
fn concurrent_issuance_never_exceeds_rate_limit() {
    let app = spawn_authority();
    let threads = 32;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let authority = Arc::clone(&app.authority);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                authority.generate_token_pair(&payload("busy-user"))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let issued = results.iter().filter(|r| r.is_ok()).count();
    let limited = results
        .iter()
        .filter(|r| matches!(r, Err(AuthError::RateLimitExceeded { .. })))
        .count();

    assert_eq!(issued, RATE_LIMIT as usize);
    assert_eq!(limited, threads - RATE_LIMIT as usize);
}

// --- Rotation ---

#[test]
fn rotate_refresh_token_is_single_use() {
    let app = spawn_authority();
    let pair = app.authority.generate_token_pair(&payload("user-1")).unwrap();

    let rotated = app
        .authority
        .rotate_refresh_token(&pair.refresh_token)
        .expect("Failed to rotate refresh token");

    assert_ne!(rotated, pair);
    assert_ne!(rotated.access_token, pair.access_token);
    assert_ne!(rotated.refresh_token, pair.refresh_token);

    assert_eq!(
        app.authority.rotate_refresh_token(&pair.refresh_token),
        Err(AuthError::InvalidRefreshToken)
    );

    // The replacement is still good
    assert!(app.authority.rotate_refresh_token(&rotated.refresh_token).is_ok());
}

#[test]
fn rotate_refresh_token_rejects_malformed_token() {
    let app = spawn_authority();

    assert_eq!(
        app.authority.rotate_refresh_token("invalid.token"),
        Err(AuthError::InvalidRefreshToken)
    );
}

#[test]
fn rotate_refresh_token_rejects_tampered_token() {
    let app = spawn_authority();
    let pair = app.authority.generate_token_pair(&payload("user-1")).unwrap();

    let parts: Vec<&str> = pair.refresh_token.split('.').collect();
    let forged_body: String = parts[1].chars().rev().collect();
    let forged = format!("{}.{}.{}", parts[0], forged_body, parts[2]);

    assert_eq!(
        app.authority.rotate_refresh_token(&forged),
        Err(AuthError::InvalidRefreshToken)
    );
    // The genuine token was not spent by the forged attempt
    assert!(app.authority.rotate_refresh_token(&pair.refresh_token).is_ok());
}

#[test]
fn rotate_refresh_token_rejects_tokens_from_another_secret() {
    let app = spawn_authority();
    let other = TokenAuthority::new(AuthoritySettings::with_secret(
        "a-different-secret-key-at-least-32-bytes",
    ))
    .unwrap();

    let pair = other.generate_token_pair(&payload("user-1")).unwrap();

    assert_eq!(
        app.authority.rotate_refresh_token(&pair.refresh_token),
        Err(AuthError::InvalidRefreshToken)
    );
    assert_eq!(app.store.consumed_count(), 0);
}

#[test]
fn concurrent_rotation_has_single_winner() {
    let app = spawn_authority();
    let pair = app.authority.generate_token_pair(&payload("user-1")).unwrap();
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let authority = Arc::clone(&app.authority);
            let barrier = Arc::clone(&barrier);
            let refresh_token = pair.refresh_token.clone();
            thread::spawn(move || {
                barrier.wait();
                authority.rotate_refresh_token(&refresh_token)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let rotated = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| **r == Err(AuthError::InvalidRefreshToken))
        .count();

    assert_eq!(rotated, 1);
    assert_eq!(rejected, threads - 1);
}

#[test]
fn concurrent_rotation_charges_only_the_winner() {
    let mut settings = test_settings();
    settings.rate_limit = 32;
    settings.rotation_consumes_rate_limit = true;
    let app = spawn_authority_with(settings);
    let pair = app.authority.generate_token_pair(&payload("user-1")).unwrap();
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let authority = Arc::clone(&app.authority);
            let barrier = Arc::clone(&barrier);
            let refresh_token = pair.refresh_token.clone();
            thread::spawn(move || {
                barrier.wait();
                authority.rotate_refresh_token(&refresh_token)
            })
        })
        .collect();

    let rotated = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|r| r.is_ok())
        .count();
    let entry = app
        .store
        .rate_limits()
        .entry(&RateLimitKey::new("user-1", ISSUE_ENDPOINT))
        .unwrap();

    assert_eq!(rotated, 1);
    // One issuance plus one successful rotation
    assert_eq!(entry.count, 2);
}

// --- Envelope ---

#[test]
fn results_serialize_to_success_envelope() {
    let app = spawn_authority();

    let ok = ResultEnvelope::from(app.authority.generate_token_pair(&payload("user-1")));
    let value = serde_json::to_value(&ok).unwrap();
    assert_eq!(value["success"], serde_json::json!(true));
    assert!(value["data"]["access_token"].is_string());

    let err = ResultEnvelope::from(app.authority.validate_token("invalid.token"));
    let value = serde_json::to_value(&err).unwrap();
    assert_eq!(value["success"], serde_json::json!(false));
    assert_eq!(value["error"]["code"], serde_json::json!("TOKEN_INVALID"));
}
