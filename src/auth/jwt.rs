/// JWT Token Encoding and Decoding
///
/// HS256-signed compact tokens. Expiry is not checked here:
/// the authority compares `exp` against its injected clock.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{TokenClaims, TokenKind};
use crate::error::AuthError;

/// Why a token failed to decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Bad format, bad signature, or wrong issuer
    Rejected(String),
    WrongKind { expected: TokenKind, found: TokenKind },
}

pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl TokenCodec {
    pub fn new(secret: &[u8], issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Verify issuer matches configuration
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer: issuer.to_string(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign claims into a compact token
    ///
    /// # Errors
    /// Returns error if the claims cannot be serialized or signed
    pub fn encode(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenEncoding(e.to_string()))
    }

    /// Verify signature and issuer, then check the token kind
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, DecodeFailure> {
        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| DecodeFailure::Rejected(e.to_string()))?;

        if claims.typ != expected {
            return Err(DecodeFailure::WrongKind {
                expected,
                found: claims.typ,
            });
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::AuthPayload;

    const SECRET: &[u8] = b"test-secret-key-at-least-32-characters-long";

    fn access_claims() -> TokenClaims {
        let payload = AuthPayload::new("user-1", ["admin"]).with_issued_at(1_000);
        TokenClaims::new(&payload, TokenKind::Access, 1_000, 900, "test")
    }

    #[test]
    fn test_encode_and_decode_token() {
        let codec = TokenCodec::new(SECRET, "test");
        let claims = access_claims();

        let token = codec.encode(&claims).expect("Failed to encode token");
        let decoded = codec
            .decode(&token, TokenKind::Access)
            .expect("Failed to decode token");

        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_expired_claims_still_decode() {
        // 1_900 is long past; expiry is the caller's job
        let codec = TokenCodec::new(SECRET, "test");
        let token = codec.encode(&access_claims()).unwrap();

        assert!(codec.decode(&token, TokenKind::Access).is_ok());
    }

    #[test]
    fn test_invalid_token() {
        let codec = TokenCodec::new(SECRET, "test");

        assert!(matches!(
            codec.decode("invalid.token", TokenKind::Access),
            Err(DecodeFailure::Rejected(_))
        ));
        assert!(codec.decode("", TokenKind::Access).is_err());
    }

    #[test]
    fn test_tampered_token() {
        let codec = TokenCodec::new(SECRET, "test");
        let token = codec.encode(&access_claims()).unwrap();

        // Tamper with token
        let tampered = format!("{}X", token);
        assert!(codec.decode(&tampered, TokenKind::Access).is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let token = TokenCodec::new(SECRET, "test").encode(&access_claims()).unwrap();
        let other = TokenCodec::new(b"another-secret-key-at-least-32-characters", "test");

        assert!(other.decode(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let token = TokenCodec::new(SECRET, "test").encode(&access_claims()).unwrap();
        let codec = TokenCodec::new(SECRET, "wrong-issuer");

        assert!(codec.decode(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn test_wrong_kind() {
        let codec = TokenCodec::new(SECRET, "test");
        let token = codec.encode(&access_claims()).unwrap();

        assert_eq!(
            codec.decode(&token, TokenKind::Refresh),
            Err(DecodeFailure::WrongKind {
                expected: TokenKind::Refresh,
                found: TokenKind::Access,
            })
        );
    }
}
