/// Authentication module
///
/// Handles token pair issuance/validation, refresh token rotation,
/// and the state and clock the authority depends on.

mod authority;
mod claims;
mod clock;
mod jwt;
mod store;

pub use authority::{TokenAuthority, TokenPair, ISSUE_ENDPOINT};
pub use claims::{AuthPayload, TokenClaims, TokenKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use jwt::{DecodeFailure, TokenCodec};
pub use store::{ConsumeOutcome, InMemoryTokenStore, TokenStore};
