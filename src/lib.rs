pub mod audit;
pub mod auth;
pub mod configuration;
pub mod error;
pub mod rate_limit;
pub mod response;
pub mod telemetry;
pub mod validators;

pub use auth::{AuthPayload, TokenAuthority, TokenPair};
pub use error::{AuthError, AuthResult};
