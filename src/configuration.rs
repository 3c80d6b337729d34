use crate::error::ConfigError;

/// Minimum HMAC secret length in bytes
pub const MIN_SECRET_LENGTH: usize = 32;
/// Upper bound for token lifetimes and the rate limit window (10 years)
pub const MAX_DURATION_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub authority: AuthoritySettings,
}

/// Token authority settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct AuthoritySettings {
    pub secret: String,
    pub issuer: String,
    pub access_token_expiry: i64,  // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64, // seconds (e.g., 604800 for 7 days)
    /// Issuance calls allowed per identity within one window
    pub rate_limit: u32,
    pub window_seconds: i64,
    #[serde(default)]
    pub rotation_consumes_rate_limit: bool,
}

impl AuthoritySettings {
    /// Settings with the stock lifetimes and limits for the given secret
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: "token-authority".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604_800,
            rate_limit: 10,
            window_seconds: 60,
            rotation_consumes_rate_limit: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::MissingRequired("authority.secret".to_string()));
        }
        if self.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "authority.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::MissingRequired("authority.issuer".to_string()));
        }
        if self.access_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "authority.access_token_expiry must be positive".to_string(),
            ));
        }
        if self.refresh_token_expiry > MAX_DURATION_SECONDS {
            return Err(ConfigError::InvalidValue(format!(
                "authority.refresh_token_expiry must not exceed {} seconds",
                MAX_DURATION_SECONDS
            )));
        }
        if self.refresh_token_expiry < self.access_token_expiry {
            return Err(ConfigError::InvalidValue(
                "authority.refresh_token_expiry must not be shorter than the access token expiry"
                    .to_string(),
            ));
        }
        if self.rate_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "authority.rate_limit must be positive".to_string(),
            ));
        }
        if self.window_seconds <= 0 {
            return Err(ConfigError::InvalidValue(
                "authority.window_seconds must be positive".to_string(),
            ));
        }
        if self.window_seconds > MAX_DURATION_SECONDS {
            return Err(ConfigError::InvalidValue(format!(
                "authority.window_seconds must not exceed {} seconds",
                MAX_DURATION_SECONDS
            )));
        }
        Ok(())
    }
}

/// Load settings from `configuration.{yaml,toml,json}` and `APP__*` variables
///
/// Everything except `authority.secret` has a default.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("authority.issuer", "token-authority")?
        .set_default("authority.access_token_expiry", 900)?
        .set_default("authority.refresh_token_expiry", 604_800)?
        .set_default("authority.rate_limit", 10)?
        .set_default("authority.window_seconds", 60)?
        .set_default("authority.rotation_consumes_rate_limit", false)?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.authority.validate()?;
    Ok(settings)
}
