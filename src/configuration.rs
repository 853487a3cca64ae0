use config::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub auth: AuthSettings,
    pub csrf: CsrfSettings,
    pub cookies: CookieSettings,
    pub rate_limits: RateLimitSettings,
    pub password: PasswordSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

/// Token signing settings.
///
/// Access and refresh tokens are signed with *different* secrets so that a
/// leaked access secret cannot be used to mint refresh tokens.
#[derive(serde::Deserialize, Clone)]
pub struct AuthSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_token_expiry: i64,  // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64, // seconds (e.g., 604800 for 7 days)
    pub issuer: String,
    pub audience: String,
}

#[derive(serde::Deserialize, Clone)]
pub struct CsrfSettings {
    pub secret: String,
    pub max_age_ms: u64, // default 3_600_000 (1 hour)
}

#[derive(serde::Deserialize, Clone)]
pub struct CookieSettings {
    /// Secure attribute on auth cookies. Must be true in production.
    pub secure: bool,
}

#[derive(serde::Deserialize, Clone)]
pub struct RateLimitSettings {
    pub login: PolicySettings,
    pub api: PolicySettings,
    pub password_reset: PolicySettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct PolicySettings {
    pub points: u32,
    pub window_seconds: u64,
    pub block_seconds: Option<u64>,
}

#[derive(serde::Deserialize, Clone)]
pub struct PasswordSettings {
    pub min_length: usize,
    pub hash_cost: u32,
}

impl Settings {
    /// Validate settings that must be correct before the server starts.
    ///
    /// Signing secrets are load-bearing: a missing secret would make every
    /// token forgeable, and sharing one secret across both token kinds would
    /// turn a leaked access secret into a refresh-token minting key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.access_secret.trim().is_empty() {
            return Err(ConfigError::Message(
                "auth.access_secret must be set".to_string(),
            ));
        }
        if self.auth.refresh_secret.trim().is_empty() {
            return Err(ConfigError::Message(
                "auth.refresh_secret must be set".to_string(),
            ));
        }
        if self.auth.access_secret == self.auth.refresh_secret {
            return Err(ConfigError::Message(
                "auth.access_secret and auth.refresh_secret must differ".to_string(),
            ));
        }
        if self.csrf.secret.trim().is_empty() {
            return Err(ConfigError::Message("csrf.secret must be set".to_string()));
        }
        if self.auth.access_token_expiry <= 0 || self.auth.refresh_token_expiry <= 0 {
            return Err(ConfigError::Message(
                "token expiries must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load settings from an optional `configuration` file, overridden by
/// environment variables (`APP__AUTH__ACCESS_SECRET` and friends), on top of
/// built-in defaults for everything that is not a secret.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8080)?
        .set_default("auth.access_secret", "")?
        .set_default("auth.refresh_secret", "")?
        .set_default("auth.access_token_expiry", 900)?
        .set_default("auth.refresh_token_expiry", 604_800)?
        .set_default("auth.issuer", "taskforge")?
        .set_default("auth.audience", "taskforge-api")?
        .set_default("csrf.secret", "")?
        .set_default("csrf.max_age_ms", 3_600_000)?
        .set_default("cookies.secure", true)?
        .set_default("rate_limits.login.points", 5)?
        .set_default("rate_limits.login.window_seconds", 60)?
        .set_default("rate_limits.login.block_seconds", 300)?
        .set_default("rate_limits.api.points", 100)?
        .set_default("rate_limits.api.window_seconds", 60)?
        .set_default("rate_limits.password_reset.points", 3)?
        .set_default("rate_limits.password_reset.window_seconds", 3600)?
        .set_default("password.min_length", 8)?
        .set_default("password.hash_cost", 12)?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;
    settings.try_deserialize::<Settings>()
}
