use config::ConfigError;
use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    pub password: PasswordSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_seconds: u64,
    /// Adds the `Secure` attribute to the refresh cookie
    pub secure_cookies: bool,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub max_connections: u32,
    /// Upper bound for every store call issued by the auth engine
    pub timeout_milliseconds: u64,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_milliseconds)
    }
}

/// When the refresh token presented to the middleware gets replaced
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationPolicy {
    /// Rotate only once the stored token is inside the rotation window
    #[default]
    OnExpiry,
    /// Rotate on every exchange
    EveryUse,
}

/// Longest accepted access token lifetime: one day
pub const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 24 * 60;
/// Longest accepted refresh token lifetime: one year
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;

/// Token lifetimes, signing secret and rotation behaviour
#[derive(Deserialize, Clone, Debug)]
pub struct JwtSettings {
    pub access_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub refresh_token_length: usize,
    pub rotation: RotationPolicy,
    pub rotation_window_hours: i64,
}

impl JwtSettings {
    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_ttl_minutes)
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_ttl_days)
    }

    pub fn rotation_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.rotation_window_hours)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.access_secret.trim().is_empty() {
            return Err(ConfigError::Message("jwt.access_secret must not be empty".into()));
        }
        if self.access_token_ttl_minutes <= 0 || self.refresh_token_ttl_days <= 0 {
            return Err(ConfigError::Message("jwt token lifetimes must be positive".into()));
        }
        if self.access_token_ttl_minutes > MAX_ACCESS_TOKEN_TTL_MINUTES {
            return Err(ConfigError::Message(format!(
                "jwt.access_token_ttl_minutes must be at most {}",
                MAX_ACCESS_TOKEN_TTL_MINUTES
            )));
        }
        if self.refresh_token_ttl_days > MAX_REFRESH_TOKEN_TTL_DAYS {
            return Err(ConfigError::Message(format!(
                "jwt.refresh_token_ttl_days must be at most {}",
                MAX_REFRESH_TOKEN_TTL_DAYS
            )));
        }
        if self.refresh_token_length == 0 {
            return Err(ConfigError::Message("jwt.refresh_token_length must be positive".into()));
        }
        if self.rotation_window_hours < 0 {
            return Err(ConfigError::Message("jwt.rotation_window_hours must not be negative".into()));
        }
        // A window covering the whole lifetime would rotate on every exchange
        if self.rotation_window_hours >= self.refresh_token_ttl_days * 24 {
            return Err(ConfigError::Message(
                "jwt.rotation_window_hours must be shorter than the refresh token lifetime".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct PasswordSettings {
    pub bcrypt_cost: u32,
}

/// Load settings from defaults, the optional `configuration` file and
/// `APP__`-prefixed environment variables, in increasing priority.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8000)?
        .set_default("application.shutdown_timeout_seconds", 5)?
        .set_default("application.secure_cookies", false)?
        .set_default("database.max_connections", 10)?
        .set_default("database.timeout_milliseconds", 3000)?
        .set_default("jwt.access_token_ttl_minutes", 15)?
        .set_default("jwt.refresh_token_ttl_days", 7)?
        .set_default("jwt.refresh_token_length", 32)?
        .set_default("jwt.rotation", "on_expiry")?
        .set_default("jwt.rotation_window_hours", 24)?
        .set_default("password.bcrypt_cost", i64::from(bcrypt::DEFAULT_COST))?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.jwt.validate()?;
    if settings.database.timeout_milliseconds == 0 {
        return Err(ConfigError::Message("database.timeout_milliseconds must be positive".into()));
    }
    Ok(settings)
}
