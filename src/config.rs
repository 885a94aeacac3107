use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;
use validator::{Validate, ValidationError};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "egp";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    if secret.chars().all(|c| c == secret.chars().next().unwrap_or(' ')) {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some("JWT secret must not be a repeated single character".into());
        return Err(err);
    }
    Ok(())
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment ("development", "production", ...)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// JWT signing secret (minimum 64 characters)
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// Base URL of the remote payment provider API
    #[serde(default = "default_payment_api_base")]
    pub payment_api_base: String,

    /// Secret API key for the payment provider
    pub payment_secret_key: String,

    /// Shared secret used to verify inbound payment webhooks
    pub payment_webhook_secret: String,

    /// Allowed clock skew for webhook signature timestamps, in seconds
    #[serde(default = "default_webhook_tolerance")]
    pub payment_webhook_tolerance_secs: u64,

    /// ISO currency code charges are denominated in
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_jwt_expiration() -> u64 {
    3600
}
fn default_payment_api_base() -> String {
    "https://api.stripe.com/v1".to_string()
}
fn default_webhook_tolerance() -> u64 {
    DEFAULT_WEBHOOK_TOLERANCE_SECS
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Loads configuration from `config/default.toml`, an optional
/// per-environment file, and `APP__`-prefixed environment variables
/// (e.g. `APP__DATABASE_URL`). Later sources win.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("environment", environment.clone())?
        .add_source(File::from(Path::new(CONFIG_DIR).join("default.toml")).required(false))
        .add_source(
            File::from(Path::new(CONFIG_DIR).join(format!("{}.toml", environment)))
                .required(false),
        )
        .add_source(Environment::with_prefix("APP").separator("__"));

    // Development gets a usable JWT secret out of the box; production must set one.
    if environment.eq_ignore_ascii_case(DEFAULT_ENV) {
        builder = builder.set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?;
    }

    let cfg: AppConfig = builder.build()?.try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    info!(
        environment = %cfg.environment,
        port = cfg.port,
        "configuration loaded"
    );

    Ok(cfg)
}

/// Initializes the global tracing subscriber.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}
