//! Layered application settings.
//!
//! Sources, lowest precedence first: the built-in [`Default`], then
//! `config/default.toml`, then `config/{RUN_ENV}.toml`, then `APP__*`
//! environment variables. The merged result is checked field by field with
//! `validator` and then for cross-field consistency.

use config::{Config, ConfigError, Environment, File};
use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde::Deserialize;
use std::{env, path::Path, time::Duration};
use thiserror::Error;
use tracing::{error, info, Level};
use validator::{Validate, ValidationError, ValidationErrors};

const CONFIG_DIR: &str = "config";
const DEFAULT_ENV: &str = "development";

/// Secret shipped in `config/default.toml`; refused outside development.
pub const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// `postgres://…` in production, `sqlite://…` for local runs and tests
    #[validate(length(min = 1))]
    pub database_url: String,

    #[validate(length(min = 64, message = "JWT secret must be at least 64 characters"))]
    pub jwt_secret: String,
    /// Token lifetime in seconds
    #[validate(range(min = 60, max = 86400))]
    pub jwt_expiration: usize,
    pub auth_issuer: String,
    pub auth_audience: String,

    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    pub environment: String,

    #[validate(custom = "validate_log_level")]
    pub log_level: String,
    pub log_json: bool,

    pub auto_migrate: bool,

    /// Comma-separated allow-list; empty means permissive
    pub cors_allowed_origins: Option<String>,
    pub cors_allow_any_origin: bool,

    #[validate(range(min = 1))]
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_connect_timeout_secs: u64,
    pub db_idle_timeout_secs: u64,
    pub db_acquire_timeout_secs: u64,

    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Added on top of unit prices for display: 0.3 is +30%
    #[validate(range(min = 0.0, max = 1.0))]
    pub tax_rate: f64,

    #[validate(range(min = 1, max = 1000))]
    pub api_default_page_size: u64,
    #[validate(range(min = 1, max = 1000))]
    pub api_max_page_size: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: String::new(),
            jwt_expiration: 3600,
            auth_issuer: "storefront-api".to_string(),
            auth_audience: "storefront-clients".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: DEFAULT_ENV.to_string(),
            log_level: "info".to_string(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: 10,
            db_min_connections: 1,
            db_connect_timeout_secs: 30,
            db_idle_timeout_secs: 600,
            db_acquire_timeout_secs: 30,
            request_timeout_secs: 30,
            tax_rate: 0.3,
            api_default_page_size: 10,
            api_max_page_size: 100,
        }
    }
}

impl AppConfig {
    /// Settings for the given essentials, everything else at its default.
    pub fn new(
        database_url: String,
        jwt_secret: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            host,
            port,
            environment,
            ..Self::default()
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(DEFAULT_ENV)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The display tax rate in exact decimal form.
    pub fn tax_rate(&self) -> Decimal {
        Decimal::from_f64(self.tax_rate).unwrap_or_default()
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Rules spanning more than one field.
    fn check_consistency(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut reject = |field: &'static str, code: &'static str, message: &'static str| {
            let mut err = ValidationError::new(code);
            err.message = Some(message.into());
            errors.add(field, err);
        };

        let permissive_ok = self.is_development() || self.cors_allow_any_origin;
        if !permissive_ok && self.cors_origins().is_empty() {
            reject(
                "cors_allowed_origins",
                "cors_origins_required",
                "Set APP__CORS_ALLOWED_ORIGINS outside development or opt in via APP__CORS_ALLOW_ANY_ORIGIN=true",
            );
        }
        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            reject(
                "jwt_secret",
                "dev_secret_outside_development",
                "The development JWT secret must not be used outside development",
            );
        }
        if self.api_default_page_size > self.api_max_page_size {
            reject(
                "api_default_page_size",
                "page_size_bounds",
                "Default page size cannot exceed the maximum page size",
            );
        }
        if self.db_min_connections > self.db_max_connections {
            reject(
                "db_min_connections",
                "db_pool_bounds",
                "db_min_connections cannot exceed db_max_connections",
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    level
        .parse::<Level>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("log_level"))
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Installs the global `tracing` subscriber. A non-empty `RUST_LOG` takes
/// precedence over `level`.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = env::var("RUST_LOG")
        .ok()
        .filter(|directive| !directive.trim().is_empty())
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(format!("storefront_api={level},tower_http=debug")));

    let builder = fmt().with_env_filter(filter);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    if !Path::new(CONFIG_DIR).is_dir() {
        info!(dir = CONFIG_DIR, "No config directory; using defaults and APP__* variables");
    }

    let layered = Config::builder()
        .set_default("environment", run_env.as_str())?
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if layered.get_string("jwt_secret").is_err() {
        error!("APP__JWT_SECRET is not set");
        return Err(ConfigError::NotFound("jwt_secret".into()).into());
    }

    let settings: AppConfig = layered.try_deserialize()?;
    settings
        .validate()
        .and_then(|_| settings.check_consistency())
        .map_err(|errors| {
            error!(%errors, "Rejected configuration");
            AppConfigError::Validation(errors)
        })?;

    info!(environment = %settings.environment, "Configuration loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn production() -> AppConfig {
        AppConfig {
            cors_allowed_origins: Some("https://shop.example.com".into()),
            ..AppConfig::new(
                "postgres://shop@db/storefront".into(),
                "x".repeat(64),
                "0.0.0.0".into(),
                8080,
                "production".into(),
            )
        }
    }

    #[test]
    fn production_settings_are_accepted() {
        let cfg = production();
        assert!(cfg.validate().is_ok());
        assert!(cfg.check_consistency().is_ok());
    }

    #[test]
    fn field_rules_catch_bad_values() {
        let mut cfg = production();
        cfg.jwt_secret = "short".into();
        cfg.tax_rate = 1.5;
        cfg.log_level = "loud".into();

        let errors = cfg.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("jwt_secret"));
        assert!(fields.contains_key("tax_rate"));
        assert!(fields.contains_key("log_level"));
    }

    #[test]
    fn tax_rate_is_exact_decimal() {
        assert_eq!(production().tax_rate(), dec!(0.3));
    }

    #[test]
    fn blank_cors_entries_are_dropped() {
        let mut cfg = production();
        cfg.cors_allowed_origins = Some(" https://a.example, ,https://b.example ".into());
        assert_eq!(cfg.cors_origins(), vec!["https://a.example", "https://b.example"]);

        cfg.cors_allowed_origins = Some(" , ".into());
        let errors = cfg.check_consistency().unwrap_err();
        assert!(errors.field_errors().contains_key("cors_allowed_origins"));
    }

    #[test]
    fn dev_secret_only_in_development() {
        let mut cfg = production();
        cfg.jwt_secret = DEV_DEFAULT_JWT_SECRET.into();
        assert!(cfg.check_consistency().is_err());

        cfg.environment = "development".into();
        assert!(cfg.check_consistency().is_ok());
    }

    #[test]
    fn page_and_pool_bounds_must_be_ordered() {
        let mut cfg = production();
        cfg.api_default_page_size = 50;
        cfg.api_max_page_size = 20;
        cfg.db_min_connections = 5;
        cfg.db_max_connections = 2;

        let errors = cfg.check_consistency().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("api_default_page_size"));
        assert!(fields.contains_key("db_min_connections"));
    }
}
