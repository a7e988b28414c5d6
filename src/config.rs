use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CACHE_CAPACITY: usize = 10_000;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_FINANCIAL_SERVICE_URL: &str = "http://localhost:3005";
const DEFAULT_UPPF_SERVICE_URL: &str = "http://localhost:3008";
const DEFAULT_RISK_SERVICE_URL: &str = "http://localhost:3010";
const DEFAULT_CONTRACT_SERVICE_URL: &str = "http://localhost:3011";
const DEFAULT_CONFIGURATION_SERVICE_URL: &str = "http://localhost:3012";

/// Response cache configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Disable to forward every GET upstream
    #[serde(default = "default_true_bool")]
    pub enabled: bool,

    /// Maximum number of cached responses
    #[serde(default = "default_cache_capacity")]
    #[validate(range(min = 1))]
    pub capacity: usize,

    /// TTL for entries stored without an explicit one
    #[serde(default = "default_cache_ttl_secs")]
    #[validate(range(min = 1))]
    pub default_ttl_secs: u64,
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_cache_capacity(),
            default_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Base URLs of the microservices this gateway fronts
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    #[serde(default = "default_financial_service_url")]
    #[validate(custom = "validate_service_url")]
    pub financial_service_url: String,

    #[serde(default = "default_uppf_service_url")]
    #[validate(custom = "validate_service_url")]
    pub uppf_service_url: String,

    #[serde(default = "default_risk_service_url")]
    #[validate(custom = "validate_service_url")]
    pub risk_service_url: String,

    #[serde(default = "default_contract_service_url")]
    #[validate(custom = "validate_service_url")]
    pub contract_service_url: String,

    #[serde(default = "default_configuration_service_url")]
    #[validate(custom = "validate_service_url")]
    pub configuration_service_url: String,

    /// Per-request timeout applied to every upstream call
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            financial_service_url: default_financial_service_url(),
            uppf_service_url: default_uppf_service_url(),
            risk_service_url: default_risk_service_url(),
            contract_service_url: default_contract_service_url(),
            configuration_service_url: default_configuration_service_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    #[serde(default)]
    #[validate]
    pub cache: CacheConfig,

    #[serde(default)]
    #[validate]
    pub upstream: UpstreamConfig,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the bind address
    pub fn new(host: String, port: u16, environment: String) -> Self {
        Self {
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            cors_allowed_origins: None,
            cache: CacheConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_true_bool() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_financial_service_url() -> String {
    DEFAULT_FINANCIAL_SERVICE_URL.to_string()
}

fn default_uppf_service_url() -> String {
    DEFAULT_UPPF_SERVICE_URL.to_string()
}

fn default_risk_service_url() -> String {
    DEFAULT_RISK_SERVICE_URL.to_string()
}

fn default_contract_service_url() -> String {
    DEFAULT_CONTRACT_SERVICE_URL.to_string()
}

fn default_configuration_service_url() -> String {
    DEFAULT_CONFIGURATION_SERVICE_URL.to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Upstream base URLs must be absolute http(s) URLs
fn validate_service_url(value: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => {
            let mut err = ValidationError::new("service_url");
            err.message = Some(format!("Invalid upstream URL: {}", value).into());
            Err(err)
        }
    }
}

pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("omc_erp_gateway={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("host", DEFAULT_HOST)?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&config_path(config_dir, "default")).required(false))
        .add_source(File::with_name(&config_path(config_dir, &run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

fn config_path(config_dir: &Path, name: &str) -> String {
    config_dir.join(name).to_string_lossy().into_owned()
}
