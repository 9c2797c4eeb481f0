use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::integrations::crm::{CrmSettings, ResponseMode};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub portal: PortalConfig,
    pub crm: CrmSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&read_var("APP_ENV", "development"));

        let host = read_var("APP_HOST", "127.0.0.1");
        let port = read_var("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = read_var("APP_LOG_LEVEL", "info");

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            portal: PortalConfig::load()?,
            crm: load_crm_settings()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Limits and simulation knobs of the contract drafting workflow.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub max_persons: usize,
    pub max_territories: usize,
    pub usd_rate: f64,
    pub consent_latency: Duration,
    pub consent_decline_probability: f64,
    pub consent_file_max_bytes: u64,
    pub rng_seed: Option<u64>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            max_persons: 5,
            max_territories: 3,
            usd_rate: 475.50,
            consent_latency: Duration::from_millis(1500),
            consent_decline_probability: 0.0,
            consent_file_max_bytes: 5 * 1024 * 1024,
            rng_seed: None,
        }
    }
}

impl PortalConfig {
    fn load() -> Result<Self, ConfigError> {
        let max_persons = parse_limit("PORTAL_MAX_PERSONS", "5")?;
        let max_territories = parse_limit("PORTAL_MAX_TERRITORIES", "3")?;

        let usd_rate: f64 = parse_number("PORTAL_USD_RATE", "475.50")?;
        if !usd_rate.is_finite() || usd_rate <= 0.0 {
            return Err(ConfigError::InvalidNumber {
                key: "PORTAL_USD_RATE",
                value: usd_rate.to_string(),
            });
        }

        Ok(Self {
            max_persons,
            max_territories,
            usd_rate,
            consent_latency: Duration::from_millis(parse_number(
                "PORTAL_CONSENT_LATENCY_MS",
                "1500",
            )?),
            consent_decline_probability: parse_percent("PORTAL_CONSENT_DECLINE_PERCENT", "0")?,
            consent_file_max_bytes: parse_number("PORTAL_CONSENT_FILE_MAX_BYTES", "5242880")?,
            rng_seed: parse_optional_number("PORTAL_RNG_SEED")?,
        })
    }
}

fn load_crm_settings() -> Result<CrmSettings, ConfigError> {
    let raw_mode = read_var("CRM_MODE", "auto");
    let mode = ResponseMode::parse(&raw_mode)
        .ok_or(ConfigError::InvalidResponseMode { value: raw_mode })?;

    Ok(CrmSettings {
        mode,
        fail_reason: read_var("CRM_FAIL_REASON", "AML_HIT").trim().to_string(),
        latency_ms: parse_number("CRM_LATENCY_MS", "500")?,
        timeout_probability: parse_percent("CRM_TIMEOUT_PERCENT", "5")?,
        aml_enabled: parse_bool("CRM_AML_ENABLED", "true")?,
        aml_hit_probability: parse_percent("CRM_AML_HIT_PERCENT", "10")?,
        validation_error_probability: parse_percent("CRM_VALIDATION_ERROR_PERCENT", "5")?,
        deadline_ms: parse_optional_number("CRM_DEADLINE_MS")?,
    })
}

fn read_var(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_number<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = read_var(key, default);
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidNumber { key, value })
}

fn parse_optional_number<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        _ => Ok(None),
    }
}

fn parse_limit(key: &'static str, default: &str) -> Result<usize, ConfigError> {
    let limit: usize = parse_number(key, default)?;
    if limit == 0 {
        return Err(ConfigError::InvalidNumber {
            key,
            value: limit.to_string(),
        });
    }
    Ok(limit)
}

/// Reads a 0-100 percentage and returns it as a probability.
fn parse_percent(key: &'static str, default: &str) -> Result<f64, ConfigError> {
    let value = read_var(key, default);
    match value.trim().parse::<f64>() {
        Ok(percent) if (0.0..=100.0).contains(&percent) => Ok(percent / 100.0),
        _ => Err(ConfigError::InvalidPercent { key, value }),
    }
}

fn parse_bool(key: &'static str, default: &str) -> Result<bool, ConfigError> {
    let value = read_var(key, default);
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { key, value }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidPercent { key: &'static str, value: String },
    InvalidBool { key: &'static str, value: String },
    InvalidResponseMode { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a positive number, got '{value}'")
            }
            ConfigError::InvalidPercent { key, value } => {
                write!(f, "{key} must be a percentage between 0 and 100, got '{value}'")
            }
            ConfigError::InvalidBool { key, value } => {
                write!(f, "{key} must be true or false, got '{value}'")
            }
            ConfigError::InvalidResponseMode { value } => {
                write!(f, "CRM_MODE must be one of auto, ok, fail, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    const KEYS: &[&str] = &[
        "APP_ENV",
        "APP_HOST",
        "APP_PORT",
        "APP_LOG_LEVEL",
        "PORTAL_MAX_PERSONS",
        "PORTAL_MAX_TERRITORIES",
        "PORTAL_USD_RATE",
        "PORTAL_CONSENT_LATENCY_MS",
        "PORTAL_CONSENT_DECLINE_PERCENT",
        "PORTAL_CONSENT_FILE_MAX_BYTES",
        "PORTAL_RNG_SEED",
        "CRM_MODE",
        "CRM_FAIL_REASON",
        "CRM_LATENCY_MS",
        "CRM_TIMEOUT_PERCENT",
        "CRM_AML_ENABLED",
        "CRM_AML_HIT_PERCENT",
        "CRM_VALIDATION_ERROR_PERCENT",
        "CRM_DEADLINE_MS",
    ];

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.portal.max_persons, 5);
        assert_eq!(config.portal.max_territories, 3);
        assert!((config.portal.usd_rate - 475.50).abs() < f64::EPSILON);
        assert_eq!(config.portal.rng_seed, None);
        assert_eq!(config.crm.mode, ResponseMode::Automatic);
        assert_eq!(config.crm.fail_reason, "AML_HIT");
        assert!((config.crm.aml_hit_probability - 0.10).abs() < 1e-9);
        assert!((config.crm.validation_error_probability - 0.05).abs() < 1e-9);
        assert_eq!(config.crm.deadline_ms, None);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn crm_overrides_are_parsed() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CRM_MODE", "fail");
        env::set_var("CRM_FAIL_REASON", "SANCTION_MATCH");
        env::set_var("CRM_TIMEOUT_PERCENT", "0");
        env::set_var("CRM_AML_ENABLED", "off");
        env::set_var("CRM_DEADLINE_MS", "250");
        env::set_var("PORTAL_RNG_SEED", "42");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.crm.mode, ResponseMode::ForcedFailure);
        assert_eq!(config.crm.fail_reason, "SANCTION_MATCH");
        assert_eq!(config.crm.timeout_probability, 0.0);
        assert!(!config.crm.aml_enabled);
        assert_eq!(config.crm.deadline_ms, Some(250));
        assert_eq!(config.portal.rng_seed, Some(42));
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_percentages_and_zero_limits() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CRM_AML_HIT_PERCENT", "140");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidPercent {
                key: "CRM_AML_HIT_PERCENT",
                ..
            })
        ));

        reset_env();
        env::set_var("PORTAL_MAX_PERSONS", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidNumber {
                key: "PORTAL_MAX_PERSONS",
                ..
            })
        ));

        reset_env();
        env::set_var("CRM_MODE", "sometimes");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidResponseMode { .. })
        ));
        reset_env();
    }
}
