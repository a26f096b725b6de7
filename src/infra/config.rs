//! Runtime configuration loaded from environment variables.
//!
//! `from_env` reads the process environment (after `.env` is loaded by the
//! binary); `from_lookup` takes any key lookup so tests never touch the
//! process environment.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::domain::ConfigError;
use crate::infra::observability::LogFormat;

/// Deployment environment. Controls whether error detail reaches clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::InvalidValue {
                key: "APP_ENV".to_string(),
                message: format!("expected 'development' or 'production', got '{other}'"),
            }),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// Per-client-IP request quotas.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per second for API endpoints
    pub general_rps: u32,
    /// Burst size for API endpoints
    pub general_burst: u32,
    /// Requests per second for health endpoints
    pub health_rps: u32,
    /// Burst size for health endpoints
    pub health_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_rps: 10,
            general_burst: 20,
            health_rps: 100,
            health_burst: 100,
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub context_broker_url: String,
    pub agent_service_url: String,
    pub api_auth_key: SecretString,
    pub request_timeout: Duration,
    pub upstream_timeout: Duration,
    /// `None` disables rate limiting.
    pub rate_limit: Option<RateLimitConfig>,
    /// Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let environment = get("APP_ENV")
            .map(|v| v.parse::<Environment>())
            .transpose()?
            .unwrap_or_default();

        let rate_limit_enabled = parse_or("RATE_LIMIT_ENABLED", get("RATE_LIMIT_ENABLED"), true)?;
        let rate_limit = if rate_limit_enabled {
            let defaults = RateLimitConfig::default();
            Some(RateLimitConfig {
                general_rps: parse_or("RATE_LIMIT_RPS", get("RATE_LIMIT_RPS"), defaults.general_rps)?,
                general_burst: parse_or(
                    "RATE_LIMIT_BURST",
                    get("RATE_LIMIT_BURST"),
                    defaults.general_burst,
                )?,
                ..defaults
            })
        } else {
            None
        };

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            environment,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", get("PORT"), 3000)?,
            context_broker_url: require_url("CONTEXT_BROKER_URL", require("CONTEXT_BROKER_URL")?)?,
            agent_service_url: require_url("AGENT_SERVICE_URL", require("AGENT_SERVICE_URL")?)?,
            api_auth_key: SecretString::from(require("API_AUTH_KEY")?),
            request_timeout: Duration::from_secs(parse_or(
                "REQUEST_TIMEOUT_SECS",
                get("REQUEST_TIMEOUT_SECS"),
                30,
            )?),
            upstream_timeout: Duration::from_secs(parse_or(
                "UPSTREAM_TIMEOUT_SECS",
                get("UPSTREAM_TIMEOUT_SECS"),
                10,
            )?),
            rate_limit,
            cors_allowed_origins,
            log_format: get("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
        })
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(default),
    }
}

fn require_url(key: &str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected an http(s) URL, got '{value}'"),
        })
    }
}
