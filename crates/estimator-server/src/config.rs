use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 100;
/// 100kb, the usual default of JSON and form body parsers.
pub const DEFAULT_BODY_LIMIT: usize = 100 * 1024;

/// Fixed-window rate limit applied per client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_RATE_LIMIT_WINDOW,
            max: DEFAULT_RATE_LIMIT_MAX,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Deployment environment name, reported by `GET /`.
    pub environment: String,
    pub port: u16,
    pub rate_limit: RateLimitConfig,
    /// Maximum accepted request body size in bytes.
    pub body_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            port: DEFAULT_PORT,
            rate_limit: RateLimitConfig::default(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Config {
    /// Read configuration from environment variables.
    ///
    /// - `NODE_ENV` (optional, defaults to `development`)
    /// - `PORT` (optional, defaults to 3000)
    /// - `RATE_LIMIT_WINDOW_MS` (optional, defaults to 900000)
    /// - `RATE_LIMIT_MAX` (optional, defaults to 100)
    /// - `BODY_LIMIT_BYTES` (optional, defaults to 102400)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same resolution as [`Config::from_env`], over an arbitrary lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = var("NODE_ENV")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let port = parse_var(&var, "PORT", DEFAULT_PORT)?;

        let window_ms: u64 = parse_positive(
            &var,
            "RATE_LIMIT_WINDOW_MS",
            DEFAULT_RATE_LIMIT_WINDOW.as_millis() as u64,
        )?;
        let max = parse_positive(&var, "RATE_LIMIT_MAX", DEFAULT_RATE_LIMIT_MAX)?;
        let body_limit = parse_positive(&var, "BODY_LIMIT_BYTES", DEFAULT_BODY_LIMIT)?;

        Ok(Self {
            environment,
            port,
            rate_limit: RateLimitConfig {
                window: Duration::from_millis(window_ms),
                max,
            },
            body_limit,
        })
    }
}

fn parse_var<F, T>(var: &F, name: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigError(format!("Invalid {name} '{raw}': must be an integer"))
        }),
    }
}

fn parse_positive<F, T>(var: &F, name: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Default + PartialEq,
{
    let value = parse_var(var, name, default)?;
    if value == T::default() {
        return Err(AppError::ConfigError(format!("{name} must be at least 1")));
    }
    Ok(value)
}
