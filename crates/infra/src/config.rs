//! Process configuration, read from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `BIND_ADDR` | `0.0.0.0:8080` |
//! | `JWT_SECRET` | insecure dev secret (logged as a warning) |
//! | `JWT_TTL_MINUTES` | `60` |
//! | `LOCKOUT_MAX_ATTEMPTS` | `3` |
//! | `LOCKOUT_DURATION_MINUTES` | `15` |
//! | `DATABASE_URL` | unset: in-memory store |
//! | `SEED_DEFAULT_USERS` | `true` |
//! | `ADMIN_PASSWORD` / `STAFF_PASSWORD` | dev defaults |

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;
use tracing::warn;

use ledgerbank_auth::LockoutPolicy;

pub const DEV_JWT_SECRET: &str = "ledgerbank-dev-secret";
pub const DEV_ADMIN_PASSWORD: &str = "admin123";
pub const DEV_STAFF_PASSWORD: &str = "staff123";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not valid: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Token and lockout settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub lockout: LockoutPolicy,
}

/// Startup data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedConfig {
    pub default_users: bool,
    pub admin_password: String,
    pub staff_password: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            default_users: true,
            admin_password: DEV_ADMIN_PASSWORD.to_string(),
            staff_password: DEV_STAFF_PASSWORD.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub security: SecurityConfig,
    pub seed: SeedConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("BIND_ADDR", &raw, e))?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let token_ttl = minutes(get("JWT_TTL_MINUTES"), "JWT_TTL_MINUTES", 60)?;
        let max_attempts = positive(get("LOCKOUT_MAX_ATTEMPTS"), "LOCKOUT_MAX_ATTEMPTS", 3)?;
        let max_attempts = u32::try_from(max_attempts).map_err(|e| {
            ConfigError::invalid("LOCKOUT_MAX_ATTEMPTS", &max_attempts.to_string(), e)
        })?;
        let lockout_duration = minutes(
            get("LOCKOUT_DURATION_MINUTES"),
            "LOCKOUT_DURATION_MINUTES",
            15,
        )?;

        let default_users = match get("SEED_DEFAULT_USERS") {
            Some(raw) => flag(&raw).ok_or_else(|| {
                ConfigError::invalid("SEED_DEFAULT_USERS", &raw, "expected true or false")
            })?,
            None => true,
        };

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            security: SecurityConfig {
                jwt_secret,
                token_ttl,
                lockout: LockoutPolicy::new(max_attempts, lockout_duration),
            },
            seed: SeedConfig {
                default_users,
                admin_password: get("ADMIN_PASSWORD")
                    .unwrap_or_else(|| DEV_ADMIN_PASSWORD.to_string()),
                staff_password: get("STAFF_PASSWORD")
                    .unwrap_or_else(|| DEV_STAFF_PASSWORD.to_string()),
            },
        })
    }
}

fn positive(raw: Option<String>, var: &'static str, default: i64) -> Result<i64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(ConfigError::invalid(var, &raw, "must be positive")),
        Err(e) => Err(ConfigError::invalid(var, &raw, e)),
    }
}

/// Longest configurable duration; timestamps past it would overflow.
const MAX_MINUTES: i64 = 60 * 24 * 366 * 10;

fn minutes(raw: Option<String>, var: &'static str, default: i64) -> Result<Duration, ConfigError> {
    let n = positive(raw, var, default)?;
    Duration::try_minutes(n)
        .filter(|_| n <= MAX_MINUTES)
        .ok_or_else(|| {
            ConfigError::invalid(var, &n.to_string(), format!("must be at most {MAX_MINUTES}"))
        })
}

fn flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
