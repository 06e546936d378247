//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use secrecy::SecretString;

use crate::error::ConfigError;
use crate::lookup::UsdaClientConfig;

const DEFAULT_DB_PATH: &str = "./data/pfc-assist.db";
const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOOKUP_CACHE_TTL_SECS: u64 = 86_400;

/// Telegram credentials and allowlist.
#[derive(Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Usernames or numeric ids; `*` allows everyone.
    pub allowed_users: Vec<String>,
}

/// Everything `main` needs to wire the bot together.
#[derive(Debug)]
pub struct BotConfig {
    pub db_path: PathBuf,
    /// `None` disables nutrient lookups.
    pub usda: Option<UsdaClientConfig>,
    /// Pins the day boundary; `None` uses the process's local time.
    pub utc_offset: Option<FixedOffset>,
    pub http_port: u16,
    /// `None` disables the Telegram channel.
    pub telegram: Option<TelegramConfig>,
}

impl BotConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Read configuration through `get`, which returns a variable's value.
    pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_path = get("PFC_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let usda = get("USDA_API_KEY")
            .filter(|s| !s.trim().is_empty())
            .map(|key| {
                let mut config = UsdaClientConfig::new(SecretString::from(key));
                if let Some(url) = get("USDA_BASE_URL").filter(|s| !s.trim().is_empty()) {
                    config.base_url = url;
                }
                config.timeout = Duration::from_secs(parse_positive_or(
                    &get,
                    "LOOKUP_TIMEOUT_SECS",
                    DEFAULT_LOOKUP_TIMEOUT_SECS,
                ));
                config.cache_ttl = Duration::from_secs(parse_or(
                    &get,
                    "LOOKUP_CACHE_TTL_SECS",
                    DEFAULT_LOOKUP_CACHE_TTL_SECS,
                ));
                config
            });

        let utc_offset = match get("PFC_UTC_OFFSET_MINUTES") {
            Some(raw) if !raw.trim().is_empty() => Some(parse_offset(&raw)?),
            _ => None,
        };

        let http_port = parse_or(&get, "PFC_HTTP_PORT", DEFAULT_HTTP_PORT);

        let telegram = get("TELEGRAM_BOT_TOKEN")
            .filter(|s| !s.trim().is_empty())
            .map(|token| TelegramConfig {
                bot_token: SecretString::from(token),
                allowed_users: parse_list(&get("TELEGRAM_ALLOWED_USERS").unwrap_or_else(|| "*".into())),
            });

        Ok(Self {
            db_path: PathBuf::from(db_path),
            usda,
            utc_offset,
            http_port,
            telegram,
        })
    }
}

/// Parse a numeric variable, falling back to `default` when unset or invalid.
fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match get(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Invalid value, using default {default}");
            default
        }),
    }
}

/// Like `parse_or`, but zero also falls back to `default`.
fn parse_positive_or(get: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    match parse_or(get, key, default) {
        0 => {
            tracing::warn!(key, "Zero is not allowed, using default {default}");
            default
        }
        value => value,
    }
}

fn parse_offset(raw: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: "PFC_UTC_OFFSET_MINUTES".into(),
        message,
    };
    let minutes: i32 = raw
        .trim()
        .parse()
        .map_err(|_| invalid(format!("{raw:?} is not a whole number of minutes")))?;
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| invalid(format!("{minutes} minutes is outside ±24h")))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
