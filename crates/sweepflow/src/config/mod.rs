#[cfg(feature = "aws")]
mod aws;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Deserializer};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::error::ConfigError;

pub const DEFAULT_LOCATOR: &str = "file:medplum.config.json";
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

// Unreserved characters stay as-is in the userinfo part of a Redis URL.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Where settings come from: `file:<path>`, `env:` or `aws:[<region>:]<path>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocator {
    File(PathBuf),
    Env,
    Aws { region: String, path: String },
}

impl FromStr for ConfigLocator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, path) = s.split_once(':').unwrap_or((s, ""));
        match kind {
            "file" => {
                if path.is_empty() {
                    return Err(ConfigError::Invalid {
                        field: "config",
                        reason: "file: locator needs a path".to_string(),
                    });
                }
                Ok(Self::File(PathBuf::from(path)))
            }
            "env" => Ok(Self::Env),
            "aws" => {
                let (region, path) = match path.split_once(':') {
                    Some((region, path)) => (region.to_string(), path.to_string()),
                    None => (DEFAULT_AWS_REGION.to_string(), path.to_string()),
                };
                Ok(Self::Aws { region, path })
            }
            other => Err(ConfigError::UnrecognizedSource(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Full connection URL; wins over the individual fields when set.
    pub url: Option<String>,
    pub host: String,
    #[serde(deserialize_with = "number_or_string")]
    pub port: u16,
    pub dbname: String,
    pub username: String,
    pub password: String,
    pub ssl: Option<DatabaseSsl>,
}

/// `database.ssl`: a flag, a libpq mode name (`"verify-full"`) or a
/// node-postgres style object such as `{ "rejectUnauthorized": false }`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DatabaseSsl {
    Enabled(bool),
    Mode(String),
    Options {
        #[serde(default, rename = "rejectUnauthorized")]
        reject_unauthorized: Option<bool>,
    },
}

impl DatabaseSsl {
    pub fn ssl_mode(&self) -> Result<PgSslMode, ConfigError> {
        match self {
            Self::Enabled(false) => Ok(PgSslMode::Disable),
            Self::Enabled(true) => Ok(PgSslMode::Require),
            Self::Mode(mode) => PgSslMode::from_str(mode).map_err(|e| ConfigError::Invalid {
                field: "database.ssl",
                reason: e.to_string(),
            }),
            Self::Options {
                reject_unauthorized: Some(false),
            } => Ok(PgSslMode::Require),
            Self::Options { .. } => Ok(PgSslMode::VerifyFull),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            dbname: "medplum".to_string(),
            username: "medplum".to_string(),
            password: String::new(),
            ssl: None,
        }
    }
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        let options = match &self.url {
            Some(url) => PgConnectOptions::from_str(url).map_err(|e| ConfigError::Invalid {
                field: "database.url",
                reason: e.to_string(),
            })?,
            None => PgConnectOptions::new()
                .host(&self.host)
                .port(self.port)
                .database(&self.dbname)
                .username(&self.username)
                .password(&self.password),
        };
        // An explicit `ssl` section wins over `sslmode` in the URL.
        match &self.ssl {
            Some(ssl) => Ok(options.ssl_mode(ssl.ssl_mode()?)),
            None => Ok(options),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub url: Option<String>,
    pub host: String,
    #[serde(deserialize_with = "number_or_string")]
    pub port: u16,
    /// ACL user; the `default` user when unset.
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: u32,
    pub tls: Option<RedisTls>,
}

/// `redis.tls`: a flag or an ioredis style options object. Any object turns
/// TLS on; `rejectUnauthorized: false` skips certificate verification.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RedisTls {
    Enabled(bool),
    Options {
        #[serde(default, rename = "rejectUnauthorized")]
        reject_unauthorized: Option<bool>,
    },
}

impl RedisTls {
    pub fn enabled(&self) -> bool {
        !matches!(self, Self::Enabled(false))
    }

    pub fn insecure(&self) -> bool {
        matches!(
            self,
            Self::Options {
                reject_unauthorized: Some(false)
            }
        )
    }
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            db: 0,
            tls: None,
        }
    }
}

impl RedisSettings {
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        let user = non_empty(&self.username)
            .map(|u| utf8_percent_encode(&u, USERINFO).to_string())
            .unwrap_or_default();
        let auth = match non_empty(&self.password) {
            Some(password) => format!("{user}:{}@", utf8_percent_encode(&password, USERINFO)),
            None if !user.is_empty() => format!("{user}@"),
            None => String::new(),
        };

        let tls = self.tls.as_ref().filter(|t| t.enabled());
        let scheme = if tls.is_some() { "rediss" } else { "redis" };
        let fragment = if tls.is_some_and(RedisTls::insecure) {
            "#insecure"
        } else {
            ""
        };
        format!(
            "{scheme}://{auth}{}:{}/{}{fragment}",
            self.host, self.port, self.db
        )
    }
}

/// Sweep knobs. Every field has a default so a plain server config file works as-is.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct SweepTuning {
    pub retention_days: i64,
    pub batch_size: usize,
    pub iterations: u32,
    pub delay_ms: u64,
    pub queue_name: String,
    pub queue_prefix: String,
    pub queue_batch_size: u64,
    pub queue_max_age_ms: i64,
    pub scan_page_size: usize,
}

impl Default for SweepTuning {
    fn default() -> Self {
        Self {
            retention_days: 30,
            batch_size: 100,
            iterations: 10,
            delay_ms: 100,
            queue_name: "SubscriptionQueue".to_string(),
            queue_prefix: "bull".to_string(),
            queue_batch_size: 100_000,
            queue_max_age_ms: 60_000,
            scan_page_size: 1000,
        }
    }
}

impl SweepTuning {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

// Settings is the resolved, immutable input of a sweep run.
// It is loaded once before any store is touched and passed by reference.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: Option<DatabaseSettings>,
    pub redis: Option<RedisSettings>,
    pub sweep: SweepTuning,
}

impl Settings {
    /// Resolves settings from a locator string, applies env overrides and validates.
    pub async fn load(locator: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let locator: ConfigLocator = locator.parse()?;
        let mut settings = match locator {
            ConfigLocator::File(path) => Self::from_file(&path)?,
            ConfigLocator::Env => Self::from_env(),
            ConfigLocator::Aws { region, path } => Self::from_aws(&region, &path).await?,
        };
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_env() -> Self {
        let database = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|url| DatabaseSettings {
                url: Some(url),
                ..DatabaseSettings::default()
            });
        let redis = std::env::var("REDIS_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|url| RedisSettings {
                url: Some(url),
                ..RedisSettings::default()
            });

        Self {
            database,
            redis,
            sweep: SweepTuning::default(),
        }
    }

    #[cfg(feature = "aws")]
    async fn from_aws(region: &str, path: &str) -> Result<Self, ConfigError> {
        aws::load(region, path).await
    }

    #[cfg(not(feature = "aws"))]
    async fn from_aws(_region: &str, _path: &str) -> Result<Self, ConfigError> {
        Err(ConfigError::SourceUnavailable(
            "aws (rebuild with --features aws)".to_string(),
        ))
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let tuning = &mut self.sweep;
        if let Some(v) = env_parse("SWEEP_RETENTION_DAYS", "RETENTION_DAYS")? {
            tuning.retention_days = v;
        }
        if let Some(v) = env_parse("SWEEP_BATCH_SIZE", "BATCH_SIZE")? {
            tuning.batch_size = v;
        }
        if let Some(v) = env_parse("SWEEP_ITERATIONS", "ITERATIONS")? {
            tuning.iterations = v;
        }
        if let Some(v) = env_parse("SWEEP_DELAY_MS", "DELAY_MS")? {
            tuning.delay_ms = v;
        }
        if let Some(v) = env_or_fallback("SWEEP_QUEUE_NAME", "QUEUE") {
            tuning.queue_name = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.sweep;
        if t.retention_days < 0 {
            return Err(invalid("sweep.retentionDays", "must not be negative"));
        }
        let now = Utc::now();
        if chrono::Duration::try_days(t.retention_days)
            .and_then(|window| now.checked_sub_signed(window))
            .is_none()
        {
            return Err(invalid("sweep.retentionDays", "reaches past the earliest date"));
        }
        if t.batch_size == 0 {
            return Err(invalid("sweep.batchSize", "must be at least 1"));
        }
        if t.iterations == 0 {
            return Err(invalid("sweep.iterations", "must be at least 1"));
        }
        if t.scan_page_size == 0 {
            return Err(invalid("sweep.scanPageSize", "must be at least 1"));
        }
        if t.queue_max_age_ms < 0 {
            return Err(invalid("sweep.queueMaxAgeMs", "must not be negative"));
        }
        if chrono::Duration::try_milliseconds(t.queue_max_age_ms)
            .and_then(|window| now.checked_sub_signed(window))
            .is_none()
        {
            return Err(invalid("sweep.queueMaxAgeMs", "reaches past the earliest date"));
        }
        if t.queue_name.trim().is_empty() {
            return Err(invalid("sweep.queueName", "must not be empty"));
        }
        if let Some(ssl) = self.database.as_ref().and_then(|db| db.ssl.as_ref()) {
            ssl.ssl_mode()?;
        }
        Ok(())
    }

    pub fn require_database(&self) -> Result<&DatabaseSettings, ConfigError> {
        self.database
            .as_ref()
            .ok_or(ConfigError::MissingField("database"))
    }

    pub fn require_redis(&self) -> Result<&RedisSettings, ConfigError> {
        self.redis.as_ref().ok_or(ConfigError::MissingField("redis"))
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_parse<T: FromStr>(primary: &'static str, fallback: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_or_fallback(primary, fallback) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                field: primary,
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(n) => Ok(n),
        Port::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
