//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{collections::BTreeMap, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{DEFAULT_ENTITY_TTL_SECS, DEFAULT_PUBLISHED_TTL_SECS};
use crate::entity::EntityKind;
use crate::policy::PolicyKind;

mod cli;

pub use cli::{CliArgs, Command, KeyQuery, KeysArgs, Overrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pubcache";
const ENV_PREFIX: &str = "PUBCACHE";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub entity_ttl: Duration,
    pub full_data_set_expires: bool,
    pub published_ttl: Duration,
    pub get_all_validate_count: bool,
    pub get_all_allow_zero_count: bool,
    /// Per-kind overrides of the built-in policy table.
    pub policies: BTreeMap<EntityKind, PolicyKind>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

// ============================================================================
// Raw layer
// ============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    entity_ttl_seconds: Option<u64>,
    full_data_set_expires: Option<bool>,
    published_ttl_seconds: Option<u64>,
    get_all_validate_count: Option<bool>,
    get_all_allow_zero_count: Option<bool>,
    policies: BTreeMap<String, String>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(seconds) = overrides.cache_entity_ttl_seconds {
            self.cache.entity_ttl_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.cache_published_ttl_seconds {
            self.cache.published_ttl_seconds = Some(seconds);
        }
        if let Some(expires) = overrides.cache_full_data_set_expires {
            self.cache.full_data_set_expires = Some(expires);
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { logging, cache } = raw;

        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self { logging, cache })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let entity_ttl = positive_seconds(
        cache.entity_ttl_seconds.unwrap_or(DEFAULT_ENTITY_TTL_SECS),
        "cache.entity_ttl_seconds",
    )?;
    let published_ttl = positive_seconds(
        cache
            .published_ttl_seconds
            .unwrap_or(DEFAULT_PUBLISHED_TTL_SECS),
        "cache.published_ttl_seconds",
    )?;

    let mut policies = BTreeMap::new();
    for (kind, policy) in cache.policies {
        let kind = EntityKind::from_str(&kind)
            .map_err(|err| LoadError::invalid("cache.policies", err.to_string()))?;
        let policy = PolicyKind::from_str(&policy)
            .map_err(|err| LoadError::invalid("cache.policies", err.to_string()))?;
        policies.insert(kind, policy);
    }

    Ok(CacheSettings {
        entity_ttl,
        full_data_set_expires: cache.full_data_set_expires.unwrap_or(false),
        published_ttl,
        get_all_validate_count: cache.get_all_validate_count.unwrap_or(true),
        get_all_allow_zero_count: cache.get_all_allow_zero_count.unwrap_or(false),
        policies,
    })
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}
