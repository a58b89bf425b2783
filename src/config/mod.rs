//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{collections::HashSet, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{
    CacheError, ConfigRegistry, DEFAULT_NAMESPACE, DEFAULT_STORE_CAPACITY, DEFAULT_VERSION,
};
use crate::domain::{Column, ColumnType, RecordType, Value, contains_key_separator};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "rowcache";
const ENV_PREFIX: &str = "ROWCACHE";

/// Command-line arguments for the rowcache binary.
#[derive(Debug, Parser)]
#[command(
    name = "rowcache",
    version,
    about = "Secondary-index cache synchronization toolkit"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "ROWCACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Load the configuration and register every model.
    Validate,
    /// Print the cache key of one lookup.
    Key(KeyArgs),
}

#[derive(Debug, Args, Clone)]
pub struct KeyArgs {
    /// Model (record type) name.
    #[arg(long, value_name = "NAME")]
    pub model: String,

    /// Derive the key of this counter instead of a snapshot key.
    #[arg(long, value_name = "NAME")]
    pub counter: Option<String>,

    /// Lookup values, one `column=value` pair per index column.
    #[arg(value_name = "COLUMN=VALUE", required = true, value_parser = parse_assignment)]
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((column, value)) if !column.trim().is_empty() => {
            Ok((column.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected `column=value`, got `{raw}`")),
    }
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache: KeySettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
    pub models: Vec<ModelSettings>,
}

impl Settings {
    pub fn model(&self, name: &str) -> Option<&ModelSettings> {
        self.models
            .iter()
            .find(|model| model.record_type.name() == name)
    }
}

#[derive(Debug, Clone)]
pub struct KeySettings {
    pub namespace: String,
    pub version: String,
    pub environment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// One declared record type with its cache configuration.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub record_type: Arc<RecordType>,
    pub indexes: Vec<Vec<String>>,
    pub counters: Vec<String>,
    pub expires_in: Option<Duration>,
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
    raw.apply_logging_overrides(&cli.logging);

    Settings::from_raw(raw)
}

/// Register every configured model in a fresh [`ConfigRegistry`].
pub fn build_registry(settings: &Settings) -> Result<ConfigRegistry, CacheError> {
    let registry = ConfigRegistry::new();
    for model in &settings.models {
        registry.configure_with(model.record_type.clone(), |builder| {
            for index in &model.indexes {
                builder.index(index)?;
            }
            builder.counters(&model.counters)?;
            if let Some(ttl) = model.expires_in {
                builder.expires_in(ttl);
            }
            Ok(())
        })?;
    }
    Ok(registry)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    cache: RawKeySettings,
    store: RawStoreSettings,
    logging: RawLoggingSettings,
    models: Vec<RawModelSettings>,
}

impl RawSettings {
    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            cache,
            store,
            logging,
            models,
        } = raw;

        let cache = build_key_settings(cache)?;
        let store = build_store_settings(store)?;
        let logging = build_logging_settings(logging)?;
        let models = build_model_settings(models)?;

        Ok(Self {
            cache,
            store,
            logging,
            models,
        })
    }
}

fn build_key_settings(cache: RawKeySettings) -> Result<KeySettings, LoadError> {
    let namespace = non_blank(cache.namespace).unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    let version = non_blank(cache.version).unwrap_or_else(|| DEFAULT_VERSION.to_string());
    let environment = non_blank(cache.environment);
    for (field, value) in [
        ("cache.namespace", Some(namespace.as_str())),
        ("cache.version", Some(version.as_str())),
        ("cache.environment", environment.as_deref()),
    ] {
        if value.is_some_and(contains_key_separator) {
            return Err(LoadError::invalid(field, "must not contain `:`, `.` or `/`"));
        }
    }

    Ok(KeySettings {
        namespace,
        version,
        environment,
    })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let capacity = store.capacity.unwrap_or(DEFAULT_STORE_CAPACITY as u64);
    if capacity == 0 {
        return Err(LoadError::invalid(
            "store.capacity",
            "must be greater than zero",
        ));
    }
    let capacity: usize = capacity
        .try_into()
        .map_err(|_| LoadError::invalid("store.capacity", "value exceeds supported range"))?;
    Ok(StoreSettings { capacity })
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

fn build_model_settings(models: Vec<RawModelSettings>) -> Result<Vec<ModelSettings>, LoadError> {
    let mut seen = HashSet::new();
    let mut built = Vec::with_capacity(models.len());
    for model in models {
        let name = non_blank(model.name)
            .ok_or_else(|| LoadError::invalid("models.name", "must not be empty"))?;
        if !seen.insert(name.clone()) {
            return Err(LoadError::invalid(
                "models.name",
                format!("model `{name}` is declared twice"),
            ));
        }

        let primary_key = non_blank(model.primary_key).unwrap_or_else(|| "id".to_string());
        let columns = model.columns.into_iter().map(|column| {
            let built = Column::new(&column.name, column.column_type);
            match column.default {
                Some(default) => built.with_default(default),
                None => built,
            }
        });
        let record_type = RecordType::new(&name, &primary_key, columns)
            .map_err(|err| LoadError::invalid("models.columns", err.to_string()))?;

        let expires_in = match model.expires_in_seconds {
            Some(0) => {
                return Err(LoadError::invalid(
                    "models.expires_in_seconds",
                    format!("model `{name}` must expire after more than zero seconds"),
                ));
            }
            Some(seconds) => Some(Duration::from_secs(seconds)),
            None => None,
        };

        built.push(ModelSettings {
            record_type: Arc::new(record_type),
            indexes: model.indexes,
            counters: model.counters,
            expires_in,
        });
    }
    Ok(built)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawKeySettings {
    namespace: Option<String>,
    version: Option<String>,
    environment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawModelSettings {
    name: Option<String>,
    primary_key: Option<String>,
    columns: Vec<RawColumnSettings>,
    indexes: Vec<Vec<String>>,
    counters: Vec<String>,
    expires_in_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawColumnSettings {
    name: String,
    #[serde(rename = "type")]
    column_type: ColumnType,
    #[serde(default)]
    default: Option<Value>,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
