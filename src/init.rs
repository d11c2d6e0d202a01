use crate::env::{
    env_var, parse_flag, FLEX_LOG_DATE_FORMAT_ENV, FLEX_LOG_FORMAT_ENV, FLEX_LOG_IGNORE_EMPTY_ENV,
    FLEX_LOG_LEVEL_ENV,
};
use crate::error::FormatError;
use crate::formatter::{FormatterOptions, RecordFormatter};
use crate::layer::CloudJsonLayer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the globally installed layer.
///
/// **Fields**
/// - `formatter`: [`FormatterOptions`] used to build the [`RecordFormatter`].
/// - `max_level`: most verbose level that reaches the layer.
/// - `channel`: value of `%channel%` in the line format.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub formatter: FormatterOptions,
    pub max_level: LevelFilter,
    pub channel: String,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            formatter: FormatterOptions::default(),
            max_level: LevelFilter::INFO,
            channel: String::new(),
        }
    }
}

impl LayerConfig {
    /// Build a config from `FLEX_LOG_*` variables, using defaults for
    /// anything unset.
    pub fn from_env() -> Self {
        Self::from_lookup(env_var)
    }

    /// Build a config from `FLEX_LOG_*` keys resolved through `lookup`.
    ///
    /// Unset keys keep their defaults; an unrecognised ignore flag keeps
    /// `false` and an unparseable level falls back to `INFO`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            formatter: FormatterOptions {
                format: lookup(FLEX_LOG_FORMAT_ENV).unwrap_or(defaults.formatter.format),
                date_format: lookup(FLEX_LOG_DATE_FORMAT_ENV)
                    .unwrap_or(defaults.formatter.date_format),
                ignore_empty_context_and_extra: lookup(FLEX_LOG_IGNORE_EMPTY_ENV)
                    .and_then(|v| parse_flag(&v))
                    .unwrap_or(defaults.formatter.ignore_empty_context_and_extra),
            },
            max_level: lookup(FLEX_LOG_LEVEL_ENV)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_level),
            channel: defaults.channel,
        }
    }
}

/// Error returned when the global subscriber cannot be installed.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("global subscriber already set: {0}")]
    AlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize the global `tracing` subscriber with a [`CloudJsonLayer`]
/// writing to stdout.
///
/// **Returns**
/// - `Err(InitError::Format)` if the formatter options are invalid.
/// - `Err(InitError::AlreadySet)` if another global subscriber exists.
pub fn init_tracing_with_config(config: LayerConfig) -> Result<(), InitError> {
    let formatter = RecordFormatter::new(config.formatter)?;
    let layer = CloudJsonLayer::new(formatter).with_channel(config.channel);

    let subscriber = Registry::default().with(config.max_level).with(layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Initialize tracing with configuration read from the environment.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::from_env`].
pub fn init_tracing() -> Result<(), InitError> {
    init_tracing_with_config(LayerConfig::from_env())
}
