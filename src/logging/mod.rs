//! Logging configuration via [`tracing`] crate.

use std::{collections::BTreeMap, fs, io, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt::{self, writer::BoxMakeWriter},
    layer::{Layer, Layered, SubscriberExt},
    registry::Registry,
};

type LoggingRegistry = Layered<Vec<Box<dyn Layer<Registry> + Send + Sync>>, Registry>;

/// Error type used in logging configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoggingError {
    /// Log destination I/O error.
    #[error("Log destination I/O error: {0}")]
    Io(#[from] io::Error),
    /// Another global subscriber has already been installed.
    #[error("Unable to install global subscriber: {0}")]
    Install(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Logging configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[non_exhaustive]
pub struct LoggingConfig {
    /// List of subscribers defined in configuration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscribers: Vec<LoggingSubscriberConfig>,
}

impl LoggingConfig {
    /// Add a subscriber.
    #[must_use]
    pub fn with_subscriber(mut self, subscriber: LoggingSubscriberConfig) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Create registry subscriber from configuration.
    ///
    /// Returned guards must be kept alive for as long as logging is needed. Dropping them flushes
    /// pending output.
    ///
    /// # Errors
    ///
    /// Returns `Err` if any of the subscribers cannot be initialized.
    pub fn make_registry(&self) -> Result<(LoggingRegistry, Vec<WorkerGuard>), LoggingError> {
        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> =
            Vec::with_capacity(self.subscribers.len());
        let mut guards = Vec::with_capacity(self.subscribers.len());
        for sub_cfg in &self.subscribers {
            let (layer, guard) = sub_cfg.make_layer()?;
            layers.push(layer);
            guards.push(guard);
        }
        Ok((Registry::default().with(layers), guards))
    }

    /// Install configured subscribers as the global default.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a subscriber cannot be initialized, or if a global subscriber is already
    /// set.
    pub fn init(&self) -> Result<Vec<WorkerGuard>, LoggingError> {
        let (registry, guards) = self.make_registry()?;
        tracing::subscriber::set_global_default(registry)?;
        Ok(guards)
    }
}

/// Individual logging subscriber configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[non_exhaustive]
pub struct LoggingSubscriberConfig {
    /// Overall format for logging output.
    #[serde(default, flatten)]
    pub format: LoggingFormat,
    /// Minimum severity level to include in output.
    #[serde(default)]
    pub level: LoggingLevel,
    /// Custom minimum severity levels for span targets.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<String, LoggingLevel>,
    /// Use ANSI escape sequences for output colors and formatting.
    #[serde(default)]
    pub color: bool,
    /// Log destination configuration.
    #[serde(default)]
    pub output: LoggingDestination,
}

impl LoggingSubscriberConfig {
    /// Logging subscriber template for use in development.
    ///
    /// Everything from pool internals is written to stderr.
    #[must_use]
    pub fn default_for_dev() -> Self {
        Self {
            format: LoggingFormat::Pretty,
            level: LoggingLevel::Info,
            targets: BTreeMap::from([("pristine_pools".into(), LoggingLevel::Trace)]),
            color: true,
            output: LoggingDestination::StdErr,
        }
    }

    /// Make [`tracing_subscriber::Layer`] from subscriber configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err` if log destination cannot be opened.
    pub fn make_layer<T>(
        &self,
    ) -> Result<(Box<dyn Layer<T> + Send + Sync>, WorkerGuard), LoggingError>
    where
        T: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let (writer, guard) = self.output.make_writer()?;
        let layer = fmt::layer()
            .with_writer(BoxMakeWriter::new(writer))
            .with_ansi(self.color);
        let boxed_layer = match self.format {
            LoggingFormat::Full => layer.boxed(),
            LoggingFormat::Compact => layer.compact().boxed(),
            LoggingFormat::Pretty => layer.pretty().boxed(),
            LoggingFormat::Json {
                flatten_metadata,
                current_span,
            } => layer
                .json()
                .flatten_event(flatten_metadata)
                .with_current_span(current_span)
                .boxed(),
        };
        let boxed_layer = if self.targets.is_empty() {
            boxed_layer
                .with_filter(LevelFilter::from(self.level))
                .boxed()
        } else {
            boxed_layer
                .with_filter(
                    Targets::new()
                        .with_targets(self.targets.clone())
                        .with_default(LevelFilter::from(self.level)),
                )
                .boxed()
        };
        Ok((boxed_layer, guard))
    }
}

/// Format for logging output.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[non_exhaustive]
#[serde(rename_all = "lowercase", tag = "format")]
pub enum LoggingFormat {
    /// Format which prints span context before log message.
    ///
    /// See [`tracing_subscriber::fmt::format::Full`].
    #[default]
    Full,
    /// More compact format, span names are hidden.
    Compact,
    /// Excessively verbose and pretty multiline format.
    Pretty,
    /// Formats logs as newline-delimited JSON objects.
    ///
    /// See [`tracing_subscriber::fmt::format::Json`].
    Json {
        /// Flatten event metadata fields into object.
        #[serde(default)]
        flatten_metadata: bool,
        /// Add current span name to object.
        #[serde(default)]
        current_span: bool,
    },
}

/// Minumum event severity for log output.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoggingLevel {
    /// Disables logging altogether.
    #[serde(alias = "off", alias = "disabled", alias = "DISABLED")]
    Off,
    /// Write "error" level only.
    #[serde(alias = "error", alias = "err", alias = "ERR")]
    Error,
    /// Write "warn" and more severe levels.
    #[serde(alias = "warn", alias = "warning", alias = "WARNING")]
    Warn,
    /// Write "info" and more severe levels.
    #[serde(alias = "info")]
    #[default]
    Info,
    /// Write "debug" and more severe levels.
    #[serde(alias = "debug")]
    Debug,
    /// Write everything.
    #[serde(alias = "trace")]
    Trace,
}

impl From<LoggingLevel> for LevelFilter {
    fn from(value: LoggingLevel) -> Self {
        match value {
            LoggingLevel::Off => LevelFilter::OFF,
            LoggingLevel::Error => LevelFilter::ERROR,
            LoggingLevel::Warn => LevelFilter::WARN,
            LoggingLevel::Info => LevelFilter::INFO,
            LoggingLevel::Debug => LevelFilter::DEBUG,
            LoggingLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Logging output destination configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[non_exhaustive]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum LoggingDestination {
    /// Output to standard output (stdout, fd 1).
    #[serde(alias = "out")]
    StdOut,
    /// Output to standard error (stderr, fd 2).
    ///
    /// Test harnesses capture stdout, so this is the default.
    #[default]
    #[serde(alias = "err")]
    StdErr,
    /// Append to file.
    File {
        /// Path to file.
        path: PathBuf,
    },
}

impl LoggingDestination {
    /// Make a non-blocking writer for this destination.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the destination file cannot be opened for appending.
    pub fn make_writer(&self) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
        Ok(match self {
            Self::StdOut => tracing_appender::non_blocking(io::stdout()),
            Self::StdErr => tracing_appender::non_blocking(io::stderr()),
            Self::File { path } => {
                let file = fs::OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(path)?;
                tracing_appender::non_blocking(file)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{from_value, json, to_value};

    use super::*;

    #[test]
    fn level_aliases() {
        let levels: Vec<LoggingLevel> =
            from_value(json!(["off", "ERR", "warning", "INFO", "debug", "trace"])).unwrap();
        assert_eq!(
            levels,
            [
                LoggingLevel::Off,
                LoggingLevel::Error,
                LoggingLevel::Warn,
                LoggingLevel::Info,
                LoggingLevel::Debug,
                LoggingLevel::Trace,
            ]
        );
        assert_eq!(LevelFilter::from(LoggingLevel::Warn), LevelFilter::WARN);
    }

    #[test]
    fn subscriber_defaults() {
        let sub: LoggingSubscriberConfig = from_value(json!({ "format": "full" })).unwrap();
        assert_eq!(sub, LoggingSubscriberConfig::default());
        assert_eq!(sub.format, LoggingFormat::Full);
        assert_eq!(sub.output, LoggingDestination::StdErr);
    }

    #[test]
    fn file_destination() {
        let sub: LoggingSubscriberConfig = from_value(json!({
            "format": "compact",
            "output": { "type": "file", "path": "/tmp/pristine.log" },
        }))
        .unwrap();
        assert_eq!(sub.format, LoggingFormat::Compact);
        assert_eq!(
            sub.output,
            LoggingDestination::File {
                path: "/tmp/pristine.log".into()
            }
        );
        let value = to_value(&sub).unwrap();
        assert_eq!(value["output"]["type"], "file");
    }

    #[test]
    fn registry_from_config() {
        let dir = std::env::temp_dir().join(format!("pristine-log-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let config = LoggingConfig::default()
            .with_subscriber(LoggingSubscriberConfig::default_for_dev())
            .with_subscriber(LoggingSubscriberConfig {
                format: LoggingFormat::Json {
                    flatten_metadata: true,
                    current_span: false,
                },
                output: LoggingDestination::File {
                    path: dir.join("test.log"),
                },
                ..Default::default()
            });
        let (registry, guards) = config.make_registry().unwrap();
        assert_eq!(guards.len(), 2);
        tracing::subscriber::with_default(registry, || {
            tracing::info!(pool = "pkgA", "created background pool");
        });
        drop(guards);
        let written = fs::read_to_string(dir.join("test.log")).unwrap();
        assert!(written.contains("created background pool"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unwritable_destination() {
        let sub = LoggingSubscriberConfig {
            output: LoggingDestination::File {
                path: "/nonexistent-dir/pristine.log".into(),
            },
            ..Default::default()
        };
        let res = LoggingConfig::default().with_subscriber(sub).make_registry();
        assert!(matches!(res, Err(LoggingError::Io(_))));
    }
}
