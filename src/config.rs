//! Configuration structures.

use pristine_pools::PoolConfig;
use serde::{Deserialize, Serialize};

#[cfg(feature = "postgres")]
use crate::postgres::PostgresConfig;
use crate::{errors::PristineError, logging::LoggingConfig, runtime::RuntimeConfig};

/// Root container for configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[non_exhaustive]
pub struct PristineConfig {
    /// Background pool configuration.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Tokio runtime configuration, used by blocking registries.
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// PostgreSQL back-end configuration.
    #[cfg(feature = "postgres")]
    #[serde(default)]
    pub postgres: PostgresConfig,
}

impl PristineConfig {
    /// Create builder for configuration.
    pub fn builder() -> PristineConfigBuilder {
        PristineConfigBuilder::new()
    }
}

/// Builder for configuration.
#[must_use]
pub struct PristineConfigBuilder {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl PristineConfigBuilder {
    /// Alternative method to construct a configuration builder.
    pub fn new() -> Self {
        Self {
            builder: config::Config::builder(),
        }
    }

    /// Try to build configuration object from preconfigured sources.
    ///
    /// This method will do all the I/O necessary to load the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err` if some configuration loading was unsuccessful.
    pub fn build(self) -> Result<PristineConfig, PristineError> {
        self.builder.build()?.try_deserialize().map_err(Into::into)
    }

    /// Add a custom object implementing [`Source`] trait as a source of configuration.
    ///
    /// [`Source`]: config::Source
    pub fn with_source<T>(mut self, source: T) -> Self
    where
        T: config::Source + Send + Sync + 'static,
    {
        self.builder = self.builder.add_source(source);
        self
    }

    /// Add file as a source of configuration.
    ///
    /// File extension is optional, format is detected from it.
    pub fn with_file(self, name: impl AsRef<str>) -> Self {
        self.with_source(config::File::with_name(name.as_ref()))
    }

    /// Add optional file as a source of configuration.
    ///
    /// Missing file is silently skipped.
    pub fn with_optional_file(self, name: impl AsRef<str>) -> Self {
        self.with_source(config::File::with_name(name.as_ref()).required(false))
    }

    /// Add environment variables as a source of configuration.
    ///
    /// Variables look like `<PREFIX>_POOL__ACQUIRE_TIMEOUT=10s`.
    pub fn with_env(self, prefix: impl AsRef<str>) -> Self {
        self.with_source(
            config::Environment::with_prefix(prefix.as_ref())
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
    }
}

impl Default for PristineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
