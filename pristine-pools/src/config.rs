//! Pool configuration.

use std::{num::NonZeroUsize, time::Duration};

use serde::{Deserialize, Serialize};

/// Helper function used for default boolean values in [`serde`].
#[must_use]
#[inline]
fn default_true() -> bool {
    true
}

/// Configuration shared by all pools created from one registry.
///
/// Values are read once when a pool starts, and stay fixed for the lifetime of that pool.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Drop schema before creating it.
    ///
    /// Required if the schema changed since the resource was last used.
    #[serde(default = "default_true")]
    pub drop_schema: bool,
    /// Create schema objects in each new resource.
    #[serde(default = "default_true")]
    pub create_schema: bool,
    /// Remove all data from tables before handing out a resource.
    #[serde(default = "default_true")]
    pub truncate: bool,
    /// Number of resources provisioned in advance.
    ///
    /// This is also the capacity of the ready queue. Larger values make pool startup slower,
    /// but reduce average wait time on acquisition.
    #[serde(default = "PoolConfig::default_size")]
    pub size: NonZeroUsize,
    /// Log individual schema operations.
    #[serde(default)]
    pub verbose: bool,
    /// Maximum time to wait for a prepared resource.
    ///
    /// Default is 45 seconds.
    #[serde(default = "PoolConfig::default_acquire_timeout", with = "humantime_serde")]
    pub acquire_timeout: Duration,
    /// First component of external resource names.
    #[serde(default = "PoolConfig::default_name_prefix")]
    pub name_prefix: String,
    /// Process identity label.
    ///
    /// Derived from the running executable name if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// What to do when provisioning fails.
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            drop_schema: true,
            create_schema: true,
            truncate: true,
            size: Self::default_size(),
            verbose: false,
            acquire_timeout: Self::default_acquire_timeout(),
            name_prefix: Self::default_name_prefix(),
            label: None,
            on_failure: FailurePolicy::default(),
        }
    }
}

impl PoolConfig {
    /// Default value for [`Self::size`].
    #[must_use]
    #[inline]
    fn default_size() -> NonZeroUsize {
        NonZeroUsize::new(8).unwrap_or(NonZeroUsize::MIN)
    }

    /// Default value for [`Self::acquire_timeout`].
    #[must_use]
    #[inline]
    fn default_acquire_timeout() -> Duration {
        Duration::from_secs(45)
    }

    /// Default value for [`Self::name_prefix`].
    #[must_use]
    #[inline]
    fn default_name_prefix() -> String {
        "tmpdb".into()
    }

    /// Set initial pool size.
    #[must_use]
    pub fn with_size(mut self, size: NonZeroUsize) -> Self {
        self.size = size;
        self
    }

    /// Set acquisition timeout.
    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set process identity label explicitly.
    #[must_use]
    pub fn with_label(mut self, label: impl ToString) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Select which preparation steps to run.
    #[must_use]
    pub fn with_steps(mut self, steps: PrepareSteps) -> Self {
        self.drop_schema = steps.drop_schema;
        self.create_schema = steps.create_schema;
        self.truncate = steps.truncate;
        self
    }

    /// Set failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Preparation steps enabled by this configuration.
    #[must_use]
    pub fn steps(&self) -> PrepareSteps {
        PrepareSteps {
            drop_schema: self.drop_schema,
            create_schema: self.create_schema,
            truncate: self.truncate,
        }
    }
}

/// Set of preparation steps applied to a fresh resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct PrepareSteps {
    /// Drop schema, once per resource.
    pub drop_schema: bool,
    /// Create schema, once per resource.
    pub create_schema: bool,
    /// Truncate all tables, on every preparation.
    pub truncate: bool,
}

impl PrepareSteps {
    /// All steps enabled.
    pub const ALL: Self = Self {
        drop_schema: true,
        create_schema: true,
        truncate: true,
    };
}

/// Reaction to a backend failure while provisioning.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum FailurePolicy {
    /// Poison the pool, returning the failure to all current and future acquirers.
    #[default]
    Propagate,
    /// Log the failure and terminate the process.
    Exit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.size.get(), 8);
        assert_eq!(config.acquire_timeout, Duration::from_secs(45));
        assert_eq!(config.steps(), PrepareSteps::ALL);
        assert_eq!(config.on_failure, FailurePolicy::Propagate);
        assert!(config.label.is_none());
    }

    #[test]
    fn builder_methods() {
        let config = PoolConfig::default()
            .with_size(NonZeroUsize::MIN)
            .with_label("svc")
            .with_steps(PrepareSteps {
                truncate: true,
                ..Default::default()
            })
            .with_failure_policy(FailurePolicy::Exit);
        assert_eq!(config.size.get(), 1);
        assert_eq!(config.label.as_deref(), Some("svc"));
        assert!(!config.drop_schema);
        assert!(!config.create_schema);
        assert!(config.truncate);
        assert_eq!(config.on_failure, FailurePolicy::Exit);
    }
}
