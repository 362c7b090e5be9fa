//! Error types and error support code.

use std::{sync::Arc, time::Duration};

/// Type-erased error produced by a provisioning backend.
///
/// Shared, so that a single backend failure can be reported to every caller waiting on a
/// poisoned pool.
pub type BackendError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Generalized error type used by background pools.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Process identity label is empty.
    ///
    /// Either set it explicitly in pool configuration, or run from a binary with a usable name.
    #[error("no process label set for pristine pools")]
    EmptyLabel,
    /// Pool name is empty.
    #[error("pool name must not be empty")]
    EmptyPoolName,
    /// First request for a pool did not supply a schema to bind.
    #[error("no schema supplied when creating pool {0:?}")]
    MissingSchema(String),
    /// Pool was requested outside of a Tokio runtime.
    #[error("background pools require a Tokio runtime")]
    NoRuntime,
    /// Supplied schema differs from the one bound to an existing pool.
    #[error("schema mismatch for pool {pool:?}")]
    SchemaMismatch {
        /// Pool name.
        pool: String,
    },
    /// No prepared resource became available within the wait window.
    #[error("resource creation wait exceeded timeout ({0:?})")]
    ProvisionTimeout(Duration),
    /// Backend was unable to open a freshly created resource.
    #[error("unable to open resource {name:?}: {source}")]
    OpenFailed {
        /// External resource name.
        name: String,
        /// Backend error.
        source: BackendError,
    },
    /// Dropping schema failed.
    #[error("unable to drop schema for resource {id}: {source}")]
    SchemaDropFailed {
        /// Resource identity.
        id: u64,
        /// Backend error.
        source: BackendError,
    },
    /// Creating schema failed.
    #[error("unable to create schema for resource {id}: {source}")]
    SchemaCreateFailed {
        /// Resource identity.
        id: u64,
        /// Backend error.
        source: BackendError,
    },
    /// Truncating tables failed.
    #[error("unable to truncate tables for resource {id}: {source}")]
    TruncateFailed {
        /// Resource identity.
        id: u64,
        /// Backend error.
        source: BackendError,
    },
    /// Ready queue was closed.
    #[error("pool ready queue is closed")]
    Closed,
}

impl Error {
    /// Whether this error leaves the originating pool unusable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::OpenFailed { .. }
                | Self::SchemaDropFailed { .. }
                | Self::SchemaCreateFailed { .. }
                | Self::TruncateFailed { .. }
                | Self::Closed
        )
    }

    /// Wrap backend error.
    pub(crate) fn backend<E>(err: E) -> BackendError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Arc::new(err)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn timeout_carries_duration() {
        let err = Error::ProvisionTimeout(Duration::from_secs(45));
        assert_eq!(
            err.to_string(),
            "resource creation wait exceeded timeout (45s)"
        );
        assert!(!err.is_fatal());
    }

    #[test]
    fn backend_failures_are_fatal() {
        let err = Error::SchemaDropFailed {
            id: 3,
            source: Error::backend(io::Error::other("relation is locked")),
        };
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "unable to drop schema for resource 3: relation is locked"
        );
        let cloned = err.clone();
        assert!(matches!(cloned, Error::SchemaDropFailed { id: 3, .. }));
    }
}
