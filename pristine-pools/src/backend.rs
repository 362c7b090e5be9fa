//! Provisioning back-end traits.

use std::sync::Arc;

/// Source of physical resources for background pools.
///
/// Implementations create an external resource by name, then open a handle to it.
#[async_trait::async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Structural descriptor of resources, bound to a pool for its whole lifetime.
    type Schema: PartialEq + Send + Sync + 'static;
    /// Handle to an opened resource.
    type Handle: SchemaHandle<Error = Self::Error>;
    /// Error type used by the back-end.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create external resource with the provided name.
    ///
    /// This is a best-effort step: pools ignore failures here, as [`Self::open`] is the
    /// authoritative signal of whether a resource can be used.
    ///
    /// # Errors
    ///
    /// Returns `Err` if resource creation failed.
    async fn create(&self, name: &str) -> Result<(), Self::Error>;

    /// Open a handle to a previously created resource.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the resource is not reachable.
    async fn open(&self, name: &str, schema: &Arc<Self::Schema>)
        -> Result<Self::Handle, Self::Error>;
}

/// Schema operations available on an opened resource.
#[async_trait::async_trait]
pub trait SchemaHandle: Send + Sync + 'static {
    /// Error type returned by schema operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Drop all schema objects.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the back-end rejected the operation.
    async fn drop_schema(&self) -> Result<(), Self::Error>;

    /// Create all schema objects.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the back-end rejected the operation.
    async fn create_schema(&self) -> Result<(), Self::Error>;

    /// Remove all data from all tables, keeping the schema intact.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the back-end rejected the operation.
    async fn truncate_tables(&self) -> Result<(), Self::Error>;
}
