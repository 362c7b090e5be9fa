//! Commonly imported types for use in test suites.

#[cfg(feature = "postgres")]
pub use crate::postgres::{PgBackend, PgHandle, PgSchema, PostgresConfig};
pub use crate::{
    reexport::tracing, Backend, BlockingRegistry, PoolConfig, PristineConfig, PristineHandle,
    Registry, SchemaHandle,
};
