//! Centralized place to re-export dependency crates

pub use config;
pub use pristine_pools;
#[cfg(feature = "postgres")]
pub use tokio_postgres;
pub use tracing;
pub use tracing_subscriber;
