#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![deny(elided_lifetimes_in_paths, unreachable_pub)]
#![warn(missing_docs)]
// #![warn(clippy::pedantic)]
// #![allow(clippy::module_name_repetitions)]

mod blocking;
mod config;
mod errors;
mod logging;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod prelude;
pub mod reexport;
mod runtime;

pub use pristine_pools::{
    process_label, Backend, BackendError, BackgroundPool, Error, FailurePolicy, PoolConfig,
    PoolState, PrepareSteps, PristineHandle, Registry, SchemaHandle,
};

pub use self::{
    blocking::BlockingRegistry,
    config::{PristineConfig, PristineConfigBuilder},
    errors::PristineError,
    logging::{
        LoggingConfig, LoggingDestination, LoggingError, LoggingFormat, LoggingLevel,
        LoggingSubscriberConfig,
    },
    runtime::{RuntimeConfig, RuntimeType},
};
