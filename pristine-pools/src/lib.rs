#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![deny(elided_lifetimes_in_paths, unreachable_pub)]
#![warn(
    missing_docs,
    clippy::doc_link_with_quotes,
    clippy::doc_markdown,
    clippy::missing_errors_doc
)]

mod backend;
mod config;
pub mod error;
mod label;
mod ledger;
mod metrics;
mod pool;
mod registry;
mod resource;
#[cfg(test)]
mod testing;

pub use crate::{
    backend::{Backend, SchemaHandle},
    config::{FailurePolicy, PoolConfig, PrepareSteps},
    error::{BackendError, Error},
    label::process_label,
    metrics::PoolState,
    pool::BackgroundPool,
    registry::Registry,
    resource::PristineHandle,
};
