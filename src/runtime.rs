//! Tokio runtime configuration for blocking callers.

use std::{
    num::NonZeroUsize,
    sync::atomic::{AtomicUsize, Ordering},
};

use serde::{Deserialize, Serialize};
use tokio::runtime::{Builder, Runtime};
use tracing::trace;

/// Tokio scheduler flavor.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum RuntimeType {
    /// All tasks run on the thread that blocks on the runtime.
    ///
    /// Background provisioning only progresses while some caller is waiting.
    CurrentThread,
    /// Work-stealing thread pool.
    #[default]
    MultiThread,
}

impl RuntimeType {
    /// Create runtime builder of this type.
    pub fn builder(&self) -> Builder {
        match self {
            Self::CurrentThread => Builder::new_current_thread(),
            Self::MultiThread => Builder::new_multi_thread(),
        }
    }
}

/// Runtime configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[non_exhaustive]
pub struct RuntimeConfig {
    /// Type of runtime to use.
    #[serde(default)]
    pub r#type: RuntimeType,
    /// Number of worker threads.
    ///
    /// Default is number of cores available at runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_threads: Option<NonZeroUsize>,
    /// Prefix for runtime thread names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
    /// Stack size of runtime threads, in bytes.
    ///
    /// Current Tokio default is 2 MiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_stack_size: Option<NonZeroUsize>,
}

impl RuntimeConfig {
    /// Set runtime type.
    #[must_use]
    pub fn with_type(mut self, r#type: RuntimeType) -> Self {
        self.r#type = r#type;
        self
    }

    /// Create preconfigured runtime builder.
    pub fn builder(&self) -> Builder {
        let mut rb = self.r#type.builder();
        rb.enable_all();
        if let Some(size) = self.thread_stack_size {
            rb.thread_stack_size(size.get());
        }
        if let (RuntimeType::MultiThread, Some(num)) = (self.r#type, self.worker_threads) {
            rb.worker_threads(num.get());
        }
        let prefix = self
            .thread_name
            .clone()
            .unwrap_or_else(|| "pristine-worker".into());
        rb.thread_name_fn(move || {
            static THREAD_COUNTER: AtomicUsize = AtomicUsize::new(0);
            let thread_id = THREAD_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!("{prefix}-{thread_id}")
        })
        .on_thread_start(|| {
            trace!(thread_id = gettid::gettid(), "started runtime thread");
        })
        .on_thread_stop(|| {
            trace!(thread_id = gettid::gettid(), "stopping runtime thread");
        });
        rb
    }

    /// Build runtime.
    ///
    /// # Errors
    ///
    /// Returns `Err` if runtime threads or I/O driver cannot be created.
    pub fn build(&self) -> Result<Runtime, std::io::Error> {
        self.builder().build()
    }
}
