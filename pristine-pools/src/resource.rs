//! Resources handed out by background pools.

use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::Arc,
    time::Instant,
};

use opentelemetry::KeyValue;

use crate::metrics::Metrics;

/// Prepared resource, waiting in the ready queue.
pub(crate) struct Prepared<H> {
    /// Resource identity.
    pub(crate) id: u64,
    /// External resource name.
    pub(crate) name: String,
    /// Opened handle.
    pub(crate) handle: H,
}

/// Prepared resource, owned by the caller that acquired it.
///
/// The originating pool keeps no reference to the resource.
pub struct PristineHandle<H> {
    /// Linked metrics storage.
    metrics: Arc<Metrics>,
    /// Premade label used to record metrics.
    label: [KeyValue; 1],
    /// Handout time.
    time: Instant,
    /// Resource identity, unique within the originating pool.
    id: u64,
    /// External resource name.
    name: String,
    /// Original handle.
    handle: Option<H>,
}

impl<H> PristineHandle<H> {
    /// Bundle prepared resource with metrics container and label of the originating pool.
    pub(crate) fn new(metrics: Arc<Metrics>, label: [KeyValue; 1], prepared: Prepared<H>) -> Self {
        Self {
            metrics,
            label,
            // This is different from time used in wait_time metric.
            time: Instant::now(),
            id: prepared.id,
            name: prepared.name,
            handle: Some(prepared.handle),
        }
    }

    /// Resource identity.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// External resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release the underlying handle.
    #[must_use]
    pub fn into_inner(mut self) -> H {
        // Only ever taken here, and self is consumed.
        match self.handle.take() {
            Some(handle) => handle,
            None => unreachable!("handle is present until consumed"),
        }
    }

    fn get(&self) -> &H {
        match &self.handle {
            Some(handle) => handle,
            None => unreachable!("handle is present until consumed"),
        }
    }

    fn get_mut(&mut self) -> &mut H {
        match &mut self.handle {
            Some(handle) => handle,
            None => unreachable!("handle is present until consumed"),
        }
    }
}

impl<H> Deref for PristineHandle<H> {
    type Target = H;

    fn deref(&self) -> &Self::Target {
        self.get()
    }
}

impl<H> DerefMut for PristineHandle<H> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.get_mut()
    }
}

impl<H> AsRef<H> for PristineHandle<H> {
    fn as_ref(&self) -> &H {
        self.get()
    }
}

impl<H> AsMut<H> for PristineHandle<H> {
    fn as_mut(&mut self) -> &mut H {
        self.get_mut()
    }
}

impl<H> fmt::Debug for PristineHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PristineHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<H> Drop for PristineHandle<H> {
    fn drop(&mut self) {
        // Record time spent with the caller.
        self.metrics
            .use_time
            .record(self.time.elapsed().as_secs_f64(), &self.label);
    }
}
