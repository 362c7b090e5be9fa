//! Background pool of prepared resources bound to a single schema.

use std::{
    fmt,
    io::{self, Write},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, OnceLock,
    },
    time::{Duration, Instant},
};

use opentelemetry::KeyValue;
use tokio::{
    runtime::Handle,
    sync::{mpsc, Mutex as AsyncMutex},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, error, warn, Instrument};

use crate::{
    backend::Backend,
    config::{FailurePolicy, PoolConfig},
    error::Error,
    ledger::Ledger,
    metrics::{pool_kv, Metrics, PoolState, POOL_METRICS},
    resource::{Prepared, PristineHandle},
};

/// Pool of prepared resources, replenished in the background.
///
/// Every acquisition schedules provisioning of one replacement resource. Cloning is cheap, and
/// all clones refer to the same pool.
pub struct BackgroundPool<B: Backend>(Arc<PoolInner<B>>);

/// Shared pool state.
struct PoolInner<B: Backend> {
    /// Pool name, unique within a registry.
    name: String,
    /// Process identity label.
    label: String,
    /// Schema bound to this pool.
    schema: Arc<B::Schema>,
    /// Provisioning back-end.
    backend: Arc<B>,
    /// Configuration, fixed at pool start.
    config: PoolConfig,
    /// Runtime used to spawn provisioning tasks.
    runtime: Handle,
    /// Producer side of the ready queue.
    ready_tx: mpsc::Sender<Prepared<B::Handle>>,
    /// Consumer side of the ready queue.
    ready_rx: AsyncMutex<mpsc::Receiver<Prepared<B::Handle>>>,
    /// Last allocated resource identity.
    next_id: AtomicU64,
    /// Provisioning tasks in flight.
    pending: AtomicUsize,
    /// Preparation ledger. Its lock serializes preparation steps.
    ledger: AsyncMutex<Ledger>,
    /// First fatal provisioning failure.
    failure: OnceLock<Error>,
    /// Cancelled once the pool is poisoned, waking up all waiting acquirers.
    poisoned: CancellationToken,
    /// Linked metrics storage.
    metrics: Arc<Metrics>,
    /// Premade label used to record metrics.
    kv: [KeyValue; 1],
}

impl<B: Backend> Clone for BackgroundPool<B> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<B: Backend> fmt::Debug for BackgroundPool<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundPool")
            .field("name", &self.0.name)
            .field("state", &self.state())
            .field("poisoned", &self.0.poisoned.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<B: Backend> BackgroundPool<B> {
    /// Create pool, bind schema and launch the initial batch of provisioning tasks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyLabel`] if process label is empty, or [`Error::NoRuntime`] if called
    /// outside of a Tokio runtime.
    pub(crate) fn start(
        name: &str,
        schema: Arc<B::Schema>,
        backend: Arc<B>,
        config: PoolConfig,
        label: &str,
    ) -> Result<Self, Error> {
        if label.is_empty() {
            return Err(Error::EmptyLabel);
        }
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let size = config.size.get();
        let (ready_tx, ready_rx) = mpsc::channel(size);
        let pool = Self(Arc::new(PoolInner {
            name: name.into(),
            label: label.into(),
            schema,
            backend,
            config,
            runtime,
            ready_tx,
            ready_rx: AsyncMutex::new(ready_rx),
            next_id: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
            ledger: AsyncMutex::new(Ledger::default()),
            failure: OnceLock::new(),
            poisoned: CancellationToken::new(),
            metrics: POOL_METRICS.clone(),
            kv: pool_kv(name),
        }));
        debug!(pool = name, label, size, "starting background pool");
        for _ in 0..size {
            pool.replenish();
        }
        Ok(pool)
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Schema bound to this pool.
    #[must_use]
    pub fn schema(&self) -> &Arc<B::Schema> {
        &self.0.schema
    }

    /// Configuration this pool was started with.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.0.config
    }

    /// Whether two handles refer to the same pool.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Whether provided schema is compatible with the one bound to this pool.
    #[must_use]
    pub fn schema_matches(&self, schema: &Arc<B::Schema>) -> bool {
        Arc::ptr_eq(&self.0.schema, schema) || *self.0.schema == **schema
    }

    /// Fatal provisioning failure, if the pool has been poisoned.
    #[must_use]
    pub fn failure(&self) -> Option<Error> {
        self.0.failure.get().cloned()
    }

    /// Get point-in-time pool counters.
    #[must_use]
    pub fn state(&self) -> PoolState {
        let capacity = self.0.ready_tx.max_capacity();
        PoolState {
            capacity,
            ready: capacity.saturating_sub(self.0.ready_tx.capacity()),
            pending: self.0.pending.load(Ordering::SeqCst),
            provisioned: self.0.next_id.load(Ordering::SeqCst),
        }
    }

    /// Acquire a prepared resource, waiting no longer than the configured timeout.
    ///
    /// # Errors
    ///
    /// See [`Self::acquire_timeout`].
    pub async fn acquire(&self) -> Result<PristineHandle<B::Handle>, Error> {
        self.acquire_timeout(self.0.config.acquire_timeout).await
    }

    /// Acquire a prepared resource, waiting for a bounded time.
    ///
    /// Schedules provisioning of one replacement resource before waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProvisionTimeout`] if no resource became ready in time. Pool stays usable
    /// after a timeout.
    ///
    /// Returns the stored provisioning failure if the pool has been poisoned.
    pub async fn acquire_timeout(
        &self,
        timeout: Duration,
    ) -> Result<PristineHandle<B::Handle>, Error> {
        let inner = &*self.0;
        if let Some(err) = self.failure() {
            return Err(err);
        }
        self.replenish();
        let now = Instant::now();
        let span = debug_span!("pristine_acquire", pool = inner.name.as_str());
        let wait = async {
            let mut ready = inner.ready_rx.lock().await;
            tokio::select! {
                biased;
                () = inner.poisoned.cancelled() => Err(self.failure().unwrap_or(Error::Closed)),
                prepared = ready.recv() => prepared.ok_or(Error::Closed),
            }
        };
        let prepared = match tokio::time::timeout(timeout, wait).instrument(span).await {
            Ok(res) => res?,
            Err(_) => {
                inner.metrics.timeouts.add(1, &inner.kv);
                warn!(
                    pool = inner.name.as_str(),
                    ?timeout,
                    "resource creation wait exceeded timeout"
                );
                return Err(Error::ProvisionTimeout(timeout));
            }
        };
        inner
            .metrics
            .wait_time
            .record(now.elapsed().as_secs_f64(), &inner.kv);
        self.record_state();
        if inner.config.verbose {
            debug!(
                pool = inner.name.as_str(),
                id = prepared.id,
                name = prepared.name.as_str(),
                "handing out resource"
            );
        }
        Ok(PristineHandle::new(
            inner.metrics.clone(),
            inner.kv.clone(),
            prepared,
        ))
    }

    /// Spawn one background provisioning task.
    ///
    /// Does not wait for completion. A finished task blocks until there is room in the ready
    /// queue.
    pub fn replenish(&self) {
        let pool = self.clone();
        self.0.pending.fetch_add(1, Ordering::SeqCst);
        let span = debug_span!("pristine_provision", pool = self.0.name.as_str());
        self.0
            .runtime
            .spawn(async move { pool.provision_task().await }.instrument(span));
    }

    /// Provision one resource and push it to the ready queue.
    async fn provision_task(self) {
        let started = Instant::now();
        match self.provision().await {
            Ok(prepared) => {
                self.0
                    .metrics
                    .provision_time
                    .record(started.elapsed().as_secs_f64(), &self.0.kv);
                self.0.metrics.provisioned.add(1, &self.0.kv);
                let id = prepared.id;
                tokio::select! {
                    biased;
                    () = self.0.poisoned.cancelled() => {
                        debug!(id, "pool is poisoned, discarding resource");
                    }
                    res = self.0.ready_tx.send(prepared) => {
                        if res.is_err() {
                            warn!(id, "ready queue closed, discarding resource");
                        }
                    }
                }
            }
            Err(err) => self.fail(err),
        }
        self.0.pending.fetch_sub(1, Ordering::SeqCst);
        self.record_state();
    }

    /// Create, open and prepare a single resource.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the resource could not be opened or prepared. Failure to create the
    /// resource is only logged.
    pub(crate) async fn provision(&self) -> Result<Prepared<B::Handle>, Error> {
        let inner = &*self.0;
        let id = inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let name = self.resource_name(id);
        if let Err(err) = inner.backend.create(&name).await {
            debug!(id, name = name.as_str(), %err, "resource creation failed, trying to open anyway");
        }
        let handle = inner
            .backend
            .open(&name, &inner.schema)
            .await
            .map_err(|err| Error::OpenFailed {
                name: name.clone(),
                source: Error::backend(err),
            })?;
        {
            let mut ledger = inner.ledger.lock().await;
            ledger
                .prepare(id, &handle, inner.config.steps(), inner.config.verbose)
                .await?;
            // Identities are never reused.
            ledger.forget(id);
        }
        if inner.config.verbose {
            debug!(id, name = name.as_str(), "opened new resource");
        }
        Ok(Prepared { id, name, handle })
    }

    /// Build external resource name.
    ///
    /// Includes process ID, so that concurrent processes on one host never collide.
    fn resource_name(&self, id: u64) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.0.config.name_prefix,
            self.0.name,
            self.0.label,
            id,
            std::process::id()
        )
    }

    /// Handle fatal provisioning failure according to configured policy.
    fn fail(&self, err: Error) {
        error!(pool = self.0.name.as_str(), %err, "provisioning failed");
        if self.0.config.on_failure == FailurePolicy::Exit {
            // Exiting skips destructors, so buffered log writers never get flushed.
            let _ = writeln!(
                io::stderr().lock(),
                "pristine: pool {} provisioning failed: {err}",
                self.0.name
            );
            std::process::exit(1);
        }
        // First failure wins.
        let _ = self.0.failure.set(err);
        self.0.poisoned.cancel();
    }

    fn record_state(&self) {
        self.0.metrics.record_state(&self.0.kv, &self.state());
    }
}
