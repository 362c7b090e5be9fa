use std::sync::{Arc, LazyLock};

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram},
    Key, KeyValue,
};

/// Central metrics singleton for background pool metrics.
pub(crate) static POOL_METRICS: LazyLock<Arc<Metrics>> = LazyLock::new(|| Arc::new(Metrics::new()));

const KEY_POOL_NAME: Key = Key::from_static_str("pristine.pool.name");

/// Storage for pool metrics.
pub(crate) struct Metrics {
    /// The time it took to obtain a prepared resource from the pool.
    pub(crate) wait_time: Histogram<f64>,
    /// The time between handing out a resource and dropping it.
    pub(crate) use_time: Histogram<f64>,
    /// The time it took to create, open and prepare a single resource.
    pub(crate) provision_time: Histogram<f64>,
    /// Number of resources successfully provisioned.
    pub(crate) provisioned: Counter<u64>,
    /// Number of acquisitions that ran out of time.
    pub(crate) timeouts: Counter<u64>,
    /// Number of prepared resources waiting in the ready queue.
    pub(crate) ready: Gauge<u64>,
    /// Number of provisioning tasks in flight.
    pub(crate) pending: Gauge<u64>,
}

impl Metrics {
    /// Create new storage for pool metrics.
    pub(crate) fn new() -> Self {
        let meter = global::meter("pristine-pools");
        let wait_time = meter
            .f64_histogram("pristine.pool.acquire.wait_time")
            .with_unit("s")
            .with_description("The time it took to obtain a prepared resource from the pool.")
            .build();
        let use_time = meter
            .f64_histogram("pristine.pool.resource.use_time")
            .with_unit("s")
            .with_description("The time between handing out a resource and dropping it.")
            .build();
        let provision_time = meter
            .f64_histogram("pristine.pool.provision.duration")
            .with_unit("s")
            .with_description("The time it took to create, open and prepare a single resource.")
            .build();
        let provisioned = meter
            .u64_counter("pristine.pool.provisioned")
            .with_description("Number of resources successfully provisioned.")
            .build();
        let timeouts = meter
            .u64_counter("pristine.pool.acquire.timeouts")
            .with_description("Number of acquisitions that ran out of time.")
            .build();
        let ready = meter
            .u64_gauge("pristine.pool.ready")
            .with_description("Number of prepared resources waiting in the ready queue.")
            .build();
        let pending = meter
            .u64_gauge("pristine.pool.pending")
            .with_description("Number of provisioning tasks in flight.")
            .build();
        Metrics {
            wait_time,
            use_time,
            provision_time,
            provisioned,
            timeouts,
            ready,
            pending,
        }
    }

    pub(crate) fn record_state(&self, label: &[KeyValue], state: &PoolState) {
        self.ready.record(state.ready as u64, label);
        self.pending.record(state.pending as u64, label);
    }
}

pub(crate) fn pool_kv(name: &str) -> [KeyValue; 1] {
    [KeyValue::new(KEY_POOL_NAME, name.to_string())]
}

/// Point-in-time snapshot of a background pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolState {
    /// Capacity of the ready queue.
    pub capacity: usize,
    /// Prepared resources waiting to be handed out.
    pub ready: usize,
    /// Provisioning tasks started but not yet finished.
    ///
    /// Includes tasks blocked on a full ready queue.
    pub pending: usize,
    /// Number of resource identities allocated so far.
    pub provisioned: u64,
}
