//! In-memory back-end for pool tests.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::backend::{Backend, SchemaHandle};

/// Back-end operation kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    Create,
    Open,
    DropSchema,
    CreateSchema,
    Truncate,
}

#[derive(Debug, thiserror::Error)]
#[error("mock {0:?} failure")]
pub(crate) struct MockError(Op);

/// Schema descriptor compared by name.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct MockSchema(String);

impl MockSchema {
    pub(crate) fn new(name: &str) -> Self {
        Self(name.into())
    }
}

#[derive(Default)]
struct Inner {
    counts: Mutex<HashMap<Op, usize>>,
    failing: Mutex<Vec<Op>>,
    names: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
}

impl Inner {
    fn record(&self, op: Op) -> Result<(), MockError> {
        *self.counts.lock().entry(op).or_default() += 1;
        if self.failing.lock().contains(&op) {
            return Err(MockError(op));
        }
        Ok(())
    }
}

/// Counting back-end. Optionally holds every `open` until released.
#[derive(Clone, Default)]
pub(crate) struct MockBackend(Arc<Inner>);

impl MockBackend {
    /// Back-end where each `open` waits for a permit from [`Self::release`].
    pub(crate) fn gated() -> Self {
        Self(Arc::new(Inner {
            gate: Some(Semaphore::new(0)),
            ..Default::default()
        }))
    }

    pub(crate) fn release(&self, permits: usize) {
        if let Some(gate) = &self.0.gate {
            gate.add_permits(permits);
        }
    }

    pub(crate) fn fail_on(&self, op: Op) {
        self.0.failing.lock().push(op);
    }

    pub(crate) fn count(&self, op: Op) -> usize {
        self.0.counts.lock().get(&op).copied().unwrap_or_default()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.0.names.lock().clone()
    }

    pub(crate) fn handle(&self, id: u64, schema: Arc<MockSchema>) -> MockHandle {
        MockHandle {
            name: format!("mock-{id}"),
            schema,
            backend: self.0.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Backend for MockBackend {
    type Schema = MockSchema;
    type Handle = MockHandle;
    type Error = MockError;

    async fn create(&self, name: &str) -> Result<(), Self::Error> {
        self.0.names.lock().push(name.into());
        self.0.record(Op::Create)
    }

    async fn open(
        &self,
        name: &str,
        schema: &Arc<Self::Schema>,
    ) -> Result<Self::Handle, Self::Error> {
        if let Some(gate) = &self.0.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.0.record(Op::Open)?;
        Ok(MockHandle {
            name: name.into(),
            schema: schema.clone(),
            backend: self.0.clone(),
        })
    }
}

pub(crate) struct MockHandle {
    pub(crate) name: String,
    pub(crate) schema: Arc<MockSchema>,
    backend: Arc<Inner>,
}

#[async_trait::async_trait]
impl SchemaHandle for MockHandle {
    type Error = MockError;

    async fn drop_schema(&self) -> Result<(), Self::Error> {
        self.backend.record(Op::DropSchema)
    }

    async fn create_schema(&self) -> Result<(), Self::Error> {
        self.backend.record(Op::CreateSchema)
    }

    async fn truncate_tables(&self) -> Result<(), Self::Error> {
        self.backend.record(Op::Truncate)
    }
}
