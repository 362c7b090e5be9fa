//! Record of preparation steps applied to pooled resources.

use std::collections::HashSet;

use tracing::debug;

use crate::{backend::SchemaHandle, config::PrepareSteps, error::Error};

/// Per-pool record of which one-time preparation steps were applied to which resource.
///
/// Must only be mutated while holding the owning pool's preparation lock.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    /// Identities with schema already dropped.
    dropped: HashSet<u64>,
    /// Identities with schema already created.
    created: HashSet<u64>,
}

impl Ledger {
    /// Whether schema was already dropped for resource `id`.
    #[must_use]
    pub(crate) fn is_dropped(&self, id: u64) -> bool {
        self.dropped.contains(&id)
    }

    /// Whether schema was already created for resource `id`.
    #[must_use]
    pub(crate) fn is_created(&self, id: u64) -> bool {
        self.created.contains(&id)
    }

    /// Drop all records of resource `id`.
    ///
    /// Called once a prepared resource leaves the pool.
    pub(crate) fn forget(&mut self, id: u64) {
        self.dropped.remove(&id);
        self.created.remove(&id);
    }

    /// Number of identities with at least one recorded step.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.dropped.union(&self.created).count()
    }

    /// Run enabled preparation steps on a resource.
    ///
    /// Drop and create run at most once per identity, no matter how many times this is called.
    /// Truncation runs on every call.
    ///
    /// # Errors
    ///
    /// Returns `Err` on the first failed step. A failed step is not recorded, so it is attempted
    /// again on the next call.
    pub(crate) async fn prepare<H>(
        &mut self,
        id: u64,
        handle: &H,
        steps: PrepareSteps,
        verbose: bool,
    ) -> Result<(), Error>
    where
        H: SchemaHandle + ?Sized,
    {
        if steps.drop_schema && !self.is_dropped(id) {
            if verbose {
                debug!(id, "dropping schema");
            }
            handle
                .drop_schema()
                .await
                .map_err(|err| Error::SchemaDropFailed {
                    id,
                    source: Error::backend(err),
                })?;
            self.dropped.insert(id);
        }
        if steps.create_schema && !self.is_created(id) {
            if verbose {
                debug!(id, "creating schema");
            }
            handle
                .create_schema()
                .await
                .map_err(|err| Error::SchemaCreateFailed {
                    id,
                    source: Error::backend(err),
                })?;
            self.created.insert(id);
        }
        if steps.truncate {
            if verbose {
                debug!(id, "truncating all tables");
            }
            handle
                .truncate_tables()
                .await
                .map_err(|err| Error::TruncateFailed {
                    id,
                    source: Error::backend(err),
                })?;
        }
        if verbose {
            debug!(id, "resource ready");
        }
        Ok(())
    }
}
