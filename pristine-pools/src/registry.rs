//! Registry of named background pools.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tracing::info;

use crate::{
    backend::Backend,
    config::PoolConfig,
    error::Error,
    label::process_label,
    pool::BackgroundPool,
    resource::PristineHandle,
};

/// Map of pool names to background pools.
///
/// Construct once per process, and share by reference. Each pool is created lazily on first
/// request, and exactly once per name.
pub struct Registry<B: Backend> {
    /// Provisioning back-end shared by all pools.
    backend: Arc<B>,
    /// Configuration applied to newly created pools.
    config: PoolConfig,
    /// Process identity label.
    label: String,
    /// Pools created so far. Insertion-only.
    pools: Mutex<HashMap<String, BackgroundPool<B>>>,
}

impl<B: Backend> Registry<B> {
    /// Create empty registry.
    ///
    /// Process label is taken from configuration, or derived from the running executable.
    #[must_use]
    pub fn new(backend: B, config: PoolConfig) -> Self {
        let label = config.label.clone().unwrap_or_else(process_label);
        Self {
            backend: Arc::new(backend),
            config,
            label,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Process identity label used in resource names.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Configuration applied to newly created pools.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Provisioning back-end.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get existing pool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<BackgroundPool<B>> {
        self.pools.lock().get(name).cloned()
    }

    /// Get existing pool, or create and start a new one.
    ///
    /// A new pool is bound to `schema`, and starts provisioning its initial batch of resources
    /// in the background. For an existing pool, `schema` may be `None`, otherwise it must match
    /// the bound schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if `schema` differs from the one bound to an existing
    /// pool, [`Error::MissingSchema`] if a new pool is requested without a schema, and
    /// [`Error::EmptyPoolName`] or [`Error::EmptyLabel`] on invalid configuration.
    pub fn get_or_create(
        &self,
        name: &str,
        schema: Option<Arc<B::Schema>>,
    ) -> Result<BackgroundPool<B>, Error> {
        if name.is_empty() {
            return Err(Error::EmptyPoolName);
        }
        let pool = {
            let mut pools = self.pools.lock();
            match pools.get(name) {
                Some(pool) => pool.clone(),
                None => {
                    let schema = schema.ok_or_else(|| Error::MissingSchema(name.into()))?;
                    let pool = BackgroundPool::start(
                        name,
                        schema,
                        self.backend.clone(),
                        self.config.clone(),
                        &self.label,
                    )?;
                    pools.insert(name.into(), pool.clone());
                    info!(pool = name, "created background pool");
                    return Ok(pool);
                }
            }
        };
        match schema {
            Some(schema) if !pool.schema_matches(&schema) => Err(Error::SchemaMismatch {
                pool: name.into(),
            }),
            _ => Ok(pool),
        }
    }

    /// Get a prepared resource from a named pool, creating the pool if needed.
    ///
    /// # Errors
    ///
    /// See [`Self::get_or_create`] and [`BackgroundPool::acquire`].
    pub async fn pristine(
        &self,
        name: &str,
        schema: Option<Arc<B::Schema>>,
    ) -> Result<PristineHandle<B::Handle>, Error> {
        self.get_or_create(name, schema)?.acquire().await
    }
}

impl<B: Backend> std::fmt::Debug for Registry<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.pools.lock().keys().cloned().collect();
        names.sort();
        f.debug_struct("Registry")
            .field("label", &self.label)
            .field("pools", &names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroUsize, time::Duration};

    use super::*;
    use crate::testing::{MockBackend, MockSchema, Op};

    fn registry(backend: &MockBackend, size: usize) -> Registry<MockBackend> {
        let config = PoolConfig::default()
            .with_size(NonZeroUsize::new(size).unwrap())
            .with_label("svc");
        Registry::new(backend.clone(), config)
    }

    #[tokio::test]
    async fn schema_is_bound_once() {
        let backend = MockBackend::default();
        let registry = registry(&backend, 1);
        let s1 = Arc::new(MockSchema::new("S1"));
        let pool = registry.get_or_create("pkgA", Some(s1.clone())).unwrap();
        assert!(pool.ptr_eq(&registry.get_or_create("pkgA", None).unwrap()));
        // Structurally equal schema is accepted.
        let same = Arc::new(MockSchema::new("S1"));
        assert!(registry.get_or_create("pkgA", Some(same)).is_ok());
        let err = registry
            .get_or_create("pkgA", Some(Arc::new(MockSchema::new("S2"))))
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { pool } if pool == "pkgA"));
        assert_eq!(**pool.schema(), *s1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pool_is_created_once() {
        let backend = MockBackend::default();
        let registry = Arc::new(registry(&backend, 2));
        let schema = Arc::new(MockSchema::new("S"));
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            let schema = schema.clone();
            tasks.push(tokio::spawn(async move {
                registry.get_or_create("pkgA", Some(schema)).unwrap()
            }));
        }
        let mut pools = Vec::new();
        for task in tasks {
            pools.push(task.await.unwrap());
        }
        assert!(pools.iter().all(|pool| pool.ptr_eq(&pools[0])));
        for _ in 0..1000 {
            if pools[0].state().ready == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(pools[0].state().ready, 2);
        assert_eq!(backend.count(Op::Create), 2);
    }

    #[tokio::test]
    async fn pools_are_independent() {
        let backend = MockBackend::default();
        let registry = registry(&backend, 1);
        let a = registry
            .get_or_create("pkgA", Some(Arc::new(MockSchema::new("A"))))
            .unwrap();
        let b = registry
            .get_or_create("pkgB", Some(Arc::new(MockSchema::new("B"))))
            .unwrap();
        assert!(!a.ptr_eq(&b));
        let handle = registry.pristine("pkgB", None).await.unwrap();
        assert!(handle.name().starts_with("tmpdb-pkgB-svc-"));
        assert_eq!(*handle.schema, MockSchema::new("B"));
    }

    #[tokio::test]
    async fn missing_schema_on_first_use() {
        let registry = registry(&MockBackend::default(), 1);
        let err = registry.get_or_create("pkgA", None).unwrap_err();
        assert!(matches!(err, Error::MissingSchema(name) if name == "pkgA"));
        assert!(registry.get("pkgA").is_none());
    }

    #[tokio::test]
    async fn empty_names_are_rejected() {
        let backend = MockBackend::default();
        let schema = Arc::new(MockSchema::new("S"));
        let registry = registry(&backend, 1);
        let err = registry.get_or_create("", Some(schema.clone())).unwrap_err();
        assert!(matches!(err, Error::EmptyPoolName));

        let unlabeled = Registry::new(backend.clone(), PoolConfig::default().with_label(""));
        let err = unlabeled.get_or_create("pkgA", Some(schema)).unwrap_err();
        assert!(matches!(err, Error::EmptyLabel));
        assert!(unlabeled.get("pkgA").is_none());
        assert_eq!(backend.count(Op::Create), 0);
    }

    #[test]
    fn requires_runtime() {
        let registry = registry(&MockBackend::default(), 1);
        let err = registry
            .get_or_create("pkgA", Some(Arc::new(MockSchema::new("S"))))
            .unwrap_err();
        assert!(matches!(err, Error::NoRuntime));
    }

    #[test]
    fn label_defaults_to_process_name() {
        let registry = Registry::new(MockBackend::default(), PoolConfig::default());
        assert_eq!(registry.label(), process_label());
        assert!(format!("{registry:?}").contains("Registry"));
    }
}
