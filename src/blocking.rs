//! Registry facade for synchronous callers.

use std::sync::Arc;

use pristine_pools::{Backend, BackgroundPool, Error, PoolConfig, PristineHandle, Registry};
use tokio::runtime::Runtime;

use crate::{config::PristineConfig, errors::PristineError, runtime::RuntimeConfig};

/// Pool registry bundled with its own Tokio runtime.
///
/// Intended for plain `#[test]` functions and other code living outside of async context.
/// Must not be dropped from within an async context.
pub struct BlockingRegistry<B: Backend> {
    /// Runtime driving background provisioning.
    runtime: Runtime,
    /// Wrapped registry.
    registry: Registry<B>,
}

impl<B: Backend> BlockingRegistry<B> {
    /// Build runtime and create empty registry.
    ///
    /// # Errors
    ///
    /// Returns `Err` if runtime cannot be built.
    pub fn new(backend: B, pool: PoolConfig, runtime: &RuntimeConfig) -> Result<Self, PristineError> {
        Ok(Self {
            runtime: runtime.build().map_err(PristineError::Runtime)?,
            registry: Registry::new(backend, pool),
        })
    }

    /// Build runtime and create empty registry using loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err` if runtime cannot be built.
    pub fn from_config(backend: B, config: &PristineConfig) -> Result<Self, PristineError> {
        Self::new(backend, config.pool.clone(), &config.runtime)
    }

    /// Wrapped registry.
    #[must_use]
    pub fn registry(&self) -> &Registry<B> {
        &self.registry
    }

    /// Runtime driving background provisioning.
    ///
    /// Use it to drive asynchronous handle operations.
    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Get existing pool, or create and start a new one.
    ///
    /// # Errors
    ///
    /// See [`Registry::get_or_create`].
    pub fn get_or_create(
        &self,
        name: &str,
        schema: Option<Arc<B::Schema>>,
    ) -> Result<BackgroundPool<B>, Error> {
        let _guard = self.runtime.enter();
        self.registry.get_or_create(name, schema)
    }

    /// Get a prepared resource from a named pool, blocking until one is ready.
    ///
    /// # Errors
    ///
    /// See [`Registry::pristine`].
    pub fn pristine(
        &self,
        name: &str,
        schema: Option<Arc<B::Schema>>,
    ) -> Result<PristineHandle<B::Handle>, Error> {
        self.runtime.block_on(self.registry.pristine(name, schema))
    }
}

impl<B: Backend> std::fmt::Debug for BlockingRegistry<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingRegistry")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        convert::Infallible,
        num::NonZeroUsize,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use config::{File, FileFormat};
    use pristine_pools::SchemaHandle;

    use super::*;
    use crate::runtime::RuntimeType;

    #[derive(Default)]
    struct MemBackend {
        truncates: Arc<AtomicUsize>,
    }

    struct MemHandle {
        truncates: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Backend for MemBackend {
        type Schema = &'static str;
        type Handle = MemHandle;
        type Error = Infallible;

        async fn create(&self, _name: &str) -> Result<(), Self::Error> {
            Ok(())
        }

        async fn open(
            &self,
            _name: &str,
            _schema: &Arc<Self::Schema>,
        ) -> Result<Self::Handle, Self::Error> {
            Ok(MemHandle {
                truncates: self.truncates.clone(),
            })
        }
    }

    #[async_trait::async_trait]
    impl SchemaHandle for MemHandle {
        type Error = Infallible;

        async fn drop_schema(&self) -> Result<(), Self::Error> {
            Ok(())
        }

        async fn create_schema(&self) -> Result<(), Self::Error> {
            Ok(())
        }

        async fn truncate_tables(&self) -> Result<(), Self::Error> {
            self.truncates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn pool_config() -> PoolConfig {
        PoolConfig::default()
            .with_size(NonZeroUsize::new(2).unwrap())
            .with_label("blocking")
    }

    #[test]
    fn hands_out_distinct_resources() {
        let runtime = RuntimeConfig::default().with_type(RuntimeType::CurrentThread);
        let registry = BlockingRegistry::new(MemBackend::default(), pool_config(), &runtime)
            .unwrap();
        let schema = Arc::new("users");
        let mut ids = HashSet::new();
        for _ in 0..5 {
            let handle = registry.pristine("users", Some(schema.clone())).unwrap();
            assert!(ids.insert(handle.id()));
            assert!(handle.name().starts_with("tmpdb-users-blocking-"));
        }
        let err = registry
            .get_or_create("users", Some(Arc::new("orders")))
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }

    #[test]
    fn background_provisioning_on_worker_threads() {
        let registry = BlockingRegistry::new(
            MemBackend::default(),
            pool_config(),
            &RuntimeConfig::default(),
        )
        .unwrap();
        let truncates = registry.registry().backend().truncates.clone();
        let pool = registry
            .get_or_create("orders", Some(Arc::new("orders")))
            .unwrap();
        for _ in 0..1000 {
            if pool.state().ready == 2 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(pool.state().ready, 2);
        assert_eq!(truncates.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn from_loaded_config() {
        let config = PristineConfig::builder()
            .with_source(File::from_str(
                "pool: { size: 1, label: loaded }\nruntime: { type: current_thread }",
                FileFormat::Yaml,
            ))
            .build()
            .unwrap();
        let registry = BlockingRegistry::from_config(MemBackend::default(), &config).unwrap();
        assert_eq!(registry.registry().label(), "loaded");
        let handle = registry.pristine("users", Some(Arc::new("users"))).unwrap();
        assert_eq!(handle.id(), 1);
    }
}
