//! Bootstrap entry point.

use std::fmt;
use std::sync::Arc;

use kiln_backend_api::{Runner, RunnerBuilder};
use tracing::debug;

use crate::backends::BackendTable;
use crate::cache::ContextCache;
use crate::config::{LoadOptions, RuntimeConfig};
use crate::error::RuntimeResult;
use crate::factory::RunnerFactory;
use crate::operators::OperatorTable;
use crate::selector::{BackendSelector, Selection, SelectionReport};

struct Inner {
    backends: BackendTable,
    cache: ContextCache,
    operators: Arc<OperatorTable>,
    factory: RunnerFactory,
}

/// Owns the backend contexts and operator table for one host.
///
/// Cloning is cheap and every clone shares the same cache, so a host
/// typically creates one `Bootstrap` at startup and loads every model
/// through it.
#[derive(Clone)]
pub struct Bootstrap {
    inner: Arc<Inner>,
}

impl Bootstrap {
    /// Create a registry from the host's backend providers and runner builder.
    pub fn new(backends: BackendTable, runners: Arc<dyn RunnerBuilder>) -> Self {
        let operators = Arc::new(OperatorTable::new());
        Self {
            inner: Arc::new(Inner {
                backends,
                cache: ContextCache::new(Arc::clone(&operators)),
                operators,
                factory: RunnerFactory::new(runners),
            }),
        }
    }

    /// Select a backend, assemble its contexts, and load the model in
    /// `directory`.
    pub async fn load(&self, directory: &str, options: LoadOptions) -> RuntimeResult<Box<dyn Runner>> {
        self.load_with_report(directory, options)
            .await
            .map(|(runner, _)| runner)
    }

    /// Like [`load`](Self::load), also returning how the backend was chosen.
    pub async fn load_with_report(
        &self,
        directory: &str,
        options: LoadOptions,
    ) -> RuntimeResult<(Box<dyn Runner>, SelectionReport)> {
        let LoadOptions {
            config,
            progress_callback,
        } = options;

        let selection = self.select(&config).await?;
        let runner = self
            .inner
            .factory
            .build(
                selection.chosen,
                selection.contexts,
                directory,
                &config.model_basename,
                progress_callback,
            )
            .await?;

        Ok((runner, selection.report))
    }

    /// Run backend selection only.
    pub async fn select(&self, config: &RuntimeConfig) -> RuntimeResult<Selection> {
        RunnerFactory::check_request(config)?;
        debug!(order = ?config.backend_order, "selecting backend");

        BackendSelector::new(&self.inner.cache, &self.inner.backends)
            .select(
                config.backend_order.as_slice(),
                &config.backend_options,
                config.wasm_worker_source.as_deref(),
            )
            .await
    }

    pub fn cache(&self) -> &ContextCache {
        &self.inner.cache
    }

    pub fn operators(&self) -> &Arc<OperatorTable> {
        &self.inner.operators
    }

    pub fn backends(&self) -> &BackendTable {
        &self.inner.backends
    }
}

impl fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrap")
            .field("backends", &self.inner.backends)
            .field("initialized", &self.inner.cache.initialized_kinds())
            .finish()
    }
}
