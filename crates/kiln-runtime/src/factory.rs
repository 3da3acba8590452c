//! Runner construction.

use std::sync::Arc;

use kiln_backend_api::{
    BackendContexts, BackendKind, BackendOrder, ProgressCallback, Runner, RunnerBuilder,
};
use tracing::info;

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};

/// Builds runners from a selection and loads their model.
#[derive(Clone)]
pub struct RunnerFactory {
    builder: Arc<dyn RunnerBuilder>,
}

impl RunnerFactory {
    pub fn new(builder: Arc<dyn RunnerBuilder>) -> Self {
        Self { builder }
    }

    /// Reject requests this runtime cannot serve. Runs before any backend
    /// is touched.
    pub fn check_request(config: &RuntimeConfig) -> RuntimeResult<()> {
        if config.optimized {
            return Err(RuntimeError::OptimizedNotSupported);
        }
        Ok(())
    }

    /// Execution order for a selection that settled on `chosen`.
    pub fn actual_order(chosen: BackendKind) -> BackendOrder {
        BackendOrder::for_chosen(chosen)
    }

    /// Construct a runner and load the model before handing it out.
    pub async fn build(
        &self,
        chosen: BackendKind,
        contexts: BackendContexts,
        directory: &str,
        basename: &str,
        progress: Option<ProgressCallback>,
    ) -> RuntimeResult<Box<dyn Runner>> {
        let order = Self::actual_order(chosen);
        let mut runner = self.builder.build(order.clone(), contexts);

        runner
            .load_model(directory, basename, progress)
            .await
            .map_err(|source| RuntimeError::ModelLoad {
                directory: directory.to_string(),
                basename: basename.to_string(),
                source,
            })?;

        info!(directory, basename, order = %order, "model loaded");
        Ok(runner)
    }
}
