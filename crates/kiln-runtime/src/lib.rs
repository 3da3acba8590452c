//! Backend selection and context bootstrap for the Kiln inference runtime.
//!
//! Given an ordered list of candidate backends, this crate decides which one
//! becomes active, initializes each backend's shared context at most once,
//! and hands the resulting context bundle to a model runner.
//!
//! - Ordered fallback: the first backend in the order that initializes wins
//! - Optional backend failures are absorbed and reported, never fatal
//! - Single-flight context initialization shared across concurrent loads
//! - Operator tables registered once per backend
//! - CPU always kept as the secondary execution backend
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use kiln_runtime::{BackendTable, Bootstrap, LoadOptions, RuntimeConfig};
//! # use kiln_backend_api::{BackendProvider, RunnerBuilder};
//!
//! # async fn example(
//! #     cpu: Arc<dyn BackendProvider>,
//! #     webgl: Arc<dyn BackendProvider>,
//! #     runners: Arc<dyn RunnerBuilder>,
//! # ) -> anyhow::Result<()> {
//! let backends = BackendTable::new().with_provider(cpu).with_provider(webgl);
//! let bootstrap = Bootstrap::new(backends, runners);
//!
//! let options = LoadOptions::new(RuntimeConfig::from_env())
//!     .with_progress(|loaded, total| println!("{loaded}/{total}"));
//! let runner = bootstrap.load("models/squeezenet", options).await?;
//! println!("running on {}", runner.backend_order());
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod error;
pub mod factory;
pub mod operators;
pub mod selector;

// Re-export main types
pub use backends::BackendTable;
pub use bootstrap::Bootstrap;
pub use cache::{Acquired, ContextCache, ContextOrigin};
pub use config::{BackendOptions, LoadOptions, RuntimeConfig, DEFAULT_MODEL_BASENAME};
pub use error::{InitFailure, RuntimeError, RuntimeResult};
pub use factory::RunnerFactory;
pub use operators::OperatorTable;
pub use selector::{
    Attempt, AttemptOutcome, BackendSelector, Selection, SelectionReport, SelectionState,
};

pub use kiln_backend_api as api;
