//! Contracts between the Kiln bootstrap layer and the engines around it.
//!
//! Backend engines implement [`BackendProvider`] and [`BackendContext`] and
//! contribute [`OpEntry`] rows to the shared operator table. Model runners
//! implement [`Runner`] and are constructed through a [`RunnerBuilder`] once
//! the bootstrap layer has settled on a [`BackendOrder`].
//!
//! | Kind | Token | Built on |
//! |------|-------|----------|
//! | [`BackendKind::Cpu`] | `cpu` | nothing |
//! | [`BackendKind::Wasm`] | `wasm` | cpu context + worker source |
//! | [`BackendKind::WebGl`] | `webgl` | cpu context |
//! | [`BackendKind::WebGpu`] | `webgpu` | cpu context |

pub mod context;
pub mod error;
pub mod kind;
pub mod operator;
pub mod runner;

pub use context::{BackendContext, BackendContexts, BackendProvider, InitRequest, SharedContext};
pub use error::{ApiError, ApiResult};
pub use kind::BackendKind;
pub use operator::{OpEntry, Operator, OperatorFactory};
pub use runner::{BackendOrder, ProgressCallback, Runner, RunnerBuilder};
