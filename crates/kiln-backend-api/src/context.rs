//! Backend contexts, their providers, and the bundle handed to runners.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ApiError, ApiResult};
use crate::kind::BackendKind;
use crate::operator::OpEntry;

/// An initialized, backend-specific execution capability.
///
/// Contexts are created once per registry and shared by every runner
/// that executes on that backend.
pub trait BackendContext: Send + Sync + 'static {
    /// Kind this context executes on.
    fn kind(&self) -> BackendKind;

    /// Downcast hook for runners that need the concrete engine type.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a context.
pub type SharedContext = Arc<dyn BackendContext>;

/// Everything a provider receives when asked to build a context.
#[derive(Clone)]
pub struct InitRequest {
    /// The CPU context. Always `Some` for accelerated kinds, `None` for CPU.
    pub cpu: Option<SharedContext>,

    /// Caller-supplied per-kind configuration, forwarded verbatim.
    pub options: serde_json::Value,

    /// Worker code reference (wasm only).
    pub worker_source: Option<String>,
}

impl InitRequest {
    /// Request for the CPU context.
    pub fn cpu() -> Self {
        Self {
            cpu: None,
            options: serde_json::Value::Object(serde_json::Map::new()),
            worker_source: None,
        }
    }

    /// Request for an accelerated context built on `cpu`.
    pub fn accelerated(cpu: SharedContext, options: serde_json::Value) -> Self {
        Self {
            cpu: Some(cpu),
            options,
            worker_source: None,
        }
    }

    /// Attach a worker code reference.
    pub fn with_worker_source(mut self, source: Option<String>) -> Self {
        self.worker_source = source;
        self
    }
}

impl fmt::Debug for InitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitRequest")
            .field("cpu", &self.cpu.as_ref().map(|c| c.kind()))
            .field("options", &self.options)
            .field("worker_source", &self.worker_source)
            .finish()
    }
}

/// Constructor/initializer pair for one backend kind.
#[async_trait]
pub trait BackendProvider: Send + Sync {
    /// Kind of context this provider builds.
    fn kind(&self) -> BackendKind;

    /// Construct and initialize a context.
    ///
    /// Any error means the backend is unusable in this process right now;
    /// the caller decides whether that is fatal.
    async fn create(&self, request: InitRequest) -> anyhow::Result<SharedContext>;

    /// Operator implementations this backend contributes to the dispatch table.
    fn op_entries(&self) -> Vec<OpEntry>;
}

/// The contexts a runner executes with.
///
/// Always holds the CPU context and at most one accelerated context.
#[derive(Clone)]
pub struct BackendContexts {
    cpu: SharedContext,
    accelerated: Option<SharedContext>,
}

impl BackendContexts {
    /// Start a bundle from the CPU context.
    pub fn new(cpu: SharedContext) -> ApiResult<Self> {
        if cpu.kind() != BackendKind::Cpu {
            return Err(ApiError::KindMismatch {
                expected: BackendKind::Cpu,
                actual: cpu.kind(),
            });
        }
        Ok(Self {
            cpu,
            accelerated: None,
        })
    }

    /// Add the accelerated context.
    pub fn with_accelerated(mut self, context: SharedContext) -> ApiResult<Self> {
        let added = context.kind();
        if !added.is_accelerated() {
            return Err(ApiError::NotAccelerated { kind: added });
        }
        if let Some(existing) = &self.accelerated {
            if existing.kind() != added {
                return Err(ApiError::SecondAccelerator {
                    existing: existing.kind(),
                    added,
                });
            }
        }
        self.accelerated = Some(context);
        Ok(self)
    }

    /// The CPU context.
    pub fn cpu(&self) -> &SharedContext {
        &self.cpu
    }

    /// The accelerated context, if one was selected.
    pub fn accelerated(&self) -> Option<&SharedContext> {
        self.accelerated.as_ref()
    }

    /// Context for `kind`, if the bundle holds one.
    pub fn get(&self, kind: BackendKind) -> Option<&SharedContext> {
        if kind == BackendKind::Cpu {
            return Some(&self.cpu);
        }
        self.accelerated.as_ref().filter(|ctx| ctx.kind() == kind)
    }

    /// Whether the bundle holds a context for `kind`.
    pub fn contains(&self, kind: BackendKind) -> bool {
        self.get(kind).is_some()
    }

    /// Kinds held, CPU first.
    pub fn kinds(&self) -> Vec<BackendKind> {
        let mut kinds = vec![BackendKind::Cpu];
        kinds.extend(self.accelerated.as_ref().map(|ctx| ctx.kind()));
        kinds
    }
}

impl fmt::Debug for BackendContexts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendContexts")
            .field("kinds", &self.kinds())
            .finish()
    }
}
