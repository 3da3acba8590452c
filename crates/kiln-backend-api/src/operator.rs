//! Operator implementations contributed by backends.

use std::fmt;
use std::sync::Arc;

use crate::kind::BackendKind;

/// An instantiated operator implementation.
///
/// Execution itself is owned by the backend engine; the runtime only needs
/// to know where an instance came from.
pub trait Operator: Send + Sync {
    /// Operator type, e.g. `"Conv"`.
    fn op_type(&self) -> &str;

    /// Backend the implementation runs on.
    fn backend(&self) -> BackendKind;
}

/// Creates a fresh operator instance for each graph node.
pub type OperatorFactory = Arc<dyn Fn() -> Box<dyn Operator> + Send + Sync>;

/// One row of a backend's operator table.
#[derive(Clone)]
pub struct OpEntry {
    /// Operator type this entry implements.
    pub op_type: String,

    /// Backend providing the implementation.
    pub backend: BackendKind,

    /// Lowest opset version supported (inclusive).
    pub opset_min: u32,

    /// Highest opset version supported (exclusive). `None` means open-ended.
    pub opset_max: Option<u32>,

    /// Instance constructor.
    pub factory: OperatorFactory,
}

impl OpEntry {
    pub fn new(
        op_type: impl Into<String>,
        backend: BackendKind,
        opset_min: u32,
        factory: OperatorFactory,
    ) -> Self {
        Self {
            op_type: op_type.into(),
            backend,
            opset_min,
            opset_max: None,
            factory,
        }
    }

    /// Cap the supported opset range.
    pub fn with_opset_max(mut self, opset_max: u32) -> Self {
        self.opset_max = Some(opset_max);
        self
    }

    /// Whether this entry can serve a node at `opset`.
    pub fn supports_opset(&self, opset: u32) -> bool {
        opset >= self.opset_min && self.opset_max.map_or(true, |max| opset < max)
    }

    /// Build an operator instance.
    pub fn instantiate(&self) -> Box<dyn Operator> {
        (self.factory)()
    }
}

impl fmt::Debug for OpEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpEntry")
            .field("op_type", &self.op_type)
            .field("backend", &self.backend)
            .field("opset_min", &self.opset_min)
            .field("opset_max", &self.opset_max)
            .finish_non_exhaustive()
    }
}
