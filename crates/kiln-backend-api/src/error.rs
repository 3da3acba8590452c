//! Error types for the backend contracts.

use crate::kind::BackendKind;

/// Errors raised while parsing tokens or assembling context bundles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Token does not name any backend kind.
    #[error("Unknown backend {name}")]
    UnknownBackend { name: String },

    /// A context was filed under a kind it does not report.
    #[error("context kind mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        expected: BackendKind,
        actual: BackendKind,
    },

    /// Only accelerated kinds can join a bundle next to CPU.
    #[error("{kind} is not an accelerated backend")]
    NotAccelerated { kind: BackendKind },

    /// A bundle already holds a different accelerated context.
    #[error("bundle already holds accelerated context {existing}, cannot add {added}")]
    SecondAccelerator {
        existing: BackendKind,
        added: BackendKind,
    },
}

/// Result type for contract-level operations.
pub type ApiResult<T> = Result<T, ApiError>;
