//! Error types for backend bootstrap.

use kiln_backend_api::{ApiError, BackendKind};

/// Errors surfaced by [`Bootstrap::load`](crate::Bootstrap::load).
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The optimized (precompiled) model path was requested.
    #[error("optimized model not supported")]
    OptimizedNotSupported,

    /// A backend order entry does not name any backend.
    #[error("Unknown backend {name}")]
    UnknownBackend { name: String },

    /// Every candidate in the backend order failed.
    #[error("No backend available")]
    NoBackendAvailable,

    /// The CPU context could not be created.
    #[error("cpu backend failed to initialize: {reason}")]
    CpuUnavailable { reason: String },

    /// The runner failed to load the model.
    #[error("failed to load model {directory}/{basename}: {source}")]
    ModelLoad {
        directory: String,
        basename: String,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration could not be read or parsed.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A context bundle violated its invariants.
    #[error("invalid context bundle: {0}")]
    Bundle(ApiError),
}

impl RuntimeError {
    /// Exit code for CLI hosts.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Malformed or unsupported request
            Self::OptimizedNotSupported => 1,
            Self::UnknownBackend { .. } => 1,
            Self::Config { .. } => 1,

            // Environment cannot run anything
            Self::NoBackendAvailable => 2,
            Self::CpuUnavailable { .. } => 2,

            // Model assets
            Self::ModelLoad { .. } => 3,

            // Collaborator bug
            Self::Bundle(_) => 4,
        }
    }

    /// Whether the request itself was rejected, independent of the host.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::OptimizedNotSupported | Self::UnknownBackend { .. } | Self::Config { .. }
        )
    }
}

impl From<ApiError> for RuntimeError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::UnknownBackend { name } => Self::UnknownBackend { name },
            other => Self::Bundle(other),
        }
    }
}

/// Result type for bootstrap operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Why an optional backend could not be used.
///
/// Cloneable so every caller waiting on the same initialization sees the
/// same failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} backend unavailable: {message}")]
pub struct InitFailure {
    pub kind: BackendKind,
    pub message: String,
}

impl InitFailure {
    /// Capture a provider error, keeping its full context chain.
    pub fn from_error(kind: BackendKind, err: &anyhow::Error) -> Self {
        Self {
            kind,
            message: format!("{:#}", err),
        }
    }

    /// The host registered no provider for `kind`.
    pub fn no_provider(kind: BackendKind) -> Self {
        Self {
            kind,
            message: "no provider registered".to_string(),
        }
    }
}
