//! Backend selection.
//!
//! Walks the caller's backend order and settles on the first kind that
//! yields a usable context:
//!
//! ```text
//!   Idle ──▶ Trying(kind) ──ok──▶ Succeeded(kind)
//!              │    ▲
//!              │    └── init failed, next token
//!              ├── unknown token ──▶ error (selection aborted)
//!              └── order exhausted ──▶ Exhausted
//! ```
//!
//! Optional backend failures never abort selection; they are recorded in
//! the [`SelectionReport`]. An unknown token does abort it, even if valid
//! candidates follow.

use std::fmt;

use kiln_backend_api::{BackendContexts, BackendKind, InitRequest, SharedContext};
use tracing::{debug, info, warn};

use crate::backends::BackendTable;
use crate::cache::{ContextCache, ContextOrigin};
use crate::config::BackendOptions;
use crate::error::{InitFailure, RuntimeError, RuntimeResult};

/// Where a selection run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    Trying(BackendKind),
    Succeeded(BackendKind),
    Exhausted,
}

/// What happened to one candidate in the backend order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// CPU, accepted without initialization.
    Accepted,
    /// A cached context was reused.
    Reused,
    /// A new context was created by this selection.
    Created,
    /// Another in-flight selection created the context.
    Joined,
    /// The backend could not be used; selection moved on.
    Failed(InitFailure),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

impl From<ContextOrigin> for AttemptOutcome {
    fn from(origin: ContextOrigin) -> Self {
        match origin {
            ContextOrigin::Cached => Self::Reused,
            ContextOrigin::Created => Self::Created,
            ContextOrigin::Joined => Self::Joined,
        }
    }
}

/// One candidate tried during selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub kind: BackendKind,
    pub outcome: AttemptOutcome,
}

/// Diagnostics for a completed selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionReport {
    pub chosen: BackendKind,
    pub attempts: Vec<Attempt>,
}

impl SelectionReport {
    /// Failures absorbed while falling back.
    pub fn failures(&self) -> impl Iterator<Item = &InitFailure> {
        self.attempts.iter().filter_map(|attempt| match &attempt.outcome {
            AttemptOutcome::Failed(failure) => Some(failure),
            _ => None,
        })
    }
}

impl fmt::Display for SelectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "selected {}", self.chosen)?;
        for failure in self.failures() {
            write!(f, "; skipped {}: {}", failure.kind, failure.message)?;
        }
        Ok(())
    }
}

/// Result of a successful selection.
#[derive(Debug, Clone)]
pub struct Selection {
    pub chosen: BackendKind,
    pub contexts: BackendContexts,
    pub report: SelectionReport,
}

/// Runs one selection against a cache and provider table.
pub struct BackendSelector<'a> {
    cache: &'a ContextCache,
    backends: &'a BackendTable,
    state: SelectionState,
    attempts: Vec<Attempt>,
}

impl<'a> BackendSelector<'a> {
    pub fn new(cache: &'a ContextCache, backends: &'a BackendTable) -> Self {
        Self {
            cache,
            backends,
            state: SelectionState::Idle,
            attempts: Vec::new(),
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    /// Select a backend from `order`.
    ///
    /// The CPU context is created first; every accelerated context is built
    /// on it. Contexts created before an unknown token is reached stay
    /// cached.
    pub async fn select<S: AsRef<str>>(
        mut self,
        order: &[S],
        options: &BackendOptions,
        worker_source: Option<&str>,
    ) -> RuntimeResult<Selection> {
        let cpu = self.ensure_cpu().await?;
        let mut contexts = BackendContexts::new(cpu.clone())?;

        for token in order {
            let kind: BackendKind = match token.as_ref().parse() {
                Ok(kind) => kind,
                Err(err) => {
                    warn!(token = token.as_ref(), "unknown backend in order, aborting selection");
                    return Err(err.into());
                }
            };
            self.transition(SelectionState::Trying(kind));

            if kind == BackendKind::Cpu {
                self.record(kind, AttemptOutcome::Accepted);
                self.transition(SelectionState::Succeeded(kind));
                break;
            }

            let request = InitRequest::accelerated(cpu.clone(), options.for_kind(kind))
                .with_worker_source(if kind == BackendKind::Wasm {
                    worker_source.map(String::from)
                } else {
                    None
                });

            if let Some(context) = self.try_accelerated(kind, request).await {
                contexts = contexts.with_accelerated(context)?;
                self.transition(SelectionState::Succeeded(kind));
                break;
            }
        }

        match self.state {
            SelectionState::Succeeded(chosen) => {
                info!(backend = %chosen, attempts = self.attempts.len(), "selected backend");
                Ok(Selection {
                    chosen,
                    contexts,
                    report: SelectionReport {
                        chosen,
                        attempts: self.attempts,
                    },
                })
            }
            _ => {
                self.transition(SelectionState::Exhausted);
                Err(RuntimeError::NoBackendAvailable)
            }
        }
    }

    async fn ensure_cpu(&self) -> RuntimeResult<SharedContext> {
        let provider = self
            .backends
            .get(BackendKind::Cpu)
            .ok_or_else(|| RuntimeError::CpuUnavailable {
                reason: "no provider registered".to_string(),
            })?;

        self.cache
            .get_or_create(provider, InitRequest::cpu())
            .await
            .map(|acquired| acquired.context)
            .map_err(|failure| RuntimeError::CpuUnavailable {
                reason: failure.message,
            })
    }

    async fn try_accelerated(
        &mut self,
        kind: BackendKind,
        request: InitRequest,
    ) -> Option<SharedContext> {
        let Some(provider) = self.backends.get(kind) else {
            debug!(backend = %kind, "no provider registered, skipping");
            self.record(kind, AttemptOutcome::Failed(InitFailure::no_provider(kind)));
            return None;
        };

        match self.cache.get_or_create(provider, request).await {
            Ok(acquired) => {
                self.record(kind, acquired.origin.into());
                Some(acquired.context)
            }
            Err(failure) => {
                warn!(backend = %kind, error = %failure.message, "backend unavailable, falling back");
                self.record(kind, AttemptOutcome::Failed(failure));
                None
            }
        }
    }

    fn record(&mut self, kind: BackendKind, outcome: AttemptOutcome) {
        self.attempts.push(Attempt { kind, outcome });
    }

    fn transition(&mut self, next: SelectionState) {
        debug!(from = ?self.state, to = ?next, "selection state");
        self.state = next;
    }
}
