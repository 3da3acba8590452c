//! Context cache with single-flight initialization.
//!
//! Each backend kind has one slot. A slot moves from empty to pending when
//! a caller starts initialization, and from pending to ready on success.
//! Callers that arrive while a slot is pending await the same shared
//! future, so a kind is initialized (and its operators registered) at most
//! once no matter how many bootstrap calls overlap. A failed
//! initialization empties the slot again; the next non-overlapping call
//! may retry.
//!
//! ```text
//!   Empty ──get_or_create──▶ Pending(id, shared future)
//!     ▲                          │
//!     └──────── Err ─────────────┤
//!                                └── Ok ──▶ Ready(context)   (never reset)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use kiln_backend_api::{BackendKind, BackendProvider, InitRequest, SharedContext};
use tracing::{debug, info};

use crate::error::InitFailure;
use crate::operators::OperatorTable;

type InitFuture = Shared<BoxFuture<'static, Result<SharedContext, InitFailure>>>;

enum Slot {
    Pending { id: u64, init: InitFuture },
    Ready(SharedContext),
}

#[derive(Default)]
struct CacheState {
    slots: HashMap<BackendKind, Slot>,
    attempts: HashMap<BackendKind, usize>,
    next_id: u64,
}

/// How a context was obtained from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextOrigin {
    /// The slot was already ready.
    Cached,
    /// This call started the initialization.
    Created,
    /// This call waited on an initialization another call started.
    Joined,
}

/// A context handed out by the cache.
#[derive(Clone)]
pub struct Acquired {
    pub context: SharedContext,
    pub origin: ContextOrigin,
}

/// One context slot per backend kind, shared by every bootstrap call on a
/// registry.
pub struct ContextCache {
    state: Mutex<CacheState>,
    operators: Arc<OperatorTable>,
}

impl ContextCache {
    /// Create an empty cache that registers operators into `operators`.
    pub fn new(operators: Arc<OperatorTable>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            operators,
        }
    }

    /// Return the context for the provider's kind, creating it if needed.
    ///
    /// On first success the provider's operator entries are registered.
    /// On failure the slot stays empty and the failure is returned to every
    /// caller that waited on this attempt.
    pub async fn get_or_create(
        &self,
        provider: &Arc<dyn BackendProvider>,
        request: InitRequest,
    ) -> Result<Acquired, InitFailure> {
        let kind = provider.kind();

        let (id, init, origin) = {
            let mut state = self.state.lock().expect("context cache lock poisoned");
            match state.slots.get(&kind) {
                Some(Slot::Ready(context)) => {
                    debug!(backend = %kind, "reusing cached context");
                    return Ok(Acquired {
                        context: Arc::clone(context),
                        origin: ContextOrigin::Cached,
                    });
                }
                Some(Slot::Pending { id, init }) => {
                    debug!(backend = %kind, "joining in-flight initialization");
                    (*id, init.clone(), ContextOrigin::Joined)
                }
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    *state.attempts.entry(kind).or_insert(0) += 1;

                    let init = self.start(Arc::clone(provider), request);
                    state.slots.insert(
                        kind,
                        Slot::Pending {
                            id,
                            init: init.clone(),
                        },
                    );
                    debug!(backend = %kind, "starting initialization");
                    (id, init, ContextOrigin::Created)
                }
            }
        };

        let result = init.await;
        self.settle(kind, id, &result);
        result.map(|context| Acquired { context, origin })
    }

    fn start(&self, provider: Arc<dyn BackendProvider>, request: InitRequest) -> InitFuture {
        let operators = Arc::clone(&self.operators);
        async move {
            let kind = provider.kind();
            let context = provider
                .create(request)
                .await
                .map_err(|err| InitFailure::from_error(kind, &err))?;

            if context.kind() != kind {
                return Err(InitFailure {
                    kind,
                    message: format!("provider returned a {} context", context.kind()),
                });
            }

            operators.register_once(kind, provider.op_entries());
            info!(backend = %kind, "backend context initialized");
            Ok(context)
        }
        .boxed()
        .shared()
    }

    /// Move a pending slot to its final state. Only the attempt identified
    /// by `id` may do so; later attempts own their own slot.
    fn settle(&self, kind: BackendKind, id: u64, result: &Result<SharedContext, InitFailure>) {
        let mut state = self.state.lock().expect("context cache lock poisoned");
        let owns_slot = matches!(
            state.slots.get(&kind),
            Some(Slot::Pending { id: pending, .. }) if *pending == id
        );
        if !owns_slot {
            return;
        }
        match result {
            Ok(context) => {
                state.slots.insert(kind, Slot::Ready(Arc::clone(context)));
            }
            Err(_) => {
                state.slots.remove(&kind);
            }
        }
    }

    /// The ready context for `kind`, if any.
    pub fn get(&self, kind: BackendKind) -> Option<SharedContext> {
        let state = self.state.lock().expect("context cache lock poisoned");
        match state.slots.get(&kind) {
            Some(Slot::Ready(context)) => Some(Arc::clone(context)),
            _ => None,
        }
    }

    /// Whether `kind` has a ready context.
    pub fn is_initialized(&self, kind: BackendKind) -> bool {
        self.get(kind).is_some()
    }

    /// Kinds with a ready context, CPU first.
    pub fn initialized_kinds(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|kind| self.is_initialized(*kind))
            .collect()
    }

    /// Number of initialization attempts started for `kind`.
    pub fn init_attempts(&self, kind: BackendKind) -> usize {
        let state = self.state.lock().expect("context cache lock poisoned");
        state.attempts.get(&kind).copied().unwrap_or(0)
    }

    /// The operator table this cache registers into.
    pub fn operators(&self) -> &Arc<OperatorTable> {
        &self.operators
    }
}
