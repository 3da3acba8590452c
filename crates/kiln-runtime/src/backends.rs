//! Provider table: one constructor/initializer pair per backend kind.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use kiln_backend_api::{BackendKind, BackendProvider};

/// Maps each backend kind to the provider that builds its context.
///
/// Kinds without a provider are treated as unavailable on this host.
#[derive(Clone, Default)]
pub struct BackendTable {
    providers: BTreeMap<BackendKind, Arc<dyn BackendProvider>>,
}

impl BackendTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider, filed under the kind it reports.
    pub fn with_provider(mut self, provider: Arc<dyn BackendProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Add a provider, returning the one it replaced.
    pub fn register(
        &mut self,
        provider: Arc<dyn BackendProvider>,
    ) -> Option<Arc<dyn BackendProvider>> {
        self.providers.insert(provider.kind(), provider)
    }

    /// Provider for `kind`.
    pub fn get(&self, kind: BackendKind) -> Option<&Arc<dyn BackendProvider>> {
        self.providers.get(&kind)
    }

    pub fn contains(&self, kind: BackendKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Kinds with a provider, CPU first.
    pub fn kinds(&self) -> Vec<BackendKind> {
        self.providers.keys().copied().collect()
    }
}

impl fmt::Debug for BackendTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendTable")
            .field("kinds", &self.kinds())
            .finish()
    }
}
