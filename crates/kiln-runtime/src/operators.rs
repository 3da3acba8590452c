//! Shared operator dispatch table.
//!
//! Each backend contributes its operator entries once, the first time its
//! context is created. Runners consult the table to pick an implementation
//! for every graph node, walking their backend order.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use kiln_backend_api::{BackendKind, OpEntry, Operator};
use tracing::{debug, warn};

#[derive(Default)]
struct TableState {
    /// Entries keyed by operator type, in registration order.
    entries: HashMap<String, Vec<OpEntry>>,

    /// Backends whose entries have been merged.
    registered: BTreeSet<BackendKind>,

    /// Every `register_once` call per backend, including ignored ones.
    calls: HashMap<BackendKind, usize>,
}

/// Operator dispatch table shared by every runner built from one registry.
#[derive(Default)]
pub struct OperatorTable {
    state: RwLock<TableState>,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `entries` contributed by `kind`.
    ///
    /// Only the first call per backend has an effect. Returns whether the
    /// entries were merged.
    pub fn register_once(&self, kind: BackendKind, entries: Vec<OpEntry>) -> bool {
        let mut state = self.state.write().expect("operator table lock poisoned");
        *state.calls.entry(kind).or_insert(0) += 1;

        if !state.registered.insert(kind) {
            warn!(backend = %kind, "operators already registered, ignoring");
            return false;
        }

        let count = entries.len();
        for entry in entries {
            if entry.backend != kind {
                warn!(
                    backend = %kind,
                    op_type = %entry.op_type,
                    entry_backend = %entry.backend,
                    "operator entry filed under another backend"
                );
            }
            state
                .entries
                .entry(entry.op_type.clone())
                .or_default()
                .push(entry);
        }

        debug!(backend = %kind, count, "registered operators");
        true
    }

    /// Number of times `register_once` was called for `kind`.
    pub fn registration_count(&self, kind: BackendKind) -> usize {
        let state = self.state.read().expect("operator table lock poisoned");
        state.calls.get(&kind).copied().unwrap_or(0)
    }

    /// Whether `kind` has contributed its entries.
    pub fn is_registered(&self, kind: BackendKind) -> bool {
        let state = self.state.read().expect("operator table lock poisoned");
        state.registered.contains(&kind)
    }

    /// Backends whose entries are in the table.
    pub fn registered_backends(&self) -> Vec<BackendKind> {
        let state = self.state.read().expect("operator table lock poisoned");
        state.registered.iter().copied().collect()
    }

    /// All entries for an operator type.
    pub fn entries_for(&self, op_type: &str) -> Vec<OpEntry> {
        let state = self.state.read().expect("operator table lock poisoned");
        state.entries.get(op_type).cloned().unwrap_or_default()
    }

    /// Pick the implementation for `op_type` at `opset`.
    ///
    /// Backends are tried in `order`; the first one with an entry covering
    /// `opset` wins.
    pub fn resolve(&self, op_type: &str, opset: u32, order: &[BackendKind]) -> Option<OpEntry> {
        let state = self.state.read().expect("operator table lock poisoned");
        let candidates = state.entries.get(op_type)?;
        order.iter().find_map(|backend| {
            candidates
                .iter()
                .find(|entry| entry.backend == *backend && entry.supports_opset(opset))
                .cloned()
        })
    }

    /// Resolve and instantiate in one step.
    pub fn instantiate(
        &self,
        op_type: &str,
        opset: u32,
        order: &[BackendKind],
    ) -> Option<Box<dyn Operator>> {
        self.resolve(op_type, opset, order)
            .map(|entry| entry.instantiate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Stub {
        op_type: &'static str,
        backend: BackendKind,
    }

    impl Operator for Stub {
        fn op_type(&self) -> &str {
            self.op_type
        }

        fn backend(&self) -> BackendKind {
            self.backend
        }
    }

    fn entry(op_type: &'static str, backend: BackendKind, opset_min: u32) -> OpEntry {
        OpEntry::new(
            op_type,
            backend,
            opset_min,
            Arc::new(move || Box::new(Stub { op_type, backend }) as Box<dyn Operator>),
        )
    }

    #[test]
    fn test_register_once_ignores_second_call() {
        let table = OperatorTable::new();
        assert!(table.register_once(BackendKind::Cpu, vec![entry("Relu", BackendKind::Cpu, 1)]));
        assert!(!table.register_once(BackendKind::Cpu, vec![entry("Relu", BackendKind::Cpu, 1)]));

        assert_eq!(table.entries_for("Relu").len(), 1);
        assert_eq!(table.registration_count(BackendKind::Cpu), 2);
        assert!(table.is_registered(BackendKind::Cpu));
        assert!(!table.is_registered(BackendKind::WebGl));
    }

    #[test]
    fn test_resolve_follows_backend_order() {
        let table = OperatorTable::new();
        table.register_once(
            BackendKind::Cpu,
            vec![entry("Relu", BackendKind::Cpu, 1), entry("Gemm", BackendKind::Cpu, 1)],
        );
        table.register_once(BackendKind::WebGl, vec![entry("Relu", BackendKind::WebGl, 1)]);

        let order = [BackendKind::WebGl, BackendKind::Cpu];
        let relu = table.resolve("Relu", 13, &order).unwrap();
        assert_eq!(relu.backend, BackendKind::WebGl);

        // WebGL has no Gemm, CPU picks it up.
        let gemm = table.resolve("Gemm", 13, &order).unwrap();
        assert_eq!(gemm.backend, BackendKind::Cpu);

        assert!(table.resolve("Conv", 13, &order).is_none());
    }

    #[test]
    fn test_resolve_skips_unsupported_opset() {
        let table = OperatorTable::new();
        table.register_once(
            BackendKind::WebGl,
            vec![entry("Reshape", BackendKind::WebGl, 1).with_opset_max(5)],
        );
        table.register_once(BackendKind::Cpu, vec![entry("Reshape", BackendKind::Cpu, 5)]);

        let order = [BackendKind::WebGl, BackendKind::Cpu];
        assert_eq!(
            table.resolve("Reshape", 4, &order).unwrap().backend,
            BackendKind::WebGl
        );
        assert_eq!(
            table.resolve("Reshape", 13, &order).unwrap().backend,
            BackendKind::Cpu
        );
    }

    #[test]
    fn test_instantiate() {
        let table = OperatorTable::new();
        table.register_once(BackendKind::Wasm, vec![entry("Conv", BackendKind::Wasm, 1)]);

        let op = table
            .instantiate("Conv", 11, &[BackendKind::Wasm, BackendKind::Cpu])
            .unwrap();
        assert_eq!(op.op_type(), "Conv");
        assert_eq!(op.backend(), BackendKind::Wasm);
        assert!(table.instantiate("Conv", 11, &[BackendKind::Cpu]).is_none());
    }

    #[test]
    fn test_registered_backends_sorted() {
        let table = OperatorTable::new();
        table.register_once(BackendKind::WebGpu, Vec::new());
        table.register_once(BackendKind::Cpu, Vec::new());
        assert_eq!(
            table.registered_backends(),
            vec![BackendKind::Cpu, BackendKind::WebGpu]
        );
    }
}
