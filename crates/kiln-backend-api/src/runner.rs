//! Runner contracts: the consumer of an assembled context bundle.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::BackendContexts;
use crate::kind::BackendKind;

/// Progress sink for model loading, called with `(loaded, total)` bytes.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Execution order a runner tries backends in.
///
/// Either `[cpu]` or `[accelerated, cpu]`: an accelerated backend is always
/// followed by CPU so kernels it lacks can fall back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendOrder(Vec<BackendKind>);

impl BackendOrder {
    /// Order for a selection that settled on `chosen`.
    pub fn for_chosen(chosen: BackendKind) -> Self {
        if chosen.is_accelerated() {
            Self(vec![chosen, BackendKind::Cpu])
        } else {
            Self(vec![BackendKind::Cpu])
        }
    }

    /// Preferred backend.
    pub fn primary(&self) -> BackendKind {
        self.0[0]
    }

    pub fn as_slice(&self) -> &[BackendKind] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, kind: BackendKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = BackendKind> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for BackendOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = self.0.iter().map(BackendKind::as_str).collect();
        write!(f, "[{}]", tokens.join(", "))
    }
}

/// Executes a loaded model using a bundle of backend contexts.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Backends this runner dispatches to, in priority order.
    fn backend_order(&self) -> &BackendOrder;

    /// Load the model graph and weights from `directory`.
    async fn load_model(
        &mut self,
        directory: &str,
        basename: &str,
        progress: Option<ProgressCallback>,
    ) -> anyhow::Result<()>;
}

/// Constructs runners for the bootstrap layer.
pub trait RunnerBuilder: Send + Sync {
    fn build(&self, order: BackendOrder, contexts: BackendContexts) -> Box<dyn Runner>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_selection_runs_cpu_only() {
        let order = BackendOrder::for_chosen(BackendKind::Cpu);
        assert_eq!(order.as_slice(), &[BackendKind::Cpu]);
        assert_eq!(order.primary(), BackendKind::Cpu);
    }

    #[test]
    fn test_accelerated_selection_keeps_cpu_second() {
        for kind in [BackendKind::Wasm, BackendKind::WebGl, BackendKind::WebGpu] {
            let order = BackendOrder::for_chosen(kind);
            assert_eq!(order.as_slice(), &[kind, BackendKind::Cpu]);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            BackendOrder::for_chosen(BackendKind::WebGpu).to_string(),
            "[webgpu, cpu]"
        );
    }
}
