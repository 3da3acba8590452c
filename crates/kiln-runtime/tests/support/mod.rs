//! Fake backends and runners shared by the integration tests.

#![allow(dead_code)]

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kiln_runtime::api::{
    BackendContext, BackendContexts, BackendKind, BackendOrder, BackendProvider, InitRequest,
    OpEntry, Operator, ProgressCallback, Runner, RunnerBuilder, SharedContext,
};
use kiln_runtime::{BackendTable, Bootstrap};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct FakeContext {
    pub kind: BackendKind,
    pub options: serde_json::Value,
}

impl BackendContext for FakeContext {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct FakeOp {
    op_type: String,
    backend: BackendKind,
}

impl Operator for FakeOp {
    fn op_type(&self) -> &str {
        &self.op_type
    }

    fn backend(&self) -> BackendKind {
        self.backend
    }
}

/// Provider with a call counter, optionally failing or slow.
pub struct FakeProvider {
    kind: BackendKind,
    fail: bool,
    delay: Duration,
    op_types: Vec<&'static str>,
    creates: AtomicUsize,
}

impl FakeProvider {
    pub fn working(kind: BackendKind) -> Arc<Self> {
        Arc::new(Self::build(kind, false))
    }

    pub fn broken(kind: BackendKind) -> Arc<Self> {
        Arc::new(Self::build(kind, true))
    }

    pub fn slow(kind: BackendKind, fail: bool, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::build(kind, fail)
        })
    }

    fn build(kind: BackendKind, fail: bool) -> Self {
        Self {
            kind,
            fail,
            delay: Duration::ZERO,
            op_types: vec!["Relu", "Conv"],
            creates: AtomicUsize::new(0),
        }
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendProvider for FakeProvider {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn create(&self, request: InitRequest) -> anyhow::Result<SharedContext> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            anyhow::bail!("{} adapter not found", self.kind);
        }
        if self.kind.is_accelerated() && request.cpu.is_none() {
            anyhow::bail!("{} requires the cpu context", self.kind);
        }
        Ok(Arc::new(FakeContext {
            kind: self.kind,
            options: request.options,
        }))
    }

    fn op_entries(&self) -> Vec<OpEntry> {
        let backend = self.kind;
        self.op_types
            .iter()
            .map(|op_type| {
                let op_type = op_type.to_string();
                let name = op_type.clone();
                OpEntry::new(
                    op_type,
                    backend,
                    1,
                    Arc::new(move || {
                        Box::new(FakeOp {
                            op_type: name.clone(),
                            backend,
                        }) as Box<dyn Operator>
                    }),
                )
            })
            .collect()
    }
}

/// A model load observed by the recording runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCall {
    pub directory: String,
    pub basename: String,
    pub order: Vec<BackendKind>,
    pub bundle: Vec<BackendKind>,
    pub had_progress: bool,
}

pub struct RecordingRunner {
    order: BackendOrder,
    contexts: BackendContexts,
    fail_load: bool,
    calls: Arc<Mutex<Vec<LoadCall>>>,
}

impl RecordingRunner {
    pub fn contexts(&self) -> &BackendContexts {
        &self.contexts
    }
}

#[async_trait]
impl Runner for RecordingRunner {
    fn backend_order(&self) -> &BackendOrder {
        &self.order
    }

    async fn load_model(
        &mut self,
        directory: &str,
        basename: &str,
        progress: Option<ProgressCallback>,
    ) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(LoadCall {
            directory: directory.to_string(),
            basename: basename.to_string(),
            order: self.order.as_slice().to_vec(),
            bundle: self.contexts.kinds(),
            had_progress: progress.is_some(),
        });
        if self.fail_load {
            anyhow::bail!("{}/{} not found", directory, basename);
        }
        if let Some(progress) = progress {
            progress(512, 1024);
            progress(1024, 1024);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingBuilder {
    fail_load: bool,
    calls: Arc<Mutex<Vec<LoadCall>>>,
}

impl RecordingBuilder {
    /// Builder whose runners fail every model load.
    pub fn failing() -> Self {
        Self {
            fail_load: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<LoadCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl RunnerBuilder for RecordingBuilder {
    fn build(&self, order: BackendOrder, contexts: BackendContexts) -> Box<dyn Runner> {
        Box::new(RecordingRunner {
            order,
            contexts,
            fail_load: self.fail_load,
            calls: Arc::clone(&self.calls),
        })
    }
}

/// A bootstrap wired to fakes, keeping handles for assertions.
pub struct Harness {
    pub bootstrap: Bootstrap,
    pub runners: Arc<RecordingBuilder>,
    pub providers: Vec<Arc<FakeProvider>>,
}

impl Harness {
    pub fn new(providers: Vec<Arc<FakeProvider>>) -> Self {
        Self::with_builder(providers, RecordingBuilder::default())
    }

    pub fn with_builder(providers: Vec<Arc<FakeProvider>>, builder: RecordingBuilder) -> Self {
        init_tracing();
        let backends = providers.iter().fold(BackendTable::new(), |table, provider| {
            table.with_provider(Arc::clone(provider) as Arc<dyn BackendProvider>)
        });
        let runners = Arc::new(builder);
        let bootstrap = Bootstrap::new(backends, Arc::clone(&runners) as Arc<dyn RunnerBuilder>);
        Self {
            bootstrap,
            runners,
            providers,
        }
    }

    /// Provider for `kind`, panicking if the harness has none.
    pub fn provider(&self, kind: BackendKind) -> &FakeProvider {
        self.providers
            .iter()
            .find(|p| p.kind == kind)
            .unwrap_or_else(|| panic!("no fake provider for {}", kind))
    }

    pub fn registrations(&self, kind: BackendKind) -> usize {
        self.bootstrap.operators().registration_count(kind)
    }
}
