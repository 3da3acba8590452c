//! Bootstrap configuration.
//!
//! Configuration can come from code (builder methods), from YAML, or from
//! the environment:
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `KILN_BACKEND_ORDER` | Comma separated backend tokens (default: `webgl,wasm,cpu`) |
//! | `KILN_OPTIMIZED` | Request the optimized model path (always rejected) |
//! | `KILN_MODEL_BASENAME` | Model file name inside the directory (default: `model.onnx`) |
//! | `KILN_WASM_WORKER` | Worker code reference forwarded to the wasm backend |

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use kiln_backend_api::{BackendKind, ProgressCallback};
use serde::{Deserialize, Serialize};

use crate::error::{RuntimeError, RuntimeResult};

/// Model file name used when none is configured.
pub const DEFAULT_MODEL_BASENAME: &str = "model.onnx";

/// Per-kind configuration forwarded verbatim to each backend's initializer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wasm: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webgl: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webgpu: Option<serde_json::Value>,
}

impl BackendOptions {
    /// Options for `kind`, or an empty object when none were given.
    pub fn for_kind(&self, kind: BackendKind) -> serde_json::Value {
        let slot = match kind {
            BackendKind::Cpu => None,
            BackendKind::Wasm => self.wasm.as_ref(),
            BackendKind::WebGl => self.webgl.as_ref(),
            BackendKind::WebGpu => self.webgpu.as_ref(),
        };
        slot.cloned()
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()))
    }

    /// Set options for an accelerated kind. CPU takes no options.
    pub fn set(&mut self, kind: BackendKind, value: serde_json::Value) {
        match kind {
            BackendKind::Cpu => {}
            BackendKind::Wasm => self.wasm = Some(value),
            BackendKind::WebGl => self.webgl = Some(value),
            BackendKind::WebGpu => self.webgpu = Some(value),
        }
    }
}

/// Backend selection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Backend tokens in priority order.
    ///
    /// Kept as raw tokens: an unknown entry is only an error once selection
    /// reaches it.
    #[serde(default = "default_backend_order")]
    pub backend_order: Vec<String>,

    /// Request the optimized model path. Not supported.
    #[serde(default)]
    pub optimized: bool,

    /// Per-kind initializer options.
    #[serde(default)]
    pub backend_options: BackendOptions,

    /// Model file name inside the model directory.
    #[serde(default = "default_model_basename")]
    pub model_basename: String,

    /// Worker code reference for the wasm backend.
    #[serde(default)]
    pub wasm_worker_source: Option<String>,
}

fn default_backend_order() -> Vec<String> {
    BackendKind::default_order()
        .into_iter()
        .map(|kind| kind.as_str().to_string())
        .collect()
}

fn default_model_basename() -> String {
    DEFAULT_MODEL_BASENAME.to_string()
}

fn parse_order(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            backend_order: default_backend_order(),
            optimized: false,
            backend_options: BackendOptions::default(),
            model_basename: default_model_basename(),
            wasm_worker_source: None,
        }
    }
}

impl RuntimeConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            backend_order: std::env::var("KILN_BACKEND_ORDER")
                .map(|v| parse_order(&v))
                .unwrap_or_else(|_| default_backend_order()),
            optimized: std::env::var("KILN_OPTIMIZED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            backend_options: BackendOptions::default(),
            model_basename: std::env::var("KILN_MODEL_BASENAME")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default_model_basename),
            wasm_worker_source: std::env::var("KILN_WASM_WORKER")
                .ok()
                .filter(|v| !v.is_empty()),
        }
    }

    /// Parse YAML configuration.
    pub fn from_yaml_str(raw: &str) -> RuntimeResult<Self> {
        serde_yaml::from_str(raw).map_err(|e| RuntimeError::Config {
            message: format!("failed to parse YAML: {}", e),
        })
    }

    /// Read and parse a YAML configuration file.
    pub fn load(path: &Path) -> RuntimeResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| RuntimeError::Config {
            message: format!("failed to read config {}: {}", path.display(), e),
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Set the backend priority list.
    pub fn with_backend_order(mut self, order: impl IntoIterator<Item = BackendKind>) -> Self {
        self.backend_order = order
            .into_iter()
            .map(|kind| kind.as_str().to_string())
            .collect();
        self
    }

    /// Set the backend priority list from raw tokens.
    pub fn with_backend_tokens<S: Into<String>>(mut self, tokens: impl IntoIterator<Item = S>) -> Self {
        self.backend_order = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Request (or not) the optimized model path.
    pub fn with_optimized(mut self, optimized: bool) -> Self {
        self.optimized = optimized;
        self
    }

    /// Set initializer options for one backend kind.
    pub fn with_backend_option(mut self, kind: BackendKind, value: serde_json::Value) -> Self {
        self.backend_options.set(kind, value);
        self
    }

    /// Set the model file name.
    pub fn with_model_basename(mut self, basename: impl Into<String>) -> Self {
        self.model_basename = basename.into();
        self
    }

    /// Set the wasm worker code reference.
    pub fn with_wasm_worker_source(mut self, source: impl Into<String>) -> Self {
        self.wasm_worker_source = Some(source.into());
        self
    }
}

/// Options for a single load call.
#[derive(Clone, Default)]
pub struct LoadOptions {
    pub config: RuntimeConfig,

    /// Forwarded unchanged to the runner's model loader.
    pub progress_callback: Option<ProgressCallback>,
}

impl LoadOptions {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            progress_callback: None,
        }
    }

    /// Attach a progress sink, called with `(loaded, total)`.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }
}

impl From<RuntimeConfig> for LoadOptions {
    fn from(config: RuntimeConfig) -> Self {
        Self::new(config)
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("config", &self.config)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}
