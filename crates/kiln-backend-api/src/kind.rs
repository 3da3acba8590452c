//! Backend kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// An execution backend the runtime knows how to bootstrap.
///
/// The set is closed. CPU is always available and every accelerated
/// backend is constructed on top of the CPU context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Cpu,
    Wasm,
    WebGl,
    WebGpu,
}

impl BackendKind {
    /// Every kind, CPU first.
    pub const ALL: [BackendKind; 4] = [Self::Cpu, Self::Wasm, Self::WebGl, Self::WebGpu];

    /// Token used in configuration and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Wasm => "wasm",
            Self::WebGl => "webgl",
            Self::WebGpu => "webgpu",
        }
    }

    /// Whether this kind needs the CPU context to be constructed.
    pub fn is_accelerated(&self) -> bool {
        !matches!(self, Self::Cpu)
    }

    /// Default priority list used when the caller does not supply one.
    pub fn default_order() -> Vec<BackendKind> {
        vec![Self::WebGl, Self::Wasm, Self::Cpu]
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ApiError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "cpu" => Ok(Self::Cpu),
            "wasm" => Ok(Self::Wasm),
            "webgl" => Ok(Self::WebGl),
            "webgpu" => Ok(Self::WebGpu),
            other => Err(ApiError::UnknownBackend {
                name: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_roundtrip_through_from_str() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_token_is_rejected() {
        let err = "foo".parse::<BackendKind>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown backend foo");
    }

    #[test]
    fn test_tokens_are_case_sensitive() {
        assert!("WebGL".parse::<BackendKind>().is_err());
        assert!(" cpu".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_tokens() {
        let json = serde_json::to_string(&BackendKind::WebGpu).unwrap();
        assert_eq!(json, "\"webgpu\"");
        let kind: BackendKind = serde_json::from_str("\"webgl\"").unwrap();
        assert_eq!(kind, BackendKind::WebGl);
    }

    #[test]
    fn test_only_cpu_is_not_accelerated() {
        let accelerated: Vec<_> = BackendKind::ALL
            .into_iter()
            .filter(BackendKind::is_accelerated)
            .collect();
        assert_eq!(
            accelerated,
            vec![BackendKind::Wasm, BackendKind::WebGl, BackendKind::WebGpu]
        );
    }
}
