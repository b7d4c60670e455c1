//! Testbox Core - shim, pipeline, and result marshalling
//!
//! Takes two untrusted strings (source and tests), runs them inside a fresh
//! sandbox behind a tiny Jest-like vocabulary, and hands back a per-test
//! report. A failing test is data; only failures outside a test unit are
//! errors.

pub mod marshal;
pub mod matchers;
pub mod pipeline;
pub mod report;
pub mod request;
pub mod runner;
pub mod shim;

pub use matchers::Matcher;
pub use report::{ExecutionReport, TestResult, TestStatus};
pub use request::{ExecutionRequest, ValidationError};
pub use runner::{RunnerConfig, TestRunner};

use serde::{Deserialize, Serialize};
use testbox_sandbox::SandboxError;

/// Request-level failures. A failing test is never one of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Memory limit of {limit_bytes} bytes exceeded")]
    ResourceExceeded { limit_bytes: usize },

    #[error("Evaluation timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    #[error("Source evaluation failed: {message}")]
    SourceEvaluationFailed { message: String },

    #[error("Test evaluation failed: {message}")]
    TestEvaluationFailed { message: String },

    #[error("Internal shim failure: {message}")]
    InternalShimFailure { message: String },

    #[error("Sandbox unavailable: {0}")]
    SandboxUnavailable(String),
}

/// Stable, serializable name for each [`RunError`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FatalErrorKind {
    Validation,
    ResourceExceeded,
    TimedOut,
    SourceEvaluationFailed,
    TestEvaluationFailed,
    InternalShimFailure,
    SandboxUnavailable,
}

/// What the request handler gets back on a fatal error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: FatalErrorKind,
    pub message: String,
}

impl RunError {
    pub fn kind(&self) -> FatalErrorKind {
        match self {
            RunError::Validation(_) => FatalErrorKind::Validation,
            RunError::ResourceExceeded { .. } => FatalErrorKind::ResourceExceeded,
            RunError::TimedOut { .. } => FatalErrorKind::TimedOut,
            RunError::SourceEvaluationFailed { .. } => FatalErrorKind::SourceEvaluationFailed,
            RunError::TestEvaluationFailed { .. } => FatalErrorKind::TestEvaluationFailed,
            RunError::InternalShimFailure { .. } => FatalErrorKind::InternalShimFailure,
            RunError::SandboxUnavailable(_) => FatalErrorKind::SandboxUnavailable,
        }
    }

    /// True for defects in testbox itself rather than in caller input
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            RunError::InternalShimFailure { .. } | RunError::SandboxUnavailable(_)
        )
    }

    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<SandboxError> for RunError {
    fn from(error: SandboxError) -> Self {
        match error {
            SandboxError::ResourceExceeded { limit_bytes } => RunError::ResourceExceeded { limit_bytes },
            SandboxError::TimedOut { timeout_ms } => RunError::TimedOut { timeout_ms },
            SandboxError::Script { message } => RunError::SandboxUnavailable(message),
            SandboxError::Unavailable(message) => RunError::SandboxUnavailable(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_serializes_kind_in_camel_case() {
        let err = RunError::TestEvaluationFailed {
            message: "SyntaxError: Unexpected token '}'".to_string(),
        };
        let json = serde_json::to_value(err.descriptor()).unwrap();
        assert_eq!(json["kind"], "testEvaluationFailed");
        assert_eq!(
            json["message"],
            "Test evaluation failed: SyntaxError: Unexpected token '}'"
        );
    }

    #[test]
    fn test_internal_failures_are_flagged() {
        assert!(RunError::InternalShimFailure {
            message: "x".to_string()
        }
        .is_internal());
        assert!(!RunError::SourceEvaluationFailed {
            message: "x".to_string()
        }
        .is_internal());
        assert!(!RunError::TimedOut { timeout_ms: 1 }.is_internal());
    }

    #[test]
    fn test_sandbox_ceilings_map_to_their_kinds() {
        let err: RunError = SandboxError::ResourceExceeded { limit_bytes: 10 }.into();
        assert_eq!(err.kind(), FatalErrorKind::ResourceExceeded);
        let err: RunError = SandboxError::TimedOut { timeout_ms: 10 }.into();
        assert_eq!(err.kind(), FatalErrorKind::TimedOut);
    }
}
