//! Incoming run request and its validation
//!
//! Everything here happens before a sandbox exists. A request that fails
//! validation never costs an isolate.

use serde::{Deserialize, Serialize};
use testbox_sandbox::DEFAULT_MEMORY_LIMIT_BYTES;

/// Below this V8 cannot reliably boot a context
pub const MIN_MEMORY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

/// Upper bound on either code field
pub const MAX_CODE_BYTES: usize = 1024 * 1024;

/// Source code, test code, and the memory budget to run them under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    #[serde(default)]
    pub source_code: String,
    #[serde(default)]
    pub test_source: String,
    #[serde(default = "default_memory_limit")]
    pub memory_limit_bytes: usize,
}

fn default_memory_limit() -> usize {
    DEFAULT_MEMORY_LIMIT_BYTES
}

impl ExecutionRequest {
    pub fn new(source_code: impl Into<String>, test_source: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            test_source: test_source.into(),
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
        }
    }

    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit_bytes = bytes;
        self
    }

    /// Reject the request before any sandbox is created
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.source_code.is_empty() {
            return Err(ValidationError::MissingSource);
        }
        if self.test_source.is_empty() {
            return Err(ValidationError::MissingTests);
        }
        for (field, code) in [("sourceCode", &self.source_code), ("testSource", &self.test_source)] {
            if code.len() > MAX_CODE_BYTES {
                return Err(ValidationError::CodeTooLarge {
                    field,
                    max: MAX_CODE_BYTES,
                    actual: code.len(),
                });
            }
        }
        if self.memory_limit_bytes < MIN_MEMORY_LIMIT_BYTES {
            return Err(ValidationError::MemoryLimitTooLow {
                actual: self.memory_limit_bytes,
                min: MIN_MEMORY_LIMIT_BYTES,
            });
        }
        Ok(())
    }
}

/// Reasons a request is rejected up front
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Source code is required")]
    MissingSource,
    #[error("Test code is required")]
    MissingTests,
    #[error("{field} is {actual} bytes, limit is {max}")]
    CodeTooLarge {
        field: &'static str,
        max: usize,
        actual: usize,
    },
    #[error("Memory limit of {actual} bytes is below the {min} byte minimum")]
    MemoryLimitTooLow { actual: usize, min: usize },
    #[error("Timeout must be at least 1 ms")]
    ZeroTimeout,
}
