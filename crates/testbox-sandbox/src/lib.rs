//! Testbox Sandbox - V8 isolate per run
//!
//! Every test run gets a brand new isolate with a hard heap ceiling and a
//! wall-clock watchdog. No filesystem. No network. No timers. Nothing
//! survives the run.

mod capabilities;
mod engine;
mod isolate;
mod lifecycle;
mod limits;

pub use capabilities::{GlobalSurface, HostBinding};
pub use engine::{Sandbox, SandboxFactory};
pub use isolate::{V8Sandbox, V8SandboxFactory};
pub use lifecycle::{LifecycleManager, SandboxHandle};
pub use limits::{SandboxLimits, DEFAULT_MEMORY_LIMIT_BYTES, DEFAULT_TIMEOUT};

/// Errors from sandbox operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
    #[error("Memory limit of {limit_bytes} bytes exceeded")]
    ResourceExceeded { limit_bytes: usize },

    #[error("Timeout after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    /// A script threw (or failed to parse) and nothing else explains it.
    #[error("{message}")]
    Script { message: String },

    #[error("Sandbox unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
