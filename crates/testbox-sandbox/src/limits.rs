//! Resource budget for a single sandbox

use std::time::Duration;

/// 128 MiB, the ceiling every run gets unless the request asks otherwise
pub const DEFAULT_MEMORY_LIMIT_BYTES: usize = 128 * 1024 * 1024;

/// Wall-clock budget for shim + source + tests + extraction
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Limits applied to one sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxLimits {
    /// V8 heap ceiling in bytes
    pub memory_limit_bytes: usize,
    /// Maximum wall-clock time before the isolate is terminated
    pub timeout: Duration,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SandboxLimits {
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit_bytes = bytes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = SandboxLimits::default();
        assert_eq!(limits.memory_limit_bytes, 128 * 1024 * 1024);
        assert_eq!(limits.timeout_ms(), 5_000);
    }

    #[test]
    fn test_builders_override_fields() {
        let limits = SandboxLimits::default()
            .with_memory_limit(32 * 1024 * 1024)
            .with_timeout(Duration::from_millis(250));
        assert_eq!(limits.memory_limit_bytes, 32 * 1024 * 1024);
        assert_eq!(limits.timeout_ms(), 250);
    }
}
