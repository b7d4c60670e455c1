//! Test runner facade
//!
//! One request in, one report (or one fatal error) out. Validation happens
//! before a sandbox exists; the sandbox is released on every path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use testbox_sandbox::{
    LifecycleManager, SandboxFactory, SandboxLimits, DEFAULT_MEMORY_LIMIT_BYTES, DEFAULT_TIMEOUT,
};

use crate::report::ExecutionReport;
use crate::request::{ExecutionRequest, ValidationError};
use crate::{pipeline, RunError};

/// Runner settings, as read from `~/.testbox/config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunnerConfig {
    /// Memory ceiling given to requests built through [`RunnerConfig::request`]
    pub memory_limit_bytes: usize,
    /// Wall-clock budget for one whole run
    pub timeout_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl RunnerConfig {
    /// Reject settings no run could succeed under
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_ms == 0 {
            return Err(ValidationError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn limits(&self) -> SandboxLimits {
        SandboxLimits::default()
            .with_memory_limit(self.memory_limit_bytes)
            .with_timeout(Duration::from_millis(self.timeout_ms))
    }

    pub fn request(&self, source_code: impl Into<String>, test_source: impl Into<String>) -> ExecutionRequest {
        ExecutionRequest::new(source_code, test_source).with_memory_limit(self.memory_limit_bytes)
    }
}

#[derive(Clone)]
pub struct TestRunner {
    lifecycle: Arc<LifecycleManager>,
}

impl TestRunner {
    /// Runner backed by real V8 isolates
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            lifecycle: Arc::new(LifecycleManager::v8(config.limits())),
        }
    }

    pub fn with_factory(factory: Arc<dyn SandboxFactory>, config: &RunnerConfig) -> Self {
        Self {
            lifecycle: Arc::new(LifecycleManager::new(factory, config.limits())),
        }
    }

    /// Run one request on the calling thread
    pub fn run(&self, request: &ExecutionRequest) -> Result<ExecutionReport, RunError> {
        let checked = if self.lifecycle.limits().timeout.is_zero() {
            Err(ValidationError::ZeroTimeout)
        } else {
            request.validate()
        };
        checked.map_err(|e| {
            tracing::warn!(error = %e, "request rejected");
            RunError::from(e)
        })?;

        let started = Instant::now();
        let mut sandbox = self.lifecycle.acquire(request.memory_limit_bytes)?;
        let sandbox_id = sandbox.id();
        tracing::info!(
            %sandbox_id,
            memory_limit_bytes = request.memory_limit_bytes,
            source_bytes = request.source_code.len(),
            test_bytes = request.test_source.len(),
            "test run started"
        );

        let outcome = pipeline::run(&mut *sandbox, &request.source_code, &request.test_source);
        self.lifecycle.release(sandbox);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(report) => tracing::info!(
                %sandbox_id,
                passed = report.passed(),
                failed = report.failed(),
                elapsed_ms,
                "test run finished"
            ),
            Err(e) if e.is_internal() => {
                tracing::error!(%sandbox_id, kind = ?e.kind(), error = %e, elapsed_ms, "test run aborted")
            }
            Err(e) => {
                tracing::warn!(%sandbox_id, kind = ?e.kind(), error = %e, elapsed_ms, "test run aborted")
            }
        }
        outcome
    }

    /// Run one request on a blocking worker thread.
    ///
    /// The isolate is created, used and dropped on that thread.
    pub async fn run_async(&self, request: ExecutionRequest) -> Result<ExecutionReport, RunError> {
        let runner = self.clone();
        tokio::task::spawn_blocking(move || runner.run(&request))
            .await
            .map_err(|e| RunError::SandboxUnavailable(format!("runner thread failed: {e}")))?
    }
}
