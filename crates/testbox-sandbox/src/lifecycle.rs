//! Sandbox lifecycle: acquire under a ceiling, release on every path
//!
//! `acquire` hands out an owning [`SandboxHandle`]. Dropping the handle
//! tears the sandbox down, so there is no way to forget a release - early
//! returns, `?` and panics all go through `Drop`.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::engine::{Sandbox, SandboxFactory};
use crate::isolate::V8SandboxFactory;
use crate::{Result, SandboxLimits};

/// Creates one sandbox per run through an injected factory
pub struct LifecycleManager {
    factory: Arc<dyn SandboxFactory>,
    limits: SandboxLimits,
}

impl LifecycleManager {
    pub fn new(factory: Arc<dyn SandboxFactory>, limits: SandboxLimits) -> Self {
        Self { factory, limits }
    }

    /// Manager backed by real V8 isolates
    pub fn v8(limits: SandboxLimits) -> Self {
        Self::new(Arc::new(V8SandboxFactory::new()), limits)
    }

    /// Base limits; `acquire` overrides the memory ceiling per run
    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    /// Open a fresh sandbox bound to `memory_limit_bytes`
    pub fn acquire(&self, memory_limit_bytes: usize) -> Result<SandboxHandle> {
        let id = Uuid::new_v4();
        let limits = self.limits.clone().with_memory_limit(memory_limit_bytes);

        let sandbox = self.factory.create(&limits).map_err(|e| {
            tracing::warn!(sandbox_id = %id, engine = self.factory.name(), error = %e, "sandbox creation failed");
            e
        })?;

        tracing::debug!(
            sandbox_id = %id,
            engine = self.factory.name(),
            memory_limit_bytes,
            timeout_ms = limits.timeout_ms(),
            "sandbox acquired"
        );

        Ok(SandboxHandle {
            id,
            sandbox,
            limits,
            acquired_at: Instant::now(),
        })
    }

    /// Tear a sandbox down now. Equivalent to dropping the handle.
    pub fn release(&self, handle: SandboxHandle) {
        handle.release();
    }
}

/// Owning guard around an acquired sandbox
pub struct SandboxHandle {
    id: Uuid,
    sandbox: Box<dyn Sandbox>,
    limits: SandboxLimits,
    acquired_at: Instant,
}

impl SandboxHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    pub fn release(self) {}
}

impl Deref for SandboxHandle {
    type Target = dyn Sandbox;

    fn deref(&self) -> &Self::Target {
        &*self.sandbox
    }
}

impl DerefMut for SandboxHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.sandbox
    }
}

impl Drop for SandboxHandle {
    fn drop(&mut self) {
        tracing::debug!(
            sandbox_id = %self.id,
            elapsed_ms = self.acquired_at.elapsed().as_millis() as u64,
            "sandbox released"
        );
    }
}
