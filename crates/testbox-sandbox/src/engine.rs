//! The seam between the lifecycle manager and a concrete isolation engine

use crate::{Result, SandboxLimits};

/// One isolated, single-use evaluation context.
///
/// Scripts run as separate classic scripts sharing one global scope, so
/// declarations from an earlier script are visible to later ones. Nothing
/// but plain strings ever comes back out.
pub trait Sandbox {
    /// Evaluate `source` for its side effects.
    fn eval(&mut self, label: &'static str, source: &str) -> Result<()>;

    /// Evaluate `source` and copy its completion value out as a host string.
    ///
    /// Fails with [`crate::SandboxError::Script`] when the value is not a string.
    fn eval_string(&mut self, label: &'static str, source: &str) -> Result<String>;
}

/// Creates sandboxes. Injected into the lifecycle manager so the
/// process-wide engine is an explicit dependency and tests can fake it.
pub trait SandboxFactory: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &'static str;

    fn create(&self, limits: &SandboxLimits) -> Result<Box<dyn Sandbox>>;
}
