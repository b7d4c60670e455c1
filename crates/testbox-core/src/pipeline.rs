//! Execution pipeline: shim, source, tests, extract
//!
//! Strictly ordered and synchronous. Containment is two-tier: a throw inside
//! an `it`/`test` body becomes a failed record, anything else aborts the run.

use std::time::Instant;

use testbox_sandbox::{Sandbox, SandboxError};

use crate::report::ExecutionReport;
use crate::{marshal, shim, RunError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Shim,
    Source,
    Tests,
    Extract,
}

impl Step {
    /// Script name the engine reports in stack traces
    pub fn label(&self) -> &'static str {
        match self {
            Step::Shim => "[testbox:shim]",
            Step::Source => "[testbox:source]",
            Step::Tests => "[testbox:tests]",
            Step::Extract => "[testbox:extract]",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Step::Shim => "shim",
            Step::Source => "source",
            Step::Tests => "tests",
            Step::Extract => "extract",
        }
    }

    /// Classify a sandbox failure that happened during this step.
    ///
    /// Resource ceilings win over the step; a script error is blamed on
    /// whoever wrote the script.
    pub fn fatal(&self, error: SandboxError) -> RunError {
        let message = match error {
            SandboxError::Script { message } => message,
            other => return other.into(),
        };
        match self {
            Step::Source => RunError::SourceEvaluationFailed { message },
            Step::Tests => RunError::TestEvaluationFailed { message },
            Step::Shim | Step::Extract => {
                tracing::error!(step = self.name(), internal = true, error = %message, "shim failure");
                RunError::InternalShimFailure { message }
            }
        }
    }
}

fn eval_step(sandbox: &mut dyn Sandbox, step: Step, source: &str) -> Result<(), RunError> {
    let started = Instant::now();
    let outcome = sandbox.eval(step.label(), source).map_err(|e| step.fatal(e));
    tracing::debug!(
        step = step.name(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        ok = outcome.is_ok(),
        "pipeline step"
    );
    outcome
}

/// Run one source/test pair inside an already-acquired sandbox
pub fn run(
    sandbox: &mut dyn Sandbox,
    source_code: &str,
    test_source: &str,
) -> Result<ExecutionReport, RunError> {
    eval_step(sandbox, Step::Shim, shim::source())?;
    eval_step(sandbox, Step::Source, source_code)?;
    eval_step(sandbox, Step::Tests, test_source)?;

    let started = Instant::now();
    let report = marshal::extract(sandbox);
    tracing::debug!(
        step = Step::Extract.name(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        ok = report.is_ok(),
        "pipeline step"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TestResult;
    use crate::FatalErrorKind;
    use testbox_sandbox::{GlobalSurface, SandboxLimits, V8Sandbox};

    /// Replays scripted outcomes per label
    struct ScriptedSandbox {
        fail_at: Option<(&'static str, SandboxError)>,
        payload: String,
        seen: Vec<&'static str>,
    }

    impl ScriptedSandbox {
        fn new(payload: &str) -> Self {
            Self {
                fail_at: None,
                payload: payload.to_string(),
                seen: Vec::new(),
            }
        }

        fn failing(label: &'static str, error: SandboxError) -> Self {
            Self {
                fail_at: Some((label, error)),
                ..Self::new("[]")
            }
        }

        fn check(&mut self, label: &'static str) -> testbox_sandbox::Result<()> {
            self.seen.push(label);
            match &self.fail_at {
                Some((at, err)) if *at == label => Err(err.clone()),
                _ => Ok(()),
            }
        }
    }

    impl Sandbox for ScriptedSandbox {
        fn eval(&mut self, label: &'static str, _source: &str) -> testbox_sandbox::Result<()> {
            self.check(label)
        }

        fn eval_string(&mut self, label: &'static str, _source: &str) -> testbox_sandbox::Result<String> {
            self.check(label)?;
            Ok(self.payload.clone())
        }
    }

    fn script(message: &str) -> SandboxError {
        SandboxError::Script {
            message: message.to_string(),
        }
    }

    #[test]
    fn test_steps_run_in_order() {
        let mut sb = ScriptedSandbox::new(r#"[{"name":"a","status":"passed"}]"#);
        let report = run(&mut sb, "src", "tests").unwrap();
        assert_eq!(report.results, vec![TestResult::passed("a")]);
        assert_eq!(
            sb.seen,
            vec!["[testbox:shim]", "[testbox:source]", "[testbox:tests]", "[testbox:extract]"]
        );
    }

    #[test]
    fn test_source_failure_skips_tests() {
        let mut sb = ScriptedSandbox::failing("[testbox:source]", script("ReferenceError: x is not defined"));
        let err = run(&mut sb, "src", "tests").unwrap_err();
        assert_eq!(
            err,
            RunError::SourceEvaluationFailed {
                message: "ReferenceError: x is not defined".to_string()
            }
        );
        assert_eq!(sb.seen, vec!["[testbox:shim]", "[testbox:source]"]);
    }

    #[test]
    fn test_step_classification() {
        let cases = [
            ("[testbox:shim]", FatalErrorKind::InternalShimFailure),
            ("[testbox:tests]", FatalErrorKind::TestEvaluationFailed),
            ("[testbox:extract]", FatalErrorKind::InternalShimFailure),
        ];
        for (label, kind) in cases {
            let mut sb = ScriptedSandbox::failing(label, script("boom"));
            assert_eq!(run(&mut sb, "src", "tests").unwrap_err().kind(), kind, "{label}");
        }
    }

    #[test]
    fn test_resource_ceilings_win_over_step() {
        for label in ["[testbox:shim]", "[testbox:source]", "[testbox:tests]"] {
            let mut sb = ScriptedSandbox::failing(label, SandboxError::TimedOut { timeout_ms: 50 });
            assert_eq!(run(&mut sb, "s", "t").unwrap_err(), RunError::TimedOut { timeout_ms: 50 });

            let mut sb = ScriptedSandbox::failing(label, SandboxError::ResourceExceeded { limit_bytes: 7 });
            assert_eq!(
                run(&mut sb, "s", "t").unwrap_err(),
                RunError::ResourceExceeded { limit_bytes: 7 }
            );
        }
    }

    #[test]
    fn test_real_sandbox_shares_scope_between_steps() {
        let mut sb = V8Sandbox::new(&SandboxLimits::default(), &GlobalSurface::locked_down()).unwrap();
        let report = run(
            &mut sb,
            "const double = (n) => n * 2; function greet(name) { return 'hi ' + name; }",
            r#"
            it("double", () => expect(double(21)).toBe(42));
            it("greet", () => expect(greet("bob")).toBe("hi bob"));
            "#,
        )
        .unwrap();
        assert!(report.all_passed());
        assert_eq!(report.len(), 2);
    }
}
