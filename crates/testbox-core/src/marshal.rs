//! Result marshaller
//!
//! The shim's collector produces one JSON string of plain records. It is
//! parsed here into host-owned values; nothing else crosses the boundary.

use testbox_sandbox::Sandbox;

use crate::pipeline::Step;
use crate::report::{ExecutionReport, TestResult};
use crate::shim::COLLECT_CALL;
use crate::RunError;

/// Copy the sandbox-local results out, preserving order
pub fn extract(sandbox: &mut dyn Sandbox) -> Result<ExecutionReport, RunError> {
    let payload = sandbox
        .eval_string(Step::Extract.label(), COLLECT_CALL)
        .map_err(|e| Step::Extract.fatal(e))?;
    decode(&payload)
}

/// Parse a collector payload, enforcing the TestResult invariant per record
pub fn decode(payload: &str) -> Result<ExecutionReport, RunError> {
    let results: Vec<TestResult> = serde_json::from_str(payload).map_err(|e| {
        tracing::error!(internal = true, error = %e, "unreadable result payload");
        RunError::InternalShimFailure {
            message: format!("malformed result payload: {e}"),
        }
    })?;
    Ok(ExecutionReport::new(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FatalErrorKind;

    #[test]
    fn test_decode_keeps_order_and_fields() {
        let report = decode(
            r#"[{"name":"b","status":"failed","error":"Expected 2 but got 3"},{"name":"a","status":"passed"}]"#,
        )
        .unwrap();
        assert_eq!(
            report.results,
            vec![
                TestResult::failed("b", "Expected 2 but got 3"),
                TestResult::passed("a"),
            ]
        );
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode("[]").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_broken_records() {
        for payload in [
            "",
            "{}",
            "not json",
            r#"[{"name":"a","status":"failed"}]"#,
            r#"[{"name":"a","status":"passed","error":"x"}]"#,
            r#"[{"status":"passed"}]"#,
        ] {
            let err = decode(payload).unwrap_err();
            assert_eq!(err.kind(), FatalErrorKind::InternalShimFailure, "{payload}");
        }
    }
}
