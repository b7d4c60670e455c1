//! Per-test results and the report that carries them out of the sandbox

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

/// Outcome of one `it` / `test` unit.
///
/// `status == Failed` exactly when `error` is present; the constructors and
/// the deserializer both hold that line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTestResult")]
pub struct TestResult {
    name: String,
    status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TestResult {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Passed,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> TestStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

#[derive(Deserialize)]
struct RawTestResult {
    name: String,
    status: TestStatus,
    #[serde(default)]
    error: Option<String>,
}

impl TryFrom<RawTestResult> for TestResult {
    type Error = String;

    fn try_from(raw: RawTestResult) -> Result<Self, Self::Error> {
        match (raw.status, raw.error) {
            (TestStatus::Passed, None) => Ok(TestResult::passed(raw.name)),
            (TestStatus::Failed, Some(error)) => Ok(TestResult::failed(raw.name, error)),
            (TestStatus::Passed, Some(_)) => {
                Err(format!("test '{}' passed but carries an error", raw.name))
            }
            (TestStatus::Failed, None) => {
                Err(format!("test '{}' failed without an error message", raw.name))
            }
        }
    }
}

/// Ordered results of one run, in the order the test units executed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub results: Vec<TestResult>,
}

impl ExecutionReport {
    pub fn new(results: Vec<TestResult>) -> Self {
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(TestResult::is_passed)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} tests: {} passed, {} failed",
            self.len(),
            self.passed(),
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_shape() {
        let report = ExecutionReport::new(vec![
            TestResult::passed("adds"),
            TestResult::failed("subtracts", "Expected 1 but got 2"),
        ]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            json!({
                "results": [
                    { "name": "adds", "status": "passed" },
                    { "name": "subtracts", "status": "failed", "error": "Expected 1 but got 2" }
                ]
            })
        );
    }

    #[test]
    fn test_deserialize_enforces_invariant() {
        let ok: TestResult =
            serde_json::from_value(json!({ "name": "a", "status": "failed", "error": "" })).unwrap();
        assert_eq!(ok.error(), Some(""));

        assert!(serde_json::from_value::<TestResult>(json!({ "name": "a", "status": "failed" })).is_err());
        assert!(serde_json::from_value::<TestResult>(
            json!({ "name": "a", "status": "passed", "error": "x" })
        )
        .is_err());
        assert!(serde_json::from_value::<TestResult>(json!({ "name": "a", "status": "skipped" })).is_err());
    }

    #[test]
    fn test_counts() {
        let report = ExecutionReport::new(vec![
            TestResult::passed("a"),
            TestResult::failed("b", "boom"),
            TestResult::passed("c"),
        ]);
        assert_eq!(report.passed(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_passed());
        assert_eq!(report.summary(), "3 tests: 2 passed, 1 failed");
        assert!(ExecutionReport::default().all_passed());
    }
}
