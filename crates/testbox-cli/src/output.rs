//! Report rendering for the terminal

use std::fmt::Write;

use testbox_core::{ExecutionReport, RunError};

pub type Outcome = Result<ExecutionReport, RunError>;

/// 0 when every test passed, 1 when some failed, 2 when the run aborted
pub fn exit_code(outcome: &Outcome) -> u8 {
    match outcome {
        Ok(report) if report.all_passed() => 0,
        Ok(_) => 1,
        Err(_) => 2,
    }
}

pub fn render_json(outcome: &Outcome) -> serde_json::Result<String> {
    match outcome {
        Ok(report) => serde_json::to_string_pretty(report),
        Err(e) => serde_json::to_string_pretty(&serde_json::json!({ "error": e.descriptor() })),
    }
}

pub fn render_text(outcome: &Outcome) -> String {
    let mut out = String::new();
    match outcome {
        Ok(report) => {
            for result in &report.results {
                match result.error() {
                    None => {
                        let _ = writeln!(out, "✅ {}", result.name());
                    }
                    Some(error) => {
                        let _ = writeln!(out, "❌ {}", result.name());
                        let _ = writeln!(out, "   {}", error);
                    }
                }
            }
            if !report.is_empty() {
                out.push('\n');
            }
            let _ = writeln!(out, "{}", report.summary());
        }
        Err(e) => {
            let _ = writeln!(out, "⚠️  {}", e);
        }
    }
    out
}
