use serde::{Deserialize, Serialize};

use crate::scenario::scenario_model::ScenarioResult;

// ============================================================================
// Replay report: aggregates ScenarioResult instances
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,

    /// Total replay duration in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,

    pub results: Vec<ScenarioResult>,
}

impl ReplayReport {
    pub fn from_results(results: Vec<ScenarioResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        ReplayReport {
            total,
            passed,
            failed: total - passed,
            duration_ms: None,
            results,
        }
    }

    pub fn with_duration(mut self, duration_ms: u128) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

// ============================================================================
// Console output
// ============================================================================

/// Human-readable summary:
/// ```text
/// ✓ PASS  Click by label (4 steps, 2 checks)
/// ✗ FAIL  Reclaim across frames (6 steps, 3 checks)
///     [FAIL] Step 4: expected 3 assigned labels in tab 1 (actual 2)
///
/// === Results: 1 passed, 1 failed (2 total) ===
/// ```
pub fn format_console_report(report: &ReplayReport) -> String {
    let mut out = String::new();

    for result in &report.results {
        let marker = if result.passed { "\u{2713} PASS" } else { "\u{2717} FAIL" };
        out.push_str(&format!(
            "{}  {} ({} steps, {} checks)\n",
            marker,
            result.scenario_name,
            result.steps_run,
            result.checks.len()
        ));

        if let Some(ref error) = result.error {
            out.push_str(&format!("    [ERROR] {}\n", error));
        }

        for check in result.failed_checks() {
            let detail = check.message.as_deref().unwrap_or("check failed");
            let actual = check.actual.as_deref().unwrap_or("-");
            out.push_str(&format!(
                "    [FAIL] Step {}: {} (actual {})\n",
                check.step_index, detail, actual
            ));
        }
    }

    out.push_str(&format!(
        "\n=== Results: {} passed, {} failed ({} total)",
        report.passed, report.failed, report.total
    ));
    if let Some(ms) = report.duration_ms {
        out.push_str(&format!(" in {:.1}s", ms as f64 / 1000.0));
    }
    out.push_str(" ===\n");
    out
}

/// One JSON object per controller response, tagged with its scenario.
pub fn format_json_lines(report: &ReplayReport) -> String {
    let mut out = String::new();
    for result in &report.results {
        for response in &result.responses {
            let line = serde_json::json!({
                "scenario": result.scenario_name,
                "response": response,
            });
            out.push_str(&line.to_string());
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ResponseToController;
    use crate::scenario::scenario_model::CheckResult;

    fn result(name: &str, passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: name.to_string(),
            passed,
            steps_run: 2,
            checks: vec![CheckResult {
                step_index: 1,
                passed,
                actual: Some("2".into()),
                message: if passed { None } else { Some("Expected 3 assigned labels in tab 1".into()) },
            }],
            responses: vec![ResponseToController::no_action()],
            error: None,
        }
    }

    #[test]
    fn console_report_lists_failed_checks() {
        let report = ReplayReport::from_results(vec![result("a", true), result("b", false)]);
        let text = format_console_report(&report);
        assert!(!report.all_passed());
        assert!(text.contains("PASS  a"));
        assert!(text.contains("[FAIL] Step 1: Expected 3 assigned labels in tab 1 (actual 2)"));
        assert!(text.contains("1 passed, 1 failed (2 total)"));
    }

    #[test]
    fn json_lines_has_one_line_per_response() {
        let report = ReplayReport::from_results(vec![result("a", true), result("b", true)]);
        let text = format_json_lines(&report);
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.contains(r#""type":"noAction""#)));
    }
}
