//! Suite results and their renderings (text, JUnit XML, JSON).
//!
//! Two failure modes decide what happens after a case fails:
//!
//! - **CollectAll**: keep going and gather every failure (default)
//! - **FailFast**: stop the line at the first failure; every case that has
//!   not started yet is reported as skipped

use crate::result::{Diagnostic, FailureKind, ProbeError, ProbeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// What to do after a failing case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureMode {
    /// Run every case and collect all failures
    #[default]
    CollectAll,
    /// Stop at the first failure
    FailFast,
}

/// Final status of one case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Case body completed
    Passed,
    /// Case body raised an error
    Failed,
    /// Case never started
    Skipped,
}

impl TestStatus {
    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Check if status is failing
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed => "FAIL",
            Self::Skipped => "SKIP",
        }
    }
}

/// Why a case failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Failure category
    pub kind: FailureKind,
    /// Full error message
    pub message: String,
    /// Selector / predicate / expected / actual details
    pub diagnostic: Diagnostic,
}

impl From<&ProbeError> for FailureReport {
    fn from(err: &ProbeError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            diagnostic: err.diagnostic(),
        }
    }
}

/// Result of one case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReport {
    /// Case name
    pub name: String,
    /// Final status
    pub status: TestStatus,
    /// Wall time spent in the case
    #[serde(with = "duration_ms", rename = "duration_ms")]
    pub duration: Duration,
    /// Present when the case failed
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failure: Option<FailureReport>,
}

impl CaseReport {
    /// Create a passing case report
    #[must_use]
    pub fn passed(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Passed,
            duration,
            failure: None,
        }
    }

    /// Create a failing case report
    #[must_use]
    pub fn failed(name: impl Into<String>, duration: Duration, err: &ProbeError) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Failed,
            duration,
            failure: Some(err.into()),
        }
    }

    /// Create a skipped case report
    #[must_use]
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Skipped,
            duration: Duration::ZERO,
            failure: None,
        }
    }
}

/// Ordered results of one suite run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Suite name
    pub suite_name: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall time of the whole run
    #[serde(with = "duration_ms", rename = "duration_ms")]
    pub duration: Duration,
    /// Case results in declaration order
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    /// Empty report for a run starting now
    #[must_use]
    pub fn new(suite_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            suite_name: suite_name.into(),
            started_at: Utc::now(),
            duration: Duration::ZERO,
            cases: Vec::new(),
        }
    }

    /// Append a case result
    pub fn push(&mut self, case: CaseReport) {
        self.cases.push(case);
    }

    /// Get number of passed cases
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.count(TestStatus::Passed)
    }

    /// Get number of failed cases
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(TestStatus::Failed)
    }

    /// Get number of skipped cases
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(TestStatus::Skipped)
    }

    fn count(&self, status: TestStatus) -> usize {
        self.cases.iter().filter(|c| c.status == status).count()
    }

    /// Get total case count
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.cases.len()
    }

    /// No case failed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get failing cases
    #[must_use]
    pub fn failures(&self) -> Vec<&CaseReport> {
        self.cases.iter().filter(|c| c.status.is_failed()).collect()
    }

    /// Look up a case by name
    #[must_use]
    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|c| c.name == name)
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {} passed, {} failed, {} skipped ({} total) in {:.2}s",
            self.suite_name,
            self.passed_count(),
            self.failed_count(),
            self.skipped_count(),
            self.total_count(),
            self.duration.as_secs_f64()
        )
    }

    /// Render a plain-text report
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.suite_name);
        for case in &self.cases {
            let _ = writeln!(
                out,
                "  {} {} ({}ms)",
                case.status.label(),
                case.name,
                case.duration.as_millis()
            );
            if let Some(failure) = &case.failure {
                let _ = writeln!(out, "       [{}] {}", failure.kind.label(), failure.message);
                let d = &failure.diagnostic;
                for (label, value) in [
                    ("selector", &d.selector),
                    ("predicate", &d.predicate),
                    ("expected", &d.expected),
                    ("actual", &d.actual),
                ] {
                    if let Some(value) = value {
                        let _ = writeln!(out, "       {label:>9}: {value}");
                    }
                }
            }
        }
        let _ = writeln!(out, "{}", self.summary());
        out
    }

    /// Render JUnit XML content
    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut xml = String::new();

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        let _ = writeln!(
            xml,
            r#"<testsuite name="{}" tests="{}" failures="{}" skipped="{}" time="{:.3}" timestamp="{}">"#,
            escape_xml(&self.suite_name),
            self.total_count(),
            self.failed_count(),
            self.skipped_count(),
            self.duration.as_secs_f64(),
            self.started_at.format("%Y-%m-%dT%H:%M:%S")
        );

        for case in &self.cases {
            let _ = writeln!(
                xml,
                r#"  <testcase name="{}" classname="{}" time="{:.3}">"#,
                escape_xml(&case.name),
                escape_xml(&self.suite_name),
                case.duration.as_secs_f64()
            );

            match (&case.status, &case.failure) {
                (TestStatus::Failed, Some(failure)) => {
                    let _ = writeln!(
                        xml,
                        r#"    <failure type="{}" message="{}">{}</failure>"#,
                        failure.kind.label(),
                        escape_xml(&failure.message),
                        escape_xml(&failure.message)
                    );
                }
                (TestStatus::Skipped, _) => xml.push_str("    <skipped/>\n"),
                _ => {}
            }

            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }

    /// Render pretty JSON
    pub fn render_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write JUnit XML for CI integration
    pub fn write_junit(&self, output_path: &Path) -> ProbeResult<()> {
        std::fs::write(output_path, self.render_junit())?;
        Ok(())
    }

    /// Write the JSON report
    pub fn write_json(&self, output_path: &Path) -> ProbeResult<()> {
        std::fs::write(output_path, self.render_json()?)?;
        Ok(())
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn report() -> SuiteReport {
        let mut report = SuiteReport::new("CSC <form>");
        report.push(CaseReport::passed("checks the title", Duration::from_millis(12)));
        report.push(CaseReport::failed(
            "shows the error",
            Duration::from_millis(4001),
            &ProbeError::AssertionTimeout {
                selector: ".error".into(),
                predicate: "be.visible".into(),
                expected: String::new(),
                actual: "<span.error> hidden".into(),
                timeout_ms: 4000,
            },
        ));
        report.push(CaseReport::skipped("uploads a file"));
        report
    }

    mod failure_mode_tests {
        use super::*;

        #[test]
        fn test_default_failure_mode() {
            assert_eq!(FailureMode::default(), FailureMode::CollectAll);
        }

        #[test]
        fn test_serde_names() {
            let mode: FailureMode = serde_yaml_ng::from_str("fail-fast").unwrap();
            assert_eq!(mode, FailureMode::FailFast);
        }
    }

    mod test_status_tests {
        use super::*;

        #[test]
        fn test_status_is_passed() {
            assert!(TestStatus::Passed.is_passed());
            assert!(!TestStatus::Failed.is_passed());
            assert!(!TestStatus::Skipped.is_passed());
        }

        #[test]
        fn test_status_is_failed() {
            assert!(TestStatus::Failed.is_failed());
            assert!(!TestStatus::Skipped.is_failed());
        }
    }

    mod suite_report_tests {
        use super::*;

        #[test]
        fn test_counts() {
            let report = report();
            assert_eq!(report.total_count(), 3);
            assert_eq!(report.passed_count(), 1);
            assert_eq!(report.failed_count(), 1);
            assert_eq!(report.skipped_count(), 1);
            assert!(!report.all_passed());
            assert_eq!(report.failures()[0].name, "shows the error");
            assert!(report.case("uploads a file").is_some());
        }

        #[test]
        fn test_empty_report_passes() {
            assert!(SuiteReport::new("empty").all_passed());
        }

        #[test]
        fn test_text_has_diagnostic() {
            let text = report().render_text();
            assert!(text.contains("PASS checks the title"));
            assert!(text.contains("FAIL shows the error"));
            assert!(text.contains("[assertion timeout]"));
            assert!(text.contains("selector: .error"));
            assert!(text.contains("predicate: be.visible"));
            assert!(!text.contains("expected:"));
            assert!(text.contains("1 passed, 1 failed, 1 skipped"));
        }

        #[test]
        fn test_junit_escapes_and_marks() {
            let xml = report().render_junit();
            assert!(xml.starts_with("<?xml"));
            assert!(xml.contains(r#"name="CSC &lt;form&gt;""#));
            assert!(xml.contains(r#"tests="3" failures="1" skipped="1""#));
            assert!(xml.contains(r#"<failure type="assertion timeout""#));
            assert!(xml.contains("<skipped/>"));
        }

        #[test]
        fn test_json_round_trip() {
            let report = report();
            let json = report.render_json().unwrap();
            assert!(json.contains("\"duration_ms\": 4001"));
            assert!(json.contains("\"kind\": \"assertion_timeout\""));
            let back: SuiteReport = serde_json::from_str(&json).unwrap();
            assert_eq!(back.cases, report.cases);
        }

        #[test]
        fn test_write_files() {
            let dir = tempfile::tempdir().unwrap();
            let report = report();
            report.write_junit(&dir.path().join("junit.xml")).unwrap();
            report.write_json(&dir.path().join("report.json")).unwrap();
            assert!(dir.path().join("junit.xml").exists());
            let json = std::fs::read_to_string(dir.path().join("report.json")).unwrap();
            assert!(json.contains("CSC <form>"));
        }
    }
}
