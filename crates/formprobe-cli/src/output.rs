//! Output formatting and progress reporting

use console::{style, Style, Term};
use formprobe::{CaseReport, RunObserver, SuiteReport, TestStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Live progress for a suite run, written to stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Mutex<Option<ProgressBar>>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: Mutex::new(None),
            use_color,
            quiet,
        }
    }

    fn bar(&self) -> Option<ProgressBar> {
        self.progress_bar
            .lock()
            .map_or(None, |guard| guard.as_ref().cloned())
    }

    /// Start a progress bar for `total` cases
    pub fn start_progress(&self, total: u64, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        if let Ok(mut slot) = self.progress_bar.lock() {
            *slot = Some(pb);
        }
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(pb) = self.bar() {
            pb.inc(delta);
        }
    }

    /// Update progress message
    pub fn set_message(&self, message: &str) {
        if let Some(pb) = self.bar() {
            pb.set_message(message.to_string());
        }
    }

    /// Finish and remove the progress bar
    pub fn finish(&self) {
        if let Ok(mut slot) = self.progress_bar.lock() {
            if let Some(pb) = slot.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn line(&self, text: &str) {
        match self.bar() {
            Some(pb) => pb.println(text),
            None => {
                let _ = self.term.write_line(text);
            }
        }
    }

    fn prefix(&self, symbol: &str, word: &str, paint: fn(&str) -> String) -> String {
        if self.use_color {
            paint(symbol)
        } else {
            word.to_string()
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefix("✓", "PASS", |s| style(s).green().bold().to_string());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // failures are printed even in quiet mode
        let prefix = self.prefix("✗", "FAIL", |s| style(s).red().bold().to_string());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a skip message
    pub fn skipped(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefix("-", "SKIP", |s| style(s).yellow().to_string());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefix("⚠", "WARN", |s| style(s).yellow().bold().to_string());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefix("ℹ", "INFO", |s| style(s).blue().bold().to_string());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// Print test summary
    pub fn summary(&self, passed: usize, failed: usize, skipped: usize, duration: Duration) {
        if self.quiet && failed == 0 {
            return;
        }

        let _ = self.term.write_line("");

        let total = passed + failed + skipped;
        let duration_secs = duration.as_secs_f64();

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();
            let skipped_style = Style::new().yellow();

            let status = if failed > 0 {
                failed_style.apply_to("FAILED")
            } else {
                passed_style.apply_to("PASSED")
            };

            let _ = self.term.write_line(&format!(
                "{} {} cases in {:.2}s ({} passed, {} failed, {} skipped)",
                status,
                total,
                duration_secs,
                passed_style.apply_to(passed),
                if failed > 0 {
                    failed_style.apply_to(failed).to_string()
                } else {
                    failed.to_string()
                },
                skipped_style.apply_to(skipped)
            ));
        } else {
            let status = if failed > 0 { "FAILED" } else { "PASSED" };
            let _ = self.term.write_line(&format!(
                "{status} {total} cases in {duration_secs:.2}s ({passed} passed, {failed} failed, {skipped} skipped)"
            ));
        }
    }
}

impl RunObserver for ProgressReporter {
    fn suite_started(&self, suite: &str, total: usize) {
        self.header(suite);
        self.start_progress(total as u64, "starting");
    }

    fn case_started(&self, name: &str) {
        self.set_message(name);
    }

    fn case_finished(&self, report: &CaseReport) {
        self.increment(1);
        let ms = report.duration.as_millis();
        match report.status {
            TestStatus::Passed => self.success(&format!("{} ({ms}ms)", report.name)),
            TestStatus::Failed => {
                let reason = report
                    .failure
                    .as_ref()
                    .map_or_else(String::new, |f| format!(": {}", f.message));
                self.failure(&format!("{} ({ms}ms){reason}", report.name));
            }
            TestStatus::Skipped => self.skipped(&report.name),
        }
    }

    fn suite_finished(&self, report: &SuiteReport) {
        self.finish();
        self.summary(
            report.passed_count(),
            report.failed_count(),
            report.skipped_count(),
            report.duration,
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use formprobe::ProbeError;

    mod progress_reporter_tests {
        use super::*;

        #[test]
        fn test_new_reporter() {
            let reporter = ProgressReporter::new(true, false);
            assert!(reporter.use_color);
            assert!(!reporter.quiet);
        }

        #[test]
        fn test_default_reporter() {
            let reporter = ProgressReporter::default();
            assert!(reporter.use_color);
            assert!(!reporter.quiet);
        }

        #[test]
        fn test_messages_do_not_panic() {
            let reporter = ProgressReporter::new(false, false);
            reporter.success("case passed");
            reporter.failure("case failed");
            reporter.skipped("case skipped");
            reporter.warning("careful");
            reporter.info("note");
            reporter.header("Header");
            reporter.summary(10, 1, 2, Duration::from_secs(5));
        }

        #[test]
        fn test_progress_bar_lifecycle() {
            let reporter = ProgressReporter::new(false, false);
            reporter.start_progress(3, "running");
            reporter.increment(1);
            reporter.set_message("case 2");
            reporter.finish();
            assert!(reporter.bar().is_none());
        }

        #[test]
        fn test_quiet_mode_never_starts_a_bar() {
            let reporter = ProgressReporter::new(false, true);
            reporter.start_progress(10, "running");
            assert!(reporter.bar().is_none());
            reporter.failure("still shown");
        }
    }

    mod observer_tests {
        use super::*;

        #[test]
        fn test_observer_callbacks() {
            let reporter = ProgressReporter::new(false, false);
            reporter.suite_started("CSC", 3);
            reporter.case_started("one");
            reporter.case_finished(&CaseReport::passed("one", Duration::from_millis(3)));
            let err = ProbeError::UnknownCommand { name: "nope".into() };
            reporter.case_finished(&CaseReport::failed("two", Duration::from_millis(1), &err));
            reporter.case_finished(&CaseReport::skipped("three"));

            let mut report = SuiteReport::new("CSC");
            report.push(CaseReport::passed("one", Duration::ZERO));
            reporter.suite_finished(&report);
            assert!(reporter.bar().is_none());
        }
    }
}
