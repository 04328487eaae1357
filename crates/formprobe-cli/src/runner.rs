//! Suite execution: config resolution, backend choice and report output

use crate::commands::{ConfigOverrides, RunArgs, Target};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use crate::{csc_commands, replica, suite};
use formprobe::{
    DriverFactory, FailureMode, FixtureStore, MemoryFactory, ProbeConfig, Runner, Suite,
    SuiteReport,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Merge the config file (if any) with command-line overrides
///
/// The base URL always comes from the target: the replica's origin for
/// `builtin`, the given URL otherwise.
pub fn resolve_config(cli: &CliConfig, overrides: &ConfigOverrides) -> CliResult<ProbeConfig> {
    let mut config = match &overrides.config {
        Some(path) => ProbeConfig::load(path)?,
        None => ProbeConfig::default(),
    };

    config.base_url = Some(match &overrides.target {
        Target::Builtin => replica::BASE_URL.to_string(),
        Target::Url(url) => url.clone(),
    });
    if let Some(timeout) = overrides.timeout {
        config.command_timeout_ms = timeout;
    }
    if let Some(dir) = &overrides.fixtures {
        config.fixtures_dir.clone_from(dir);
    }
    if let Some(jobs) = overrides.jobs {
        config.jobs = cli.clone().with_parallel_jobs(jobs).effective_jobs();
    }
    if overrides.fail_fast {
        config.failure_mode = FailureMode::FailFast;
    }

    config
        .validate()
        .map_err(|e| CliError::config(e.to_string()))?;
    Ok(config)
}

/// The suite, optionally reversed
#[must_use]
pub fn build_suite(reverse: bool) -> Suite {
    let suite = suite::csc_suite();
    if reverse {
        suite.reversed()
    } else {
        suite
    }
}

/// Runs the CSC suite against one target
#[derive(Debug)]
pub struct SuiteRunner {
    cli: CliConfig,
    config: ProbeConfig,
    target: Target,
}

impl SuiteRunner {
    /// Create a runner with a resolved configuration
    #[must_use]
    pub const fn new(cli: CliConfig, config: ProbeConfig, target: Target) -> Self {
        Self {
            cli,
            config,
            target,
        }
    }

    /// Resolve configuration from the command line
    pub fn from_overrides(cli: CliConfig, overrides: &ConfigOverrides) -> CliResult<Self> {
        let config = resolve_config(&cli, overrides)?;
        Ok(Self::new(cli, config, overrides.target.clone()))
    }

    /// Effective configuration
    #[must_use]
    pub const fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Where the suite runs
    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    fn fixtures(&self) -> FixtureStore {
        let dir = &self.config.fixtures_dir;
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "fixture directory not found, file cases will fail");
        }
        FixtureStore::new(dir.clone())
    }

    fn runner(&self, factory: Arc<dyn DriverFactory>, filter: Option<&str>) -> CliResult<Runner> {
        let mut settings = self.config.run_settings();
        if let Some(filter) = filter {
            settings = settings.with_filter(filter);
        }
        Ok(Runner::new(factory)
            .with_settings(settings)
            .with_commands(csc_commands::registry()?)
            .with_fixtures(self.fixtures()))
    }

    /// Run the suite and return its report, without judging it
    pub async fn execute(&self, suite: &Suite, filter: Option<&str>) -> CliResult<SuiteReport> {
        let reporter = ProgressReporter::new(
            self.cli.color.should_color(),
            self.cli.verbosity.is_quiet(),
        );
        info!(backend = %self.target, jobs = self.config.jobs, "starting suite");

        match &self.target {
            Target::Builtin => {
                let factory: Arc<dyn DriverFactory> = Arc::new(MemoryFactory::new(replica::site()));
                let runner = self.runner(factory, filter)?;
                Ok(runner.run_with(suite, &reporter).await)
            }
            Target::Url(url) => self.execute_in_browser(suite, filter, url, &reporter).await,
        }
    }

    #[cfg(feature = "browser")]
    async fn execute_in_browser(
        &self,
        suite: &Suite,
        filter: Option<&str>,
        url: &str,
        reporter: &ProgressReporter,
    ) -> CliResult<SuiteReport> {
        use formprobe::ChromiumFactory;

        let factory = Arc::new(ChromiumFactory::launch(self.config.browser.clone()).await?);
        info!(%url, "driving chromium");
        let runner = self.runner(factory.clone(), filter)?;
        let report = runner.run_with(suite, reporter).await;
        if let Err(e) = factory.shutdown().await {
            warn!(error = %e, "chromium did not shut down cleanly");
        }
        Ok(report)
    }

    #[cfg(not(feature = "browser"))]
    #[allow(clippy::unused_async)]
    async fn execute_in_browser(
        &self,
        _suite: &Suite,
        _filter: Option<&str>,
        url: &str,
        _reporter: &ProgressReporter,
    ) -> CliResult<SuiteReport> {
        Err(CliError::config(format!(
            "target {url} needs a browser; rebuild with --features browser"
        )))
    }

    /// Run, write the requested reports and fail if any case failed
    pub async fn run(&self, args: &RunArgs) -> CliResult<SuiteReport> {
        let suite = build_suite(args.reverse);
        let report = self.execute(&suite, args.filter.as_deref()).await?;

        if let Some(path) = &args.junit {
            write_report(path, |p| report.write_junit(p))?;
        }
        if let Some(path) = &args.json {
            write_report(path, |p| report.write_json(p))?;
        }
        if !self.cli.verbosity.is_quiet() {
            print!("{}", report.render_text());
        }

        if report.all_passed() {
            Ok(report)
        } else {
            Err(CliError::test_execution(format!(
                "{} of {} cases failed",
                report.failed_count(),
                report.total_count()
            )))
        }
    }
}

fn write_report(
    path: &Path,
    write: impl FnOnce(&Path) -> formprobe::ProbeResult<()>,
) -> CliResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write(path).map_err(|e| CliError::report_generation(format!("{}: {e}", path.display())))?;
    info!(path = %path.display(), "report written");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Verbosity;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::{NamedTempFile, TempDir};

    fn quiet() -> CliConfig {
        CliConfig::new().with_verbosity(Verbosity::Quiet)
    }

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn builtin_overrides() -> ConfigOverrides {
        ConfigOverrides {
            fixtures: Some(fixtures_dir()),
            ..ConfigOverrides::default()
        }
    }

    mod resolve_tests {
        use super::*;

        #[test]
        fn test_builtin_uses_replica_origin() {
            let config = resolve_config(&quiet(), &ConfigOverrides::default()).unwrap();
            assert_eq!(config.base_url.as_deref(), Some(replica::BASE_URL));
            assert_eq!(config.failure_mode, FailureMode::CollectAll);
        }

        #[test]
        fn test_flags_override_file() {
            let mut file = NamedTempFile::new().unwrap();
            writeln!(file, "command_timeout_ms: 9000\njobs: 2").unwrap();
            let overrides = ConfigOverrides {
                config: Some(file.path().to_path_buf()),
                target: Target::Url("http://localhost:8080/".into()),
                timeout: Some(1200),
                fail_fast: true,
                ..ConfigOverrides::default()
            };
            let config = resolve_config(&quiet(), &overrides).unwrap();
            assert_eq!(config.command_timeout_ms, 1200);
            assert_eq!(config.jobs, 2);
            assert_eq!(config.failure_mode, FailureMode::FailFast);
            assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/"));
        }

        #[test]
        fn test_zero_jobs_means_auto() {
            let overrides = ConfigOverrides {
                jobs: Some(0),
                ..ConfigOverrides::default()
            };
            let config = resolve_config(&quiet(), &overrides).unwrap();
            assert!(config.jobs >= 1);
        }

        #[test]
        fn test_invalid_override_rejected() {
            let overrides = ConfigOverrides {
                timeout: Some(0),
                ..ConfigOverrides::default()
            };
            let err = resolve_config(&quiet(), &overrides).unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
        }

        #[test]
        fn test_missing_config_file() {
            let overrides = ConfigOverrides {
                config: Some(PathBuf::from("/nonexistent/formprobe.yaml")),
                ..ConfigOverrides::default()
            };
            assert!(resolve_config(&quiet(), &overrides).is_err());
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_filtered_run_writes_reports() {
            let runner = SuiteRunner::from_overrides(quiet(), &builtin_overrides()).unwrap();
            let out = TempDir::new().unwrap();
            let args = RunArgs {
                filter: Some("3.".into()),
                junit: Some(out.path().join("reports/junit.xml")),
                json: Some(out.path().join("reports/report.json")),
                ..RunArgs::default()
            };
            let report = runner.run(&args).await.unwrap();
            assert_eq!(report.passed_count(), 3);
            assert_eq!(report.skipped_count(), report.total_count() - 3);

            let junit = std::fs::read_to_string(out.path().join("reports/junit.xml")).unwrap();
            assert!(junit.contains("<testsuite"));
            let json = std::fs::read_to_string(out.path().join("reports/report.json")).unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert!(value.is_object());
        }

        #[tokio::test(start_paused = true)]
        async fn test_failures_become_errors() {
            let overrides = ConfigOverrides {
                fixtures: Some(PathBuf::from("/nonexistent/fixtures")),
                timeout: Some(200),
                ..ConfigOverrides::default()
            };
            let runner = SuiteRunner::from_overrides(quiet(), &overrides).unwrap();
            let args = RunArgs {
                filter: Some("6.2-".into()),
                ..RunArgs::default()
            };
            let err = runner.run(&args).await.unwrap_err();
            assert!(matches!(err, CliError::TestExecution { .. }));
        }

        #[cfg(not(feature = "browser"))]
        #[tokio::test]
        async fn test_url_target_needs_browser_feature() {
            let overrides = ConfigOverrides {
                target: Target::Url("http://localhost:8080/".into()),
                ..ConfigOverrides::default()
            };
            let runner = SuiteRunner::from_overrides(quiet(), &overrides).unwrap();
            let err = runner.execute(&build_suite(false), None).await.unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
        }

        #[test]
        fn test_reverse_suite() {
            let forward = build_suite(false);
            let backward = build_suite(true);
            let mut names = forward.names();
            names.reverse();
            assert_eq!(names, backward.names());
        }
    }
}
