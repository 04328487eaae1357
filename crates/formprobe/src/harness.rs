//! Test orchestrator: suites of isolated cases and the runner that drives them.
//!
//! Every case gets its own driver session from the factory and starts by
//! visiting the suite's entry URL. Nothing a case does (DOM changes, aliases,
//! opened windows) can be seen by another case, so declaration order never
//! changes outcomes.

use crate::command::{CommandInput, CommandRegistry};
use crate::driver::DriverFactory;
use crate::fixture::FixtureStore;
use crate::page::{Page, PageSettings};
use crate::reporter::{CaseReport, FailureMode, SuiteReport};
use crate::result::{ProbeError, ProbeResult};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};

/// Lifecycle of one case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    /// Not started
    Pending,
    /// Session launched, body executing
    Running,
    /// Body completed
    Passed,
    /// Body raised an error
    Failed,
    /// Never started
    Skipped,
}

impl CaseState {
    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn advance(self, next: Self) -> ProbeResult<Self> {
        let allowed = matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Skipped)
                | (Self::Running, Self::Passed | Self::Failed)
        );
        if allowed {
            Ok(next)
        } else {
            Err(ProbeError::InvalidState {
                message: format!("case cannot go from {self:?} to {next:?}"),
            })
        }
    }

    /// End a running case with the outcome of its body
    pub fn finish(self, outcome: &ProbeResult<()>) -> ProbeResult<Self> {
        self.advance(if outcome.is_ok() {
            Self::Passed
        } else {
            Self::Failed
        })
    }

    /// No further transitions possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Skipped)
    }
}

type CaseBody =
    Arc<dyn for<'a> Fn(&'a mut TestContext) -> BoxFuture<'a, ProbeResult<()>> + Send + Sync>;

/// A single named case
#[derive(Clone)]
pub struct TestCase {
    name: String,
    body: CaseBody,
    timeout: Option<Duration>,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TestCase {
    /// Create a case from an async body
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: for<'a> Fn(&'a mut TestContext) -> BoxFuture<'a, ProbeResult<()>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(body),
            timeout: None,
        }
    }

    /// Override the runner's case timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Case name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An ordered set of cases sharing an entry page
#[derive(Debug, Clone)]
pub struct Suite {
    name: String,
    entry_url: String,
    cases: Vec<TestCase>,
}

impl Suite {
    /// Create a new suite
    pub fn new(name: impl Into<String>, entry_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry_url: entry_url.into(),
            cases: Vec::new(),
        }
    }

    /// Append a case
    #[must_use]
    pub fn case<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: for<'a> Fn(&'a mut TestContext) -> BoxFuture<'a, ProbeResult<()>> + Send + Sync + 'static,
    {
        self.cases.push(TestCase::new(name, body));
        self
    }

    /// Append a prepared case
    #[must_use]
    pub fn with_case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    /// Suite name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Page each case starts on
    #[must_use]
    pub fn entry_url(&self) -> &str {
        &self.entry_url
    }

    /// Cases in declaration order
    #[must_use]
    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Case names in declaration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.cases.iter().map(TestCase::name).collect()
    }

    /// Same cases in reverse order
    #[must_use]
    pub fn reversed(mut self) -> Self {
        self.cases.reverse();
        self
    }

    /// Get the number of cases
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// No cases
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// Everything a case body can reach
///
/// Dereferences to the [`Page`], so bodies write `cx.get("#email")`.
pub struct TestContext {
    page: Page,
    commands: Arc<CommandRegistry>,
    case_name: String,
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("case", &self.case_name)
            .field("page", &self.page)
            .finish_non_exhaustive()
    }
}

impl TestContext {
    /// Context over an existing page
    pub fn new(page: Page, commands: Arc<CommandRegistry>, case_name: impl Into<String>) -> Self {
        Self {
            page,
            commands,
            case_name: case_name.into(),
        }
    }

    /// Name of the running case
    #[must_use]
    pub fn case_name(&self) -> &str {
        &self.case_name
    }

    /// The page under test
    pub fn page(&mut self) -> &mut Page {
        &mut self.page
    }

    /// Run a registered command
    pub async fn command(&mut self, name: &str, input: Option<&CommandInput>) -> ProbeResult<()> {
        let commands = Arc::clone(&self.commands);
        commands.invoke(name, &mut self.page, input).await
    }

    fn into_page(self) -> Page {
        self.page
    }
}

impl Deref for TestContext {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.page
    }
}

impl DerefMut for TestContext {
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.page
    }
}

/// Orchestration knobs
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Settings for every page
    pub page: PageSettings,
    /// Default per-case budget
    pub case_timeout: Duration,
    /// What to do after a failure
    pub failure_mode: FailureMode,
    /// Cases in flight at once
    pub jobs: usize,
    /// Only run cases whose name contains this
    pub filter: Option<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            page: PageSettings::default(),
            case_timeout: Duration::from_secs(60),
            failure_mode: FailureMode::default(),
            jobs: 1,
            filter: None,
        }
    }
}

impl RunSettings {
    /// Set page settings
    #[must_use]
    pub fn with_page(mut self, page: PageSettings) -> Self {
        self.page = page;
        self
    }

    /// Set the case timeout
    #[must_use]
    pub const fn with_case_timeout(mut self, timeout: Duration) -> Self {
        self.case_timeout = timeout;
        self
    }

    /// Set the failure mode
    #[must_use]
    pub const fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Set parallelism (0 is treated as 1)
    #[must_use]
    pub const fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Set the name filter
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn selects(&self, name: &str) -> bool {
        self.filter.as_deref().map_or(true, |f| name.contains(f))
    }
}

/// Progress callbacks
pub trait RunObserver: Send + Sync {
    /// Run begins
    fn suite_started(&self, _suite: &str, _total: usize) {}
    /// A case begins executing
    fn case_started(&self, _name: &str) {}
    /// A case has a final status
    fn case_finished(&self, _report: &CaseReport) {}
    /// Run complete
    fn suite_finished(&self, _report: &SuiteReport) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Runs suites against sessions from a driver factory
pub struct Runner {
    settings: RunSettings,
    factory: Arc<dyn DriverFactory>,
    commands: Arc<CommandRegistry>,
    fixtures: Arc<FixtureStore>,
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("backend", &self.factory.backend())
            .field("settings", &self.settings)
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// Runner with default settings, no commands and no fixtures
    pub fn new(factory: Arc<dyn DriverFactory>) -> Self {
        Self {
            settings: RunSettings::default(),
            factory,
            commands: Arc::new(CommandRegistry::new()),
            fixtures: Arc::new(FixtureStore::in_memory()),
        }
    }

    /// Set run settings
    #[must_use]
    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Freeze and attach a command registry
    #[must_use]
    pub fn with_commands(mut self, commands: CommandRegistry) -> Self {
        self.commands = Arc::new(commands);
        self
    }

    /// Attach a fixture store
    #[must_use]
    pub fn with_fixtures(mut self, fixtures: FixtureStore) -> Self {
        self.fixtures = Arc::new(fixtures);
        self
    }

    /// Current settings
    #[must_use]
    pub const fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Registered commands
    #[must_use]
    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Run a suite without progress callbacks
    pub async fn run(&self, suite: &Suite) -> SuiteReport {
        self.run_with(suite, &NoopObserver).await
    }

    /// Run a suite, reporting progress to `observer`
    pub async fn run_with(&self, suite: &Suite, observer: &dyn RunObserver) -> SuiteReport {
        let mut report = SuiteReport::new(suite.name());
        let started = Instant::now();
        let stop = AtomicBool::new(false);
        let jobs = self.settings.jobs.max(1);
        let span = info_span!("suite", name = %suite.name(), backend = self.factory.backend(), jobs);

        async {
            info!(cases = suite.len(), "suite started");
            observer.suite_started(suite.name(), suite.len());

            let outcomes: Vec<CaseReport> = stream::iter(suite.cases())
                .map(|case| {
                    let stop = &stop;
                    async move {
                        if !self.settings.selects(case.name()) || stop.load(Ordering::SeqCst) {
                            let skipped = CaseReport::skipped(case.name());
                            observer.case_finished(&skipped);
                            return skipped;
                        }
                        observer.case_started(case.name());
                        let outcome = self.run_case(suite, case).await;
                        if outcome.status.is_failed() && self.settings.failure_mode == FailureMode::FailFast {
                            warn!(case = %case.name(), "fail-fast: stopping the suite");
                            stop.store(true, Ordering::SeqCst);
                        }
                        observer.case_finished(&outcome);
                        outcome
                    }
                })
                .buffered(jobs)
                .collect()
                .await;

            for outcome in outcomes {
                report.push(outcome);
            }
            report.duration = started.elapsed();
            info!(
                passed = report.passed_count(),
                failed = report.failed_count(),
                skipped = report.skipped_count(),
                "suite finished"
            );
            observer.suite_finished(&report);
        }
        .instrument(span)
        .await;

        report
    }

    /// Run one case in a fresh session
    pub async fn run_case(&self, suite: &Suite, case: &TestCase) -> CaseReport {
        let started = Instant::now();
        let mut state = CaseState::Pending;
        let result = async {
            state = state.advance(CaseState::Running)?;
            self.execute(suite, case).await
        }
        .instrument(info_span!("case", name = %case.name()))
        .await;
        let duration = started.elapsed();
        let ended = state.finish(&result);

        // the body's own error wins over a lifecycle violation
        match (result, ended) {
            (Ok(()), Ok(_)) => {
                info!(case = %case.name(), ms = duration.as_millis() as u64, "passed");
                CaseReport::passed(case.name(), duration)
            }
            (Err(err), _) | (Ok(()), Err(err)) => {
                warn!(case = %case.name(), kind = err.kind().label(), error = %err, "failed");
                CaseReport::failed(case.name(), duration, &err)
            }
        }
    }

    async fn execute(&self, suite: &Suite, case: &TestCase) -> ProbeResult<()> {
        let driver = self.factory.launch().await?;
        let page = Page::new(driver, self.settings.page.clone(), Arc::clone(&self.fixtures));
        let mut cx = TestContext::new(page, Arc::clone(&self.commands), case.name());
        let budget = case.timeout.unwrap_or(self.settings.case_timeout);

        let outcome = tokio::time::timeout(budget, async {
            cx.visit(suite.entry_url()).await?;
            (case.body)(&mut cx).await
        })
        .await
        .unwrap_or_else(|_| {
            Err(ProbeError::CaseTimeout {
                name: case.name().to_string(),
                ms: budget.as_millis() as u64,
            })
        });

        let mut page = cx.into_page();
        let closed = page.close().await;
        outcome?;
        closed
    }
}
