//! The whole CSC suite against the in-memory replica.
//!
//! Cases must pass in any order and with several in flight at once, since
//! each one gets a fresh session.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use formprobe::{
    FailureMode, FixtureStore, MemoryFactory, ProbeConfig, RunSettings, Runner, SuiteReport,
    TestStatus,
};
use formprobe_cli::{csc_commands, csc_suite, replica};
use std::path::PathBuf;
use std::sync::Arc;

fn settings() -> RunSettings {
    ProbeConfig {
        base_url: Some(replica::BASE_URL.to_string()),
        ..ProbeConfig::default()
    }
    .run_settings()
}

fn runner(settings: RunSettings) -> Runner {
    let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    Runner::new(Arc::new(MemoryFactory::new(replica::site())))
        .with_settings(settings)
        .with_commands(csc_commands::registry().unwrap())
        .with_fixtures(FixtureStore::new(fixtures))
}

fn assert_all_passed(report: &SuiteReport) {
    let failures: Vec<String> = report
        .failures()
        .iter()
        .map(|c| {
            let message = c.failure.as_ref().map_or("", |f| f.message.as_str());
            format!("{}: {message}", c.name)
        })
        .collect();
    assert!(failures.is_empty(), "failed cases:\n{}", failures.join("\n"));
    assert_eq!(report.passed_count(), report.total_count());
}

#[tokio::test(start_paused = true)]
async fn test_every_case_passes() {
    let suite = csc_suite();
    let report = runner(settings()).run(&suite).await;
    assert_eq!(report.total_count(), suite.len());
    assert_all_passed(&report);
}

#[tokio::test(start_paused = true)]
async fn test_every_case_passes_in_reverse() {
    let suite = csc_suite().reversed();
    let report = runner(settings()).run(&suite).await;
    assert_all_passed(&report);
    assert_eq!(
        report.cases.first().map(|c| c.name.as_str()),
        suite.names().first().copied()
    );
}

#[tokio::test(start_paused = true)]
async fn test_parallel_run_keeps_declaration_order() {
    let suite = csc_suite();
    let report = runner(settings().with_jobs(4)).run(&suite).await;
    assert_all_passed(&report);
    let names: Vec<&str> = report.cases.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, suite.names());
}

#[tokio::test(start_paused = true)]
async fn test_filter_skips_the_rest() {
    let suite = csc_suite();
    let report = runner(settings().with_filter("7.")).run(&suite).await;
    assert_eq!(report.passed_count(), 4);
    assert!(report
        .cases
        .iter()
        .filter(|c| !c.name.starts_with("7."))
        .all(|c| c.status == TestStatus::Skipped));
}

#[tokio::test(start_paused = true)]
async fn test_missing_fixtures_fail_only_file_cases() {
    let suite = csc_suite();
    let report = Runner::new(Arc::new(MemoryFactory::new(replica::site())))
        .with_settings(settings().with_failure_mode(FailureMode::CollectAll))
        .with_commands(csc_commands::registry().unwrap())
        .with_fixtures(FixtureStore::in_memory())
        .run(&suite)
        .await;
    let failed: Vec<&str> = report.failures().iter().map(|c| c.name.as_str()).collect();
    assert!(failed.iter().all(|n| n.starts_with("6.")), "{failed:?}");
    assert!(failed.iter().any(|n| n.starts_with("6.2-")));
}
