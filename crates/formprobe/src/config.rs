//! Run configuration loaded from YAML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Unknown keys are rejected to catch typos early.

use crate::assertion::retry::RetryConfig;
use crate::browser::BrowserConfig;
use crate::harness::RunSettings;
use crate::page::PageSettings;
use crate::reporter::FailureMode;
use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Everything a run can be tuned with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Base for relative `visit` URLs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Retry budget for element resolution and assertions
    pub command_timeout_ms: u64,
    /// First pause between attempts
    pub poll_interval_ms: u64,
    /// Growth factor for the pause
    pub backoff: f64,
    /// Ceiling for the pause
    pub max_poll_interval_ms: u64,
    /// Budget for one whole case
    pub case_timeout_ms: u64,
    /// Pause between keystrokes
    pub type_delay_ms: u64,
    /// Where fixture files live
    pub fixtures_dir: PathBuf,
    /// What to do after a failing case
    pub failure_mode: FailureMode,
    /// Cases in flight at once
    pub jobs: usize,
    /// Chromium settings (used with the `browser` feature)
    pub browser: BrowserConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            command_timeout_ms: 4000,
            poll_interval_ms: 50,
            backoff: 1.5,
            max_poll_interval_ms: 500,
            case_timeout_ms: 60_000,
            type_delay_ms: 10,
            fixtures_dir: PathBuf::from("fixtures"),
            failure_mode: FailureMode::CollectAll,
            jobs: 1,
            browser: BrowserConfig::default(),
        }
    }
}

impl ProbeConfig {
    /// Read and validate a YAML file
    pub fn load(path: impl AsRef<Path>) -> ProbeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProbeError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "loaded config");
        Self::from_yaml_str(&text)
    }

    /// Parse and validate YAML text
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        // an empty document deserializes as unit, not as an empty mapping
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> ProbeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Reject values that would make every run fail or hang
    pub fn validate(&self) -> ProbeResult<()> {
        if self.command_timeout_ms == 0 {
            return Err(ProbeError::config("command_timeout_ms must be positive"));
        }
        if self.case_timeout_ms == 0 {
            return Err(ProbeError::config("case_timeout_ms must be positive"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ProbeError::config("poll_interval_ms must be positive"));
        }
        if self.max_poll_interval_ms < self.poll_interval_ms {
            return Err(ProbeError::config(
                "max_poll_interval_ms must not be below poll_interval_ms",
            ));
        }
        if !(self.backoff >= 1.0 && self.backoff.is_finite()) {
            return Err(ProbeError::config(format!(
                "backoff must be a finite number >= 1.0, got {}",
                self.backoff
            )));
        }
        if self.jobs == 0 {
            return Err(ProbeError::config("jobs must be at least 1"));
        }
        if self.browser.viewport_width == 0 || self.browser.viewport_height == 0 {
            return Err(ProbeError::config("browser viewport must be non-empty"));
        }
        Ok(())
    }

    /// Retry budget for resolution and assertions
    #[must_use]
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new(Duration::from_millis(self.command_timeout_ms))
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_backoff(self.backoff)
            .with_max_interval(Duration::from_millis(self.max_poll_interval_ms))
    }

    /// Settings for every page of the run
    #[must_use]
    pub fn page_settings(&self) -> PageSettings {
        let settings = PageSettings::default()
            .with_retry(self.retry())
            .with_type_delay(Duration::from_millis(self.type_delay_ms));
        match &self.base_url {
            Some(base) => settings.with_base_url(base.clone()),
            None => settings,
        }
    }

    /// Orchestration settings (no name filter)
    #[must_use]
    pub fn run_settings(&self) -> RunSettings {
        RunSettings::default()
            .with_page(self.page_settings())
            .with_case_timeout(Duration::from_millis(self.case_timeout_ms))
            .with_failure_mode(self.failure_mode)
            .with_jobs(self.jobs)
    }
}
