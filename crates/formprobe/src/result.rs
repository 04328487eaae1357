//! Result and error types for formprobe.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for formprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while driving a page
#[derive(Debug, Error)]
pub enum ProbeError {
    /// A selector never produced an element satisfying the requirement
    #[error("Timed out after {timeout_ms}ms retrying: expected `{selector}` {requirement}, but {reason}")]
    LocatorTimeout {
        /// Selector being resolved
        selector: String,
        /// What the element had to satisfy ("to exist", "to be visible", ...)
        requirement: String,
        /// What was observed on the last attempt
        reason: String,
        /// Retry budget in milliseconds
        timeout_ms: u64,
    },

    /// An action was applied to an element that cannot receive it
    #[error("Cannot {action} `{selector}`: {element} {reason}")]
    ActionIncompatible {
        /// Action name
        action: String,
        /// Selector of the subject
        selector: String,
        /// Short description of the element (`<input#phone type=number>`)
        element: String,
        /// Why the action does not apply
        reason: String,
    },

    /// No option of a select element matched
    #[error("Cannot select `{option}` in `{selector}`: no matching option")]
    OptionNotFound {
        /// Selector of the select element
        selector: String,
        /// Requested option
        option: String,
    },

    /// More than one option matched
    #[error("Cannot select `{option}` in `{selector}`: {count} options match")]
    AmbiguousOption {
        /// Selector of the select element
        selector: String,
        /// Requested option
        option: String,
        /// Number of matching options
        count: usize,
    },

    /// An element assertion never held within its retry budget
    #[error("Timed out after {timeout_ms}ms retrying: expected `{selector}` to {predicate} {expected}, but was {actual}")]
    AssertionTimeout {
        /// Selector the assertion re-resolved
        selector: String,
        /// Predicate name (`be.visible`, `have.value`, ...)
        predicate: String,
        /// Expected value (may be empty for unary predicates)
        expected: String,
        /// Value observed on the last attempt
        actual: String,
        /// Retry budget in milliseconds
        timeout_ms: u64,
    },

    /// A value assertion (title, url) never held within its retry budget
    #[error("Timed out after {timeout_ms}ms retrying: expected {subject} to {predicate} {expected}, but was {actual:?}")]
    ValueAssertionTimeout {
        /// Value source (`title`, `url`)
        subject: String,
        /// Predicate name
        predicate: String,
        /// Expected value
        expected: String,
        /// Value observed on the last attempt
        actual: String,
        /// Retry budget in milliseconds
        timeout_ms: u64,
    },

    /// Navigation did not land where expected
    #[error("Navigation mismatch after {action}: expected {expected}, got {actual}")]
    NavigationMismatch {
        /// Action that should have navigated
        action: String,
        /// Expected destination
        expected: String,
        /// Actual URL of the active context
        actual: String,
    },

    /// Command not present in the registry
    #[error("Unknown command `{name}`")]
    UnknownCommand {
        /// Command name
        name: String,
    },

    /// Alias not present in the page's alias table
    #[error("Unknown alias `@{name}`")]
    UnknownAlias {
        /// Alias name without the `@`
        name: String,
    },

    /// Selector syntax the backend does not support
    #[error("Invalid selector `{selector}`: {message}")]
    InvalidSelector {
        /// Offending selector
        selector: String,
        /// Parse error
        message: String,
    },

    /// Fixture could not be loaded
    #[error("Fixture `{name}`: {message}")]
    Fixture {
        /// Fixture name or path
        name: String,
        /// Error message
        message: String,
    },

    /// Command input did not fit the command's record type
    #[error("Invalid input for command `{command}`: {message}")]
    CommandInput {
        /// Command name
        command: String,
        /// Error message
        message: String,
    },

    /// Action arguments rejected before touching the page
    #[error("Invalid argument to {action}: {message}")]
    InvalidArgument {
        /// Action name
        action: String,
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Driver error
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// A test case exceeded its time budget
    #[error("Test case `{name}` timed out after {ms}ms")]
    CaseTimeout {
        /// Case name
        name: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Illegal state transition or use after close
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// Coarse failure classification used in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Element never resolved
    LocatorTimeout,
    /// Action does not apply to the element
    ActionIncompatible,
    /// Assertion never held
    AssertionTimeout,
    /// Navigation landed elsewhere
    NavigationMismatch,
    /// Suite wiring problem (unknown command, bad selector, fixtures, driver)
    Setup,
    /// Environment problem (config, filesystem, serialization)
    Environment,
}

impl FailureKind {
    /// Short label for text output
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LocatorTimeout => "locator timeout",
            Self::ActionIncompatible => "action incompatible",
            Self::AssertionTimeout => "assertion timeout",
            Self::NavigationMismatch => "navigation mismatch",
            Self::Setup => "setup",
            Self::Environment => "environment",
        }
    }
}

/// Selector / predicate / expected / actual details extracted from an error
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Selector or value source involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Predicate or action name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    /// Expected value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Observed value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl ProbeError {
    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::LocatorTimeout { .. } => FailureKind::LocatorTimeout,
            Self::ActionIncompatible { .. }
            | Self::OptionNotFound { .. }
            | Self::AmbiguousOption { .. } => FailureKind::ActionIncompatible,
            Self::AssertionTimeout { .. } | Self::ValueAssertionTimeout { .. } => {
                FailureKind::AssertionTimeout
            }
            Self::NavigationMismatch { .. } => FailureKind::NavigationMismatch,
            Self::UnknownCommand { .. }
            | Self::UnknownAlias { .. }
            | Self::InvalidSelector { .. }
            | Self::Fixture { .. }
            | Self::CommandInput { .. }
            | Self::InvalidArgument { .. }
            | Self::BrowserLaunch { .. }
            | Self::Driver { .. }
            | Self::CaseTimeout { .. }
            | Self::InvalidState { .. } => FailureKind::Setup,
            Self::Config { .. } | Self::Io(_) | Self::Json(_) | Self::Yaml(_) => {
                FailureKind::Environment
            }
        }
    }

    /// Structured details for reports
    #[must_use]
    pub fn diagnostic(&self) -> Diagnostic {
        match self {
            Self::LocatorTimeout {
                selector,
                requirement,
                reason,
                ..
            } => Diagnostic {
                selector: Some(selector.clone()),
                predicate: Some(requirement.clone()),
                expected: None,
                actual: Some(reason.clone()),
            },
            Self::ActionIncompatible {
                action,
                selector,
                element,
                ..
            } => Diagnostic {
                selector: Some(selector.clone()),
                predicate: Some(action.clone()),
                expected: None,
                actual: Some(element.clone()),
            },
            Self::OptionNotFound { selector, option }
            | Self::AmbiguousOption {
                selector, option, ..
            } => Diagnostic {
                selector: Some(selector.clone()),
                predicate: Some("select".to_string()),
                expected: Some(option.clone()),
                actual: None,
            },
            Self::AssertionTimeout {
                selector,
                predicate,
                expected,
                actual,
                ..
            }
            | Self::ValueAssertionTimeout {
                subject: selector,
                predicate,
                expected,
                actual,
                ..
            } => Diagnostic {
                selector: Some(selector.clone()),
                predicate: Some(predicate.clone()),
                expected: (!expected.is_empty()).then(|| expected.clone()),
                actual: Some(actual.clone()),
            },
            Self::NavigationMismatch {
                action,
                expected,
                actual,
            } => Diagnostic {
                selector: None,
                predicate: Some(action.clone()),
                expected: Some(expected.clone()),
                actual: Some(actual.clone()),
            },
            _ => Diagnostic::default(),
        }
    }

    /// Create a driver error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
