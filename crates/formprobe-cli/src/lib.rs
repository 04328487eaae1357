//! formprobe CLI library
//!
//! Runs the TAT Customer Service Center form suite, either against the
//! built-in in-memory replica of the application or, with the `browser`
//! feature, against a served copy driven through Chromium.
//!
//! ## Usage
//!
//! ```bash
//! formprobe run                                  # whole suite, built-in replica
//! formprobe run --filter 6. --junit junit.xml    # file-upload cases only
//! formprobe run --target http://localhost:8080   # live app (browser feature)
//! formprobe list                                 # case names
//! formprobe config --config formprobe.yaml       # effective configuration
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
pub mod csc_commands;
mod error;
pub mod logging;
mod output;
pub mod replica;
mod runner;
pub mod suite;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, ConfigOverrides, ListArgs, LogFormatArg, RunArgs, Target,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use csc_commands::{ContactRecord, FillMandatoryFieldsAndSubmit, FILL_MANDATORY_FIELDS_AND_SUBMIT};
pub use error::{CliError, CliResult};
pub use logging::LogFormat;
pub use output::ProgressReporter;
pub use runner::{build_suite, resolve_config, SuiteRunner};
pub use suite::csc_suite;
