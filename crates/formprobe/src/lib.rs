//! formprobe: Rust-native browser automation for end-to-end form testing
//!
//! A test case drives a [`Page`] through chains of locate, act and assert
//! steps. Element resolution and assertions retry within a bounded budget;
//! actions run once against whatever the locator resolved.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Suite/Runner │──►│ Page + Chain │──►│ Driver trait │──►│ memory DOM / │
//! │ (harness)    │   │ locate/act/  │   │              │   │ Chromium CDP │
//! │ + Commands   │   │ should       │   │              │   │              │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ```ignore
//! let suite = Suite::new("form", "./src/index.html").case("submits", |ctx| {
//!     Box::pin(async move {
//!         ctx.get("#firstName").type_text("First").await?;
//!         ctx.get("button[type=\"submit\"]").click().await?;
//!         ctx.get(".success").should(Expectation::visible()).await?;
//!         Ok(())
//!     })
//! });
//! let report = Runner::new(Arc::new(MemoryFactory::new(site))).run(&suite).await;
//! assert!(report.all_passed());
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod action;
mod assertion;
mod browser;
mod command;
mod config;
mod driver;
mod fixture;
mod harness;
mod locator;
mod page;
mod reporter;
mod result;
mod selector;

/// In-memory documents: element trees, CSS matching, form behavior, page scripts
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod dom;

pub use action::{
    parse_keys, FileSource, Invocation, Key, OptionMatch, SelectFileAction, SelectFileOptions,
    TypeOptions,
};
pub use assertion::retry::{Poller, RetryConfig};
pub use assertion::{Expectation, ValueChain, ValueExpectation, Verdict};
pub use browser::BrowserConfig;
#[cfg(feature = "browser")]
pub use browser::{ChromiumDriver, ChromiumFactory};
pub use command::{Command, CommandInput, CommandRegistry};
pub use config::ProbeConfig;
pub use driver::{
    Driver, DriverFactory, ElementKind, ElementRef, ElementState, FileInfo, MemoryDriver,
    MemoryFactory,
};
pub use fixture::{FilePayload, FixtureStore};
pub use harness::{
    CaseState, NoopObserver, RunObserver, RunSettings, Runner, Suite, TestCase, TestContext,
};
pub use locator::{Chain, ElementHandle, Requirement};
pub use page::{FixtureChain, Page, PageSettings};
pub use reporter::{CaseReport, FailureMode, FailureReport, SuiteReport, TestStatus};
pub use result::{Diagnostic, FailureKind, ProbeError, ProbeResult};
pub use selector::{normalize_whitespace, Position, Selector, TextMatch};

/// Boxed future returned by case bodies and closure commands
pub use futures::future::BoxFuture;

/// Everything a suite author needs
pub mod prelude {
    pub use super::action::*;
    pub use super::assertion::retry::RetryConfig;
    pub use super::assertion::*;
    pub use super::browser::*;
    pub use super::command::*;
    pub use super::config::*;
    pub use super::driver::*;
    pub use super::fixture::*;
    pub use super::harness::*;
    pub use super::locator::*;
    pub use super::page::*;
    pub use super::reporter::*;
    pub use super::result::*;
    pub use super::selector::*;
    pub use futures::future::BoxFuture;
}
