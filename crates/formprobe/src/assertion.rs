//! Assertion engine: predicates polled against re-resolved targets.
//!
//! `should` never looks at a cached handle. Every attempt resolves the chain's
//! selector again, so an element that appears, changes or disappears after an
//! action is observed as the page renders it.

pub mod retry;

use crate::driver::ElementState;
use crate::locator::{Chain, ElementHandle};
use crate::page::Page;
use crate::result::{ProbeError, ProbeResult};
use regex::Regex;
use retry::{Poller, RetryConfig};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Outcome of evaluating an expectation once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The predicate holds
    Pass,
    /// The predicate does not hold; `actual` describes what was seen
    Fail {
        /// Observed value
        actual: String,
    },
}

impl Verdict {
    fn check(ok: bool, actual: impl Into<String>) -> Self {
        if ok {
            Self::Pass
        } else {
            Self::Fail {
                actual: actual.into(),
            }
        }
    }

    /// Did the predicate hold
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

type SatisfyFn = Arc<dyn Fn(&ElementHandle) -> Result<(), String> + Send + Sync>;

/// A predicate over a resolved element set
#[derive(Clone)]
pub enum Expectation {
    /// At least one element, every element rendered
    Visible,
    /// No rendered element (nothing matching also passes)
    NotVisible,
    /// At least one element
    Exist,
    /// No element
    NotExist,
    /// Form value of the first element
    Value(String),
    /// First element carries the attribute
    Attr(String),
    /// First element's attribute equals a value
    AttrValue(String, String),
    /// First element lacks the attribute
    NoAttr(String),
    /// Rendered text of the whole set equals
    Text(String),
    /// Rendered text of the whole set contains
    ContainText(String),
    /// Every element carries the class
    Class(String),
    /// Every element is checked
    Checked,
    /// No element is checked
    NotChecked,
    /// Exact number of elements
    Length(usize),
    /// File at `index` of the first element's file list has this name
    FileName {
        /// Position in the file list
        index: usize,
        /// Expected file name
        name: String,
    },
    /// Arbitrary check; `Err` carries the observed value
    Satisfy {
        /// Text used in diagnostics
        description: String,
        /// The check
        check: SatisfyFn,
    },
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expectation({} {})", self.predicate(), self.expected())
    }
}

impl Expectation {
    /// `be.visible`
    #[must_use]
    pub const fn visible() -> Self {
        Self::Visible
    }

    /// `not.be.visible`
    #[must_use]
    pub const fn not_visible() -> Self {
        Self::NotVisible
    }

    /// `exist`
    #[must_use]
    pub const fn exist() -> Self {
        Self::Exist
    }

    /// `not.exist`
    #[must_use]
    pub const fn not_exist() -> Self {
        Self::NotExist
    }

    /// `have.value`
    pub fn value(value: impl Into<String>) -> Self {
        Self::Value(value.into())
    }

    /// `have.attr` (presence only)
    pub fn attr(name: impl Into<String>) -> Self {
        Self::Attr(name.into())
    }

    /// `have.attr` with a value
    pub fn attr_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AttrValue(name.into(), value.into())
    }

    /// `not.have.attr`
    pub fn no_attr(name: impl Into<String>) -> Self {
        Self::NoAttr(name.into())
    }

    /// `have.text`
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// `contain` (text)
    pub fn contain_text(text: impl Into<String>) -> Self {
        Self::ContainText(text.into())
    }

    /// `have.class`
    pub fn class(class: impl Into<String>) -> Self {
        Self::Class(class.into())
    }

    /// `be.checked`
    #[must_use]
    pub const fn checked() -> Self {
        Self::Checked
    }

    /// `not.be.checked`
    #[must_use]
    pub const fn not_checked() -> Self {
        Self::NotChecked
    }

    /// `have.length`
    #[must_use]
    pub const fn length(count: usize) -> Self {
        Self::Length(count)
    }

    /// Name of an attached file
    pub fn file_name(index: usize, name: impl Into<String>) -> Self {
        Self::FileName {
            index,
            name: name.into(),
        }
    }

    /// Custom check over the resolved set
    pub fn satisfy<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ElementHandle) -> Result<(), String> + Send + Sync + 'static,
    {
        Self::Satisfy {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    /// Predicate name as it appears in diagnostics
    #[must_use]
    pub const fn predicate(&self) -> &'static str {
        match self {
            Self::Visible => "be.visible",
            Self::NotVisible => "not.be.visible",
            Self::Exist => "exist",
            Self::NotExist => "not.exist",
            Self::Value(_) => "have.value",
            Self::Attr(_) | Self::AttrValue(..) => "have.attr",
            Self::NoAttr(_) => "not.have.attr",
            Self::Text(_) => "have.text",
            Self::ContainText(_) => "contain",
            Self::Class(_) => "have.class",
            Self::Checked => "be.checked",
            Self::NotChecked => "not.be.checked",
            Self::Length(_) => "have.length",
            Self::FileName { .. } => "have.file.name",
            Self::Satisfy { .. } => "satisfy",
        }
    }

    /// Expected value as it appears in diagnostics (empty for unary predicates)
    #[must_use]
    pub fn expected(&self) -> String {
        match self {
            Self::Visible
            | Self::NotVisible
            | Self::Exist
            | Self::NotExist
            | Self::Checked
            | Self::NotChecked => String::new(),
            Self::Value(v) | Self::Text(v) | Self::ContainText(v) | Self::Class(v) => {
                format!("{v:?}")
            }
            Self::Attr(name) | Self::NoAttr(name) => format!("{name:?}"),
            Self::AttrValue(name, value) => format!("{name:?} = {value:?}"),
            Self::Length(n) => n.to_string(),
            Self::FileName { index, name } => format!("[{index}] {name:?}"),
            Self::Satisfy { description, .. } => description.clone(),
        }
    }

    /// Evaluate once against a resolved set
    #[must_use]
    pub fn evaluate(&self, handle: &ElementHandle) -> Verdict {
        let elements = handle.elements();
        match self {
            Self::Exist => Verdict::check(!elements.is_empty(), "no element"),
            Self::NotExist => Verdict::check(elements.is_empty(), count(elements)),
            Self::Length(n) => Verdict::check(elements.len() == *n, elements.len().to_string()),
            Self::NotVisible => match elements.iter().find(|e| e.visible) {
                None => Verdict::Pass,
                Some(e) => Verdict::Fail {
                    actual: format!("{} visible", e.describe()),
                },
            },
            Self::Satisfy { check, .. } => match check(handle) {
                Ok(()) => Verdict::Pass,
                Err(actual) => Verdict::Fail { actual },
            },
            _ if elements.is_empty() => Verdict::Fail {
                actual: "no element".to_string(),
            },
            Self::Visible => match elements.iter().find(|e| !e.visible) {
                None => Verdict::Pass,
                Some(e) => Verdict::Fail {
                    actual: format!("{} hidden", e.describe()),
                },
            },
            Self::Checked => match elements.iter().find(|e| e.checked != Some(true)) {
                None => Verdict::Pass,
                Some(e) => Verdict::Fail {
                    actual: format!("{} unchecked", e.describe()),
                },
            },
            Self::NotChecked => match elements.iter().find(|e| e.checked == Some(true)) {
                None => Verdict::Pass,
                Some(e) => Verdict::Fail {
                    actual: format!("{} checked", e.describe()),
                },
            },
            Self::Class(class) => match elements.iter().find(|e| !e.has_class(class)) {
                None => Verdict::Pass,
                Some(e) => Verdict::Fail {
                    actual: e.describe(),
                },
            },
            Self::Value(expected) => {
                let actual = first_value(elements);
                Verdict::check(&actual == expected, format!("{actual:?}"))
            }
            Self::Attr(name) => {
                let attr = elements[0].attr(name);
                Verdict::check(attr.is_some(), elements[0].describe())
            }
            Self::AttrValue(name, expected) => {
                let attr = elements[0].attr(name);
                Verdict::check(attr == Some(expected.as_str()), format!("{attr:?}"))
            }
            Self::NoAttr(name) => {
                let attr = elements[0].attr(name);
                Verdict::check(attr.is_none(), format!("{attr:?}"))
            }
            Self::Text(expected) => {
                let actual = joined_text(elements);
                Verdict::check(&actual == expected, format!("{actual:?}"))
            }
            Self::ContainText(expected) => {
                let actual = joined_text(elements);
                Verdict::check(actual.contains(expected.as_str()), format!("{actual:?}"))
            }
            Self::FileName { index, name } => {
                let files = &elements[0].files;
                match files.get(*index) {
                    Some(file) => Verdict::check(&file.name == name, format!("{:?}", file.name)),
                    None => Verdict::Fail {
                        actual: format!("{} file(s) attached", files.len()),
                    },
                }
            }
        }
    }
}

fn count(elements: &[ElementState]) -> String {
    match elements.len() {
        1 => "1 element".to_string(),
        n => format!("{n} elements"),
    }
}

fn first_value(elements: &[ElementState]) -> String {
    elements
        .first()
        .and_then(|e| e.value.clone())
        .unwrap_or_default()
}

fn joined_text(elements: &[ElementState]) -> String {
    elements
        .iter()
        .map(|e| e.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Page {
    async fn poll_expectation(
        &mut self,
        chain_selector: &crate::selector::Selector,
        expectation: &Expectation,
        retry: RetryConfig,
    ) -> ProbeResult<()> {
        let mut poller = Poller::start(&retry);
        loop {
            let handle = self.snapshot(chain_selector).await?;
            match expectation.evaluate(&handle) {
                Verdict::Pass => {
                    debug!(
                        selector = %handle.selector(),
                        predicate = expectation.predicate(),
                        attempts = poller.attempts() + 1,
                        "assertion passed"
                    );
                    return Ok(());
                }
                Verdict::Fail { actual } => {
                    trace!(selector = %handle.selector(), predicate = expectation.predicate(), %actual, "assertion retry");
                    if !poller.wait().await {
                        debug!(selector = %handle.selector(), predicate = expectation.predicate(), %actual, "assertion timed out");
                        return Err(ProbeError::AssertionTimeout {
                            selector: handle.selector().to_string(),
                            predicate: expectation.predicate().to_string(),
                            expected: expectation.expected(),
                            actual,
                            timeout_ms: retry.timeout_ms(),
                        });
                    }
                }
            }
        }
    }
}

impl Chain<'_> {
    /// Wait until the expectation holds for the current target
    pub async fn should(self, expectation: Expectation) -> ProbeResult<Self> {
        let retry = self.page().settings().retry;
        self.should_with(expectation, retry).await
    }

    /// Same as [`Chain::should`]; reads better mid-chain
    pub async fn and(self, expectation: Expectation) -> ProbeResult<Self> {
        self.should(expectation).await
    }

    /// Wait with a custom timeout
    pub async fn should_within(self, expectation: Expectation, timeout: Duration) -> ProbeResult<Self> {
        let retry = self.page().settings().retry.with_timeout(timeout);
        self.should_with(expectation, retry).await
    }

    async fn should_with(mut self, expectation: Expectation, retry: RetryConfig) -> ProbeResult<Self> {
        let selector = self.selector().clone();
        self.page_mut()
            .poll_expectation(&selector, &expectation, retry)
            .await?;
        Ok(self)
    }
}

/// A predicate over a computed string value
#[derive(Debug, Clone)]
pub enum ValueExpectation {
    /// Exact equality
    Equal(String),
    /// Substring
    Contain(String),
    /// Membership in a set of accepted values
    OneOf(Vec<String>),
    /// Regular expression match
    Matches(Regex),
}

impl ValueExpectation {
    /// `eq`
    pub fn equal(value: impl Into<String>) -> Self {
        Self::Equal(value.into())
    }

    /// `contain`
    pub fn contain(value: impl Into<String>) -> Self {
        Self::Contain(value.into())
    }

    /// `be.oneOf`
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf(values.into_iter().map(Into::into).collect())
    }

    /// `match`
    #[must_use]
    pub const fn matches(pattern: Regex) -> Self {
        Self::Matches(pattern)
    }

    /// Predicate name
    #[must_use]
    pub const fn predicate(&self) -> &'static str {
        match self {
            Self::Equal(_) => "eq",
            Self::Contain(_) => "contain",
            Self::OneOf(_) => "be.oneOf",
            Self::Matches(_) => "match",
        }
    }

    /// Expected value for diagnostics
    #[must_use]
    pub fn expected(&self) -> String {
        match self {
            Self::Equal(v) | Self::Contain(v) => format!("{v:?}"),
            Self::OneOf(set) => format!("{set:?}"),
            Self::Matches(re) => format!("/{}/", re.as_str()),
        }
    }

    /// Does the value satisfy the predicate
    #[must_use]
    pub fn holds(&self, actual: &str) -> bool {
        match self {
            Self::Equal(v) => actual == v,
            Self::Contain(v) => actual.contains(v.as_str()),
            Self::OneOf(set) => set.iter().any(|v| v == actual),
            Self::Matches(re) => re.is_match(actual),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueSource {
    Title,
    Url,
}

impl ValueSource {
    const fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Url => "url",
        }
    }
}

/// A page-level value (title, URL) under assertion
pub struct ValueChain<'p> {
    page: &'p mut Page,
    source: ValueSource,
}

impl fmt::Debug for ValueChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueChain")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl<'p> ValueChain<'p> {
    pub(crate) fn title(page: &'p mut Page) -> Self {
        Self {
            page,
            source: ValueSource::Title,
        }
    }

    pub(crate) fn url(page: &'p mut Page) -> Self {
        Self {
            page,
            source: ValueSource::Url,
        }
    }

    /// Read the value once
    pub async fn value(&mut self) -> ProbeResult<String> {
        let driver = self.page.driver_mut();
        match self.source {
            ValueSource::Title => driver.title().await,
            ValueSource::Url => driver.url().await,
        }
    }

    /// Wait until the value satisfies the expectation
    pub async fn should(mut self, expectation: ValueExpectation) -> ProbeResult<Self> {
        let retry = self.page.settings().retry;
        let mut poller = Poller::start(&retry);
        loop {
            let actual = self.value().await?;
            if expectation.holds(&actual) {
                debug!(subject = self.source.name(), predicate = expectation.predicate(), "assertion passed");
                return Ok(self);
            }
            if !poller.wait().await {
                return Err(ProbeError::ValueAssertionTimeout {
                    subject: self.source.name().to_string(),
                    predicate: expectation.predicate().to_string(),
                    expected: expectation.expected(),
                    actual,
                    timeout_ms: retry.timeout_ms(),
                });
            }
        }
    }

    /// Same as [`ValueChain::should`]
    pub async fn and(self, expectation: ValueExpectation) -> ProbeResult<Self> {
        self.should(expectation).await
    }
}
