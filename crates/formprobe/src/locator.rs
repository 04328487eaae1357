//! Element locator: chains of selectors resolved with bounded retry.
//!
//! A [`Chain`] names a logical target ("the last checkbox", "every radio
//! inside `#support-type`"). Each action or assertion on the chain resolves
//! the target afresh, so a chain survives re-renders, and nothing resolved is
//! ever cached between steps.

use crate::assertion::retry::Poller;
use crate::driver::ElementState;
use crate::page::Page;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{Position, Selector};
use std::fmt;
use tracing::{debug, trace};

/// A resolved selector: the elements it matched at one instant
#[derive(Debug, Clone)]
pub struct ElementHandle {
    selector: Selector,
    elements: Vec<ElementState>,
}

impl ElementHandle {
    /// Wrap a resolution result
    #[must_use]
    pub const fn new(selector: Selector, elements: Vec<ElementState>) -> Self {
        Self { selector, elements }
    }

    /// The selector this handle was resolved from
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Matched elements in document order
    #[must_use]
    pub fn elements(&self) -> &[ElementState] {
        &self.elements
    }

    /// First matched element
    #[must_use]
    pub fn first(&self) -> Option<&ElementState> {
        self.elements.first()
    }

    /// Number of matched elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// No element matched
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// What an element must satisfy before an action may touch it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Present in the document
    Exist,
    /// Present, rendered and enabled
    Actionable,
}

impl Requirement {
    const fn describe(self) -> &'static str {
        match self {
            Self::Exist => "to exist",
            Self::Actionable => "to be visible and enabled",
        }
    }

    fn unmet(self, elements: &[ElementState]) -> Option<String> {
        if elements.is_empty() {
            return Some("no element matched".to_string());
        }
        match self {
            Self::Exist => None,
            Self::Actionable => elements
                .iter()
                .find(|e| !e.visible)
                .map(|e| format!("{} is not visible", e.describe()))
                .or_else(|| {
                    elements
                        .iter()
                        .find(|e| e.disabled)
                        .map(|e| format!("{} is disabled", e.describe()))
                }),
        }
    }
}

impl Page {
    /// Resolve with retry until the requirement holds or the budget is spent
    pub(crate) async fn resolve(
        &mut self,
        selector: &Selector,
        requirement: Requirement,
        action: &str,
    ) -> ProbeResult<ElementHandle> {
        let selector = self.expand(selector)?;
        let retry = self.settings().retry;
        let mut poller = Poller::start(&retry);
        loop {
            let elements = self.driver_mut().query(&selector).await?;
            match requirement.unmet(&elements) {
                None => {
                    trace!(%selector, action, matched = elements.len(), attempts = poller.attempts() + 1, "resolved");
                    return Ok(ElementHandle::new(selector, elements));
                }
                Some(reason) => {
                    if !poller.wait().await {
                        debug!(%selector, action, %reason, "resolution timed out");
                        return Err(ProbeError::LocatorTimeout {
                            selector: selector.to_string(),
                            requirement: requirement.describe().to_string(),
                            reason,
                            timeout_ms: retry.timeout_ms(),
                        });
                    }
                }
            }
        }
    }

    /// Resolve once, no retry, no requirement
    pub(crate) async fn snapshot(&mut self, selector: &Selector) -> ProbeResult<ElementHandle> {
        let selector = self.expand(selector)?;
        let elements = self.driver_mut().query(&selector).await?;
        Ok(ElementHandle::new(selector, elements))
    }
}

/// A logical target on a page, threaded through actions and assertions
pub struct Chain<'p> {
    page: &'p mut Page,
    selector: Selector,
}

impl fmt::Debug for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("selector", &self.selector.to_string())
            .finish_non_exhaustive()
    }
}

impl<'p> Chain<'p> {
    pub(crate) fn new(page: &'p mut Page, selector: Selector) -> Self {
        Self { page, selector }
    }

    /// Current target
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    pub(crate) fn page(&self) -> &Page {
        self.page
    }

    pub(crate) fn page_mut(&mut self) -> &mut Page {
        self.page
    }

    /// Descendants matching `css` inside the current target
    #[must_use]
    pub fn find(self, css: &str) -> Self {
        Self {
            selector: self.selector.within(css),
            page: self.page,
        }
    }

    /// First element of the current target
    #[must_use]
    pub fn first(self) -> Self {
        self.eq(0)
    }

    /// Last element of the current target
    #[must_use]
    pub fn last(self) -> Self {
        Self {
            selector: self.selector.nth(Position::Last),
            page: self.page,
        }
    }

    /// Element at `index` of the current target
    #[must_use]
    pub fn eq(self, index: usize) -> Self {
        Self {
            selector: self.selector.nth(Position::Index(index)),
            page: self.page,
        }
    }

    /// Register the current target as `@name`
    pub fn as_alias(self, name: &str) -> ProbeResult<Self> {
        let expanded = self.page.expand(&self.selector)?;
        self.page.set_element_alias(name, expanded);
        Ok(self)
    }

    /// Resolve the target, waiting until at least one element exists
    pub async fn handle(mut self) -> ProbeResult<ElementHandle> {
        self.resolve(Requirement::Exist, "get").await
    }

    /// Number of elements the target matches right now
    pub async fn count(self) -> ProbeResult<usize> {
        Ok(self.page.snapshot(&self.selector).await?.len())
    }

    pub(crate) async fn resolve(
        &mut self,
        requirement: Requirement,
        action: &str,
    ) -> ProbeResult<ElementHandle> {
        let selector = self.selector.clone();
        self.page.resolve(&selector, requirement, action).await
    }
}
