//! A page under test: one driver session plus the per-case alias table.

use crate::action::FileSource;
use crate::assertion::retry::RetryConfig;
use crate::assertion::ValueChain;
use crate::driver::Driver;
use crate::dom::resolve_url;
use crate::fixture::{FilePayload, FixtureStore};
use crate::locator::Chain;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{Selector, TextMatch};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Knobs every command on a page shares
#[derive(Debug, Clone, PartialEq)]
pub struct PageSettings {
    /// Base for relative `visit` URLs
    pub base_url: Option<String>,
    /// Retry budget for resolution and assertions
    pub retry: RetryConfig,
    /// Default pause between keystrokes
    pub type_delay: Duration,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            retry: RetryConfig::default(),
            type_delay: Duration::from_millis(10),
        }
    }
}

impl PageSettings {
    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = Some(base.into());
        self
    }

    /// Set the retry budget
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the keystroke delay
    #[must_use]
    pub const fn with_type_delay(mut self, delay: Duration) -> Self {
        self.type_delay = delay;
        self
    }
}

#[derive(Debug, Default)]
struct AliasTable {
    elements: HashMap<String, Selector>,
    files: HashMap<String, FilePayload>,
}

/// A page under test
///
/// Owns one driver session. Element aliases and file aliases live here and
/// die with the page, so nothing leaks between test cases.
pub struct Page {
    driver: Box<dyn Driver>,
    settings: PageSettings,
    fixtures: Arc<FixtureStore>,
    aliases: AliasTable,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("backend", &self.driver.backend())
            .field("settings", &self.settings)
            .field("aliases", &self.aliases)
            .finish_non_exhaustive()
    }
}

impl Page {
    /// Wrap a driver session
    #[must_use]
    pub fn new(driver: Box<dyn Driver>, settings: PageSettings, fixtures: Arc<FixtureStore>) -> Self {
        Self {
            driver,
            settings,
            fixtures,
            aliases: AliasTable::default(),
        }
    }

    /// Shared settings
    #[must_use]
    pub const fn settings(&self) -> &PageSettings {
        &self.settings
    }

    /// Fixture store
    #[must_use]
    pub fn fixtures(&self) -> &FixtureStore {
        &self.fixtures
    }

    /// The underlying session
    pub fn driver_mut(&mut self) -> &mut dyn Driver {
        self.driver.as_mut()
    }

    /// Load a URL (relative URLs resolve against the base URL)
    pub async fn visit(&mut self, url: &str) -> ProbeResult<()> {
        let target = match &self.settings.base_url {
            Some(base) if !url.contains("://") => resolve_url(base, url),
            _ => url.to_string(),
        };
        info!(url = %target, "visit");
        self.driver.navigate(&target).await
    }

    /// Reload the active document
    pub async fn reload(&mut self) -> ProbeResult<()> {
        debug!("reload");
        self.driver.reload().await
    }

    /// Elements matching a CSS selector (or `@alias`)
    pub fn get(&mut self, selector: impl Into<Selector>) -> Chain<'_> {
        Chain::new(self, selector.into())
    }

    /// Elements matching `css` whose text matches
    pub fn contains(&mut self, css: &str, text: impl Into<TextMatch>) -> Chain<'_> {
        Chain::new(self, Selector::contains(css, text))
    }

    /// Deepest elements whose text matches
    pub fn contains_text(&mut self, text: impl Into<TextMatch>) -> Chain<'_> {
        Chain::new(self, Selector::text(text))
    }

    /// A previously aliased element
    pub fn alias(&mut self, name: &str) -> Chain<'_> {
        Chain::new(self, Selector::alias(name))
    }

    /// The document title as an assertable value
    pub fn title(&mut self) -> ValueChain<'_> {
        ValueChain::title(self)
    }

    /// The active URL as an assertable value
    pub fn url(&mut self) -> ValueChain<'_> {
        ValueChain::url(self)
    }

    /// Load a fixture; chain `.as_alias(name)` to use it as `@name`
    pub fn fixture(&mut self, name: &str) -> ProbeResult<FixtureChain<'_>> {
        let payload = self.fixtures.load(name)?;
        Ok(FixtureChain {
            page: self,
            payload,
        })
    }

    /// Close the driver session
    pub async fn close(&mut self) -> ProbeResult<()> {
        self.driver.close().await
    }

    pub(crate) fn set_element_alias(&mut self, name: &str, selector: Selector) {
        debug!(alias = name, %selector, "alias element");
        self.aliases.elements.insert(name.to_string(), selector);
    }

    /// Replace alias references with the selectors they stand for
    pub(crate) fn expand(&self, selector: &Selector) -> ProbeResult<Selector> {
        Ok(match selector {
            Selector::Alias(name) => self
                .aliases
                .elements
                .get(name)
                .cloned()
                .ok_or_else(|| ProbeError::UnknownAlias { name: name.clone() })?,
            Selector::Within { scope, css } => Selector::Within {
                scope: Box::new(self.expand(scope)?),
                css: css.clone(),
            },
            Selector::Nth { inner, position } => Selector::Nth {
                inner: Box::new(self.expand(inner)?),
                position: *position,
            },
            other => other.clone(),
        })
    }

    pub(crate) fn load_file(&self, source: &FileSource) -> ProbeResult<FilePayload> {
        match source {
            FileSource::Path(path) => self.fixtures.load_path(path),
            FileSource::Payload(payload) => Ok(payload.clone()),
            FileSource::Alias(name) => self
                .aliases
                .files
                .get(name)
                .cloned()
                .ok_or_else(|| ProbeError::UnknownAlias { name: name.clone() }),
        }
    }
}

/// A loaded fixture, waiting to be aliased
#[derive(Debug)]
pub struct FixtureChain<'p> {
    page: &'p mut Page,
    payload: FilePayload,
}

impl FixtureChain<'_> {
    /// Register the fixture as `@name` for `select_file`
    pub fn as_alias(self, name: &str) -> FilePayload {
        debug!(alias = name, file = %self.payload.name, "alias fixture");
        self.page
            .aliases
            .files
            .insert(name.to_string(), self.payload.clone());
        self.payload
    }

    /// The payload without aliasing it
    #[must_use]
    pub fn payload(self) -> FilePayload {
        self.payload
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dom::{Document, El, Site};
    use crate::driver::MemoryDriver;
    use crate::selector::Position;

    fn page() -> Page {
        let site = Site::new("memory://t").page("index.html", |url| {
            Document::new(url, "T", El::new("body").child(El::input("file").id("upload")))
        });
        let fixtures = FixtureStore::in_memory().with_fixture("example.json", b"{}".to_vec());
        Page::new(
            Box::new(MemoryDriver::new(Arc::new(site))),
            PageSettings::default().with_base_url("memory://t/"),
            Arc::new(fixtures),
        )
    }

    #[tokio::test]
    async fn test_visit_relative() {
        let mut page = page();
        page.visit("./index.html").await.unwrap();
        assert_eq!(page.driver_mut().url().await.unwrap(), "memory://t/index.html");
    }

    #[test]
    fn test_expand_nested_alias() {
        let mut page = page();
        page.set_element_alias("upload", Selector::css("#upload"));
        let expanded = page
            .expand(&Selector::alias("upload").nth(Position::Index(0)))
            .unwrap();
        assert_eq!(expanded.to_string(), "#upload:eq(0)");
        assert!(matches!(
            page.expand(&Selector::alias("nope")),
            Err(ProbeError::UnknownAlias { .. })
        ));
    }

    #[test]
    fn test_fixture_alias() {
        let mut page = page();
        let payload = page.fixture("example.json").unwrap().as_alias("sampleFile");
        assert_eq!(payload.name, "example.json");
        let loaded = page.load_file(&FileSource::from("@sampleFile")).unwrap();
        assert_eq!(loaded, payload);
        assert!(page.load_file(&FileSource::from("@other")).is_err());
    }
}
