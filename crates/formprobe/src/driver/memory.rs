//! In-memory driver over [`Site`] documents.

use super::{Driver, DriverFactory, ElementRef, ElementState};
use crate::action::{Invocation, Key, OptionMatch, SelectFileAction};
use crate::dom::{Document, NodeId, Site};
use crate::fixture::FilePayload;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::Selector;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, trace};

const ABOUT_BLANK: &str = "about:blank";
// guards against pages that navigate on every load
const MAX_REDIRECTS: usize = 16;

/// One browser session with any number of browsing contexts (tabs)
///
/// The first context is the active one; links with `target="_blank"` open
/// additional contexts that the session keeps but never switches to.
#[derive(Debug)]
pub struct MemoryDriver {
    site: Arc<Site>,
    contexts: Vec<Option<Document>>,
    // load counter value per context, part of every element key
    generations: Vec<u64>,
    loads: u64,
    active: usize,
    closed: bool,
    history: Vec<String>,
}

impl MemoryDriver {
    /// New session with a single blank context
    #[must_use]
    pub fn new(site: Arc<Site>) -> Self {
        Self {
            site,
            contexts: vec![None],
            generations: vec![0],
            loads: 0,
            active: 0,
            closed: false,
            history: Vec::new(),
        }
    }

    /// Number of open browsing contexts
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// URLs of every context, active first
    #[must_use]
    pub fn context_urls(&self) -> Vec<String> {
        self.contexts
            .iter()
            .map(|c| c.as_ref().map_or_else(|| ABOUT_BLANK.to_string(), |d| d.url().to_string()))
            .collect()
    }

    /// Calls made so far, one entry per driver method invocation
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Whether a method with this name was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.history
            .iter()
            .any(|h| h.split(' ').next() == Some(method))
    }

    /// Active document, if one is loaded
    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        self.contexts.get(self.active).and_then(Option::as_ref)
    }

    fn record(&mut self, entry: String) -> ProbeResult<()> {
        if self.closed {
            return Err(ProbeError::invalid_state("driver session is closed"));
        }
        trace!(call = %entry, "memory driver");
        self.history.push(entry);
        Ok(())
    }

    fn load_into(&mut self, slot: usize, url: &str) -> ProbeResult<()> {
        let doc = if url == ABOUT_BLANK {
            None
        } else {
            Some(self.site.load(url)?)
        };
        debug!(%url, context = slot, "load");
        self.loads += 1;
        if let Some(context) = self.contexts.get_mut(slot) {
            *context = doc;
        }
        if let Some(generation) = self.generations.get_mut(slot) {
            *generation = self.loads;
        }
        Ok(())
    }

    /// Fire due timers and apply navigation requested by the pages
    fn settle(&mut self) -> ProbeResult<()> {
        let mut opened = Vec::new();
        for context in self.contexts.iter_mut().flatten() {
            context.run_due_timers();
            opened.extend(context.take_opened());
        }
        for url in opened {
            debug!(%url, "open new browsing context");
            self.contexts.push(None);
            self.generations.push(0);
            let slot = self.contexts.len() - 1;
            self.load_into(slot, &url)?;
        }

        for _ in 0..MAX_REDIRECTS {
            let next = self
                .contexts
                .get_mut(self.active)
                .and_then(Option::as_mut)
                .and_then(Document::take_navigation);
            let Some(url) = next else {
                return Ok(());
            };
            self.load_into(self.active, &url)?;
        }
        Err(ProbeError::driver(format!(
            "more than {MAX_REDIRECTS} consecutive navigations"
        )))
    }

    fn active_doc(&mut self) -> ProbeResult<&mut Document> {
        self.contexts
            .get_mut(self.active)
            .and_then(Option::as_mut)
            .ok_or_else(|| ProbeError::driver("no document loaded; call visit first"))
    }

    fn generation(&self) -> u64 {
        self.generations.get(self.active).copied().unwrap_or_default()
    }

    /// The node a reference points at: its key when present, otherwise the
    /// selector's match at `index`
    fn locate(&mut self, target: &ElementRef) -> ProbeResult<(&mut Document, NodeId)> {
        let generation = self.generation();
        let doc = self.active_doc()?;
        let node = match target.key.as_deref() {
            Some(key) => parse_key(key)
                .filter(|(g, _)| *g == generation)
                .and_then(|(_, slot)| doc.element_at(slot)),
            None => resolve(doc, &target.selector)?.get(target.index).copied(),
        };
        let node = node.ok_or_else(|| {
            ProbeError::driver(format!("element {target} is no longer attached"))
        })?;
        Ok((doc, node))
    }

    fn act<T>(
        &mut self,
        call: String,
        target: &ElementRef,
        f: impl FnOnce(&mut Document, NodeId) -> ProbeResult<T>,
    ) -> ProbeResult<T> {
        self.record(call)?;
        self.settle()?;
        let (doc, node) = self.locate(target)?;
        let out = f(doc, node)?;
        self.settle()?;
        Ok(out)
    }
}

fn node_key(generation: u64, node: NodeId) -> String {
    format!("{generation}:{}", node.index())
}

fn parse_key(key: &str) -> Option<(u64, usize)> {
    let (generation, slot) = key.split_once(':')?;
    Some((generation.parse().ok()?, slot.parse().ok()?))
}

/// Resolve a selector to nodes in document order
pub(crate) fn resolve(doc: &Document, selector: &Selector) -> ProbeResult<Vec<NodeId>> {
    match selector {
        Selector::Css(css) => doc.query_all(css),
        Selector::Contains { css, text } => {
            let candidates = match css {
                Some(css) => doc.query_all(css)?,
                None => doc.elements(),
            };
            let matching: Vec<NodeId> = candidates
                .into_iter()
                .filter(|n| text.matches(&doc.text(*n)))
                .collect();
            if css.is_some() {
                return Ok(matching);
            }
            // deepest only: drop elements that contain another match
            Ok(matching
                .iter()
                .copied()
                .filter(|n| !matching.iter().any(|m| m != n && doc.ancestors(*m).contains(n)))
                .collect())
        }
        Selector::Within { scope, css } => {
            let mut out: Vec<NodeId> = Vec::new();
            for scope_node in resolve(doc, scope)? {
                for node in doc.query_within(scope_node, css)? {
                    if !out.contains(&node) {
                        out.push(node);
                    }
                }
            }
            out.sort();
            Ok(out)
        }
        Selector::Nth { inner, position } => Ok(position.pick(resolve(doc, inner)?)),
        Selector::Alias(name) => Err(ProbeError::UnknownAlias { name: name.clone() }),
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn navigate(&mut self, url: &str) -> ProbeResult<()> {
        self.record(format!("navigate {url}"))?;
        self.load_into(self.active, url)?;
        self.settle()
    }

    async fn reload(&mut self) -> ProbeResult<()> {
        self.record("reload".to_string())?;
        let url = self
            .document()
            .map_or_else(|| ABOUT_BLANK.to_string(), |d| d.url().to_string());
        self.load_into(self.active, &url)?;
        self.settle()
    }

    async fn url(&mut self) -> ProbeResult<String> {
        self.record("url".to_string())?;
        self.settle()?;
        Ok(self
            .document()
            .map_or_else(|| ABOUT_BLANK.to_string(), |d| d.url().to_string()))
    }

    async fn title(&mut self) -> ProbeResult<String> {
        self.record("title".to_string())?;
        self.settle()?;
        Ok(self
            .document()
            .map_or_else(String::new, |d| d.title().to_string()))
    }

    async fn query(&mut self, selector: &Selector) -> ProbeResult<Vec<ElementState>> {
        self.record(format!("query {selector}"))?;
        self.settle()?;
        let generation = self.generation();
        let Some(doc) = self.document() else {
            return Ok(Vec::new());
        };
        Ok(resolve(doc, selector)?
            .into_iter()
            .enumerate()
            .map(|(i, node)| ElementState {
                key: Some(node_key(generation, node)),
                ..doc.snapshot(node, i)
            })
            .collect())
    }

    async fn type_text(&mut self, target: &ElementRef, keys: &[Key]) -> ProbeResult<()> {
        self.act(format!("type_text {target} ({} keys)", keys.len()), target, |doc, node| {
            doc.type_keys(node, keys)
        })
    }

    async fn clear(&mut self, target: &ElementRef) -> ProbeResult<()> {
        self.act(format!("clear {target}"), target, Document::clear)
    }

    async fn set_checked(&mut self, target: &ElementRef, checked: bool) -> ProbeResult<()> {
        self.act(format!("set_checked {target} {checked}"), target, |doc, node| {
            doc.user_set_checked(node, checked)
        })
    }

    async fn select(&mut self, target: &ElementRef, option: &OptionMatch) -> ProbeResult<String> {
        self.act(format!("select {target} {option}"), target, |doc, node| {
            doc.select_option(node, option)
        })
    }

    async fn attach_files(
        &mut self,
        target: &ElementRef,
        files: &[FilePayload],
        action: SelectFileAction,
    ) -> ProbeResult<()> {
        self.act(
            format!("attach_files {target} {action:?} ({} files)", files.len()),
            target,
            |doc, node| doc.attach_files(node, files),
        )
    }

    async fn invoke(&mut self, target: &ElementRef, invocation: &Invocation) -> ProbeResult<()> {
        self.act(format!("invoke {target} {}", invocation.name()), target, |doc, node| {
            doc.invoke(node, invocation);
            Ok(())
        })
    }

    async fn click(&mut self, target: &ElementRef) -> ProbeResult<()> {
        self.act(format!("click {target}"), target, Document::click)
    }

    async fn close(&mut self) -> ProbeResult<()> {
        self.record("close".to_string())?;
        self.closed = true;
        self.contexts.clear();
        self.generations.clear();
        Ok(())
    }
}

/// Launches [`MemoryDriver`] sessions over a shared [`Site`]
#[derive(Debug, Clone)]
pub struct MemoryFactory {
    site: Arc<Site>,
}

impl MemoryFactory {
    /// Factory for a site
    #[must_use]
    pub fn new(site: Site) -> Self {
        Self {
            site: Arc::new(site),
        }
    }

    /// The site sessions load from
    #[must_use]
    pub fn site(&self) -> &Site {
        &self.site
    }
}

#[async_trait]
impl DriverFactory for MemoryFactory {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn launch(&self) -> ProbeResult<Box<dyn Driver>> {
        Ok(Box::new(MemoryDriver::new(Arc::clone(&self.site))))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dom::El;
    use crate::selector::Position;

    fn site() -> Arc<Site> {
        Arc::new(
            Site::new("memory://t")
                .page("index.html", |url| {
                    Document::new(
                        url,
                        "Home",
                        El::new("body").children([
                            El::new("div").id("outer").child(
                                El::new("p").class("msg").text("Hello ").child(El::new("b").text("World")),
                            ),
                            El::new("ul").id("list").children([
                                El::new("li").text("one"),
                                El::new("li").text("two"),
                                El::new("li").text("three"),
                            ]),
                            El::link("next.html", "Next").id("next"),
                            El::link("next.html", "Popup").id("popup").attr("target", "_blank"),
                            El::input("checkbox").id("cb"),
                        ]),
                    )
                })
                .page("next.html", |url| {
                    Document::new(url, "Next", El::new("body").child(El::new("h1").text("Next page")))
                })
                .page("many.html", |url| {
                    Document::new(
                        url,
                        "Many",
                        El::new("body").children([
                            El::link("next.html", "a").id("a").attr("target", "_blank"),
                            El::link("next.html", "b").id("b").attr("target", "_blank"),
                            El::link("next.html", "c").id("c").attr("target", "_blank"),
                            El::input("checkbox").id("x").attr("checked", ""),
                            El::input("checkbox").id("y").attr("checked", ""),
                        ]),
                    )
                }),
        )
    }

    fn css(s: &str) -> Selector {
        Selector::css(s)
    }

    mod query_tests {
        use super::*;

        #[tokio::test]
        async fn test_query_before_visit_is_empty() {
            let mut driver = MemoryDriver::new(site());
            assert!(driver.query(&css("li")).await.unwrap().is_empty());
            assert_eq!(driver.url().await.unwrap(), "about:blank");
        }

        #[tokio::test]
        async fn test_contains_prefers_deepest() {
            let mut driver = MemoryDriver::new(site());
            driver.navigate("memory://t/index.html").await.unwrap();
            let found = driver.query(&Selector::text("World")).await.unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].tag, "b");

            let with_css = driver
                .query(&Selector::contains("div", "Hello World"))
                .await
                .unwrap();
            assert_eq!(with_css.len(), 1);
            assert_eq!(with_css[0].tag, "div");
        }

        #[tokio::test]
        async fn test_within_and_nth() {
            let mut driver = MemoryDriver::new(site());
            driver.navigate("memory://t/index.html").await.unwrap();
            let items = driver.query(&css("#list").within("li")).await.unwrap();
            assert_eq!(items.len(), 3);
            assert_eq!(items[2].index, 2);

            let last = driver
                .query(&css("li").nth(Position::Last))
                .await
                .unwrap();
            assert_eq!(last.len(), 1);
            assert_eq!(last[0].text, "three");
            assert_eq!(last[0].index, 0);
        }

        #[tokio::test]
        async fn test_alias_must_be_expanded_first() {
            let mut driver = MemoryDriver::new(site());
            driver.navigate("memory://t/index.html").await.unwrap();
            assert!(matches!(
                driver.query(&Selector::alias("x")).await,
                Err(ProbeError::UnknownAlias { .. })
            ));
        }
    }

    mod navigation_tests {
        use super::*;

        #[tokio::test]
        async fn test_link_navigates_active_context() {
            let mut driver = MemoryDriver::new(site());
            driver.navigate("memory://t/index.html").await.unwrap();
            driver
                .click(&ElementRef::new(css("#next"), 0))
                .await
                .unwrap();
            assert_eq!(driver.url().await.unwrap(), "memory://t/next.html");
            assert_eq!(driver.title().await.unwrap(), "Next");
            assert_eq!(driver.context_count(), 1);
        }

        #[tokio::test]
        async fn test_blank_target_opens_new_context() {
            let mut driver = MemoryDriver::new(site());
            driver.navigate("memory://t/index.html").await.unwrap();
            driver
                .click(&ElementRef::new(css("#popup"), 0))
                .await
                .unwrap();
            assert_eq!(driver.url().await.unwrap(), "memory://t/index.html");
            assert_eq!(
                driver.context_urls(),
                vec!["memory://t/index.html", "memory://t/next.html"]
            );
        }

        #[tokio::test]
        async fn test_reload_resets_state() {
            let mut driver = MemoryDriver::new(site());
            driver.navigate("memory://t/index.html").await.unwrap();
            let cb = ElementRef::new(css("#cb"), 0);
            driver.set_checked(&cb, true).await.unwrap();
            assert_eq!(driver.query(&css("#cb")).await.unwrap()[0].checked, Some(true));
            driver.reload().await.unwrap();
            assert_eq!(driver.query(&css("#cb")).await.unwrap()[0].checked, Some(false));
        }

        #[tokio::test]
        async fn test_unknown_page() {
            let mut driver = MemoryDriver::new(site());
            assert!(driver.navigate("memory://t/nope.html").await.is_err());
        }
    }

    mod identity_tests {
        use super::*;

        async fn many() -> MemoryDriver {
            let mut driver = MemoryDriver::new(site());
            driver.navigate("memory://t/many.html").await.unwrap();
            driver
        }

        fn refs(selector: &Selector, states: &[ElementState]) -> Vec<ElementRef> {
            states
                .iter()
                .map(|s| ElementRef::from_state(selector.clone(), s))
                .collect()
        }

        #[tokio::test]
        async fn test_query_assigns_keys() {
            let mut driver = many().await;
            let links = driver.query(&css("a")).await.unwrap();
            assert!(links.iter().all(|l| l.key.is_some()));
            let again = driver.query(&css("#b")).await.unwrap();
            assert_eq!(again[0].key, links[1].key);
        }

        #[tokio::test]
        async fn test_remove_attr_on_every_match() {
            let mut driver = many().await;
            let sel = css("a[target=\"_blank\"]");
            let links = driver.query(&sel).await.unwrap();
            assert_eq!(links.len(), 3);
            let remove = Invocation::RemoveAttr("target".into());
            for target in refs(&sel, &links) {
                driver.invoke(&target, &remove).await.unwrap();
            }
            assert!(driver.query(&sel).await.unwrap().is_empty());
            assert_eq!(driver.query(&css("a")).await.unwrap().len(), 3);
        }

        #[tokio::test]
        async fn test_uncheck_every_checked_box() {
            let mut driver = many().await;
            let sel = css("input:checked");
            let boxes = driver.query(&sel).await.unwrap();
            assert_eq!(boxes.len(), 2);
            for target in refs(&sel, &boxes) {
                driver.set_checked(&target, false).await.unwrap();
            }
            let all = driver.query(&css("input")).await.unwrap();
            assert!(all.iter().all(|b| b.checked == Some(false)));
        }

        #[tokio::test]
        async fn test_key_from_previous_load_is_stale() {
            let mut driver = many().await;
            let before = driver.query(&css("#x")).await.unwrap();
            let target = ElementRef::from_state(css("#x"), &before[0]);
            driver.reload().await.unwrap();
            let err = driver.set_checked(&target, false).await.unwrap_err();
            assert!(err.to_string().contains("no longer attached"));
            assert_eq!(driver.query(&css("#x")).await.unwrap()[0].checked, Some(true));
        }
    }

    mod session_tests {
        use super::*;

        #[tokio::test]
        async fn test_closed_session_rejects_calls() {
            let mut driver = MemoryDriver::new(site());
            driver.navigate("memory://t/index.html").await.unwrap();
            driver.close().await.unwrap();
            assert!(matches!(
                driver.query(&css("li")).await,
                Err(ProbeError::InvalidState { .. })
            ));
        }

        #[tokio::test]
        async fn test_history_records_calls() {
            let mut driver = MemoryDriver::new(site());
            driver.navigate("memory://t/index.html").await.unwrap();
            driver.query(&css("li")).await.unwrap();
            assert!(driver.was_called("navigate"));
            assert!(driver.was_called("query"));
            assert!(!driver.was_called("click"));
        }

        #[tokio::test]
        async fn test_stale_index() {
            let mut driver = MemoryDriver::new(site());
            driver.navigate("memory://t/index.html").await.unwrap();
            let err = driver
                .click(&ElementRef::new(css("li"), 9))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("no longer attached"));
        }

        #[tokio::test]
        async fn test_factory_sessions_are_isolated() {
            let factory = MemoryFactory::new(Site::clone(&site()));
            let mut a = factory.launch().await.unwrap();
            let mut b = factory.launch().await.unwrap();
            a.navigate("memory://t/index.html").await.unwrap();
            b.navigate("memory://t/index.html").await.unwrap();
            a.set_checked(&ElementRef::new(css("#cb"), 0), true).await.unwrap();
            assert_eq!(b.query(&css("#cb")).await.unwrap()[0].checked, Some(false));
        }
    }
}
