//! In-memory documents.
//!
//! A small arena DOM with just enough browser behavior to exercise form
//! tests without a browser: CSS subset queries, visibility, rendered text,
//! form control state, page scripts, timers and link navigation.

mod builder;
mod css;
mod input;
mod script;
mod site;

pub use builder::{Child, El};
pub use css::SelectorList;
pub use script::{PageScript, SubmitDisposition};
pub use site::{resolve_url, Site};

use crate::driver::{ElementKind, ElementState, FileInfo};
use crate::fixture::FilePayload;
use crate::result::ProbeResult;
use crate::selector::normalize_whitespace;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Node index in a [`Document`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Arena slot; nodes never move while their document lives
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Element data stored in the arena
#[derive(Debug, Clone, Default)]
pub struct ElementData {
    /// Lowercase tag
    pub tag: String,
    attrs: BTreeMap<String, String>,
    value: String,
    checked: bool,
    selected: bool,
    files: Vec<FilePayload>,
    replace_on_type: bool,
}

impl ElementData {
    /// Attribute value
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Whether the class list contains `class`
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|list| list.split_whitespace().any(|c| c == class))
    }

    /// Control kind
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        ElementKind::classify(&self.tag, self.attr("type"))
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Root,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

type TimerTask = Box<dyn FnOnce(&mut Document) + Send>;

struct Timer {
    due: Instant,
    task: TimerTask,
}

/// A loaded document in one browsing context
pub struct Document {
    url: String,
    title: String,
    nodes: Vec<Node>,
    script: Option<Arc<dyn PageScript>>,
    timers: Vec<Timer>,
    navigation: Option<String>,
    opened: Vec<String>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.url)
            .field("title", &self.title)
            .field("nodes", &self.nodes.len())
            .field("scripted", &self.script.is_some())
            .field("timers", &self.timers.len())
            .finish()
    }
}

const NON_RENDERED: &[&str] = &["head", "title", "script", "style", "template", "meta", "link"];

impl Document {
    /// Build a document from an element tree
    pub fn new(url: impl Into<String>, title: impl Into<String>, body: El) -> Self {
        let mut doc = Self {
            url: url.into(),
            title: title.into(),
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Root,
            }],
            script: None,
            timers: Vec::new(),
            navigation: None,
            opened: Vec::new(),
        };
        doc.insert(NodeId(0), body);
        doc
    }

    /// Attach page behavior
    #[must_use]
    pub fn with_script(mut self, script: Arc<dyn PageScript>) -> Self {
        self.script = Some(script);
        self
    }

    fn insert(&mut self, parent: NodeId, el: El) -> NodeId {
        let mut data = ElementData {
            tag: el.tag,
            ..ElementData::default()
        };
        for (name, value) in el.attrs {
            data.attrs.insert(name, value);
        }
        data.checked = data.attrs.contains_key("checked");
        data.selected = data.attrs.contains_key("selected");
        if data.tag == "input" {
            data.value = data.attrs.get("value").cloned().unwrap_or_default();
        }

        let id = self.push(parent, NodeKind::Element(data));
        let mut textarea_text = String::new();
        for child in el.children {
            match child {
                Child::El(child) => {
                    self.insert(id, child);
                }
                Child::Text(text) => {
                    textarea_text.push_str(&text);
                    self.push(id, NodeKind::Text(text));
                }
            }
        }
        if let Some(data) = self.element_mut(id) {
            if data.tag == "textarea" {
                data.value = textarea_text;
            }
        }
        id
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Document URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Document title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Change the title
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Element data, `None` for text nodes and the root
    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Element stored in arena slot `index`
    #[must_use]
    pub fn element_at(&self, index: usize) -> Option<NodeId> {
        let id = NodeId(index);
        self.element(id).map(|_| id)
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Parent element (the root does not count)
    #[must_use]
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get(id.0)?.parent?;
        self.element(parent).map(|_| parent)
    }

    /// Element children in order
    #[must_use]
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes.get(id.0).map_or_else(Vec::new, |node| {
            node.children
                .iter()
                .copied()
                .filter(|c| self.element(*c).is_some())
                .collect()
        })
    }

    /// The element children of this element's parent, itself included
    #[must_use]
    pub fn element_siblings(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(id.0)
            .and_then(|node| node.parent)
            .map_or_else(Vec::new, |parent| self.element_children(parent))
    }

    /// Ancestor elements, nearest first
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.parent_element(id);
        while let Some(ancestor) = cursor {
            out.push(ancestor);
            cursor = self.parent_element(ancestor);
        }
        out
    }

    fn collect_elements(&self, from: NodeId, out: &mut Vec<NodeId>) {
        for &child in &self.nodes[from.0].children {
            if self.element(child).is_some() {
                out.push(child);
                self.collect_elements(child, out);
            }
        }
    }

    /// All elements in document order
    #[must_use]
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_elements(NodeId(0), &mut out);
        out
    }

    /// Descendant elements of `id` in document order
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if id.0 < self.nodes.len() {
            self.collect_elements(id, &mut out);
        }
        out
    }

    /// Elements matching a CSS selector, in document order
    pub fn query_all(&self, css: &str) -> ProbeResult<Vec<NodeId>> {
        let list = SelectorList::parse(css)?;
        Ok(self
            .elements()
            .into_iter()
            .filter(|n| list.matches(self, *n))
            .collect())
    }

    /// Descendants of `scope` matching a CSS selector
    pub fn query_within(&self, scope: NodeId, css: &str) -> ProbeResult<Vec<NodeId>> {
        let list = SelectorList::parse(css)?;
        Ok(self
            .descendants(scope)
            .into_iter()
            .filter(|n| list.matches(self, *n))
            .collect())
    }

    /// First element matching a CSS selector
    pub fn query(&self, css: &str) -> ProbeResult<Option<NodeId>> {
        Ok(self.query_all(css)?.into_iter().next())
    }

    /// Element by id attribute
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(id))
    }

    /// Attribute value
    #[must_use]
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    /// Set an attribute
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(data) = self.element_mut(id) {
            data.attrs
                .insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    /// Remove an attribute
    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(data) = self.element_mut(id) {
            data.attrs.remove(&name.to_ascii_lowercase());
        }
    }

    /// Whether the class list contains `class`
    #[must_use]
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|e| e.has_class(class))
    }

    /// Control kind
    #[must_use]
    pub fn kind(&self, id: NodeId) -> ElementKind {
        self.element(id).map_or(ElementKind::Other, ElementData::kind)
    }

    /// Raw text content (all descendant text nodes, concatenated)
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(data) if NON_RENDERED.contains(&data.tag.as_str()) => {}
            _ => {
                for &child in &node.children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Rendered text, whitespace normalized; button-like inputs render
    /// their value
    #[must_use]
    pub fn text(&self, id: NodeId) -> String {
        if let Some(data) = self.element(id) {
            if data.tag == "input" && data.kind() == ElementKind::Button {
                return normalize_whitespace(data.attr("value").unwrap_or_default());
            }
        }
        normalize_whitespace(&self.text_content(id))
    }

    /// Current value of a form control
    #[must_use]
    pub fn value(&self, id: NodeId) -> String {
        let Some(data) = self.element(id) else {
            return String::new();
        };
        match (data.tag.as_str(), data.kind()) {
            ("select", _) => self
                .selected_option(id)
                .map(|opt| self.option_value(opt))
                .unwrap_or_default(),
            ("option", _) => self.option_value(id),
            (_, ElementKind::Checkbox | ElementKind::Radio) => {
                data.attr("value").unwrap_or("on").to_string()
            }
            (_, ElementKind::NumberInput) => {
                if data.value.trim().parse::<f64>().is_ok() {
                    data.value.clone()
                } else {
                    String::new()
                }
            }
            _ => data.value.clone(),
        }
    }

    /// Raw edit buffer of a text control (number inputs keep invalid input here)
    #[must_use]
    pub fn raw_value(&self, id: NodeId) -> &str {
        self.element(id).map_or("", |e| e.value.as_str())
    }

    /// Set the value programmatically; no events fire
    pub fn set_value(&mut self, id: NodeId, value: &str) {
        if self.element(id).is_some_and(|e| e.tag == "select") {
            let target = self
                .options(id)
                .into_iter()
                .position(|opt| self.option_value(opt) == value);
            self.select_index(id, target);
            return;
        }
        if let Some(data) = self.element_mut(id) {
            data.value = value.to_string();
            data.replace_on_type = false;
        }
    }

    /// Checked state
    #[must_use]
    pub fn is_checked(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(|e| match e.tag.as_str() {
            "option" => e.selected,
            _ => e.checked,
        })
    }

    /// Set checked state; checking a radio unchecks its group; no events fire
    pub fn set_checked(&mut self, id: NodeId, checked: bool) {
        if checked && self.kind(id) == ElementKind::Radio {
            for other in self.radio_group(id) {
                if let Some(data) = self.element_mut(other) {
                    data.checked = false;
                }
            }
        }
        if let Some(data) = self.element_mut(id) {
            data.checked = checked;
        }
    }

    /// Radios sharing `id`'s name within the same form (itself included)
    #[must_use]
    pub fn radio_group(&self, id: NodeId) -> Vec<NodeId> {
        let Some(name) = self.attr(id, "name").map(str::to_string) else {
            return vec![id];
        };
        let form = self.form_owner(id);
        self.elements()
            .into_iter()
            .filter(|n| {
                self.kind(*n) == ElementKind::Radio
                    && self.attr(*n, "name") == Some(name.as_str())
                    && self.form_owner(*n) == form
            })
            .collect()
    }

    /// Disabled form control
    #[must_use]
    pub fn is_disabled(&self, id: NodeId) -> bool {
        let Some(data) = self.element(id) else {
            return false;
        };
        let control = matches!(
            data.tag.as_str(),
            "input" | "select" | "textarea" | "button" | "option" | "fieldset"
        );
        control
            && (data.attrs.contains_key("disabled")
                || self.ancestors(id).into_iter().any(|a| {
                    self.element(a)
                        .is_some_and(|e| e.tag == "fieldset" && e.attrs.contains_key("disabled"))
                }))
    }

    fn hides_itself(data: &ElementData) -> bool {
        if data.attrs.contains_key("hidden") || NON_RENDERED.contains(&data.tag.as_str()) {
            return true;
        }
        if data.tag == "input" && data.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden")) {
            return true;
        }
        data.attr("style").is_some_and(style_hides)
    }

    /// Rendered: neither the element nor an ancestor is hidden
    #[must_use]
    pub fn is_visible(&self, id: NodeId) -> bool {
        let Some(data) = self.element(id) else {
            return false;
        };
        !Self::hides_itself(data)
            && self
                .ancestors(id)
                .into_iter()
                .all(|a| self.element(a).is_some_and(|e| !Self::hides_itself(e)))
    }

    /// Make an element visible (jQuery `.show()`)
    pub fn show(&mut self, id: NodeId) {
        if let Some(data) = self.element_mut(id) {
            data.attrs.remove("hidden");
            let style = data.attrs.remove("style").unwrap_or_default();
            let kept = without_visibility(&style);
            data.attrs.insert("style".into(), join_style(&kept, "display: block"));
        }
    }

    /// Hide an element (jQuery `.hide()`)
    pub fn hide(&mut self, id: NodeId) {
        if let Some(data) = self.element_mut(id) {
            let style = data.attrs.remove("style").unwrap_or_default();
            let kept = without_visibility(&style);
            data.attrs.insert("style".into(), join_style(&kept, "display: none"));
        }
    }

    /// `<option>` elements of a select
    #[must_use]
    pub fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendants(select)
            .into_iter()
            .filter(|n| self.element(*n).is_some_and(|e| e.tag == "option"))
            .collect()
    }

    /// Option value: `value` attribute, falling back to its text
    #[must_use]
    pub fn option_value(&self, option: NodeId) -> String {
        self.attr(option, "value")
            .map_or_else(|| self.text(option), str::to_string)
    }

    /// Selected option of a single select (first option when none is marked)
    #[must_use]
    pub fn selected_option(&self, select: NodeId) -> Option<NodeId> {
        let options = self.options(select);
        options
            .iter()
            .copied()
            .find(|o| self.element(*o).is_some_and(|e| e.selected))
            .or_else(|| options.first().copied())
    }

    pub(crate) fn select_index(&mut self, select: NodeId, index: Option<usize>) {
        for (i, option) in self.options(select).into_iter().enumerate() {
            if let Some(data) = self.element_mut(option) {
                data.selected = Some(i) == index;
            }
        }
    }

    /// Files attached to a file input
    #[must_use]
    pub fn files(&self, id: NodeId) -> &[FilePayload] {
        self.element(id).map_or(&[], |e| e.files.as_slice())
    }

    /// The form an element belongs to (`form` attribute or nearest ancestor)
    #[must_use]
    pub fn form_owner(&self, id: NodeId) -> Option<NodeId> {
        if let Some(form_id) = self.attr(id, "form") {
            return self.by_id(form_id);
        }
        self.ancestors(id)
            .into_iter()
            .find(|a| self.element(*a).is_some_and(|e| e.tag == "form"))
    }

    /// Run `task` once `delay` has elapsed (checked whenever the driver
    /// touches the document)
    pub fn set_timeout(&mut self, delay: Duration, task: impl FnOnce(&mut Self) + Send + 'static) {
        self.timers.push(Timer {
            due: Instant::now() + delay,
            task: Box::new(task),
        });
    }

    /// Number of timers not yet fired
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Fire every timer that is due, earliest first
    pub fn run_due_timers(&mut self) {
        let now = Instant::now();
        loop {
            let next = self
                .timers
                .iter()
                .enumerate()
                .filter(|(_, t)| t.due <= now)
                .min_by_key(|(_, t)| t.due)
                .map(|(i, _)| i);
            let Some(index) = next else {
                break;
            };
            let timer = self.timers.remove(index);
            (timer.task)(self);
        }
    }

    /// Ask the browsing context to load another URL (relative to this one)
    pub fn navigate(&mut self, href: &str) {
        self.navigation = Some(resolve_url(&self.url, href));
    }

    /// Ask the browser to open a URL in a new browsing context
    pub fn open_window(&mut self, href: &str) {
        self.opened.push(resolve_url(&self.url, href));
    }

    pub(crate) fn take_navigation(&mut self) -> Option<String> {
        self.navigation.take()
    }

    pub(crate) fn take_opened(&mut self) -> Vec<String> {
        std::mem::take(&mut self.opened)
    }

    pub(crate) fn script(&self) -> Option<Arc<dyn PageScript>> {
        self.script.clone()
    }

    /// Snapshot for the driver boundary
    #[must_use]
    pub fn snapshot(&self, id: NodeId, index: usize) -> ElementState {
        let Some(data) = self.element(id) else {
            return ElementState {
                index,
                ..ElementState::default()
            };
        };
        let kind = data.kind();
        let value = match data.tag.as_str() {
            "input" | "textarea" | "select" | "option" | "button" => Some(self.value(id)),
            _ => None,
        };
        let checked = matches!(kind, ElementKind::Checkbox | ElementKind::Radio)
            .then_some(data.checked)
            .or_else(|| (data.tag == "option").then_some(self.is_checked(id)));
        ElementState {
            index,
            tag: data.tag.clone(),
            attributes: data.attrs.clone(),
            value,
            text: self.text(id),
            visible: self.is_visible(id),
            checked,
            disabled: self.is_disabled(id),
            files: data
                .files
                .iter()
                .map(|f| FileInfo {
                    name: f.name.clone(),
                    mime_type: f.mime_type.clone(),
                    size: f.buffer.len() as u64,
                })
                .collect(),
            key: None,
        }
    }

    /// Short human form, e.g. `<input#phone type=number>`
    #[must_use]
    pub fn describe(&self, id: NodeId) -> String {
        self.snapshot(id, 0).describe()
    }
}

fn style_hides(style: &str) -> bool {
    declarations(style).any(|(prop, value)| {
        (prop == "display" && value == "none") || (prop == "visibility" && value == "hidden")
    })
}

fn declarations(style: &str) -> impl Iterator<Item = (String, String)> + '_ {
    style.split(';').filter_map(|decl| {
        let (prop, value) = decl.split_once(':')?;
        Some((
            prop.trim().to_ascii_lowercase(),
            value.trim().to_ascii_lowercase(),
        ))
    })
}

fn without_visibility(style: &str) -> String {
    style
        .split(';')
        .filter(|decl| {
            decl.split_once(':').is_some_and(|(prop, _)| {
                let prop = prop.trim().to_ascii_lowercase();
                prop != "display" && prop != "visibility"
            })
        })
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_style(kept: &str, decl: &str) -> String {
    if kept.is_empty() {
        decl.to_string()
    } else {
        format!("{kept}; {decl}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn form_doc() -> Document {
        Document::new(
            "memory://site/src/index.html",
            "Form",
            El::new("body").children([
                El::new("form").id("f").children([
                    El::input("text").id("name").attr("value", "preset"),
                    El::input("number").id("phone"),
                    El::new("select").id("product").children([
                        El::new("option").attr("disabled", "").text("Select"),
                        El::option("blog", "Blog"),
                        El::option("youtube", "YouTube"),
                    ]),
                    El::input("radio").attr("name", "kind").attr("value", "a").attr("checked", ""),
                    El::input("radio").attr("name", "kind").attr("value", "b"),
                    El::new("textarea").id("notes").text("hello"),
                ]),
                El::new("div").id("outer").hidden().child(El::new("span").id("inner").text("x")),
                El::new("p").id("mixed").text("Talking ").child(El::new("b").text("About")).text(" Testing"),
            ]),
        )
    }

    mod structure_tests {
        use super::*;

        #[test]
        fn test_document_order_and_lookup() {
            let doc = form_doc();
            let ids: Vec<_> = doc
                .elements()
                .into_iter()
                .filter_map(|n| doc.attr(n, "id").map(str::to_string))
                .collect();
            assert_eq!(ids, ["f", "name", "phone", "product", "notes", "outer", "inner", "mixed"]);
            assert!(doc.by_id("phone").is_some());
            assert!(doc.by_id("missing").is_none());
        }

        #[test]
        fn test_form_owner_and_ancestors() {
            let doc = form_doc();
            let name = doc.by_id("name").unwrap();
            assert_eq!(doc.form_owner(name), doc.by_id("f"));
            assert_eq!(doc.ancestors(name).len(), 2);
        }

        #[test]
        fn test_text_concatenates_inline_children() {
            let doc = form_doc();
            assert_eq!(doc.text(doc.by_id("mixed").unwrap()), "Talking About Testing");
        }
    }

    mod state_tests {
        use super::*;

        #[test]
        fn test_initial_values_from_markup() {
            let doc = form_doc();
            assert_eq!(doc.value(doc.by_id("name").unwrap()), "preset");
            assert_eq!(doc.value(doc.by_id("notes").unwrap()), "hello");
            assert_eq!(doc.value(doc.by_id("product").unwrap()), "Select");
        }

        #[test]
        fn test_number_value_hides_invalid_input() {
            let mut doc = form_doc();
            let phone = doc.by_id("phone").unwrap();
            doc.set_value(phone, "12e");
            assert_eq!(doc.value(phone), "");
            assert_eq!(doc.raw_value(phone), "12e");
            doc.set_value(phone, "1234");
            assert_eq!(doc.value(phone), "1234");
        }

        #[test]
        fn test_radio_group_is_exclusive() {
            let mut doc = form_doc();
            let radios = doc.query_all("input[type=radio]").unwrap();
            assert!(doc.is_checked(radios[0]));
            doc.set_checked(radios[1], true);
            assert!(!doc.is_checked(radios[0]));
            assert!(doc.is_checked(radios[1]));
        }

        #[test]
        fn test_select_value_tracks_selection() {
            let mut doc = form_doc();
            let product = doc.by_id("product").unwrap();
            doc.set_value(product, "youtube");
            assert_eq!(doc.value(product), "youtube");
            doc.select_index(product, Some(1));
            assert_eq!(doc.value(product), "blog");
        }

        #[test]
        fn test_disabled_option() {
            let doc = form_doc();
            let options = doc.options(doc.by_id("product").unwrap());
            assert!(doc.is_disabled(options[0]));
            assert!(!doc.is_disabled(options[1]));
        }
    }

    mod visibility_tests {
        use super::*;

        #[test]
        fn test_hidden_ancestor_hides_descendants() {
            let doc = form_doc();
            assert!(!doc.is_visible(doc.by_id("outer").unwrap()));
            assert!(!doc.is_visible(doc.by_id("inner").unwrap()));
            assert!(doc.is_visible(doc.by_id("name").unwrap()));
        }

        #[test]
        fn test_show_and_hide_keep_other_styles() {
            let mut doc = form_doc();
            let outer = doc.by_id("outer").unwrap();
            doc.set_attr(outer, "style", "color: red; display: none");
            doc.show(outer);
            assert!(doc.is_visible(doc.by_id("inner").unwrap()));
            assert_eq!(doc.attr(outer, "style"), Some("color: red; display: block"));
            doc.hide(outer);
            assert!(!doc.is_visible(outer));
        }

        #[test]
        fn test_hidden_attribute() {
            let mut doc = form_doc();
            let name = doc.by_id("name").unwrap();
            doc.set_attr(name, "hidden", "");
            assert!(!doc.is_visible(name));
        }
    }

    mod timer_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_timers_fire_when_due() {
            let mut doc = form_doc();
            let outer = doc.by_id("outer").unwrap();
            doc.set_timeout(Duration::from_secs(3), move |d| d.show(outer));
            doc.run_due_timers();
            assert!(!doc.is_visible(outer));
            assert_eq!(doc.pending_timers(), 1);

            tokio::time::advance(Duration::from_secs(3)).await;
            doc.run_due_timers();
            assert!(doc.is_visible(outer));
            assert_eq!(doc.pending_timers(), 0);
        }
    }

    mod snapshot_tests {
        use super::*;

        #[test]
        fn test_snapshot_fields() {
            let doc = form_doc();
            let radio = doc.query_all("input[type=radio]").unwrap()[0];
            let state = doc.snapshot(radio, 3);
            assert_eq!(state.index, 3);
            assert_eq!(state.checked, Some(true));
            assert_eq!(state.value.as_deref(), Some("a"));
            assert!(state.visible);

            let p = doc.by_id("mixed").unwrap();
            let state = doc.snapshot(p, 0);
            assert!(state.value.is_none());
            assert!(state.checked.is_none());
        }

        #[test]
        fn test_element_at_slot() {
            let doc = form_doc();
            let p = doc.by_id("mixed").unwrap();
            assert_eq!(doc.element_at(p.index()), Some(p));
            // slot 0 is the root, not an element
            assert_eq!(doc.element_at(0), None);
            assert_eq!(doc.element_at(usize::MAX), None);
        }
    }
}
