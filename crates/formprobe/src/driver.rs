//! Driver abstraction.
//!
//! A [`Driver`] is one isolated browser session. The locator, action executor
//! and assertion engine only ever talk to a page through this trait, so the
//! same suite runs against the in-memory backend ([`MemoryDriver`]) or a real
//! Chromium ([`crate::browser::ChromiumDriver`], feature `browser`).
//!
//! Element addressing is by `(selector, index)`: the driver re-resolves the
//! selector and acts on the element at `index` of the match set. Nothing
//! element-shaped outlives a single call.

mod memory;

pub use memory::{MemoryDriver, MemoryFactory};

use crate::action::{Invocation, Key, OptionMatch, SelectFileAction};
use crate::fixture::FilePayload;
use crate::result::ProbeResult;
use crate::selector::Selector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name, MIME type and size of a file attached to an input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// File name (no directory)
    pub name: String,
    /// MIME type
    pub mime_type: String,
    /// Size in bytes
    pub size: u64,
}

/// What kind of control an element is, as far as actions care
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Single line text-like input (text, email, password, search, tel, url)
    TextInput,
    /// `<input type="number">`
    NumberInput,
    /// `<textarea>`
    TextArea,
    /// `<input type="checkbox">`
    Checkbox,
    /// `<input type="radio">`
    Radio,
    /// `<select>`
    Select,
    /// `<input type="file">`
    FileInput,
    /// `<button>` or button-like input
    Button,
    /// `<a>`
    Anchor,
    /// Anything else
    Other,
}

impl ElementKind {
    /// Classify from tag name and `type` attribute
    #[must_use]
    pub fn classify(tag: &str, input_type: Option<&str>) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "input" => match input_type.unwrap_or("text").to_ascii_lowercase().as_str() {
                "checkbox" => Self::Checkbox,
                "radio" => Self::Radio,
                "file" => Self::FileInput,
                "number" => Self::NumberInput,
                "submit" | "button" | "reset" | "image" => Self::Button,
                "hidden" | "range" | "color" => Self::Other,
                _ => Self::TextInput,
            },
            "textarea" => Self::TextArea,
            "select" => Self::Select,
            "button" => Self::Button,
            "a" => Self::Anchor,
            _ => Self::Other,
        }
    }

    /// Accepts typed text
    #[must_use]
    pub const fn is_typeable(self) -> bool {
        matches!(self, Self::TextInput | Self::NumberInput | Self::TextArea)
    }
}

/// Snapshot of one element at resolution time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Position within the match set of the selector that produced it
    pub index: usize,
    /// Lowercase tag name
    pub tag: String,
    /// Attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Form value for controls, `None` for other elements
    #[serde(default)]
    pub value: Option<String>,
    /// Rendered text content, whitespace normalized
    #[serde(default)]
    pub text: String,
    /// Rendered (not hidden by itself or an ancestor)
    #[serde(default)]
    pub visible: bool,
    /// Checked state for checkboxes and radios
    #[serde(default)]
    pub checked: Option<bool>,
    /// Disabled form control
    #[serde(default)]
    pub disabled: bool,
    /// Files attached to a file input
    #[serde(default)]
    pub files: Vec<FileInfo>,
    /// Driver-assigned identity, stable for as long as the node stays in
    /// its document
    #[serde(default)]
    pub key: Option<String>,
}

impl ElementState {
    /// Attribute value
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
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

    /// Short human form, e.g. `<input#phone type=number>`
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = format!("<{}", self.tag);
        if let Some(id) = self.attr("id") {
            out.push('#');
            out.push_str(id);
        }
        if let Some(class) = self.attr("class") {
            for c in class.split_whitespace() {
                out.push('.');
                out.push_str(c);
            }
        }
        if let Some(ty) = self.attr("type") {
            out.push_str(" type=");
            out.push_str(ty);
        }
        out.push('>');
        out
    }
}

/// Address of one element
///
/// Drivers act on `key` when it is set, so the reference keeps pointing at
/// the same node after an action changes what the selector matches. The
/// selector and index are the fallback and name the element in messages.
#[derive(Debug, Clone)]
pub struct ElementRef {
    /// Selector, already free of aliases
    pub selector: Selector,
    /// Index within the selector's match set
    pub index: usize,
    /// Identity captured at resolution, see [`ElementState::key`]
    pub key: Option<String>,
}

impl ElementRef {
    /// Create a reference by position only
    #[must_use]
    pub const fn new(selector: Selector, index: usize) -> Self {
        Self {
            selector,
            index,
            key: None,
        }
    }

    /// Reference the exact element a query returned
    #[must_use]
    pub fn from_state(selector: Selector, state: &ElementState) -> Self {
        Self {
            selector,
            index: state.index,
            key: state.key.clone(),
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.selector, self.index)
    }
}

/// One isolated browser session
///
/// Implementations must never retry: retrying belongs to the locator and the
/// assertion engine.
#[async_trait]
pub trait Driver: Send {
    /// Backend name for logs and reports
    fn backend(&self) -> &'static str;

    /// Load `url` into the active browsing context
    async fn navigate(&mut self, url: &str) -> ProbeResult<()>;

    /// Reload the active browsing context
    async fn reload(&mut self) -> ProbeResult<()>;

    /// URL of the active browsing context
    async fn url(&mut self) -> ProbeResult<String>;

    /// Title of the active document
    async fn title(&mut self) -> ProbeResult<String>;

    /// Resolve a selector in the active document
    async fn query(&mut self, selector: &Selector) -> ProbeResult<Vec<ElementState>>;

    /// Deliver keystrokes to an element
    async fn type_text(&mut self, target: &ElementRef, keys: &[Key]) -> ProbeResult<()>;

    /// Empty a text control
    async fn clear(&mut self, target: &ElementRef) -> ProbeResult<()>;

    /// Bring a checkbox or radio into the given state
    async fn set_checked(&mut self, target: &ElementRef, checked: bool) -> ProbeResult<()>;

    /// Select one option; returns the selected option's value
    async fn select(&mut self, target: &ElementRef, option: &OptionMatch) -> ProbeResult<String>;

    /// Replace the file list of a file input
    async fn attach_files(
        &mut self,
        target: &ElementRef,
        files: &[FilePayload],
        action: SelectFileAction,
    ) -> ProbeResult<()>;

    /// Call a method directly on the element, bypassing user simulation
    async fn invoke(&mut self, target: &ElementRef, invocation: &Invocation) -> ProbeResult<()>;

    /// Click with natural side effects
    async fn click(&mut self, target: &ElementRef) -> ProbeResult<()>;

    /// Tear the session down
    async fn close(&mut self) -> ProbeResult<()>;
}

/// Creates fresh, isolated driver sessions
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Backend name
    fn backend(&self) -> &'static str;

    /// Start a new session with no shared state
    async fn launch(&self) -> ProbeResult<Box<dyn Driver>>;
}
