//! Action executor: the user-simulation primitives on a [`Chain`].
//!
//! Every action first resolves its subject through the locator's bounded
//! retry, then executes exactly once. Kind mismatches (typing into a select,
//! checking a text field) fail immediately with
//! [`ProbeError::ActionIncompatible`].

use crate::driver::{ElementKind, ElementRef, ElementState};
use crate::fixture::FilePayload;
use crate::locator::{Chain, ElementHandle, Requirement};
use crate::result::{ProbeError, ProbeResult};
use crate::assertion::retry::Poller;
use crate::dom::resolve_url;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// One keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Printable character
    Char(char),
    /// `{enter}`
    Enter,
    /// `{backspace}`
    Backspace,
    /// `{selectall}`: the next keystroke replaces the whole value
    SelectAll,
}

/// Split text into keystrokes, honoring `{enter}`, `{backspace}`,
/// `{selectall}` and `{{}` (a literal brace)
pub fn parse_keys(text: &str) -> ProbeResult<Vec<Key>> {
    let mut keys = Vec::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if c != '{' {
            keys.push(Key::Char(c));
            rest = &rest[c.len_utf8()..];
            continue;
        }
        let close = rest.find('}').ok_or_else(|| ProbeError::InvalidArgument {
            action: "type".into(),
            message: format!("unterminated special sequence in {text:?}"),
        })?;
        let name = &rest[1..close];
        let key = match name.to_ascii_lowercase().as_str() {
            "enter" => Key::Enter,
            "backspace" => Key::Backspace,
            "selectall" => Key::SelectAll,
            "{" => Key::Char('{'),
            other => {
                return Err(ProbeError::InvalidArgument {
                    action: "type".into(),
                    message: format!("unknown special sequence {{{other}}}"),
                })
            }
        };
        keys.push(key);
        rest = &rest[close + 1..];
    }
    Ok(keys)
}

/// Options for typing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeOptions {
    /// Pause between keystrokes; zero sends everything in one driver call
    pub delay: Duration,
}

impl Default for TypeOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(10),
        }
    }
}

impl TypeOptions {
    /// Default options (10ms between keystrokes)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delay
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// No delay
    #[must_use]
    pub const fn instant() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }
}

/// Which option of a `<select>` to pick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionMatch {
    /// Visible option text
    Text(String),
    /// `value` attribute
    Value(String),
    /// Zero-based position among all options
    Index(usize),
    /// Value first, then text
    ValueOrText(String),
}

impl OptionMatch {
    /// Whether the option at `index` with `value` and `text` matches
    #[must_use]
    pub fn matches(&self, index: usize, value: &str, text: &str) -> bool {
        match self {
            Self::Text(t) => text.trim() == t.trim(),
            Self::Value(v) => value == v,
            Self::Index(i) => index == *i,
            Self::ValueOrText(s) => value == s || text.trim() == s.trim(),
        }
    }

    /// Pick the matching option index out of `(value, text)` pairs
    ///
    /// `ValueOrText` prefers a value match over a text match.
    pub fn pick(&self, options: &[(String, String)], selector: &str) -> ProbeResult<usize> {
        let matching = |m: &Self| -> Vec<usize> {
            options
                .iter()
                .enumerate()
                .filter(|(i, (value, text))| m.matches(*i, value, text))
                .map(|(i, _)| i)
                .collect()
        };
        let found = match self {
            Self::ValueOrText(s) => {
                let by_value = matching(&Self::Value(s.clone()));
                if by_value.is_empty() {
                    matching(&Self::Text(s.clone()))
                } else {
                    by_value
                }
            }
            other => matching(other),
        };
        match found.as_slice() {
            [] => Err(ProbeError::OptionNotFound {
                selector: selector.to_string(),
                option: self.to_string(),
            }),
            [one] => Ok(*one),
            many => Err(ProbeError::AmbiguousOption {
                selector: selector.to_string(),
                option: self.to_string(),
                count: many.len(),
            }),
        }
    }
}

impl From<&str> for OptionMatch {
    fn from(s: &str) -> Self {
        Self::ValueOrText(s.to_string())
    }
}

impl From<String> for OptionMatch {
    fn from(s: String) -> Self {
        Self::ValueOrText(s)
    }
}

impl From<usize> for OptionMatch {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl fmt::Display for OptionMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(t) => write!(f, "text {t:?}"),
            Self::Value(v) => write!(f, "value {v:?}"),
            Self::Index(i) => write!(f, "index {i}"),
            Self::ValueOrText(s) => write!(f, "{s:?}"),
        }
    }
}

/// How a file reaches the input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectFileAction {
    /// Through the file chooser
    #[default]
    Select,
    /// Dropped onto the input
    DragDrop,
}

/// Options for `select_file`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectFileOptions {
    /// Delivery mechanism
    pub action: SelectFileAction,
}

impl SelectFileOptions {
    /// Drag-and-drop delivery
    #[must_use]
    pub const fn drag_drop() -> Self {
        Self {
            action: SelectFileAction::DragDrop,
        }
    }
}

/// Where an uploaded file comes from
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Path, tried as given and then relative to the fixtures folder
    Path(PathBuf),
    /// Ready-made payload
    Payload(FilePayload),
    /// File alias registered with `Page::fixture(..).as_alias(..)`
    Alias(String),
}

impl From<&str> for FileSource {
    fn from(s: &str) -> Self {
        s.strip_prefix('@').map_or_else(
            || Self::Path(PathBuf::from(s)),
            |name| Self::Alias(name.to_string()),
        )
    }
}

impl From<FilePayload> for FileSource {
    fn from(payload: FilePayload) -> Self {
        Self::Payload(payload)
    }
}

/// Direct element manipulation that skips user simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Remove an attribute
    RemoveAttr(String),
    /// Set an attribute
    SetAttr(String, String),
    /// Set the value property, no events
    SetValue(String),
    /// Make the element visible
    Show,
    /// Hide the element
    Hide,
}

impl Invocation {
    /// Build from a jQuery-style method name and arguments
    pub fn parse(method: &str, args: &[&str]) -> ProbeResult<Self> {
        let bad = |expected: &str| ProbeError::InvalidArgument {
            action: "invoke".into(),
            message: format!("{method} expects {expected}, got {} argument(s)", args.len()),
        };
        match (method, args) {
            ("removeAttr", [name]) => Ok(Self::RemoveAttr((*name).to_string())),
            ("removeAttr", _) => Err(bad("1 argument")),
            ("attr", [name, value]) => Ok(Self::SetAttr((*name).to_string(), (*value).to_string())),
            ("attr", _) => Err(bad("2 arguments")),
            ("val", [value]) => Ok(Self::SetValue((*value).to_string())),
            ("val", _) => Err(bad("1 argument")),
            ("show", []) => Ok(Self::Show),
            ("hide", []) => Ok(Self::Hide),
            ("show" | "hide", _) => Err(bad("no arguments")),
            _ => Err(ProbeError::InvalidArgument {
                action: "invoke".into(),
                message: format!("unsupported method `{method}`"),
            }),
        }
    }

    /// Method name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RemoveAttr(_) => "removeAttr",
            Self::SetAttr(..) => "attr",
            Self::SetValue(_) => "val",
            Self::Show => "show",
            Self::Hide => "hide",
        }
    }
}

fn incompatible(
    handle: &ElementHandle,
    element: &ElementState,
    action: &str,
    reason: &str,
) -> ProbeError {
    ProbeError::ActionIncompatible {
        action: action.to_string(),
        selector: handle.selector().to_string(),
        element: element.describe(),
        reason: reason.to_string(),
    }
}

fn single<'h>(handle: &'h ElementHandle, action: &str) -> ProbeResult<&'h ElementState> {
    match handle.elements() {
        [one] => Ok(one),
        many => Err(ProbeError::ActionIncompatible {
            action: action.to_string(),
            selector: handle.selector().to_string(),
            element: format!("{} elements", many.len()),
            reason: "can only be applied to a single element".to_string(),
        }),
    }
}

fn require_kind(
    handle: &ElementHandle,
    action: &str,
    accepts: impl Fn(ElementKind) -> bool,
    reason: &str,
) -> ProbeResult<()> {
    match handle.elements().iter().find(|e| !accepts(e.kind())) {
        Some(bad) => Err(incompatible(handle, bad, action, reason)),
        None => Ok(()),
    }
}

impl<'p> Chain<'p> {
    /// Type text with the page's default keystroke delay
    pub async fn type_text(self, text: &str) -> ProbeResult<Self> {
        let options = TypeOptions::new().with_delay(self.page().settings().type_delay);
        self.type_with(text, options).await
    }

    /// Type text with explicit options
    pub async fn type_with(mut self, text: &str, options: TypeOptions) -> ProbeResult<Self> {
        if text.is_empty() {
            return Err(ProbeError::InvalidArgument {
                action: "type".into(),
                message: "cannot type an empty string".into(),
            });
        }
        let keys = parse_keys(text)?;
        let handle = self.resolve(Requirement::Actionable, "type").await?;
        let element = single(&handle, "type")?;
        require_kind(&handle, "type", ElementKind::is_typeable, "is not a text field")?;
        let target = handle.element_ref(element);
        debug!(selector = %handle.selector(), keys = keys.len(), delay_ms = options.delay.as_millis() as u64, "type");

        let driver = self.page_mut().driver_mut();
        if options.delay.is_zero() {
            driver.type_text(&target, &keys).await?;
        } else {
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(options.delay).await;
                }
                driver.type_text(&target, std::slice::from_ref(key)).await?;
            }
        }
        Ok(self)
    }

    /// Empty every text control in the subject
    pub async fn clear(mut self) -> ProbeResult<Self> {
        let handle = self.resolve(Requirement::Actionable, "clear").await?;
        require_kind(&handle, "clear", ElementKind::is_typeable, "is not a text field")?;
        debug!(selector = %handle.selector(), count = handle.len(), "clear");
        for target in handle.element_refs() {
            self.page_mut().driver_mut().clear(&target).await?;
        }
        Ok(self)
    }

    /// Check every checkbox or radio in the subject
    pub async fn check(self) -> ProbeResult<Self> {
        self.set_checked(true).await
    }

    /// Uncheck every checkbox in the subject
    pub async fn uncheck(self) -> ProbeResult<Self> {
        self.set_checked(false).await
    }

    async fn set_checked(mut self, checked: bool) -> ProbeResult<Self> {
        let action = if checked { "check" } else { "uncheck" };
        let handle = self.resolve(Requirement::Actionable, action).await?;
        if checked {
            require_kind(
                &handle,
                action,
                |k| matches!(k, ElementKind::Checkbox | ElementKind::Radio),
                "is not a checkbox or radio",
            )?;
        } else {
            require_kind(
                &handle,
                action,
                |k| k == ElementKind::Checkbox,
                "is not a checkbox",
            )?;
        }
        debug!(selector = %handle.selector(), count = handle.len(), action);
        for target in handle.element_refs() {
            self.page_mut()
                .driver_mut()
                .set_checked(&target, checked)
                .await?;
        }
        Ok(self)
    }

    /// Select one option of a `<select>`
    pub async fn select(mut self, option: impl Into<OptionMatch>) -> ProbeResult<Self> {
        let option = option.into();
        let handle = self.resolve(Requirement::Actionable, "select").await?;
        let element = single(&handle, "select")?;
        require_kind(
            &handle,
            "select",
            |k| k == ElementKind::Select,
            "is not a <select> element",
        )?;
        let target = handle.element_ref(element);
        let value = self.page_mut().driver_mut().select(&target, &option).await?;
        debug!(selector = %handle.selector(), %option, %value, "select");
        Ok(self)
    }

    /// Attach a file through the file chooser
    pub async fn select_file(self, source: impl Into<FileSource>) -> ProbeResult<Self> {
        self.select_file_with(source, SelectFileOptions::default())
            .await
    }

    /// Attach a file with explicit options
    pub async fn select_file_with(
        mut self,
        source: impl Into<FileSource>,
        options: SelectFileOptions,
    ) -> ProbeResult<Self> {
        let payload = self.page().load_file(&source.into())?;
        let handle = self.resolve(Requirement::Actionable, "select file").await?;
        require_kind(
            &handle,
            "select file",
            |k| k == ElementKind::FileInput,
            "is not a file input",
        )?;
        debug!(selector = %handle.selector(), file = %payload.name, action = ?options.action, "select file");
        let files = [payload];
        for target in handle.element_refs() {
            self.page_mut()
                .driver_mut()
                .attach_files(&target, &files, options.action)
                .await?;
        }
        Ok(self)
    }

    /// Manipulate the subject directly
    pub async fn invoke(mut self, invocation: Invocation) -> ProbeResult<Self> {
        let handle = self.resolve(Requirement::Exist, "invoke").await?;
        debug!(selector = %handle.selector(), method = invocation.name(), "invoke");
        for target in handle.element_refs() {
            self.page_mut()
                .driver_mut()
                .invoke(&target, &invocation)
                .await?;
        }
        Ok(self)
    }

    /// Click the subject
    pub async fn click(mut self) -> ProbeResult<Self> {
        let handle = self.resolve(Requirement::Actionable, "click").await?;
        let element = single(&handle, "click")?;
        let target = handle.element_ref(element);
        debug!(selector = %handle.selector(), element = %element.describe(), "click");
        self.page_mut().driver_mut().click(&target).await?;
        Ok(self)
    }

    /// Click a link and require the active context to navigate
    pub async fn follow_link(mut self) -> ProbeResult<Self> {
        let handle = self.resolve(Requirement::Actionable, "follow link").await?;
        let element = single(&handle, "follow link")?;
        let href = match (element.kind(), element.attr("href")) {
            (ElementKind::Anchor, Some(href)) => href.to_string(),
            _ => return Err(incompatible(&handle, element, "follow link", "is not a link")),
        };
        let target = handle.element_ref(element);
        let retry = self.page().settings().retry;
        let driver = self.page_mut().driver_mut();
        let before = driver.url().await?;
        let expected = resolve_url(&before, &href);
        driver.click(&target).await?;

        let mut poller = Poller::start(&retry);
        loop {
            let now = driver.url().await?;
            if now != before {
                debug!(from = %before, to = %now, "followed link");
                return Ok(self);
            }
            if !poller.wait().await {
                return Err(ProbeError::NavigationMismatch {
                    action: format!("following `{}`", handle.selector()),
                    expected,
                    actual: now,
                });
            }
        }
    }
}

impl ElementHandle {
    /// Driver address of one of this handle's elements, pinned to the node
    /// that was resolved
    #[must_use]
    pub fn element_ref(&self, element: &ElementState) -> ElementRef {
        ElementRef::from_state(self.selector().clone(), element)
    }

    /// Driver addresses of every element in the handle
    #[must_use]
    pub fn element_refs(&self) -> Vec<ElementRef> {
        self.elements().iter().map(|e| self.element_ref(e)).collect()
    }
}
