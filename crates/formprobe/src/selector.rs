//! Selectors: how a test names the elements it talks about.
//!
//! A [`Selector`] is an immutable description. It is resolved against the
//! live document every time it is used, never cached.

use regex::Regex;
use serde_json::{json, Value};
use std::fmt;

/// How `contains` compares an element's rendered text
#[derive(Debug, Clone)]
pub enum TextMatch {
    /// Rendered text contains the string
    Substring(String),
    /// Rendered text equals the string after whitespace normalization
    Exact(String),
    /// Rendered text matches the pattern
    Pattern(Regex),
}

impl TextMatch {
    /// Match against already rendered text
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let text = normalize_whitespace(text);
        match self {
            Self::Substring(needle) => text.contains(normalize_whitespace(needle).as_str()),
            Self::Exact(expected) => text == normalize_whitespace(expected),
            Self::Pattern(re) => re.is_match(&text),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Substring(s) => format!("{s:?}"),
            Self::Exact(s) => format!("={s:?}"),
            Self::Pattern(re) => format!("/{}/", re.as_str()),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Substring(s) => json!({ "mode": "substring", "text": s }),
            Self::Exact(s) => json!({ "mode": "exact", "text": s }),
            Self::Pattern(re) => json!({ "mode": "pattern", "text": re.as_str() }),
        }
    }
}

impl From<&str> for TextMatch {
    fn from(s: &str) -> Self {
        Self::Substring(s.to_string())
    }
}

impl From<String> for TextMatch {
    fn from(s: String) -> Self {
        Self::Substring(s)
    }
}

impl From<Regex> for TextMatch {
    fn from(re: Regex) -> Self {
        Self::Pattern(re)
    }
}

/// A positional pick out of a match set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Zero-based index
    Index(usize),
    /// Last element
    Last,
}

impl Position {
    /// Apply the pick to an ordered match set
    #[must_use]
    pub fn pick<T>(self, mut items: Vec<T>) -> Vec<T> {
        match self {
            Self::Index(i) if i < items.len() => vec![items.swap_remove(i)],
            Self::Last => items.pop().into_iter().collect(),
            Self::Index(_) => Vec::new(),
        }
    }
}

/// Element selector
#[derive(Debug, Clone)]
pub enum Selector {
    /// CSS selector
    Css(String),
    /// Elements matching an optional CSS filter whose text matches
    Contains {
        /// CSS filter; `None` means "deepest element containing the text"
        css: Option<String>,
        /// Text comparison
        text: TextMatch,
    },
    /// Descendants of every element the scope resolves to
    Within {
        /// Scope selector
        scope: Box<Selector>,
        /// CSS evaluated inside each scope element
        css: String,
    },
    /// One element picked out of another selector's match set
    Nth {
        /// Underlying selector
        inner: Box<Selector>,
        /// Which element
        position: Position,
    },
    /// Reference to a previously aliased element (`@name`)
    Alias(String),
}

impl Selector {
    /// CSS selector
    pub fn css(css: impl Into<String>) -> Self {
        Self::Css(css.into())
    }

    /// Elements matching `css` whose text contains `text`
    pub fn contains(css: impl Into<String>, text: impl Into<TextMatch>) -> Self {
        Self::Contains {
            css: Some(css.into()),
            text: text.into(),
        }
    }

    /// Deepest elements whose text contains `text`
    pub fn text(text: impl Into<TextMatch>) -> Self {
        Self::Contains {
            css: None,
            text: text.into(),
        }
    }

    /// Alias reference
    pub fn alias(name: impl Into<String>) -> Self {
        Self::Alias(name.into())
    }

    /// Descendants matching `css` inside this selector's elements
    #[must_use]
    pub fn within(self, css: impl Into<String>) -> Self {
        Self::Within {
            scope: Box::new(self),
            css: css.into(),
        }
    }

    /// Pick one element out of this selector's match set
    #[must_use]
    pub fn nth(self, position: Position) -> Self {
        Self::Nth {
            inner: Box::new(self),
            position,
        }
    }

    /// Whether this selector (or any part of it) is an alias reference
    #[must_use]
    pub fn has_alias(&self) -> bool {
        match self {
            Self::Alias(_) => true,
            Self::Css(_) | Self::Contains { .. } => false,
            Self::Within { scope, .. } => scope.has_alias(),
            Self::Nth { inner, .. } => inner.has_alias(),
        }
    }

    /// JSON form consumed by the injected browser resolver
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Css(css) => json!({ "kind": "css", "css": css }),
            Self::Contains { css, text } => {
                json!({ "kind": "contains", "css": css, "text": text.to_json() })
            }
            Self::Within { scope, css } => {
                json!({ "kind": "within", "scope": scope.to_json(), "css": css })
            }
            Self::Nth { inner, position } => {
                let index = match position {
                    Position::Index(i) => json!(i),
                    Position::Last => json!(-1),
                };
                json!({ "kind": "nth", "inner": inner.to_json(), "index": index })
            }
            Self::Alias(name) => json!({ "kind": "alias", "name": name }),
        }
    }
}

impl From<&str> for Selector {
    /// `@name` is an alias reference, anything else is CSS
    fn from(s: &str) -> Self {
        s.strip_prefix('@')
            .map_or_else(|| Self::Css(s.to_string()), |name| Self::Alias(name.to_string()))
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "{css}"),
            Self::Contains { css: Some(css), text } => {
                write!(f, "contains({css}, {})", text.describe())
            }
            Self::Contains { css: None, text } => write!(f, "contains({})", text.describe()),
            Self::Within { scope, css } => write!(f, "{scope} >> {css}"),
            Self::Nth {
                inner,
                position: Position::Index(i),
            } => write!(f, "{inner}:eq({i})"),
            Self::Nth {
                inner,
                position: Position::Last,
            } => write!(f, "{inner}:last"),
            Self::Alias(name) => write!(f, "@{name}"),
        }
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
