//! Declarative element trees for building documents.

/// Child of an [`El`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    /// Nested element
    El(El),
    /// Text node
    Text(String),
}

/// Element description, turned into arena nodes by [`super::Document::new`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct El {
    pub(crate) tag: String,
    pub(crate) attrs: Vec<(String, String)>,
    pub(crate) children: Vec<Child>,
}

impl El {
    /// Element with the given tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// `<input type=..>`
    pub fn input(input_type: &str) -> Self {
        Self::new("input").attr("type", input_type)
    }

    /// `<option value=..>text</option>`
    pub fn option(value: &str, text: &str) -> Self {
        Self::new("option").attr("value", value).text(text)
    }

    /// `<a href=..>text</a>`
    pub fn link(href: &str, text: &str) -> Self {
        Self::new("a").attr("href", href).text(text)
    }

    /// Set an attribute (last write wins)
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.attrs.push((name, value));
        }
        self
    }

    /// Set the id
    #[must_use]
    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    /// Append classes
    #[must_use]
    pub fn class(self, class: &str) -> Self {
        let merged = match self.attrs.iter().find(|(n, _)| n == "class") {
            Some((_, existing)) => format!("{existing} {class}"),
            None => class.to_string(),
        };
        self.attr("class", merged)
    }

    /// Inline `display: none`
    #[must_use]
    pub fn hidden(self) -> Self {
        self.attr("style", "display: none")
    }

    /// Append a text node
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Child::Text(text.into()));
        self
    }

    /// Append a child element
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(Child::El(child));
        self
    }

    /// Append child elements
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children.extend(children.into_iter().map(Child::El));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_overwrites() {
        let el = El::new("A").attr("HREF", "x").attr("href", "y");
        assert_eq!(el.tag, "a");
        assert_eq!(el.attrs, vec![("href".to_string(), "y".to_string())]);
    }

    #[test]
    fn test_class_appends() {
        let el = El::new("div").class("a").class("b");
        assert_eq!(el.attrs, vec![("class".to_string(), "a b".to_string())]);
    }

    #[test]
    fn test_children_order() {
        let el = El::new("p").text("Talking ").child(El::new("b").text("About")).text(" Testing");
        assert_eq!(el.children.len(), 3);
        assert!(matches!(&el.children[1], Child::El(b) if b.tag == "b"));
    }
}
