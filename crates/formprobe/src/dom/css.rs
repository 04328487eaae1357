//! The CSS selector subset understood by the in-memory document.
//!
//! Compound selectors (type, `#id`, `.class`, `*`, attribute conditions and a
//! handful of pseudo-classes) joined by descendant or child combinators, with
//! `,` separated groups.

use super::{Document, NodeId};
use crate::result::{ProbeError, ProbeResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Word(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrCondition {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pseudo {
    Checked,
    Disabled,
    Enabled,
    FirstChild,
    LastChild,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    universal: bool,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
    pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    compound: Compound,
    // relation to the part on the left
    combinator: Option<Combinator>,
}

/// A parsed selector group list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    groups: Vec<Vec<Part>>,
}

impl SelectorList {
    /// Parse a selector string
    pub fn parse(selector: &str) -> ProbeResult<Self> {
        let invalid = |message: &str| ProbeError::InvalidSelector {
            selector: selector.to_string(),
            message: message.to_string(),
        };
        let groups = split_outside_brackets(selector, ',')
            .map_err(|m| invalid(&m))?
            .iter()
            .map(|group| parse_chain(group).map_err(|m| invalid(&m)))
            .collect::<ProbeResult<Vec<_>>>()?;
        Ok(Self { groups })
    }

    /// Whether `node` matches any group
    #[must_use]
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.groups.iter().any(|chain| matches_chain(doc, node, chain))
    }
}

fn split_outside_brackets(selector: &str, sep: char) -> Result<Vec<String>, String> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in selector.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' if depth > 0 => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                depth = depth.checked_sub(1).ok_or("unbalanced `]`")?;
                current.push(ch);
            }
            c if c == sep && depth == 0 => {
                let trimmed = current.trim();
                if trimmed.is_empty() {
                    return Err("empty selector group".into());
                }
                groups.push(trimmed.to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if depth != 0 || quote.is_some() {
        return Err("unterminated attribute selector".into());
    }
    let trimmed = current.trim();
    if trimmed.is_empty() {
        return Err("empty selector".into());
    }
    groups.push(trimmed.to_string());
    Ok(groups)
}

fn tokenize(group: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    let mut flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() {
            tokens.push(std::mem::take(current));
        }
    };

    for ch in group.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' if depth > 0 => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            '>' if depth == 0 => {
                flush(&mut current, &mut tokens);
                tokens.push(">".to_string());
            }
            '+' | '~' if depth == 0 => {
                return Err(format!("sibling combinator `{ch}` is not supported"));
            }
            c if c.is_whitespace() && depth == 0 => flush(&mut current, &mut tokens),
            _ => current.push(ch),
        }
    }
    flush(&mut current, &mut tokens);
    Ok(tokens)
}

fn parse_chain(group: &str) -> Result<Vec<Part>, String> {
    let mut parts: Vec<Part> = Vec::new();
    let mut pending: Option<Combinator> = None;

    for token in tokenize(group)? {
        if token == ">" {
            if pending.is_some() || parts.is_empty() {
                return Err("dangling `>` combinator".into());
            }
            pending = Some(Combinator::Child);
            continue;
        }
        let compound = parse_compound(&token)?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(Part {
            compound,
            combinator,
        });
    }

    if parts.is_empty() || pending.is_some() {
        return Err("incomplete selector".into());
    }
    Ok(parts)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(src: &str, start: usize) -> Option<(String, usize)> {
    let rest = src.get(start..)?;
    let len: usize = rest
        .chars()
        .take_while(|c| is_ident_char(*c))
        .map(char::len_utf8)
        .sum();
    (len > 0).then(|| (rest[..len].to_string(), start + len))
}

fn parse_compound(token: &str) -> Result<Compound, String> {
    let mut compound = Compound::default();
    let mut i = 0usize;
    let unsupported = || format!("unsupported selector syntax in `{token}`");

    while i < token.len() {
        let c = token[i..].chars().next().ok_or_else(unsupported)?;
        match c {
            '*' => {
                compound.universal = true;
                i += 1;
            }
            '#' => {
                let (id, next) = take_ident(token, i + 1).ok_or_else(unsupported)?;
                if compound.id.replace(id).is_some() {
                    return Err(unsupported());
                }
                i = next;
            }
            '.' => {
                let (class, next) = take_ident(token, i + 1).ok_or_else(unsupported)?;
                compound.classes.push(class);
                i = next;
            }
            '[' => {
                let end = find_attr_end(token, i).ok_or_else(unsupported)?;
                compound.attrs.push(parse_attr(&token[i + 1..end])?);
                i = end + 1;
            }
            ':' => {
                let (name, next) = take_ident(token, i + 1).ok_or_else(unsupported)?;
                let pseudo = match name.as_str() {
                    "checked" => Pseudo::Checked,
                    "disabled" => Pseudo::Disabled,
                    "enabled" => Pseudo::Enabled,
                    "first-child" => Pseudo::FirstChild,
                    "last-child" => Pseudo::LastChild,
                    other => return Err(format!("pseudo-class `:{other}` is not supported")),
                };
                compound.pseudos.push(pseudo);
                i = next;
            }
            _ => {
                if compound.tag.is_some() || i != 0 {
                    return Err(unsupported());
                }
                let (tag, next) = take_ident(token, i).ok_or_else(unsupported)?;
                compound.tag = Some(tag.to_ascii_lowercase());
                i = next;
            }
        }
    }
    Ok(compound)
}

fn find_attr_end(token: &str, open: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, c) in token[open + 1..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, ']') => return Some(open + 1 + offset),
            (None, _) => {}
        }
    }
    None
}

fn parse_attr(body: &str) -> Result<AttrCondition, String> {
    let body = body.trim();
    let op_start = body.find(['=', '^', '$', '*', '~']);
    let Some(op_start) = op_start else {
        if body.is_empty() || !body.chars().all(is_ident_char) {
            return Err(format!("bad attribute selector `[{body}]`"));
        }
        return Ok(AttrCondition {
            name: body.to_ascii_lowercase(),
            op: AttrOp::Exists,
        });
    };

    let name = body[..op_start].trim().to_ascii_lowercase();
    let rest = &body[op_start..];
    let (kind, value) = if let Some(v) = rest.strip_prefix('=') {
        ('=', v)
    } else {
        let kind = rest.chars().next().unwrap_or('=');
        let v = rest[kind.len_utf8()..]
            .strip_prefix('=')
            .ok_or_else(|| format!("bad attribute operator in `[{body}]`"))?;
        (kind, v)
    };
    let value = unquote(value.trim())?;
    if name.is_empty() {
        return Err(format!("missing attribute name in `[{body}]`"));
    }
    let op = match kind {
        '=' => AttrOp::Equals(value),
        '^' => AttrOp::Prefix(value),
        '$' => AttrOp::Suffix(value),
        '*' => AttrOp::Contains(value),
        '~' => AttrOp::Word(value),
        _ => return Err(format!("bad attribute operator in `[{body}]`")),
    };
    Ok(AttrCondition { name, op })
}

fn unquote(value: &str) -> Result<String, String> {
    for q in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(q) {
            return inner
                .strip_suffix(q)
                .map(str::to_string)
                .ok_or_else(|| format!("unterminated string `{value}`"));
        }
    }
    if value.is_empty() || !value.chars().all(is_ident_char) {
        return Err(format!("attribute value `{value}` must be quoted"));
    }
    Ok(value.to_string())
}

fn matches_chain(doc: &Document, node: NodeId, parts: &[Part]) -> bool {
    let Some((last, rest)) = parts.split_last() else {
        return false;
    };
    if !matches_compound(doc, node, &last.compound) {
        return false;
    }
    let Some(combinator) = last.combinator else {
        return true;
    };
    match combinator {
        Combinator::Child => doc
            .parent_element(node)
            .is_some_and(|parent| matches_chain(doc, parent, rest)),
        Combinator::Descendant => {
            let mut cursor = doc.parent_element(node);
            while let Some(ancestor) = cursor {
                if matches_chain(doc, ancestor, rest) {
                    return true;
                }
                cursor = doc.parent_element(ancestor);
            }
            false
        }
    }
}

fn matches_compound(doc: &Document, node: NodeId, compound: &Compound) -> bool {
    let Some(element) = doc.element(node) else {
        return false;
    };
    if let Some(tag) = &compound.tag {
        if !element.tag.eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if element.attr("id") != Some(id.as_str()) {
            return false;
        }
    }
    if !compound.classes.iter().all(|c| element.has_class(c)) {
        return false;
    }
    let attrs_ok = compound.attrs.iter().all(|cond| {
        let Some(actual) = element.attr(&cond.name) else {
            return false;
        };
        match &cond.op {
            AttrOp::Exists => true,
            AttrOp::Equals(v) => actual == v,
            AttrOp::Prefix(v) => !v.is_empty() && actual.starts_with(v.as_str()),
            AttrOp::Suffix(v) => !v.is_empty() && actual.ends_with(v.as_str()),
            AttrOp::Contains(v) => !v.is_empty() && actual.contains(v.as_str()),
            AttrOp::Word(v) => actual.split_whitespace().any(|w| w == v),
        }
    });
    if !attrs_ok {
        return false;
    }
    compound.pseudos.iter().all(|pseudo| match pseudo {
        Pseudo::Checked => doc.is_checked(node),
        Pseudo::Disabled => doc.is_disabled(node),
        Pseudo::Enabled => !doc.is_disabled(node),
        Pseudo::FirstChild => doc.element_siblings(node).first() == Some(&node),
        Pseudo::LastChild => doc.element_siblings(node).last() == Some(&node),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dom::El;
    use proptest::prelude::*;

    fn doc() -> Document {
        Document::new(
            "memory://test/index.html",
            "Test",
            El::new("body").children([
                El::new("form").id("f").children([
                    El::input("text").id("firstName").class("field required"),
                    El::input("number").id("phone").attr("data-role", "phone-main"),
                    El::new("div").id("support-type").children([
                        El::input("radio").attr("value", "help").attr("checked", ""),
                        El::input("radio").attr("value", "feedback"),
                    ]),
                    El::new("button").attr("type", "submit").attr("disabled", "").text("Send"),
                ]),
                El::new("p").id("privacy").child(El::new("a").attr("href", "privacy.html").text("Privacy")),
            ]),
        )
    }

    fn select(doc: &Document, css: &str) -> Vec<String> {
        doc.query_all(css)
            .unwrap()
            .into_iter()
            .map(|n| doc.describe(n))
            .collect()
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_rejects_unsupported() {
            for bad in ["", "a +b", "a ~ b", "> a", "a >", "[", "a:hover", "[type=a b]", "a,,b"] {
                assert!(
                    matches!(SelectorList::parse(bad), Err(ProbeError::InvalidSelector { .. })),
                    "{bad:?} should be rejected"
                );
            }
        }

        #[test]
        fn test_quoted_values_may_contain_separators() {
            let list = SelectorList::parse("a[title=\"x, y > z\"]").unwrap();
            assert_eq!(list.groups.len(), 1);
            assert_eq!(list.groups[0].len(), 1);
        }
    }

    mod match_tests {
        use super::*;

        #[test]
        fn test_id_class_type() {
            let d = doc();
            assert_eq!(select(&d, "#firstName").len(), 1);
            assert_eq!(select(&d, "input.required").len(), 1);
            assert_eq!(select(&d, ".field.required").len(), 1);
            assert_eq!(select(&d, "INPUT").len(), 4);
        }

        #[test]
        fn test_attribute_operators() {
            let d = doc();
            assert_eq!(select(&d, "input[type=\"radio\"]").len(), 2);
            assert_eq!(select(&d, "input[type='radio'][value=feedback]").len(), 1);
            assert_eq!(select(&d, "[data-role^=phone]").len(), 1);
            assert_eq!(select(&d, "[data-role$=main]").len(), 1);
            assert_eq!(select(&d, "[data-role*=\"-ma\"]").len(), 1);
            assert_eq!(select(&d, "[class~=required]").len(), 1);
            assert_eq!(select(&d, "a[href]").len(), 1);
        }

        #[test]
        fn test_combinators() {
            let d = doc();
            assert_eq!(select(&d, "#support-type input").len(), 2);
            assert_eq!(select(&d, "form > input").len(), 2);
            assert_eq!(select(&d, "body > input").len(), 0);
            assert_eq!(select(&d, "#privacy a").len(), 1);
        }

        #[test]
        fn test_pseudo_classes() {
            let d = doc();
            assert_eq!(select(&d, "input:checked").len(), 1);
            assert_eq!(select(&d, "button:disabled").len(), 1);
            assert_eq!(select(&d, "#support-type input:first-child").len(), 1);
            assert_eq!(select(&d, "#support-type > :last-child").len(), 1);
        }

        #[test]
        fn test_groups_keep_document_order() {
            let d = doc();
            let found = select(&d, "a, #firstName");
            assert_eq!(found.len(), 2);
            assert!(found[0].contains("firstName"));
        }
    }

    proptest! {
        #[test]
        fn ident_selectors_always_parse(id in "[a-zA-Z][a-zA-Z0-9_-]{0,12}") {
            let by_id = format!("#{id}");
            let compound = format!("div.{id} > [data-{id}=\"v\"]");
            prop_assert!(SelectorList::parse(&by_id).is_ok());
            prop_assert!(SelectorList::parse(&compound).is_ok());
        }

        #[test]
        fn parse_never_panics(s in "[#.\\[\\]=\"a-z >,:*^$~']{0,20}") {
            let _ = SelectorList::parse(&s);
        }
    }
}
