//! User interaction on in-memory documents: keystrokes, clicks, selection,
//! file attachment, and the default actions they trigger.

use super::{Document, NodeId, SubmitDisposition};
use crate::action::{Invocation, Key, OptionMatch};
use crate::driver::ElementKind;
use crate::fixture::FilePayload;
use crate::result::{ProbeError, ProbeResult};
use tracing::trace;

fn number_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')
}

/// Simple `local@domain.tld` shape check used by native email validation
pub(crate) fn is_simple_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .all(|label| !label.is_empty())
}

impl Document {
    fn not_interactive(&self, id: NodeId, action: &str, reason: &str) -> ProbeError {
        ProbeError::ActionIncompatible {
            action: action.to_string(),
            selector: self.describe(id),
            element: self.describe(id),
            reason: reason.to_string(),
        }
    }

    fn fire_input(&mut self, id: NodeId) {
        if let Some(script) = self.script() {
            script.on_input(self, id);
        }
    }

    fn fire_change(&mut self, id: NodeId) {
        if let Some(script) = self.script() {
            script.on_change(self, id);
        }
    }

    /// Type keystrokes into a text control
    pub fn type_keys(&mut self, id: NodeId, keys: &[Key]) -> ProbeResult<()> {
        let kind = self.kind(id);
        if !kind.is_typeable() {
            return Err(self.not_interactive(id, "type", "is not a text field"));
        }
        if self.is_disabled(id) || self.attr(id, "readonly").is_some() {
            return Err(self.not_interactive(id, "type", "is disabled or read-only"));
        }
        let max_len = self
            .attr(id, "maxlength")
            .and_then(|m| m.trim().parse::<usize>().ok());

        for key in keys {
            match key {
                Key::Char(c) => {
                    if kind == ElementKind::NumberInput && !number_char(*c) {
                        trace!(ch = %c, "number input dropped keystroke");
                        continue;
                    }
                    let Some(data) = self.element_mut(id) else {
                        continue;
                    };
                    if std::mem::take(&mut data.replace_on_type) {
                        data.value.clear();
                    }
                    if max_len.is_some_and(|max| data.value.chars().count() >= max) {
                        continue;
                    }
                    data.value.push(*c);
                    self.fire_input(id);
                }
                Key::Backspace => {
                    let Some(data) = self.element_mut(id) else {
                        continue;
                    };
                    if std::mem::take(&mut data.replace_on_type) {
                        data.value.clear();
                    } else {
                        data.value.pop();
                    }
                    self.fire_input(id);
                }
                Key::SelectAll => {
                    if let Some(data) = self.element_mut(id) {
                        data.replace_on_type = !data.value.is_empty();
                    }
                }
                Key::Enter => {
                    if kind == ElementKind::TextArea {
                        if let Some(data) = self.element_mut(id) {
                            data.value.push('\n');
                        }
                        self.fire_input(id);
                    } else if let Some(form) = self.form_owner(id) {
                        self.submit(form);
                    }
                }
            }
        }
        Ok(())
    }

    /// Empty a text control
    pub fn clear(&mut self, id: NodeId) -> ProbeResult<()> {
        if !self.kind(id).is_typeable() {
            return Err(self.not_interactive(id, "clear", "is not a text field"));
        }
        if let Some(data) = self.element_mut(id) {
            data.value.clear();
            data.replace_on_type = false;
        }
        self.fire_input(id);
        Ok(())
    }

    /// Bring a checkbox or radio into a state by clicking it when needed
    pub fn user_set_checked(&mut self, id: NodeId, checked: bool) -> ProbeResult<()> {
        match self.kind(id) {
            ElementKind::Checkbox => {}
            ElementKind::Radio if checked => {}
            ElementKind::Radio => {
                return Err(self.not_interactive(id, "uncheck", "is a radio button"));
            }
            _ => return Err(self.not_interactive(id, "check", "is not a checkbox or radio")),
        }
        if self.is_checked(id) != checked {
            self.click(id)?;
        }
        Ok(())
    }

    /// Select one option of a select element; returns its value
    pub fn select_option(&mut self, id: NodeId, option: &OptionMatch) -> ProbeResult<String> {
        if self.kind(id) != ElementKind::Select {
            return Err(self.not_interactive(id, "select", "is not a <select> element"));
        }
        let options = self.options(id);
        let described: Vec<(String, String)> = options
            .iter()
            .map(|o| (self.option_value(*o), self.text(*o)))
            .collect();
        let index = option.pick(&described, &self.describe(id))?;
        if self.is_disabled(options[index]) {
            return Err(self.not_interactive(options[index], "select", "is a disabled option"));
        }
        self.select_index(id, Some(index));
        self.fire_input(id);
        self.fire_change(id);
        Ok(described[index].0.clone())
    }

    /// Replace the file list of a file input
    pub fn attach_files(&mut self, id: NodeId, files: &[FilePayload]) -> ProbeResult<()> {
        if self.kind(id) != ElementKind::FileInput {
            return Err(self.not_interactive(id, "select file", "is not a file input"));
        }
        if self.is_disabled(id) {
            return Err(self.not_interactive(id, "select file", "is disabled"));
        }
        if let Some(data) = self.element_mut(id) {
            data.files = files.to_vec();
        }
        self.fire_input(id);
        self.fire_change(id);
        Ok(())
    }

    /// Apply a direct manipulation
    pub fn invoke(&mut self, id: NodeId, invocation: &Invocation) {
        match invocation {
            Invocation::RemoveAttr(name) => self.remove_attr(id, name),
            Invocation::SetAttr(name, value) => self.set_attr(id, name, value),
            Invocation::SetValue(value) => self.set_value(id, value),
            Invocation::Show => self.show(id),
            Invocation::Hide => self.hide(id),
        }
    }

    /// Click an element: scripts first, then the default action
    pub fn click(&mut self, id: NodeId) -> ProbeResult<()> {
        if self.is_disabled(id) {
            return Err(self.not_interactive(id, "click", "is disabled"));
        }
        if let Some(script) = self.script() {
            script.on_click(self, id);
        }

        match self.kind(id) {
            ElementKind::Checkbox => {
                let next = !self.is_checked(id);
                self.set_checked(id, next);
                self.fire_input(id);
                self.fire_change(id);
            }
            ElementKind::Radio => {
                if !self.is_checked(id) {
                    self.set_checked(id, true);
                    self.fire_input(id);
                    self.fire_change(id);
                }
            }
            ElementKind::Button => {
                let button_type = self
                    .attr(id, "type")
                    .unwrap_or("submit")
                    .to_ascii_lowercase();
                if button_type == "submit" {
                    if let Some(form) = self.form_owner(id) {
                        self.submit(form);
                    }
                }
            }
            _ => {
                let anchor = std::iter::once(id)
                    .chain(self.ancestors(id))
                    .find(|n| self.kind(*n) == ElementKind::Anchor && self.attr(*n, "href").is_some());
                if let Some(anchor) = anchor {
                    self.activate_link(anchor);
                }
            }
        }
        Ok(())
    }

    fn activate_link(&mut self, anchor: NodeId) {
        let Some(href) = self.attr(anchor, "href").map(str::to_string) else {
            return;
        };
        if href.starts_with("javascript:") {
            return;
        }
        let blank = self
            .attr(anchor, "target")
            .is_some_and(|t| t.eq_ignore_ascii_case("_blank"));
        if blank {
            self.open_window(&href);
        } else {
            self.navigate(&href);
        }
    }

    /// Native constraint validation over a form's controls
    #[must_use]
    pub fn form_is_valid(&self, form: NodeId) -> bool {
        self.descendants(form).into_iter().all(|control| {
            let Some(data) = self.element(control) else {
                return true;
            };
            if !matches!(data.tag.as_str(), "input" | "select" | "textarea") || self.is_disabled(control) {
                return true;
            }
            let required = data.attr("required").is_some();
            match data.kind() {
                ElementKind::Checkbox | ElementKind::Radio => !required || self.is_checked(control),
                ElementKind::FileInput => !required || !data.files.is_empty(),
                _ => {
                    let value = self.value(control);
                    if required && value.trim().is_empty() {
                        return false;
                    }
                    let email = data.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("email"));
                    value.is_empty() || !email || is_simple_email(&value)
                }
            }
        })
    }

    /// Submit a form: native validation unless `novalidate`, then the page's
    /// submit handler, then the default navigation
    pub fn submit(&mut self, form: NodeId) {
        if self.attr(form, "novalidate").is_none() && !self.form_is_valid(form) {
            trace!("submit blocked by constraint validation");
            return;
        }
        let disposition = self
            .script()
            .map_or(SubmitDisposition::Default, |script| script.on_submit(self, form));
        if disposition == SubmitDisposition::Default {
            let action = self
                .attr(form, "action")
                .map_or_else(|| self.url().to_string(), str::to_string);
            self.navigate(&action);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dom::{El, PageScript};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counting {
        inputs: AtomicUsize,
        changes: AtomicUsize,
        submits: AtomicUsize,
    }

    impl PageScript for Counting {
        fn on_input(&self, _doc: &mut Document, _target: NodeId) {
            self.inputs.fetch_add(1, Ordering::SeqCst);
        }

        fn on_change(&self, _doc: &mut Document, _target: NodeId) {
            self.changes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_submit(&self, _doc: &mut Document, _form: NodeId) -> SubmitDisposition {
            self.submits.fetch_add(1, Ordering::SeqCst);
            SubmitDisposition::Prevented
        }
    }

    fn doc_with(script: Arc<Counting>, novalidate: bool) -> Document {
        let mut form = El::new("form").id("f");
        if novalidate {
            form = form.attr("novalidate", "");
        }
        Document::new(
            "memory://site/src/index.html",
            "Form",
            El::new("body").children([
                form.children([
                    El::input("text").id("name").attr("required", ""),
                    El::input("email").id("email"),
                    El::input("number").id("phone"),
                    El::input("text").id("short").attr("maxlength", "3"),
                    El::input("checkbox").id("cb"),
                    El::new("textarea").id("ta"),
                    El::input("file").id("upload"),
                    El::new("button").attr("type", "submit").text("Send"),
                ]),
                El::link("privacy.html", "Privacy").id("same"),
                El::link("privacy.html", "Privacy").id("blank").attr("target", "_blank"),
            ]),
        )
        .with_script(script)
    }

    fn chars(s: &str) -> Vec<Key> {
        s.chars().map(Key::Char).collect()
    }

    mod typing_tests {
        use super::*;

        #[test]
        fn test_type_fires_input_per_key() {
            let script = Arc::new(Counting::default());
            let mut doc = doc_with(Arc::clone(&script), true);
            let name = doc.by_id("name").unwrap();
            doc.type_keys(name, &chars("abc")).unwrap();
            assert_eq!(doc.value(name), "abc");
            assert_eq!(script.inputs.load(Ordering::SeqCst), 3);
        }

        #[test]
        fn test_number_input_drops_letters() {
            let mut doc = doc_with(Arc::new(Counting::default()), true);
            let phone = doc.by_id("phone").unwrap();
            doc.type_keys(phone, &chars("abcdefghij")).unwrap();
            assert_eq!(doc.value(phone), "");
            doc.type_keys(phone, &chars("12a3")).unwrap();
            assert_eq!(doc.value(phone), "123");
        }

        #[test]
        fn test_maxlength() {
            let mut doc = doc_with(Arc::new(Counting::default()), true);
            let short = doc.by_id("short").unwrap();
            doc.type_keys(short, &chars("abcdef")).unwrap();
            assert_eq!(doc.value(short), "abc");
        }

        #[test]
        fn test_selectall_replaces_and_backspace() {
            let mut doc = doc_with(Arc::new(Counting::default()), true);
            let name = doc.by_id("name").unwrap();
            doc.type_keys(name, &chars("old")).unwrap();
            doc.type_keys(name, &[Key::SelectAll, Key::Char('n')]).unwrap();
            assert_eq!(doc.value(name), "n");
            doc.type_keys(name, &[Key::Backspace]).unwrap();
            assert_eq!(doc.value(name), "");
        }

        #[test]
        fn test_enter_submits_owner_form() {
            let script = Arc::new(Counting::default());
            let mut doc = doc_with(Arc::clone(&script), true);
            let name = doc.by_id("name").unwrap();
            doc.type_keys(name, &[Key::Char('x'), Key::Enter]).unwrap();
            assert_eq!(script.submits.load(Ordering::SeqCst), 1);

            let ta = doc.by_id("ta").unwrap();
            doc.type_keys(ta, &[Key::Char('a'), Key::Enter, Key::Char('b')]).unwrap();
            assert_eq!(doc.value(ta), "a\nb");
            assert_eq!(script.submits.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn test_type_into_non_text_fails() {
            let mut doc = doc_with(Arc::new(Counting::default()), true);
            let cb = doc.by_id("cb").unwrap();
            assert!(matches!(
                doc.type_keys(cb, &chars("a")),
                Err(ProbeError::ActionIncompatible { .. })
            ));
        }

        #[test]
        fn test_clear() {
            let mut doc = doc_with(Arc::new(Counting::default()), true);
            let name = doc.by_id("name").unwrap();
            doc.type_keys(name, &chars("abc")).unwrap();
            doc.clear(name).unwrap();
            assert_eq!(doc.value(name), "");
        }
    }

    mod click_tests {
        use super::*;

        #[test]
        fn test_checkbox_toggles_and_fires_change() {
            let script = Arc::new(Counting::default());
            let mut doc = doc_with(Arc::clone(&script), true);
            let cb = doc.by_id("cb").unwrap();
            doc.click(cb).unwrap();
            assert!(doc.is_checked(cb));
            doc.user_set_checked(cb, true).unwrap();
            assert!(doc.is_checked(cb));
            assert_eq!(script.changes.load(Ordering::SeqCst), 1);
            doc.user_set_checked(cb, false).unwrap();
            assert!(!doc.is_checked(cb));
        }

        #[test]
        fn test_links() {
            let mut doc = doc_with(Arc::new(Counting::default()), true);
            let same = doc.by_id("same").unwrap();
            doc.click(same).unwrap();
            assert_eq!(
                doc.take_navigation().as_deref(),
                Some("memory://site/src/privacy.html")
            );

            let blank = doc.by_id("blank").unwrap();
            doc.click(blank).unwrap();
            assert!(doc.take_navigation().is_none());
            assert_eq!(doc.take_opened(), vec!["memory://site/src/privacy.html".to_string()]);
        }

        #[test]
        fn test_submit_button_runs_handler() {
            let script = Arc::new(Counting::default());
            let mut doc = doc_with(Arc::clone(&script), true);
            let button = doc.query("button").unwrap().unwrap();
            doc.click(button).unwrap();
            assert_eq!(script.submits.load(Ordering::SeqCst), 1);
            assert!(doc.take_navigation().is_none());
        }

        #[test]
        fn test_constraint_validation_blocks_submit() {
            let script = Arc::new(Counting::default());
            let mut doc = doc_with(Arc::clone(&script), false);
            let form = doc.by_id("f").unwrap();
            assert!(!doc.form_is_valid(form));
            doc.submit(form);
            assert_eq!(script.submits.load(Ordering::SeqCst), 0);

            let name = doc.by_id("name").unwrap();
            let email = doc.by_id("email").unwrap();
            doc.type_keys(name, &chars("Ana")).unwrap();
            doc.type_keys(email, &chars("not-an-email")).unwrap();
            assert!(!doc.form_is_valid(form));
            doc.clear(email).unwrap();
            doc.type_keys(email, &chars("ana@example.com")).unwrap();
            assert!(doc.form_is_valid(form));
            doc.submit(form);
            assert_eq!(script.submits.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn test_disabled_click_fails() {
            let mut doc = doc_with(Arc::new(Counting::default()), true);
            let cb = doc.by_id("cb").unwrap();
            doc.set_attr(cb, "disabled", "");
            assert!(doc.click(cb).is_err());
        }
    }

    mod file_tests {
        use super::*;

        #[test]
        fn test_attach_replaces_list() {
            let script = Arc::new(Counting::default());
            let mut doc = doc_with(Arc::clone(&script), true);
            let upload = doc.by_id("upload").unwrap();
            let file = FilePayload::new("example.json", "application/json", b"{}".to_vec());
            doc.attach_files(upload, &[file.clone(), file]).unwrap();
            assert_eq!(doc.files(upload).len(), 2);
            doc.attach_files(upload, &[]).unwrap();
            assert!(doc.files(upload).is_empty());
            assert_eq!(script.changes.load(Ordering::SeqCst), 2);
        }
    }

    mod email_tests {
        use super::*;

        #[test]
        fn test_simple_email() {
            assert!(is_simple_email("ana@example.com"));
            assert!(is_simple_email("a@b"));
            assert!(!is_simple_email("ana.example.com"));
            assert!(!is_simple_email("@example.com"));
            assert!(!is_simple_email("ana@example..com"));
            assert!(!is_simple_email("ana @example.com"));
        }
    }

    proptest! {
        #[test]
        fn number_inputs_only_keep_number_chars(s in ".{0,24}") {
            let mut doc = doc_with(Arc::new(Counting::default()), true);
            let phone = doc.by_id("phone").unwrap();
            doc.type_keys(phone, &chars(&s)).unwrap();
            prop_assert!(doc.raw_value(phone).chars().all(number_char));
        }
    }
}
