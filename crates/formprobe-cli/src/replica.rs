//! In-memory stand-in for the TAT Customer Service Center application.
//!
//! Lets the suite run without a browser or a web server. The markup mirrors
//! the element contract the suite relies on; the behavior (phone becomes
//! required when its checkbox is ticked, success or error banner for three
//! seconds after submit) lives in [`CscScript`].

use formprobe::dom::{Document, El, NodeId, PageScript, Site, SubmitDisposition};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Origin of the replica
pub const ORIGIN: &str = "memory://csc";

/// Base URL the suite's entry path resolves against
pub const BASE_URL: &str = "memory://csc/";

/// How long the success or error banner stays up
pub const MESSAGE_TIMEOUT: Duration = Duration::from_secs(3);

/// Title of the form page
pub const TITLE: &str = "TAT Customer Service Center";

/// Title and heading of the privacy page
pub const PRIVACY_TITLE: &str = "TAT CSC - Privacy Policy";

/// The replica site: `src/index.html` and `src/privacy.html`
#[must_use]
pub fn site() -> Site {
    Site::new(ORIGIN)
        .page("src/index.html", index)
        .page("src/privacy.html", privacy)
}

fn field(label: &str, control: El) -> El {
    El::new("div")
        .class("field")
        .child(El::new("label").text(label))
        .child(control)
}

fn radio(value: &str, label: &str) -> El {
    El::new("label").child(
        El::input("radio")
            .attr("name", "atendimento-tat")
            .attr("value", value),
    )
    .text(label)
}

fn index(url: &str) -> Document {
    let form = El::new("form")
        .attr("novalidate", "")
        .child(field("First name *", El::input("text").id("firstName").attr("required", "")))
        .child(field("Last name *", El::input("text").id("lastName").attr("required", "")))
        .child(field("E-mail *", El::input("email").id("email").attr("required", "")))
        .child(
            El::new("div")
                .class("field")
                .child(
                    El::new("label")
                        .text("Phone ")
                        .child(El::new("span").class("phone-label-span").text("*").hidden()),
                )
                .child(El::input("number").id("phone")),
        )
        .child(field(
            "Product",
            El::new("select").id("product").children([
                El::option("", "Select").attr("disabled", "").attr("selected", ""),
                El::option("blog", "Blog"),
                El::option("courses", "Courses"),
                El::option("mentorship", "Mentorship"),
                El::option("youtube", "YouTube"),
            ]),
        ))
        .child(
            El::new("div").id("support-type").children([
                radio("help", "Help"),
                radio("praise", "Praise"),
                radio("feedback", "Feedback"),
            ]),
        )
        .child(
            El::new("div").id("check").children([
                El::new("label")
                    .child(El::input("checkbox").id("email-checkbox").attr("name", "email").attr("value", "email"))
                    .text("E-mail"),
                El::new("label")
                    .child(El::input("checkbox").id("phone-checkbox").attr("name", "phone").attr("value", "phone"))
                    .text("Phone"),
            ]),
        )
        .child(field(
            "How can we help you? *",
            El::new("textarea").id("open-text-area").attr("required", ""),
        ))
        .child(field("Attach a file", El::input("file").id("file-upload")))
        .child(El::new("button").attr("type", "submit").class("button").text("Send"));

    let body = El::new("body")
        .child(
            El::new("div")
                .id("white-background")
                .child(El::new("h1").id("title").text(TITLE))
                .child(form)
                .child(
                    El::new("p")
                        .id("privacy")
                        .child(El::link("privacy.html", "Privacy Policy").attr("target", "_blank")),
                ),
        )
        .child(
            El::new("span")
                .class("success")
                .hidden()
                .child(El::new("strong").text("Message successfully sent.")),
        )
        .child(
            El::new("span")
                .class("error")
                .hidden()
                .child(El::new("strong").text("Validate the required fields!")),
        );

    Document::new(url, TITLE, body).with_script(Arc::new(CscScript))
}

fn privacy(url: &str) -> Document {
    let body = El::new("body").child(
        El::new("div")
            .id("white-background")
            .class("privacy")
            .child(El::new("h1").id("title").text(PRIVACY_TITLE))
            .child(El::new("p").text("We do not save data submitted in the TAT CSC application form."))
            .child(El::new("p").text("We use HTML, CSS and JavaScript to simulate a real application."))
            .child(El::new("p").text("However, the application is a way to demonstrate what was learned."))
            .child(El::new("p").text("Talking About Testing")),
    );
    Document::new(url, PRIVACY_TITLE, body)
}

/// Form behavior of the CSC page
#[derive(Debug, Clone, Copy, Default)]
pub struct CscScript;

impl CscScript {
    fn set_visible(doc: &mut Document, selector: &str, visible: bool) {
        if let Ok(Some(node)) = doc.query(selector) {
            if visible {
                doc.show(node);
            } else {
                doc.hide(node);
            }
        }
    }
}

impl PageScript for CscScript {
    fn on_change(&self, doc: &mut Document, target: NodeId) {
        if doc.attr(target, "id") != Some("phone-checkbox") {
            return;
        }
        let required = doc.is_checked(target);
        if let Some(phone) = doc.by_id("phone") {
            if required {
                doc.set_attr(phone, "required", "");
            } else {
                doc.remove_attr(phone, "required");
            }
        }
        Self::set_visible(doc, ".phone-label-span", required);
        debug!(required, "phone requirement toggled");
    }

    fn on_submit(&self, doc: &mut Document, form: NodeId) -> SubmitDisposition {
        let valid = doc.form_is_valid(form);
        Self::set_visible(doc, ".success", valid);
        Self::set_visible(doc, ".error", !valid);
        debug!(valid, "form submitted");
        doc.set_timeout(MESSAGE_TIMEOUT, |doc| {
            Self::set_visible(doc, ".success", false);
            Self::set_visible(doc, ".error", false);
        });
        SubmitDisposition::Prevented
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn form_page() -> Document {
        site().load("memory://csc/src/index.html").unwrap()
    }

    fn node(doc: &Document, css: &str) -> NodeId {
        doc.query(css).unwrap().unwrap()
    }

    mod markup_tests {
        use super::*;

        #[test]
        fn test_paths_and_titles() {
            let site = site();
            assert_eq!(site.paths(), vec!["src/index.html", "src/privacy.html"]);
            assert_eq!(form_page().title(), TITLE);
            let privacy = site.load("memory://csc/src/privacy.html").unwrap();
            assert_eq!(privacy.title(), PRIVACY_TITLE);
            let container = node(&privacy, "#white-background.privacy");
            assert!(privacy
                .text(container)
                .contains("We do not save data submitted in the TAT CSC application form."));
        }

        #[test]
        fn test_banners_start_hidden() {
            let doc = form_page();
            assert!(!doc.is_visible(node(&doc, ".success")));
            assert!(!doc.is_visible(node(&doc, ".error")));
        }

        #[test]
        fn test_privacy_link_contract() {
            let doc = form_page();
            let link = node(&doc, "#privacy a");
            assert_eq!(doc.attr(link, "href"), Some("privacy.html"));
            assert_eq!(doc.attr(link, "target"), Some("_blank"));
        }

        #[test]
        fn test_product_options() {
            let doc = form_page();
            let product = node(&doc, "#product");
            let values: Vec<String> = doc
                .options(product)
                .into_iter()
                .map(|o| doc.option_value(o))
                .collect();
            assert_eq!(values, vec!["", "blog", "courses", "mentorship", "youtube"]);
        }
    }

    mod behavior_tests {
        use super::*;

        #[test]
        fn test_phone_checkbox_toggles_required() {
            let mut doc = form_page();
            let checkbox = node(&doc, "#phone-checkbox");
            let phone = node(&doc, "#phone");
            doc.user_set_checked(checkbox, true).unwrap();
            assert!(doc.attr(phone, "required").is_some());
            assert!(doc.is_visible(node(&doc, ".phone-label-span")));
            doc.user_set_checked(checkbox, false).unwrap();
            assert!(doc.attr(phone, "required").is_none());
        }

        #[test]
        fn test_empty_submit_shows_error() {
            let mut doc = form_page();
            let form = node(&doc, "form");
            doc.submit(form);
            assert!(doc.is_visible(node(&doc, ".error")));
            assert!(!doc.is_visible(node(&doc, ".success")));
            assert_eq!(doc.pending_timers(), 1);
        }

        #[test]
        fn test_valid_submit_shows_success() {
            let mut doc = form_page();
            for (css, value) in [
                ("#firstName", "First"),
                ("#lastName", "Last"),
                ("#email", "email@test.com"),
                ("#open-text-area", "Feedback"),
            ] {
                let id = node(&doc, css);
                doc.set_value(id, value);
            }
            let form = node(&doc, "form");
            doc.submit(form);
            assert!(doc.is_visible(node(&doc, ".success")));
            assert!(!doc.is_visible(node(&doc, ".error")));
        }

        #[tokio::test(start_paused = true)]
        async fn test_banner_hides_after_timeout() {
            let mut doc = form_page();
            let form = node(&doc, "form");
            doc.submit(form);
            tokio::time::sleep(MESSAGE_TIMEOUT).await;
            doc.run_due_timers();
            assert!(!doc.is_visible(node(&doc, ".error")));
        }
    }
}
