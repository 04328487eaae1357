//! The Customer Service Center suite.
//!
//! Every case starts from a freshly loaded `./src/index.html`.

use crate::csc_commands::{ContactRecord, FILL_MANDATORY_FIELDS_AND_SUBMIT};
use formprobe::{
    BoxFuture, CommandInput, ElementHandle, Expectation, Invocation, OptionMatch, ProbeResult,
    SelectFileOptions, Suite, TestContext, TypeOptions, ValueExpectation,
};
use std::time::Duration;

/// Suite name used in reports
pub const SUITE_NAME: &str = "Customer Service Center";

/// Entry document, relative to the target's base URL
pub const ENTRY_PATH: &str = "./src/index.html";

const SUBMIT: &str = "button[type=\"submit\"]";
const FIXTURE_PATH: &str = "fixtures/example.json";

/// All CSC cases in declaration order
#[must_use]
pub fn csc_suite() -> Suite {
    Suite::new(SUITE_NAME, ENTRY_PATH)
        .case("1-checks the application title", checks_title)
        .case("2.0-fills in the required fields and submits the form", submits_required_fields)
        .case("2.1-fills in with delay", types_long_text_instantly)
        .case(
            "2.2-displays an error message when submitting the form with an email with invalid formatting",
            rejects_invalid_email,
        )
        .case("2.3-validate field accept only number", phone_accepts_only_numbers)
        .case(
            "2.4-displays an error message when the phone becomes required but is not filled in before the form submission",
            requires_phone_when_checked,
        )
        .case("2.5-fills and clears fields", fills_and_clears_fields)
        .case(
            "2.6-displays an error message when submitting the form without filling the required fields",
            rejects_empty_form,
        )
        .case("2.7-using a custom command", submits_with_custom_command)
        .case("2.8-identify elements with contains", clicks_send_by_text)
        .case("2.9-edits a field with keyboard sequences", edits_with_key_sequences)
        .case("3.0-selects a product by its content", selects_product_by_text)
        .case("3.1-selects a product by its value", selects_product_by_value)
        .case("3.2-selects a product by its index", selects_product_by_index)
        .case("4.0-checks the type of service \"Feedback\"", checks_feedback_radio)
        .case("4.1-checks each type of service", checks_each_service_type)
        .case("5.0-checks both checkboxes, then unchecks the last one", checks_and_unchecks_boxes)
        .case(
            "5.1-displays an error message when the phone becomes required but is not filled in",
            requires_phone_after_custom_command,
        )
        .case("6.0-selects a file from the fixtures folder", selects_fixture_file)
        .case("6.1-selects a file simulating a drag-and-drop", drags_fixture_file)
        .case("6.2-selects a file using a fixture alias", selects_aliased_fixture)
        .case(
            "7.0-verifies that the page opens in another tab without the need for a click",
            privacy_link_opens_new_tab,
        )
        .case(
            "7.1-access the page by removing the target, then clicking on the link",
            opens_privacy_in_same_tab,
        )
        .case("7.2-independently test the page", checks_privacy_page)
        .case("7.3-clicking the link keeps the form page active", blank_target_keeps_form)
        .case("8.0-hides the success message after three seconds", success_message_expires)
}

async fn fill_mandatory_fields(ctx: &mut TestContext) -> ProbeResult<()> {
    ctx.get("#firstName").type_text("First").await?;
    ctx.get("#lastName").type_text("Last").await?;
    ctx.get("#email").type_text("email@test.com").await?;
    ctx.get("#open-text-area").type_text("Feedback").await?;
    Ok(())
}

fn first_file_is_example(handle: &ElementHandle) -> Result<(), String> {
    let name = handle
        .first()
        .and_then(|input| input.files.first())
        .map(|file| file.name.as_str());
    match name {
        Some("example.json") => Ok(()),
        other => Err(format!("first file is {other:?}")),
    }
}

fn checks_title(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.title()
            .should(ValueExpectation::contain("TAT Customer Service Center"))
            .await?;
        Ok(())
    })
}

fn submits_required_fields(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        fill_mandatory_fields(ctx).await?;
        ctx.get(SUBMIT).click().await?;
        ctx.get(".success").should(Expectation::visible()).await?;
        Ok(())
    })
}

fn types_long_text_instantly(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        let long_text = "abcdefghijklmnopqrstuvwxyz".repeat(20);
        ctx.get("#open-text-area")
            .type_with(&long_text, TypeOptions::instant())
            .await?
            .should(Expectation::value(long_text.clone()))
            .await?;
        Ok(())
    })
}

fn rejects_invalid_email(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.get("#firstName").type_text("First").await?;
        ctx.get("#lastName").type_text("Last").await?;
        ctx.get("#email").type_text("email.test.com").await?;
        ctx.get("#open-text-area").type_text("Feedback").await?;
        ctx.get(SUBMIT).click().await?;
        ctx.get(".error").should(Expectation::visible()).await?;
        Ok(())
    })
}

fn phone_accepts_only_numbers(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.get("#phone")
            .type_text("abc")
            .await?
            .should(Expectation::value(""))
            .await?;
        Ok(())
    })
}

fn requires_phone_when_checked(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        fill_mandatory_fields(ctx).await?;
        ctx.get("#phone-checkbox").check().await?;
        ctx.get(SUBMIT).click().await?;
        ctx.get(".error").should(Expectation::visible()).await?;
        Ok(())
    })
}

fn fills_and_clears_fields(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        for (selector, text) in [
            ("#firstName", "First"),
            ("#lastName", "Last"),
            ("#email", "email@test.com"),
        ] {
            ctx.get(selector)
                .type_text(text)
                .await?
                .should(Expectation::value(text))
                .await?
                .clear()
                .await?
                .should(Expectation::value(""))
                .await?;
        }
        Ok(())
    })
}

fn rejects_empty_form(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.get(SUBMIT).click().await?;
        ctx.get(".error").should(Expectation::visible()).await?;
        Ok(())
    })
}

fn submits_with_custom_command(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        let data = CommandInput::from_record(&ContactRecord {
            first_name: Some("First".into()),
            last_name: Some("Last".into()),
            email: Some("email@test.com".into()),
            feedback: Some("Feedback".into()),
        })?;
        ctx.command(FILL_MANDATORY_FIELDS_AND_SUBMIT, Some(&data)).await?;
        ctx.get(".success").should(Expectation::visible()).await?;
        Ok(())
    })
}

fn clicks_send_by_text(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.contains("button", "Send").click().await?;
        ctx.get(".error").should(Expectation::visible()).await?;
        Ok(())
    })
}

fn edits_with_key_sequences(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.get("#firstName")
            .type_text("Frist{selectall}First")
            .await?
            .should(Expectation::value("First"))
            .await?
            .type_text("s{backspace}")
            .await?
            .should(Expectation::value("First"))
            .await?;
        Ok(())
    })
}

fn selects_product_by_text(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.get("#product")
            .select("YouTube")
            .await?
            .should(Expectation::value("youtube"))
            .await?;
        Ok(())
    })
}

fn selects_product_by_value(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.get("#product")
            .select(OptionMatch::Value("mentorship".into()))
            .await?
            .should(Expectation::value("mentorship"))
            .await?;
        Ok(())
    })
}

fn selects_product_by_index(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.get("#product")
            .select(1usize)
            .await?
            .should(Expectation::value("blog"))
            .await?;
        Ok(())
    })
}

fn checks_feedback_radio(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.get("input[type=\"radio\"][value=\"feedback\"]")
            .check()
            .await?
            .should(Expectation::checked())
            .await?;
        Ok(())
    })
}

fn checks_each_service_type(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        let total = ctx
            .get("#support-type")
            .find("input[type=\"radio\"]")
            .count()
            .await?;
        for index in 0..total {
            ctx.get("#support-type")
                .find("input[type=\"radio\"]")
                .eq(index)
                .check()
                .await?
                .should(Expectation::checked())
                .await?;
        }
        ctx.get("#support-type input:checked")
            .should(Expectation::length(1))
            .await?;
        Ok(())
    })
}

fn checks_and_unchecks_boxes(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.get("input[type=\"checkbox\"]")
            .check()
            .await?
            .should(Expectation::checked())
            .await?
            .last()
            .uncheck()
            .await?
            .should(Expectation::not_checked())
            .await?;
        Ok(())
    })
}

fn requires_phone_after_custom_command(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.command(FILL_MANDATORY_FIELDS_AND_SUBMIT, None).await?;
        ctx.get("#phone-checkbox").check().await?;
        ctx.get(SUBMIT).click().await?;
        ctx.get(".error").should(Expectation::visible()).await?;
        Ok(())
    })
}

fn selects_fixture_file(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.get("#file-upload")
            .select_file(FIXTURE_PATH)
            .await?
            .should(Expectation::satisfy("first file is example.json", first_file_is_example))
            .await?;
        Ok(())
    })
}

fn drags_fixture_file(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.get("#file-upload")
            .select_file_with(FIXTURE_PATH, SelectFileOptions::drag_drop())
            .await?
            .should(Expectation::file_name(0, "example.json"))
            .await?;
        Ok(())
    })
}

fn selects_aliased_fixture(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.fixture("example.json")?.as_alias("sampleFile");
        ctx.get("#file-upload")
            .select_file("@sampleFile")
            .await?
            .should(Expectation::file_name(0, "example.json"))
            .await?;
        Ok(())
    })
}

fn privacy_link_opens_new_tab(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.get("#privacy a")
            .should(Expectation::attr_value("href", "privacy.html"))
            .await?
            .and(Expectation::attr_value("target", "_blank"))
            .await?;
        Ok(())
    })
}

fn opens_privacy_in_same_tab(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.contains("a", "Privacy Policy")
            .invoke(Invocation::parse("removeAttr", &["target"])?)
            .await?
            .click()
            .await?;
        ctx.contains("h1", "TAT CSC - Privacy Policy")
            .should(Expectation::visible())
            .await?;
        Ok(())
    })
}

fn checks_privacy_page(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.contains("a", "Privacy Policy")
            .invoke(Invocation::RemoveAttr("target".into()))
            .await?
            .follow_link()
            .await?;
        ctx.url().should(ValueExpectation::contain("privacy.html")).await?;
        ctx.contains("h1", "TAT CSC - Privacy Policy")
            .should(Expectation::visible())
            .await?;
        ctx.get("#white-background.privacy")
            .should(Expectation::contain_text(
                "We do not save data submitted in the TAT CSC application form.",
            ))
            .await?;
        ctx.contains("p", "Talking About Testing")
            .should(Expectation::visible())
            .await?;
        Ok(())
    })
}

fn blank_target_keeps_form(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.get("#privacy a").click().await?;
        ctx.url().should(ValueExpectation::contain("index.html")).await?;
        ctx.title()
            .should(ValueExpectation::one_of(["TAT Customer Service Center"]))
            .await?;
        ctx.get("#firstName").should(Expectation::visible()).await?;
        Ok(())
    })
}

fn success_message_expires(ctx: &mut TestContext) -> BoxFuture<'_, ProbeResult<()>> {
    Box::pin(async move {
        ctx.command(FILL_MANDATORY_FIELDS_AND_SUBMIT, None).await?;
        ctx.get(".success")
            .should(Expectation::visible())
            .await?
            .should_within(Expectation::not_visible(), Duration::from_secs(5))
            .await?;
        Ok(())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_order_and_names() {
        let suite = csc_suite();
        assert_eq!(suite.name(), SUITE_NAME);
        assert_eq!(suite.entry_url(), ENTRY_PATH);
        let names = suite.names();
        assert_eq!(names.first().copied(), Some("1-checks the application title"));
        assert!(names.iter().any(|n| n.starts_with("6.2-")));
        let mut unique = names.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_file_check() {
        use formprobe::{ElementState, FileInfo, Selector};
        let input = ElementState {
            tag: "input".into(),
            files: vec![FileInfo {
                name: "example.json".into(),
                mime_type: "application/json".into(),
                size: 10,
            }],
            ..ElementState::default()
        };
        let handle = ElementHandle::new(Selector::css("#file-upload"), vec![input]);
        assert!(first_file_is_example(&handle).is_ok());
        let empty = ElementHandle::new(Selector::css("#file-upload"), vec![]);
        assert!(first_file_is_example(&empty).is_err());
    }
}
