//! Reusable commands for the CSC suite.

use async_trait::async_trait;
use formprobe::{Command, CommandInput, CommandRegistry, Page, ProbeResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the fill-and-submit command
pub const FILL_MANDATORY_FIELDS_AND_SUBMIT: &str = "fillMandatoryFieldsAndSubmit";

/// The mandatory fields of the CSC form; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContactRecord {
    /// `#firstName`
    pub first_name: Option<String>,
    /// `#lastName`
    pub last_name: Option<String>,
    /// `#email`
    pub email: Option<String>,
    /// `#open-text-area`
    pub feedback: Option<String>,
}

impl ContactRecord {
    /// A record that passes validation
    #[must_use]
    pub fn sample() -> Self {
        Self {
            first_name: Some("John".into()),
            last_name: Some("Doe".into()),
            email: Some("johndoe@example.com".into()),
            feedback: Some("Test.".into()),
        }
    }

    fn fields(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("#firstName", self.first_name.as_deref()),
            ("#lastName", self.last_name.as_deref()),
            ("#email", self.email.as_deref()),
            ("#open-text-area", self.feedback.as_deref()),
        ]
    }
}

/// Types the supplied mandatory fields, then clicks Send
///
/// Without input it fills in [`ContactRecord::sample`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FillMandatoryFieldsAndSubmit;

#[async_trait]
impl Command for FillMandatoryFieldsAndSubmit {
    fn name(&self) -> &str {
        FILL_MANDATORY_FIELDS_AND_SUBMIT
    }

    fn description(&self) -> &str {
        "types the mandatory fields that were supplied, then submits the form"
    }

    async fn run(&self, page: &mut Page, input: Option<&CommandInput>) -> ProbeResult<()> {
        let record = match input {
            Some(input) => input.parse::<ContactRecord>(self.name())?,
            None => ContactRecord::sample(),
        };
        for (selector, value) in record.fields() {
            match value {
                Some(text) => {
                    page.get(selector).type_text(text).await?;
                }
                None => debug!(selector, "field not supplied, skipped"),
            }
        }
        page.get("button[type=\"submit\"]").click().await?;
        Ok(())
    }
}

/// Registry with every CSC command
pub fn registry() -> ProbeResult<CommandRegistry> {
    let mut registry = CommandRegistry::new();
    registry.register(FillMandatoryFieldsAndSubmit)?;
    Ok(registry)
}
