//! Command registry: named composite operations shared by every test case.
//!
//! The registry is built once during suite setup, frozen behind an `Arc` and
//! handed to each case. There is no global table; two runners can hold two
//! different registries in the same process.

use crate::page::Page;
use crate::result::{ProbeError, ProbeResult};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, debug_span, Instrument};

/// Named optional fields passed to a command
///
/// Absent fields mean "skip this step", which is different from a field set
/// to an empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandInput(Map<String, Value>);

impl CommandInput {
    /// Empty input
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Parse a JSON object
    pub fn from_json(json: &str) -> ProbeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build from any serializable record
    pub fn from_record<T: Serialize>(record: &T) -> ProbeResult<Self> {
        match serde_json::to_value(record)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ProbeError::InvalidArgument {
                action: "command input".into(),
                message: format!("expected an object, got {other}"),
            }),
        }
    }

    /// Raw field value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// String field value
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Supplied field names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// No fields supplied
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deserialize into a command's typed record
    pub fn parse<T: DeserializeOwned>(&self, command: &str) -> ProbeResult<T> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|e| ProbeError::CommandInput {
            command: command.to_string(),
            message: e.to_string(),
        })
    }
}

/// A named, reusable procedure over a page
#[async_trait]
pub trait Command: Send + Sync {
    /// Registry key
    fn name(&self) -> &str;

    /// One-line description for listings
    fn description(&self) -> &str {
        ""
    }

    /// Run against the current page
    async fn run(&self, page: &mut Page, input: Option<&CommandInput>) -> ProbeResult<()>;
}

type CommandFn =
    dyn for<'a> Fn(&'a mut Page, Option<&'a CommandInput>) -> BoxFuture<'a, ProbeResult<()>> + Send + Sync;

struct FnCommand {
    name: String,
    description: String,
    body: Box<CommandFn>,
}

#[async_trait]
impl Command for FnCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, page: &mut Page, input: Option<&CommandInput>) -> ProbeResult<()> {
        (self.body)(page, input).await
    }
}

/// Table of named commands
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Arc<dyn Command>>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

impl CommandRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command; names must be unique
    pub fn register(&mut self, command: impl Command + 'static) -> ProbeResult<()> {
        let name = command.name().to_string();
        if self.commands.contains_key(&name) {
            return Err(ProbeError::InvalidState {
                message: format!("command `{name}` is already registered"),
            });
        }
        debug!(command = %name, "register command");
        self.commands.insert(name, Arc::new(command));
        Ok(())
    }

    /// Add a closure command
    ///
    /// ```ignore
    /// registry.register_fn("clearName", "empties the name field", |page, _| {
    ///     Box::pin(async move {
    ///         page.get("#name").clear().await?;
    ///         Ok(())
    ///     })
    /// })?;
    /// ```
    pub fn register_fn<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        body: F,
    ) -> ProbeResult<()>
    where
        F: for<'a> Fn(&'a mut Page, Option<&'a CommandInput>) -> BoxFuture<'a, ProbeResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.register(FnCommand {
            name: name.into(),
            description: description.into(),
            body: Box::new(body),
        })
    }

    /// Look up a command
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    /// Is `name` registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    /// `(name, description)` pairs, sorted by name
    #[must_use]
    pub fn describe(&self) -> Vec<(&str, &str)> {
        self.commands
            .iter()
            .map(|(name, cmd)| (name.as_str(), cmd.description()))
            .collect()
    }

    /// Number of commands
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// No commands
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Run a command by name
    pub async fn invoke(
        &self,
        name: &str,
        page: &mut Page,
        input: Option<&CommandInput>,
    ) -> ProbeResult<()> {
        let command = self.get(name).ok_or_else(|| ProbeError::UnknownCommand {
            name: name.to_string(),
        })?;
        command
            .run(page, input)
            .instrument(debug_span!("command", name))
            .await
    }
}
