use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::host::MessageSeverity;

/// How a command's `params` become the arguments of a host command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArgShape {
    /// The host command takes no arguments; `params` is ignored.
    None,
    /// `params` is the argument list (a non-array value is a single argument).
    Positional,
    /// Pick these fields, in order, out of a `params` object.
    Named(Vec<String>),
}

impl ArgShape {
    pub fn extract(&self, params: &Value) -> Vec<Value> {
        match self {
            ArgShape::None => Vec::new(),
            ArgShape::Positional => match params {
                Value::Array(items) => items.clone(),
                Value::Null => Vec::new(),
                other => vec![other.clone()],
            },
            ArgShape::Named(names) => names
                .iter()
                .map(|name| params.get(name).cloned().unwrap_or(Value::Null))
                .collect(),
        }
    }
}

/// What a command does when the embedded app sends it.
///
/// Each variant fixes its parameter shape and whether it produces a result;
/// only result-producing handlers ever reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HandlerSpec {
    /// Show `params[0]` (or `params.message`) to the user.
    ShowMessage { severity: MessageSeverity },
    /// Prompt for text; replies with the entered string or `null`.
    InputBox,
    /// Forward to the named host command.
    #[serde(rename_all = "camelCase")]
    ExecuteCommand {
        target: String,
        #[serde(default = "default_arg_shape")]
        args: ArgShape,
        #[serde(default)]
        reply: bool,
    },
}

fn default_arg_shape() -> ArgShape {
    ArgShape::Positional
}

impl HandlerSpec {
    pub fn produces_result(&self) -> bool {
        match self {
            HandlerSpec::ShowMessage { .. } => false,
            HandlerSpec::InputBox => true,
            HandlerSpec::ExecuteCommand { reply, .. } => *reply,
        }
    }

    fn execute(target: &str, args: ArgShape, reply: bool) -> Self {
        HandlerSpec::ExecuteCommand {
            target: target.to_string(),
            args,
            reply,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("command '{0}' is already registered")]
    Duplicate(String),
    #[error("command name must not be empty")]
    EmptyName,
}

/// Command name → handler. Names are unique.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerSpec>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The commands every embedded app can rely on.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults = [
            (
                "showInformationMessage",
                HandlerSpec::ShowMessage {
                    severity: MessageSeverity::Information,
                },
            ),
            (
                "showWarningMessage",
                HandlerSpec::ShowMessage {
                    severity: MessageSeverity::Warning,
                },
            ),
            (
                "showErrorMessage",
                HandlerSpec::ShowMessage {
                    severity: MessageSeverity::Error,
                },
            ),
            ("showInputBox", HandlerSpec::InputBox),
            (
                "openFile",
                HandlerSpec::execute("vscode.open", ArgShape::Named(vec!["path".into()]), false),
            ),
            (
                "sayHello",
                HandlerSpec::execute(
                    "my-extension.sayHello",
                    ArgShape::Named(vec!["name".into()]),
                    true,
                ),
            ),
            (
                "getUserName",
                HandlerSpec::execute("getUserName", ArgShape::None, true),
            ),
        ];
        for (name, spec) in defaults {
            registry.handlers.insert(name.to_string(), spec);
        }
        registry
    }

    /// Add a handler; fails if the name is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        spec: HandlerSpec,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.handlers.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.handlers.insert(name, spec);
        Ok(())
    }

    /// Add or replace a handler, returning the one it displaced.
    pub fn insert(&mut self, name: impl Into<String>, spec: HandlerSpec) -> Option<HandlerSpec> {
        let name = name.into();
        let previous = self.handlers.insert(name.clone(), spec);
        if previous.is_some() {
            log::info!("Handler for '{}' overridden", name);
        }
        previous
    }

    pub fn remove(&mut self, name: &str) -> Option<HandlerSpec> {
        self.handlers.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&HandlerSpec> {
        self.handlers.get(name)
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
