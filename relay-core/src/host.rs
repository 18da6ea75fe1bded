use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a message shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageSeverity {
    Information,
    Warning,
    Error,
}

impl MessageSeverity {
    pub fn log_level(self) -> log::Level {
        match self {
            MessageSeverity::Information => log::Level::Info,
            MessageSeverity::Warning => log::Level::Warn,
            MessageSeverity::Error => log::Level::Error,
        }
    }
}

/// Options for a text input prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputBoxOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_holder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub password: bool,
}

impl InputBoxOptions {
    /// Build options from whatever the embedded app sent: a bare prompt
    /// string, an options object, or nothing.
    pub fn from_param(param: &Value) -> Self {
        match param {
            Value::String(prompt) => InputBoxOptions {
                prompt: Some(prompt.clone()),
                ..Default::default()
            },
            Value::Object(_) => serde_json::from_value(param.clone()).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed input box options: {}", e);
                InputBoxOptions::default()
            }),
            _ => InputBoxOptions::default(),
        }
    }
}

/// The capabilities of the surrounding host that handlers may invoke.
///
/// Passed to the router at construction so tests can substitute a fake.
/// Failures are reported as the string delivered to the embedded app.
#[async_trait]
pub trait HostActions: Send + Sync {
    /// Show a message to the user. Fire-and-forget.
    fn show_message(&self, severity: MessageSeverity, message: &str);

    /// Prompt for a line of text. `Ok(None)` means the prompt was dismissed.
    async fn show_input_box(&self, options: InputBoxOptions) -> Result<Option<String>, String>;

    /// Invoke a named host command with positional arguments.
    async fn execute_command(&self, command: &str, args: Vec<Value>) -> Result<Value, String>;
}
