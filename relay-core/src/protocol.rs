use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Inbound: embedded content → host (sent via postMessage)
// ---------------------------------------------------------------------------

/// A message posted by the embedded app.
///
/// `request_id` is present iff the sender is waiting for a reply. Panel-style
/// messages use `type` instead of `command` as the discriminator, so either
/// key is accepted; `command` wins when both are sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireInbound")]
pub struct InboundMessage {
    pub command: String,
    pub params: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// An inbound message as it appears on the wire.
#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[schemars(title = "InboundMessage")]
struct WireInbound {
    #[serde(default)]
    command: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    request_id: Option<String>,
}

impl TryFrom<WireInbound> for InboundMessage {
    type Error = String;

    fn try_from(wire: WireInbound) -> Result<Self, Self::Error> {
        let command = wire
            .command
            .or(wire.kind)
            .ok_or_else(|| "message has neither `command` nor `type`".to_string())?;
        Ok(InboundMessage {
            command,
            params: wire.params,
            request_id: wire.request_id,
        })
    }
}

impl InboundMessage {
    /// A fire-and-forget message.
    pub fn notification(command: impl Into<String>, params: Value) -> Self {
        InboundMessage {
            command: command.into(),
            params,
            request_id: None,
        }
    }

    /// A message that expects exactly one reply tagged with `request_id`.
    pub fn request(
        command: impl Into<String>,
        params: Value,
        request_id: impl Into<String>,
    ) -> Self {
        InboundMessage {
            command: command.into(),
            params,
            request_id: Some(request_id.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound: host → embedded content
// ---------------------------------------------------------------------------

/// The reply to an [`InboundMessage`] that carried a `requestId`.
///
/// The body is an enum, so a reply always carries exactly one of `result` or
/// `error` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub request_id: String,
    #[serde(flatten)]
    pub body: ReplyBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplyBody {
    Result(Value),
    Error(String),
}

impl OutboundMessage {
    pub fn result(request_id: impl Into<String>, result: Value) -> Self {
        OutboundMessage {
            request_id: request_id.into(),
            body: ReplyBody::Result(result),
        }
    }

    pub fn error(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        OutboundMessage {
            request_id: request_id.into(),
            body: ReplyBody::Error(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, ReplyBody::Error(_))
    }

    /// Convert the body into the `Result` the waiting caller sees.
    pub fn into_result(self) -> Result<Value, String> {
        match self.body {
            ReplyBody::Result(value) => Ok(value),
            ReplyBody::Error(message) => Err(message),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure reasons
// ---------------------------------------------------------------------------

/// Turn a structured failure reported by a host command into the string sent
/// back as `error`: the `message` field when there is one, otherwise the
/// value itself (strings unquoted).
pub fn describe_failure(failure: &Value) -> String {
    if let Some(message) = failure.get("message").and_then(|m| m.as_str()) {
        return message.to_string();
    }
    match failure {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JSON Schema documents for both directions of the wire dialect.
///
/// "Exactly one of `result` or `error`" and "`command` or `type`" are
/// written out by hand as `oneOf`/`anyOf` over required keys, which derived
/// schemas do not express.
pub fn message_schemas() -> Value {
    let mut inbound =
        serde_json::to_value(schemars::schema_for!(WireInbound)).unwrap_or_default();
    if let Some(schema) = inbound.as_object_mut() {
        schema.insert(
            "anyOf".to_string(),
            serde_json::json!([
                { "required": ["command"] },
                { "required": ["type"] }
            ]),
        );
    }
    let outbound = serde_json::json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "OutboundMessage",
        "type": "object",
        "required": ["requestId"],
        "properties": {
            "requestId": { "type": "string" },
            "result": {},
            "error": { "type": "string" }
        },
        "oneOf": [
            { "required": ["result"] },
            { "required": ["error"] }
        ]
    });
    serde_json::json!({
        "inbound": inbound,
        "outbound": outbound,
    })
}
