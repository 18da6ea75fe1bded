use serde_json::Value;
use tokio::sync::mpsc;

use crate::protocol::OutboundMessage;

/// Posts replies back to the embedded content.
pub type Outbox = mpsc::UnboundedSender<OutboundMessage>;

/// Error posted when a reply is dropped without being settled.
pub const DROPPED_REPLY: &str = "Host dropped the request before it completed";

/// The continuation for one request, created when the request is dispatched.
///
/// Owns its `request_id`, so concurrent requests never share correlation
/// state. Settling consumes the reply; dropping it unsettled posts
/// [`DROPPED_REPLY`] so the waiting caller is never left hanging.
#[derive(Debug)]
pub struct Reply {
    request_id: String,
    outbox: Outbox,
    settled: bool,
}

impl Reply {
    pub fn new(request_id: impl Into<String>, outbox: Outbox) -> Self {
        Reply {
            request_id: request_id.into(),
            outbox,
            settled: false,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn resolve(self, result: Value) {
        let message = OutboundMessage::result(self.request_id.clone(), result);
        self.post(message);
    }

    pub fn reject(self, error: impl Into<String>) {
        let message = OutboundMessage::error(self.request_id.clone(), error);
        self.post(message);
    }

    /// Settle from the outcome of a host action.
    pub fn settle(self, outcome: Result<Value, String>) {
        match outcome {
            Ok(result) => self.resolve(result),
            Err(error) => self.reject(error),
        }
    }

    fn post(mut self, message: OutboundMessage) {
        self.settled = true;
        send(&self.outbox, message);
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if !self.settled {
            log::warn!("Request '{}' dropped unsettled", self.request_id);
            send(
                &self.outbox,
                OutboundMessage::error(self.request_id.clone(), DROPPED_REPLY),
            );
        }
    }
}

fn send(outbox: &Outbox, message: OutboundMessage) {
    let request_id = message.request_id.clone();
    if outbox.send(message).is_err() {
        log::warn!(
            "Outbound channel closed, reply for '{}' discarded",
            request_id
        );
    }
}
