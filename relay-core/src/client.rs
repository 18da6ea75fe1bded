//! The embedded content's side of the bridge.
//!
//! Issues requests with fresh ids and resolves each waiting caller when the
//! reply with its id comes back. Replies may arrive in any order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::protocol::{InboundMessage, OutboundMessage};

type PendingReplies = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, String>>>>>;

/// Removes a call's pending entry unless the call completed.
struct PendingGuard {
    pending: PendingReplies,
    request_id: String,
    armed: bool,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.armed {
            self.pending.lock().remove(&self.request_id);
        }
    }
}

#[derive(Clone)]
pub struct RelayClient {
    sender: mpsc::UnboundedSender<InboundMessage>,
    pending: PendingReplies,
    timeout: Option<Duration>,
}

impl RelayClient {
    pub fn new(sender: mpsc::UnboundedSender<InboundMessage>) -> Self {
        RelayClient {
            sender,
            pending: Arc::new(Mutex::new(HashMap::new())),
            timeout: None,
        }
    }

    /// Give up on calls that have not been answered within `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send `command` and wait for its reply.
    ///
    /// Dropping the returned future before the reply arrives forgets the
    /// request, so a late reply is ignored.
    pub async fn call(&self, command: &str, params: Value) -> Result<Value, String> {
        let request_id = uuid::Uuid::new_v4().to_string();

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id.clone(), tx);
        let mut waiting = PendingGuard {
            pending: Arc::clone(&self.pending),
            request_id: request_id.clone(),
            armed: true,
        };

        let message = InboundMessage::request(command, params, request_id);
        if self.sender.send(message).is_err() {
            return Err("Relay channel closed".to_string());
        }

        let received = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    return Err(format!(
                        "Request '{}' timed out after {}ms",
                        command,
                        limit.as_millis()
                    ));
                }
            },
            None => rx.await,
        };
        waiting.armed = false;
        received.map_err(|_| "Request cancelled".to_string())?
    }

    /// Send `command` without asking for a reply.
    pub fn notify(&self, command: &str, params: Value) -> Result<(), String> {
        self.sender
            .send(InboundMessage::notification(command, params))
            .map_err(|_| "Relay channel closed".to_string())
    }

    /// Resolve the caller waiting on `reply.request_id`. Returns `false` if
    /// nobody was waiting for it.
    pub fn handle_reply(&self, reply: OutboundMessage) -> bool {
        let waiter = self.pending.lock().remove(&reply.request_id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(reply.into_result());
                true
            }
            None => {
                log::warn!("Reply for unknown request '{}' ignored", reply.request_id);
                false
            }
        }
    }

    /// Parse a raw reply and resolve its caller.
    pub fn handle_raw_reply(&self, json: &str) -> bool {
        match serde_json::from_str::<OutboundMessage>(json) {
            Ok(reply) => self.handle_reply(reply),
            Err(e) => {
                log::warn!("Failed to parse reply: {} (json: {})", e, json);
                false
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Fail every outstanding call, e.g. when the channel to the host closes.
    pub fn cancel_all(&self, reason: &str) {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        if !drained.is_empty() {
            log::warn!("Cancelling {} pending request(s): {}", drained.len(), reason);
        }
        for (_, tx) in drained {
            let _ = tx.send(Err(reason.to_string()));
        }
    }
}
