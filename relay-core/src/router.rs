use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::correlation::{Outbox, Reply};
use crate::host::{HostActions, InputBoxOptions};
use crate::protocol::InboundMessage;
use crate::registry::{HandlerRegistry, HandlerSpec};

/// What happened to one inbound message.
#[derive(Debug)]
pub enum Dispatch {
    /// The input was not a valid message; dropped.
    Malformed,
    /// No handler for the command; dropped.
    Unknown,
    /// Handled without a reply. Holds the background task if the host action
    /// is asynchronous.
    Notified(Option<JoinHandle<()>>),
    /// A reply will be posted when the task finishes.
    Pending(JoinHandle<()>),
}

impl Dispatch {
    /// Wait for any background work started by the dispatch.
    pub async fn finished(self) {
        let handle = match self {
            Dispatch::Notified(Some(handle)) | Dispatch::Pending(handle) => handle,
            _ => return,
        };
        if let Err(e) = handle.await {
            log::error!("Handler task failed: {}", e);
        }
    }
}

/// Routes inbound messages to host actions and correlates replies.
///
/// Dispatching spawns onto the current Tokio runtime, so it must be called
/// from within one.
pub struct Router {
    registry: HandlerRegistry,
    host: Arc<dyn HostActions>,
    outbox: Outbox,
}

impl Router {
    pub fn new(registry: HandlerRegistry, host: Arc<dyn HostActions>, outbox: Outbox) -> Self {
        Router {
            registry,
            host,
            outbox,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Parse and dispatch one raw JSON message.
    pub fn dispatch_raw(&self, json: &str) -> Dispatch {
        match serde_json::from_str::<InboundMessage>(json) {
            Ok(message) => self.dispatch(message),
            Err(e) => {
                log::warn!("Failed to parse inbound message: {} (json: {})", e, json);
                Dispatch::Malformed
            }
        }
    }

    pub fn dispatch(&self, message: InboundMessage) -> Dispatch {
        let InboundMessage {
            command,
            params,
            request_id,
        } = message;

        let Some(spec) = self.registry.get(&command) else {
            log::warn!("Unknown command: {}", command);
            return Dispatch::Unknown;
        };
        log::debug!("Dispatching '{}' (request: {:?})", command, request_id);

        match spec {
            HandlerSpec::ShowMessage { severity } => {
                if let Some(id) = &request_id {
                    log::debug!("'{}' does not reply; ignoring request id '{}'", command, id);
                }
                self.host.show_message(*severity, &message_text(&params));
                Dispatch::Notified(None)
            }
            HandlerSpec::InputBox => {
                let options = InputBoxOptions::from_param(first_param(&params));
                let host = Arc::clone(&self.host);
                self.correlate(command, request_id, async move {
                    let entered = host.show_input_box(options).await?;
                    Ok::<_, String>(entered.map(Value::String).unwrap_or(Value::Null))
                })
            }
            HandlerSpec::ExecuteCommand {
                target,
                args,
                reply,
            } => {
                let args = args.extract(&params);
                let target = target.clone();
                let host = Arc::clone(&self.host);
                let action = async move { host.execute_command(&target, args).await };
                if *reply {
                    self.correlate(command, request_id, action)
                } else {
                    self.fire(command, action)
                }
            }
        }
    }

    /// Run `action` and reply with its outcome. The request id is moved into
    /// the task's own [`Reply`] before anything is awaited.
    fn correlate<F>(&self, command: String, request_id: Option<String>, action: F) -> Dispatch
    where
        F: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let Some(request_id) = request_id else {
            return self.fire(command, action);
        };
        let reply = Reply::new(request_id, self.outbox.clone());
        Dispatch::Pending(tokio::spawn(async move {
            let outcome = action.await;
            if let Err(e) = &outcome {
                log::debug!("'{}' failed for '{}': {}", command, reply.request_id(), e);
            }
            reply.settle(outcome);
        }))
    }

    fn fire<F>(&self, command: String, action: F) -> Dispatch
    where
        F: Future<Output = Result<Value, String>> + Send + 'static,
    {
        Dispatch::Notified(Some(tokio::spawn(async move {
            if let Err(e) = action.await {
                log::warn!("'{}' failed: {}", command, e);
            }
        })))
    }
}

/// The first positional parameter, or `params` itself when it is not a list.
fn first_param(params: &Value) -> &Value {
    match params {
        Value::Array(items) => items.first().unwrap_or(&Value::Null),
        other => other,
    }
}

fn message_text(params: &Value) -> String {
    match first_param(params) {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => match other.get("message").and_then(|m| m.as_str()) {
            Some(message) => message.to_string(),
            None => other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MessageSeverity;
    use crate::protocol::OutboundMessage;
    use crate::registry::ArgShape;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot};

    /// Records every call; command outcomes are scripted per command name and
    /// may be held back on a gate to control completion order.
    #[derive(Default)]
    struct FakeHost {
        messages: Mutex<Vec<(MessageSeverity, String)>>,
        prompts: Mutex<Vec<InputBoxOptions>>,
        calls: Mutex<Vec<(String, Vec<Value>)>>,
        input: Mutex<Option<Result<Option<String>, String>>>,
        outcomes: Mutex<HashMap<String, Result<Value, String>>>,
        gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl HostActions for FakeHost {
        fn show_message(&self, severity: MessageSeverity, message: &str) {
            self.messages.lock().push((severity, message.to_string()));
        }

        async fn show_input_box(
            &self,
            options: InputBoxOptions,
        ) -> Result<Option<String>, String> {
            self.prompts.lock().push(options);
            self.input.lock().clone().unwrap_or(Ok(None))
        }

        async fn execute_command(&self, command: &str, args: Vec<Value>) -> Result<Value, String> {
            self.calls.lock().push((command.to_string(), args));
            let gate = self.gates.lock().remove(command);
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.outcomes
                .lock()
                .get(command)
                .cloned()
                .unwrap_or(Ok(Value::Null))
        }
    }

    fn router_with(host: Arc<FakeHost>) -> (Router, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Router::new(HandlerRegistry::with_defaults(), host, tx), rx)
    }

    #[tokio::test]
    async fn input_box_resolves_with_entered_text() {
        let host = Arc::new(FakeHost::default());
        *host.input.lock() = Some(Ok(Some("Ada".into())));
        let (router, mut rx) = router_with(host.clone());

        router
            .dispatch_raw(r#"{"command":"showInputBox","params":["Enter name"],"requestId":"r1"}"#)
            .finished()
            .await;

        assert_eq!(rx.recv().await.unwrap(), OutboundMessage::result("r1", json!("Ada")));
        assert_eq!(host.prompts.lock()[0].prompt.as_deref(), Some("Enter name"));
    }

    #[tokio::test]
    async fn dismissed_input_box_resolves_null() {
        let host = Arc::new(FakeHost::default());
        let (router, mut rx) = router_with(host);

        router
            .dispatch(InboundMessage::request("showInputBox", json!([]), "r9"))
            .finished()
            .await;

        assert_eq!(rx.recv().await.unwrap(), OutboundMessage::result("r9", Value::Null));
    }

    #[tokio::test]
    async fn host_failure_becomes_error_reply() {
        let host = Arc::new(FakeHost::default());
        host.outcomes
            .lock()
            .insert("my-extension.sayHello".into(), Err("not found".into()));
        let (router, mut rx) = router_with(host.clone());

        router
            .dispatch(InboundMessage::request("sayHello", json!({"name": "Bob"}), "r2"))
            .finished()
            .await;

        assert_eq!(rx.recv().await.unwrap(), OutboundMessage::error("r2", "not found"));
        assert_eq!(
            host.calls.lock()[0],
            ("my-extension.sayHello".to_string(), vec![json!("Bob")])
        );
        drop(router);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn no_request_id_means_no_reply() {
        let host = Arc::new(FakeHost::default());
        *host.input.lock() = Some(Ok(Some("ignored".into())));
        let (router, mut rx) = router_with(host.clone());

        let dispatch = router.dispatch(InboundMessage::notification("showInputBox", json!(["?"])));
        assert!(matches!(dispatch, Dispatch::Notified(Some(_))));
        dispatch.finished().await;
        router
            .dispatch(InboundMessage::notification("getUserName", Value::Null))
            .finished()
            .await;

        drop(router);
        assert!(rx.recv().await.is_none());
        assert_eq!(host.prompts.lock().len(), 1);
        assert_eq!(host.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn fire_and_forget_ignores_request_id() {
        let host = Arc::new(FakeHost::default());
        let (router, mut rx) = router_with(host.clone());

        router
            .dispatch(InboundMessage::request("openFile", json!({"path": "/tmp/a.txt"}), "r5"))
            .finished()
            .await;
        router
            .dispatch(InboundMessage::request("showErrorMessage", json!(["bad"]), "r6"))
            .finished()
            .await;

        drop(router);
        assert!(rx.recv().await.is_none());
        assert_eq!(
            host.calls.lock()[0],
            ("vscode.open".to_string(), vec![json!("/tmp/a.txt")])
        );
        assert_eq!(
            host.messages.lock()[0],
            (MessageSeverity::Error, "bad".to_string())
        );
    }

    #[tokio::test]
    async fn unknown_command_is_dropped() {
        let host = Arc::new(FakeHost::default());
        let (router, mut rx) = router_with(host.clone());

        let dispatch = router.dispatch(InboundMessage::request("selfDestruct", json!([]), "r1"));
        assert!(matches!(dispatch, Dispatch::Unknown));

        drop(router);
        assert!(rx.recv().await.is_none());
        assert!(host.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn malformed_input_is_dropped() {
        let host = Arc::new(FakeHost::default());
        let (router, mut rx) = router_with(host);

        assert!(matches!(router.dispatch_raw("not json"), Dispatch::Malformed));
        assert!(matches!(
            router.dispatch_raw(r#"{"params":[],"requestId":"r1"}"#),
            Dispatch::Malformed
        ));

        drop(router);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn type_key_dispatches() {
        let host = Arc::new(FakeHost::default());
        let (router, _rx) = router_with(host.clone());

        router.dispatch_raw(r#"{"type":"showWarningMessage","params":{"message":"careful"}}"#);

        assert_eq!(
            host.messages.lock()[0],
            (MessageSeverity::Warning, "careful".to_string())
        );
    }

    #[tokio::test]
    async fn out_of_order_completion_keeps_pairing() {
        let host = Arc::new(FakeHost::default());
        host.outcomes.lock().insert("slow".into(), Ok(json!("first")));
        host.outcomes.lock().insert("fast".into(), Ok(json!("second")));
        let (release_slow, gate) = oneshot::channel();
        host.gates.lock().insert("slow".into(), gate);

        let mut registry = HandlerRegistry::new();
        for name in ["slow", "fast"] {
            registry
                .register(
                    name,
                    HandlerSpec::ExecuteCommand {
                        target: name.into(),
                        args: ArgShape::None,
                        reply: true,
                    },
                )
                .unwrap();
        }
        let (tx, mut rx) = mpsc::unbounded_channel();
        let router = Router::new(registry, host, tx);

        let slow = router.dispatch(InboundMessage::request("slow", Value::Null, "r1"));
        let fast = router.dispatch(InboundMessage::request("fast", Value::Null, "r2"));

        fast.finished().await;
        assert_eq!(rx.recv().await.unwrap(), OutboundMessage::result("r2", json!("second")));

        release_slow.send(()).unwrap();
        slow.finished().await;
        assert_eq!(rx.recv().await.unwrap(), OutboundMessage::result("r1", json!("first")));

        drop(router);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn every_request_gets_exactly_one_reply() {
        let host = Arc::new(FakeHost::default());
        host.outcomes.lock().insert("getUserName".into(), Ok(json!("ada")));
        let (router, mut rx) = router_with(host);

        let dispatches: Vec<Dispatch> = (0..20)
            .map(|i| router.dispatch(InboundMessage::request("getUserName", Value::Null, format!("r{i}"))))
            .collect();
        for dispatch in dispatches {
            dispatch.finished().await;
        }
        drop(router);

        let mut seen = Vec::new();
        while let Some(reply) = rx.recv().await {
            assert_eq!(reply.body, crate::protocol::ReplyBody::Result(json!("ada")));
            seen.push(reply.request_id);
        }
        seen.sort();
        let mut expected: Vec<String> = (0..20).map(|i| format!("r{i}")).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn aborted_request_still_replies() {
        let host = Arc::new(FakeHost::default());
        let (_never, gate) = oneshot::channel::<()>();
        host.gates.lock().insert("getUserName".into(), gate);
        let (router, mut rx) = router_with(host);

        let Dispatch::Pending(handle) =
            router.dispatch(InboundMessage::request("getUserName", Value::Null, "r1"))
        else {
            panic!("expected a pending dispatch");
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort();
        let _ = handle.await;

        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.request_id, "r1");
        assert!(reply.is_error());
    }

    #[test]
    fn message_text_shapes() {
        assert_eq!(message_text(&json!(["hi", "ignored"])), "hi");
        assert_eq!(message_text(&json!("hi")), "hi");
        assert_eq!(message_text(&json!({"message": "hi"})), "hi");
        assert_eq!(message_text(&Value::Null), "");
        assert_eq!(message_text(&json!([])), "");
        assert_eq!(message_text(&json!([7])), "7");
    }
}
