use relay_core::{Dispatch, OutboundMessage, Router};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Relay newline-delimited JSON messages from `input` through `router`,
/// writing replies to `output` as they settle.
///
/// Returns once `input` is exhausted and every in-flight request has been
/// answered. `router` must post to the sender paired with `replies`.
pub async fn run<R, W>(
    router: Router,
    replies: mpsc::UnboundedReceiver<OutboundMessage>,
    mut input: R,
    output: W,
) -> Result<W, String>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = tokio::spawn(writer_task(output, replies));

    let mut background: Vec<JoinHandle<()>> = Vec::new();
    let mut buf = Vec::new();
    let mut received = 0usize;
    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                log::error!("Failed to read inbound message: {}", e);
                break;
            }
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                log::warn!("Dropping inbound message that is not UTF-8: {}", e);
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        received += 1;
        // Pending dispatches settle through the outbox; only fire-and-forget
        // work needs tracking so it is not cut off at shutdown.
        if let Dispatch::Notified(Some(handle)) = router.dispatch_raw(line) {
            background.push(handle);
        }
        background.retain(|handle| !handle.is_finished());
    }
    log::info!("Input closed after {} message(s)", received);

    for handle in background {
        let _ = handle.await;
    }
    // The writer ends once the router and every pending reply have dropped
    // their senders.
    drop(router);
    writer
        .await
        .map_err(|e| format!("Reply writer failed: {}", e))?
}

async fn writer_task<W>(
    mut output: W,
    mut replies: mpsc::UnboundedReceiver<OutboundMessage>,
) -> Result<W, String>
where
    W: AsyncWrite + Unpin,
{
    let mut broken = false;
    while let Some(reply) = replies.recv().await {
        if broken {
            continue;
        }
        let mut line = match serde_json::to_vec(&reply) {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to serialize reply for '{}': {}", reply.request_id, e);
                continue;
            }
        };
        line.push(b'\n');
        if let Err(e) = write_line(&mut output, &line).await {
            log::error!("Failed to write reply: {}", e);
            broken = true;
        }
    }
    if broken {
        return Err("Reply channel closed by the embedded app".to_string());
    }
    Ok(output)
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &[u8]) -> std::io::Result<()> {
    output.write_all(line).await?;
    output.flush().await
}
