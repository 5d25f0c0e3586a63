use super::Frame;
use super::Garrison;
use super::Router;
use super::envelope;
use futures::StreamExt;
use skr_core::AUTH_DEADLINE;
use skr_core::Seq;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;

/// Pair one WebSocket with its router and outbound queue.
///
/// The task serializes everything for this connection: inbound frames run
/// through the [`Router`], queued [`Frame`]s are stamped with the
/// strictly-increasing per-connection `seq` and written out, and the
/// 5-second auth deadline is one more select arm. Registration happens
/// here; teardown (grace timers included) happens when the loop exits.
pub async fn bridge(
    garrison: Arc<Garrison>,
    mut session: actix_ws::Session,
    mut stream: actix_ws::MessageStream,
) -> anyhow::Result<()> {
    let (tx, mut rx) = unbounded_channel();
    let conn = garrison.register(tx.clone()).await;
    let mut router = Router::new(garrison, conn, tx);
    log::debug!("[bridge {}] connected", conn);
    actix_web::rt::spawn(async move {
        let mut seq: Seq = 0;
        let mut auth_fired = false;
        let auth_deadline = tokio::time::Instant::now() + AUTH_DEADLINE;
        'sesh: loop {
            tokio::select! {
                biased;
                frame = rx.recv() => match frame {
                    Some(Frame::Message { message, req_seq, success, error }) => {
                        seq += 1;
                        let out = envelope(message, seq, req_seq, success, error);
                        if session.text(out.to_json()).await.is_err() {
                            break 'sesh;
                        }
                    }
                    Some(Frame::Close { code, reason }) => {
                        let reason = actix_ws::CloseReason {
                            code: actix_ws::CloseCode::Other(code),
                            description: Some(reason.to_string()),
                        };
                        let _ = session.close(Some(reason)).await;
                        break 'sesh;
                    }
                    None => break 'sesh,
                },
                msg = stream.next() => match msg {
                    Some(Ok(actix_ws::Message::Text(text))) => router.handle(&text).await,
                    Some(Ok(actix_ws::Message::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() {
                            break 'sesh;
                        }
                    }
                    Some(Ok(actix_ws::Message::Close(_))) => break 'sesh,
                    Some(Err(_)) => break 'sesh,
                    None => break 'sesh,
                    _ => continue 'sesh,
                },
                _ = tokio::time::sleep_until(auth_deadline),
                    if !auth_fired && !router.authenticated() => {
                    auth_fired = true;
                    router.auth_timeout();
                }
            }
        }
        router.closed().await;
        log::debug!("[bridge {}] disconnected", conn);
    });
    Ok(())
}
