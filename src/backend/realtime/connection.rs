/**
 * WebSocket Connection Pump
 *
 * Runs one upgraded socket: a writer task drains the connection's outbox
 * into the socket while the calling task reads client frames and hands the
 * text ones to a `FrameHandler`, one at a time and in arrival order.
 *
 * Either side ending closes the peer, which stops the other side. Returns
 * once both have finished; unregistering from hubs is the caller's job.
 */
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::peer::{wait_closed, Peer, PeerOutbox};

/// Processes decoded-to-text client frames of one connection
#[async_trait]
pub trait FrameHandler: Send + Sync {
    async fn on_frame(&self, frame: &str);
}

pub async fn run_connection<H: FrameHandler>(socket: WebSocket, peer: Peer, mut outbox: PeerOutbox, handler: &H) {
    let (mut sink, mut stream) = socket.split();

    let writer_peer = peer.clone();
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbox.next().await {
            if let Err(err) = sink.send(Message::Text(frame)).await {
                tracing::debug!("[Realtime] Write to {} failed: {}", writer_peer.id(), err);
                break;
            }
        }
        writer_peer.close();
        let _ = sink.send(Message::Close(None)).await;
    });

    let mut closed = peer.closed_signal();
    loop {
        let message = tokio::select! {
            () = wait_closed(&mut closed) => break,
            message = stream.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => handler.on_frame(text.as_str()).await,
            Some(Ok(Message::Binary(_))) => {
                tracing::warn!("[Realtime] Ignoring binary frame from {}", peer.user_id());
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(err)) => {
                tracing::debug!("[Realtime] Read from {} failed: {}", peer.id(), err);
                break;
            }
        }
    }

    peer.close();
    if let Err(err) = writer.await {
        tracing::warn!("[Realtime] Writer task of {} ended abnormally: {}", peer.id(), err);
    }
}
