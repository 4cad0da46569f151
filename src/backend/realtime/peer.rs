//! Per-connection outbound queue
//!
//! Every socket gets a bounded queue drained by its own writer task. The
//! hubs only ever `try_send` into that queue, so a slow or stalled client
//! fills its own queue and gets dropped instead of holding up delivery to
//! everybody else.

use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Identity of one live connection
pub type PeerId = Uuid;

/// One serialized text frame
pub type Frame = Utf8Bytes;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("outbound queue is full")]
    Full,
    #[error("connection is closed")]
    Closed,
}

/// Sending half of a connection, held by hubs
#[derive(Clone)]
pub struct Peer {
    id: PeerId,
    user_id: Uuid,
    outbound: mpsc::Sender<Frame>,
    closed: Arc<watch::Sender<bool>>,
}

/// Receiving half of a connection, owned by its writer task
pub struct PeerOutbox {
    frames: mpsc::Receiver<Frame>,
    closed: watch::Receiver<bool>,
}

impl Peer {
    /// Create a connection for `user_id` with room for `capacity` queued frames
    pub fn channel(user_id: Uuid, capacity: usize) -> (Peer, PeerOutbox) {
        let (outbound, frames) = mpsc::channel(capacity.max(1));
        let (closed, closed_rx) = watch::channel(false);
        let peer = Peer {
            id: Uuid::new_v4(),
            user_id,
            outbound,
            closed: Arc::new(closed),
        };
        (
            peer,
            PeerOutbox {
                frames,
                closed: closed_rx,
            },
        )
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Queue a frame without waiting
    pub fn send(&self, frame: Frame) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.outbound.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Ask both connection tasks to stop
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow() || self.outbound.is_closed()
    }

    /// Resolves once `close` has been called
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl PeerOutbox {
    /// Next queued frame; `None` once the peer is closed or every sender is gone
    pub async fn next(&mut self) -> Option<Frame> {
        if *self.closed.borrow() {
            return None;
        }
        tokio::select! {
            biased;
            () = wait_closed(&mut self.closed) => None,
            frame = self.frames.recv() => frame,
        }
    }

    /// Next queued frame if one is ready
    pub fn try_next(&mut self) -> Option<Frame> {
        self.frames.try_recv().ok()
    }

    /// Drain every ready frame as text
    pub fn drain_text(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(frame) = self.try_next() {
            frames.push(frame.as_str().to_string());
        }
        frames
    }
}

/// Resolves once the close flag is set or its sender is gone
pub async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}
