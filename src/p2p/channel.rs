//! Point-to-point channel between the two parties
//!
//! A channel is assumed to be ordered and already authenticated. It carries
//! exactly one peer, so there is no addressing on `send`.

use crate::error::{DiceError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

use super::message::DiceMessage;

/// State label reported by a channel-level timeout before a session re-tags it
pub const RECEIVE_STATE: &str = "receive";

/// Ordered message transport to a single authenticated peer
#[async_trait]
pub trait Channel: Send {
    /// Send one message to the peer
    async fn send(&mut self, message: DiceMessage) -> Result<()>;

    /// Wait at most `timeout` for the next message
    async fn receive(&mut self, timeout: Duration) -> Result<DiceMessage>;
}

/// In-process channel half, used for tests and the `local` command
#[derive(Debug)]
pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<DiceMessage>,
    rx: mpsc::UnboundedReceiver<DiceMessage>,
}

impl MemoryChannel {
    /// Create two connected halves
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();

        (
            MemoryChannel { tx: a_tx, rx: a_rx },
            MemoryChannel { tx: b_tx, rx: b_rx },
        )
    }

    /// Take a message if one is already queued
    pub fn try_receive(&mut self) -> Option<DiceMessage> {
        self.rx.try_recv().ok()
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn send(&mut self, message: DiceMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| DiceError::Transport("peer half dropped".to_string()))
    }

    async fn receive(&mut self, timeout: Duration) -> Result<DiceMessage> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(DiceError::Transport("peer half dropped".to_string())),
            Err(_) => Err(DiceError::Timeout {
                state: RECEIVE_STATE.to_string(),
                after: timeout,
            }),
        }
    }
}
