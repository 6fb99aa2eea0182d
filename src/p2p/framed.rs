//! Length-delimited JSON framing over any async byte stream

use crate::error::{DiceError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use super::channel::{Channel, RECEIVE_STATE};
use super::message::DiceMessage;

/// Largest frame accepted from a peer
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Codec shared by the client channel and the responder node:
/// 4-byte big-endian length prefix, then the JSON message
pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}

/// Decode a received frame, treating garbage as a protocol violation
pub fn decode_frame(frame: &[u8]) -> Result<DiceMessage> {
    DiceMessage::from_bytes(frame)
        .map_err(|e| DiceError::protocol(RECEIVE_STATE, "well-formed message", e))
}

/// Channel over a framed byte stream
pub struct FramedChannel<T> {
    framed: Framed<T, LengthDelimitedCodec>,
}

/// Channel over a TCP connection
pub type TcpChannel = FramedChannel<TcpStream>;

impl<T> FramedChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(io: T) -> Self {
        Self {
            framed: Framed::new(io, frame_codec()),
        }
    }
}

impl FramedChannel<TcpStream> {
    /// Connect to a responder node
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| DiceError::Transport(format!("connect {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        tracing::debug!("Connected to {}", addr);
        Ok(Self::new(stream))
    }
}

#[async_trait]
impl<T> Channel for FramedChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, message: DiceMessage) -> Result<()> {
        let data = message.to_bytes()?;
        let len = data.len();
        self.framed
            .send(Bytes::from(data))
            .await
            .map_err(|e| DiceError::Transport(e.to_string()))?;
        tracing::debug!("Sent {} frame ({} bytes)", message.kind(), len);
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<DiceMessage> {
        let frame = match tokio::time::timeout(timeout, self.framed.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => return Err(DiceError::Transport(e.to_string())),
            Ok(None) => {
                return Err(DiceError::Transport(
                    "connection closed by peer".to_string(),
                ))
            }
            Err(_) => {
                return Err(DiceError::Timeout {
                    state: RECEIVE_STATE.to_string(),
                    after: timeout,
                })
            }
        };

        tracing::debug!("Received frame ({} bytes)", frame.len());
        decode_frame(&frame)
    }
}
