//! Multiplexed stream framing
//!
//! Non-tty `logs` and `attach` responses carry stdout and stderr interleaved on a
//! single connection. Every frame is an 8-byte header followed by its payload:
//!
//! ```text
//! [channel id: 1][reserved: 3][payload length, big-endian u32: 4][payload]
//! ```

use crate::error::{DockerError, Result};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamChannel {
    Stdin,
    Stdout,
    Stderr,
}

impl StreamChannel {
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(StreamChannel::Stdin),
            1 => Ok(StreamChannel::Stdout),
            2 => Ok(StreamChannel::Stderr),
            other => Err(DockerError::Protocol(format!("Unknown stream ID {}", other))),
        }
    }

    pub fn id(self) -> u8 {
        match self {
            StreamChannel::Stdin => 0,
            StreamChannel::Stdout => 1,
            StreamChannel::Stderr => 2,
        }
    }
}

impl fmt::Display for StreamChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamChannel::Stdin => write!(f, "stdin"),
            StreamChannel::Stdout => write!(f, "stdout"),
            StreamChannel::Stderr => write!(f, "stderr"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub channel: StreamChannel,
    pub payload: Vec<u8>,
}

/// Encode one frame in wire format
pub fn encode_frame(channel: StreamChannel, payload: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        DockerError::Protocol(format!("Payload of {} bytes exceeds frame limit", payload.len()))
    })?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.push(channel.id());
    frame.extend_from_slice(&[0, 0, 0]);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Lazily decodes frames from a byte source.
///
/// Only the frame currently being decoded is held in memory.
pub struct FrameDemuxer<R> {
    source: R,
    header: [u8; HEADER_LEN],
}

impl<R> FrameDemuxer<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(source: R) -> Self {
        Self {
            source,
            header: [0; HEADER_LEN],
        }
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` when the source ends on a frame boundary. A source that
    /// ends inside a header or payload is a protocol error.
    pub async fn next_frame(&mut self) -> Result<Option<StreamFrame>> {
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = self.source.read(&mut self.header[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(DockerError::Protocol(format!(
                    "Stream ended inside frame header ({} of {} bytes)",
                    filled, HEADER_LEN
                )));
            }
            filled += n;
        }

        let channel = StreamChannel::from_id(self.header[0])?;
        let len = u32::from_be_bytes([self.header[4], self.header[5], self.header[6], self.header[7]])
            as usize;

        // The declared length is untrusted; grow only as bytes arrive
        let mut payload = Vec::new();
        let read = (&mut self.source)
            .take(len as u64)
            .read_to_end(&mut payload)
            .await?;
        if read < len {
            return Err(DockerError::Protocol(format!(
                "Stream ended inside {} byte {} payload ({} bytes received)",
                len, channel, read
            )));
        }

        Ok(Some(StreamFrame { channel, payload }))
    }
}
