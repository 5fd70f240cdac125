//! Destinations for demultiplexed payload bytes

use std::fmt;
use tokio::io::{AsyncWrite, AsyncWriteExt, DuplexStream};

pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// What the caller asked for on one channel
#[derive(Default)]
pub enum OutputTarget {
    /// Write straight into a caller-owned writer
    Writer(BoxedWriter),
    /// Buffer into an internal pipe the caller reads from
    Pipe,
    #[default]
    Discard,
}

impl OutputTarget {
    pub fn writer<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        OutputTarget::Writer(Box::new(writer))
    }
}

impl fmt::Debug for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Writer(_) => write!(f, "Writer"),
            OutputTarget::Pipe => write!(f, "Pipe"),
            OutputTarget::Discard => write!(f, "Discard"),
        }
    }
}

/// The write side the worker routes payloads into
pub enum Sink {
    Writer(BoxedWriter),
    Pipe(DuplexStream),
    Discard,
}

impl Sink {
    /// Resolve a target into a sink, returning the reader end when a pipe is created.
    ///
    /// The pipe holds at most `pipe_capacity` unread bytes; past that the worker
    /// waits for the reader.
    pub fn from_target(target: OutputTarget, pipe_capacity: usize) -> (Sink, Option<DuplexStream>) {
        match target {
            OutputTarget::Writer(writer) => (Sink::Writer(writer), None),
            OutputTarget::Pipe => {
                let (writer, reader) = tokio::io::duplex(pipe_capacity.max(1));
                (Sink::Pipe(writer), Some(reader))
            }
            OutputTarget::Discard => (Sink::Discard, None),
        }
    }

    pub async fn write_payload(&mut self, payload: &[u8]) -> std::io::Result<()> {
        match self {
            Sink::Writer(writer) => {
                writer.write_all(payload).await?;
                writer.flush().await
            }
            Sink::Pipe(pipe) => pipe.write_all(payload).await,
            Sink::Discard => Ok(()),
        }
    }

    /// Flush caller writers; shut pipes down so their readers see EOF.
    pub async fn finish(&mut self) -> std::io::Result<()> {
        match self {
            Sink::Writer(writer) => writer.flush().await,
            Sink::Pipe(pipe) => pipe.shutdown().await,
            Sink::Discard => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_pipe_sink_delivers_then_eof() {
        let (mut sink, reader) = Sink::from_target(OutputTarget::Pipe, 64);
        let mut reader = reader.expect("pipe target yields a reader");

        sink.write_payload(b"abc").await.unwrap();
        sink.write_payload(b"def").await.unwrap();
        sink.finish().await.unwrap();

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"abcdef");
    }

    #[tokio::test]
    async fn test_writer_sink_has_no_reader() {
        let (writer, mut external) = tokio::io::duplex(64);
        let (mut sink, reader) = Sink::from_target(OutputTarget::writer(writer), 64);
        assert!(reader.is_none());

        sink.write_payload(b"hello").await.unwrap();
        drop(sink);

        let mut out = Vec::new();
        external.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn test_discard_accepts_everything() {
        let (mut sink, reader) = Sink::from_target(OutputTarget::Discard, 64);
        assert!(reader.is_none());
        sink.write_payload(&[0u8; 4096]).await.unwrap();
        sink.finish().await.unwrap();
    }
}
