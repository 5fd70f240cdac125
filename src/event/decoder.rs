//! Newline-delimited JSON progress decoding

use crate::error::Result;
use crate::event::handle::EventHandle;
use crate::event::progress::ProgressEvent;
use futures_util::{Stream, StreamExt};
use std::fmt;
use tracing::debug;

/// Splits response chunks into progress records.
///
/// Records may be split across chunks; blank lines are skipped.
#[derive(Debug, Default)]
pub struct ProgressDecoder {
    buffer: Vec<u8>,
}

impl ProgressDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of the response body
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Decode the next complete line, in arrival order.
    ///
    /// Returns `None` once only a partial line remains. A malformed line is
    /// consumed and reported; lines before it have already been returned.
    pub fn next_record(&mut self) -> Option<Result<ProgressEvent>> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(record) = parse_line(&line).transpose() {
                return Some(record);
            }
        }
        None
    }

    /// Decode whatever is left once the source is exhausted
    pub fn finish(&mut self) -> Result<Option<ProgressEvent>> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Result<Option<ProgressEvent>> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(line)?))
}

/// Feed a chunked response body into `handle`, ending the stream exactly once.
///
/// Transport errors fail the handle as request failures; undecodable records
/// fail it as decode errors. Events after a terminal state are ignored by the handle.
pub async fn drive<S, B, E>(stream: S, handle: &EventHandle)
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    let mut decoder = ProgressDecoder::new();
    let mut stream = std::pin::pin!(stream);

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                handle.on_request_failed(format!("{} stream interrupted: {}", handle.operation(), e));
                return;
            }
        };

        decoder.push(chunk.as_ref());
        while let Some(record) = decoder.next_record() {
            match record {
                Ok(event) => handle.on_event(&event),
                Err(e) => {
                    handle.on_decode_error(e);
                    return;
                }
            }
        }
    }

    match decoder.finish() {
        Ok(Some(event)) => handle.on_event(&event),
        Ok(None) => {}
        Err(e) => {
            handle.on_decode_error(e);
            return;
        }
    }

    debug!("{} progress stream ended", handle.operation());
    handle.on_stream_ended();
}
