//! Multiplexed log/attach streams
//!
//! This module provides frame decoding ([`frame`]), payload destinations ([`sink`])
//! and the [`LogHandle`] that ties an in-flight HTTP request to a background
//! demultiplexing task.

pub mod frame;
pub mod handle;
pub mod sink;

pub use frame::{FrameDemuxer, StreamChannel, StreamFrame, encode_frame};
pub use handle::{LogHandle, LogHandleBuilder};
pub use sink::{OutputTarget, Sink};
