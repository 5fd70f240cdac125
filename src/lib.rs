//! Docker Stream Library
//!
//! Consumes the two long-lived response shapes of the Docker Engine API:
//! multiplexed stdout/stderr frames from `logs`/`attach` ([`stream`]) and
//! newline-delimited progress events from image import/pull/push/build ([`event`]).

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod output;
pub mod stream;

pub use client::{DockerClient, LogOptions};
pub use config::{ClientConfig, RegistryAuth};
pub use error::{DockerError, Result};
pub use event::{EventHandle, EventListener, Operation, ProgressEvent};
pub use output::OutputManager;
pub use stream::{LogHandle, OutputTarget};
