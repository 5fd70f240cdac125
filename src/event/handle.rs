//! Progress stream classification
//!
//! An [`EventHandle`] consumes the progress records of one remote operation and
//! resolves exactly once, either to success or to failure. The outcome is kept in
//! a watch slot so callers that start waiting late still observe it.

use crate::error::{DockerError, Result};
use crate::event::classifier::EventClassifier;
use crate::event::progress::ProgressEvent;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Receives the terminal transition of an [`EventHandle`].
///
/// `on_success` and `on_error` are invoked at most once in total.
pub trait EventListener: Send + Sync {
    fn on_success(&self);

    fn on_error(&self, message: &str);

    /// Every event seen while the handle is still pending
    fn on_event(&self, _event: &ProgressEvent) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The daemon reported an error in the stream
    Remote,
    /// The stream ended without a success marker
    IncompleteStream,
    /// No response was ever produced
    RequestFailure,
    /// A record could not be decoded
    Decode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn to_error(&self) -> DockerError {
        let message = self.message.clone();
        match self.kind {
            FailureKind::Remote => DockerError::Remote(message),
            FailureKind::IncompleteStream => DockerError::IncompleteStream(message),
            FailureKind::RequestFailure => DockerError::RequestFailure(message),
            FailureKind::Decode => DockerError::Protocol(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Succeeded,
    Failed(Failure),
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Pending)
    }
}

pub struct EventHandle {
    classifier: Box<dyn EventClassifier>,
    listener: Arc<dyn EventListener>,
    timeout: Duration,
    outcome: watch::Sender<Outcome>,
    last_error: Mutex<Option<ProgressEvent>>,
}

impl EventHandle {
    pub fn new<C>(classifier: C, listener: Arc<dyn EventListener>, timeout: Duration) -> Self
    where
        C: EventClassifier + 'static,
    {
        let (outcome, _) = watch::channel(Outcome::Pending);
        Self {
            classifier: Box::new(classifier),
            listener,
            timeout,
            outcome,
            last_error: Mutex::new(None),
        }
    }

    pub fn operation(&self) -> &str {
        self.classifier.name()
    }

    /// Feed one event. No-op once the handle is terminal.
    pub fn on_event(&self, event: &ProgressEvent) {
        if self.outcome.borrow().is_terminal() {
            trace!("{} already resolved, ignoring event: {}", self.operation(), event);
            return;
        }

        self.listener.on_event(event);

        if self.classifier.is_failure(event) {
            let message = event
                .error_message()
                .map(str::to_string)
                .unwrap_or_else(|| event.to_string());
            *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(event.clone());
            self.resolve(Outcome::Failed(Failure::new(FailureKind::Remote, message)));
        } else if self.classifier.is_success(event) {
            self.resolve(Outcome::Succeeded);
        }
    }

    /// No more events will arrive.
    pub fn on_stream_ended(&self) {
        let message = format!("{} stream ended without a completion status", self.operation());
        self.resolve(Outcome::Failed(Failure::new(FailureKind::IncompleteStream, message)));
    }

    /// The request never produced an event stream.
    pub fn on_request_failed(&self, error: impl fmt::Display) {
        self.resolve(Outcome::Failed(Failure::new(
            FailureKind::RequestFailure,
            error.to_string(),
        )));
    }

    /// A record in the stream could not be decoded.
    pub fn on_decode_error(&self, error: impl fmt::Display) {
        self.resolve(Outcome::Failed(Failure::new(
            FailureKind::Decode,
            format!("Malformed {} progress record: {}", self.operation(), error),
        )));
    }

    pub async fn wait(&self) -> Result<()> {
        self.wait_timeout(self.timeout).await
    }

    /// Wait for a terminal state. A timeout leaves the handle pending.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<()> {
        let mut outcome_rx = self.outcome.subscribe();
        let outcome = match tokio::time::timeout(timeout, outcome_rx.wait_for(Outcome::is_terminal)).await {
            Ok(Ok(outcome)) => outcome.clone(),
            Ok(Err(_)) => return Err(DockerError::Worker("Outcome slot dropped".to_string())),
            Err(_) => {
                return Err(DockerError::timeout(
                    format!("{} to complete", self.operation()),
                    timeout,
                ));
            }
        };

        match outcome {
            Outcome::Succeeded => Ok(()),
            Outcome::Failed(failure) => Err(failure.to_error()),
            Outcome::Pending => unreachable!("wait_for only yields terminal outcomes"),
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome.borrow().clone()
    }

    /// The event that failed the operation, if a remote error did
    pub fn last_error(&self) -> Option<ProgressEvent> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn resolve(&self, next: Outcome) {
        let mut resolved = None;
        self.outcome.send_if_modified(|outcome| {
            if outcome.is_terminal() {
                return false;
            }
            *outcome = next;
            resolved = Some(outcome.clone());
            true
        });

        match resolved {
            Some(Outcome::Succeeded) => {
                info!("{} succeeded", self.operation());
                self.listener.on_success();
            }
            Some(Outcome::Failed(failure)) => {
                warn!("{} failed: {}", self.operation(), failure.message);
                self.listener.on_error(&failure.message);
            }
            _ => debug!("{} already resolved", self.operation()),
        }
    }
}
