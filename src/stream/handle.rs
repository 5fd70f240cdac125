//! Log/attach stream handle
//!
//! The transport calls [`LogHandle::on_response_headers_received`] or
//! [`LogHandle::on_request_failed`] exactly once per request. Callers block in
//! [`LogHandle::wait_until_ready`] until one of those happened, then read from
//! their sinks or the internal pipes while a background task demultiplexes the
//! response body.

use crate::error::{DockerError, Result};
use crate::stream::frame::{FrameDemuxer, StreamChannel};
use crate::stream::sink::{OutputTarget, Sink};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, DuplexStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(3);
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

/// Single-slot readiness signal; leaves `Pending` at most once
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadyState {
    Pending,
    Ready,
    Failed(String),
}

/// How the demultiplexing task ended
#[derive(Debug, Clone)]
enum WorkerExit {
    Finished(u64),
    Failed(Arc<DockerError>),
    Cancelled,
}

pub struct LogHandleBuilder {
    output: OutputTarget,
    error: OutputTarget,
    pipe_capacity: usize,
    ready_timeout: Duration,
    close_grace: Duration,
}

impl LogHandleBuilder {
    pub fn new() -> Self {
        Self {
            output: OutputTarget::Discard,
            error: OutputTarget::Discard,
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            close_grace: DEFAULT_CLOSE_GRACE,
        }
    }

    /// Destination for stdout (and echoed stdin) frames; discarded unless set.
    ///
    /// A [`OutputTarget::Pipe`] that is never read stalls both channels once it fills.
    pub fn with_output(mut self, target: OutputTarget) -> Self {
        self.output = target;
        self
    }

    /// Destination for stderr frames
    pub fn with_error(mut self, target: OutputTarget) -> Self {
        self.error = target;
        self
    }

    pub fn with_pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity;
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    pub fn build(self) -> LogHandle {
        let (out, output_reader) = Sink::from_target(self.output, self.pipe_capacity);
        let (err, error_reader) = Sink::from_target(self.error, self.pipe_capacity);
        let (ready_tx, _) = watch::channel(ReadyState::Pending);
        let (stop_tx, _) = watch::channel(false);
        let (exit_tx, _) = watch::channel(None);

        LogHandle {
            sinks: Mutex::new(Some((out, err))),
            output_reader: Mutex::new(output_reader),
            error_reader: Mutex::new(error_reader),
            started: AtomicBool::new(false),
            ready_tx,
            stop_tx,
            exit_tx: Arc::new(exit_tx),
            worker: Mutex::new(None),
            ready_timeout: self.ready_timeout,
            close_grace: self.close_grace,
        }
    }
}

impl Default for LogHandleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LogHandle {
    sinks: Mutex<Option<(Sink, Sink)>>,
    output_reader: Mutex<Option<DuplexStream>>,
    error_reader: Mutex<Option<DuplexStream>>,
    started: AtomicBool,
    ready_tx: watch::Sender<ReadyState>,
    stop_tx: watch::Sender<bool>,
    exit_tx: Arc<watch::Sender<Option<WorkerExit>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    ready_timeout: Duration,
    close_grace: Duration,
}

impl LogHandle {
    pub fn builder() -> LogHandleBuilder {
        LogHandleBuilder::new()
    }

    /// Response headers arrived; start demultiplexing `body`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_response_headers_received<R>(&self, body: R)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let Some((out, err)) = lock(&self.sinks).take() else {
            warn!("Response headers delivered twice, ignoring the second body");
            return;
        };

        let stop = self.stop_tx.subscribe();
        let exit_tx = Arc::clone(&self.exit_tx);
        let worker = tokio::spawn(async move {
            let exit = match pump(FrameDemuxer::new(body), out, err, stop).await {
                Ok(frames) => WorkerExit::Finished(frames),
                Err(e) => WorkerExit::Failed(Arc::new(e)),
            };
            publish(&exit_tx, exit);
        });
        *lock(&self.worker) = Some(worker);

        self.started.store(true, Ordering::Release);
        self.signal(ReadyState::Ready);
    }

    /// The request never produced a response.
    pub fn on_request_failed(&self, error: impl fmt::Display) {
        error!("Request failure: {}", error);
        // Only startup failures go through the readiness slot
        if !self.started.load(Ordering::Acquire) {
            self.signal(ReadyState::Failed(error.to_string()));
        }
    }

    pub async fn wait_until_ready(&self) -> Result<()> {
        self.wait_until_ready_timeout(self.ready_timeout).await
    }

    pub async fn wait_until_ready_timeout(&self, timeout: Duration) -> Result<()> {
        let mut ready_rx = self.ready_tx.subscribe();
        let state = match tokio::time::timeout(
            timeout,
            ready_rx.wait_for(|state| *state != ReadyState::Pending),
        )
        .await
        {
            Ok(Ok(state)) => state.clone(),
            Ok(Err(_)) => return Err(DockerError::Worker("Readiness signal dropped".to_string())),
            Err(_) => return Err(DockerError::timeout("log stream readiness", timeout)),
        };

        match state {
            ReadyState::Ready => Ok(()),
            ReadyState::Failed(message) => Err(DockerError::RequestFailure(message)),
            ReadyState::Pending => unreachable!("wait_for only yields non-pending states"),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Reader for stdout bytes; `None` if stdout went to a writer, was discarded, or was already taken
    pub fn take_output_reader(&self) -> Option<DuplexStream> {
        lock(&self.output_reader).take()
    }

    /// Reader for stderr bytes; `None` if stderr went to a writer, was discarded, or was already taken
    pub fn take_error_reader(&self) -> Option<DuplexStream> {
        lock(&self.error_reader).take()
    }

    /// Wait for the body to be fully drained and return the number of frames routed.
    ///
    /// Protocol and sink errors from the worker surface here. Any number of
    /// callers may wait; dropping a wait leaves the worker under the handle's control.
    pub async fn wait_for_completion(&self) -> Result<u64> {
        if !self.is_started() {
            return Err(DockerError::Worker("Log stream worker is not running".to_string()));
        }

        let mut exit_rx = self.exit_tx.subscribe();
        let exit = exit_rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| DockerError::Worker("Worker exit signal dropped".to_string()))?
            .clone();

        match exit {
            Some(WorkerExit::Finished(frames)) => Ok(frames),
            Some(WorkerExit::Failed(e)) => Err(reraise(&e)),
            Some(WorkerExit::Cancelled) | None => {
                Err(DockerError::Worker("Log stream worker was cancelled".to_string()))
            }
        }
    }

    /// The error that ended the worker, once it has ended with one
    pub fn worker_error(&self) -> Option<Arc<DockerError>> {
        match &*self.exit_tx.borrow() {
            Some(WorkerExit::Failed(e)) => Some(Arc::clone(e)),
            _ => None,
        }
    }

    /// Stop the worker, waiting up to the grace period before cancelling it.
    ///
    /// Idempotent. A frame that is half-read when cancellation hits is dropped.
    /// A worker failure is logged here and stays available from [`Self::worker_error`].
    pub async fn close(&self) -> Result<()> {
        self.stop_tx.send_replace(true);

        let Some(mut worker) = lock(&self.worker).take() else {
            return Ok(());
        };

        match tokio::time::timeout(self.close_grace, &mut worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                publish(&self.exit_tx, WorkerExit::Cancelled);
                return Err(e.into());
            }
            Err(_) => {
                warn!(
                    "Log stream worker still running after {:?}, cancelling",
                    self.close_grace
                );
                worker.abort();
                let joined = worker.await;
                publish(&self.exit_tx, WorkerExit::Cancelled);
                if let Err(e) = joined {
                    if !e.is_cancelled() {
                        return Err(e.into());
                    }
                }
            }
        }

        match &*self.exit_tx.borrow() {
            Some(WorkerExit::Finished(frames)) => {
                debug!("Log stream worker stopped after {} frames", frames)
            }
            Some(WorkerExit::Failed(e)) => warn!("Log stream worker ended with error: {}", e),
            _ => debug!("Log stream worker cancelled"),
        }
        Ok(())
    }

    fn signal(&self, next: ReadyState) {
        self.ready_tx.send_if_modified(|state| {
            if *state == ReadyState::Pending {
                *state = next;
                true
            } else {
                false
            }
        });
    }
}

impl Drop for LogHandle {
    fn drop(&mut self) {
        if let Some(worker) = lock(&self.worker).take() {
            worker.abort();
        }
    }
}

/// The exit slot is written once; a cancelled worker never overwrites a result
fn publish(exit_tx: &watch::Sender<Option<WorkerExit>>, exit: WorkerExit) {
    exit_tx.send_if_modified(|slot| {
        if slot.is_none() {
            *slot = Some(exit);
            true
        } else {
            false
        }
    });
}

/// Rebuild an owned error for each waiter from the shared worker failure
fn reraise(error: &DockerError) -> DockerError {
    match error {
        DockerError::Protocol(message) => DockerError::Protocol(message.clone()),
        DockerError::Io(e) => DockerError::Io(std::io::Error::new(e.kind(), e.to_string())),
        other => DockerError::Worker(other.to_string()),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn pump<R>(
    mut demuxer: FrameDemuxer<R>,
    mut out: Sink,
    mut err: Sink,
    mut stop: watch::Receiver<bool>,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut frames = 0u64;
    let result = loop {
        if *stop.borrow_and_update() {
            break Ok(());
        }

        let next = tokio::select! {
            biased;
            _ = stop.changed() => {
                debug!("Stop requested after {} frames", frames);
                break Ok(());
            }
            next = demuxer.next_frame() => next,
        };

        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        };

        // Non-tty attach echoes stdin on the combined output stream
        let sink = match frame.channel {
            StreamChannel::Stdin | StreamChannel::Stdout => &mut out,
            StreamChannel::Stderr => &mut err,
        };
        if let Err(e) = sink.write_payload(&frame.payload).await {
            break Err(e.into());
        }
        frames += 1;
    };

    if let Err(e) = out.finish().await {
        debug!("Failed to finish stdout sink: {}", e);
    }
    if let Err(e) = err.finish().await {
        debug!("Failed to finish stderr sink: {}", e);
    }

    if let Err(e) = &result {
        error!("Log stream worker failed after {} frames: {}", frames, e);
    }
    result.map(|_| frames)
}
