use docker_stream::error::DockerError;
use docker_stream::event::{
    EventClassifier, EventHandle, EventListener, FailureKind, Operation, Outcome, ProgressEvent, drive,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingListener {
    successes: AtomicUsize,
    errors: Mutex<Vec<String>>,
    events: AtomicUsize,
}

impl RecordingListener {
    fn successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }

    fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl EventListener for RecordingListener {
    fn on_success(&self) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn on_event(&self, _event: &ProgressEvent) {
        self.events.fetch_add(1, Ordering::SeqCst);
    }
}

fn import_handle() -> (EventHandle, Arc<RecordingListener>) {
    let listener = Arc::new(RecordingListener::default());
    let handle = EventHandle::new(Operation::Import, listener.clone(), Duration::from_secs(5));
    (handle, listener)
}

#[tokio::test]
async fn test_import_status_succeeds_once() {
    let (handle, listener) = import_handle();
    assert_eq!(handle.outcome(), Outcome::Pending);

    handle.on_event(&ProgressEvent::builder().stream("Status: Imported").build());

    assert_eq!(handle.outcome(), Outcome::Succeeded);
    handle.wait().await.unwrap();
    assert_eq!(listener.successes(), 1);
    assert!(listener.errors().is_empty());
}

#[tokio::test]
async fn test_import_error_fails_with_message() {
    let (handle, listener) = import_handle();

    handle.on_event(&ProgressEvent::builder().error("no such image").build());

    match handle.wait().await {
        Err(DockerError::Remote(msg)) => assert_eq!(msg, "no such image"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(listener.errors(), vec!["no such image".to_string()]);
    assert_eq!(listener.successes(), 0);
    assert_eq!(
        handle.last_error().and_then(|e| e.error().map(str::to_string)),
        Some("no such image".to_string())
    );
}

#[tokio::test]
async fn test_failure_wins_tie_break() {
    let (handle, listener) = import_handle();

    handle.on_event(
        &ProgressEvent::builder()
            .stream("Status: Imported")
            .error("no such image")
            .build(),
    );

    assert!(matches!(handle.outcome(), Outcome::Failed(_)));
    assert_eq!(listener.successes(), 0);
    assert_eq!(listener.errors().len(), 1);
}

#[tokio::test]
async fn test_events_after_terminal_are_ignored() {
    let (handle, listener) = import_handle();

    handle.on_event(&ProgressEvent::builder().stream("Status: Imported").build());
    handle.on_event(&ProgressEvent::builder().error("late failure").build());
    handle.on_event(&ProgressEvent::builder().stream("Status: Imported").build());
    handle.on_stream_ended();

    assert_eq!(handle.outcome(), Outcome::Succeeded);
    assert_eq!(listener.successes(), 1);
    assert!(listener.errors().is_empty());
    assert_eq!(listener.events.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pending_events_do_not_resolve() {
    let (handle, listener) = import_handle();

    handle.on_event(&ProgressEvent::builder().status("Importing").build());
    handle.on_event(&ProgressEvent::builder().error("").build());

    assert_eq!(handle.outcome(), Outcome::Pending);
    assert_eq!(listener.events.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stream_end_while_pending_is_incomplete() {
    let (handle, listener) = import_handle();

    handle.on_event(&ProgressEvent::builder().status("Importing").build());
    handle.on_stream_ended();

    match handle.outcome() {
        Outcome::Failed(failure) => assert_eq!(failure.kind, FailureKind::IncompleteStream),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(matches!(
        handle.wait().await,
        Err(DockerError::IncompleteStream(_))
    ));
    assert_eq!(listener.errors().len(), 1);
}

#[tokio::test]
async fn test_wait_times_out_while_pending() {
    let (handle, listener) = import_handle();

    let err = handle
        .wait_timeout(Duration::from_millis(30))
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "got {:?}", err);
    assert_eq!(handle.outcome(), Outcome::Pending);
    assert!(listener.errors().is_empty());
}

#[tokio::test]
async fn test_waiter_released_by_later_event() {
    let (handle, _listener) = import_handle();
    let handle = Arc::new(handle);

    let waiter = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.wait().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.on_event(&ProgressEvent::builder().stream("Status: Imported").build());

    waiter.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_request_failure_resolves_handle() {
    let listener = Arc::new(RecordingListener::default());
    let handle = EventHandle::new(Operation::Pull, listener.clone(), Duration::from_secs(5));

    handle.on_request_failed("Connection error during pull: refused");

    assert!(matches!(
        handle.wait().await,
        Err(DockerError::RequestFailure(_))
    ));
    assert_eq!(listener.errors().len(), 1);
}

#[tokio::test]
async fn test_drive_pull_stream() {
    let listener = Arc::new(RecordingListener::default());
    let handle = EventHandle::new(Operation::Pull, listener.clone(), Duration::from_secs(5));

    let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
        Ok(b"{\"status\":\"Pulling from library/alpine\",\"id\":\"3.19\"}\r\n{\"status\":\"Pulling fs layer\",\"id\":\"4abc\"}\r\n".to_vec()),
        Ok(b"{\"status\":\"Downloading\",\"progressDetail\":{\"current\":10,\"total\":20},\"id\":\"4abc\"}\r\n{\"status\":\"Status: Downloaded ".to_vec()),
        Ok(b"newer image for alpine:3.19\"}\r\n".to_vec()),
    ];
    drive(futures_util::stream::iter(chunks), &handle).await;

    handle.wait().await.unwrap();
    assert_eq!(listener.successes(), 1);
    assert_eq!(listener.events.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_drive_stream_without_marker_is_incomplete() {
    let listener = Arc::new(RecordingListener::default());
    let handle = EventHandle::new(Operation::Push, listener.clone(), Duration::from_secs(5));

    let chunks: Vec<Result<&[u8], std::io::Error>> =
        vec![Ok(b"{\"status\":\"Preparing\",\"id\":\"a1\"}\n{\"status\":\"Pushed\",\"id\":\"a1\"}".as_slice())];
    drive(futures_util::stream::iter(chunks), &handle).await;

    assert!(matches!(
        handle.wait().await,
        Err(DockerError::IncompleteStream(_))
    ));
}

#[tokio::test]
async fn test_drive_remote_error_in_stream() {
    let listener = Arc::new(RecordingListener::default());
    let handle = EventHandle::new(Operation::Build, listener.clone(), Duration::from_secs(5));

    let chunks: Vec<Result<&[u8], std::io::Error>> = vec![
        Ok(b"{\"stream\":\"Step 1/2 : FROM alpine\\n\"}\n".as_slice()),
        Ok(b"{\"errorDetail\":{\"message\":\"The command '/bin/sh -c make' returned a non-zero code: 2\"},\"error\":\"The command '/bin/sh -c make' returned a non-zero code: 2\"}\n".as_slice()),
        Ok(b"{\"stream\":\"Successfully built 4e1b2c3d\\n\"}\n".as_slice()),
    ];
    drive(futures_util::stream::iter(chunks), &handle).await;

    match handle.wait().await {
        Err(DockerError::Remote(msg)) => assert!(msg.contains("non-zero code: 2")),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(listener.successes(), 0);
}

#[tokio::test]
async fn test_drive_interrupted_transport() {
    let listener = Arc::new(RecordingListener::default());
    let handle = EventHandle::new(Operation::Pull, listener.clone(), Duration::from_secs(5));

    let chunks: Vec<Result<&[u8], std::io::Error>> = vec![
        Ok(b"{\"status\":\"Pulling fs layer\",\"id\":\"4abc\"}\n".as_slice()),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer")),
    ];
    drive(futures_util::stream::iter(chunks), &handle).await;

    match handle.wait().await {
        Err(DockerError::RequestFailure(msg)) => assert!(msg.contains("reset by peer")),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_drive_malformed_record() {
    let listener = Arc::new(RecordingListener::default());
    let handle = EventHandle::new(Operation::Import, listener.clone(), Duration::from_secs(5));

    let chunks: Vec<Result<&[u8], std::io::Error>> = vec![Ok(b"{not json}\n".as_slice())];
    drive(futures_util::stream::iter(chunks), &handle).await;

    match handle.outcome() {
        Outcome::Failed(failure) => assert_eq!(failure.kind, FailureKind::Decode),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_drive_success_before_malformed_line_in_same_chunk() {
    let listener = Arc::new(RecordingListener::default());
    let handle = EventHandle::new(Operation::Import, listener.clone(), Duration::from_secs(5));

    let chunks: Vec<Result<&[u8], std::io::Error>> =
        vec![Ok(b"{\"stream\":\"Status: Imported\"}\n{garbage}\n".as_slice())];
    drive(futures_util::stream::iter(chunks), &handle).await;

    assert_eq!(handle.outcome(), Outcome::Succeeded);
    assert_eq!(listener.successes(), 1);
    assert!(listener.errors().is_empty());
}

#[tokio::test]
async fn test_drive_remote_error_before_malformed_line_in_same_chunk() {
    let listener = Arc::new(RecordingListener::default());
    let handle = EventHandle::new(Operation::Pull, listener.clone(), Duration::from_secs(5));

    let chunks: Vec<Result<&[u8], std::io::Error>> = vec![Ok(
        b"{\"status\":\"Pulling fs layer\",\"id\":\"4abc\"}\n{\"error\":\"manifest unknown\"}\nnot json\n".as_slice(),
    )];
    drive(futures_util::stream::iter(chunks), &handle).await;

    match handle.outcome() {
        Outcome::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::Remote);
            assert_eq!(failure.message, "manifest unknown");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(listener.events.load(Ordering::SeqCst), 2);
}

struct TaggedOnly;

impl EventClassifier for TaggedOnly {
    fn is_success(&self, event: &ProgressEvent) -> bool {
        event.stream().is_some_and(|s| s.starts_with("Successfully tagged"))
    }

    fn name(&self) -> &str {
        "tag"
    }
}

#[tokio::test]
async fn test_custom_classifier() {
    let listener = Arc::new(RecordingListener::default());
    let handle = EventHandle::new(TaggedOnly, listener.clone(), Duration::from_secs(5));
    assert_eq!(handle.operation(), "tag");

    handle.on_event(&ProgressEvent::builder().stream("Successfully built 4e1b").build());
    assert_eq!(handle.outcome(), Outcome::Pending);

    handle.on_event(&ProgressEvent::builder().stream("Successfully tagged app:1").build());
    handle.wait().await.unwrap();
    assert_eq!(listener.successes(), 1);
}
