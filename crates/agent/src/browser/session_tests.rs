use std::sync::{Arc, Mutex};

use super::*;

fn session() -> Arc<BrowserSession> {
    let dir = tempfile::tempdir().unwrap();
    let detector = ChromeDetector::new(dir.path().to_path_buf());
    std::mem::forget(dir); // keep the tempdir alive for the session's lifetime
    Arc::new(BrowserSession::new(detector, 0))
}

fn start_opts() -> StartOptions {
    StartOptions { project_id: "proj-1".to_owned(), url: None, width: 800, height: 600, quality: None }
}

#[tokio::test]
async fn new_session_starts_idle() {
    let session = session();
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn start_without_chrome_installed_transitions_to_error() {
    // The sandboxed test environment has no Chrome binary on the detector's
    // candidate path table, so `start` must fail cleanly rather than hang
    // or panic, and the state machine must land in `error`.
    let session = session();
    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    let sink: SessionEventSink = Arc::new(move |event| {
        if let SessionEvent::Error(msg) = event {
            sink_events.lock().unwrap().push(msg);
        }
    });

    let result = session.start(start_opts(), sink).await;
    assert!(result.is_err());
    assert_eq!(session.state(), SessionState::Error);
    assert!(!events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dispatch_input_is_rejected_when_not_running() {
    let session = session();
    let payload = BrowserInputPayload::InsertText { text: "hi".to_owned() };
    let result = session.dispatch_input(&payload).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn navigate_is_rejected_when_no_session_is_running() {
    let session = session();
    let result = session.navigate("https://example.com").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn probe_cursor_returns_none_when_no_session_is_running() {
    let session = session();
    assert_eq!(session.probe_cursor(0.0, 0.0).await, None);
}

#[tokio::test]
async fn stop_on_idle_session_is_a_no_op() {
    let session = session();
    session.stop().await.unwrap();
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn current_quality_is_none_until_a_session_is_running() {
    let session = session();
    assert_eq!(session.current_quality(), None);
}

#[tokio::test]
async fn record_frame_ack_is_a_no_op_without_a_running_session() {
    let session = session();
    // Must not panic even though there's no `RunningSession` to feed.
    session.record_frame_ack(-500.0);
    session.record_frame_ack(999_999.0);
    assert_eq!(session.current_quality(), None);
}
