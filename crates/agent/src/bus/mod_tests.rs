use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::*;
use crate::wire::Frame;

fn collecting_outbound() -> (Outbound, Arc<Mutex<Vec<Frame>>>) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let sink = sent.clone();
    (Arc::new(move |frame: Frame| sink.lock().push(frame)), sent)
}

fn handler_ok(record: Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> Handler {
    Arc::new(move |_frame, _outbound| {
        let record = record.clone();
        Box::pin(async move {
            record.lock().push(tag);
            Ok(())
        })
    })
}

#[tokio::test]
async fn handlers_for_one_type_run_in_insertion_order() {
    let (outbound, _sent) = collecting_outbound();
    let router = Router::new(outbound);
    let record = Arc::new(Mutex::new(Vec::new()));

    router.register("terminal:input", handler_ok(record.clone(), "first"));
    router.register("terminal:input", handler_ok(record.clone(), "second"));

    router.route(Frame::TerminalInput { session_id: "s1".to_owned(), data: "x".to_owned() });
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(*record.lock(), vec!["first", "second"]);
}

#[tokio::test]
async fn unregistered_frame_type_is_dropped_silently() {
    let (outbound, sent) = collecting_outbound();
    let router = Router::new(outbound);

    router.route(Frame::TerminalCwd { session_id: "s1".to_owned() });
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(sent.lock().is_empty());
}

#[tokio::test]
async fn handler_error_is_translated_to_the_domain_error_frame() {
    let (outbound, sent) = collecting_outbound();
    let router = Router::new(outbound);

    let failing: Handler = Arc::new(|_frame, _outbound| {
        Box::pin(async move { Err(AgentError::user("disallowed")) })
    });
    router.register("terminal:create", failing);

    router.route(Frame::TerminalCreate(crate::wire::TerminalCreate {
        session_id: "s1".to_owned(),
        cols: None,
        rows: None,
        cwd: None,
        shell: None,
    }));
    tokio::time::sleep(Duration::from_millis(30)).await;

    let sent = sent.lock();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Frame::TerminalError { error } => assert_eq!(error, "disallowed"),
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn different_types_are_dispatched_independently() {
    let (outbound, _sent) = collecting_outbound();
    let router = Router::new(outbound);
    let record: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    // A slow handler on one type must not block delivery to another type.
    let record_slow = record.clone();
    let slow: Handler = Arc::new(move |_frame, _outbound| {
        let record = record_slow.clone();
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            record.lock().push("slow-done");
            Ok(())
        })
    });
    router.register("terminal:input", slow);
    router.register("browser:resize", handler_ok(record.clone(), "fast-done"));

    router.route(Frame::TerminalInput { session_id: "s1".to_owned(), data: "x".to_owned() });
    router.route(Frame::BrowserResize { width: 100, height: 100 });

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(*record.lock(), vec!["fast-done"]);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(record.lock().contains(&"slow-done"));
}
