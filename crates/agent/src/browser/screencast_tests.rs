use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::*;

/// Mock CDP server: on `Page.startScreencast`, emits two screencast frames
/// then stays quiet; acks echo back as successful empty results.
async fn spawn_mock_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut tx, mut rx) = ws.split();

        while let Some(Ok(WsMessage::Text(text))) = rx.next().await {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            let id = value["id"].clone();
            let method = value["method"].as_str().unwrap_or("");

            if method == "Page.startScreencast" {
                let _ = tx
                    .send(WsMessage::Text(json!({"id": id, "result": {}}).to_string().into()))
                    .await;
                for i in 0..2 {
                    let frame = json!({
                        "method": "Page.screencastFrame",
                        "params": { "data": format!("frame-{i}"), "sessionId": i, "metadata": { "timestamp": 1000.0 + i as f64 } }
                    });
                    let _ = tx.send(WsMessage::Text(frame.to_string().into())).await;
                }
                continue;
            }

            let _ = tx.send(WsMessage::Text(json!({"id": id, "result": {}}).to_string().into())).await;
        }
    });

    format!("ws://{addr}")
}

#[tokio::test]
async fn start_forwards_frames_and_acks_each_one() {
    let url = spawn_mock_server().await;
    let cdp = CdpClient::connect(&url).await.unwrap();
    let stream = Arc::new(ScreencastStream::new(cdp));

    let collected = Arc::new(Mutex::new(Vec::new()));
    let sink = collected.clone();
    let runner = stream.clone();
    let handle = tokio::spawn(async move {
        let _ = runner
            .start(ScreencastOptions::default(), "http://x".to_owned(), "title".to_owned(), move |frame| {
                sink.lock().unwrap().push(frame.data);
            })
            .await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    stream.stop().await.unwrap();
    let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;

    let frames = collected.lock().unwrap().clone();
    assert_eq!(frames, vec!["frame-0".to_owned(), "frame-1".to_owned()]);
}

#[tokio::test]
async fn is_running_reflects_start_stop() {
    let url = spawn_mock_server().await;
    let cdp = CdpClient::connect(&url).await.unwrap();
    let stream = Arc::new(ScreencastStream::new(cdp));
    assert!(!stream.is_running());

    let runner = stream.clone();
    let handle = tokio::spawn(async move {
        let _ = runner.start(ScreencastOptions::default(), "u".into(), "t".into(), |_| {}).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(stream.is_running());
    stream.stop().await.unwrap();
    let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    assert!(!stream.is_running());
}
