use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::*;

async fn spawn_recording_server(calls: Arc<Mutex<Vec<Value>>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut tx, mut rx) = ws.split();

        while let Some(Ok(WsMessage::Text(text))) = rx.next().await {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            calls.lock().unwrap().push(value.clone());
            let id = value["id"].clone();
            let _ = tx.send(WsMessage::Text(json!({"id": id, "result": {}}).to_string().into())).await;
        }
    });

    format!("ws://{addr}")
}

#[tokio::test]
async fn mouse_coordinates_are_clamped_to_the_viewport() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let url = spawn_recording_server(calls.clone()).await;
    let cdp = CdpClient::connect(&url).await.unwrap();
    let handler = InputHandler::new(cdp, 800, 600);

    handler
        .dispatch(&BrowserInputPayload::MouseMoved(MouseEvent { x: -50.0, y: 10000.0, ..Default::default() }))
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let recorded = calls.lock().unwrap();
    let call = recorded.iter().find(|c| c["method"] == "Input.dispatchMouseEvent").unwrap();
    assert_eq!(call["params"]["x"], 0.0);
    assert_eq!(call["params"]["y"], 600.0);
}

#[tokio::test]
async fn insert_text_passes_through_verbatim() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let url = spawn_recording_server(calls.clone()).await;
    let cdp = CdpClient::connect(&url).await.unwrap();
    let handler = InputHandler::new(cdp, 800, 600);

    handler.dispatch(&BrowserInputPayload::InsertText { text: "hello".to_owned() }).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let recorded = calls.lock().unwrap();
    let call = recorded.iter().find(|c| c["method"] == "Input.insertText").unwrap();
    assert_eq!(call["params"]["text"], "hello");
}

#[tokio::test]
async fn key_events_default_modifiers_to_zero() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let url = spawn_recording_server(calls.clone()).await;
    let cdp = CdpClient::connect(&url).await.unwrap();
    let handler = InputHandler::new(cdp, 800, 600);

    handler
        .dispatch(&BrowserInputPayload::KeyDown(KeyEvent { key: "a".into(), code: "KeyA".into(), modifiers: None }))
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let recorded = calls.lock().unwrap();
    let call = recorded.iter().find(|c| c["method"] == "Input.dispatchKeyEvent").unwrap();
    assert_eq!(call["params"]["modifiers"], 0);
}

#[tokio::test]
async fn unknown_input_type_is_dropped_silently() {
    let payload: BrowserInputPayload = serde_json::from_value(json!({ "type": "somethingUnheardOf" })).unwrap();
    assert!(matches!(payload, BrowserInputPayload::Unknown));

    let calls = Arc::new(Mutex::new(Vec::new()));
    let url = spawn_recording_server(calls.clone()).await;
    let cdp = CdpClient::connect(&url).await.unwrap();
    let handler = InputHandler::new(cdp, 800, 600);
    handler.dispatch(&payload).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn resize_updates_clamp_bounds() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let url = spawn_recording_server(calls.clone()).await;
    let cdp = CdpClient::connect(&url).await.unwrap();
    let mut handler = InputHandler::new(cdp, 800, 600);
    handler.resize(400, 300);

    handler.dispatch(&BrowserInputPayload::MouseMoved(MouseEvent { x: 1000.0, y: 1000.0, ..Default::default() })).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let recorded = calls.lock().unwrap();
    let call = recorded.iter().find(|c| c["method"] == "Input.dispatchMouseEvent").unwrap();
    assert_eq!(call["params"]["x"], 400.0);
    assert_eq!(call["params"]["y"], 300.0);
}
