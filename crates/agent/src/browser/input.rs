//! Input Handler (C7): classifies high-level input events from the bus
//! and translates them into clamped CDP `Input.*` dispatch calls.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AgentError;

use super::cdp::CdpClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BrowserInputPayload {
    InsertText { text: String },
    MousePressed(MouseEvent),
    MouseReleased(MouseEvent),
    MouseMoved(MouseEvent),
    MouseWheel(MouseEvent),
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    /// Catches any `type` this handler doesn't recognize so a single
    /// unrecognized input event can't fail the whole frame's deserialization.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MouseEvent {
    pub x: f64,
    pub y: f64,
    pub button: Option<String>,
    pub click_count: Option<u32>,
    pub delta_x: Option<f64>,
    pub delta_y: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct KeyEvent {
    pub key: String,
    pub code: String,
    pub modifiers: Option<u32>,
}

#[derive(Clone)]
pub struct InputHandler {
    cdp: CdpClient,
    viewport_width: f64,
    viewport_height: f64,
}

impl InputHandler {
    pub fn new(cdp: CdpClient, viewport_width: u32, viewport_height: u32) -> Self {
        Self { cdp, viewport_width: viewport_width as f64, viewport_height: viewport_height as f64 }
    }

    pub fn resize(&mut self, viewport_width: u32, viewport_height: u32) {
        self.viewport_width = viewport_width as f64;
        self.viewport_height = viewport_height as f64;
    }

    fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        (x.clamp(0.0, self.viewport_width), y.clamp(0.0, self.viewport_height))
    }

    /// Dispatch `payload`. Unrecognized/other types are dropped silently by
    /// construction of [`BrowserInputPayload`] itself — every variant here
    /// maps to a concrete CDP call.
    pub async fn dispatch(&self, payload: &BrowserInputPayload) -> Result<(), AgentError> {
        match payload {
            BrowserInputPayload::InsertText { text } => {
                self.cdp.call("Input.insertText", json!({ "text": text })).await?;
            }
            BrowserInputPayload::MousePressed(ev) => self.dispatch_mouse("mousePressed", ev).await?,
            BrowserInputPayload::MouseReleased(ev) => self.dispatch_mouse("mouseReleased", ev).await?,
            BrowserInputPayload::MouseMoved(ev) => self.dispatch_mouse("mouseMoved", ev).await?,
            BrowserInputPayload::MouseWheel(ev) => self.dispatch_mouse("mouseWheel", ev).await?,
            BrowserInputPayload::KeyDown(ev) => self.dispatch_key("keyDown", ev).await?,
            BrowserInputPayload::KeyUp(ev) => self.dispatch_key("keyUp", ev).await?,
            BrowserInputPayload::Unknown => {}
        }
        Ok(())
    }

    async fn dispatch_mouse(&self, event_type: &str, ev: &MouseEvent) -> Result<(), AgentError> {
        let (x, y) = self.clamp(ev.x, ev.y);
        let mut params = json!({ "type": event_type, "x": x, "y": y });
        // `json!({ ... })` with object literal syntax always produces `Value::Object`.
        #[allow(clippy::expect_used)]
        let obj = params.as_object_mut().expect("object literal");
        if let Some(button) = &ev.button {
            obj.insert("button".to_owned(), json!(button));
        }
        if let Some(click_count) = ev.click_count {
            obj.insert("clickCount".to_owned(), json!(click_count));
        }
        if let Some(delta_x) = ev.delta_x {
            obj.insert("deltaX".to_owned(), json!(delta_x));
        }
        if let Some(delta_y) = ev.delta_y {
            obj.insert("deltaY".to_owned(), json!(delta_y));
        }
        self.cdp.call("Input.dispatchMouseEvent", params).await?;
        Ok(())
    }

    async fn dispatch_key(&self, event_type: &str, ev: &KeyEvent) -> Result<(), AgentError> {
        let params = json!({
            "type": event_type,
            "key": ev.key,
            "code": ev.code,
            "modifiers": ev.modifiers.unwrap_or(0),
        });
        self.cdp.call("Input.dispatchKeyEvent", params).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "input_tests.rs"]
mod tests;
