//! Screencast Stream (C6): starts/stops CDP's screencast feed and
//! re-emits frames upward, acknowledging each one immediately so Chrome's
//! own back-pressure keeps the pipeline moving.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AgentError;
use crate::wire::FrameMetadata;

use super::cdp::CdpClient;

#[derive(Debug, Clone, Deserialize)]
struct ScreencastFrameEvent {
    data: String,
    #[serde(rename = "sessionId")]
    session_id: i64,
    metadata: Option<ScreencastMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScreencastMetadata {
    #[serde(rename = "timestamp")]
    timestamp: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub data: String,
    pub metadata: FrameMetadata,
}

pub struct ScreencastOptions {
    pub quality: u8,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ScreencastOptions {
    fn default() -> Self {
        Self { quality: 70, max_width: 1280, max_height: 720 }
    }
}

pub struct ScreencastStream {
    cdp: CdpClient,
    running: Arc<AtomicBool>,
}

impl ScreencastStream {
    pub fn new(cdp: CdpClient) -> Self {
        Self { cdp, running: Arc::new(AtomicBool::new(false)) }
    }

    /// Subscribe to `Page.screencastFrame`, issue `Page.startScreencast`,
    /// and forward each frame to `on_frame` until [`Self::stop`] is called.
    /// Runs on the caller's task; intended to be spawned.
    pub async fn start(
        &self,
        opts: ScreencastOptions,
        page_url: String,
        page_title: String,
        mut on_frame: impl FnMut(Frame),
    ) -> Result<(), AgentError> {
        self.running.store(true, Ordering::Release);
        let mut frames = self.cdp.subscribe("Page.screencastFrame");

        self.cdp
            .call(
                "Page.startScreencast",
                json!({
                    "format": "jpeg",
                    "quality": opts.quality,
                    "maxWidth": opts.max_width,
                    "maxHeight": opts.max_height,
                    "everyNthFrame": 1,
                }),
            )
            .await?;

        while self.running.load(Ordering::Acquire) {
            let Some(value) = frames.recv().await else { break };
            let Ok(event) = serde_json::from_value::<ScreencastFrameEvent>(value) else { continue };

            let timestamp = event.metadata.as_ref().and_then(|m| m.timestamp).unwrap_or(0.0);
            on_frame(Frame {
                data: event.data,
                metadata: FrameMetadata {
                    page_url: page_url.clone(),
                    page_title: page_title.clone(),
                    timestamp,
                },
            });

            // Ack immediately: this is the back-pressure signal Chrome uses
            // to decide whether to produce the next frame.
            let _ = self.cdp.call("Page.screencastFrameAck", json!({ "sessionId": event.session_id })).await;
        }

        Ok(())
    }

    pub async fn stop(&self) -> Result<(), AgentError> {
        self.running.store(false, Ordering::Release);
        self.cdp.call("Page.stopScreencast", json!({})).await?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[path = "screencast_tests.rs"]
mod tests;
