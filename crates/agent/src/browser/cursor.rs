//! Cursor Probe (C8): polls the DOM's computed `cursor` style at a point
//! and dedups against the last reported value so the bus isn't flooded
//! with repeat `browser:cursor` frames.

use serde_json::json;

use super::cdp::CdpClient;

const DEFAULT_CURSOR: &str = "default";

pub struct CursorProbe {
    cdp: CdpClient,
    last_cursor: Option<String>,
}

impl CursorProbe {
    pub fn new(cdp: CdpClient) -> Self {
        Self { cdp, last_cursor: None }
    }

    /// Evaluate the cursor at `(x, y)`. Returns `Some(cursor)` only when it
    /// differs from the last reported value; any CDP failure or missing
    /// result collapses to `"default"`.
    pub async fn probe(&mut self, x: f64, y: f64) -> Option<String> {
        let expression = format!(
            "(function() {{ const el = document.elementFromPoint({x}, {y}); if (!el) return 'default'; \
             return getComputedStyle(el).cursor || 'default'; }})()"
        );

        let cursor = match self.cdp.call("Runtime.evaluate", json!({ "expression": expression, "returnByValue": true })).await {
            Ok(result) => result
                .get("result")
                .and_then(|r| r.get("value"))
                .and_then(|v| v.as_str())
                .map(str::to_owned)
                .unwrap_or_else(|| DEFAULT_CURSOR.to_owned()),
            Err(_) => DEFAULT_CURSOR.to_owned(),
        };

        if self.last_cursor.as_deref() == Some(cursor.as_str()) {
            return None;
        }
        self.last_cursor = Some(cursor.clone());
        Some(cursor)
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
