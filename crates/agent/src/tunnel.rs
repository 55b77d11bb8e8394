//! Tunnel Proxy (C13): relays `tunnel:request` bus frames to a local port
//! the dev server is listening on. Never opens a listening socket itself —
//! the browser's service worker is the public ingress, not this process.

use std::collections::HashMap;

use base64::Engine;
use parking_lot::Mutex;
use reqwest::Method;
use std::str::FromStr;

use crate::error::AgentError;

#[derive(Debug, Clone)]
struct TunnelTarget {
    host: String,
    port: u16,
}

#[derive(Debug, Clone)]
pub struct TunnelResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

pub struct TunnelProxy {
    client: reqwest::Client,
    tunnels: Mutex<HashMap<String, TunnelTarget>>,
}

impl Default for TunnelProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl TunnelProxy {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new(), tunnels: Mutex::new(HashMap::new()) }
    }

    pub fn open(&self, tunnel_id: &str, port: u16, host: Option<String>) -> Result<(), AgentError> {
        let mut tunnels = self.tunnels.lock();
        if tunnels.contains_key(tunnel_id) {
            return Err(AgentError::user(format!("tunnel already open: {tunnel_id}")));
        }
        tunnels.insert(tunnel_id.to_owned(), TunnelTarget { host: host.unwrap_or_else(|| "127.0.0.1".to_owned()), port });
        Ok(())
    }

    /// Unknown id is a no-op.
    pub fn close(&self, tunnel_id: &str) {
        self.tunnels.lock().remove(tunnel_id);
    }

    pub async fn forward(
        &self,
        tunnel_id: &str,
        request_id: &str,
        method: &str,
        path: &str,
        headers: Vec<(String, String)>,
        body: Option<String>,
    ) -> Result<(String, TunnelResponse), AgentError> {
        let target = {
            let tunnels = self.tunnels.lock();
            tunnels.get(tunnel_id).cloned()
        };
        let target = target.ok_or_else(|| AgentError::user(format!("tunnel not open: {tunnel_id}")))?;

        let url = format!("http://{}:{}{}", target.host, target.port, path);
        let method = Method::from_str(method).map_err(|_| AgentError::user(format!("bad method: {method}")))?;

        let decoded_body = match body {
            Some(b) => {
                Some(base64::engine::general_purpose::STANDARD.decode(&b).map_err(|e| AgentError::user(format!("bad base64 body: {e}")))?)
            }
            None => None,
        };

        let mut builder = self.client.request(method, &url);
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }
        if let Some(bytes) = decoded_body.clone() {
            builder = builder.header(reqwest::header::CONTENT_LENGTH, bytes.len()).body(bytes);
        }

        let response = builder.send().await.map_err(|e| AgentError::resource(format!("forward failed: {e}")))?;
        let status = response.status().as_u16();
        let response_headers = flatten_headers(response.headers());
        let body_bytes = response.bytes().await.map_err(|e| AgentError::resource(format!("read response body failed: {e}")))?;
        let body = if body_bytes.is_empty() {
            None
        } else {
            Some(base64::engine::general_purpose::STANDARD.encode(&body_bytes))
        };

        Ok((request_id.to_owned(), TunnelResponse { status, headers: response_headers, body }))
    }

    pub fn is_open(&self, tunnel_id: &str) -> bool {
        self.tunnels.lock().contains_key(tunnel_id)
    }
}

/// Multi-valued headers are joined with `, ` into a single flattened value.
fn flatten_headers(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    let mut flattened: Vec<(String, Vec<String>)> = Vec::new();
    for (name, value) in headers {
        let value = value.to_str().unwrap_or("").to_owned();
        match flattened.iter_mut().find(|(n, _)| n == name.as_str()) {
            Some((_, values)) => values.push(value),
            None => flattened.push((name.as_str().to_owned(), vec![value])),
        }
    }
    flattened.into_iter().map(|(name, values)| (name, values.join(", "))).collect()
}

#[cfg(test)]
#[path = "tunnel_tests.rs"]
mod tests;
