//! CDP page session for interacting with a single page target.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::SinkExt;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use super::client::{PendingRequest, WsSink};
use super::error::CdpError;
use super::protocol::{CdpMessage, CdpRequest};

/// Stream of CDP events addressed to one page session.
///
/// Taken out of the session by whichever component consumes events (the
/// screencast recorder); there is exactly one consumer at a time.
pub struct PageEvents {
    rx: mpsc::UnboundedReceiver<CdpMessage>,
}

impl PageEvents {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<CdpMessage>) -> Self {
        Self { rx }
    }

    /// Receive the next event, or `None` once the session is gone.
    pub async fn next(&mut self) -> Option<CdpMessage> {
        self.rx.recv().await
    }
}

/// A session attached to a single page target.
pub struct PageSession {
    /// Target ID.
    target_id: String,
    /// Session ID for this target.
    session_id: String,
    /// WebSocket sender (shared with client).
    ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
    /// Pending requests (shared with client).
    pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
    /// Request ID counter (shared with client).
    request_id: Arc<AtomicU64>,
    /// Event stream, present until claimed by a consumer.
    events: Mutex<Option<PageEvents>>,
}

impl PageSession {
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
        pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
        request_id: Arc<AtomicU64>,
        events: PageEvents,
    ) -> Self {
        Self {
            target_id,
            session_id,
            ws_tx,
            pending,
            request_id,
            events: Mutex::new(Some(events)),
        }
    }

    /// Get target ID.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Get session ID.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Claim the session's event stream. Returns `None` if already claimed.
    pub fn take_events(&self) -> Option<PageEvents> {
        self.events.lock().take()
    }

    /// Send a CDP command to this page session.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: Some(self.session_id.clone()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("CDP session send: {}", json);

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.pending.lock().insert(id, PendingRequest { tx });

        {
            let mut ws = self.ws_tx.lock().await;
            ws.send(Message::Text(json.into())).await?;
        }

        match tokio::time::timeout(Duration::from_secs(30), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("Request {} timed out", method)))
            }
        }
    }

    /// Enable required CDP domains.
    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("DOM.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        self.call("Network.enable", None).await?;

        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    // ========================================================================
    // Emulation
    // ========================================================================

    /// Fix the viewport to exact pixel dimensions at scale factor 1.
    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<(), CdpError> {
        self.call(
            "Emulation.setDeviceMetricsOverride",
            Some(json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            })),
        )
        .await?;
        Ok(())
    }

    /// Send a fixed Accept-Language so page content is locale-stable.
    pub async fn set_accept_language(&self, language: &str) -> Result<(), CdpError> {
        self.call(
            "Network.setExtraHTTPHeaders",
            Some(json!({"headers": {"Accept-Language": language}})),
        )
        .await?;
        Ok(())
    }

    /// Pin `prefers-reduced-motion` so CSS animation timing is
    /// deterministic across host environments.
    pub async fn emulate_reduced_motion(&self, value: &str) -> Result<(), CdpError> {
        self.call(
            "Emulation.setEmulatedMedia",
            Some(json!({
                "features": [{"name": "prefers-reduced-motion", "value": value}]
            })),
        )
        .await?;
        Ok(())
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Navigate to URL. Returns once the navigation has been accepted;
    /// use [`wait_until_idle`](Self::wait_until_idle) to wait for load.
    pub async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        let result = self.call("Page.navigate", Some(json!({"url": url}))).await?;

        if let Some(error) = result.get("errorText") {
            return Err(CdpError::NavigationFailed(
                error.as_str().unwrap_or("Unknown error").to_string(),
            ));
        }

        debug!("Navigating to {}", url);
        Ok(())
    }

    /// Wait for the document to be complete and the network to go quiet.
    ///
    /// CDP has no single "network idle" signal, so this polls the page:
    /// idle means `document.readyState === "complete"` and no new resource
    /// timing entries for two consecutive polls (a 500ms window). The
    /// deadline expiring is fatal to the caller.
    pub async fn wait_until_idle(&self, timeout: Duration) -> Result<(), CdpError> {
        let start = Instant::now();
        let mut last_resource_count: i64 = -1;
        let mut quiet_polls = 0u32;

        loop {
            let probe = self
                .evaluate(
                    "JSON.stringify([document.readyState, \
                     performance.getEntriesByType('resource').length])",
                )
                .await?;

            let mut complete = false;
            let mut resource_count = -1;
            if let Some(text) = probe.as_str() {
                if let Ok(Value::Array(parts)) = serde_json::from_str::<Value>(text) {
                    complete = parts.first().and_then(Value::as_str) == Some("complete");
                    resource_count = parts.get(1).and_then(Value::as_i64).unwrap_or(-1);
                }
            }

            if complete && resource_count == last_resource_count {
                quiet_polls += 1;
                if quiet_polls >= 2 {
                    debug!(
                        "Page idle after {:?} ({} resources)",
                        start.elapsed(),
                        resource_count
                    );
                    return Ok(());
                }
            } else {
                quiet_polls = 0;
            }
            last_resource_count = resource_count;

            if start.elapsed() > timeout {
                return Err(CdpError::Timeout("Page load timeout".to_string()));
            }

            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    // ========================================================================
    // JavaScript Execution
    // ========================================================================

    /// Evaluate a JavaScript expression and return its value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["exception"]["description"]
                .as_str()
                .or_else(|| exception["text"].as_str())
                .unwrap_or("Unknown error");
            return Err(CdpError::JavaScript(text.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    /// Scroll the page back to its origin.
    pub async fn scroll_to_top(&self) -> Result<(), CdpError> {
        self.evaluate("window.scrollTo(0, 0)").await?;
        Ok(())
    }

    // ========================================================================
    // Capture
    // ========================================================================

    /// Take a PNG screenshot of the viewport.
    pub async fn screenshot_png(&self) -> Result<Vec<u8>, CdpError> {
        let result = self
            .call(
                "Page.captureScreenshot",
                Some(json!({"format": "png", "captureBeyondViewport": false})),
            )
            .await?;

        let data = result["data"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing screenshot data".to_string()))?;

        BASE64
            .decode(data)
            .map_err(|e| CdpError::InvalidResponse(format!("Bad screenshot payload: {}", e)))
    }

    /// Start streaming screencast frames, capped to the given dimensions.
    pub async fn start_screencast(&self, max_width: u32, max_height: u32) -> Result<(), CdpError> {
        self.call(
            "Page.startScreencast",
            Some(json!({
                "format": "png",
                "maxWidth": max_width,
                "maxHeight": max_height,
                "everyNthFrame": 1,
            })),
        )
        .await?;
        debug!("Screencast started ({}x{} max)", max_width, max_height);
        Ok(())
    }

    /// Acknowledge a screencast frame so Chrome keeps sending them.
    pub async fn ack_screencast_frame(&self, frame_session_id: i64) -> Result<(), CdpError> {
        self.call(
            "Page.screencastFrameAck",
            Some(json!({"sessionId": frame_session_id})),
        )
        .await?;
        Ok(())
    }

    /// Stop the screencast stream.
    pub async fn stop_screencast(&self) -> Result<(), CdpError> {
        self.call("Page.stopScreencast", None).await?;
        debug!("Screencast stopped");
        Ok(())
    }
}
