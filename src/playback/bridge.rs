//! Voice bridge transport
//!
//! Talks to a voice-call bridge sidecar over HTTP. The bridge owns the
//! MTProto call session; this side only issues control requests and polls
//! for stream-ended events.

use super::transport::{MediaTransport, TransportError, TransportEvent};
use crate::config::BRIDGE_HTTP_TIMEOUT_SECS;
use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Event as reported by the bridge
#[derive(Debug, Deserialize)]
struct BridgeEvent {
    chat_id: i64,
    kind: String,
}

/// HTTP client for the voice-call bridge
#[derive(Debug, Clone)]
pub struct BridgeTransport {
    client: HttpClient,
    base_url: String,
}

impl BridgeTransport {
    /// Create a transport for the bridge at `base_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built. Falling back to
    /// a default client would drop the request timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(BRIDGE_HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn call_url(&self, chat_id: i64, action: Option<&str>) -> String {
        match action {
            Some(action) => format!("{}/calls/{chat_id}/{action}", self.base_url),
            None => format!("{}/calls/{chat_id}", self.base_url),
        }
    }

    async fn send(request: RequestBuilder) -> Result<(), TransportError> {
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND {
            return Err(TransportError::NoSession);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Rejected(format!(
            "{status} - {}",
            crate::utils::truncate_str(body.trim(), 300)
        )))
    }

    /// Fetch pending events once
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Network` when the bridge is unreachable or
    /// answers with something that is not an event list.
    pub async fn poll_events(&self) -> Result<Vec<TransportEvent>, TransportError> {
        let response = self
            .client
            .get(format!("{}/events", self.base_url))
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Network(format!(
                "event poll returned {}",
                response.status()
            )));
        }

        let events: Vec<BridgeEvent> = response
            .json()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(events
            .into_iter()
            .filter_map(|event| match event.kind.as_str() {
                "stream_ended" => Some(TransportEvent::StreamEnded(event.chat_id)),
                other => {
                    debug!(kind = other, chat_id = event.chat_id, "Ignoring bridge event");
                    None
                }
            })
            .collect())
    }

    /// Poll the bridge and forward events until cancelled or the receiver is gone
    pub async fn forward_events(
        self,
        tx: mpsc::Sender<TransportEvent>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        info!(bridge = %self.base_url, "Listening for bridge events");
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.poll_events().await {
                Ok(events) => {
                    for event in events {
                        if tx.send(event).await.is_err() {
                            debug!("Event receiver dropped, stopping bridge listener");
                            return;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Failed to poll bridge events"),
            }
        }
        info!("Bridge event listener stopped");
    }
}

#[async_trait]
impl MediaTransport for BridgeTransport {
    async fn start_session(&self, chat_id: i64, file: &Path) -> Result<(), TransportError> {
        // The bridge runs on the same host and reads the file itself
        let file = tokio::fs::canonicalize(file)
            .await
            .unwrap_or_else(|_| file.to_path_buf());
        let request = self
            .client
            .post(self.call_url(chat_id, Some("play")))
            .json(&json!({ "file": file.to_string_lossy() }));
        Self::send(request).await
    }

    async fn pause_session(&self, chat_id: i64) -> Result<(), TransportError> {
        Self::send(self.client.post(self.call_url(chat_id, Some("pause")))).await
    }

    async fn resume_session(&self, chat_id: i64) -> Result<(), TransportError> {
        Self::send(self.client.post(self.call_url(chat_id, Some("resume")))).await
    }

    async fn end_session(&self, chat_id: i64) -> Result<(), TransportError> {
        Self::send(self.client.delete(self.call_url(chat_id, None))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_urls() -> Result<(), reqwest::Error> {
        let bridge = BridgeTransport::new("http://127.0.0.1:8090/")?;
        assert_eq!(
            bridge.call_url(-100_123, Some("play")),
            "http://127.0.0.1:8090/calls/-100123/play"
        );
        assert_eq!(
            bridge.call_url(-100_123, None),
            "http://127.0.0.1:8090/calls/-100123"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_bridge_is_network_error() -> Result<(), reqwest::Error> {
        // Port 9 (discard) is closed on test machines
        let bridge = BridgeTransport::new("http://127.0.0.1:9")?;
        assert!(matches!(
            bridge.pause_session(1).await,
            Err(TransportError::Network(_))
        ));
        Ok(())
    }
}
