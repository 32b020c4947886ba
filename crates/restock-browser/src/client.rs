//! CDP WebSocket client.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};

use crate::error::BrowserError;
use crate::protocol::{BrowserVersion, CdpMessage, CdpRequest};
use crate::tab::PageTab;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// How long a single CDP command may stay unanswered.
const CALL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Pending command waiting for its response.
pub(crate) struct PendingRequest {
    pub tx: oneshot::Sender<Result<Value, BrowserError>>,
}

/// Client for one Chrome instance, connected to the browser-level
/// WebSocket endpoint.
///
/// Command dispatch is fire-and-await: each request gets an id, the receive
/// task resolves the matching oneshot when the response arrives. CDP events
/// are discarded; page readiness is polled through [`PageTab`] instead.
pub struct CdpClient {
    ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
    request_id: Arc<AtomicU64>,
    pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
    _recv_task: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to Chrome's debugging endpoint (e.g. `http://localhost:9222`).
    pub async fn connect(endpoint: &str) -> Result<Self, BrowserError> {
        let http_endpoint = endpoint.trim_end_matches('/').to_string();

        let version_url = format!("{http_endpoint}/json/version");
        debug!("Fetching browser version from {version_url}");

        let version: BrowserVersion = reqwest::get(&version_url)
            .await
            .map_err(|e| BrowserError::ChromeNotAvailable(format!("{endpoint}: {e}")))?
            .json()
            .await
            .map_err(|e| BrowserError::ChromeNotAvailable(format!("{endpoint}: {e}")))?;

        debug!("Connected to browser: {}", version.browser);

        let (ws_stream, _) = tokio_tungstenite::connect_async(&version.web_socket_debugger_url)
            .await
            .map_err(|e| BrowserError::ConnectionFailed(format!("WebSocket: {e}")))?;

        let (ws_sink, ws_source) = ws_stream.split();
        let ws_tx = Arc::new(tokio::sync::Mutex::new(ws_sink));
        let pending: Arc<Mutex<HashMap<u64, PendingRequest>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let recv_task = {
            let pending = pending.clone();
            tokio::spawn(async move {
                Self::receive_loop(ws_source, pending).await;
            })
        };

        Ok(Self {
            ws_tx,
            request_id: Arc::new(AtomicU64::new(1)),
            pending,
            _recv_task: recv_task,
        })
    }

    async fn receive_loop(mut ws_source: WsSource, pending: Arc<Mutex<HashMap<u64, PendingRequest>>>) {
        while let Some(msg) = ws_source.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    trace!("CDP recv: {text}");
                    match serde_json::from_str::<CdpMessage>(&text) {
                        Ok(msg) => {
                            let Some(id) = msg.id else {
                                // Event; nothing waits on these.
                                continue;
                            };
                            if let Some(req) = pending.lock().remove(&id) {
                                let result = match msg.error {
                                    Some(err) => Err(BrowserError::Protocol {
                                        code: err.code,
                                        message: err.message,
                                    }),
                                    None => Ok(msg.result.unwrap_or(Value::Null)),
                                };
                                let _ = req.tx.send(result);
                            }
                        }
                        Err(e) => warn!("Failed to parse CDP message: {e}"),
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("CDP WebSocket closed");
                    break;
                }
                Err(e) => {
                    error!("CDP WebSocket error: {e}");
                    break;
                }
                _ => {}
            }
        }
    }

    /// Send a CDP command and wait for its response.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value, BrowserError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(|s| s.to_string()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("CDP send: {json}");

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, PendingRequest { tx });

        {
            let mut ws = self.ws_tx.lock().await;
            ws.send(Message::Text(json.into())).await?;
        }

        match tokio::time::timeout(CALL_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BrowserError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(BrowserError::Timeout(format!("CDP response to {method}")))
            }
        }
    }

    /// Open a new tab and attach to it.
    pub async fn new_tab(&self, url: &str) -> Result<PageTab, BrowserError> {
        let result = self
            .call("Target.createTarget", Some(json!({"url": url})), None)
            .await?;

        let target_id = result["targetId"]
            .as_str()
            .ok_or_else(|| BrowserError::InvalidResponse("missing targetId".to_string()))?
            .to_string();

        debug!("Created tab {target_id}");
        self.attach(&target_id).await
    }

    /// Attach to an existing page target.
    pub async fn attach(&self, target_id: &str) -> Result<PageTab, BrowserError> {
        let result = self
            .call(
                "Target.attachToTarget",
                Some(json!({"targetId": target_id, "flatten": true})),
                None,
            )
            .await?;

        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| BrowserError::InvalidResponse("missing sessionId".to_string()))?
            .to_string();

        let tab = PageTab::new(
            session_id,
            self.ws_tx.clone(),
            self.pending.clone(),
            self.request_id.clone(),
        );
        tab.enable_domains().await?;
        Ok(tab)
    }

}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self._recv_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique_and_increasing() {
        let counter = AtomicU64::new(1);
        let a = counter.fetch_add(1, Ordering::SeqCst);
        let b = counter.fetch_add(1, Ordering::SeqCst);
        assert!(b > a);
    }
}
