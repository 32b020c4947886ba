//! Page handle: navigation, DOM queries, input and readiness polling for
//! one attached tab.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::SinkExt;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use crate::client::{PendingRequest, WsSink};
use crate::error::BrowserError;
use crate::protocol::{BoxModel, CdpRequest, KeyEventType, MouseButton, MouseEventType};
use crate::wait::poll;

/// Default bound for readiness polls.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);
/// Interval between readiness probes.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

const CALL_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// A session attached to a single tab.
///
/// All quantity-control interaction on product cards goes through
/// [`PageTab::query_within`], which scopes a selector to one card's subtree.
pub struct PageTab {
    session_id: String,
    ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
    pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
    request_id: Arc<AtomicU64>,
}

impl PageTab {
    pub(crate) fn new(
        session_id: String,
        ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
        pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
        request_id: Arc<AtomicU64>,
    ) -> Self {
        Self {
            session_id,
            ws_tx,
            pending,
            request_id,
        }
    }

    /// Send a CDP command scoped to this tab's session.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, BrowserError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: Some(self.session_id.clone()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("CDP tab send: {json}");

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

    pub(crate) async fn enable_domains(&self) -> Result<(), BrowserError> {
        self.call("Page.enable", None).await?;
        self.call("DOM.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        self.call("Network.enable", None).await?;
        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Navigate and wait for the document to become usable.
    pub async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            if !error.is_empty() {
                return Err(BrowserError::NavigationFailed(error.to_string()));
            }
        }

        self.wait_for_load().await?;
        debug!("Navigated to {url}");
        Ok(())
    }

    /// Poll `document.readyState` until the page is interactive.
    pub async fn wait_for_load(&self) -> Result<(), BrowserError> {
        poll("page load", PAGE_LOAD_TIMEOUT, POLL_INTERVAL, || async move {
            let state = self.evaluate("document.readyState").await?;
            Ok(state
                .as_str()
                .is_some_and(|s| s == "complete" || s == "interactive")
                .then_some(()))
        })
        .await
    }

    pub async fn current_url(&self) -> Result<String, BrowserError> {
        let result = self.evaluate("window.location.href").await?;
        Ok(result.as_str().unwrap_or_default().to_string())
    }

    // ------------------------------------------------------------------
    // JavaScript
    // ------------------------------------------------------------------

    /// Evaluate an expression, returning its value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
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
            let text = exception["text"].as_str().unwrap_or("Unknown error");
            return Err(BrowserError::JavaScript(text.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    /// Call a function with the node as `this`, returning the result by
    /// value.
    pub async fn call_on_node(
        &self,
        node_id: i64,
        function: &str,
    ) -> Result<Value, BrowserError> {
        let resolved = self
            .call("DOM.resolveNode", Some(json!({"nodeId": node_id})))
            .await?;
        let object_id = resolved["object"]["objectId"]
            .as_str()
            .ok_or_else(|| BrowserError::InvalidResponse("missing objectId".to_string()))?;

        let result = self
            .call(
                "Runtime.callFunctionOn",
                Some(json!({
                    "objectId": object_id,
                    "functionDeclaration": function,
                    "returnByValue": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["text"].as_str().unwrap_or("Unknown error");
            return Err(BrowserError::JavaScript(text.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    /// Register a script evaluated before any page script on every new
    /// document.
    pub async fn add_init_script(&self, source: &str) -> Result<(), BrowserError> {
        self.call(
            "Page.addScriptToEvaluateOnNewDocument",
            Some(json!({"source": source})),
        )
        .await?;
        Ok(())
    }

    pub async fn set_user_agent(
        &self,
        user_agent: &str,
        accept_language: Option<&str>,
    ) -> Result<(), BrowserError> {
        let mut params = json!({"userAgent": user_agent});
        if let Some(lang) = accept_language {
            params["acceptLanguage"] = json!(lang);
        }
        self.call("Network.setUserAgentOverride", Some(params))
            .await?;
        Ok(())
    }

    pub async fn set_timezone(&self, timezone_id: &str) -> Result<(), BrowserError> {
        self.call(
            "Emulation.setTimezoneOverride",
            Some(json!({"timezoneId": timezone_id})),
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // DOM queries
    // ------------------------------------------------------------------

    /// Node id of the document root.
    async fn document_node(&self) -> Result<i64, BrowserError> {
        let result = self.call("DOM.getDocument", Some(json!({"depth": 0}))).await?;
        result["root"]["nodeId"]
            .as_i64()
            .ok_or_else(|| BrowserError::InvalidResponse("missing document nodeId".to_string()))
    }

    /// First match for `selector` anywhere in the document.
    pub async fn query_selector(&self, selector: &str) -> Result<Option<i64>, BrowserError> {
        let root = self.document_node().await?;
        self.query_within(root, selector).await
    }

    /// All matches for `selector` anywhere in the document, in DOM order.
    pub async fn query_selector_all(&self, selector: &str) -> Result<Vec<i64>, BrowserError> {
        let root = self.document_node().await?;
        self.query_within_all(root, selector).await
    }

    /// First match for `selector` inside the subtree rooted at `node_id`.
    ///
    /// This is the containment primitive: resolving a control relative to
    /// its own card node instead of the whole document.
    pub async fn query_within(
        &self,
        node_id: i64,
        selector: &str,
    ) -> Result<Option<i64>, BrowserError> {
        let result = self
            .call(
                "DOM.querySelector",
                Some(json!({"nodeId": node_id, "selector": selector})),
            )
            .await?;

        match result["nodeId"].as_i64() {
            Some(0) | None => Ok(None),
            Some(id) => Ok(Some(id)),
        }
    }

    /// All matches for `selector` inside the subtree rooted at `node_id`.
    pub async fn query_within_all(
        &self,
        node_id: i64,
        selector: &str,
    ) -> Result<Vec<i64>, BrowserError> {
        let result = self
            .call(
                "DOM.querySelectorAll",
                Some(json!({"nodeId": node_id, "selector": selector})),
            )
            .await?;

        Ok(result["nodeIds"]
            .as_array()
            .map(|arr| arr.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default())
    }

    /// First selector from `selectors` that currently matches, with its
    /// node. Storefront markup drifts; adapters probe a fallback chain.
    pub async fn find_first(
        &self,
        selectors: &[&str],
    ) -> Result<Option<(String, i64)>, BrowserError> {
        for selector in selectors {
            if let Some(node_id) = self.query_selector(selector).await? {
                return Ok(Some((selector.to_string(), node_id)));
            }
        }
        Ok(None)
    }

    /// Rendered text of a node.
    pub async fn inner_text(&self, node_id: i64) -> Result<String, BrowserError> {
        let value = self
            .call_on_node(node_id, "function() { return this.innerText; }")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Box model for a node; `None` when the node is not rendered.
    pub async fn box_model(&self, node_id: i64) -> Result<Option<BoxModel>, BrowserError> {
        let result = self
            .call("DOM.getBoxModel", Some(json!({"nodeId": node_id})))
            .await;

        match result {
            Ok(r) => {
                let model: BoxModel = serde_json::from_value(r["model"].clone())?;
                Ok(Some(model))
            }
            // -32000: node has no layout (hidden or detached).
            Err(BrowserError::Protocol { code: -32000, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn is_visible(&self, node_id: i64) -> Result<bool, BrowserError> {
        Ok(self.box_model(node_id).await?.is_some())
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Click at viewport coordinates.
    pub async fn click(&self, x: f64, y: f64) -> Result<(), BrowserError> {
        for event_type in [MouseEventType::MousePressed, MouseEventType::MouseReleased] {
            self.call(
                "Input.dispatchMouseEvent",
                Some(json!({
                    "type": event_type,
                    "x": x,
                    "y": y,
                    "button": MouseButton::Left,
                    "clickCount": 1,
                })),
            )
            .await?;
        }
        trace!("Clicked at ({x}, {y})");
        Ok(())
    }

    /// Scroll a node into view and click its center.
    pub async fn click_node(&self, node_id: i64) -> Result<(), BrowserError> {
        let scroll = self
            .call(
                "DOM.scrollIntoViewIfNeeded",
                Some(json!({"nodeId": node_id})),
            )
            .await;
        // A node that refuses to scroll may still be clickable; the box
        // model probe below is the real gate.
        if let Err(BrowserError::Protocol { .. }) = scroll {
            trace!("scrollIntoViewIfNeeded failed for node {node_id}");
        } else {
            scroll?;
        }

        let model = self
            .box_model(node_id)
            .await?
            .ok_or_else(|| BrowserError::ElementNotFound(format!("node {node_id} (not visible)")))?;

        let (x, y) = model.content_center();
        self.click(x, y).await
    }

    pub async fn focus(&self, node_id: i64) -> Result<(), BrowserError> {
        self.call("DOM.focus", Some(json!({"nodeId": node_id})))
            .await?;
        Ok(())
    }

    /// Insert text at the current focus.
    pub async fn type_text(&self, text: &str) -> Result<(), BrowserError> {
        self.call("Input.insertText", Some(json!({"text": text})))
            .await?;
        Ok(())
    }

    /// Press and release a key.
    pub async fn press_key(&self, key: &str) -> Result<(), BrowserError> {
        for event_type in [KeyEventType::KeyDown, KeyEventType::KeyUp] {
            self.call(
                "Input.dispatchKeyEvent",
                Some(json!({"type": event_type, "key": key})),
            )
            .await?;
        }
        Ok(())
    }

    /// Select-all in the focused element (Ctrl+A; modifier bit 2 is Ctrl).
    async fn select_all(&self) -> Result<(), BrowserError> {
        for event_type in [KeyEventType::KeyDown, KeyEventType::KeyUp] {
            self.call(
                "Input.dispatchKeyEvent",
                Some(json!({"type": event_type, "key": "a", "modifiers": 2})),
            )
            .await?;
        }
        Ok(())
    }

    /// Replace a node's current value with `value`.
    pub async fn fill_node(&self, node_id: i64, value: &str) -> Result<(), BrowserError> {
        self.focus(node_id).await?;
        self.select_all().await?;
        self.type_text(value).await
    }

    // ------------------------------------------------------------------
    // Text matching
    // ------------------------------------------------------------------
    //
    // Storefront buttons are often reachable only by their rendered label
    // ("Sepete Ekle", "Kabul Et"), which CSS selectors cannot express.
    // These run a small matcher in the page; the match is case-insensitive
    // and visibility means the element has at least one client rect.

    fn text_matcher(tags: &str, needle: &str, act: bool) -> Result<String, BrowserError> {
        Ok(format!(
            r#"(() => {{
                const needle = {}.toLowerCase();
                for (const el of document.querySelectorAll({})) {{
                    const text = (el.innerText || '').trim().toLowerCase();
                    if (text.includes(needle) && el.getClientRects().length > 0) {{
                        {}
                        return true;
                    }}
                }}
                return false;
            }})()"#,
            serde_json::to_string(needle)?,
            serde_json::to_string(tags)?,
            if act { "el.click();" } else { "" },
        ))
    }

    /// Whether a visible element matching `tags` contains `needle`.
    pub async fn text_visible(&self, tags: &str, needle: &str) -> Result<bool, BrowserError> {
        let script = Self::text_matcher(tags, needle, false)?;
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }

    /// Click the first visible element matching `tags` that contains
    /// `needle`. Returns whether anything was clicked.
    pub async fn click_text(&self, tags: &str, needle: &str) -> Result<bool, BrowserError> {
        let script = Self::text_matcher(tags, needle, true)?;
        let clicked = self.evaluate(&script).await?.as_bool().unwrap_or(false);
        if clicked {
            debug!("Clicked element with text '{needle}'");
        }
        Ok(clicked)
    }

    /// Click the first visible descendant of `node_id` matching `tags` that
    /// contains `needle`. The search never leaves the node's subtree.
    pub async fn click_text_within(
        &self,
        node_id: i64,
        tags: &str,
        needle: &str,
    ) -> Result<bool, BrowserError> {
        let function = format!(
            r#"function() {{
                const needle = {}.toLowerCase();
                for (const el of this.querySelectorAll({})) {{
                    const text = (el.innerText || '').trim().toLowerCase();
                    if (text.includes(needle) && el.getClientRects().length > 0) {{
                        el.click();
                        return true;
                    }}
                }}
                return false;
            }}"#,
            serde_json::to_string(needle)?,
            serde_json::to_string(tags)?,
        );
        Ok(self
            .call_on_node(node_id, &function)
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    // ------------------------------------------------------------------
    // Readiness polling
    // ------------------------------------------------------------------

    /// Poll until `selector` matches, returning its node.
    pub async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<i64, BrowserError> {
        poll(
            &format!("selector '{selector}'"),
            timeout,
            POLL_INTERVAL,
            || self.query_selector(selector),
        )
        .await
    }

    /// Poll until `selector` stops matching.
    pub async fn wait_for_selector_gone(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        poll(
            &format!("selector '{selector}' to disappear"),
            timeout,
            POLL_INTERVAL,
            || async move { Ok(self.query_selector(selector).await?.is_none().then_some(())) },
        )
        .await
    }
}
