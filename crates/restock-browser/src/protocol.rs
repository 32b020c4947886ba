//! CDP wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing CDP command.
#[derive(Debug, Serialize)]
pub struct CdpRequest {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Incoming CDP message: either a command response (has `id`) or an event
/// (has `method`). Events are ignored by this client; readiness is polled.
#[derive(Debug, Deserialize)]
pub struct CdpMessage {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<CdpErrorBody>,
    pub method: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Error body inside a CDP response.
#[derive(Debug, Deserialize)]
pub struct CdpErrorBody {
    pub code: i64,
    pub message: String,
}

/// Browser version info from `/json/version`.
///
/// Chrome returns PascalCase field names for this endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserVersion {
    #[serde(rename = "Browser")]
    pub browser: String,
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,
    #[serde(rename = "User-Agent")]
    pub user_agent: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

/// Box model from `DOM.getBoxModel`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxModel {
    pub content: Vec<f64>,
    pub border: Vec<f64>,
    pub width: i64,
    pub height: i64,
}

impl BoxModel {
    /// Center point of the content quad.
    pub fn content_center(&self) -> (f64, f64) {
        quad_center(&self.content)
    }
}

/// Center point of an 8-element quad (x1 y1 x2 y2 x3 y3 x4 y4).
pub(crate) fn quad_center(quad: &[f64]) -> (f64, f64) {
    if quad.len() >= 8 {
        let x = (quad[0] + quad[2] + quad[4] + quad[6]) / 4.0;
        let y = (quad[1] + quad[3] + quad[5] + quad[7]) / 4.0;
        (x, y)
    } else {
        (0.0, 0.0)
    }
}

/// Mouse button for `Input.dispatchMouseEvent`.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
}

/// Mouse event type.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MouseEventType {
    MousePressed,
    MouseReleased,
}

/// Key event type.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyEventType {
    KeyDown,
    KeyUp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_center() {
        let quad = [0.0, 0.0, 10.0, 0.0, 10.0, 20.0, 0.0, 20.0];
        assert_eq!(quad_center(&quad), (5.0, 10.0));
    }

    #[test]
    fn test_quad_center_short_quad() {
        assert_eq!(quad_center(&[1.0, 2.0]), (0.0, 0.0));
    }

    #[test]
    fn test_parse_command_response() {
        let msg: CdpMessage =
            serde_json::from_str(r#"{"id":3,"result":{"nodeId":12}}"#).unwrap();
        assert_eq!(msg.id, Some(3));
        assert_eq!(msg.result.unwrap()["nodeId"], 12);
        assert!(msg.error.is_none());
    }

    #[test]
    fn test_parse_error_response() {
        let msg: CdpMessage = serde_json::from_str(
            r#"{"id":4,"error":{"code":-32000,"message":"No node with given id"}}"#,
        )
        .unwrap();
        let err = msg.error.unwrap();
        assert_eq!(err.code, -32000);
        assert!(err.message.contains("No node"));
    }

    #[test]
    fn test_parse_event_message() {
        let msg: CdpMessage = serde_json::from_str(
            r#"{"method":"Page.loadEventFired","params":{"timestamp":1.0},"sessionId":"S1"}"#,
        )
        .unwrap();
        assert!(msg.id.is_none());
        assert_eq!(msg.method.as_deref(), Some("Page.loadEventFired"));
    }

    #[test]
    fn test_parse_browser_version() {
        let json = r#"{
            "Browser": "Chrome/131.0.6778.85",
            "Protocol-Version": "1.3",
            "User-Agent": "Mozilla/5.0",
            "V8-Version": "13.1",
            "WebKit-Version": "537.36",
            "webSocketDebuggerUrl": "ws://localhost:9222/devtools/browser/abc"
        }"#;
        let version: BrowserVersion = serde_json::from_str(json).unwrap();
        assert!(version.browser.starts_with("Chrome"));
        assert!(version.web_socket_debugger_url.starts_with("ws://"));
    }

    #[test]
    fn test_request_skips_absent_session_id() {
        let req = CdpRequest {
            id: 1,
            method: "Target.getTargets".to_string(),
            params: None,
            session_id: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("sessionId"));
        assert!(!json.contains("params"));
    }
}
