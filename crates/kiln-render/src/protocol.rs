//! DevTools protocol message types.
//!
//! Only the handful of messages kiln needs: command envelopes with
//! monotonically assigned ids, the response/event envelope coming back,
//! and the target description returned by the HTTP discovery endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A protocol command sent over the debugger socket.
#[derive(Debug, Clone, Serialize)]
pub struct Command {
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl Command {
    pub fn new(id: u64, method: &'static str, params: Value) -> Self {
        Self { id, method, params }
    }
}

/// Error member of a command response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolError {
    pub code: i64,
    pub message: String,
}

/// Everything the browser sends back: command responses carry `id`,
/// events carry `method`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: Option<u64>,

    #[serde(default)]
    pub method: Option<String>,

    #[serde(default)]
    pub result: Option<Value>,

    #[serde(default)]
    pub error: Option<ProtocolError>,

    #[serde(default)]
    pub params: Option<Value>,
}

impl Envelope {
    pub fn is_response_to(&self, command_id: u64) -> bool {
        self.id == Some(command_id)
    }

    pub fn is_event(&self, method: &str) -> bool {
        self.method.as_deref() == Some(method)
    }
}

/// A debuggable target as reported by `/json/new` and `/json/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetInfo {
    pub id: String,

    #[serde(default)]
    pub url: String,

    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_omits_null_params() {
        let cmd = Command::new(1, "Page.enable", Value::Null);

        let json = serde_json::to_string(&cmd).unwrap();

        assert_eq!(json, r#"{"id":1,"method":"Page.enable"}"#);
    }

    #[test]
    fn command_serializes_params() {
        let cmd = Command::new(2, "Page.navigate", json!({"url": "http://localhost/"}));

        let json = serde_json::to_value(&cmd).unwrap();

        assert_eq!(json["params"]["url"], "http://localhost/");
    }

    #[test]
    fn parses_response_envelope() {
        let raw = r#"{"id":2,"result":{"frameId":"F1"}}"#;

        let envelope: Envelope = serde_json::from_str(raw).unwrap();

        assert!(envelope.is_response_to(2));
        assert!(!envelope.is_event("Page.loadEventFired"));
        assert_eq!(envelope.result.unwrap()["frameId"], "F1");
    }

    #[test]
    fn parses_error_envelope() {
        let raw = r#"{"id":3,"error":{"code":-32000,"message":"Cannot navigate"}}"#;

        let envelope: Envelope = serde_json::from_str(raw).unwrap();

        assert_eq!(envelope.error.unwrap().message, "Cannot navigate");
    }

    #[test]
    fn parses_event_envelope() {
        let raw = r#"{"method":"Page.loadEventFired","params":{"timestamp":12.5}}"#;

        let envelope: Envelope = serde_json::from_str(raw).unwrap();

        assert!(envelope.is_event("Page.loadEventFired"));
        assert!(envelope.id.is_none());
    }

    #[test]
    fn parses_target_info() {
        let raw = r#"{
            "id": "ABC123",
            "url": "about:blank",
            "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/ABC123"
        }"#;

        let target: TargetInfo = serde_json::from_str(raw).unwrap();

        assert_eq!(target.id, "ABC123");
        assert!(target.web_socket_debugger_url.starts_with("ws://"));
    }
}
