use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing CDP command.
#[derive(Debug, Serialize)]
pub struct CdpCommand {
    /// Message ID used to correlate the response.
    pub id: u64,
    /// CDP method name, e.g. `Page.navigate`.
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Session ID for target-scoped commands.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Incoming WebSocket message before classification. Responses carry an
/// `id`; events carry a `method` and no `id`.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub id: Option<u64>,
    pub method: Option<String>,
    pub params: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<CdpProtocolError>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Protocol-level error payload returned by the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpProtocolError {
    pub code: i64,
    pub message: String,
}

/// A response correlated to a previously sent command.
#[derive(Debug)]
pub struct CdpResponse {
    pub id: u64,
    pub result: Result<Value, CdpProtocolError>,
    pub session_id: Option<String>,
}

/// An asynchronous event pushed by the browser.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

pub enum MessageKind {
    Response(CdpResponse),
    Event(CdpEvent),
}

impl IncomingMessage {
    /// Classify as response or event; `None` for messages carrying neither
    /// an `id` nor a `method`.
    #[must_use]
    pub fn classify(self) -> Option<MessageKind> {
        if let Some(id) = self.id {
            let result = match self.error {
                Some(error) => Err(error),
                None => Ok(self.result.unwrap_or(Value::Null)),
            };
            Some(MessageKind::Response(CdpResponse {
                id,
                result,
                session_id: self.session_id,
            }))
        } else if let Some(method) = self.method {
            Some(MessageKind::Event(CdpEvent {
                method,
                params: self.params.unwrap_or(Value::Null),
                session_id: self.session_id,
            }))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialize_command_omits_absent_fields() {
        let cmd = CdpCommand {
            id: 1,
            method: "Browser.getVersion".into(),
            params: None,
            session_id: None,
        };
        let json: Value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["method"], "Browser.getVersion");
        assert!(json.get("params").is_none());
        assert!(json.get("sessionId").is_none());
    }

    #[test]
    fn serialize_command_with_params_and_session() {
        let cmd = CdpCommand {
            id: 7,
            method: "Page.navigate".into(),
            params: Some(json!({"url": "https://example.com"})),
            session_id: Some("sess-1".into()),
        };
        let json: Value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["params"]["url"], "https://example.com");
        assert_eq!(json["sessionId"], "sess-1");
    }

    #[test]
    fn classify_success_response() {
        let raw: IncomingMessage =
            serde_json::from_str(r#"{"id": 1, "result": {"frameId": "f1"}}"#).unwrap();
        let Some(MessageKind::Response(resp)) = raw.classify() else {
            panic!("expected response");
        };
        assert_eq!(resp.id, 1);
        assert_eq!(resp.result.unwrap()["frameId"], "f1");
    }

    #[test]
    fn classify_error_response() {
        let raw: IncomingMessage =
            serde_json::from_str(r#"{"id": 2, "error": {"code": -32000, "message": "nope"}}"#)
                .unwrap();
        let Some(MessageKind::Response(resp)) = raw.classify() else {
            panic!("expected response");
        };
        let err = resp.result.unwrap_err();
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "nope");
    }

    #[test]
    fn classify_event_with_session() {
        let raw: IncomingMessage = serde_json::from_str(
            r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.5}, "sessionId": "s"}"#,
        )
        .unwrap();
        let Some(MessageKind::Event(event)) = raw.classify() else {
            panic!("expected event");
        };
        assert_eq!(event.method, "Page.loadEventFired");
        assert_eq!(event.session_id.as_deref(), Some("s"));
    }

    #[test]
    fn classify_empty_message_is_none() {
        let raw: IncomingMessage = serde_json::from_str(r"{}").unwrap();
        assert!(raw.classify().is_none());
    }

    #[test]
    fn classify_response_without_result_yields_null() {
        let raw: IncomingMessage = serde_json::from_str(r#"{"id": 10}"#).unwrap();
        let Some(MessageKind::Response(resp)) = raw.classify() else {
            panic!("expected response");
        };
        assert_eq!(resp.result.unwrap(), Value::Null);
    }
}
