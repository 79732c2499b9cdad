//! JSON-RPC 2.0 message envelope.
//!
//! Both transports exchange one wire type: [`Message`]. It represents a
//! request, a notification, or a response, plus the standard JSON-RPC error
//! object. Opaque fields (`id`, `params`, `result`, error `data`) are kept as
//! [`serde_json::Value`] so round-tripping never normalizes whitespace or
//! re-encodes numbers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard JSON-RPC 2.0 error codes.
pub mod error_code {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(error_code::INTERNAL_ERROR, message)
    }
}

/// A JSON-RPC 2.0 request, notification, or response.
///
/// `result` and `error` are mutually exclusive; a message with no `id` is a
/// notification and never produces a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

/// Errors raised while decoding a [`Message`] from wire text.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Message {
    pub fn request(id: serde_json::Value, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: Some(method.into()),
            params,
            result: None,
            error: None,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: Some(method.into()),
            params,
            result: None,
            error: None,
        }
    }

    pub fn response(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    pub fn error_response(id: Option<serde_json::Value>, error: ErrorObject) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: None,
            params: None,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_notification(&self) -> bool {
        self.method.is_some() && self.id.is_none()
    }

    pub fn is_request(&self) -> bool {
        self.method.is_some() && self.id.is_some()
    }

    pub fn is_response(&self) -> bool {
        self.method.is_none() && (self.result.is_some() || self.error.is_some())
    }

    /// Decode a single envelope from wire text.
    pub fn decode(text: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode this envelope to wire text.
    pub fn encode(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_request() {
        let msg = Message::request(serde_json::json!(1), "tools/call", Some(serde_json::json!({"a": 1})));
        let text = msg.encode().unwrap();
        let back = Message::decode(&text).unwrap();
        assert_eq!(msg, back);
        assert!(back.is_request());
    }

    #[test]
    fn notification_has_no_id() {
        let msg = Message::notification("notifications/initialized", None);
        assert!(msg.is_notification());
        assert!(!msg.is_request());
        let text = msg.encode().unwrap();
        assert!(!text.contains("\"id\""));
    }

    #[test]
    fn omits_absent_fields_on_wire() {
        let msg = Message::request(serde_json::json!("x"), "ping", None);
        let text = msg.encode().unwrap();
        assert!(!text.contains("params"));
        assert!(!text.contains("result"));
        assert!(!text.contains("error"));
    }

    #[test]
    fn preserves_null_id() {
        let msg = Message::error_response(Some(serde_json::Value::Null), ErrorObject::new(error_code::PARSE_ERROR, "bad json"));
        let text = msg.encode().unwrap();
        let back = Message::decode(&text).unwrap();
        assert_eq!(back.id, Some(serde_json::Value::Null));
    }

    #[test]
    fn decode_invalid_json_is_parse_error() {
        let err = Message::decode("not json").unwrap_err();
        assert!(matches!(err, MessageError::Parse(_)));
    }

    #[test]
    fn result_and_error_are_distinct_fields() {
        let resp = Message::response(serde_json::json!(1), serde_json::json!({"ok": true}));
        assert!(resp.is_response());
        assert!(resp.error.is_none());
    }
}
