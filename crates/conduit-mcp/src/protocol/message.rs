//! JSON-RPC 2.0 Message Model and Codec
//!
//! Immutable records for requests, responses, and notifications, plus the
//! classification codec that turns raw bytes into exactly one of the three
//! shapes or a typed [`ProtocolError`].
//!
//! Two properties of the codec matter to everything above it:
//!
//! - Request ids are polymorphic on the wire (string, number, or null for
//!   parse-error replies) and normalized to strings internally. A numeric
//!   `42` becomes the id `"42"`; string ids round-trip untouched.
//! - A response carries exactly one of `result` / `error`; the absent one
//!   is omitted from the wire entirely.
//!
//! # Examples
//!
//! ```rust
//! use conduit_mcp::protocol::{JsonRpcMessage, JsonRpcRequest, JsonRpcCodec, RequestId};
//! use serde_json::json;
//!
//! let request = JsonRpcRequest::new("ping", Some(json!({"probe": true})), RequestId::new("req-1"));
//! let wire = request.to_json().unwrap();
//!
//! match JsonRpcMessage::from_json(&wire).unwrap() {
//!     JsonRpcMessage::Request(parsed) => assert_eq!(parsed, request),
//!     other => panic!("expected a request, got {other:?}"),
//! }
//! ```

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use bytes::{BufMut, Bytes, BytesMut};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

// Layer 3: Internal module imports
use crate::protocol::constants::error_codes;
use crate::protocol::errors::{JsonRpcError, ProtocolError, ProtocolResult};

/// Request identifier, normalized to a string
///
/// JSON-RPC 2.0 allows ids to be strings, numbers, or null. This type
/// accepts all numeric forms at the codec boundary and stores the decimal
/// rendering, so `0`, `-1`, `9223372036854775807`, and `123.456` all
/// survive a round trip as `"0"`, `"-1"`, `"9223372036854775807"`, and
/// `"123.456"`. Null ids are represented as `Option<RequestId>` on the
/// response record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Create a request id from a string
    pub fn new(id: impl Into<String>) -> Self {
        RequestId(id.into())
    }

    /// Get the normalized string form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        RequestId(id)
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(s) => Ok(RequestId(s)),
            // serde_json renders numbers in their canonical decimal form,
            // which is exactly the normalization the protocol wants.
            Value::Number(n) => Ok(RequestId(n.to_string())),
            other => Err(de::Error::custom(format!(
                "request id must be a string or number, got {other}"
            ))),
        }
    }
}

/// Error object carried inside `Response.error`
///
/// The `code` is drawn from the JSON-RPC taxonomy; `data` is free-form
/// diagnostic context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Numeric JSON-RPC error code
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Optional structured diagnostic data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Create an error object with an explicit code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach diagnostic data
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Parse error (-32700)
    pub fn parse_error() -> Self {
        Self::new(error_codes::PARSE_ERROR, "Parse error")
    }

    /// Invalid request (-32600)
    pub fn invalid_request() -> Self {
        Self::new(error_codes::INVALID_REQUEST, "Invalid Request")
    }

    /// Method not found (-32601)
    pub fn method_not_found() -> Self {
        Self::new(error_codes::METHOD_NOT_FOUND, "Method not found")
    }

    /// Invalid params (-32602)
    pub fn invalid_params() -> Self {
        Self::new(error_codes::INVALID_PARAMS, "Invalid params")
    }

    /// Internal error (-32603)
    pub fn internal_error() -> Self {
        Self::new(error_codes::INTERNAL_ERROR, "Internal error")
    }
}

impl From<JsonRpcError> for ErrorObject {
    fn from(err: JsonRpcError) -> Self {
        let code = err.error_code();
        match err {
            JsonRpcError::ParseError { .. } => Self::parse_error(),
            JsonRpcError::InvalidRequest { message } => {
                Self::invalid_request().with_data(Value::String(message))
            }
            JsonRpcError::MethodNotFound { method } => {
                Self::method_not_found().with_data(Value::String(method))
            }
            JsonRpcError::InvalidParams { message } => {
                Self::invalid_params().with_data(Value::String(message))
            }
            JsonRpcError::InternalError { message } => {
                Self::internal_error().with_data(Value::String(message))
            }
            JsonRpcError::ServerError { message, .. } => Self::new(code, message),
        }
    }
}

/// JSON-RPC 2.0 request message
///
/// Has both `method` and `id`; `params` stays a raw [`Value`] until a
/// handler binds it against its declared shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    /// Protocol marker, always `"2.0"`
    pub jsonrpc: String,

    /// Name of the method to invoke
    pub method: String,

    /// Raw parameters (object or array), omitted when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// Correlation identifier
    pub id: RequestId,
}

impl JsonRpcRequest {
    /// Create a new request
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 notification message
///
/// A request without an `id`: fire-and-forget, no response is ever
/// generated for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    /// Protocol marker, always `"2.0"`
    pub jsonrpc: String,

    /// Name of the notification method
    pub method: String,

    /// Raw parameters, omitted when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response message
///
/// Exactly one of `result` / `error` is present; the other is omitted on
/// the wire. `id` is null only for parse-error replies where the original
/// id could not be recovered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    /// Protocol marker, always `"2.0"`
    pub jsonrpc: String,

    /// Successful result, mutually exclusive with `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error object, mutually exclusive with `result`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,

    /// Id of the originating request, serialized as null when unknown
    #[serde(default)]
    pub id: Option<RequestId>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id: Some(id),
        }
    }

    /// Create an error response
    ///
    /// `id` is `None` only when the originating id could not be recovered
    /// (parse errors); the response then carries `"id": null`.
    pub fn error(error: ErrorObject, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// Unified JSON-RPC message, classified at decode time
///
/// Serialization is transparent (the variant's own shape); decoding goes
/// through [`JsonRpcMessage::from_value`], which enforces the `jsonrpc`
/// marker and the structural rules distinguishing the three shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// Request (has method and id)
    Request(JsonRpcRequest),
    /// Notification (has method, no id)
    Notification(JsonRpcNotification),
    /// Response (has result or error)
    Response(JsonRpcResponse),
}

impl JsonRpcMessage {
    /// Classify a decoded JSON value into one of the three message shapes
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidMessage`] when the value is not an
    /// object, lacks `jsonrpc: "2.0"`, or does not match any shape, and
    /// [`ProtocolError::Parse`] never (the value is already parsed).
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        enum Shape {
            Request,
            Notification,
            Response,
        }

        let shape = {
            let object = value
                .as_object()
                .ok_or_else(|| ProtocolError::invalid_message("message is not a JSON object"))?;

            match object.get("jsonrpc").and_then(Value::as_str) {
                Some("2.0") => {}
                Some(version) => {
                    return Err(ProtocolError::invalid_message(format!(
                        "unsupported jsonrpc version: {version}"
                    )))
                }
                None => return Err(ProtocolError::invalid_message("missing jsonrpc field")),
            }

            if object.contains_key("method") {
                match object.get("id") {
                    Some(Value::Null) => {
                        return Err(ProtocolError::invalid_message(
                            "request id must not be null",
                        ))
                    }
                    Some(_) => Shape::Request,
                    None => Shape::Notification,
                }
            } else if object.contains_key("result") || object.contains_key("error") {
                let has_error = object.get("error").is_some_and(|e| !e.is_null());
                if object.contains_key("result") && has_error {
                    return Err(ProtocolError::invalid_message(
                        "response carries both result and error",
                    ));
                }
                Shape::Response
            } else {
                return Err(ProtocolError::invalid_message(
                    "message is neither a request, notification, nor response",
                ));
            }
        };

        match shape {
            Shape::Request => serde_json::from_value(value)
                .map(JsonRpcMessage::Request)
                .map_err(|e| ProtocolError::invalid_message(e.to_string())),
            Shape::Notification => serde_json::from_value(value)
                .map(JsonRpcMessage::Notification)
                .map_err(|e| ProtocolError::invalid_message(e.to_string())),
            Shape::Response => serde_json::from_value(value)
                .map(JsonRpcMessage::Response)
                .map_err(|e| ProtocolError::invalid_message(e.to_string())),
        }
    }

    /// Decode a message from a JSON string
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Parse`] for invalid JSON,
    /// [`ProtocolError::InvalidMessage`] for shape violations.
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Decode a message from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// True if this is a request
    pub fn is_request(&self) -> bool {
        matches!(self, JsonRpcMessage::Request(_))
    }

    /// True if this is a notification
    pub fn is_notification(&self) -> bool {
        matches!(self, JsonRpcMessage::Notification(_))
    }

    /// True if this is a response
    pub fn is_response(&self) -> bool {
        matches!(self, JsonRpcMessage::Response(_))
    }

    /// Method name for requests and notifications
    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.method),
            JsonRpcMessage::Notification(n) => Some(&n.method),
            JsonRpcMessage::Response(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        JsonRpcMessage::from_value(value).map_err(de::Error::custom)
    }
}

/// Serialization helpers shared by all message types
///
/// Any `Serialize + Deserialize` message gets JSON string and byte-buffer
/// conversions for free; transports use the byte form to avoid an
/// intermediate `String` per message.
pub trait JsonRpcCodec: Serialize + for<'de> Deserialize<'de> {
    /// Serialize this message to a JSON string
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize this message to pretty-printed JSON (debugging, logs)
    fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from a JSON string
    fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize directly into a byte buffer, skipping the String detour
    fn serialize_to_buffer(&self, buffer: &mut BytesMut) -> Result<(), serde_json::Error> {
        serde_json::to_writer(buffer.writer(), self)
    }

    /// Serialize this message to frozen bytes
    fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        let mut buffer = BytesMut::with_capacity(256);
        self.serialize_to_buffer(&mut buffer)?;
        Ok(buffer.freeze())
    }
}

impl JsonRpcCodec for JsonRpcRequest {}
impl JsonRpcCodec for JsonRpcNotification {}
impl JsonRpcCodec for JsonRpcResponse {}
impl JsonRpcCodec for JsonRpcMessage {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_id_round_trips_untouched() {
        let id: RequestId = serde_json::from_value(json!("req-123")).unwrap();
        assert_eq!(id.as_str(), "req-123");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("req-123"));
    }

    #[test]
    fn numeric_ids_normalize_to_strings() {
        for (wire, expected) in [
            (json!(0), "0"),
            (json!(-1), "-1"),
            (json!(9_223_372_036_854_775_807_i64), "9223372036854775807"),
            (json!(123.456), "123.456"),
        ] {
            let id: RequestId = serde_json::from_value(wire).unwrap();
            assert_eq!(id.as_str(), expected);
        }
    }

    #[test]
    fn boolean_id_is_rejected() {
        let result: Result<RequestId, _> = serde_json::from_value(json!(true));
        assert!(result.is_err());
    }

    #[test]
    fn request_round_trip() {
        let request = JsonRpcRequest::new(
            "tools/call",
            Some(json!({"name": "add", "arguments": {"a": 5, "b": 3}})),
            RequestId::new("42"),
        );
        let wire = request.to_json().unwrap();
        let parsed = JsonRpcRequest::from_json_str(&wire).unwrap();
        assert_eq!(request, parsed);
    }

    #[test]
    fn response_omits_the_absent_plane() {
        let success = JsonRpcResponse::success(json!({"ok": true}), RequestId::new("1"));
        let wire = success.to_json().unwrap();
        assert!(wire.contains("result"));
        assert!(!wire.contains("error"));

        let failure = JsonRpcResponse::error(ErrorObject::method_not_found(), Some(RequestId::new("1")));
        let wire = failure.to_json().unwrap();
        assert!(wire.contains("error"));
        assert!(!wire.contains("result"));
        assert!(wire.contains("Method not found"));
    }

    #[test]
    fn parse_error_response_serializes_null_id() {
        let response = JsonRpcResponse::error(ErrorObject::parse_error(), None);
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["id"], Value::Null);
        assert_eq!(wire["error"]["code"], json!(-32700));
    }

    #[test]
    fn classification_distinguishes_all_three_shapes() {
        let request = JsonRpcMessage::from_json(r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).unwrap();
        assert!(request.is_request());
        assert_eq!(request.method(), Some("ping"));

        let notification =
            JsonRpcMessage::from_json(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(notification.is_notification());

        let response =
            JsonRpcMessage::from_json(r#"{"jsonrpc":"2.0","result":"pong","id":"1"}"#).unwrap();
        assert!(response.is_response());
    }

    #[test]
    fn missing_jsonrpc_is_a_typed_error() {
        let err = JsonRpcMessage::from_json(r#"{"method":"ping","id":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage { .. }));

        let err = JsonRpcMessage::from_json(r#"{"jsonrpc":"1.0","method":"ping","id":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage { .. }));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let err = JsonRpcMessage::from_json("{oops").unwrap_err();
        assert!(matches!(err, ProtocolError::Parse { .. }));
    }

    #[test]
    fn unclassifiable_object_is_rejected() {
        let err = JsonRpcMessage::from_json(r#"{"jsonrpc":"2.0","banana":true}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage { .. }));
    }

    #[test]
    fn numeric_request_id_normalizes_through_the_message() {
        let message = JsonRpcMessage::from_json(r#"{"jsonrpc":"2.0","method":"ping","id":7}"#).unwrap();
        match message {
            JsonRpcMessage::Request(request) => assert_eq!(request.id.as_str(), "7"),
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn response_with_both_planes_is_rejected() {
        let err = JsonRpcMessage::from_json(
            r#"{"jsonrpc":"2.0","result":1,"error":{"code":-32603,"message":"x"},"id":1}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage { .. }));
    }

    #[test]
    fn message_serializes_transparently() {
        let message = JsonRpcMessage::Notification(JsonRpcNotification::new("tick", None));
        let wire = message.to_json().unwrap();
        assert_eq!(wire, r#"{"jsonrpc":"2.0","method":"tick"}"#);
    }

    #[test]
    fn to_bytes_matches_to_json() {
        let request = JsonRpcRequest::new("ping", None, RequestId::new("b"));
        let bytes = request.to_bytes().unwrap();
        assert_eq!(bytes, Bytes::from(request.to_json().unwrap()));
    }
}
