//! JSON-RPC 2.0 envelopes as they travel over both MCP transports.

use std::fmt;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::warn;

pub const JSONRPC_VERSION: &str = "2.0";

/// Stable error codes. The `-320xx` range is ours.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    NoValidSession,
    RequestTimedOut,
    RequestCancelled,
    NoInspector,
}

impl RpcErrorCode {
    pub fn code(self) -> i64 {
        match self {
            RpcErrorCode::ParseError => -32700,
            RpcErrorCode::InvalidRequest => -32600,
            RpcErrorCode::MethodNotFound => -32601,
            RpcErrorCode::InvalidParams => -32602,
            RpcErrorCode::InternalError => -32603,
            RpcErrorCode::NoValidSession => -32000,
            RpcErrorCode::RequestTimedOut => -32001,
            RpcErrorCode::RequestCancelled => -32002,
            RpcErrorCode::NoInspector => -32003,
        }
    }

    pub fn error(self, message: impl Into<String>) -> JsonRpcError {
        JsonRpcError {
            code: self.code(),
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: JsonValue,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<JsonValue>,
}

impl JsonRpcRequest {
    pub fn new(id: JsonValue, method: impl Into<String>, params: Option<JsonValue>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: JsonValue, result: JsonValue) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: JsonValue, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn outcome(id: JsonValue, outcome: Result<JsonValue, JsonRpcError>) -> Self {
        match outcome {
            Ok(result) => Self::success(id, result),
            Err(error) => Self::failure(id, error),
        }
    }

    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(text) => text,
            Err(e) => {
                warn!(%e, "failed to encode JSON-RPC response");
                String::from(
                    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"response encoding failed"}}"#,
                )
            }
        }
    }

    pub fn into_http(self, status: StatusCode) -> Response {
        (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            self.to_json(),
        )
            .into_response()
    }
}

/// One message received from a client, classified by shape.
#[derive(Clone, Debug, PartialEq)]
pub enum Incoming {
    Request(JsonRpcRequest),
    Notification {
        method: String,
    },
    /// A client answering a request we sent it.
    Response {
        id: JsonValue,
        outcome: Result<JsonValue, JsonRpcError>,
    },
}

impl Incoming {
    /// Failures come back as the error envelope to send to the client.
    pub fn parse(text: &str) -> Result<Self, JsonRpcResponse> {
        let value: JsonValue = serde_json::from_str(text).map_err(|e| {
            JsonRpcResponse::failure(
                JsonValue::Null,
                RpcErrorCode::ParseError.error(format!("invalid JSON: {e}")),
            )
        })?;
        let JsonValue::Object(object) = value else {
            return Err(invalid(JsonValue::Null, "message must be a JSON object"));
        };
        Self::from_object(object)
    }

    fn from_object(mut object: JsonMap<String, JsonValue>) -> Result<Self, JsonRpcResponse> {
        let id = object.remove("id");
        if object.get("jsonrpc").and_then(JsonValue::as_str) != Some(JSONRPC_VERSION) {
            return Err(invalid(
                id.unwrap_or(JsonValue::Null),
                "`jsonrpc` must be \"2.0\"",
            ));
        }

        match (object.remove("method"), id) {
            (Some(JsonValue::String(method)), Some(id)) => Ok(Incoming::Request(JsonRpcRequest {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id,
                method,
                params: object.remove("params"),
            })),
            (Some(JsonValue::String(method)), None) => Ok(Incoming::Notification { method }),
            (Some(_), id) => Err(invalid(
                id.unwrap_or(JsonValue::Null),
                "`method` must be a string",
            )),
            (None, Some(id)) => {
                if let Some(error) = object.remove("error") {
                    let error = serde_json::from_value::<JsonRpcError>(error)
                        .map_err(|e| invalid(id.clone(), format!("malformed error object: {e}")))?;
                    return Ok(Incoming::Response {
                        id,
                        outcome: Err(error),
                    });
                }
                let result = object.remove("result").unwrap_or(JsonValue::Null);
                Ok(Incoming::Response {
                    id,
                    outcome: Ok(result),
                })
            }
            (None, None) => Err(invalid(JsonValue::Null, "message has neither method nor id")),
        }
    }

    pub fn is_initialize(&self) -> bool {
        matches!(self, Incoming::Request(request) if request.method == "initialize")
    }
}

fn invalid(id: JsonValue, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse::failure(id, RpcErrorCode::InvalidRequest.error(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_requests_notifications_and_responses() {
        let request =
            Incoming::parse(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).unwrap();
        assert!(matches!(request, Incoming::Request(ref r) if r.method == "tools/list"));

        let note =
            Incoming::parse(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert_eq!(
            note,
            Incoming::Notification {
                method: String::from("notifications/initialized")
            }
        );

        let response =
            Incoming::parse(r#"{"jsonrpc":"2.0","id":"fwd-1","result":{"ok":true}}"#).unwrap();
        assert_eq!(
            response,
            Incoming::Response {
                id: json!("fwd-1"),
                outcome: Ok(json!({"ok": true})),
            }
        );

        let failed = Incoming::parse(
            r#"{"jsonrpc":"2.0","id":"fwd-2","error":{"code":-32002,"message":"gone"}}"#,
        )
        .unwrap();
        assert!(matches!(failed, Incoming::Response { outcome: Err(ref e), .. } if e.code == -32002));
    }

    #[test]
    fn garbage_is_a_parse_error_with_null_id() {
        let err = Incoming::parse("{not json").unwrap_err();
        assert_eq!(err.id, JsonValue::Null);
        assert_eq!(err.error.map(|e| e.code), Some(-32700));
    }

    #[test]
    fn wrong_version_keeps_the_request_id() {
        let err = Incoming::parse(r#"{"jsonrpc":"1.0","id":7,"method":"ping"}"#).unwrap_err();
        assert_eq!(err.id, json!(7));
        assert_eq!(err.error.map(|e| e.code), Some(-32600));
    }

    #[test]
    fn error_envelope_omits_result() {
        let text = JsonRpcResponse::failure(
            json!(3),
            RpcErrorCode::NoValidSession.error("Bad Request: No valid session ID provided"),
        )
        .to_json();
        assert_eq!(
            text,
            r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32000,"message":"Bad Request: No valid session ID provided"}}"#
        );
    }
}
