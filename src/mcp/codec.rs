//! Line codec for JSON-RPC envelopes.
//!
//! One envelope per line. Decoding validates the JSON-RPC 2.0 shape before
//! handing back a typed [`Message`]; encoding produces compact single-line JSON.

use serde_json::{Map, Value};

use crate::error::Result;
use crate::mcp::protocol::{
    ErrorCode, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Message,
    RequestId, ResponsePayload, JSONRPC_VERSION,
};

/// A line that could not be decoded into a [`Message`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    /// The request id, when it could be recovered from the line.
    pub id: Option<RequestId>,
    pub error: JsonRpcError,
}

impl DecodeError {
    fn parse(message: impl Into<String>) -> Self {
        Self {
            id: None,
            error: JsonRpcError::new(ErrorCode::ParseError, message),
        }
    }

    fn invalid_request(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self {
            id,
            error: JsonRpcError::new(ErrorCode::InvalidRequest, message),
        }
    }

    /// The error response to send back for this line.
    pub fn into_response(self) -> JsonRpcResponse {
        JsonRpcResponse::failure(self.id, self.error)
    }
}

/// Decode one line into a message.
///
/// An explicit `"params": null` is treated like absent params, so it does not
/// survive a decode/encode round trip.
pub fn decode(line: &str) -> std::result::Result<Message, DecodeError> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| DecodeError::parse(format!("Parse error: {}", e)))?;

    let Value::Object(mut obj) = value else {
        return Err(DecodeError::parse("Parse error: message must be a JSON object"));
    };

    match obj.get("jsonrpc") {
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        _ => {
            return Err(DecodeError::parse(
                "Parse error: missing or unsupported jsonrpc version",
            ))
        }
    }

    if let Some(method) = obj.remove("method") {
        let Value::String(method) = method else {
            return Err(DecodeError::parse("Parse error: method must be a string"));
        };
        return decode_call(method, obj);
    }

    decode_response(obj)
}

fn decode_call(
    method: String,
    mut obj: Map<String, Value>,
) -> std::result::Result<Message, DecodeError> {
    let id = match obj.remove("id") {
        None => None,
        Some(raw) => Some(serde_json::from_value::<RequestId>(raw).map_err(|_| {
            DecodeError::invalid_request(None, "Invalid request: id must be a string or integer")
        })?),
    };

    let params = match obj.remove("params") {
        None | Some(Value::Null) => None,
        Some(params @ (Value::Object(_) | Value::Array(_))) => Some(params),
        Some(_) => {
            return Err(DecodeError::invalid_request(
                id,
                "Invalid request: params must be an object or array",
            ))
        }
    };

    Ok(match id {
        Some(id) => Message::Request(JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method,
            params,
        }),
        None => Message::Notification(JsonRpcNotification {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method,
            params,
        }),
    })
}

fn decode_response(mut obj: Map<String, Value>) -> std::result::Result<Message, DecodeError> {
    let id = match obj.remove("id") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(
            serde_json::from_value::<RequestId>(raw)
                .map_err(|_| DecodeError::parse("Parse error: id must be a string or integer"))?,
        ),
    };

    let payload = match (obj.remove("result"), obj.remove("error")) {
        (Some(result), None) => ResponsePayload::Result(result),
        (None, Some(error)) => {
            ResponsePayload::Error(serde_json::from_value(error).map_err(|e| {
                DecodeError::parse(format!("Parse error: malformed error object: {}", e))
            })?)
        }
        (Some(_), Some(_)) => {
            return Err(DecodeError::parse(
                "Parse error: response carries both result and error",
            ))
        }
        (None, None) => {
            return Err(DecodeError::parse(
                "Parse error: message has neither method nor result/error",
            ))
        }
    };

    Ok(Message::Response(JsonRpcResponse {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        payload,
    }))
}

/// Encode a message as a single line (without the trailing newline).
pub fn encode(message: &Message) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Encode a response as a single line.
pub fn encode_response(response: &JsonRpcResponse) -> Result<String> {
    Ok(serde_json::to_string(response)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_request() {
        let msg = decode(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#).unwrap();
        match msg {
            Message::Request(req) => {
                assert_eq!(req.id, RequestId::Number(1.into()));
                assert_eq!(req.method, "initialize");
                assert_eq!(req.params, Some(json!({})));
            }
            other => panic!("Expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_notification() {
        let msg = decode(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(matches!(msg, Message::Notification(n) if n.method == "notifications/initialized"));
    }

    #[test]
    fn test_decode_string_id() {
        let msg = decode(r#"{"jsonrpc":"2.0","id":"abc-1","method":"ping"}"#).unwrap();
        assert!(matches!(msg, Message::Request(r) if r.id == RequestId::String("abc-1".into())));
    }

    #[test]
    fn test_decode_response_variants() {
        let ok = decode(r#"{"jsonrpc":"2.0","id":7,"result":{"x":1}}"#).unwrap();
        match ok {
            Message::Response(resp) => assert_eq!(resp.result(), Some(&json!({"x": 1}))),
            other => panic!("Expected response, got {:?}", other),
        }

        let err = decode(r#"{"jsonrpc":"2.0","id":7,"error":{"code":-32601,"message":"nope"}}"#)
            .unwrap();
        match err {
            Message::Response(resp) => {
                assert_eq!(resp.error().unwrap().code, ErrorCode::MethodNotFound)
            }
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_malformed_json_is_parse_error() {
        let err = decode("{not json").unwrap_err();
        assert_eq!(err.error.code, ErrorCode::ParseError);
        assert!(err.id.is_none());
    }

    #[test]
    fn test_decode_shape_violations_are_parse_errors() {
        let cases = [
            r#"[1,2,3]"#,
            r#""just a string""#,
            r#"{"id":1,"method":"ping"}"#,
            r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#,
            r#"{"jsonrpc":"2.0","id":1,"method":42}"#,
            r#"{"jsonrpc":"2.0","id":1}"#,
            r#"{"jsonrpc":"2.0","id":1,"result":1,"error":{"code":1,"message":"x"}}"#,
        ];

        for line in cases {
            let err = decode(line).unwrap_err();
            assert_eq!(err.error.code, ErrorCode::ParseError, "line: {}", line);
        }
    }

    #[test]
    fn test_decode_bad_params_is_invalid_request_with_id() {
        let err = decode(r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":"oops"}"#)
            .unwrap_err();
        assert_eq!(err.error.code, ErrorCode::InvalidRequest);
        assert_eq!(err.id, Some(RequestId::Number(5.into())));
    }

    #[test]
    fn test_decode_bad_id_is_invalid_request() {
        for line in [
            r#"{"jsonrpc":"2.0","id":true,"method":"ping"}"#,
            r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#,
            r#"{"jsonrpc":"2.0","id":[1],"method":"ping"}"#,
        ] {
            let err = decode(line).unwrap_err();
            assert_eq!(err.error.code, ErrorCode::InvalidRequest, "line: {}", line);
        }
    }

    #[test]
    fn test_decode_keeps_any_numeric_id() {
        for raw in ["18446744073709551615", "1.5", "-3"] {
            let line = format!(r#"{{"jsonrpc":"2.0","id":{},"method":"ping"}}"#, raw);
            let Message::Request(req) = decode(&line).unwrap() else {
                panic!("Expected request for id {}", raw);
            };

            let reply = JsonRpcResponse::success(Some(req.id), json!({}));
            let encoded = encode_response(&reply).unwrap();
            assert_eq!(encoded, format!(r#"{{"jsonrpc":"2.0","id":{},"result":{{}}}}"#, raw));
        }
    }

    #[test]
    fn test_encode_is_single_line() {
        let msg = Message::Response(JsonRpcResponse::success(
            Some(RequestId::Number(1.into())),
            json!({"text": "line one\nline two"}),
        ));
        let line = encode(&msg).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\\n"));
    }

    #[test]
    fn test_round_trip_preserves_observable_fields() {
        let messages = vec![
            Message::Request(JsonRpcRequest {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: RequestId::String("req-9".to_string()),
                method: "tools/call".to_string(),
                params: Some(json!({"name": "echo", "arguments": {"x": "hi"}})),
            }),
            Message::Notification(JsonRpcNotification {
                jsonrpc: JSONRPC_VERSION.to_string(),
                method: "notifications/initialized".to_string(),
                params: None,
            }),
            Message::Response(JsonRpcResponse::success(
                Some(RequestId::Number(3.into())),
                Value::Null,
            )),
            Message::Response(JsonRpcResponse::failure(
                None,
                JsonRpcError::new(ErrorCode::ParseError, "Parse error"),
            )),
        ];

        for msg in messages {
            let line = encode(&msg).unwrap();
            assert_eq!(decode(&line).unwrap(), msg, "line: {}", line);
        }
    }

    #[test]
    fn test_null_params_normalize_to_absent() {
        let explicit = decode(r#"{"jsonrpc":"2.0","id":4,"method":"ping","params":null}"#).unwrap();
        let absent = decode(r#"{"jsonrpc":"2.0","id":4,"method":"ping"}"#).unwrap();
        assert_eq!(explicit, absent);

        let line = encode(&explicit).unwrap();
        assert!(!line.contains("params"), "line: {}", line);
    }

    #[test]
    fn test_decode_error_into_response() {
        let resp = decode("garbage").unwrap_err().into_response();
        assert!(resp.id.is_none());
        assert_eq!(resp.error().unwrap().code, ErrorCode::ParseError);
    }
}
