//! Wire types for the daemon IPC channel.
//!
//! Transport is plain HTTP over localhost with one JSON document per call:
//! request `{"method": ..., "params": {...}}`, response `{"result": {...}}`
//! on success or `{"error": "..."}` with a non-2xx status on failure.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Well-known health method served by every daemon.
pub const METHOD_PING: &str = "ping";
/// Well-known method asking the daemon to shut down gracefully.
pub const METHOD_SHUTDOWN: &str = "shutdown";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl IpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    pub fn ping() -> Self {
        Self::new(METHOD_PING, json!({}))
    }

    pub fn shutdown() -> Self {
        Self::new(METHOD_SHUTDOWN, json!({}))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpcResponse {
    Ok { result: Value },
    Err { error: String },
}

impl IpcResponse {
    pub fn ok(result: Value) -> Self {
        Self::Ok { result }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self::Err {
            error: error.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

/// Payload returned by the built-in `ping` handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingReply {
    pub uptime_secs: u64,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let req = IpcRequest::new("sync", json!({"full": true}));
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire, json!({"method": "sync", "params": {"full": true}}));
    }

    #[test]
    fn test_request_params_default_to_null() {
        let req: IpcRequest = serde_json::from_str(r#"{"method": "ping"}"#).unwrap();
        assert_eq!(req.method, "ping");
        assert!(req.params.is_null());
    }

    #[test]
    fn test_response_untagged_shapes() {
        let ok = serde_json::to_value(IpcResponse::ok(json!({"n": 1}))).unwrap();
        assert_eq!(ok, json!({"result": {"n": 1}}));

        let err = serde_json::to_value(IpcResponse::err("boom")).unwrap();
        assert_eq!(err, json!({"error": "boom"}));

        let parsed: IpcResponse = serde_json::from_value(json!({"error": "boom"})).unwrap();
        assert!(!parsed.is_ok());
    }
}
