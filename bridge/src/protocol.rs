//! Wire types for the stdin/stdout contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One command read from stdin.
///
/// `command` and `network` stay as raw strings here so validation can report
/// the offending literal instead of a generic deserialization error. `data`
/// is an open, command-specific mapping; each handler extracts its own
/// fields from it.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub network: Option<String>,
    /// Legacy in-band credential. The environment variable takes precedence.
    #[serde(default)]
    pub mnemonic: Option<String>,
    #[serde(default)]
    pub data: Value,
    /// Optional gRPC endpoint override; blank means the network default.
    #[serde(default, rename = "grpcEndpoint")]
    pub grpc_endpoint: Option<String>,
    /// Optional indexer REST endpoint override; blank means the network default.
    #[serde(default, rename = "indexerEndpoint")]
    pub indexer_endpoint: Option<String>,
}

impl Request {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// The single result object written to stdout.
///
/// Exactly one of these is produced per invocation; `success` must agree
/// with the process exit code.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_tolerates_missing_fields() {
        let req = Request::parse(r#"{"command":"get_balance"}"#).unwrap();
        assert_eq!(req.command, "get_balance");
        assert!(req.network.is_none());
        assert!(req.mnemonic.is_none());
        assert!(req.data.is_null());
    }

    #[test]
    fn request_carries_endpoint_overrides() {
        let req = Request::parse(
            r#"{"command":"get_balance","grpcEndpoint":"https://grpc.example","indexerEndpoint":"https://idx.example"}"#,
        )
        .unwrap();
        assert_eq!(req.grpc_endpoint.as_deref(), Some("https://grpc.example"));
        assert_eq!(req.indexer_endpoint.as_deref(), Some("https://idx.example"));
    }

    #[test]
    fn response_omits_absent_fields() {
        let resp = BridgeResponse::failure("boom");
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"boom"}"#);
    }

    #[test]
    fn response_uses_camel_case_keys() {
        let resp = BridgeResponse {
            success: true,
            order_id: Some("7".into()),
            client_id: Some("7".into()),
            tx_hash: Some("ABCD".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""orderId":"7""#));
        assert!(json.contains(r#""clientId":"7""#));
        assert!(json.contains(r#""txHash":"ABCD""#));
    }

    #[test]
    fn exit_code_tracks_success() {
        assert_eq!(BridgeResponse { success: true, ..Default::default() }.exit_code(), 0);
        assert_eq!(BridgeResponse::failure("no").exit_code(), 1);
    }
}
