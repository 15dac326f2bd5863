//! Bridge error taxonomy.
//!
//! Every variant ends up stringified into the `error` field of a failure
//! response; nothing here escapes the process boundary as a panic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    #[error("mnemonic is required")]
    MissingMnemonic,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("invalid request: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Anything surfaced by the exchange client: connect, order placement,
    /// cancellation, or balance query.
    #[error("{0:#}")]
    Exchange(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_wire_contract() {
        assert_eq!(
            BridgeError::UnknownCommand("frob".into()).to_string(),
            "Unknown command: frob"
        );
        assert_eq!(
            BridgeError::MissingField("orderId").to_string(),
            "orderId is required"
        );
        assert_eq!(BridgeError::MissingMnemonic.to_string(), "mnemonic is required");
    }

    #[test]
    fn exchange_errors_keep_context_chain() {
        let err = anyhow::anyhow!("connection refused").context("connect node");
        let msg = BridgeError::from(err).to_string();
        assert!(msg.contains("connect node"));
        assert!(msg.contains("connection refused"));
    }
}
