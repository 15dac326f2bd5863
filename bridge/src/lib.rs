//! dYdX v4 command bridge.
//!
//! A host process shells out to this binary instead of reimplementing the
//! dYdX wallet and signing stack. One JSON command object arrives on stdin,
//! one JSON result object leaves on stdout, and the exit code mirrors the
//! result's `success` flag.
//!
//! Request:
//! ```json
//! {"command": "place_order", "network": "testnet", "data": {"market": "ETH-USD", "side": "BUY", "size": 0.02}}
//! ```
//!
//! Result:
//! ```json
//! {"success": true, "orderId": "194126268", "clientId": "194126268", "txHash": "4F63..."}
//! ```
//!
//! The recovery phrase is read from the `DYDX_MNEMONIC_SECRET` environment
//! variable (preferred) or the legacy `mnemonic` request field, and never
//! appears in output.

pub mod config;
pub mod error;
pub mod exchange;
pub mod handlers;
pub mod protocol;
pub mod secret;

pub use error::BridgeError;
pub use protocol::{BridgeResponse, Request};
