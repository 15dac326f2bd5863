//! Request validation and command dispatch.
//!
//! `preflight` does everything that must happen before a connection exists:
//! parse, command/network validation, credential resolution, and the
//! cancel-order precondition. `dispatch` then routes the prepared command to
//! its handler; every handler converts failures into a failure response and
//! never lets an error propagate.

use bigdecimal::BigDecimal;
use serde_json::Value;
use std::str::FromStr;

use crate::config::{Network, NetworkProfile};
use crate::error::BridgeError;
use crate::exchange::{Exchange, OrderIntent, OrderKind, Side, TimeInForce};
use crate::protocol::{BridgeResponse, Request};
use crate::secret::Mnemonic;

const COMMANDS: &[&str] = &["place_order", "cancel_order", "get_balance"];

const DEFAULT_MARKET: &str = "BTC-USD";
const DEFAULT_SIDE: &str = "BUY";
const DEFAULT_ORDER_TYPE: &str = "LIMIT";
const DEFAULT_TIME_IN_FORCE: &str = "GTT";
const DEFAULT_GOOD_TIL_SECONDS: i64 = 3_600;

/// A request that passed every check that can run before connecting.
#[derive(Debug)]
pub struct Prepared {
    pub command: String,
    pub data: Value,
    pub profile: NetworkProfile,
    pub mnemonic: Mnemonic,
}

pub fn preflight(raw: &str) -> Result<Prepared, BridgeResponse> {
    match validate(raw) {
        Ok(prepared) => Ok(prepared),
        Err(err) => Err(BridgeResponse::failure(err.to_string())),
    }
}

fn validate(raw: &str) -> Result<Prepared, BridgeError> {
    let request = Request::parse(raw)?;

    if !COMMANDS.contains(&request.command.as_str()) {
        return Err(BridgeError::UnknownCommand(request.command));
    }
    let network = Network::parse(request.network.as_deref())?;
    let mnemonic = Mnemonic::resolve(request.mnemonic.as_deref())?;

    // The one per-command precondition that must hold before any network
    // activity: a cancel with nothing to cancel never touches the chain.
    if request.command == "cancel_order" && order_id_field(&request.data).is_none() {
        return Err(BridgeError::MissingField("orderId"));
    }

    let profile = NetworkProfile::resolve(
        network,
        request.grpc_endpoint.as_deref(),
        request.indexer_endpoint.as_deref(),
    );

    Ok(Prepared {
        command: request.command,
        data: request.data,
        profile,
        mnemonic,
    })
}

pub async fn dispatch(command: &str, data: &Value, exchange: &mut dyn Exchange) -> BridgeResponse {
    match command {
        "place_order" => place_order(data, exchange).await,
        "cancel_order" => cancel_order(data, exchange).await,
        "get_balance" => get_balance(exchange).await,
        other => BridgeResponse::failure(BridgeError::UnknownCommand(other.to_string()).to_string()),
    }
}

async fn place_order(data: &Value, exchange: &mut dyn Exchange) -> BridgeResponse {
    let intent = match order_intent(data) {
        Ok(intent) => intent,
        Err(err) => return failure_from(err),
    };
    match exchange.place_order(intent).await {
        Ok(placed) => BridgeResponse {
            success: true,
            order_id: Some(placed.order_id),
            client_id: Some(placed.client_id),
            tx_hash: Some(placed.tx_hash),
            ..Default::default()
        },
        Err(err) => failure_from(err),
    }
}

async fn cancel_order(data: &Value, exchange: &mut dyn Exchange) -> BridgeResponse {
    let order_id = match order_id_field(data) {
        Some(id) => id,
        None => return BridgeResponse::failure(BridgeError::MissingField("orderId").to_string()),
    };
    match exchange.cancel_order(&order_id).await {
        Ok(cancelled) => BridgeResponse {
            success: true,
            order_id: Some(cancelled.order_id),
            tx_hash: Some(cancelled.tx_hash),
            ..Default::default()
        },
        Err(err) => failure_from(err),
    }
}

async fn get_balance(exchange: &mut dyn Exchange) -> BridgeResponse {
    match exchange.get_balances().await {
        Ok(balances) => BridgeResponse {
            success: true,
            balance: Some(balances),
            ..Default::default()
        },
        Err(err) => failure_from(err),
    }
}

fn failure_from(err: anyhow::Error) -> BridgeResponse {
    BridgeResponse::failure(BridgeError::Exchange(err).to_string())
}

/// Builds the validated order intent, defaulting each absent field the same
/// way the wire contract documents.
fn order_intent(data: &Value) -> anyhow::Result<OrderIntent> {
    let side = Side::parse(str_field(data, "side").unwrap_or(DEFAULT_SIDE))?;
    let kind = OrderKind::parse(str_field(data, "type").unwrap_or(DEFAULT_ORDER_TYPE))?;
    let time_in_force =
        TimeInForce::parse(str_field(data, "timeInForce").unwrap_or(DEFAULT_TIME_IN_FORCE))?;

    let size = decimal_field(data, "size").unwrap_or_else(|| BigDecimal::from(0));
    if size <= BigDecimal::from(0) {
        anyhow::bail!("size must be > 0");
    }

    Ok(OrderIntent {
        market: str_field(data, "market").unwrap_or(DEFAULT_MARKET).to_string(),
        side,
        kind,
        size,
        price: decimal_field(data, "price"),
        time_in_force,
        reduce_only: bool_field(data, "reduceOnly"),
        post_only: bool_field(data, "postOnly"),
        client_id: u32_field(data, "clientId"),
        good_til_seconds: i64_field(data, "goodTilSeconds")
            .unwrap_or(DEFAULT_GOOD_TIL_SECONDS)
            .max(1),
    })
}

// ---- tolerant field extraction --------------------------------------------
// Host programs send numbers both as JSON numbers and as strings; accept
// either form everywhere a number is expected.

fn str_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn bool_field(data: &Value, key: &str) -> bool {
    data.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn decimal_field(data: &Value, key: &str) -> Option<BigDecimal> {
    match data.get(key)? {
        Value::String(s) => BigDecimal::from_str(s.trim()).ok(),
        Value::Number(n) => {
            let f = n.as_f64()?;
            if !f.is_finite() {
                return None;
            }
            BigDecimal::from_str(&format!("{f:.10}")).ok()
        }
        _ => None,
    }
}

fn u32_field(data: &Value, key: &str) -> Option<u32> {
    match data.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn i64_field(data: &Value, key: &str) -> Option<i64> {
    match data.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn order_id_field(data: &Value) -> Option<String> {
    match data.get("orderId") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_intent_defaults_match_contract() {
        let intent = order_intent(&json!({ "size": 0.25 })).unwrap();
        assert_eq!(intent.market, "BTC-USD");
        assert_eq!(intent.side, Side::Buy);
        assert_eq!(intent.kind, OrderKind::Limit);
        assert_eq!(intent.time_in_force, TimeInForce::GoodTilTime);
        assert!(!intent.reduce_only);
        assert!(!intent.post_only);
        assert!(intent.client_id.is_none());
        assert_eq!(intent.good_til_seconds, DEFAULT_GOOD_TIL_SECONDS);
    }

    #[test]
    fn order_intent_rejects_missing_size() {
        let err = order_intent(&json!({})).unwrap_err();
        assert_eq!(err.to_string(), "size must be > 0");
    }

    #[test]
    fn order_intent_accepts_string_numbers() {
        let intent = order_intent(&json!({
            "market": "ETH-USD",
            "side": "sell",
            "type": "MARKET",
            "size": "0.02",
            "price": "1850.5",
            "clientId": "123456",
        }))
        .unwrap();
        assert_eq!(intent.market, "ETH-USD");
        assert_eq!(intent.side, Side::Sell);
        assert!(intent.kind.is_short_lived());
        assert_eq!(intent.size, BigDecimal::from_str("0.02").unwrap());
        assert_eq!(intent.price, Some(BigDecimal::from_str("1850.5").unwrap()));
        assert_eq!(intent.client_id, Some(123_456));
    }

    #[test]
    fn order_intent_rejects_unknown_literals() {
        assert!(order_intent(&json!({ "size": 1, "side": "hold" })).is_err());
        assert!(order_intent(&json!({ "size": 1, "type": "TRAILING_STOP" })).is_err());
        assert!(order_intent(&json!({ "size": 1, "timeInForce": "GTC" })).is_err());
    }

    #[test]
    fn order_id_field_accepts_strings_and_numbers() {
        assert_eq!(
            order_id_field(&json!({ "orderId": "abc-123" })).as_deref(),
            Some("abc-123")
        );
        assert_eq!(order_id_field(&json!({ "orderId": 42 })).as_deref(), Some("42"));
        assert!(order_id_field(&json!({ "orderId": "  " })).is_none());
        assert!(order_id_field(&json!({})).is_none());
    }

    #[test]
    fn validate_rejects_unknown_command() {
        let err = validate(r#"{"command":"transfer","mnemonic":"m"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Unknown command: transfer");
    }

    #[test]
    fn validate_rejects_bad_network() {
        let err =
            validate(r#"{"command":"get_balance","network":"devnet","mnemonic":"m"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Invalid network: devnet");
    }

    #[test]
    fn validate_requires_order_id_for_cancel() {
        let err =
            validate(r#"{"command":"cancel_order","network":"testnet","mnemonic":"m","data":{}}"#)
                .unwrap_err();
        assert_eq!(err.to_string(), "orderId is required");
    }
}
