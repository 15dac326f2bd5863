//! The capability boundary between bridge logic and the exchange client.
//!
//! Handlers only ever see the [`Exchange`] trait, so the whole dispatch path
//! is testable against a fake with no wallet and no network. The one real
//! implementation lives in [`dydx`] and delegates signing, broadcasting and
//! account management to the dYdX v4 client crate.

pub mod dydx;

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bigdecimal::BigDecimal;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn parse(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("buy") {
            Ok(Side::Buy)
        } else if s.eq_ignore_ascii_case("sell") {
            Ok(Side::Sell)
        } else {
            Err(anyhow!("unsupported side: {}", s))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    Limit,
}

impl OrderKind {
    pub fn parse(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("market") {
            Ok(OrderKind::Market)
        } else if s.eq_ignore_ascii_case("limit") {
            Ok(OrderKind::Limit)
        } else {
            Err(anyhow!("unsupported order type: {}", s))
        }
    }

    /// Market orders live for a handful of blocks; everything else is placed
    /// with stateful long-term flags.
    pub fn is_short_lived(&self) -> bool {
        matches!(self, OrderKind::Market)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeInForce {
    GoodTilTime,
    ImmediateOrCancel,
    FillOrKill,
}

impl TimeInForce {
    pub fn parse(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("gtt") {
            Ok(TimeInForce::GoodTilTime)
        } else if s.eq_ignore_ascii_case("ioc") {
            Ok(TimeInForce::ImmediateOrCancel)
        } else if s.eq_ignore_ascii_case("fok") {
            Ok(TimeInForce::FillOrKill)
        } else {
            Err(anyhow!("unsupported timeInForce: {}", s))
        }
    }
}

/// A fully validated order request, ready to hand to an exchange client.
#[derive(Clone, Debug)]
pub struct OrderIntent {
    pub market: String,
    pub side: Side,
    pub kind: OrderKind,
    pub size: BigDecimal,
    pub price: Option<BigDecimal>,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub post_only: bool,
    pub client_id: Option<u32>,
    /// Lifetime of long-lived orders, seconds from now.
    pub good_til_seconds: i64,
}

#[derive(Clone, Debug)]
pub struct PlacedOrder {
    pub order_id: String,
    pub client_id: String,
    pub tx_hash: String,
}

#[derive(Clone, Debug)]
pub struct CancelledOrder {
    pub order_id: String,
    pub tx_hash: String,
}

/// Asset symbol to amount string, as reported by the indexer.
pub type Balances = BTreeMap<String, String>;

#[async_trait]
pub trait Exchange: Send {
    async fn place_order(&mut self, intent: OrderIntent) -> Result<PlacedOrder>;
    async fn cancel_order(&mut self, order_id: &str) -> Result<CancelledOrder>;
    async fn get_balances(&mut self) -> Result<Balances>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_parse_is_case_insensitive() {
        assert_eq!(Side::parse("BUY").unwrap(), Side::Buy);
        assert_eq!(Side::parse("sell").unwrap(), Side::Sell);
        assert!(Side::parse("hold").is_err());
    }

    #[test]
    fn market_orders_are_short_lived() {
        assert!(OrderKind::parse("MARKET").unwrap().is_short_lived());
        assert!(!OrderKind::parse("limit").unwrap().is_short_lived());
        assert!(OrderKind::parse("STOP_LIMIT").is_err());
    }

    #[test]
    fn time_in_force_literals() {
        assert_eq!(TimeInForce::parse("GTT").unwrap(), TimeInForce::GoodTilTime);
        assert_eq!(TimeInForce::parse("ioc").unwrap(), TimeInForce::ImmediateOrCancel);
        assert_eq!(TimeInForce::parse("FOK").unwrap(), TimeInForce::FillOrKill);
        assert!(TimeInForce::parse("GTC").is_err());
    }
}
