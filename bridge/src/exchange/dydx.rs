//! dYdX v4 exchange client.
//!
//! State-changing operations (place, cancel) go through the node gRPC client
//! which owns wallet derivation, transaction signing and broadcasting.
//! Read-side lookups (order identity, balances) go to the indexer REST API;
//! its JSON is parsed defensively since field shapes differ between indexer
//! deployments.

use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use dydx::indexer::{Height, IndexerClient, Subaccount};
use dydx::node::OrderId as ProtoOrderId;
use dydx::node::{Account, NodeClient, OrderBuilder, OrderGoodUntil, OrderSide, Wallet};
use dydx_proto::dydxprotocol::clob::order::TimeInForce as ProtoTimeInForce;
use serde_json::Value;

use super::{
    Balances, CancelledOrder, Exchange, OrderIntent, OrderKind, PlacedOrder, Side, TimeInForce,
};
use crate::config::NetworkProfile;
use crate::secret::Mnemonic;

/// Short-lived orders expire this many blocks past the current height.
const SHORT_TERM_AHEAD_BLOCKS: u32 = 10;

pub struct DydxExchange {
    node: NodeClient,
    indexer: IndexerClient,
    account: Account,
    http: reqwest::Client,
    profile: NetworkProfile,
}

impl DydxExchange {
    /// Connects to the node, builds the indexer client and derives the
    /// signing account from the mnemonic. This is the bridge's capability
    /// probe: if the stack is unusable the failure surfaces here, as a
    /// result, before any command runs.
    pub async fn connect(profile: NetworkProfile, mnemonic: &Mnemonic) -> Result<Self> {
        let mut node = NodeClient::connect(profile.node_config()?)
            .await
            .context("connect node")?;
        let indexer = IndexerClient::new(profile.indexer_config());
        let wallet = Wallet::from_mnemonic(mnemonic.phrase()).context("derive wallet")?;
        let account = wallet.account(0, &mut node).await.context("load account")?;
        tracing::debug!(network = %profile.network, "exchange client ready");

        Ok(Self {
            node,
            indexer,
            account,
            http: reqwest::Client::new(),
            profile,
        })
    }

    async fn fetch_order_json(&mut self, order_id: &str) -> Result<Value> {
        let url = format!("{}/v4/orders/{}", self.profile.indexer_rest_base(), order_id);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("query indexer for order")?;
        if !resp.status().is_success() {
            bail!("order lookup failed: HTTP {}", resp.status());
        }
        resp.json().await.context("parse indexer order response")
    }

    async fn fetch_address_json(&mut self) -> Result<Value> {
        let address = self.account.address().to_string();
        let url = format!("{}/v4/addresses/{}", self.profile.indexer_rest_base(), address);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("query indexer for address")?;
        if !resp.status().is_success() {
            bail!("balance query failed: HTTP {}", resp.status());
        }
        resp.json().await.context("parse indexer address response")
    }

    fn subaccount(&self, number: u32) -> Result<Subaccount> {
        Ok(Subaccount {
            address: self.account.address().clone(),
            number: number
                .try_into()
                .map_err(|_| anyhow!("invalid subaccount number: {}", number))?,
        })
    }
}

#[async_trait]
impl Exchange for DydxExchange {
    async fn place_order(&mut self, intent: OrderIntent) -> Result<PlacedOrder> {
        let market = self
            .indexer
            .markets()
            .get_perpetual_market(&intent.market.clone().into())
            .await
            .context("load market metadata")?;
        let subaccount = self.account.subaccount(0)?;
        let side = order_side(intent.side);
        let time_in_force = proto_time_in_force(intent.time_in_force, intent.post_only);
        let client_id = intent.client_id.unwrap_or_else(rand::random::<u32>);

        let (_id, order) = match intent.kind {
            OrderKind::Market => {
                // Slippage-protection price, from the oracle if no hint was given.
                let oracle = market.oracle_price.as_ref().map(|p| p.0.clone());
                let price = slippage_price(intent.price.clone(), oracle, intent.side)?;
                let height = self
                    .node
                    .latest_block_height()
                    .await
                    .context("fetch latest height")?;
                OrderBuilder::new(market, subaccount)
                    .market(side, intent.size.clone())
                    .reduce_only(intent.reduce_only)
                    .price(price)
                    .time_in_force(time_in_force)
                    .until(height.ahead(SHORT_TERM_AHEAD_BLOCKS))
                    .build(client_id)
            }
            OrderKind::Limit => {
                let price = match intent.price.clone() {
                    Some(p) if p > BigDecimal::from(0) => p,
                    _ => bail!("price must be > 0"),
                };
                let until = Utc::now() + chrono::Duration::seconds(intent.good_til_seconds);
                OrderBuilder::new(market, subaccount)
                    .limit(side, price, intent.size.clone())
                    .reduce_only(intent.reduce_only)
                    .time_in_force(time_in_force)
                    .until(OrderGoodUntil::Time(until))
                    .long_term()
                    .build(client_id)
            }
        }
        .context("build order")?;

        let tx_hash = self
            .node
            .place_order(&mut self.account, order)
            .await
            .context("place order")?;
        tracing::info!(market = %intent.market, client_id, "order broadcast");

        // The broadcast returns only a tx hash; on-chain the order is keyed
        // by (subaccount, client id, clob pair, flags), so the client order
        // id is the identifier reported back.
        Ok(PlacedOrder {
            order_id: client_id.to_string(),
            client_id: client_id.to_string(),
            tx_hash,
        })
    }

    async fn cancel_order(&mut self, order_id: &str) -> Result<CancelledOrder> {
        let raw = self.fetch_order_json(order_id).await?;
        let key = IndexerOrderKey::from_json(&raw)?;

        let subaccount = self.subaccount(key.subaccount_number)?;
        let until = key.good_until()?;
        let proto_id = ProtoOrderId {
            subaccount_id: Some(subaccount.into()),
            client_id: key.client_id,
            order_flags: key.order_flags,
            clob_pair_id: key.clob_pair_id,
        };

        let tx_hash = self
            .node
            .cancel_order(&mut self.account, proto_id, until)
            .await
            .context("cancel order")?;
        tracing::info!(order_id, "cancel broadcast");

        Ok(CancelledOrder {
            order_id: order_id.to_string(),
            tx_hash,
        })
    }

    async fn get_balances(&mut self) -> Result<Balances> {
        let raw = self.fetch_address_json().await?;
        Ok(reshape_positions(&raw))
    }
}

fn order_side(side: Side) -> OrderSide {
    match side {
        Side::Buy => OrderSide::Buy,
        Side::Sell => OrderSide::Sell,
    }
}

fn proto_time_in_force(tif: TimeInForce, post_only: bool) -> ProtoTimeInForce {
    if post_only {
        return ProtoTimeInForce::PostOnly;
    }
    match tif {
        TimeInForce::GoodTilTime => ProtoTimeInForce::Unspecified,
        TimeInForce::ImmediateOrCancel => ProtoTimeInForce::Ioc,
        TimeInForce::FillOrKill => ProtoTimeInForce::FillOrKill,
    }
}

/// Price bound for a market order: the caller's hint when positive, else the
/// oracle price padded 0.5 % against the taker.
fn slippage_price(
    hint: Option<BigDecimal>,
    oracle: Option<BigDecimal>,
    side: Side,
) -> Result<BigDecimal> {
    if let Some(p) = hint {
        if p > BigDecimal::from(0) {
            return Ok(p);
        }
    }
    let base = oracle.ok_or_else(|| anyhow!("missing price and oracle price"))?;
    if base <= BigDecimal::from(0) {
        bail!("invalid oracle price");
    }
    let factor = match side {
        Side::Buy => "1.005",
        Side::Sell => "0.995",
    };
    Ok(base * BigDecimal::from_str(factor).expect("static slippage factor"))
}

/// The protocol-level identity of an order, as reported by the indexer.
#[derive(Debug)]
struct IndexerOrderKey {
    client_id: u32,
    clob_pair_id: u32,
    order_flags: u32,
    subaccount_number: u32,
    good_til_block: Option<u32>,
    good_til_block_time: Option<DateTime<Utc>>,
}

impl IndexerOrderKey {
    fn from_json(v: &Value) -> Result<Self> {
        Ok(Self {
            client_id: json_u32(v, "clientId").ok_or_else(|| anyhow!("order missing clientId"))?,
            clob_pair_id: json_u32(v, "clobPairId")
                .ok_or_else(|| anyhow!("order missing clobPairId"))?,
            order_flags: json_u32(v, "orderFlags")
                .ok_or_else(|| anyhow!("order missing orderFlags"))?,
            subaccount_number: json_u32(v, "subaccountNumber").unwrap_or(0),
            good_til_block: json_u32(v, "goodTilBlock"),
            good_til_block_time: v
                .get("goodTilBlockTime")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }

    fn good_until(&self) -> Result<OrderGoodUntil> {
        if let Some(block) = self.good_til_block {
            Ok(OrderGoodUntil::Block(Height(block)))
        } else if let Some(time) = self.good_til_block_time {
            Ok(OrderGoodUntil::Time(time))
        } else {
            bail!("order has no good-til bound")
        }
    }
}

/// Indexer numbers arrive as JSON strings more often than not.
fn json_u32(v: &Value, key: &str) -> Option<u32> {
    match v.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// Flattens the first subaccount's asset positions into symbol -> size.
/// Both observed shapes are accepted: a map keyed by symbol and a plain
/// array of position objects.
fn reshape_positions(v: &Value) -> Balances {
    let mut out = Balances::new();
    let positions = v
        .get("subaccounts")
        .and_then(Value::as_array)
        .and_then(|subs| subs.first())
        .and_then(|sub| sub.get("assetPositions"));

    match positions {
        Some(Value::Object(map)) => {
            for (symbol, position) in map {
                let symbol = position
                    .get("symbol")
                    .and_then(Value::as_str)
                    .unwrap_or(symbol)
                    .to_string();
                out.insert(symbol, position_size(position));
            }
        }
        Some(Value::Array(items)) => {
            for position in items {
                let symbol = position
                    .get("symbol")
                    .and_then(Value::as_str)
                    .unwrap_or("USDC")
                    .to_string();
                out.insert(symbol, position_size(position));
            }
        }
        _ => {}
    }
    out
}

fn position_size(position: &Value) -> String {
    position
        .get("size")
        .and_then(Value::as_str)
        .unwrap_or("0")
        .to_string()
}
