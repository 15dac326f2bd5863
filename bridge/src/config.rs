//! Network profile resolution.
//!
//! Maps the two recognized network literals onto concrete chain ids and
//! endpoints, honoring per-request overrides (blank means "use the
//! default").

use std::num::NonZeroU32;
use std::str::FromStr;

use anyhow::{Context, Result};
use dydx::indexer::{Denom, IndexerConfig, RestConfig, SockConfig};
use dydx::node::{ChainId, NodeConfig};

use crate::error::BridgeError;

const DEFAULT_MAINNET_GRPC: &str = "https://dydx-ops-grpc.kingnodes.com:443";
const DEFAULT_TESTNET_GRPC: &str = "https://test-dydx-grpc.kingnodes.com";
const DEFAULT_MAINNET_INDEXER_HTTP: &str = "https://indexer.dydx.trade";
const DEFAULT_MAINNET_INDEXER_WS: &str = "wss://indexer.dydx.trade/v4/ws";
const DEFAULT_TESTNET_INDEXER_HTTP: &str = "https://indexer.v4testnet.dydx.exchange";
const DEFAULT_TESTNET_INDEXER_WS: &str = "wss://indexer.v4testnet.dydx.exchange/v4/ws";
const DEFAULT_FEE_DENOM: &str =
    "ibc/8E27BA2D5493AF5636760E354E46004562C46AB7EC0CC4C1CA14E9E20E2545B5";

const NODE_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    Testnet,
    Mainnet,
}

impl Network {
    /// Parses the request literal. Missing input falls back to testnet;
    /// anything other than the two recognized literals is a configuration
    /// error.
    pub fn parse(raw: Option<&str>) -> Result<Self, BridgeError> {
        match raw {
            None => Ok(Network::Testnet),
            Some(s) if s.eq_ignore_ascii_case("testnet") => Ok(Network::Testnet),
            Some(s) if s.eq_ignore_ascii_case("mainnet") => Ok(Network::Mainnet),
            Some(other) => Err(BridgeError::InvalidNetwork(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved connection targets for one invocation.
#[derive(Clone, Debug)]
pub struct NetworkProfile {
    pub network: Network,
    pub grpc_endpoint: String,
    pub indexer_endpoint: String,
    pub indexer_ws_endpoint: String,
}

impl NetworkProfile {
    pub fn resolve(
        network: Network,
        grpc_override: Option<&str>,
        indexer_override: Option<&str>,
    ) -> Self {
        let (grpc, rest, ws) = match network {
            Network::Mainnet => (
                DEFAULT_MAINNET_GRPC,
                DEFAULT_MAINNET_INDEXER_HTTP,
                DEFAULT_MAINNET_INDEXER_WS,
            ),
            Network::Testnet => (
                DEFAULT_TESTNET_GRPC,
                DEFAULT_TESTNET_INDEXER_HTTP,
                DEFAULT_TESTNET_INDEXER_WS,
            ),
        };
        Self {
            network,
            grpc_endpoint: pick(grpc_override, grpc),
            indexer_endpoint: pick(indexer_override, rest),
            indexer_ws_endpoint: ws.to_string(),
        }
    }

    pub fn chain_id(&self) -> ChainId {
        match self.network {
            Network::Mainnet => ChainId::Mainnet1,
            Network::Testnet => ChainId::Testnet4,
        }
    }

    pub fn node_config(&self) -> Result<NodeConfig> {
        let fee_denom = Denom::from_str(DEFAULT_FEE_DENOM).context("parse fee denom")?;
        Ok(NodeConfig {
            endpoint: self.grpc_endpoint.clone(),
            timeout: NODE_TIMEOUT_MS,
            chain_id: self.chain_id(),
            fee_denom,
            manage_sequencing: true,
        })
    }

    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            rest: RestConfig {
                endpoint: self.indexer_endpoint.clone(),
            },
            sock: SockConfig {
                endpoint: self.indexer_ws_endpoint.clone(),
                timeout: 1_000,
                rate_limit: NonZeroU32::new(2).unwrap(),
            },
        }
    }

    /// Indexer REST base with no trailing slash, ready for path joining.
    pub fn indexer_rest_base(&self) -> &str {
        self.indexer_endpoint.trim_end_matches('/')
    }
}

fn pick(override_value: Option<&str>, default_value: &str) -> String {
    match override_value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default_value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recognizes_two_literals() {
        assert_eq!(Network::parse(Some("testnet")).unwrap(), Network::Testnet);
        assert_eq!(Network::parse(Some("MAINNET")).unwrap(), Network::Mainnet);
        assert_eq!(Network::parse(None).unwrap(), Network::Testnet);
        let err = Network::parse(Some("devnet")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid network: devnet");
    }

    #[test]
    fn resolve_uses_network_defaults() {
        let profile = NetworkProfile::resolve(Network::Testnet, None, None);
        assert_eq!(profile.grpc_endpoint, DEFAULT_TESTNET_GRPC);
        assert_eq!(profile.indexer_endpoint, DEFAULT_TESTNET_INDEXER_HTTP);

        let profile = NetworkProfile::resolve(Network::Mainnet, None, None);
        assert_eq!(profile.grpc_endpoint, DEFAULT_MAINNET_GRPC);
        assert_eq!(profile.indexer_endpoint, DEFAULT_MAINNET_INDEXER_HTTP);
    }

    #[test]
    fn blank_overrides_fall_back_to_defaults() {
        let profile = NetworkProfile::resolve(Network::Mainnet, Some("  "), Some(""));
        assert_eq!(profile.grpc_endpoint, DEFAULT_MAINNET_GRPC);
        assert_eq!(profile.indexer_endpoint, DEFAULT_MAINNET_INDEXER_HTTP);
    }

    #[test]
    fn overrides_replace_defaults() {
        let profile = NetworkProfile::resolve(
            Network::Testnet,
            Some("https://grpc.example:443"),
            Some("https://idx.example/"),
        );
        assert_eq!(profile.grpc_endpoint, "https://grpc.example:443");
        assert_eq!(profile.indexer_rest_base(), "https://idx.example");
    }
}
