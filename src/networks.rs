//! Network identities and canonical token ids.
//!
//! Every token/position lookup in the engine is keyed by a canonical token
//! id derived from (network, lowercased address, native flag), so two
//! addresses differing only in case collapse to the same id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported networks (mainnet/testnet pairs).
///
/// The set is fixed at compile time; adding a network means adding a
/// variant plus entries in the name and RPC tables below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkId {
    EthereumMainnet,
    EthereumSepolia,
    ArbitrumOne,
    ArbitrumSepolia,
    OpMainnet,
    OpSepolia,
    CeloMainnet,
    CeloAlfajores,
    PolygonPosMainnet,
    PolygonPosAmoy,
    BaseMainnet,
    BaseSepolia,
}

/// All known networks, in a stable order.
pub const ALL_NETWORK_IDS: &[NetworkId] = &[
    NetworkId::EthereumMainnet,
    NetworkId::EthereumSepolia,
    NetworkId::ArbitrumOne,
    NetworkId::ArbitrumSepolia,
    NetworkId::OpMainnet,
    NetworkId::OpSepolia,
    NetworkId::CeloMainnet,
    NetworkId::CeloAlfajores,
    NetworkId::PolygonPosMainnet,
    NetworkId::PolygonPosAmoy,
    NetworkId::BaseMainnet,
    NetworkId::BaseSepolia,
];

impl NetworkId {
    /// Kebab-case name used in token ids, config keys and the wire format.
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkId::EthereumMainnet => "ethereum-mainnet",
            NetworkId::EthereumSepolia => "ethereum-sepolia",
            NetworkId::ArbitrumOne => "arbitrum-one",
            NetworkId::ArbitrumSepolia => "arbitrum-sepolia",
            NetworkId::OpMainnet => "op-mainnet",
            NetworkId::OpSepolia => "op-sepolia",
            NetworkId::CeloMainnet => "celo-mainnet",
            NetworkId::CeloAlfajores => "celo-alfajores",
            NetworkId::PolygonPosMainnet => "polygon-pos-mainnet",
            NetworkId::PolygonPosAmoy => "polygon-pos-amoy",
            NetworkId::BaseMainnet => "base-mainnet",
            NetworkId::BaseSepolia => "base-sepolia",
        }
    }

    /// Default public RPC endpoint, overridable via `RPC_URL_<NETWORK>` env.
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            NetworkId::EthereumMainnet => "https://eth.llamarpc.com",
            NetworkId::EthereumSepolia => "https://ethereum-sepolia-rpc.publicnode.com",
            NetworkId::ArbitrumOne => "https://arb1.arbitrum.io/rpc",
            NetworkId::ArbitrumSepolia => "https://sepolia-rollup.arbitrum.io/rpc",
            NetworkId::OpMainnet => "https://mainnet.optimism.io",
            NetworkId::OpSepolia => "https://sepolia.optimism.io",
            NetworkId::CeloMainnet => "https://forno.celo.org",
            NetworkId::CeloAlfajores => "https://alfajores-forno.celo-testnet.org",
            NetworkId::PolygonPosMainnet => "https://polygon-rpc.com",
            NetworkId::PolygonPosAmoy => "https://rpc-amoy.polygon.technology",
            NetworkId::BaseMainnet => "https://mainnet.base.org",
            NetworkId::BaseSepolia => "https://sepolia.base.org",
        }
    }

    /// Environment variable name carrying the RPC override for this network.
    pub fn rpc_env_key(&self) -> String {
        format!("RPC_URL_{}", self.as_str().to_uppercase().replace('-', "_"))
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkId {
    type Err = UnknownNetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_NETWORK_IDS
            .iter()
            .copied()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| UnknownNetworkError(s.to_string()))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown network id: {0}")]
pub struct UnknownNetworkError(pub String);

/// Build the canonical token id for a (network, address) pair.
///
/// Format: `<network-id>:<0x-lowercase-address>` or `<network-id>:native`
/// for the chain's native asset. This is the unique key for all token and
/// position lookups.
pub fn token_id(network_id: NetworkId, address: Option<&str>, is_native: bool) -> String {
    if is_native {
        return format!("{network_id}:native");
    }
    let address = address.unwrap_or_default().to_lowercase();
    format!("{network_id}:{address}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_id_round_trip() {
        for network in ALL_NETWORK_IDS {
            let parsed: NetworkId = network.as_str().parse().unwrap();
            assert_eq!(parsed, *network);
        }
    }

    #[test]
    fn test_network_id_serde_kebab_case() {
        let json = serde_json::to_string(&NetworkId::PolygonPosMainnet).unwrap();
        assert_eq!(json, "\"polygon-pos-mainnet\"");
        let back: NetworkId = serde_json::from_str("\"op-mainnet\"").unwrap();
        assert_eq!(back, NetworkId::OpMainnet);
    }

    #[test]
    fn test_token_id_lowercases_address() {
        let mixed = token_id(
            NetworkId::EthereumMainnet,
            Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            false,
        );
        let lower = token_id(
            NetworkId::EthereumMainnet,
            Some("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            false,
        );
        assert_eq!(mixed, lower);
        assert_eq!(
            mixed,
            "ethereum-mainnet:0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
        );
    }

    #[test]
    fn test_token_id_native() {
        assert_eq!(
            token_id(NetworkId::CeloMainnet, None, true),
            "celo-mainnet:native"
        );
    }

    #[test]
    fn test_rpc_env_key() {
        assert_eq!(
            NetworkId::ArbitrumOne.rpc_env_key(),
            "RPC_URL_ARBITRUM_ONE"
        );
    }
}
