//! Runtime configuration from environment variables and `.env`.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use alloy_primitives::Address;
use eyre::{eyre, Result, WrapErr};

use crate::networks::{NetworkId, ALL_NETWORK_IDS};

/// Default base-token metadata endpoint.
pub const DEFAULT_GET_TOKENS_INFO_URL: &str = "https://api.mainnet.valora.xyz/getTokensInfo";

#[derive(Debug, Clone)]
pub struct Config {
    /// Per-network RPC overrides; networks without an entry use the
    /// built-in public defaults.
    pub rpc_urls: HashMap<NetworkId, String>,

    /// URL of the bulk token metadata API.
    pub get_tokens_info_url: String,

    /// ERC-4626 vaults surfaced by the built-in vault hook, from
    /// `ERC4626_VAULTS` as comma-separated `<network-id>:<address>` pairs.
    pub erc4626_vaults: Vec<(NetworkId, Address)>,
}

impl Config {
    /// Load configuration from environment variables and .env file.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut rpc_urls = HashMap::new();
        for network in ALL_NETWORK_IDS {
            if let Ok(url) = env::var(network.rpc_env_key()) {
                rpc_urls.insert(*network, url);
            }
        }

        let get_tokens_info_url = env::var("GET_TOKENS_INFO_URL")
            .unwrap_or_else(|_| DEFAULT_GET_TOKENS_INFO_URL.to_string());

        let erc4626_vaults = env::var("ERC4626_VAULTS")
            .map(|raw| parse_vault_list(&raw))
            .unwrap_or_else(|_| Ok(Vec::new()))?;

        Ok(Self {
            rpc_urls,
            get_tokens_info_url,
            erc4626_vaults,
        })
    }
}

fn parse_vault_list(raw: &str) -> Result<Vec<(NetworkId, Address)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (network, address) = entry
                .split_once(':')
                .ok_or_else(|| eyre!("expected <network-id>:<address>, got '{entry}'"))?;
            let network = NetworkId::from_str(network)
                .wrap_err_with(|| format!("bad vault entry '{entry}'"))?;
            let address = Address::from_str(address)
                .wrap_err_with(|| format!("bad vault address in '{entry}'"))?;
            Ok((network, address))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vault_list() {
        let vaults = parse_vault_list(
            "ethereum-mainnet:0x83F20F44975D03b1b09e64809B757c47f942BEeA, \
             arbitrum-one:0x724dc807b04555b71ed48a6896b6f41593b8c637",
        )
        .unwrap();
        assert_eq!(vaults.len(), 2);
        assert_eq!(vaults[0].0, NetworkId::EthereumMainnet);
        assert_eq!(vaults[1].0, NetworkId::ArbitrumOne);
    }

    #[test]
    fn test_parse_vault_list_rejects_garbage() {
        assert!(parse_vault_list("not-a-network:0x1234").is_err());
        assert!(parse_vault_list("ethereum-mainnet").is_err());
        assert!(parse_vault_list("").unwrap().is_empty());
    }
}
