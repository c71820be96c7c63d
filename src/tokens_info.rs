//! Base token metadata from the external token list API.
//!
//! The API returns symbol/decimals/price for well-known tokens, keyed by
//! token id. The engine only cares about address-keyed lookups, so the
//! response is flattened into a map keyed by lowercased contract address.
//!
//! A process-wide short-TTL cache backs repeated requests; token lists
//! move slowly and the engine re-reads them on every resolution pass.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::networks::NetworkId;
use crate::numbers::DecimalNumber;

/// How long a fetched token list stays fresh.
pub const TOKENS_INFO_CACHE_SECS: u64 = 60;

/// Resolved metadata for a known token (no balance attached).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub network_id: NetworkId,
    /// Lowercased contract address.
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
    pub image_url: String,
    pub price_usd: DecimalNumber,
}

/// Token metadata keyed by lowercased address.
pub type TokensByAddress = HashMap<String, TokenInfo>;

/// Wire format of one entry in the token list API response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTokenInfo {
    address: Option<String>,
    symbol: String,
    decimals: u8,
    #[serde(default)]
    image_url: String,
    network_id: NetworkId,
    #[serde(default)]
    price_usd: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokensInfoResponse {
    tokens: HashMap<String, RawTokenInfo>,
}

/// Source of bulk base-token metadata.
#[async_trait]
pub trait TokenInfoSource: Send + Sync {
    async fn get_base_tokens_info(&self) -> Result<TokensByAddress>;
}

struct CachedTokens {
    tokens: TokensByAddress,
    fetched_at: Instant,
}

lazy_static::lazy_static! {
    // Keyed by URL so differently-configured sources don't collide.
    static ref TOKENS_INFO_CACHE: RwLock<HashMap<String, CachedTokens>> =
        RwLock::new(HashMap::new());
}

/// Fetches the token list over HTTP, with a process-wide TTL cache.
pub struct HttpTokenInfoSource {
    url: String,
    http: reqwest::Client,
    cache_ttl: Duration,
}

impl HttpTokenInfoSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
            cache_ttl: Duration::from_secs(TOKENS_INFO_CACHE_SECS),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    fn cached(&self) -> Option<TokensByAddress> {
        let cache = TOKENS_INFO_CACHE.read().unwrap();
        cache.get(&self.url).and_then(|entry| {
            (entry.fetched_at.elapsed() < self.cache_ttl).then(|| entry.tokens.clone())
        })
    }
}

#[async_trait]
impl TokenInfoSource for HttpTokenInfoSource {
    async fn get_base_tokens_info(&self) -> Result<TokensByAddress> {
        if let Some(tokens) = self.cached() {
            debug!(tokens = tokens.len(), "using cached base token info");
            return Ok(tokens);
        }

        let response: TokensInfoResponse = self
            .http
            .get(&self.url)
            .send()
            .await
            .wrap_err("token info request failed")?
            .error_for_status()
            .wrap_err("token info request rejected")?
            .json()
            .await
            .wrap_err("token info response is not valid JSON")?;

        let tokens = flatten_tokens_response(response);
        debug!(tokens = tokens.len(), url = %self.url, "fetched base token info");

        let mut cache = TOKENS_INFO_CACHE.write().unwrap();
        cache.insert(
            self.url.clone(),
            CachedTokens {
                tokens: tokens.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(tokens)
    }
}

fn flatten_tokens_response(response: TokensInfoResponse) -> TokensByAddress {
    let mut tokens = TokensByAddress::new();
    for (_token_id, raw) in response.tokens {
        // Native assets carry no contract address; positions always
        // reference tokens by address, so they are skipped.
        let Some(address) = raw.address else {
            continue;
        };
        let address = address.to_lowercase();
        let price_usd = raw
            .price_usd
            .as_deref()
            .and_then(|p| DecimalNumber::from_str(p).ok())
            .unwrap_or_else(DecimalNumber::zero);
        tokens.insert(
            address.clone(),
            TokenInfo {
                network_id: raw.network_id,
                address,
                symbol: raw.symbol,
                decimals: raw.decimals,
                image_url: raw.image_url,
                price_usd,
            },
        );
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_skips_native_and_lowercases() {
        let response: TokensInfoResponse = serde_json::from_str(
            r#"{
                "tokens": {
                    "ethereum-mainnet:native": {
                        "symbol": "ETH",
                        "decimals": 18,
                        "networkId": "ethereum-mainnet",
                        "priceUsd": "3000"
                    },
                    "ethereum-mainnet:0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48": {
                        "address": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
                        "symbol": "USDC",
                        "decimals": 6,
                        "imageUrl": "https://example.com/usdc.png",
                        "networkId": "ethereum-mainnet",
                        "priceUsd": "1.0"
                    }
                }
            }"#,
        )
        .unwrap();

        let tokens = flatten_tokens_response(response);
        assert_eq!(tokens.len(), 1);
        let usdc = &tokens["0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"];
        assert_eq!(usdc.symbol, "USDC");
        assert_eq!(usdc.decimals, 6);
        assert_eq!(usdc.price_usd.to_serialized(), "1");
    }

    #[test]
    fn test_flatten_defaults_missing_price_to_zero() {
        let response: TokensInfoResponse = serde_json::from_str(
            r#"{
                "tokens": {
                    "celo-mainnet:0xabc0000000000000000000000000000000000001": {
                        "address": "0xabc0000000000000000000000000000000000001",
                        "symbol": "FOO",
                        "decimals": 18,
                        "networkId": "celo-mainnet"
                    }
                }
            }"#,
        )
        .unwrap();

        let tokens = flatten_tokens_response(response);
        assert!(tokens["0xabc0000000000000000000000000000000000001"]
            .price_usd
            .is_zero());
    }
}
