//! Batched chain reads.
//!
//! All on-chain reads go through [`ChainReader`], a narrow trait the engine
//! and hooks consume. The production implementation speaks JSON-RPC via
//! alloy and batches related reads through Multicall3 so one logical
//! lookup (symbol + decimals, balanceOf + totalSupply) costs one RPC call.
//!
//! RPC endpoints are memoized per network in process-wide state, lazily
//! initialized on first use and never torn down. Construction is
//! idempotent, so a race on first call is harmless.

use std::collections::HashMap;
use std::sync::RwLock;

use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use tracing::debug;

use crate::abis::{IMulticall3, IERC20, MULTICALL3};
use crate::error::ChainReadError;
use crate::networks::NetworkId;
use crate::numbers::DecimalNumber;
use crate::tokens_info::TokenInfo;

/// Narrow chain read capability consumed by the engine and hooks.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Raw `eth_call` against an arbitrary contract.
    async fn call(
        &self,
        network_id: NetworkId,
        target: Address,
        calldata: Bytes,
    ) -> Result<Bytes, ChainReadError>;

    /// Generic ERC20 symbol/decimals read (price defaults to zero).
    async fn erc20_token_info(
        &self,
        network_id: NetworkId,
        address: Address,
    ) -> Result<TokenInfo, ChainReadError>;

    /// balanceOf(holder) and totalSupply for a share token, in one batch.
    /// The balance is zero when no holder address was requested.
    async fn share_balances(
        &self,
        network_id: NetworkId,
        token: Address,
        holder: Option<Address>,
    ) -> Result<(U256, U256), ChainReadError>;
}

lazy_static::lazy_static! {
    /// Per-network RPC endpoints, filled lazily on first use.
    static ref RPC_URLS: RwLock<HashMap<NetworkId, String>> = RwLock::new(HashMap::new());
}

/// Resolve the RPC endpoint for a network, memoizing the result.
fn rpc_url(network_id: NetworkId, overrides: &HashMap<NetworkId, String>) -> String {
    if let Some(url) = RPC_URLS.read().unwrap().get(&network_id) {
        return url.clone();
    }
    let url = overrides
        .get(&network_id)
        .cloned()
        .unwrap_or_else(|| network_id.default_rpc_url().to_string());
    RPC_URLS
        .write()
        .unwrap()
        .entry(network_id)
        .or_insert_with(|| url.clone());
    url
}

/// Production chain reader speaking JSON-RPC via alloy.
#[derive(Default)]
pub struct EvmChainReader {
    /// Per-network RPC overrides (from config); the process-wide default
    /// table covers the rest.
    rpc_overrides: HashMap<NetworkId, String>,
}

impl EvmChainReader {
    pub fn new(rpc_overrides: HashMap<NetworkId, String>) -> Self {
        Self { rpc_overrides }
    }

    fn transport_err(network_id: NetworkId, reason: impl ToString) -> ChainReadError {
        ChainReadError::Transport {
            network_id,
            reason: reason.to_string(),
        }
    }

    /// Split call failures into the two error classes: a JSON-RPC error
    /// response is the node executing the call and the contract rejecting
    /// it (revert, invalid opcode, no code); everything below that layer
    /// is transport.
    fn classify_call_error(
        network_id: NetworkId,
        target: Address,
        is_error_response: bool,
        reason: String,
    ) -> ChainReadError {
        if is_error_response {
            ChainReadError::ContractCallFailure {
                network_id,
                address: target,
                reason,
            }
        } else {
            ChainReadError::Transport { network_id, reason }
        }
    }

    /// Execute a Multicall3 batch - a single RPC call.
    async fn execute_multicall(
        &self,
        network_id: NetworkId,
        calls: Vec<IMulticall3::Call3>,
    ) -> Result<Vec<IMulticall3::Result>, ChainReadError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let calldata = IMulticall3::aggregate3Call { calls }.abi_encode();
        let result = self.call(network_id, MULTICALL3, calldata.into()).await?;

        IMulticall3::aggregate3Call::abi_decode_returns(&result)
            .map_err(|e| Self::transport_err(network_id, format!("failed to decode multicall: {e}")))
    }
}

#[async_trait]
impl ChainReader for EvmChainReader {
    async fn call(
        &self,
        network_id: NetworkId,
        target: Address,
        calldata: Bytes,
    ) -> Result<Bytes, ChainReadError> {
        let url = rpc_url(network_id, &self.rpc_overrides);
        let provider = ProviderBuilder::new().connect_http(
            url.parse()
                .map_err(|e| Self::transport_err(network_id, format!("bad rpc url {url}: {e}")))?,
        );

        let tx = TransactionRequest::default().to(target).input(calldata.into());

        provider.call(tx).await.map_err(|e| {
            let is_error_response = e.as_error_resp().is_some();
            Self::classify_call_error(network_id, target, is_error_response, e.to_string())
        })
    }

    async fn erc20_token_info(
        &self,
        network_id: NetworkId,
        address: Address,
    ) -> Result<TokenInfo, ChainReadError> {
        let calls = vec![
            IMulticall3::Call3 {
                target: address,
                allowFailure: true,
                callData: IERC20::symbolCall {}.abi_encode().into(),
            },
            IMulticall3::Call3 {
                target: address,
                allowFailure: true,
                callData: IERC20::decimalsCall {}.abi_encode().into(),
            },
        ];

        debug!(%address, %network_id, "fetching generic ERC20 token info");
        let results = self.execute_multicall(network_id, calls).await?;

        let contract_failure = |what: &str| ChainReadError::ContractCallFailure {
            network_id,
            address,
            reason: format!("{what} call failed"),
        };

        let symbol = results
            .first()
            .filter(|r| r.success)
            .ok_or_else(|| contract_failure("symbol"))
            .and_then(|r| {
                IERC20::symbolCall::abi_decode_returns(&r.returnData)
                    .map_err(|_| contract_failure("symbol"))
            })?;
        let decimals = results
            .get(1)
            .filter(|r| r.success)
            .ok_or_else(|| contract_failure("decimals"))
            .and_then(|r| {
                IERC20::decimalsCall::abi_decode_returns(&r.returnData)
                    .map_err(|_| contract_failure("decimals"))
            })?;

        Ok(TokenInfo {
            network_id,
            address: format!("{address:?}").to_lowercase(),
            symbol,
            decimals,
            image_url: String::new(),
            price_usd: DecimalNumber::zero(),
        })
    }

    async fn share_balances(
        &self,
        network_id: NetworkId,
        token: Address,
        holder: Option<Address>,
    ) -> Result<(U256, U256), ChainReadError> {
        let mut calls = Vec::new();
        if let Some(holder) = holder {
            calls.push(IMulticall3::Call3 {
                target: token,
                allowFailure: false,
                callData: IERC20::balanceOfCall { account: holder }.abi_encode().into(),
            });
        }
        calls.push(IMulticall3::Call3 {
            target: token,
            allowFailure: false,
            callData: IERC20::totalSupplyCall {}.abi_encode().into(),
        });

        let results = self.execute_multicall(network_id, calls).await?;

        let decode_u256 = |result: &IMulticall3::Result| -> Result<U256, ChainReadError> {
            IERC20::totalSupplyCall::abi_decode_returns(&result.returnData).map_err(|_| {
                ChainReadError::ContractCallFailure {
                    network_id,
                    address: token,
                    reason: "balance read returned undecodable data".to_string(),
                }
            })
        };

        match holder {
            Some(_) => {
                let balance = decode_u256(results.first().ok_or_else(|| {
                    Self::transport_err(network_id, "multicall returned too few results")
                })?)?;
                let supply = decode_u256(results.get(1).ok_or_else(|| {
                    Self::transport_err(network_id, "multicall returned too few results")
                })?)?;
                Ok((balance, supply))
            }
            None => {
                let supply = decode_u256(results.first().ok_or_else(|| {
                    Self::transport_err(network_id, "multicall returned too few results")
                })?)?;
                Ok((U256::ZERO, supply))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_url_memoizes_first_resolution() {
        let mut overrides = HashMap::new();
        overrides.insert(
            NetworkId::CeloAlfajores,
            "http://localhost:8545".to_string(),
        );

        let first = rpc_url(NetworkId::CeloAlfajores, &overrides);
        assert_eq!(first, "http://localhost:8545");

        // Later overrides don't displace the memoized endpoint.
        overrides.insert(
            NetworkId::CeloAlfajores,
            "http://localhost:9999".to_string(),
        );
        let second = rpc_url(NetworkId::CeloAlfajores, &overrides);
        assert_eq!(second, "http://localhost:8545");
    }

    #[test]
    fn test_rpc_url_falls_back_to_default() {
        let url = rpc_url(NetworkId::BaseSepolia, &HashMap::new());
        assert_eq!(url, NetworkId::BaseSepolia.default_rpc_url());
    }

    #[test]
    fn test_error_response_classifies_as_contract_failure() {
        use crate::error::HookError;
        use alloy_primitives::address;

        let target = address!("1111111111111111111111111111111111111111");

        // Node-level error responses cover reverts whose message carries
        // no recognizable keywords; they must stay in the recoverable
        // "not an app token" class.
        let revert = EvmChainReader::classify_call_error(
            NetworkId::EthereumMainnet,
            target,
            true,
            "server returned an error response: error code 3: vault: paused".to_string(),
        );
        assert!(matches!(revert, ChainReadError::ContractCallFailure { .. }));
        assert!(matches!(
            HookError::from(revert),
            HookError::UnknownAppToken { .. }
        ));

        let transport = EvmChainReader::classify_call_error(
            NetworkId::EthereumMainnet,
            target,
            false,
            "connection refused".to_string(),
        );
        assert!(matches!(transport, ChainReadError::Transport { .. }));
        assert!(matches!(HookError::from(transport), HookError::Other(_)));
    }
}
