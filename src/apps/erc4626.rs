//! Generic ERC-4626 tokenized vault hook.
//!
//! Each configured vault is surfaced as an app token over its underlying
//! asset, priced via `convertToAssets` (assets received for one whole
//! share). Vault shares held inside other positions resolve through the
//! same path via the app-token resolver.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use futures::FutureExt;
use tracing::debug;

use crate::abis::IERC4626;
use crate::chain::ChainReader;
use crate::error::HookError;
use crate::hooks::{AppInfo, AppTokenResolver, PositionsHook};
use crate::networks::NetworkId;
use crate::numbers::DecimalNumber;
use crate::positions::{
    AppTokenDefinition, DisplayProps, DisplayPropsSource, PositionDefinition, PricePerShare,
    TokenDefinition,
};

pub const APP_ID: &str = "erc4626";

/// Hook over a configured list of ERC-4626 vaults.
pub struct Erc4626Hook {
    chain: Arc<dyn ChainReader>,
    vaults: Vec<(NetworkId, Address)>,
}

impl Erc4626Hook {
    pub fn new(chain: Arc<dyn ChainReader>, vaults: Vec<(NetworkId, Address)>) -> Self {
        Self { chain, vaults }
    }

    fn is_known_vault(&self, network_id: NetworkId, address: Address) -> bool {
        self.vaults
            .iter()
            .any(|(n, a)| *n == network_id && *a == address)
    }

    /// Read the vault's asset, share decimals and current share price,
    /// and build the app-token definition around them.
    async fn vault_definition(
        &self,
        network_id: NetworkId,
        vault: Address,
    ) -> Result<AppTokenDefinition, HookError> {
        let asset_return = self
            .chain
            .call(network_id, vault, IERC4626::assetCall {}.abi_encode().into())
            .await?;
        let asset = IERC4626::assetCall::abi_decode_returns(&asset_return)
            .map_err(|e| HookError::Other(eyre::eyre!("bad asset() return from {vault}: {e}")))?;

        let decimals_return = self
            .chain
            .call(network_id, vault, IERC4626::decimalsCall {}.abi_encode().into())
            .await?;
        let share_decimals = IERC4626::decimalsCall::abi_decode_returns(&decimals_return)
            .map_err(|e| HookError::Other(eyre::eyre!("bad decimals() return from {vault}: {e}")))?;

        // Assets out for one whole share; scaling to a decimal ratio needs
        // the underlying token's decimals, which only the resolution
        // context knows.
        let one_share = U256::from(10u64).pow(U256::from(share_decimals));
        let assets_return = self
            .chain
            .call(
                network_id,
                vault,
                IERC4626::convertToAssetsCall { shares: one_share }
                    .abi_encode()
                    .into(),
            )
            .await?;
        let assets_per_share = IERC4626::convertToAssetsCall::abi_decode_returns(&assets_return)
            .map_err(|e| {
                HookError::Other(eyre::eyre!("bad convertToAssets() return from {vault}: {e}"))
            })?;
        debug!(%vault, %network_id, %assets_per_share, "read vault share price");

        let asset_address = format!("{asset:?}").to_lowercase();
        let price_asset_address = asset_address.clone();
        let display_asset_address = asset_address.clone();

        Ok(AppTokenDefinition {
            network_id,
            address: format!("{vault:?}").to_lowercase(),
            tokens: vec![TokenDefinition::new(network_id, asset_address)],
            display_props: DisplayPropsSource::FromContext(Box::new(move |context| {
                let symbol = context
                    .resolved_tokens
                    .get(&display_asset_address)
                    .map(|token| match token {
                        crate::positions::Token::Base(t) => t.symbol.clone(),
                        crate::positions::Token::App(t) => t.symbol.clone(),
                    })
                    .unwrap_or_else(|| "?".to_string());
                DisplayProps {
                    title: format!("{symbol} Vault"),
                    description: "ERC-4626 tokenized vault".to_string(),
                    image_url: String::new(),
                }
            })),
            price_per_share: PricePerShare::Resolver(Box::new(move |context| {
                let asset_address = price_asset_address.clone();
                async move {
                    let decimals = context
                        .tokens_by_address
                        .get(&asset_address)
                        .map(|info| info.decimals)
                        .ok_or_else(|| {
                            eyre::eyre!("underlying token {asset_address} missing from context")
                        })?;
                    Ok(vec![DecimalNumber::from_base_units(
                        assets_per_share,
                        decimals,
                    )])
                }
                .boxed()
            })),
            available_shortcut_ids: vec![],
        })
    }
}

#[async_trait]
impl PositionsHook for Erc4626Hook {
    fn get_info(&self) -> AppInfo {
        AppInfo {
            id: APP_ID.to_string(),
            name: "ERC-4626 Vaults".to_string(),
            description: "Tokenized yield vaults".to_string(),
        }
    }

    async fn get_position_definitions(
        &self,
        network_id: NetworkId,
        address: Option<Address>,
    ) -> eyre::Result<Vec<PositionDefinition>> {
        let mut definitions = Vec::new();
        for (vault_network, vault) in &self.vaults {
            if *vault_network != network_id {
                continue;
            }
            // Address-specific requests only surface vaults the holder
            // actually has shares in.
            if let Some(holder) = address {
                let (balance, _supply) = self
                    .chain
                    .share_balances(network_id, *vault, Some(holder))
                    .await?;
                if balance.is_zero() {
                    continue;
                }
            }
            let definition = self.vault_definition(network_id, *vault).await?;
            definitions.push(PositionDefinition::AppToken(definition));
        }
        Ok(definitions)
    }

    fn app_token_resolver(&self) -> Option<&dyn AppTokenResolver> {
        Some(self)
    }
}

#[async_trait]
impl AppTokenResolver for Erc4626Hook {
    async fn get_app_token_definition(
        &self,
        definition: &TokenDefinition,
    ) -> Result<AppTokenDefinition, HookError> {
        let address = Address::from_str(&definition.address).map_err(|_| {
            HookError::UnknownAppToken {
                network_id: definition.network_id,
                address: definition.address.clone(),
            }
        })?;
        if !self.is_known_vault(definition.network_id, address) {
            return Err(HookError::UnknownAppToken {
                network_id: definition.network_id,
                address: definition.address.clone(),
            });
        }
        self.vault_definition(definition.network_id, address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, Bytes};
    use crate::error::ChainReadError;
    use crate::tokens_info::TokenInfo;

    /// A chain reader that must never be reached.
    struct UnreachableChain;

    #[async_trait]
    impl ChainReader for UnreachableChain {
        async fn call(
            &self,
            _network_id: NetworkId,
            _target: Address,
            _calldata: Bytes,
        ) -> Result<Bytes, ChainReadError> {
            panic!("unexpected chain read");
        }

        async fn erc20_token_info(
            &self,
            _network_id: NetworkId,
            _address: Address,
        ) -> Result<TokenInfo, ChainReadError> {
            panic!("unexpected chain read");
        }

        async fn share_balances(
            &self,
            _network_id: NetworkId,
            _token: Address,
            _holder: Option<Address>,
        ) -> Result<(U256, U256), ChainReadError> {
            panic!("unexpected chain read");
        }
    }

    #[tokio::test]
    async fn test_unknown_vault_is_not_an_app_token() {
        let hook = Erc4626Hook::new(Arc::new(UnreachableChain), vec![]);
        let token = TokenDefinition::new(
            NetworkId::EthereumMainnet,
            "0x1111111111111111111111111111111111111111",
        );
        let err = hook.get_app_token_definition(&token).await.unwrap_err();
        assert!(matches!(err, HookError::UnknownAppToken { .. }));
    }

    #[test]
    fn test_resolver_capability_is_present() {
        let hook = Erc4626Hook::new(Arc::new(UnreachableChain), vec![]);
        assert!(hook.app_token_resolver().is_some());
        assert_eq!(hook.get_info().id, APP_ID);
    }

    #[tokio::test]
    async fn test_no_definitions_on_other_networks() {
        let vault = address!("3333333333333333333333333333333333333333");
        let hook = Erc4626Hook::new(
            Arc::new(UnreachableChain),
            vec![(NetworkId::EthereumMainnet, vault)],
        );
        // Wrong network: the vault list filter short-circuits before any
        // chain read.
        let definitions = hook
            .get_position_definitions(NetworkId::CeloMainnet, None)
            .await
            .unwrap();
        assert!(definitions.is_empty());
    }
}
