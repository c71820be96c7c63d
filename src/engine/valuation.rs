//! Position valuation.
//!
//! Given a definition and the current token-metadata / resolved-token
//! context, computes concrete balances, derived USD prices and nested
//! token breakdowns. All arithmetic is arbitrary-precision decimal;
//! serialized balances are truncated toward zero to the token's declared
//! precision to match on-chain dust accounting.

use std::collections::HashMap;
use std::str::FromStr;

use alloy_primitives::Address;
use eyre::{Result, WrapErr};

use crate::chain::ChainReader;
use crate::error::ValuationError;
use crate::hooks::AppInfo;
use crate::networks::{token_id, NetworkId};
use crate::numbers::DecimalNumber;
use crate::positions::{
    AppTokenDefinition, AppTokenPosition, Balances, BalancesContext, ContractPosition,
    ContractPositionDefinition, DisplayPropsContext, PricePerShare, PricePerShareContext, Token,
};
use crate::tokens_info::TokensByAddress;

fn missing_token(network_id: NetworkId, address: &str) -> ValuationError {
    ValuationError::MissingToken {
        network_id,
        address: address.to_string(),
    }
}

fn check_length(address: &str, expected: usize, actual: usize) -> Result<(), ValuationError> {
    if expected != actual {
        return Err(ValuationError::LengthMismatch {
            address: address.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Stamp a resolved token (and, recursively, its underlying app-token
/// tree) with the balance attributable to a holding of `balance` units at
/// the given share ratio. Ratios multiply down the chain: a vault share
/// over an LP token over a base token compounds both ratios.
pub(crate) fn token_with_underlying_balance(
    token: &Token,
    balance: &DecimalNumber,
    price_per_share: &DecimalNumber,
) -> Token {
    let underlying = balance * price_per_share;
    match token {
        Token::Base(base) => {
            let mut base = base.clone();
            base.balance = underlying.truncated(base.decimals);
            Token::Base(base)
        }
        Token::App(app) => {
            let one = DecimalNumber::one();
            let mut app = app.clone();
            app.tokens = app
                .tokens
                .iter()
                .enumerate()
                .map(|(i, nested)| {
                    // price_per_share is index-aligned with tokens; resolved
                    // app tokens are built with matching lengths.
                    let ratio = app.price_per_share.get(i).unwrap_or(&one);
                    token_with_underlying_balance(nested, &underlying, ratio)
                })
                .collect();
            app.balance = underlying.truncated(app.decimals);
            Token::App(app)
        }
    }
}

/// Resolve an app-token definition into a full position.
///
/// The token's own USD unit price is the ratio-weighted sum of its
/// underlying token prices; the holder's balance comes from an on-chain
/// balanceOf/totalSupply read (zeroed when no holder was requested).
#[allow(clippy::too_many_arguments)]
pub(crate) async fn resolve_app_token_position(
    holder: Option<Address>,
    definition: &AppTokenDefinition,
    app_id: &str,
    app_info: &AppInfo,
    tokens_by_address: &TokensByAddress,
    resolved_tokens: &HashMap<String, Token>,
    chain: &dyn ChainReader,
) -> Result<AppTokenPosition> {
    let price_per_share = match &definition.price_per_share {
        PricePerShare::Static(ratios) => ratios.clone(),
        PricePerShare::Resolver(resolve) => {
            resolve(PricePerShareContext {
                tokens_by_address: tokens_by_address.clone(),
            })
            .await?
        }
    };
    check_length(&definition.address, definition.tokens.len(), price_per_share.len())?;

    let mut price_usd = DecimalNumber::zero();
    for (token, ratio) in definition.tokens.iter().zip(&price_per_share) {
        let info = tokens_by_address
            .get(&token.address)
            .ok_or_else(|| missing_token(token.network_id, &token.address))?;
        price_usd = &price_usd + &(ratio * &info.price_usd);
    }

    let position_token_info = tokens_by_address
        .get(&definition.address)
        .ok_or_else(|| missing_token(definition.network_id, &definition.address))?;

    let share_token = Address::from_str(&definition.address)
        .wrap_err_with(|| format!("invalid app token address: {}", definition.address))?;
    let (raw_balance, raw_supply) = chain
        .share_balances(definition.network_id, share_token, holder)
        .await?;
    let balance = DecimalNumber::from_base_units(raw_balance, position_token_info.decimals);
    let supply = DecimalNumber::from_base_units(raw_supply, position_token_info.decimals);

    let display_props = definition
        .display_props
        .resolve(&DisplayPropsContext { resolved_tokens });

    let tokens = definition
        .tokens
        .iter()
        .zip(&price_per_share)
        .map(|(token, ratio)| {
            let resolved = resolved_tokens
                .get(&token.address)
                .ok_or_else(|| missing_token(token.network_id, &token.address))?;
            Ok(token_with_underlying_balance(resolved, &balance, ratio))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(AppTokenPosition {
        network_id: definition.network_id,
        token_id: token_id(definition.network_id, Some(&definition.address), false),
        address: definition.address.clone(),
        app_id: app_id.to_string(),
        app_name: app_info.name.clone(),
        symbol: position_token_info.symbol.clone(),
        decimals: position_token_info.decimals,
        label: display_props.title.clone(),
        display_props,
        tokens,
        price_per_share,
        price_usd,
        balance,
        supply,
        available_shortcut_ids: definition.available_shortcut_ids.clone(),
        category: None,
    })
}

/// Resolve a contract-position definition into a full position.
///
/// Balances are already denominated in underlying-token units, so each
/// underlying token is stamped with a ratio of 1; the position's USD value
/// is the price-weighted sum of those balances.
pub(crate) async fn resolve_contract_position(
    definition: &ContractPositionDefinition,
    app_id: &str,
    app_info: &AppInfo,
    resolved_tokens: &HashMap<String, Token>,
) -> Result<ContractPosition> {
    let balances = match &definition.balances {
        Balances::Static(balances) => balances.clone(),
        Balances::Resolver(resolve) => {
            resolve(BalancesContext {
                resolved_tokens: resolved_tokens.clone(),
            })
            .await?
        }
    };
    check_length(&definition.address, definition.tokens.len(), balances.len())?;

    let one = DecimalNumber::one();
    let mut balance_usd = DecimalNumber::zero();
    let mut tokens = Vec::with_capacity(definition.tokens.len());
    for (token, balance) in definition.tokens.iter().zip(&balances) {
        let resolved = resolved_tokens
            .get(&token.address)
            .ok_or_else(|| missing_token(token.network_id, &token.address))?;
        balance_usd = &balance_usd + &(balance * resolved.price_usd());
        tokens.push(token_with_underlying_balance(
            &resolved.with_category(token.category),
            balance,
            &one,
        ));
    }

    let display_props = definition
        .display_props
        .resolve(&DisplayPropsContext { resolved_tokens });

    Ok(ContractPosition {
        network_id: definition.network_id,
        address: definition.address.clone(),
        app_id: app_id.to_string(),
        app_name: app_info.name.clone(),
        label: display_props.title.clone(),
        display_props,
        tokens,
        balance_usd,
        available_shortcut_ids: definition.available_shortcut_ids.clone(),
    })
}
