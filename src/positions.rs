//! Position and token data model.
//!
//! The unresolved side (definitions) is what hooks return: addresses plus
//! valuation functions. The resolved side (positions/tokens) is the
//! materialized output with concrete balances and USD pricing, and is what
//! serializes to the API schema. App tokens nest recursively - a vault
//! share over an LP token over base tokens forms a tree, assumed acyclic.

use std::collections::HashMap;
use std::fmt;

use futures::future::BoxFuture;
use serde::Serialize;

use crate::networks::NetworkId;
use crate::numbers::DecimalNumber;
use crate::tokens_info::TokensByAddress;

// ============================================
// DEFINITIONS (unresolved, returned by hooks)
// ============================================

/// Reference to a token whose concrete metadata is not yet known.
#[derive(Debug, Clone)]
pub struct TokenDefinition {
    pub network_id: NetworkId,
    /// Lowercased contract address.
    pub address: String,
    pub category: Option<TokenCategory>,
    /// Price to use if the token ends up classified as an unlisted base
    /// token (e.g. an LP token priced by the protocol's own API).
    pub fallback_price_usd: Option<DecimalNumber>,
}

impl TokenDefinition {
    pub fn new(network_id: NetworkId, address: impl Into<String>) -> Self {
        Self {
            network_id,
            address: address.into().to_lowercase(),
            category: None,
            fallback_price_usd: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenCategory {
    Claimable,
}

/// Human-readable display metadata for a position.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayProps {
    /// Example: "CELO / cUSD"
    pub title: String,
    /// Example: "Pool"
    pub description: String,
    pub image_url: String,
}

/// Context available to display-props accessors that need resolved tokens
/// (e.g. titles built from underlying token symbols).
pub struct DisplayPropsContext<'a> {
    pub resolved_tokens: &'a HashMap<String, Token>,
}

/// Display metadata, either static or derived from resolved token context.
pub enum DisplayPropsSource {
    Static(DisplayProps),
    FromContext(Box<dyn Fn(&DisplayPropsContext) -> DisplayProps + Send + Sync>),
}

impl DisplayPropsSource {
    pub fn resolve(&self, context: &DisplayPropsContext) -> DisplayProps {
        match self {
            DisplayPropsSource::Static(props) => props.clone(),
            DisplayPropsSource::FromContext(f) => f(context),
        }
    }
}

impl fmt::Debug for DisplayPropsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayPropsSource::Static(props) => f.debug_tuple("Static").field(props).finish(),
            DisplayPropsSource::FromContext(_) => f.write_str("FromContext(..)"),
        }
    }
}

/// Context passed to price-per-share resolvers.
pub struct PricePerShareContext {
    pub tokens_by_address: TokensByAddress,
}

pub type PricePerShareFn = Box<
    dyn Fn(PricePerShareContext) -> BoxFuture<'static, eyre::Result<Vec<DecimalNumber>>>
        + Send
        + Sync,
>;

/// Price ratio between an app token and its underlying token(s): a static
/// list, or an async function receiving token metadata context.
pub enum PricePerShare {
    Static(Vec<DecimalNumber>),
    Resolver(PricePerShareFn),
}

impl fmt::Debug for PricePerShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricePerShare::Static(v) => f.debug_tuple("Static").field(v).finish(),
            PricePerShare::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// Context passed to contract-position balance resolvers.
pub struct BalancesContext {
    pub resolved_tokens: HashMap<String, Token>,
}

pub type BalancesFn = Box<
    dyn Fn(BalancesContext) -> BoxFuture<'static, eyre::Result<Vec<DecimalNumber>>> + Send + Sync,
>;

/// A contract position's holdings of each underlying token.
pub enum Balances {
    Static(Vec<DecimalNumber>),
    Resolver(BalancesFn),
}

impl fmt::Debug for Balances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Balances::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Balances::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// Definition of a transferable share token (vault share, LP token).
#[derive(Debug)]
pub struct AppTokenDefinition {
    pub network_id: NetworkId,
    /// Lowercased share token address.
    pub address: String,
    pub tokens: Vec<TokenDefinition>,
    pub display_props: DisplayPropsSource,
    pub price_per_share: PricePerShare,
    pub available_shortcut_ids: Vec<String>,
}

/// Definition of a non-transferable position (e.g. lending collateral).
#[derive(Debug)]
pub struct ContractPositionDefinition {
    pub network_id: NetworkId,
    /// Lowercased position address.
    pub address: String,
    pub tokens: Vec<TokenDefinition>,
    pub display_props: DisplayPropsSource,
    pub balances: Balances,
    pub available_shortcut_ids: Vec<String>,
}

/// An unresolved position description, pending valuation.
#[derive(Debug)]
pub enum PositionDefinition {
    AppToken(AppTokenDefinition),
    ContractPosition(ContractPositionDefinition),
}

impl PositionDefinition {
    pub fn network_id(&self) -> NetworkId {
        match self {
            PositionDefinition::AppToken(d) => d.network_id,
            PositionDefinition::ContractPosition(d) => d.network_id,
        }
    }

    /// Lowercased address, the dedup/lookup key during resolution.
    pub fn address(&self) -> &str {
        match self {
            PositionDefinition::AppToken(d) => &d.address,
            PositionDefinition::ContractPosition(d) => &d.address,
        }
    }

    pub fn tokens(&self) -> &[TokenDefinition] {
        match self {
            PositionDefinition::AppToken(d) => &d.tokens,
            PositionDefinition::ContractPosition(d) => &d.tokens,
        }
    }

    pub fn display_props(&self) -> &DisplayPropsSource {
        match self {
            PositionDefinition::AppToken(d) => &d.display_props,
            PositionDefinition::ContractPosition(d) => &d.display_props,
        }
    }

    pub fn available_shortcut_ids(&self) -> &[String] {
        match self {
            PositionDefinition::AppToken(d) => &d.available_shortcut_ids,
            PositionDefinition::ContractPosition(d) => &d.available_shortcut_ids,
        }
    }

    /// Lowercase the position address and every token reference, so hooks
    /// returning checksummed addresses collapse to the same lookup keys as
    /// everything else.
    pub fn into_normalized(mut self) -> Self {
        let (address, tokens) = match &mut self {
            PositionDefinition::AppToken(d) => (&mut d.address, &mut d.tokens),
            PositionDefinition::ContractPosition(d) => (&mut d.address, &mut d.tokens),
        };
        *address = address.to_lowercase();
        for token in tokens {
            token.address = token.address.to_lowercase();
        }
        self
    }
}

// ============================================
// RESOLVED POSITIONS AND TOKENS
// ============================================

/// A primitive ERC20-like token with an externally-sourced price.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseToken {
    pub network_id: NetworkId,
    pub address: String,
    /// Canonical `<network-id>:<address>` id (see [`crate::networks::token_id`]).
    pub token_id: String,
    pub symbol: String,
    pub decimals: u8,
    pub price_usd: DecimalNumber,
    pub balance: DecimalNumber,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<TokenCategory>,
}

/// A fully resolved app token: a claim on underlying token(s) via a
/// per-share price ratio, with app metadata and nested resolved tokens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppTokenPosition {
    pub network_id: NetworkId,
    pub address: String,
    /// Canonical `<network-id>:<address>` id (see [`crate::networks::token_id`]).
    pub token_id: String,
    pub app_id: String,
    pub app_name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Kept for wire compatibility; mirrors `display_props.title`.
    pub label: String,
    pub display_props: DisplayProps,
    pub tokens: Vec<Token>,
    pub price_per_share: Vec<DecimalNumber>,
    pub price_usd: DecimalNumber,
    pub balance: DecimalNumber,
    pub supply: DecimalNumber,
    pub available_shortcut_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<TokenCategory>,
}

/// A fully resolved contract position, valued directly in underlying
/// token balances.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractPosition {
    pub network_id: NetworkId,
    pub address: String,
    pub app_id: String,
    pub app_name: String,
    pub label: String,
    pub display_props: DisplayProps,
    pub tokens: Vec<Token>,
    pub balance_usd: DecimalNumber,
    pub available_shortcut_ids: Vec<String>,
}

/// A resolved token: either a base token or a (recursive) app token.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Token {
    #[serde(rename = "base-token")]
    Base(BaseToken),
    #[serde(rename = "app-token")]
    App(AppTokenPosition),
}

impl Token {
    pub fn address(&self) -> &str {
        match self {
            Token::Base(t) => &t.address,
            Token::App(t) => &t.address,
        }
    }

    pub fn decimals(&self) -> u8 {
        match self {
            Token::Base(t) => t.decimals,
            Token::App(t) => t.decimals,
        }
    }

    pub fn price_usd(&self) -> &DecimalNumber {
        match self {
            Token::Base(t) => &t.price_usd,
            Token::App(t) => &t.price_usd,
        }
    }

    pub fn balance(&self) -> &DecimalNumber {
        match self {
            Token::Base(t) => &t.balance,
            Token::App(t) => &t.balance,
        }
    }

    /// Copy with the definition-level category stamped on, when present.
    pub fn with_category(&self, category: Option<TokenCategory>) -> Token {
        let mut token = self.clone();
        if category.is_some() {
            match &mut token {
                Token::Base(t) => t.category = category,
                Token::App(t) => t.category = category,
            }
        }
        token
    }
}

/// A materialized position, one per initially-discovered definition.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Position {
    #[serde(rename = "app-token")]
    AppToken(AppTokenPosition),
    #[serde(rename = "contract-position")]
    ContractPosition(ContractPosition),
}

impl Position {
    pub fn address(&self) -> &str {
        match self {
            Position::AppToken(p) => &p.address,
            Position::ContractPosition(p) => &p.address,
        }
    }

    pub fn app_id(&self) -> &str {
        match self {
            Position::AppToken(p) => &p.app_id,
            Position::ContractPosition(p) => &p.app_id,
        }
    }

    pub fn display_props(&self) -> &DisplayProps {
        match self {
            Position::AppToken(p) => &p.display_props,
            Position::ContractPosition(p) => &p.display_props,
        }
    }

    /// Total USD value: balance x unit price for app tokens, the summed
    /// underlying value for contract positions.
    pub fn balance_usd(&self) -> DecimalNumber {
        match self {
            Position::AppToken(p) => &p.balance * &p.price_usd,
            Position::ContractPosition(p) => p.balance_usd.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> DecimalNumber {
        s.parse().unwrap()
    }

    fn base_token(address: &str, balance: &str) -> BaseToken {
        BaseToken {
            network_id: NetworkId::EthereumMainnet,
            token_id: format!("ethereum-mainnet:{address}"),
            address: address.to_string(),
            symbol: "TST".to_string(),
            decimals: 18,
            price_usd: dec("2"),
            balance: dec(balance),
            category: None,
        }
    }

    #[test]
    fn test_token_definition_lowercases_address() {
        let def = TokenDefinition::new(
            NetworkId::EthereumMainnet,
            "0xA0b86991c6218B36c1d19D4a2e9Eb0cE3606eB48",
        );
        assert_eq!(def.address, "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
    }

    #[test]
    fn test_token_serializes_with_type_tag() {
        let token = Token::Base(base_token("0xabc", "1.5"));
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["type"], "base-token");
        assert_eq!(json["balance"], "1.5");
        assert_eq!(json["priceUsd"], "2");
        assert!(json.get("category").is_none());
    }

    #[test]
    fn test_with_category_stamps_only_when_present() {
        let token = Token::Base(base_token("0xabc", "0"));
        let stamped = token.with_category(Some(TokenCategory::Claimable));
        let untouched = stamped.with_category(None);
        match untouched {
            Token::Base(t) => assert_eq!(t.category, Some(TokenCategory::Claimable)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_position_balance_usd() {
        let position = Position::AppToken(AppTokenPosition {
            network_id: NetworkId::EthereumMainnet,
            token_id: "ethereum-mainnet:0xdef".to_string(),
            address: "0xdef".to_string(),
            app_id: "vault".to_string(),
            app_name: "Vault".to_string(),
            symbol: "vTST".to_string(),
            decimals: 18,
            label: "Vault".to_string(),
            display_props: DisplayProps {
                title: "Vault".to_string(),
                description: "Vault".to_string(),
                image_url: String::new(),
            },
            tokens: vec![],
            price_per_share: vec![dec("1.05")],
            price_usd: dec("2.1"),
            balance: dec("10"),
            supply: dec("1000"),
            available_shortcut_ids: vec![],
            category: None,
        });
        assert_eq!(position.balance_usd().to_serialized(), "21");
    }
}
