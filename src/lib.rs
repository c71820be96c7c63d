//! holdscan - DeFi position aggregation and USD valuation engine.
//!
//! Aggregates on-chain positions (token balances, vault shares, lending
//! deposits) held by an address across per-protocol adapters ("hooks"),
//! normalizes them into a common schema, and resolves USD values and
//! display metadata. Intermediary app tokens are discovered iteratively
//! to a fixed point, then valued in dependency order so USD pricing
//! propagates through arbitrarily nested token compositions.
//!
//! The entry point is [`engine::PositionResolver::get_positions`].

pub mod abis;
pub mod apps;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod networks;
pub mod numbers;
pub mod positions;
pub mod shortcuts;
pub mod tokens_info;

pub use chain::{ChainReader, EvmChainReader};
pub use config::Config;
pub use engine::PositionResolver;
pub use error::{ChainReadError, HookError, ValuationError};
pub use hooks::{AppInfo, AppTokenResolver, HookRegistry, PositionsHook};
pub use networks::{token_id, NetworkId};
pub use numbers::DecimalNumber;
pub use positions::{Position, PositionDefinition, Token, TokenDefinition};
pub use tokens_info::{HttpTokenInfoSource, TokenInfo, TokenInfoSource, TokensByAddress};
