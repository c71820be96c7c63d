//! Built-in app hooks.
//!
//! Protocol integrations normally live out of tree; the generic ERC-4626
//! hook ships with the engine because the vault standard needs no
//! protocol-specific knowledge beyond a vault list.

pub mod erc4626;

pub use erc4626::Erc4626Hook;
