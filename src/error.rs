//! Error taxonomy for position resolution.
//!
//! Two classes matter to the engine:
//! - recoverable per-item errors (a failing adapter, a token that turns
//!   out to be a plain ERC20) are swallowed at the narrowest scope and
//!   logged with app id / address / network context;
//! - everything else is fatal and aborts the whole request, since partial
//!   token metadata would produce silently wrong USD valuations.

use alloy_primitives::Address;
use thiserror::Error;

use crate::networks::NetworkId;

/// Failures from the chain read client.
#[derive(Debug, Error)]
pub enum ChainReadError {
    /// A contract call reverted or returned undecodable data - the address
    /// does not expose the expected interface. During token resolution
    /// this is the recoverable "not a recognized app token" class.
    #[error("contract call against {address} on {network_id} failed: {reason}")]
    ContractCallFailure {
        network_id: NetworkId,
        address: Address,
        reason: String,
    },

    /// RPC transport failure (connection, timeout, malformed response).
    #[error("rpc transport error on {network_id}: {reason}")]
    Transport {
        network_id: NetworkId,
        reason: String,
    },
}

/// Failures from an app hook resolving an intermediary token.
#[derive(Debug, Error)]
pub enum HookError {
    /// The address is not one of the app's tokens. The engine re-classifies
    /// it as a base ERC20 token instead of failing the request.
    #[error("{address} on {network_id} is not a recognized app token")]
    UnknownAppToken {
        network_id: NetworkId,
        address: String,
    },

    /// Anything else; propagates and aborts the request.
    #[error(transparent)]
    Other(#[from] eyre::Report),
}

impl From<ChainReadError> for HookError {
    fn from(err: ChainReadError) -> Self {
        match err {
            // Unexpected bytecode at the address: the hook probed a
            // contract that is not its app token.
            ChainReadError::ContractCallFailure {
                network_id,
                address,
                ..
            } => HookError::UnknownAppToken {
                network_id,
                address: format!("{address:?}"),
            },
            other => HookError::Other(eyre::Report::new(other)),
        }
    }
}

/// Failures while computing a position's numeric results.
#[derive(Debug, Error)]
pub enum ValuationError {
    /// A price-per-share or balance computation divided by zero (e.g. a
    /// zero total supply). Defined failure instead of a non-finite value.
    #[error("division by zero during position valuation")]
    DivisionByZero,

    /// A referenced token is missing from the resolution context. Indicates
    /// an engine bug or an adapter returning inconsistent definitions.
    #[error("token {address} on {network_id} missing from resolution context")]
    MissingToken {
        network_id: NetworkId,
        address: String,
    },

    /// An adapter returned a ratio/balance list whose length does not match
    /// its underlying token list.
    #[error("expected {expected} values for {address}, adapter returned {actual}")]
    LengthMismatch {
        address: String,
        expected: usize,
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_contract_call_failure_maps_to_unknown_app_token() {
        let err = ChainReadError::ContractCallFailure {
            network_id: NetworkId::EthereumMainnet,
            address: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            reason: "execution reverted".to_string(),
        };
        assert!(matches!(
            HookError::from(err),
            HookError::UnknownAppToken { .. }
        ));
    }

    #[test]
    fn test_transport_error_stays_fatal() {
        let err = ChainReadError::Transport {
            network_id: NetworkId::EthereumMainnet,
            reason: "connection refused".to_string(),
        };
        assert!(matches!(HookError::from(err), HookError::Other(_)));
    }
}
