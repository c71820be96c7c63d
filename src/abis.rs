//! Contract interfaces and well-known addresses.
//!
//! Only the generic interfaces the engine itself needs live here; protocol
//! hooks bring their own ABIs.

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;

/// Multicall3 (same address on all supported chains).
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

sol! {
    #[allow(missing_docs)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls)
            external payable returns (Result[] memory returnData);
    }
}

sol! {
    #[allow(missing_docs)]
    interface IERC20 {
        function totalSupply() external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string memory);
        function balanceOf(address account) external view returns (uint256);
    }
}

sol! {
    /// Tokenized vault standard, used by the generic vault hook.
    #[allow(missing_docs)]
    interface IERC4626 {
        function asset() external view returns (address);
        function convertToAssets(uint256 shares) external view returns (uint256);
        function decimals() external view returns (uint8);
    }
}
