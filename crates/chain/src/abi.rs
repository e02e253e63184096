use alloy::sol;

// ─── BartMart Barter Market ─────────────────────────────────────────────────
sol! {
    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract BartMart {
        // === Market events ===
        event OrderCreated(
            uint256 indexed orderId,
            address indexed creator,
            address inputToken,
            uint256 inputAmount,
            address outputToken,
            uint256 outputAmount
        );
        event OrderFulfilled(
            uint256 indexed orderId,
            address indexed fulfiller,
            address indexed creator
        );
        event OrderCancelled(uint256 indexed orderId, address indexed creator);

        // === View functions ===
        function orders(uint256 orderId) external view returns (
            address creator,
            address inputToken,
            uint256 inputAmount,
            address outputToken,
            uint256 outputAmount,
            bool fulfilled,
            bool cancelled
        );
        function orderCounter() external view returns (uint256);
    }
}
