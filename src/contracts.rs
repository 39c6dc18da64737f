//! Contract interfaces consumed by the collection pipeline.
//!
//! Defined with alloy's `sol!` macro. Only the read-only surface the
//! adapters and chain client actually call is declared here — no
//! router/executor interfaces, since this crate never submits
//! transactions.

use alloy::sol;

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
}

// ── Uniswap V2 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV2Factory {
        function getPair(address tokenA, address tokenB) external view returns (address pair);
    }
}

sol! {
    #[sol(rpc)]
    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
        function token0() external view returns (address);
        function token1() external view returns (address);
    }
}

// ── Uniswap V3 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface UniswapV3Factory {
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address pool);
    }
}

sol! {
    #[sol(rpc)]
    interface UniswapV3Pool {
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked);
        function liquidity() external view returns (uint128);
        function token0() external view returns (address);
        function token1() external view returns (address);
    }
}

// ── StableSwap (Curve-shaped pools) ─────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IStableSwapPool {
        function get_dy(int128 i, int128 j, uint256 dx) external view returns (uint256);
        function balances(uint256 i) external view returns (uint256);
        function coins(uint256 i) external view returns (address);
    }
}
