//! Concentrated-liquidity (Uniswap V3 shape) adapter (§4.2).
//!
//! Grounded on `pool::v3_syncer::V3PoolSyncer`'s `slot0`/`liquidity`
//! fetch flow, re-expressed over `ChainClient`. Virtual reserves are
//! derived purely to keep `PairReserve`/`PriceRecord.reserve{0,1}`
//! uniform across protocol families (§9) — `sqrt_price_x96`, `tick`,
//! and `liquidity` on the returned quote are the authoritative V3
//! state and must be preferred by any reader that cares about the
//! difference.

use super::{checked_pool_address, AdapterQuote, PoolAdapter};
use crate::chain::ChainClient;
use crate::contracts::{UniswapV3Factory, UniswapV3Pool};
use crate::error::CollectError;
use crate::price_math::{v3_price_from_sqrt, v3_virtual_reserves};
use crate::types::PoolDescriptor;
use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use async_trait::async_trait;

pub struct V3Adapter;

#[async_trait]
impl PoolAdapter for V3Adapter {
    fn name(&self) -> &'static str {
        "v3"
    }

    async fn get_pool_address(
        &self,
        client: &dyn ChainClient,
        descriptor: &PoolDescriptor,
    ) -> Result<Address, CollectError> {
        let PoolDescriptor::V3 {
            factory,
            token0,
            token1,
            fee_tier,
        } = descriptor
        else {
            return Err(CollectError::Decode("v3 adapter given non-v3 descriptor".into()));
        };
        let calldata = UniswapV3Factory::getPoolCall {
            tokenA: *token0,
            tokenB: *token1,
            fee: alloy::primitives::Uint::from(*fee_tier),
        }
        .abi_encode();
        let raw = client.call(*factory, calldata).await?;
        let ret = UniswapV3Factory::getPoolCall::abi_decode_returns(&raw)
            .map_err(|e| CollectError::Decode(e.to_string()))?;
        checked_pool_address(ret)
    }

    async fn get_price(
        &self,
        client: &dyn ChainClient,
        pool_address: Address,
        decimals0: u8,
        decimals1: u8,
    ) -> Result<AdapterQuote, CollectError> {
        let slot0_calldata = UniswapV3Pool::slot0Call {}.abi_encode();
        let slot0_raw = client.call(pool_address, slot0_calldata).await?;
        let slot0 = UniswapV3Pool::slot0Call::abi_decode_returns(&slot0_raw)
            .map_err(|e| CollectError::Decode(e.to_string()))?;

        let liquidity_calldata = UniswapV3Pool::liquidityCall {}.abi_encode();
        let liquidity_raw = client.call(pool_address, liquidity_calldata).await?;
        let liquidity_ret = UniswapV3Pool::liquidityCall::abi_decode_returns(&liquidity_raw)
            .map_err(|e| CollectError::Decode(e.to_string()))?;

        if liquidity_ret == 0 {
            return Err(CollectError::NoLiquidity);
        }

        let sqrt_price_x96 = alloy::primitives::U256::from(slot0.sqrtPriceX96);
        let (price, inverse_price) = v3_price_from_sqrt(sqrt_price_x96, decimals0, decimals1)?;
        let (reserve0, reserve1) = v3_virtual_reserves(liquidity_ret, sqrt_price_x96);

        Ok(AdapterQuote {
            price,
            inverse_price,
            reserve0,
            reserve1,
            sqrt_price_x96: Some(sqrt_price_x96),
            tick: Some(slot0.tick.as_i32()),
            liquidity: Some(liquidity_ret),
        })
    }
}
