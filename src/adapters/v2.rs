//! Constant-product (Uniswap V2 shape) adapter (§4.2).
//!
//! Grounded on the reserve-fetch flow in the teacher's
//! `pool::v2_syncer::V2PoolSyncer`, re-expressed over `ChainClient` and
//! alloy's `sol!`-generated call/return types instead of ethers-rs'
//! `abigen!` contract instances.

use super::{checked_pool_address, AdapterQuote, PoolAdapter};
use crate::chain::ChainClient;
use crate::contracts::{IUniswapV2Factory, IUniswapV2Pair};
use crate::error::CollectError;
use crate::price_math::v2_price;
use crate::types::PoolDescriptor;
use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use async_trait::async_trait;

pub struct V2Adapter;

#[async_trait]
impl PoolAdapter for V2Adapter {
    fn name(&self) -> &'static str {
        "v2"
    }

    async fn get_pool_address(
        &self,
        client: &dyn ChainClient,
        descriptor: &PoolDescriptor,
    ) -> Result<Address, CollectError> {
        let PoolDescriptor::V2 {
            factory,
            token0,
            token1,
        } = descriptor
        else {
            return Err(CollectError::Decode("v2 adapter given non-v2 descriptor".into()));
        };
        let calldata = IUniswapV2Factory::getPairCall {
            tokenA: *token0,
            tokenB: *token1,
        }
        .abi_encode();
        let raw = client.call(*factory, calldata).await?;
        let ret = IUniswapV2Factory::getPairCall::abi_decode_returns(&raw)
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
        let calldata = IUniswapV2Pair::getReservesCall {}.abi_encode();
        let raw = client.call(pool_address, calldata).await?;
        let ret = IUniswapV2Pair::getReservesCall::abi_decode_returns(&raw)
            .map_err(|e| CollectError::Decode(e.to_string()))?;

        let reserve0 = alloy::primitives::U256::from(ret.reserve0);
        let reserve1 = alloy::primitives::U256::from(ret.reserve1);
        let (price, inverse_price) = v2_price(reserve0, reserve1, decimals0, decimals1)?;

        Ok(AdapterQuote {
            price,
            inverse_price,
            reserve0,
            reserve1,
            sqrt_price_x96: None,
            tick: None,
            // V2 pairs have no v3_ticks capability; liquidity stays NULL (§3, §8).
            liquidity: None,
        })
    }
}
