//! StableSwap (Curve shape) adapter (§4.2).
//!
//! No teacher file queries a Curve-style pool directly; this is
//! enriched from the pack's StableSwap-adjacent `get_dy`/`balances`
//! surface (see `contracts::IStableSwapPool`, declared from the same
//! ABI shape Curve's `StableSwap3Pool` exposes). Price is derived from
//! a 1-unit `get_dy` quote rather than reserves, since stable pools do
//! not expose `reserve0`/`reserve1` directly.

use super::{checked_pool_address, AdapterQuote, PoolAdapter};
use crate::chain::ChainClient;
use crate::contracts::IStableSwapPool;
use crate::error::CollectError;
use crate::types::PoolDescriptor;
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use num_bigint::BigUint;
use num_rational::BigRational;
use rust_decimal::Decimal;
use std::str::FromStr;

pub struct StableAdapter;

#[async_trait]
impl PoolAdapter for StableAdapter {
    fn name(&self) -> &'static str {
        "stable"
    }

    async fn get_pool_address(
        &self,
        _client: &dyn ChainClient,
        descriptor: &PoolDescriptor,
    ) -> Result<Address, CollectError> {
        let PoolDescriptor::Stable { pool_address } = descriptor else {
            return Err(CollectError::Decode(
                "stable adapter given non-stable descriptor".into(),
            ));
        };
        checked_pool_address(*pool_address)
    }

    async fn get_price(
        &self,
        client: &dyn ChainClient,
        pool_address: Address,
        decimals0: u8,
        decimals1: u8,
    ) -> Result<AdapterQuote, CollectError> {
        let balance0_calldata = IStableSwapPool::balancesCall { i: U256::from(0) }.abi_encode();
        let balance0_raw = client.call(pool_address, balance0_calldata).await?;
        let balance0 = IStableSwapPool::balancesCall::abi_decode_returns(&balance0_raw)
            .map_err(|e| CollectError::Decode(e.to_string()))?;

        let balance1_calldata = IStableSwapPool::balancesCall { i: U256::from(1) }.abi_encode();
        let balance1_raw = client.call(pool_address, balance1_calldata).await?;
        let balance1 = IStableSwapPool::balancesCall::abi_decode_returns(&balance1_raw)
            .map_err(|e| CollectError::Decode(e.to_string()))?;

        if balance0.is_zero() || balance1.is_zero() {
            return Err(CollectError::NoLiquidity);
        }

        let one_unit = U256::from(10u64).pow(U256::from(decimals0));
        let dy_calldata = IStableSwapPool::get_dyCall {
            i: 0i128,
            j: 1i128,
            dx: one_unit,
        }
        .abi_encode();
        let dy_raw = client.call(pool_address, dy_calldata).await?;
        let dy = IStableSwapPool::get_dyCall::abi_decode_returns(&dy_raw)
            .map_err(|e| CollectError::Decode(e.to_string()))?;

        let price = u256_ratio_to_decimal(dy, U256::from(10u64).pow(U256::from(decimals1)))?;
        let inverse_price = if price.is_zero() {
            Decimal::ZERO
        } else {
            Decimal::ONE / price
        };

        Ok(AdapterQuote {
            price,
            inverse_price,
            reserve0: balance0,
            reserve1: balance1,
            sqrt_price_x96: None,
            tick: None,
            liquidity: None,
        })
    }
}

fn u256_ratio_to_decimal(num: U256, den: U256) -> Result<Decimal, CollectError> {
    if den.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let n = BigUint::from_bytes_be(&num.to_be_bytes::<32>());
    let d = BigUint::from_bytes_be(&den.to_be_bytes::<32>());
    let ratio = BigRational::new(n.into(), d.into());
    const SCALE: u32 = 18;
    let scaled = ratio * BigRational::from_integer(BigUint::from(10u64).pow(SCALE).into());
    let mut s = scaled.to_integer().to_string();
    while (s.len() as u32) <= SCALE {
        s.insert(0, '0');
    }
    let split_at = s.len() - SCALE as usize;
    let (int_part, frac_part) = s.split_at(split_at);
    Decimal::from_str(&format!("{int_part}.{frac_part}"))
        .map_err(|e| CollectError::Decode(format!("decimal parse: {e}")))
}
