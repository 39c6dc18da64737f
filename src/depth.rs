//! V3 depth sampler (§4.5): slippage curve for V3-capable pairs at a
//! fixed notional ladder.
//!
//! Simulation is read-only: it works off the virtual reserves already
//! derived by [`crate::price_math::v3_virtual_reserves`] and applies
//! the same constant-product `amountOut` formula the teacher's
//! `PoolState::get_amount_out` uses for V2 pools (single-tick
//! approximation — a pool whose liquidity is concentrated away from
//! the current tick will report higher slippage here than an actual
//! tick-crossing simulation would).

use crate::types::{LiquidityDepth, SwapDirection};
use alloy::primitives::U256;
use chrono::Utc;
use num_bigint::BigUint;
use num_rational::BigRational;
use num_traits::Zero;

/// Default notional ladder, in token0-equivalent whole units: 1k, 10k, 100k.
pub const NOTIONAL_LADDER: [u64; 3] = [1_000, 10_000, 100_000];

/// V2-fee-shaped constant product swap: `amountIn * 997 * reserveOut /
/// (reserveIn * 1000 + amountIn * 997)`. Used only to approximate a V3
/// pool's local slippage from its virtual reserves, never to price a
/// real V2 swap path (that's `adapters::V2Adapter`'s job).
fn constant_product_amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256) -> U256 {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return U256::ZERO;
    }
    let amount_in_with_fee = amount_in.saturating_mul(U256::from(997));
    let numerator = amount_in_with_fee.saturating_mul(reserve_out);
    let denominator = reserve_in.saturating_mul(U256::from(1000)) + amount_in_with_fee;
    numerator / denominator
}

fn price_impact_bps(amount_in: U256, amount_out: U256, mid_price_num: U256, mid_price_den: U256) -> i64 {
    if amount_in.is_zero() || mid_price_den.is_zero() {
        return 0;
    }
    let expected_out = BigRational::new(
        BigUint::from_bytes_be(&amount_in.to_be_bytes::<32>()).into(),
        BigUint::from(1u32).into(),
    ) * BigRational::new(
        BigUint::from_bytes_be(&mid_price_num.to_be_bytes::<32>()).into(),
        BigUint::from_bytes_be(&mid_price_den.to_be_bytes::<32>()).into(),
    );
    if expected_out.is_zero() {
        return 0;
    }
    let actual_out = BigRational::from_integer(BigUint::from_bytes_be(&amount_out.to_be_bytes::<32>()).into());
    let slippage = BigRational::from_integer(BigUint::from(1u32).into()) - (&actual_out / &expected_out);
    let bps = slippage * BigRational::from_integer(BigUint::from(10_000u32).into());
    bps.to_integer().to_i64().unwrap_or(0)
}

trait ToI64 {
    fn to_i64(&self) -> Option<i64>;
}
impl ToI64 for num_bigint::BigInt {
    fn to_i64(&self) -> Option<i64> {
        num_traits::ToPrimitive::to_i64(self)
    }
}

/// Samples the slippage curve for one pair in both directions, given
/// its current virtual (or native V2) reserves and decimals.
pub fn sample_depths(
    pair_id: i64,
    reserve0: U256,
    reserve1: U256,
    decimals0: u8,
    block_number: u64,
) -> Vec<LiquidityDepth> {
    let now = Utc::now();
    let mut out = Vec::with_capacity(NOTIONAL_LADDER.len() * 2);
    let unit = U256::from(10u64).pow(U256::from(decimals0));

    for notional in NOTIONAL_LADDER {
        let amount_in = U256::from(notional).saturating_mul(unit);

        let out0 = constant_product_amount_out(amount_in, reserve0, reserve1);
        out.push(LiquidityDepth {
            pair_id,
            direction: SwapDirection::Token0ToToken1,
            amount_in: amount_in.to_string(),
            amount_out: out0.to_string(),
            price_impact_bps: price_impact_bps(amount_in, out0, reserve1, reserve0),
            block_number,
            timestamp: now,
        });

        let out1 = constant_product_amount_out(amount_in, reserve1, reserve0);
        out.push(LiquidityDepth {
            pair_id,
            direction: SwapDirection::Token1ToToken0,
            amount_in: amount_in.to_string(),
            amount_out: out1.to_string(),
            price_impact_bps: price_impact_bps(amount_in, out1, reserve0, reserve1),
            block_number,
            timestamp: now,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_depths_produces_both_directions_per_notional() {
        let rows = sample_depths(
            1,
            U256::from(1_000_000_000_000u64),
            U256::from_str_radix("500000000000000000000000", 10).unwrap(),
            6,
            100,
        );
        assert_eq!(rows.len(), NOTIONAL_LADDER.len() * 2);
        assert!(rows.iter().any(|r| r.direction == SwapDirection::Token0ToToken1));
        assert!(rows.iter().any(|r| r.direction == SwapDirection::Token1ToToken0));
    }

    #[test]
    fn larger_trades_see_more_slippage() {
        let r0 = U256::from(1_000_000_000_000u64);
        let r1 = U256::from_str_radix("500000000000000000000000", 10).unwrap();
        let small = constant_product_amount_out(U256::from(1_000_000u64), r0, r1);
        let large = constant_product_amount_out(U256::from(1_000_000_000u64), r0, r1);
        let small_rate = small.to::<u128>() as f64 / 1_000_000.0;
        let large_rate = large.to::<u128>() as f64 / 1_000_000_000.0;
        assert!(large_rate < small_rate);
    }
}
