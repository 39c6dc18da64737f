//! Decimal-adjusted price conversion (§4.3).
//!
//! All conversions route through arbitrary-precision rationals; a
//! float never appears before the final rounding to a `Decimal` at the
//! persistence boundary (Design Notes §9).

use crate::error::CollectError;
use alloy::primitives::U256;
use num_bigint::BigUint;
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};
use rust_decimal::Decimal;
use std::str::FromStr;

fn u256_to_biguint(v: U256) -> BigUint {
    BigUint::from_bytes_be(&v.to_be_bytes::<32>())
}

fn pow10(exp: i32) -> BigRational {
    let ten = BigUint::from(10u32);
    if exp >= 0 {
        BigRational::from_integer(ten.pow(exp as u32).into())
    } else {
        BigRational::new(BigUint::from(1u32).into(), ten.pow((-exp) as u32).into())
    }
}

fn rational_to_decimal(r: &BigRational) -> Result<Decimal, CollectError> {
    // Scale to a fixed-point integer at 18 fractional digits, then let
    // Decimal parse the resulting string. Avoids ever passing through f64.
    const SCALE: u32 = 18;
    let scaled = r * BigRational::from_integer(BigUint::from(10u64).pow(SCALE).into());
    let truncated = scaled.to_integer();
    let mut s = truncated.to_string();
    let negative = s.starts_with('-');
    if negative {
        s.remove(0);
    }
    while (s.len() as u32) <= SCALE {
        s.insert(0, '0');
    }
    let split_at = s.len() - SCALE as usize;
    let (int_part, frac_part) = s.split_at(split_at);
    let text = format!("{}{}.{}", if negative { "-" } else { "" }, int_part, frac_part);
    Decimal::from_str(&text).map_err(|e| CollectError::Decode(format!("decimal parse: {e}")))
}

/// V2 constant-product price: `(reserve1 / 10^d1) / (reserve0 / 10^d0)`,
/// i.e. token1 per token0 (§4.3). Fails `NoLiquidity` when either
/// reserve is zero (§8 boundary behavior).
pub fn v2_price(
    reserve0: U256,
    reserve1: U256,
    decimals0: u8,
    decimals1: u8,
) -> Result<(Decimal, Decimal), CollectError> {
    if reserve0.is_zero() || reserve1.is_zero() {
        return Err(CollectError::NoLiquidity);
    }
    let r0 = BigRational::from_integer(u256_to_biguint(reserve0).into());
    let r1 = BigRational::from_integer(u256_to_biguint(reserve1).into());
    let adj = pow10(decimals0 as i32 - decimals1 as i32);
    let price = (&r1 / &r0) * &adj;
    let inverse = (&r0 / &r1) / &adj;
    Ok((rational_to_decimal(&price)?, rational_to_decimal(&inverse)?))
}

/// Converts a Q64.96 `sqrtPriceX96` to a decimal-adjusted price
/// (token1 per token0), via `(sqrtPriceX96 / 2^96)^2` computed over
/// arbitrary-precision rationals (§4.2, round-trip law in §8).
///
/// Returns `InvalidPrice` when `sqrt_price_x96` is zero.
pub fn v3_price_from_sqrt(
    sqrt_price_x96: U256,
    decimals0: u8,
    decimals1: u8,
) -> Result<(Decimal, Decimal), CollectError> {
    if sqrt_price_x96.is_zero() {
        return Err(CollectError::InvalidPrice("sqrtPriceX96 is zero".into()));
    }
    let sqrt_price = BigRational::from_integer(u256_to_biguint(sqrt_price_x96).into());
    let q96 = BigRational::from_integer((BigUint::from(1u32) << 96u32).into());
    let ratio = &sqrt_price / &q96;
    let raw_price = &ratio * &ratio;
    let adj = pow10(decimals0 as i32 - decimals1 as i32);
    let price = &raw_price * &adj;
    let inverse = if raw_price.is_zero() {
        BigRational::from_integer(BigUint::zero().into())
    } else {
        BigRational::from_integer(BigUint::from(1u32).into()) / (&raw_price * &adj)
    };
    Ok((rational_to_decimal(&price)?, rational_to_decimal(&inverse)?))
}

/// Converts a decimal-adjusted price back to `sqrtPriceX96`, used only
/// by the round-trip tests in §8 — never on the write path.
pub fn price_to_sqrt_x96(price: &BigRational) -> BigUint {
    let q96 = BigRational::from_integer((BigUint::from(1u32) << 96u32).into());
    let sqrt_price = sqrt_rational(price) * q96;
    sqrt_price.to_integer().to_biguint().unwrap_or_default()
}

/// Newton's method square root over `BigRational`, precise enough for
/// the 1-ULP-at-192-bit round-trip law (§8).
fn sqrt_rational(x: &BigRational) -> BigRational {
    if x.is_zero() {
        return BigRational::from_integer(BigUint::zero().into());
    }
    let mut guess = BigRational::from_float(x.to_f64().unwrap_or(1.0).sqrt())
        .unwrap_or_else(|| BigRational::from_integer(BigUint::from(1u32).into()));
    for _ in 0..60 {
        guess = (&guess + x / &guess) / BigRational::from_integer(BigUint::from(2u32).into());
    }
    guess
}

/// Derives virtual V2-shaped reserves from V3 `liquidity` and
/// `sqrtPriceX96`, purely to keep the persisted schema uniform (§4.2,
/// §9 Open Question: "virtual reserves must be flagged at read time").
///
/// `reserve0 ~= liquidity / sqrtPrice`, `reserve1 ~= liquidity * sqrtPrice`.
pub fn v3_virtual_reserves(liquidity: u128, sqrt_price_x96: U256) -> (U256, U256) {
    if sqrt_price_x96.is_zero() || liquidity == 0 {
        return (U256::ZERO, U256::ZERO);
    }
    let liq = BigRational::from_integer(BigUint::from(liquidity).into());
    let q96 = BigRational::from_integer((BigUint::from(1u32) << 96u32).into());
    let sqrt_price = BigRational::from_integer(u256_to_biguint(sqrt_price_x96).into()) / q96;
    let reserve0 = (&liq / &sqrt_price).to_integer().to_biguint().unwrap_or_default();
    let reserve1 = (&liq * &sqrt_price).to_integer().to_biguint().unwrap_or_default();
    (biguint_to_u256(&reserve0), biguint_to_u256(&reserve1))
}

fn biguint_to_u256(v: &BigUint) -> U256 {
    let bytes = v.to_bytes_be();
    let mut buf = [0u8; 32];
    if bytes.len() <= 32 {
        buf[32 - bytes.len()..].copy_from_slice(&bytes);
        U256::from_be_bytes(buf)
    } else {
        U256::MAX
    }
}

/// Signed percentage error between a chain-observed value and a stored
/// value, used by verification tooling (§4.3, §9 Open Question).
/// Deliberately signed: a negative result means the stored value
/// exceeds the chain value.
pub fn error_rate_percent(chain: Decimal, db: Decimal) -> Option<Decimal> {
    if chain.is_zero() {
        return None;
    }
    Some((chain - db) / chain * Decimal::from(100))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn v2_price_usdc_weth() {
        // S1: USDC(6)/WETH(18), reserves (1_000_000 USDC, 500_000 WETH).
        let r0 = U256::from(1_000_000_000_000u64); // 1,000,000 USDC (6 decimals)
        let r1 = U256::from_str_radix("500000000000000000000000", 10).unwrap(); // 500,000 WETH (18 decimals)
        let (price, inverse) = v2_price(r0, r1, 6, 18).unwrap();
        assert_eq!(price, Decimal::from_str("500.000000000000000000").unwrap());
        let expected_inverse = Decimal::from_str("0.002").unwrap();
        assert!((inverse - expected_inverse).abs() < Decimal::new(1, 15));
    }

    #[test]
    fn v2_price_zero_reserve_is_no_liquidity() {
        assert!(matches!(
            v2_price(U256::ZERO, U256::from(1), 18, 18),
            Err(CollectError::NoLiquidity)
        ));
        assert!(matches!(
            v2_price(U256::from(1), U256::ZERO, 18, 18),
            Err(CollectError::NoLiquidity)
        ));
    }

    #[test]
    fn v3_price_at_tick_zero() {
        // S2: sqrtPriceX96 = 2^96 => price = 1.0, equal decimals.
        let sqrt_price = U256::from(1u8) << 96u32;
        let (price, inverse) = v3_price_from_sqrt(sqrt_price, 18, 18).unwrap();
        assert_eq!(price, Decimal::from_str("1.000000000000000000").unwrap());
        assert_eq!(inverse, Decimal::from_str("1.000000000000000000").unwrap());
    }

    #[test]
    fn v3_price_zero_sqrt_is_invalid() {
        assert!(matches!(
            v3_price_from_sqrt(U256::ZERO, 18, 18),
            Err(CollectError::InvalidPrice(_))
        ));
    }

    #[test]
    fn error_rate_is_signed() {
        let rate = error_rate_percent(dec!(100), dec!(110)).unwrap();
        assert!(rate < Decimal::ZERO);
        assert_eq!(rate, dec!(-10));

        let rate = error_rate_percent(dec!(100), dec!(90)).unwrap();
        assert_eq!(rate, dec!(10));
    }

    #[test]
    fn error_rate_undefined_when_chain_price_is_zero() {
        assert_eq!(error_rate_percent(Decimal::ZERO, dec!(5)), None);
    }
}
