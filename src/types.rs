//! Core data model: tokens, DEXes, trading pairs, and the time-series
//! records the collector appends on every tick.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// An ERC-20 token tracked by the engine. Immutable once seeded except `is_active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: i64,
    pub address: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub chain_id: u64,
    pub is_active: bool,
}

/// Protocol family a DEX belongs to. The closed set a `PoolDescriptor`
/// and the adapter factory are allowed to route to (§4.2/§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DexType {
    Amm,
    Stableswap,
    Aggregator,
    Orderbook,
    Hybrid,
}

/// AMM sub-version, relevant only when `DexType::Amm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DexVersion {
    V2,
    V3,
}

/// Capability flags a DEX can advertise. Stored as a set; the invariant
/// `dex_type=amm and version=v3 => v3_ticks in capabilities` is enforced
/// in `Dex::validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    FlashLoan,
    MultiHop,
    V3Ticks,
    DynamicFee,
}

/// A decentralized exchange deployment (one router/factory pair per chain).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dex {
    pub id: i64,
    pub name: String,
    /// Tag used by the adapter factory to pick an implementation, e.g.
    /// "uniswap_v2", "uniswap_v3", "curve".
    pub protocol_tag: String,
    pub dex_type: DexType,
    pub router_address: Address,
    pub factory_address: Address,
    pub quoter_address: Option<Address>,
    pub fee_bps: u32,
    pub fee_tier: Option<u32>,
    pub version: Option<DexVersion>,
    pub chain_id: u64,
    pub priority: i32,
    pub capabilities: HashSet<Capability>,
}

impl Dex {
    /// Enforces the cross-field invariant from the data model: a V3 AMM
    /// must advertise `v3_ticks`.
    pub fn validate(&self) -> Result<(), String> {
        if self.dex_type == DexType::Amm
            && self.version == Some(DexVersion::V3)
            && !self.capabilities.contains(&Capability::V3Ticks)
        {
            return Err(format!(
                "dex {} is amm/v3 but missing v3_ticks capability",
                self.name
            ));
        }
        Ok(())
    }
}

/// A monitored token0/token1 pool on a given DEX.
///
/// `token0.address < token1.address` byte-lexicographically is the
/// canonical ordering invariant (§3, §8 invariant 7); `new` enforces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingPair {
    pub id: i64,
    pub dex_id: i64,
    pub token0_id: i64,
    pub token1_id: i64,
    pub token0_address: Address,
    pub token1_address: Address,
    pub token0_decimals: u8,
    pub token1_decimals: u8,
    pub pair_address: Address,
    pub fee_tier: Option<u32>,
    pub is_active: bool,
}

impl TradingPair {
    /// Sorts the two token addresses into canonical (token0 < token1) order.
    pub fn canonical_order(a: Address, b: Address) -> (Address, Address) {
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn is_canonically_ordered(&self) -> bool {
        self.token0_address < self.token1_address
    }
}

/// A description of the on-chain pool a `PoolAdapter` needs to query
/// (Design Notes §9). Replaces a variadic-argument adapter call with a
/// closed sum type — adding a protocol family means adding a variant,
/// not widening an "any" slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolDescriptor {
    V2 {
        factory: Address,
        token0: Address,
        token1: Address,
    },
    V3 {
        factory: Address,
        token0: Address,
        token1: Address,
        fee_tier: u32,
    },
    Stable {
        pool_address: Address,
    },
}

/// One reserve sample for a V2-shaped pair (native V2, or virtual for V3 — §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairReserve {
    pub pair_id: i64,
    pub reserve0: String,
    pub reserve1: String,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

/// One normalized price sample. V3-only fields are `None` when the
/// pair's DEX lacks the `v3_ticks` capability (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub pair_id: i64,
    pub price: Decimal,
    pub inverse_price: Decimal,
    pub reserve0: String,
    pub reserve1: String,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
    pub sqrt_price_x96: Option<String>,
    pub tick: Option<i32>,
    pub liquidity: Option<String>,
}

/// Direction of a simulated swap used to sample the depth curve (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    Token0ToToken1,
    Token1ToToken0,
}

/// One point on a pair's slippage curve at a fixed notional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityDepth {
    pub pair_id: i64,
    pub direction: SwapDirection,
    pub amount_in: String,
    pub amount_out: String,
    pub price_impact_bps: i64,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

/// Network congestion classification, a total function of gas price (§4.4, §8 invariant 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkLoad {
    Low,
    Normal,
    High,
    Congested,
}

impl NetworkLoad {
    /// Classifies a legacy gas price, in gwei, into a congestion tier.
    /// Thresholds match §4.4 exactly: <20 low, <50 normal, <100 high, else congested.
    pub fn classify(gas_price_gwei: f64) -> Self {
        if gas_price_gwei < 20.0 {
            NetworkLoad::Low
        } else if gas_price_gwei < 50.0 {
            NetworkLoad::Normal
        } else if gas_price_gwei < 100.0 {
            NetworkLoad::High
        } else {
            NetworkLoad::Congested
        }
    }
}

impl fmt::Display for NetworkLoad {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NetworkLoad::Low => write!(f, "low"),
            NetworkLoad::Normal => write!(f, "normal"),
            NetworkLoad::High => write!(f, "high"),
            NetworkLoad::Congested => write!(f, "congested"),
        }
    }
}

/// One gas-price sample (§3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasPriceHistory {
    pub gas_price: String,
    pub base_fee: String,
    pub priority_fee: String,
    pub max_fee: String,
    pub fast_price: String,
    pub standard_price: String,
    pub slow_price: String,
    pub pending_tx_count: Option<u64>,
    pub network_load: NetworkLoad,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_sorts_by_address() {
        let lo = Address::from([0x01; 20]);
        let hi = Address::from([0xff; 20]);
        assert_eq!(TradingPair::canonical_order(hi, lo), (lo, hi));
        assert_eq!(TradingPair::canonical_order(lo, hi), (lo, hi));
    }

    #[test]
    fn network_load_classification_matches_thresholds() {
        assert_eq!(NetworkLoad::classify(0.0), NetworkLoad::Low);
        assert_eq!(NetworkLoad::classify(19.99), NetworkLoad::Low);
        assert_eq!(NetworkLoad::classify(20.0), NetworkLoad::Normal);
        assert_eq!(NetworkLoad::classify(49.99), NetworkLoad::Normal);
        assert_eq!(NetworkLoad::classify(50.0), NetworkLoad::High);
        assert_eq!(NetworkLoad::classify(99.99), NetworkLoad::High);
        assert_eq!(NetworkLoad::classify(100.0), NetworkLoad::Congested);
        assert_eq!(NetworkLoad::classify(500.0), NetworkLoad::Congested);
    }

    #[test]
    fn dex_validate_requires_v3_ticks_for_v3_amm() {
        let mut dex = Dex {
            id: 1,
            name: "uniswap-v3".into(),
            protocol_tag: "uniswap_v3".into(),
            dex_type: DexType::Amm,
            router_address: Address::ZERO,
            factory_address: Address::ZERO,
            quoter_address: None,
            fee_bps: 30,
            fee_tier: Some(3000),
            version: Some(DexVersion::V3),
            chain_id: 137,
            priority: 0,
            capabilities: HashSet::new(),
        };
        assert!(dex.validate().is_err());
        dex.capabilities.insert(Capability::V3Ticks);
        assert!(dex.validate().is_ok());
    }
}
