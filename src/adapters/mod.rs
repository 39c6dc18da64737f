//! Protocol adapters (§4.2) and the factory that selects one (§4.3, §9).
//!
//! Each adapter satisfies the same three-method contract over a
//! [`PoolDescriptor`], so the collector never branches on protocol
//! family — only the adapter it was handed does.

mod factory;
mod stable;
mod v2;
mod v3;

pub use factory::AdapterFactory;
pub use stable::StableAdapter;
pub use v2::V2Adapter;
pub use v3::V3Adapter;

use crate::chain::ChainClient;
use crate::error::CollectError;
use crate::types::PoolDescriptor;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Normalized result of a price query, before the collector stamps it
/// with a tick's shared `(block_number, timestamp)`.
#[derive(Debug, Clone)]
pub struct AdapterQuote {
    pub price: Decimal,
    pub inverse_price: Decimal,
    pub reserve0: U256,
    pub reserve1: U256,
    pub sqrt_price_x96: Option<U256>,
    pub tick: Option<i32>,
    pub liquidity: Option<u128>,
}

#[async_trait]
pub trait PoolAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Resolves the pool's on-chain address, if the descriptor doesn't
    /// already carry one directly (e.g. stableswap pools are addressed
    /// directly; V2/V3 pools are resolved through a factory).
    async fn get_pool_address(
        &self,
        client: &dyn ChainClient,
        descriptor: &PoolDescriptor,
    ) -> Result<Address, CollectError>;

    /// Queries and normalizes the current price for `pool_address`.
    async fn get_price(
        &self,
        client: &dyn ChainClient,
        pool_address: Address,
        decimals0: u8,
        decimals1: u8,
    ) -> Result<AdapterQuote, CollectError>;
}

pub(crate) fn zero_address_is_not_found(addr: Address) -> Result<Address, CollectError> {
    if addr == Address::ZERO {
        Err(CollectError::NotFound("pool address is zero".into()))
    } else {
        Ok(addr)
    }
}

pub(crate) use zero_address_is_not_found as checked_pool_address;
