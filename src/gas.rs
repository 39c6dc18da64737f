//! Gas-price sampler (§4.4): unifies legacy and EIP-1559 fee signals
//! into a single three-tier congestion reading.

use crate::chain::ChainClient;
use crate::types::{GasPriceHistory, NetworkLoad};
use chrono::Utc;

const WEI_PER_GWEI: f64 = 1e9;

/// Samples gas once and returns the row to persist. Any sub-step
/// failure degrades that field to zero rather than failing the whole
/// sample (§4.4) — only a failure to fetch the legacy gas price itself
/// aborts the sample.
pub async fn sample_gas(client: &dyn ChainClient) -> anyhow::Result<GasPriceHistory> {
    let gas_price = client.suggest_gas_price().await?;

    let header = client.latest_header().await.ok();
    let base_fee = header.and_then(|h| h.base_fee_per_gas).unwrap_or(0) as u128;
    let block_number = header.map(|h| h.number).unwrap_or(0);

    let priority_fee = client.suggest_priority_fee().await.unwrap_or(0);

    let max_fee = 2 * base_fee + priority_fee;

    // Integer-only: §9 permits float arithmetic solely for the gwei
    // congestion threshold comparison below, never for persisted values.
    let fast = gas_price * 12 / 10;
    let standard = gas_price;
    let slow = gas_price * 8 / 10;

    let gas_price_gwei = gas_price as f64 / WEI_PER_GWEI;
    let network_load = NetworkLoad::classify(gas_price_gwei);

    Ok(GasPriceHistory {
        gas_price: gas_price.to_string(),
        base_fee: base_fee.to_string(),
        priority_fee: priority_fee.to_string(),
        max_fee: max_fee.to_string(),
        fast_price: fast.to_string(),
        standard_price: standard.to_string(),
        slow_price: slow.to_string(),
        pending_tx_count: None,
        network_load,
        block_number,
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::BlockHeader;
    use crate::error::CollectError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FakeClient {
        gas_price: u128,
        base_fee: Option<u64>,
        priority_fee: u128,
        calls: AtomicU64,
    }

    #[async_trait]
    impl ChainClient for FakeClient {
        async fn block_number(&self) -> Result<u64, CollectError> {
            Ok(100)
        }
        async fn latest_header(&self) -> Result<BlockHeader, CollectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(BlockHeader {
                number: 100,
                base_fee_per_gas: self.base_fee,
                timestamp: 0,
            })
        }
        async fn suggest_gas_price(&self) -> Result<u128, CollectError> {
            Ok(self.gas_price)
        }
        async fn suggest_priority_fee(&self) -> Result<u128, CollectError> {
            Ok(self.priority_fee)
        }
        async fn call(&self, _c: alloy::primitives::Address, _d: Vec<u8>) -> Result<Vec<u8>, CollectError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn s5_gas_classification() {
        // S5: gas=45gwei, base_fee=30gwei, priority=2gwei.
        let client = FakeClient {
            gas_price: 45_000_000_000,
            base_fee: Some(30_000_000_000),
            priority_fee: 2_000_000_000,
            calls: AtomicU64::new(0),
        };
        let row = sample_gas(&client).await.unwrap();
        assert_eq!(row.max_fee, "62000000000");
        assert_eq!(row.fast_price, "54000000000");
        assert_eq!(row.slow_price, "36000000000");
        assert_eq!(row.network_load, NetworkLoad::Normal);
    }
}
