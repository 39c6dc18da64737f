//! Collector (§4.6) — the central component.
//!
//! The concurrent fan-out is grounded on the teacher's
//! `pool::v2_syncer::V2PoolSyncer::sync_known_pools_parallel` (bounded
//! `join_all` over per-pool futures) and the `Engine<E,A>`
//! collector/strategy/executor join pattern in `paper_trading::engine`,
//! generalized from "sync known V2 pools" to "price every active pair
//! through whichever adapter its DEX resolves to".

use crate::adapters::AdapterFactory;
use crate::cache::{Cache, CachedPrice};
use crate::chain::ChainClient;
use crate::error::CollectError;
use crate::store::{ActivePair, Store, TimeSeriesTable};
use crate::types::{PairReserve, PoolDescriptor, PriceRecord};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Width of the collector's RPC concurrency gate (§4.6 step 2, §5). Default 20.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Per-pair retry attempts before giving up on a transient error (§4.6 step 3c).
const MAX_ATTEMPTS: u32 = 3;

/// Cache entry TTL on write (§4.6 step 3e).
const CACHE_WRITE_TTL_S: u64 = 300;

/// Counts the failure outcomes of one tick, surfaced to the scheduler for logging.
#[derive(Debug, Default)]
pub struct TickStats {
    pub priced: u64,
    pub no_liquidity: u64,
    pub not_found: u64,
    pub decode_errors: u64,
    pub unsupported: u64,
}

#[derive(Clone)]
pub struct Collector {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    adapters: Arc<AdapterFactory>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl Collector {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        adapters: Arc<AdapterFactory>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            chain,
            store,
            cache,
            adapters,
            concurrency,
            cancel,
        }
    }

    /// Handle shared with the scheduler so a `Stop` signal can interrupt
    /// in-flight workers, not just block new ticks from starting (§5).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn pool_descriptor(active: &ActivePair) -> Result<PoolDescriptor, CollectError> {
        match active.dex.protocol_tag.as_str() {
            "curve" | "balancer" => Ok(PoolDescriptor::Stable {
                pool_address: active.pair.pair_address,
            }),
            "uniswap_v3" | "pancakeswap_v3" | "sushiswap_v3" | "quickswap_v3" => Ok(PoolDescriptor::V3 {
                factory: active.dex.factory_address,
                token0: active.pair.token0_address,
                token1: active.pair.token1_address,
                fee_tier: active.pair.fee_tier.or(active.dex.fee_tier).unwrap_or(0),
            }),
            _ => Ok(PoolDescriptor::V2 {
                factory: active.dex.factory_address,
                token0: active.pair.token0_address,
                token1: active.pair.token1_address,
            }),
        }
    }

    /// One unit of per-pair work: cache lookup, adapter resolution,
    /// retry loop, cache write (§4.6 step 3).
    async fn collect_one(
        &self,
        active: &ActivePair,
        block_number: u64,
        tick_timestamp: DateTime<Utc>,
    ) -> Result<(PairReserve, PriceRecord), CollectError> {
        if self.cancel.is_cancelled() {
            return Err(CollectError::Cancelled);
        }

        let pair_address_key = active.pair.pair_address.to_string();

        if let Some(cached) = self.cache.get_price(&pair_address_key).await {
            if cached.is_fresh(tick_timestamp) {
                debug!(pair = %pair_address_key, "cache hit, reusing sample");
                let price = rust_decimal::Decimal::from_str(&cached.price)
                    .map_err(|e| CollectError::Decode(e.to_string()))?;
                let inverse_price = rust_decimal::Decimal::from_str(&cached.inverse_price)
                    .map_err(|e| CollectError::Decode(e.to_string()))?;
                return Ok((
                    PairReserve {
                        pair_id: active.pair.id,
                        reserve0: cached.reserve0.clone(),
                        reserve1: cached.reserve1.clone(),
                        block_number,
                        timestamp: tick_timestamp,
                    },
                    PriceRecord {
                        pair_id: active.pair.id,
                        price,
                        inverse_price,
                        reserve0: cached.reserve0,
                        reserve1: cached.reserve1,
                        block_number,
                        timestamp: tick_timestamp,
                        sqrt_price_x96: None,
                        tick: None,
                        liquidity: None,
                    },
                ));
            }
        }

        let adapter = self.adapters.for_protocol(&active.dex.protocol_tag)?;
        let descriptor = Self::pool_descriptor(active)?;

        let mut last_err = CollectError::NotFound("no attempts made".into());
        for attempt in 0..MAX_ATTEMPTS {
            match adapter
                .get_price(
                    self.chain.as_ref(),
                    active.pair.pair_address,
                    active.pair.token0_decimals,
                    active.pair.token1_decimals,
                )
                .await
            {
                Ok(quote) => {
                    self.cache
                        .set_price(
                            &pair_address_key,
                            &CachedPrice {
                                price: quote.price.to_string(),
                                inverse_price: quote.inverse_price.to_string(),
                                reserve0: quote.reserve0.to_string(),
                                reserve1: quote.reserve1.to_string(),
                                block_number,
                                sampled_at: tick_timestamp,
                            },
                            CACHE_WRITE_TTL_S,
                        )
                        .await;

                    let reserve = PairReserve {
                        pair_id: active.pair.id,
                        reserve0: quote.reserve0.to_string(),
                        reserve1: quote.reserve1.to_string(),
                        block_number,
                        timestamp: tick_timestamp,
                    };
                    let price = PriceRecord {
                        pair_id: active.pair.id,
                        price: quote.price,
                        inverse_price: quote.inverse_price,
                        reserve0: quote.reserve0.to_string(),
                        reserve1: quote.reserve1.to_string(),
                        block_number,
                        timestamp: tick_timestamp,
                        sqrt_price_x96: quote.sqrt_price_x96.map(|v| v.to_string()),
                        tick: quote.tick,
                        liquidity: quote.liquidity.map(|v| v.to_string()),
                    };
                    return Ok((reserve, price));
                }
                Err(e) if e.is_retryable() => {
                    last_err = e;
                    let delay_ms = 100u64.saturating_mul(1u64 << attempt);
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                        _ = self.cancel.cancelled() => return Err(CollectError::Cancelled),
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    /// Runs one full price-collection tick (§4.6 algorithm).
    pub async fn collect_prices(&self) -> anyhow::Result<TickStats> {
        if self.cancel.is_cancelled() {
            return Ok(TickStats::default());
        }

        let block_number = self.chain.block_number().await?;
        let tick_timestamp = Utc::now();

        let active_pairs = self.store.select_active_pairs().await?;
        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let stats = Arc::new(TickStatsAtomic::default());

        let mut tasks = tokio::task::JoinSet::new();
        for active in active_pairs {
            let semaphore = semaphore.clone();
            let stats = stats.clone();
            let this = self.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                if this.cancel.is_cancelled() {
                    return None;
                }
                let pair_address = active.pair.pair_address;
                match this.collect_one(&active, block_number, tick_timestamp).await {
                    Ok(pair_result) => {
                        stats.priced.fetch_add(1, Ordering::Relaxed);
                        Some(pair_result)
                    }
                    Err(CollectError::NoLiquidity) => {
                        stats.no_liquidity.fetch_add(1, Ordering::Relaxed);
                        debug!(pair = %pair_address, "no liquidity, skipping");
                        None
                    }
                    Err(CollectError::NotFound(msg)) => {
                        stats.not_found.fetch_add(1, Ordering::Relaxed);
                        warn!(pair = %pair_address, reason = msg, "pool not found");
                        None
                    }
                    Err(CollectError::UnsupportedProtocol(tag)) => {
                        stats.unsupported.fetch_add(1, Ordering::Relaxed);
                        warn!(pair = %pair_address, protocol = tag, "unsupported protocol, permanently skipped");
                        None
                    }
                    Err(CollectError::Decode(msg)) => {
                        stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                        warn!(pair = %pair_address, reason = msg, "decode error");
                        None
                    }
                    Err(CollectError::Cancelled) => None,
                    Err(e) => {
                        warn!(pair = %pair_address, error = %e, "price collection failed after retries");
                        None
                    }
                }
            });
        }

        let mut reserves = Vec::new();
        let mut prices = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok(Some((reserve, price))) = joined {
                reserves.push(reserve);
                prices.push(price);
            }
        }

        if self.cancel.is_cancelled() {
            debug!("cancelled before tick write, discarding in-flight batch");
            return Ok(TickStats::default());
        }
        self.store.insert_tick_batch(&reserves, &prices).await?;

        Ok(TickStats {
            priced: stats.priced.load(Ordering::Relaxed),
            no_liquidity: stats.no_liquidity.load(Ordering::Relaxed),
            not_found: stats.not_found.load(Ordering::Relaxed),
            decode_errors: stats.decode_errors.load(Ordering::Relaxed),
            unsupported: stats.unsupported.load(Ordering::Relaxed),
        })
    }

    pub async fn collect_gas(&self) -> anyhow::Result<()> {
        let row = crate::gas::sample_gas(self.chain.as_ref()).await?;
        self.store.insert_gas_price(&row).await?;
        Ok(())
    }

    pub async fn collect_v3_depths(&self) -> anyhow::Result<usize> {
        let active_pairs = self.store.select_active_pairs().await?;
        let block_number = self.chain.block_number().await?;
        let mut all_depths = Vec::new();

        for active in active_pairs {
            if !active.dex.capabilities.contains(&crate::types::Capability::V3Ticks) {
                continue;
            }
            let adapter = match self.adapters.for_protocol(&active.dex.protocol_tag) {
                Ok(a) => a,
                Err(_) => continue,
            };
            let quote = match adapter
                .get_price(
                    self.chain.as_ref(),
                    active.pair.pair_address,
                    active.pair.token0_decimals,
                    active.pair.token1_decimals,
                )
                .await
            {
                Ok(q) => q,
                Err(_) => continue,
            };
            let depths = crate::depth::sample_depths(
                active.pair.id,
                quote.reserve0,
                quote.reserve1,
                active.pair.token0_decimals,
                block_number,
            );
            all_depths.extend(depths);
        }

        let count = all_depths.len();
        if !all_depths.is_empty() {
            self.store.insert_depth_batch(&all_depths).await?;
        }
        Ok(count)
    }

    /// Retention cleanup (§4.6 `cleanup_old`, §8 invariant 8). Deletes
    /// from every time-series table, not just prices — reserves,
    /// depths, and gas history decay on the same clock.
    pub async fn cleanup_old(&self, retention_days: i64) -> anyhow::Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(retention_days);
        let mut total = 0u64;
        for table in [
            TimeSeriesTable::PairReserves,
            TimeSeriesTable::PriceRecords,
            TimeSeriesTable::LiquidityDepths,
            TimeSeriesTable::GasPriceHistory,
        ] {
            total += self.store.delete_older_than(table, cutoff, 5_000).await?;
        }
        Ok(total)
    }
}

#[derive(Default)]
struct TickStatsAtomic {
    priced: AtomicU64,
    no_liquidity: AtomicU64,
    not_found: AtomicU64,
    decode_errors: AtomicU64,
    unsupported: AtomicU64,
}
