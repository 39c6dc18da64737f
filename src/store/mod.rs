//! Store contract (§4.8, §9).
//!
//! The spec's `insert_batch(table, rows)` is expressed here as one
//! typed method per table rather than a single stringly-dispatched
//! entry point — Rust's type system makes the per-table shape
//! distinction free, so there is no dynamic-dispatch map to replace
//! the way Design Notes §9 replaces one for the adapter factory. The
//! atomicity contract is unchanged: each `insert_*_batch` call commits
//! in one transaction, or none of its rows land.

mod postgres;

pub use postgres::PostgresStore;

use crate::error::CollectError;
use crate::types::{Dex, GasPriceHistory, LiquidityDepth, PairReserve, PriceRecord, Token, TradingPair};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait Store: Send + Sync {
    /// Idempotent upsert, used by `--seed` and by startup reconciliation.
    async fn upsert_token(&self, token: &Token) -> Result<i64, CollectError>;
    async fn upsert_dex(&self, dex: &Dex) -> Result<i64, CollectError>;

    /// Loads pairs the collector should poll, joined with their DEX and
    /// token metadata.
    async fn select_active_pairs(&self) -> Result<Vec<ActivePair>, CollectError>;

    /// One atomic write per tick: all reserve rows and all price rows
    /// land together, or neither does (§4.6 step 5, §8 invariant 4).
    async fn insert_tick_batch(
        &self,
        reserves: &[PairReserve],
        prices: &[PriceRecord],
    ) -> Result<(), CollectError>;

    async fn insert_depth_batch(&self, depths: &[LiquidityDepth]) -> Result<(), CollectError>;

    async fn insert_gas_price(&self, row: &GasPriceHistory) -> Result<(), CollectError>;

    /// Deletes rows older than `cutoff` from the named time-series
    /// table, `batch_size` rows at a time, until none remain (§4.6
    /// `cleanup_old`, §8 invariant 8).
    async fn delete_older_than(
        &self,
        table: TimeSeriesTable,
        cutoff: DateTime<Utc>,
        batch_size: i64,
    ) -> Result<u64, CollectError>;

    /// Most recent price per active pair, for verification tooling (§4.8).
    async fn select_latest_price_per_pair(&self) -> Result<Vec<PriceRecord>, CollectError>;
}

/// A trading pair joined with the DEX it trades on — everything the
/// collector needs to pick an adapter and build a [`crate::types::PoolDescriptor`]
/// without a second round-trip to the store.
#[derive(Debug, Clone)]
pub struct ActivePair {
    pub pair: TradingPair,
    pub dex: Dex,
}

/// The time-series tables subject to retention cleanup (§3 lifecycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSeriesTable {
    PairReserves,
    PriceRecords,
    LiquidityDepths,
    GasPriceHistory,
}

impl TimeSeriesTable {
    pub fn table_name(self) -> &'static str {
        match self {
            TimeSeriesTable::PairReserves => "pair_reserves",
            TimeSeriesTable::PriceRecords => "price_records",
            TimeSeriesTable::LiquidityDepths => "liquidity_depths",
            TimeSeriesTable::GasPriceHistory => "gas_price_history",
        }
    }
}
