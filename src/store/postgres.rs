//! `sqlx`-backed `Store` implementation.
//!
//! Grounded on `cowprotocol-services`' `crates/database/src/auction_prices.rs`
//! (hand-written `FromRow` row mapper, explicit `sqlx::query`/`query_as`)
//! and `crates/autopilot/src/database.rs` (`Postgres(pub PgPool)` wrapper).
//! No ORM: every query here is hand-written SQL.

use super::{ActivePair, Store, TimeSeriesTable};
use crate::error::CollectError;
use crate::types::{
    Capability, Dex, DexType, DexVersion, GasPriceHistory, LiquidityDepth, PairReserve,
    PriceRecord, SwapDirection, Token, TradingPair,
};
use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::collections::HashSet;

/// Rows are written in chunks of this size per transaction (§4.6 step 5).
const BATCH_CHUNK: usize = 1_000;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, max_open: u32, max_idle: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_open)
            .min_connections(max_idle)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn parse_address(raw: &str) -> Result<Address, CollectError> {
        raw.parse().map_err(|e| CollectError::Decode(format!("bad address {raw}: {e}")))
    }
}

fn dex_type_to_str(t: DexType) -> &'static str {
    match t {
        DexType::Amm => "amm",
        DexType::Stableswap => "stableswap",
        DexType::Aggregator => "aggregator",
        DexType::Orderbook => "orderbook",
        DexType::Hybrid => "hybrid",
    }
}

fn dex_type_from_str(s: &str) -> DexType {
    match s {
        "stableswap" => DexType::Stableswap,
        "aggregator" => DexType::Aggregator,
        "orderbook" => DexType::Orderbook,
        "hybrid" => DexType::Hybrid,
        _ => DexType::Amm,
    }
}

fn version_to_str(v: Option<DexVersion>) -> Option<&'static str> {
    match v {
        Some(DexVersion::V2) => Some("v2"),
        Some(DexVersion::V3) => Some("v3"),
        None => None,
    }
}

fn version_from_str(s: Option<&str>) -> Option<DexVersion> {
    match s {
        Some("v2") => Some(DexVersion::V2),
        Some("v3") => Some(DexVersion::V3),
        _ => None,
    }
}

fn capability_to_str(c: Capability) -> &'static str {
    match c {
        Capability::FlashLoan => "flash_loan",
        Capability::MultiHop => "multi_hop",
        Capability::V3Ticks => "v3_ticks",
        Capability::DynamicFee => "dynamic_fee",
    }
}

fn capability_from_str(s: &str) -> Option<Capability> {
    match s {
        "flash_loan" => Some(Capability::FlashLoan),
        "multi_hop" => Some(Capability::MultiHop),
        "v3_ticks" => Some(Capability::V3Ticks),
        "dynamic_fee" => Some(Capability::DynamicFee),
        _ => None,
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn upsert_token(&self, token: &Token) -> Result<i64, CollectError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tokens (address, symbol, name, decimals, chain_id, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (chain_id, address) DO UPDATE SET
                symbol = EXCLUDED.symbol,
                name = EXCLUDED.name,
                decimals = EXCLUDED.decimals,
                is_active = EXCLUDED.is_active
            RETURNING id
            "#,
        )
        .bind(token.address.to_string())
        .bind(&token.symbol)
        .bind(&token.name)
        .bind(token.decimals as i16)
        .bind(token.chain_id as i64)
        .bind(token.is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn upsert_dex(&self, dex: &Dex) -> Result<i64, CollectError> {
        let capabilities: Vec<&'static str> = dex.capabilities.iter().copied().map(capability_to_str).collect();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO dexes (name, protocol_tag, dex_type, router_address, factory_address,
                quoter_address, fee_bps, fee_tier, version, chain_id, priority, capabilities)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (chain_id, name) DO UPDATE SET
                protocol_tag = EXCLUDED.protocol_tag,
                dex_type = EXCLUDED.dex_type,
                router_address = EXCLUDED.router_address,
                factory_address = EXCLUDED.factory_address,
                quoter_address = EXCLUDED.quoter_address,
                fee_bps = EXCLUDED.fee_bps,
                fee_tier = EXCLUDED.fee_tier,
                version = EXCLUDED.version,
                priority = EXCLUDED.priority,
                capabilities = EXCLUDED.capabilities
            RETURNING id
            "#,
        )
        .bind(&dex.name)
        .bind(&dex.protocol_tag)
        .bind(dex_type_to_str(dex.dex_type))
        .bind(dex.router_address.to_string())
        .bind(dex.factory_address.to_string())
        .bind(dex.quoter_address.map(|a| a.to_string()))
        .bind(dex.fee_bps as i32)
        .bind(dex.fee_tier.map(|f| f as i32))
        .bind(version_to_str(dex.version))
        .bind(dex.chain_id as i64)
        .bind(dex.priority)
        .bind(&capabilities)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn select_active_pairs(&self) -> Result<Vec<ActivePair>, CollectError> {
        let rows = sqlx::query(
            r#"
            SELECT
                tp.id, tp.dex_id, tp.token0_id, tp.token1_id, tp.token0_address, tp.token1_address,
                tp.token0_decimals, tp.token1_decimals, tp.pair_address, tp.fee_tier, tp.is_active,
                d.name AS dex_name, d.protocol_tag, d.dex_type, d.router_address, d.factory_address,
                d.quoter_address, d.fee_bps, d.fee_tier AS dex_fee_tier, d.version, d.chain_id,
                d.priority, d.capabilities
            FROM trading_pairs tp
            JOIN dexes d ON d.id = tp.dex_id
            WHERE tp.is_active
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            let token0_address: String = row.try_get("token0_address")?;
            let token1_address: String = row.try_get("token1_address")?;
            let pair_address: String = row.try_get("pair_address")?;
            let pair = TradingPair {
                id: row.try_get("id")?,
                dex_id: row.try_get("dex_id")?,
                token0_id: row.try_get("token0_id")?,
                token1_id: row.try_get("token1_id")?,
                token0_address: PostgresStore::parse_address(&token0_address)?,
                token1_address: PostgresStore::parse_address(&token1_address)?,
                token0_decimals: row.try_get::<i16, _>("token0_decimals")? as u8,
                token1_decimals: row.try_get::<i16, _>("token1_decimals")? as u8,
                pair_address: PostgresStore::parse_address(&pair_address)?,
                fee_tier: row.try_get::<Option<i32>, _>("fee_tier")?.map(|f| f as u32),
                is_active: row.try_get("is_active")?,
            };

            let router_address: String = row.try_get("router_address")?;
            let factory_address: String = row.try_get("factory_address")?;
            let quoter_address: Option<String> = row.try_get("quoter_address")?;
            let capabilities: Vec<String> = row.try_get("capabilities")?;
            let dex = Dex {
                id: row.try_get("dex_id")?,
                name: row.try_get("dex_name")?,
                protocol_tag: row.try_get("protocol_tag")?,
                dex_type: dex_type_from_str(row.try_get::<String, _>("dex_type")?.as_str()),
                router_address: PostgresStore::parse_address(&router_address)?,
                factory_address: PostgresStore::parse_address(&factory_address)?,
                quoter_address: quoter_address.map(|a| PostgresStore::parse_address(&a)).transpose()?,
                fee_bps: row.try_get::<i32, _>("fee_bps")? as u32,
                fee_tier: row.try_get::<Option<i32>, _>("dex_fee_tier")?.map(|f| f as u32),
                version: version_from_str(row.try_get::<Option<String>, _>("version")?.as_deref()),
                chain_id: row.try_get::<i64, _>("chain_id")? as u64,
                priority: row.try_get("priority")?,
                capabilities: capabilities.iter().filter_map(|c| capability_from_str(c)).collect::<HashSet<_>>(),
            };

            pairs.push(ActivePair { pair, dex });
        }
        Ok(pairs)
    }

    async fn insert_tick_batch(
        &self,
        reserves: &[PairReserve],
        prices: &[PriceRecord],
    ) -> Result<(), CollectError> {
        let mut tx = self.pool.begin().await?;

        for chunk in reserves.chunks(BATCH_CHUNK) {
            for r in chunk {
                sqlx::query(
                    "INSERT INTO pair_reserves (pair_id, reserve0, reserve1, block_number, timestamp) VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(r.pair_id)
                .bind(&r.reserve0)
                .bind(&r.reserve1)
                .bind(r.block_number as i64)
                .bind(r.timestamp)
                .execute(&mut *tx)
                .await?;
            }
        }

        for chunk in prices.chunks(BATCH_CHUNK) {
            for p in chunk {
                sqlx::query(
                    r#"
                    INSERT INTO price_records
                        (pair_id, price, inverse_price, reserve0, reserve1, block_number, timestamp,
                         sqrt_price_x96, tick, liquidity)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                    "#,
                )
                .bind(p.pair_id)
                .bind(p.price)
                .bind(p.inverse_price)
                .bind(&p.reserve0)
                .bind(&p.reserve1)
                .bind(p.block_number as i64)
                .bind(p.timestamp)
                .bind(&p.sqrt_price_x96)
                .bind(p.tick)
                .bind(&p.liquidity)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_depth_batch(&self, depths: &[LiquidityDepth]) -> Result<(), CollectError> {
        let mut tx = self.pool.begin().await?;
        for chunk in depths.chunks(BATCH_CHUNK) {
            for d in chunk {
                let direction = match d.direction {
                    SwapDirection::Token0ToToken1 => "token0_to_token1",
                    SwapDirection::Token1ToToken0 => "token1_to_token0",
                };
                sqlx::query(
                    r#"
                    INSERT INTO liquidity_depths
                        (pair_id, direction, amount_in, amount_out, price_impact_bps, block_number, timestamp)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(d.pair_id)
                .bind(direction)
                .bind(&d.amount_in)
                .bind(&d.amount_out)
                .bind(d.price_impact_bps)
                .bind(d.block_number as i64)
                .bind(d.timestamp)
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_gas_price(&self, row: &GasPriceHistory) -> Result<(), CollectError> {
        sqlx::query(
            r#"
            INSERT INTO gas_price_history
                (gas_price, base_fee, priority_fee, max_fee, fast_price, standard_price, slow_price,
                 pending_tx_count, network_load, block_number, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&row.gas_price)
        .bind(&row.base_fee)
        .bind(&row.priority_fee)
        .bind(&row.max_fee)
        .bind(&row.fast_price)
        .bind(&row.standard_price)
        .bind(&row.slow_price)
        .bind(row.pending_tx_count.map(|v| v as i64))
        .bind(row.network_load.to_string())
        .bind(row.block_number as i64)
        .bind(row.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_older_than(
        &self,
        table: TimeSeriesTable,
        cutoff: DateTime<Utc>,
        batch_size: i64,
    ) -> Result<u64, CollectError> {
        let sql = format!(
            "DELETE FROM {} WHERE ctid IN (SELECT ctid FROM {} WHERE timestamp < $1 LIMIT $2)",
            table.table_name(),
            table.table_name()
        );
        let mut total = 0u64;
        loop {
            let result = sqlx::query(&sql)
                .bind(cutoff)
                .bind(batch_size)
                .execute(&self.pool)
                .await?;
            let affected = result.rows_affected();
            total += affected;
            if affected < batch_size as u64 {
                break;
            }
        }
        Ok(total)
    }

    async fn select_latest_price_per_pair(&self) -> Result<Vec<PriceRecord>, CollectError> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (pair_id)
                pair_id, price, inverse_price, reserve0, reserve1, block_number, timestamp,
                sqrt_price_x96, tick, liquidity
            FROM price_records
            ORDER BY pair_id, timestamp DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(PriceRecord {
                pair_id: row.try_get("pair_id")?,
                price: row.try_get::<Decimal, _>("price")?,
                inverse_price: row.try_get::<Decimal, _>("inverse_price")?,
                reserve0: row.try_get("reserve0")?,
                reserve1: row.try_get("reserve1")?,
                block_number: row.try_get::<i64, _>("block_number")? as u64,
                timestamp: row.try_get("timestamp")?,
                sqrt_price_x96: row.try_get("sqrt_price_x96")?,
                tick: row.try_get("tick")?,
                liquidity: row.try_get("liquidity")?,
            });
        }
        Ok(out)
    }
}
