//! Dependency injection (Design Notes §9): one `Services` record built
//! once in `main`, with no process-wide globals beyond it.

use crate::adapters::AdapterFactory;
use crate::cache::{Cache, NullCache, RedisCache};
use crate::chain::{AlloyChainClient, ChainClient};
use crate::collector::{Collector, DEFAULT_CONCURRENCY};
use crate::config::{AppConfig, DexConfig, TokenConfig};
use crate::store::{PostgresStore, Store};
use crate::types::{Capability, Dex, DexType, DexVersion, Token};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Services {
    pub chain: Arc<dyn ChainClient>,
    pub store: Arc<dyn Store>,
    pub cache: Arc<dyn Cache>,
    pub collector: Arc<Collector>,
    pub config: AppConfig,
}

impl Services {
    pub async fn build(config: AppConfig) -> Result<Self> {
        let chain: Arc<dyn ChainClient> = Arc::new(
            AlloyChainClient::connect(&config.blockchain.rpc_url, config.blockchain.timeout_s)
                .await
                .context("connecting to chain RPC")?,
        );

        let store: Arc<dyn Store> = Arc::new(
            PostgresStore::connect(
                &config.database.connection_url(),
                config.database.max_open_conns,
                config.database.max_idle_conns,
            )
            .await
            .context("connecting to database")?,
        );

        let cache: Arc<dyn Cache> = if config.redis.enabled {
            Arc::new(
                RedisCache::connect(
                    &config.redis.host,
                    config.redis.port,
                    config.redis.password.as_deref().unwrap_or(""),
                    config.redis.db,
                )
                .await,
            )
        } else {
            Arc::new(NullCache)
        };

        let adapters = Arc::new(AdapterFactory::default());
        let collector = Arc::new(Collector::new(
            chain.clone(),
            store.clone(),
            cache.clone(),
            adapters,
            DEFAULT_CONCURRENCY,
            CancellationToken::new(),
        ));

        Ok(Self {
            chain,
            store,
            cache,
            collector,
            config,
        })
    }

    /// Runs pending migrations (`--migrate`).
    pub async fn migrate(database_url: &str) -> Result<()> {
        let store = PostgresStore::connect(database_url, 5, 1).await?;
        store.migrate().await
    }

    /// Upserts tokens and DEXes from configuration (`--seed`).
    pub async fn seed(&self) -> Result<()> {
        for token_cfg in &self.config.tokens {
            let token = token_from_config(token_cfg, self.config.blockchain.chain_id)?;
            self.store.upsert_token(&token).await?;
        }
        for dex_cfg in &self.config.dexes {
            let dex = dex_from_config(dex_cfg)?;
            dex.validate().map_err(anyhow::Error::msg)?;
            self.store.upsert_dex(&dex).await?;
        }
        Ok(())
    }
}

fn token_from_config(cfg: &TokenConfig, default_chain_id: u64) -> Result<Token> {
    Ok(Token {
        id: 0,
        address: cfg.address.parse().context("parsing token address")?,
        symbol: cfg.symbol.clone(),
        name: cfg.symbol.clone(),
        decimals: cfg.decimals,
        chain_id: default_chain_id,
        is_active: true,
    })
}

fn dex_from_config(cfg: &DexConfig) -> Result<Dex> {
    let dex_type = match cfg.dex_type.as_str() {
        "amm" => DexType::Amm,
        "stableswap" => DexType::Stableswap,
        "aggregator" => DexType::Aggregator,
        "orderbook" => DexType::Orderbook,
        "hybrid" => DexType::Hybrid,
        other => anyhow::bail!("unknown dex_type '{other}' for dex '{}'", cfg.name),
    };
    let version = match cfg.version.as_deref() {
        Some("v2") => Some(DexVersion::V2),
        Some("v3") => Some(DexVersion::V3),
        Some(other) => anyhow::bail!("unknown dex version '{other}' for dex '{}'", cfg.name),
        None => None,
    };

    let mut capabilities = HashSet::new();
    if cfg.support_flash_loan {
        capabilities.insert(Capability::FlashLoan);
    }
    if cfg.support_multi_hop {
        capabilities.insert(Capability::MultiHop);
    }
    if cfg.support_v3_ticks {
        capabilities.insert(Capability::V3Ticks);
    }
    if cfg.dynamic_fee {
        capabilities.insert(Capability::DynamicFee);
    }

    Ok(Dex {
        id: 0,
        name: cfg.name.clone(),
        protocol_tag: cfg.protocol.clone(),
        dex_type,
        router_address: cfg.router.parse().context("parsing router address")?,
        factory_address: cfg.factory.parse().context("parsing factory address")?,
        quoter_address: cfg
            .quoter
            .as_ref()
            .map(|a| alloy::primitives::Address::from_str(a))
            .transpose()
            .context("parsing quoter address")?,
        fee_bps: cfg.fee_bps.max(0) as u32,
        fee_tier: cfg.fee_tier.map(|v| v.max(0) as u32),
        version,
        chain_id: cfg.chain_id,
        priority: cfg.priority,
        capabilities,
    })
}
