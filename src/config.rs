//! Configuration (§6): a structured TOML document loaded once at startup,
//! superseding the teacher's `.env`-based loader.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub blockchain: BlockchainConfig,
    #[serde(default)]
    pub dexes: Vec<DexConfig>,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    #[serde(default = "default_sslmode")]
    pub sslmode: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default = "default_max_idle")]
    pub max_idle_conns: u32,
    #[serde(default = "default_max_open")]
    pub max_open_conns: u32,
    #[serde(default = "default_conn_lifetime")]
    pub conn_max_lifetime_s: u64,
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.dbname, self.sslmode
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainConfig {
    pub rpc_url: String,
    #[serde(default)]
    pub rpc_urls: Vec<String>,
    pub chain_id: u64,
    #[serde(default = "default_rpc_timeout")]
    pub timeout_s: u64,
    #[serde(default = "default_retry")]
    pub retry: u32,
    #[serde(default)]
    pub use_pool: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexConfig {
    pub name: String,
    pub protocol: String,
    pub router: String,
    pub factory: String,
    #[serde(default)]
    pub quoter: Option<String>,
    pub fee_bps: i32,
    #[serde(default)]
    pub fee_tier: Option<i32>,
    pub dex_type: String,
    #[serde(default)]
    pub version: Option<String>,
    pub chain_id: u64,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub support_flash_loan: bool,
    #[serde(default)]
    pub support_multi_hop: bool,
    #[serde(default)]
    pub support_v3_ticks: bool,
    #[serde(default)]
    pub dynamic_fee: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_collect_interval")]
    pub collect_interval_s: u64,
    #[serde(default = "default_depth_interval")]
    pub depth_interval_s: u64,
    #[serde(default = "default_analyze_interval")]
    pub analyze_interval_s: u64,
    #[serde(default = "default_gas_interval")]
    pub gas_interval_s: u64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_h: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default)]
    pub min_profit_rate: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            collect_interval_s: default_collect_interval(),
            depth_interval_s: default_depth_interval(),
            analyze_interval_s: default_analyze_interval(),
            gas_interval_s: default_gas_interval(),
            cleanup_interval_h: default_cleanup_interval(),
            retention_days: default_retention_days(),
            min_profit_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RedisConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_redis_host")]
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: i64,
    #[serde(default = "default_redis_ttl")]
    pub ttl_s: u64,
}

fn default_pg_port() -> u16 {
    5432
}
fn default_sslmode() -> String {
    "prefer".to_string()
}
fn default_max_idle() -> u32 {
    5
}
fn default_max_open() -> u32 {
    20
}
fn default_conn_lifetime() -> u64 {
    1800
}
fn default_rpc_timeout() -> u64 {
    30
}
fn default_retry() -> u32 {
    3
}
fn default_collect_interval() -> u64 {
    30
}
fn default_depth_interval() -> u64 {
    60
}
fn default_analyze_interval() -> u64 {
    10
}
fn default_gas_interval() -> u64 {
    30
}
fn default_cleanup_interval() -> u64 {
    24
}
fn default_retention_days() -> i64 {
    7
}
fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}
fn default_redis_port() -> u16 {
    6379
}
fn default_redis_ttl() -> u64 {
    60
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config: AppConfig = toml::from_str(&raw)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_parses_with_defaults() {
        let raw = r#"
            [database]
            host = "localhost"
            user = "dexwatch"
            password = "secret"
            dbname = "dexwatch"

            [blockchain]
            rpc_url = "ws://localhost:8546"
            chain_id = 1
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.scheduler.collect_interval_s, 30);
        assert!(!config.redis.enabled);
        assert!(config.dexes.is_empty());
    }
}
