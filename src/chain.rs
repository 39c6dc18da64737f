//! ChainClient (§4.1): a thin, typed wrapper over the RPC provider.
//!
//! Adapters never touch the provider directly — everything passes
//! through this trait so retry/timeout policy lives in one place and
//! the collector can be tested against a fake implementation.

use crate::error::CollectError;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use async_trait::async_trait;
use std::time::Duration;

/// A block header's fields relevant to gas sampling (§4.4).
#[derive(Debug, Clone, Copy)]
pub struct BlockHeader {
    pub number: u64,
    pub base_fee_per_gas: Option<u64>,
    pub timestamp: u64,
}

/// RPC surface the adapters and gas sampler depend on. Implementations
/// must be safe for concurrent use (§5).
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64, CollectError>;
    async fn latest_header(&self) -> Result<BlockHeader, CollectError>;
    async fn suggest_gas_price(&self) -> Result<u128, CollectError>;
    async fn suggest_priority_fee(&self) -> Result<u128, CollectError>;

    /// Raw `eth_call` against `contract`, ABI-encoded `calldata`.
    async fn call(&self, contract: Address, calldata: Vec<u8>) -> Result<Vec<u8>, CollectError>;
}

/// `alloy`-backed implementation, constructed once per process and
/// shared through `Services` (Design Notes §9 — no process-wide globals
/// beyond the single handle `main` owns).
pub struct AlloyChainClient {
    provider: Box<dyn Provider + Send + Sync>,
    call_timeout: Duration,
}

impl AlloyChainClient {
    pub async fn connect(rpc_url: &str, timeout_s: u64) -> anyhow::Result<Self> {
        let provider: Box<dyn Provider + Send + Sync> = if rpc_url.starts_with("ws") {
            Box::new(ProviderBuilder::new().connect_ws(WsConnect::new(rpc_url)).await?)
        } else {
            Box::new(ProviderBuilder::new().connect_http(rpc_url.parse()?))
        };
        Ok(Self {
            provider,
            call_timeout: Duration::from_secs(timeout_s),
        })
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, alloy::transports::RpcError<alloy::transports::TransportErrorKind>>>,
    ) -> Result<T, CollectError> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(CollectError::Transient(e.to_string())),
            Err(_) => Err(CollectError::Transient("rpc call timed out".into())),
        }
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn block_number(&self) -> Result<u64, CollectError> {
        self.with_timeout(self.provider.get_block_number()).await
    }

    async fn latest_header(&self) -> Result<BlockHeader, CollectError> {
        let block = self
            .with_timeout(std::future::IntoFuture::into_future(
                self.provider.get_block(alloy::eips::BlockId::latest()),
            ))
            .await?
            .ok_or_else(|| CollectError::NotFound("latest block".into()))?;
        Ok(BlockHeader {
            number: block.header.number,
            base_fee_per_gas: block.header.base_fee_per_gas.map(|v| v as u64),
            timestamp: block.header.timestamp,
        })
    }

    async fn suggest_gas_price(&self) -> Result<u128, CollectError> {
        self.with_timeout(self.provider.get_gas_price()).await
    }

    async fn suggest_priority_fee(&self) -> Result<u128, CollectError> {
        match self.with_timeout(self.provider.get_max_priority_fee_per_gas()).await {
            Ok(v) => Ok(v),
            Err(_) => Ok(0),
        }
    }

    async fn call(&self, contract: Address, calldata: Vec<u8>) -> Result<Vec<u8>, CollectError> {
        let tx = alloy::rpc::types::TransactionRequest::default()
            .to(contract)
            .input(calldata.into());
        let result = self
            .with_timeout(std::future::IntoFuture::into_future(self.provider.call(tx)))
            .await?;
        Ok(result.to_vec())
    }
}
