use std::{fmt::Display, future::IntoFuture, time::Duration};

use alloy::{
    consensus::BlockHeader,
    eips::BlockNumberOrTag,
    primitives::{Address, B256, Bytes, U256},
    providers::Provider,
    rpc::types::{Filter, Log},
};
use async_trait::async_trait;
use dashmap::DashMap;
use tokendist_core::AppError;

use crate::{abi::ERC1155, provider::ChainProvider};

/// An undecoded log as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
}

impl RawLog {
    /// Convert an RPC log. Pending logs (no block number yet) are dropped.
    pub fn from_rpc(log: &Log) -> Option<Self> {
        Some(Self {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            block_number: log.block_number?,
        })
    }
}

/// Read-only access to the chain. Everything the engine learns about on-chain state goes
/// through this trait.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn current_height(&self) -> Result<u64, AppError>;

    /// Logs emitted by `contract` in `from..=to` whose first topic is `signature`, in chain order.
    async fn logs(
        &self,
        contract: Address,
        from: u64,
        to: u64,
        signature: B256,
    ) -> Result<Vec<RawLog>, AppError>;

    /// Unix timestamp (seconds) of `block`.
    async fn block_timestamp(&self, block: u64) -> Result<u64, AppError>;

    async fn balance_of(
        &self,
        contract: Address,
        holder: Address,
        token_id: U256,
    ) -> Result<U256, AppError>;

    async fn uri(&self, contract: Address, token_id: U256) -> Result<String, AppError>;
}

/// [`LogSource`] backed by a JSON-RPC node.
///
/// Contract handles are built once per address and cached for the process lifetime.
pub struct RpcLogSource {
    provider: ChainProvider,
    timeout: Duration,
    contracts: DashMap<Address, ERC1155::ERC1155Instance<ChainProvider>>,
}

impl RpcLogSource {
    pub fn new(provider: ChainProvider, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            contracts: DashMap::new(),
        }
    }

    fn contract(&self, address: Address) -> ERC1155::ERC1155Instance<ChainProvider> {
        self.contracts
            .entry(address)
            .or_insert_with(|| ERC1155::new(address, self.provider.clone()))
            .clone()
    }

    async fn timed<T, E, F>(&self, call: &str, fut: F) -> Result<T, AppError>
    where
        F: IntoFuture<Output = Result<T, E>>,
        E: Display,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(AppError::Rpc(format!("{call}: {e}"))),
            Err(_) => Err(AppError::Rpc(format!(
                "{call}: timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl LogSource for RpcLogSource {
    async fn current_height(&self) -> Result<u64, AppError> {
        self.timed("eth_blockNumber", self.provider.get_block_number())
            .await
    }

    async fn logs(
        &self,
        contract: Address,
        from: u64,
        to: u64,
        signature: B256,
    ) -> Result<Vec<RawLog>, AppError> {
        let filter = Filter::new()
            .address(contract)
            .event_signature(signature)
            .from_block(from)
            .to_block(to);

        let logs = self
            .timed("eth_getLogs", self.provider.get_logs(&filter))
            .await?;

        tracing::debug!(
            contract = %contract,
            from,
            to,
            count = logs.len(),
            "Fetched logs"
        );
        Ok(logs.iter().filter_map(RawLog::from_rpc).collect())
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64, AppError> {
        let block_response = self
            .timed(
                "eth_getBlockByNumber",
                self.provider
                    .get_block_by_number(BlockNumberOrTag::Number(block)),
            )
            .await?
            .ok_or_else(|| AppError::Rpc(format!("block {block} not found on chain")))?;
        Ok(block_response.header.timestamp())
    }

    async fn balance_of(
        &self,
        contract: Address,
        holder: Address,
        token_id: U256,
    ) -> Result<U256, AppError> {
        let instance = self.contract(contract);
        self.timed("balanceOf", instance.balanceOf(holder, token_id).call())
            .await
    }

    async fn uri(&self, contract: Address, token_id: U256) -> Result<String, AppError> {
        let instance = self.contract(contract);
        self.timed("uri", instance.uri(token_id).call()).await
    }
}
