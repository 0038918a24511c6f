//! Collaborator interfaces the tracking engine persists through, and their Postgres
//! implementation.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use sqlx::PgPool;
use tokendist_core::AppError;

use crate::{models::*, repos};

/// Where tracked contracts and banned collections are registered.
#[async_trait]
pub trait ContractRegistry: Send + Sync {
    /// Registered contracts whose address is not in `excluded`.
    async fn find_contracts_not_in(
        &self,
        excluded: &[Address],
    ) -> Result<Vec<TrackedContract>, AppError>;

    async fn find_banned(&self, address: Address) -> Result<Option<BannedCollection>, AppError>;
}

/// Output side of the pipeline: tokens and their first-sighting holdings.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn find_token(
        &self,
        contract: Address,
        token_id: U256,
    ) -> Result<Option<PersistedToken>, AppError>;

    async fn upsert_token(&self, token: &PersistedToken) -> Result<(), AppError>;

    /// Recording the same `(contract, token_id, holder)` twice is a no-op.
    async fn insert_holding(&self, holding: &HoldingRecord) -> Result<(), AppError>;
}

/// Per-contract scan progress.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load_checkpoint(&self, contract: Address) -> Result<Option<u64>, AppError>;

    async fn save_checkpoint(&self, contract: Address, block: u64) -> Result<(), AppError>;
}

fn persistence(e: sqlx::Error) -> AppError {
    AppError::Persistence(e.to_string())
}

/// All three collaborators over one Postgres pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ContractRegistry for PgStore {
    async fn find_contracts_not_in(
        &self,
        excluded: &[Address],
    ) -> Result<Vec<TrackedContract>, AppError> {
        let excluded: Vec<String> = excluded.iter().map(address_text).collect();
        repos::find_contracts_not_in(&self.pool, &excluded)
            .await
            .map_err(persistence)?
            .into_iter()
            .map(TrackedContract::try_from)
            .collect()
    }

    async fn find_banned(&self, address: Address) -> Result<Option<BannedCollection>, AppError> {
        repos::find_banned(&self.pool, &address_text(&address))
            .await
            .map_err(persistence)?
            .map(BannedCollection::try_from)
            .transpose()
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn find_token(
        &self,
        contract: Address,
        token_id: U256,
    ) -> Result<Option<PersistedToken>, AppError> {
        repos::get_token(&self.pool, &address_text(&contract), &token_id.to_string())
            .await
            .map_err(persistence)?
            .map(PersistedToken::try_from)
            .transpose()
    }

    async fn upsert_token(&self, token: &PersistedToken) -> Result<(), AppError> {
        repos::upsert_token(&self.pool, &TokenRow::from(token))
            .await
            .map_err(persistence)
    }

    async fn insert_holding(&self, holding: &HoldingRecord) -> Result<(), AppError> {
        repos::insert_holding(
            &self.pool,
            &address_text(&holding.contract_address),
            &holding.token_id.to_string(),
            &address_text(&holding.holder_address),
            &holding.balance.to_string(),
        )
        .await
        .map_err(persistence)
    }
}

#[async_trait]
impl CheckpointStore for PgStore {
    async fn load_checkpoint(&self, contract: Address) -> Result<Option<u64>, AppError> {
        let block = repos::get_checkpoint(&self.pool, &address_text(&contract))
            .await
            .map_err(persistence)?;
        Ok(block.map(|b| b.max(0) as u64))
    }

    async fn save_checkpoint(&self, contract: Address, block: u64) -> Result<(), AppError> {
        let block = i64::try_from(block)
            .map_err(|_| AppError::Persistence(format!("block {block} exceeds BIGINT")))?;
        repos::set_checkpoint(&self.pool, &address_text(&contract), block)
            .await
            .map_err(persistence)?;
        tracing::debug!(contract = %contract, block, "Checkpoint saved");
        Ok(())
    }
}
