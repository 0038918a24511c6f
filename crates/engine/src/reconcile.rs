//! Create-or-update of persisted tokens from reconstructed distributions.

use std::{collections::BTreeSet, sync::Arc};

use alloy::primitives::{Address, U256};
use chrono::DateTime;
use dashmap::DashMap;
use tokendist_chain::LogSource;
use tokendist_core::AppError;
use tokendist_storage::{
    ContractRegistry, TokenStore,
    models::{HoldingRecord, PersistedToken},
};

use crate::{
    metadata::{MetadataFetcher, TokenMetadata},
    reconstruct::{Distributions, TokenDistribution},
    resolver::resolve_balances,
};

/// What happened to the token ids of one contract pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    /// New tokens with no positive holder yet.
    pub skipped: usize,
    pub failed: usize,
    /// Token ids with at least one failed balance query.
    pub degraded: usize,
}

impl ReconcileReport {
    /// No store failure and every balance was read from the chain.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.degraded == 0
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
    Skipped,
    Failed,
}

pub struct Reconciler {
    source: Arc<dyn LogSource>,
    registry: Arc<dyn ContractRegistry>,
    store: Arc<dyn TokenStore>,
    metadata: Arc<dyn MetadataFetcher>,
    /// contract → appropriate, filled on first lookup.
    banned: DashMap<Address, bool>,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn LogSource>,
        registry: Arc<dyn ContractRegistry>,
        store: Arc<dyn TokenStore>,
        metadata: Arc<dyn MetadataFetcher>,
    ) -> Self {
        Self {
            source,
            registry,
            store,
            metadata,
            banned: DashMap::new(),
        }
    }

    /// Merge every distribution of `contract` into the store, in token id order.
    ///
    /// Store failures and failed balance queries are counted in the report and never stop
    /// the remaining ids. The only error returned is a failed block lookup, which aborts the
    /// contract's pass.
    pub async fn reconcile(
        &self,
        contract: Address,
        distributions: &mut Distributions,
    ) -> Result<ReconcileReport, AppError> {
        let mut report = ReconcileReport::default();

        for (token_id, distribution) in distributions.iter_mut() {
            let existing = match self.store.find_token(contract, *token_id).await {
                Ok(existing) => existing,
                Err(e) => {
                    tracing::error!(contract = %contract, token_id = %token_id, error = %e, "Token lookup failed");
                    report.record(Outcome::Failed);
                    continue;
                }
            };

            let (outcome, failed_queries) = match existing {
                Some(token) => self.merge(token, distribution).await,
                None => self.create(distribution).await?,
            };
            report.record(outcome);
            if failed_queries > 0 {
                report.degraded += 1;
            }
        }

        Ok(report)
    }

    /// Returns the outcome and the number of failed balance queries.
    async fn merge(
        &self,
        mut token: PersistedToken,
        distribution: &mut TokenDistribution,
    ) -> (Outcome, usize) {
        // Previously known owners are re-resolved even when this window never mentions them.
        let targets: BTreeSet<Address> = distribution
            .candidate_holders
            .iter()
            .chain(token.owners.keys())
            .copied()
            .collect();

        let resolved = resolve_balances(
            self.source.as_ref(),
            distribution.contract,
            distribution.token_id,
            targets,
        )
        .await;
        distribution.resolved_balances = resolved.balances;

        if let Some(uri) = &distribution.token_uri {
            token.token_uri = Some(uri.clone());
        }
        if let Some(supply) = distribution.minted_supply {
            token.supply = Some(supply);
        }
        token.owners = distribution.resolved_balances.clone();

        let outcome = match self.store.upsert_token(&token).await {
            Ok(()) => {
                tracing::debug!(
                    contract = %token.contract_address,
                    token_id = %token.token_id,
                    owners = token.owners.len(),
                    "Token updated"
                );
                Outcome::Updated
            }
            Err(e) => {
                tracing::error!(contract = %token.contract_address, token_id = %token.token_id, error = %e, "Token update failed");
                Outcome::Failed
            }
        };
        (outcome, resolved.failed)
    }

    /// Returns the outcome and the number of failed balance queries.
    async fn create(
        &self,
        distribution: &mut TokenDistribution,
    ) -> Result<(Outcome, usize), AppError> {
        let contract = distribution.contract;
        let token_id = distribution.token_id;

        let resolved = resolve_balances(
            self.source.as_ref(),
            contract,
            token_id,
            distribution.candidate_holders.iter().copied(),
        )
        .await;
        let failed_queries = resolved.failed;
        distribution.resolved_balances = resolved.balances;

        let holdings: Vec<HoldingRecord> = distribution
            .resolved_balances
            .iter()
            .filter(|(_, balance)| **balance > U256::ZERO)
            .map(|(holder, balance)| HoldingRecord {
                contract_address: contract,
                token_id,
                holder_address: *holder,
                balance: *balance,
            })
            .collect();

        if holdings.is_empty() {
            tracing::debug!(contract = %contract, token_id = %token_id, "No positive holder yet, not creating token");
            return Ok((Outcome::Skipped, failed_queries));
        }

        let created_at = match distribution.mint_block {
            Some(block) => {
                let timestamp = self.source.block_timestamp(block).await?;
                i64::try_from(timestamp)
                    .ok()
                    .and_then(|secs| DateTime::from_timestamp(secs, 0))
            }
            None => None,
        };

        let is_appropriate = self.is_appropriate(contract).await;
        let metadata = self.fetch_metadata(distribution).await;

        // A token whose holdings did not all land stays absent, so the retry takes this path again.
        for holding in &holdings {
            if let Err(e) = self.store.insert_holding(holding).await {
                tracing::error!(
                    contract = %contract,
                    token_id = %token_id,
                    holder = %holding.holder_address,
                    error = %e,
                    "Holding insert failed"
                );
                return Ok((Outcome::Failed, failed_queries));
            }
        }

        let token = PersistedToken {
            contract_address: contract,
            token_id,
            token_uri: distribution.token_uri.clone(),
            supply: distribution.minted_supply,
            display_name: metadata.name.unwrap_or_default(),
            image_url: metadata.image.unwrap_or_default(),
            owners: distribution.resolved_balances.clone(),
            created_at,
            is_appropriate,
        };

        match self.store.upsert_token(&token).await {
            Ok(()) => {
                tracing::info!(
                    contract = %contract,
                    token_id = %token_id,
                    holders = holdings.len(),
                    name = %token.display_name,
                    "Token created"
                );
                Ok((Outcome::Created, failed_queries))
            }
            Err(e) => {
                tracing::error!(contract = %contract, token_id = %token_id, error = %e, "Token insert failed");
                Ok((Outcome::Failed, failed_queries))
            }
        }
    }

    /// Tokens of a banned collection are flagged as not appropriate. Lookups are cached per
    /// contract; a failed lookup is not cached and defaults to appropriate.
    async fn is_appropriate(&self, contract: Address) -> bool {
        if let Some(cached) = self.banned.get(&contract) {
            return *cached;
        }

        match self.registry.find_banned(contract).await {
            Ok(banned) => {
                let appropriate = banned.is_none();
                if let Some(entry) = banned {
                    tracing::info!(contract = %contract, reason = ?entry.reason, "Collection is banned");
                }
                self.banned.insert(contract, appropriate);
                appropriate
            }
            Err(e) => {
                tracing::warn!(contract = %contract, error = %e, "Banned-collection lookup failed");
                true
            }
        }
    }

    async fn fetch_metadata(&self, distribution: &TokenDistribution) -> TokenMetadata {
        let Some(uri) = distribution.token_uri.as_deref() else {
            return TokenMetadata::default();
        };

        match self.metadata.fetch(uri).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(
                    contract = %distribution.contract,
                    token_id = %distribution.token_id,
                    uri,
                    error = %e,
                    "Metadata fetch failed"
                );
                TokenMetadata::default()
            }
        }
    }
}
