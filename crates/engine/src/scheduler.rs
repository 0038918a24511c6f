use std::{sync::Arc, time::Duration};

use alloy::primitives::Address;
use dashmap::DashMap;
use futures::future::join_all;
use tokendist_core::AppError;
use tokendist_storage::{ContractRegistry, models::TrackedContract};
use tokio::sync::watch;

use crate::pipeline::ContractPipeline;

/// Where the tracker is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Scanning,
    Reconstructing { contracts: usize },
}

/// Totals of one tracking cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub discovered: usize,
    pub contracts: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Owns the set of tracked contracts and re-runs every contract pipeline on a fixed interval.
pub struct Tracker {
    registry: Arc<dyn ContractRegistry>,
    pipeline: ContractPipeline,
    tracked: DashMap<Address, TrackedContract>,
    interval: Duration,
    state: watch::Sender<TrackerState>,
}

impl Tracker {
    pub fn new(
        registry: Arc<dyn ContractRegistry>,
        pipeline: ContractPipeline,
        interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(TrackerState::Idle);
        Self {
            registry,
            pipeline,
            tracked: DashMap::new(),
            interval,
            state,
        }
    }

    pub fn state(&self) -> TrackerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerState> {
        self.state.subscribe()
    }

    /// Tracked contracts, ordered by address.
    pub fn tracked(&self) -> Vec<TrackedContract> {
        let mut contracts: Vec<TrackedContract> =
            self.tracked.iter().map(|entry| entry.value().clone()).collect();
        contracts.sort_by_key(|c| c.address);
        contracts
    }

    /// Add registry contracts not tracked yet. Returns how many were added.
    pub async fn discover(&self) -> Result<usize, AppError> {
        let known: Vec<Address> = self.tracked.iter().map(|entry| *entry.key()).collect();
        let found = self.registry.find_contracts_not_in(&known).await?;

        let mut added = 0;
        for contract in found {
            let address = contract.address;
            let kind = contract.ledger_kind;
            if self.tracked.insert(address, contract).is_none() {
                tracing::info!(contract = %address, kind = %kind, "Tracking new contract");
                added += 1;
            }
        }
        Ok(added)
    }

    /// One full cycle: discover, then run every tracked contract concurrently.
    ///
    /// Failures are logged and counted; nothing here stops the next cycle.
    pub async fn run_cycle(&self) -> CycleSummary {
        self.state.send_replace(TrackerState::Scanning);
        let discovered = match self.discover().await {
            Ok(added) => added,
            Err(e) => {
                tracing::error!(error = %e, "Registry scan failed");
                0
            }
        };

        let contracts = self.tracked();
        self.state.send_replace(TrackerState::Reconstructing {
            contracts: contracts.len(),
        });

        let results = join_all(
            contracts
                .iter()
                .map(|contract| async move { (contract.address, self.pipeline.run(contract).await) }),
        )
        .await;

        let mut summary = CycleSummary {
            discovered,
            contracts: contracts.len(),
            ..Default::default()
        };
        for (address, result) in results {
            match result {
                Ok(_) => summary.succeeded += 1,
                Err(e) => {
                    tracing::error!(contract = %address, error = %e, "Contract pass failed, retrying next cycle");
                    summary.failed += 1;
                }
            }
        }

        self.state.send_replace(TrackerState::Idle);
        summary
    }

    /// Run cycles forever, sleeping `interval` between the end of one and the start of the next.
    pub async fn run_forever(&self) {
        loop {
            let summary = self.run_cycle().await;
            tracing::info!(
                discovered = summary.discovered,
                contracts = summary.contracts,
                succeeded = summary.succeeded,
                failed = summary.failed,
                next_in_secs = self.interval.as_secs(),
                "Tracking cycle complete"
            );
            tokio::time::sleep(self.interval).await;
        }
    }
}
