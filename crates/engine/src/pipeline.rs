use std::sync::Arc;

use alloy::{
    primitives::{Address, B256},
    sol_types::SolEvent,
};
use tokendist_chain::{ERC1155, LogSource, RawLog, decode_window};
use tokendist_core::AppError;
use tokendist_storage::{
    CheckpointStore,
    models::{LedgerKind, TrackedContract},
};

use crate::{
    reconcile::{ReconcileReport, Reconciler},
    reconstruct::{fill_missing_uris, reconstruct},
};

/// Outcome of one contract pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Block window scanned, `None` when already caught up.
    pub window: Option<(u64, u64)>,
    pub logs: usize,
    pub decode_failures: usize,
    pub tokens: usize,
    pub report: ReconcileReport,
    pub checkpoint_advanced: bool,
}

/// Fetch → decode → reconstruct → resolve → reconcile for one contract, scanning only the
/// blocks after its checkpoint.
pub struct ContractPipeline {
    source: Arc<dyn LogSource>,
    checkpoints: Arc<dyn CheckpointStore>,
    reconciler: Reconciler,
    start_block: u64,
    chunk_size: u64,
}

impl ContractPipeline {
    pub fn new(
        source: Arc<dyn LogSource>,
        checkpoints: Arc<dyn CheckpointStore>,
        reconciler: Reconciler,
        start_block: u64,
        chunk_size: u64,
    ) -> Self {
        Self {
            source,
            checkpoints,
            reconciler,
            start_block,
            chunk_size: chunk_size.max(1),
        }
    }

    pub async fn run(&self, contract: &TrackedContract) -> Result<PassSummary, AppError> {
        match contract.ledger_kind {
            LedgerKind::MultiToken => self.run_multi_token(contract.address).await,
        }
    }

    async fn run_multi_token(&self, contract: Address) -> Result<PassSummary, AppError> {
        let head = self.source.current_height().await?;
        let from = match self.checkpoints.load_checkpoint(contract).await? {
            Some(last) => last + 1,
            None => self.start_block,
        };

        if from > head {
            tracing::debug!(contract = %contract, head, "Contract is up to date");
            return Ok(PassSummary::default());
        }

        tracing::info!(contract = %contract, from, to = head, "Scanning contract");

        let singles = self
            .fetch(contract, from, head, ERC1155::TransferSingle::SIGNATURE_HASH)
            .await?;
        let batches = self
            .fetch(contract, from, head, ERC1155::TransferBatch::SIGNATURE_HASH)
            .await?;
        let uris = self
            .fetch(contract, from, head, ERC1155::URI::SIGNATURE_HASH)
            .await?;

        let window = decode_window(&singles, &batches, &uris);
        let mut tokens = reconstruct(contract, &window);
        fill_missing_uris(self.source.as_ref(), contract, &mut tokens).await;

        let report = self.reconciler.reconcile(contract, &mut tokens).await?;

        let checkpoint_advanced = report.is_clean();
        if checkpoint_advanced {
            self.checkpoints.save_checkpoint(contract, head).await?;
        } else {
            tracing::warn!(
                contract = %contract,
                failed = report.failed,
                degraded = report.degraded,
                "Pass was incomplete, window will be rescanned"
            );
        }

        let summary = PassSummary {
            window: Some((from, head)),
            logs: singles.len() + batches.len() + uris.len(),
            decode_failures: window.decode_failures(),
            tokens: tokens.len(),
            report,
            checkpoint_advanced,
        };

        tracing::info!(
            contract = %contract,
            logs = summary.logs,
            tokens = summary.tokens,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            degraded = report.degraded,
            "Contract pass complete"
        );
        Ok(summary)
    }

    /// All logs with `signature` in `from..=to`, requested `chunk_size` blocks at a time and
    /// returned in chain order.
    async fn fetch(
        &self,
        contract: Address,
        from: u64,
        to: u64,
        signature: B256,
    ) -> Result<Vec<RawLog>, AppError> {
        let mut logs = Vec::new();
        let mut start = from;

        while start <= to {
            let end = start.saturating_add(self.chunk_size - 1).min(to);
            logs.extend(self.source.logs(contract, start, end, signature).await?);
            match end.checked_add(1) {
                Some(next) => start = next,
                None => break,
            }
        }

        Ok(logs)
    }
}
