//! Distribution tracking for ERC-1155 style ledgers: replay transfer logs into per-token
//! holder sets, confirm balances on-chain and reconcile them into the token store.

pub mod metadata;
pub mod pipeline;
pub mod reconcile;
pub mod reconstruct;
pub mod resolver;
pub mod scheduler;

pub use metadata::{HttpMetadataFetcher, MetadataFetcher, TokenMetadata};
pub use pipeline::{ContractPipeline, PassSummary};
pub use reconcile::{ReconcileReport, Reconciler};
pub use reconstruct::{Distributions, TokenDistribution, fill_missing_uris, reconstruct};
pub use resolver::{ResolvedBalances, resolve_balances};
pub use scheduler::{CycleSummary, Tracker, TrackerState};
