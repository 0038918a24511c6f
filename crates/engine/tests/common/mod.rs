//! In-memory collaborators for driving the pipeline without a node or a database.

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use alloy::{
    primitives::{Address, B256, Bytes, U256, address},
    sol_types::SolEvent,
};
use async_trait::async_trait;
use tokendist_chain::{ERC1155, LogSource, RawLog};
use tokendist_core::AppError;
use tokendist_engine::{
    ContractPipeline, MetadataFetcher, Reconciler, TokenMetadata, Tracker,
};
use tokendist_storage::{
    CheckpointStore, ContractRegistry, TokenStore,
    models::{BannedCollection, HoldingRecord, LedgerKind, PersistedToken, TrackedContract},
};

pub const CONTRACT: Address = address!("00000000000000000000000000000000000000c1");
pub const ZERO: Address = Address::ZERO;
pub const OPERATOR: Address = address!("00000000000000000000000000000000000000ee");
pub const AA: Address = address!("00000000000000000000000000000000000000aa");
pub const BB: Address = address!("00000000000000000000000000000000000000bb");
pub const CC: Address = address!("00000000000000000000000000000000000000cc");
pub const DD: Address = address!("00000000000000000000000000000000000000dd");

pub fn id(value: u64) -> U256 {
    U256::from(value)
}

// ─── Log builders ───────────────────────────────────────────────────────────

fn word(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

fn transfer_topics(signature: B256, from: Address, to: Address) -> Vec<B256> {
    vec![signature, OPERATOR.into_word(), from.into_word(), to.into_word()]
}

pub fn single_log(block: u64, from: Address, to: Address, token_id: u64, amount: u64) -> RawLog {
    let mut data = word(id(token_id)).to_vec();
    data.extend(word(id(amount)));
    RawLog {
        address: CONTRACT,
        topics: transfer_topics(ERC1155::TransferSingle::SIGNATURE_HASH, from, to),
        data: Bytes::from(data),
        block_number: block,
    }
}

pub fn batch_log(block: u64, from: Address, to: Address, ids: &[u64], amounts: &[u64]) -> RawLog {
    let ids_offset = 64u64;
    let amounts_offset = ids_offset + 32 + 32 * ids.len() as u64;
    let mut data = Vec::new();
    data.extend(word(id(ids_offset)));
    data.extend(word(id(amounts_offset)));
    data.extend(word(id(ids.len() as u64)));
    ids.iter().for_each(|v| data.extend(word(id(*v))));
    data.extend(word(id(amounts.len() as u64)));
    amounts.iter().for_each(|v| data.extend(word(id(*v))));
    RawLog {
        address: CONTRACT,
        topics: transfer_topics(ERC1155::TransferBatch::SIGNATURE_HASH, from, to),
        data: Bytes::from(data),
        block_number: block,
    }
}

pub fn uri_log(block: u64, token_id: u64, uri: &str) -> RawLog {
    let mut data = word(id(32)).to_vec();
    data.extend(word(id(uri.len() as u64)));
    let mut bytes = uri.as_bytes().to_vec();
    bytes.resize(uri.len().div_ceil(32) * 32, 0);
    data.extend(bytes);
    RawLog {
        address: CONTRACT,
        topics: vec![ERC1155::URI::SIGNATURE_HASH, B256::from(word(id(token_id)))],
        data: Bytes::from(data),
        block_number: block,
    }
}

// ─── Chain ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockChain {
    pub height: Mutex<u64>,
    pub logs: Mutex<Vec<RawLog>>,
    pub balances: Mutex<HashMap<(U256, Address), U256>>,
    pub failing_holders: Mutex<BTreeSet<Address>>,
    pub uris: Mutex<HashMap<U256, String>>,
    pub timestamps: Mutex<HashMap<u64, u64>>,
    pub fail_logs: Mutex<bool>,
    pub log_calls: AtomicUsize,
    pub balance_calls: AtomicUsize,
}

impl MockChain {
    pub fn new(height: u64) -> Arc<Self> {
        let chain = Self::default();
        *chain.height.lock().unwrap() = height;
        Arc::new(chain)
    }

    pub fn push_log(&self, log: RawLog) {
        self.logs.lock().unwrap().push(log);
    }

    pub fn set_balance(&self, token_id: u64, holder: Address, balance: u64) {
        self.balances
            .lock()
            .unwrap()
            .insert((id(token_id), holder), id(balance));
    }

    pub fn set_height(&self, height: u64) {
        *self.height.lock().unwrap() = height;
    }

    pub fn fail_balance_for(&self, holder: Address) {
        self.failing_holders.lock().unwrap().insert(holder);
    }
}

#[async_trait]
impl LogSource for MockChain {
    async fn current_height(&self) -> Result<u64, AppError> {
        Ok(*self.height.lock().unwrap())
    }

    async fn logs(
        &self,
        contract: Address,
        from: u64,
        to: u64,
        signature: B256,
    ) -> Result<Vec<RawLog>, AppError> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_logs.lock().unwrap() {
            return Err(AppError::Rpc("eth_getLogs: connection refused".into()));
        }
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| {
                log.address == contract
                    && log.topics.first() == Some(&signature)
                    && (from..=to).contains(&log.block_number)
            })
            .cloned()
            .collect())
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64, AppError> {
        Ok(self
            .timestamps
            .lock()
            .unwrap()
            .get(&block)
            .copied()
            .unwrap_or(1_700_000_000 + block * 12))
    }

    async fn balance_of(
        &self,
        _contract: Address,
        holder: Address,
        token_id: U256,
    ) -> Result<U256, AppError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        // Yield so concurrent queries interleave.
        tokio::time::sleep(Duration::from_millis(1)).await;
        if self.failing_holders.lock().unwrap().contains(&holder) {
            return Err(AppError::Rpc("balanceOf: execution reverted".into()));
        }
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(token_id, holder))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn uri(&self, _contract: Address, token_id: U256) -> Result<String, AppError> {
        self.uris
            .lock()
            .unwrap()
            .get(&token_id)
            .cloned()
            .ok_or_else(|| AppError::Rpc("uri: execution reverted".into()))
    }
}

// ─── Store ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    pub contracts: Mutex<Vec<TrackedContract>>,
    pub banned: Mutex<Vec<BannedCollection>>,
    pub tokens: Mutex<BTreeMap<(Address, U256), PersistedToken>>,
    pub holdings: Mutex<BTreeMap<(Address, U256, Address), HoldingRecord>>,
    pub holding_inserts: AtomicUsize,
    pub checkpoints: Mutex<HashMap<Address, u64>>,
    /// Token ids whose upsert fails.
    pub failing_upserts: Mutex<BTreeSet<U256>>,
    pub fail_registry: Mutex<bool>,
    pub banned_lookups: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, address: Address) {
        self.contracts.lock().unwrap().push(TrackedContract {
            address,
            ledger_kind: LedgerKind::MultiToken,
        });
    }

    pub fn token(&self, token_id: u64) -> Option<PersistedToken> {
        self.tokens
            .lock()
            .unwrap()
            .get(&(CONTRACT, id(token_id)))
            .cloned()
    }

    pub fn holdings_of(&self, token_id: u64) -> Vec<HoldingRecord> {
        self.holdings
            .lock()
            .unwrap()
            .values()
            .filter(|h| h.contract_address == CONTRACT && h.token_id == id(token_id))
            .cloned()
            .collect()
    }

    pub fn checkpoint(&self, contract: Address) -> Option<u64> {
        self.checkpoints.lock().unwrap().get(&contract).copied()
    }
}

#[async_trait]
impl ContractRegistry for MemoryStore {
    async fn find_contracts_not_in(
        &self,
        excluded: &[Address],
    ) -> Result<Vec<TrackedContract>, AppError> {
        if *self.fail_registry.lock().unwrap() {
            return Err(AppError::Persistence("registry unavailable".into()));
        }
        Ok(self
            .contracts
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !excluded.contains(&c.address))
            .cloned()
            .collect())
    }

    async fn find_banned(&self, address: Address) -> Result<Option<BannedCollection>, AppError> {
        self.banned_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .banned
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.address == address)
            .cloned())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn find_token(
        &self,
        contract: Address,
        token_id: U256,
    ) -> Result<Option<PersistedToken>, AppError> {
        Ok(self.tokens.lock().unwrap().get(&(contract, token_id)).cloned())
    }

    async fn upsert_token(&self, token: &PersistedToken) -> Result<(), AppError> {
        if self.failing_upserts.lock().unwrap().contains(&token.token_id) {
            return Err(AppError::Persistence("duplicate key value".into()));
        }
        self.tokens
            .lock()
            .unwrap()
            .insert((token.contract_address, token.token_id), token.clone());
        Ok(())
    }

    async fn insert_holding(&self, holding: &HoldingRecord) -> Result<(), AppError> {
        self.holding_inserts.fetch_add(1, Ordering::SeqCst);
        self.holdings
            .lock()
            .unwrap()
            .entry((holding.contract_address, holding.token_id, holding.holder_address))
            .or_insert_with(|| holding.clone());
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load_checkpoint(&self, contract: Address) -> Result<Option<u64>, AppError> {
        Ok(self.checkpoint(contract))
    }

    async fn save_checkpoint(&self, contract: Address, block: u64) -> Result<(), AppError> {
        self.checkpoints.lock().unwrap().insert(contract, block);
        Ok(())
    }
}

// ─── Metadata ───────────────────────────────────────────────────────────────

/// Answers every fetch with the same result.
pub enum StaticMetadata {
    Found(TokenMetadata),
    HttpStatus(u16),
}

#[async_trait]
impl MetadataFetcher for StaticMetadata {
    async fn fetch(&self, uri: &str) -> Result<TokenMetadata, AppError> {
        match self {
            Self::Found(metadata) => Ok(metadata.clone()),
            Self::HttpStatus(status) => {
                Err(AppError::Metadata(format!("GET {uri}: HTTP {status}")))
            }
        }
    }
}

pub fn named(name: &str) -> Arc<StaticMetadata> {
    Arc::new(StaticMetadata::Found(TokenMetadata {
        name: Some(name.into()),
        image: Some(format!("https://img/{name}.png")),
    }))
}

// ─── Wiring ─────────────────────────────────────────────────────────────────

pub fn reconciler(
    chain: &Arc<MockChain>,
    store: &Arc<MemoryStore>,
    metadata: Arc<StaticMetadata>,
) -> Reconciler {
    Reconciler::new(chain.clone(), store.clone(), store.clone(), metadata)
}

pub fn pipeline(
    chain: &Arc<MockChain>,
    store: &Arc<MemoryStore>,
    metadata: Arc<StaticMetadata>,
    chunk_size: u64,
) -> ContractPipeline {
    ContractPipeline::new(
        chain.clone(),
        store.clone(),
        reconciler(chain, store, metadata),
        0,
        chunk_size,
    )
}

pub fn tracker(
    chain: &Arc<MockChain>,
    store: &Arc<MemoryStore>,
    metadata: Arc<StaticMetadata>,
) -> Tracker {
    Tracker::new(
        store.clone(),
        pipeline(chain, store, metadata, 1_000),
        Duration::from_secs(600),
    )
}

pub fn tracked(address: Address) -> TrackedContract {
    TrackedContract {
        address,
        ledger_kind: LedgerKind::MultiToken,
    }
}
