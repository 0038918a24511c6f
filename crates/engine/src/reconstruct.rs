//! Replays one contract's decoded window into per-token distributions.

use std::collections::{BTreeMap, BTreeSet};

use alloy::primitives::{Address, U256};
use futures::future::join_all;
use tokendist_chain::{DecodedWindow, LogSource, decoder::ZERO_ADDRESS};

/// Everything one pass learned about a single token id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDistribution {
    pub contract: Address,
    pub token_id: U256,
    pub minted_supply: Option<U256>,
    pub token_uri: Option<String>,
    pub mint_block: Option<u64>,
    /// Senders and receivers seen for this id. Never contains the zero address.
    pub candidate_holders: BTreeSet<Address>,
    /// Filled by the reconciler once balances are resolved.
    pub resolved_balances: BTreeMap<Address, U256>,
}

impl TokenDistribution {
    pub fn new(contract: Address, token_id: U256) -> Self {
        Self {
            contract,
            token_id,
            minted_supply: None,
            token_uri: None,
            mint_block: None,
            candidate_holders: BTreeSet::new(),
            resolved_balances: BTreeMap::new(),
        }
    }

    fn observe(&mut self, sender: Address, receiver: Address) {
        for party in [sender, receiver] {
            if party != ZERO_ADDRESS {
                self.candidate_holders.insert(party);
            }
        }
    }

    pub fn was_minted(&self) -> bool {
        self.mint_block.is_some()
    }
}

/// Distributions of one contract keyed by token id.
pub type Distributions = BTreeMap<U256, TokenDistribution>;

/// Build the distributions of `contract` from one decoded window.
///
/// All single transfers are replayed first, then all batch transfers. Only single-transfer
/// mints set supply, URI and mint block; batches only add holders.
pub fn reconstruct(contract: Address, window: &DecodedWindow) -> Distributions {
    let mut tokens = Distributions::new();

    for (index, entry) in window.singles.iter().enumerate() {
        let event = match entry {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(contract = %contract, index, error = %e, "Skipping undecodable TransferSingle");
                continue;
            }
        };

        for (token_id, amount) in event.pairs() {
            let token = tokens
                .entry(token_id)
                .or_insert_with(|| TokenDistribution::new(contract, token_id));

            if event.is_mint() {
                token.minted_supply = Some(amount);
                token.token_uri = window.uri_at(index).map(str::to_owned);
                token.mint_block = Some(event.block_number);
            }
            token.observe(event.sender, event.receiver);
        }
    }

    for (index, entry) in window.batches.iter().enumerate() {
        let event = match entry {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(contract = %contract, index, error = %e, "Skipping undecodable TransferBatch");
                continue;
            }
        };

        // Batch mints carry no supply bookkeeping.
        for (token_id, _amount) in event.pairs() {
            tokens
                .entry(token_id)
                .or_insert_with(|| TokenDistribution::new(contract, token_id))
                .observe(event.sender, event.receiver);
        }
    }

    let bad_uris = window.uris.iter().filter(|r| r.is_err()).count();
    if bad_uris > 0 {
        tracing::warn!(contract = %contract, count = bad_uris, "Undecodable URI events in window");
    }

    tokens
}

/// Ask the contract for the URI of every minted token whose URI event was missing or empty.
///
/// Lookups run concurrently; a failed one leaves that token's URI unset.
pub async fn fill_missing_uris<S>(source: &S, contract: Address, tokens: &mut Distributions)
where
    S: LogSource + ?Sized,
{
    let lookups = tokens
        .values_mut()
        .filter(|token| token.was_minted() && token.token_uri.is_none())
        .map(|token| async move {
            match source.uri(contract, token.token_id).await {
                Ok(uri) if !uri.is_empty() => token.token_uri = Some(uri),
                Ok(_) => {
                    tracing::debug!(contract = %contract, token_id = %token.token_id, "Contract returned an empty URI");
                }
                Err(e) => {
                    tracing::warn!(contract = %contract, token_id = %token.token_id, error = %e, "URI lookup failed");
                }
            }
        });

    join_all(lookups).await;
}
