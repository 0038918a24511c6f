use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};
use futures::future::join_all;
use tokendist_chain::LogSource;

/// Live balances of one token's holders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedBalances {
    /// Every queried holder; failed queries read as zero.
    pub balances: BTreeMap<Address, U256>,
    /// Number of queries that failed.
    pub failed: usize,
}

impl ResolvedBalances {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Query the live balance of every holder concurrently.
///
/// A failed query is logged and counted as a zero balance; it never cancels the others.
pub async fn resolve_balances<S, I>(
    source: &S,
    contract: Address,
    token_id: U256,
    holders: I,
) -> ResolvedBalances
where
    S: LogSource + ?Sized,
    I: IntoIterator<Item = Address>,
{
    let queries = holders.into_iter().map(|holder| async move {
        match source.balance_of(contract, holder, token_id).await {
            Ok(balance) => (holder, Some(balance)),
            Err(e) => {
                tracing::warn!(
                    contract = %contract,
                    token_id = %token_id,
                    holder = %holder,
                    error = %e,
                    "Balance query failed, treating as zero"
                );
                (holder, None)
            }
        }
    });

    let mut resolved = ResolvedBalances::default();
    for (holder, balance) in join_all(queries).await {
        if balance.is_none() {
            resolved.failed += 1;
        }
        resolved.balances.insert(holder, balance.unwrap_or(U256::ZERO));
    }
    resolved
}
