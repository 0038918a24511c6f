use std::{collections::BTreeMap, fmt, str::FromStr};

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use tokendist_core::AppError;

// ─── Tracked Contract ───────────────────────────────────────────────────────

/// Token standard of a tracked contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerKind {
    /// ERC-1155 style fungible-per-id ledger.
    MultiToken,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultiToken => "erc1155",
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "erc1155" | "multitoken" => Ok(Self::MultiToken),
            other => Err(AppError::Persistence(format!("unknown ledger kind {other:?}"))),
        }
    }
}

/// A ledger contract known to the registry and tracked in memory by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedContract {
    pub address: Address,
    pub ledger_kind: LedgerKind,
}

/// A collection flagged in the banned-collection registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannedCollection {
    pub address: Address,
    pub reason: Option<String>,
}

// ─── Token ──────────────────────────────────────────────────────────────────

/// The stored view of one `(contract, token_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedToken {
    pub contract_address: Address,
    pub token_id: U256,
    pub token_uri: Option<String>,
    pub supply: Option<U256>,
    pub display_name: String,
    pub image_url: String,
    /// Last resolved balance per holder, zeros included.
    pub owners: BTreeMap<Address, U256>,
    pub created_at: Option<DateTime<Utc>>,
    pub is_appropriate: bool,
}

/// One holder's balance, written when a token is first created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingRecord {
    pub contract_address: Address,
    pub token_id: U256,
    pub holder_address: Address,
    pub balance: U256,
}

// ─── Rows ───────────────────────────────────────────────────────────────────
//
// Addresses are stored as lowercase `0x` hex, integers as decimal text.

#[derive(Debug, Clone, FromRow)]
pub struct ContractRow {
    pub address: String,
    pub ledger_kind: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct BannedRow {
    pub address: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TokenRow {
    pub contract_address: String,
    pub token_id: String,
    pub token_uri: Option<String>,
    pub supply: Option<String>,
    pub display_name: String,
    pub image_url: String,
    pub owners: Json<BTreeMap<String, String>>,
    pub created_at: Option<DateTime<Utc>>,
    pub is_appropriate: bool,
}

pub fn address_text(address: &Address) -> String {
    format!("{address:#x}")
}

pub(crate) fn parse_address(text: &str) -> Result<Address, AppError> {
    text.parse()
        .map_err(|e| AppError::Persistence(format!("bad address {text:?} in store: {e}")))
}

pub(crate) fn parse_u256(text: &str) -> Result<U256, AppError> {
    U256::from_str_radix(text, 10)
        .map_err(|e| AppError::Persistence(format!("bad integer {text:?} in store: {e}")))
}

impl TryFrom<ContractRow> for TrackedContract {
    type Error = AppError;

    fn try_from(row: ContractRow) -> Result<Self, Self::Error> {
        Ok(Self {
            address: parse_address(&row.address)?,
            ledger_kind: row.ledger_kind.parse()?,
        })
    }
}

impl TryFrom<BannedRow> for BannedCollection {
    type Error = AppError;

    fn try_from(row: BannedRow) -> Result<Self, Self::Error> {
        Ok(Self {
            address: parse_address(&row.address)?,
            reason: row.reason,
        })
    }
}

impl TryFrom<TokenRow> for PersistedToken {
    type Error = AppError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let owners = row
            .owners
            .0
            .iter()
            .map(|(holder, balance)| -> Result<(Address, U256), AppError> {
                Ok((parse_address(holder)?, parse_u256(balance)?))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Self {
            contract_address: parse_address(&row.contract_address)?,
            token_id: parse_u256(&row.token_id)?,
            token_uri: row.token_uri,
            supply: row.supply.as_deref().map(parse_u256).transpose()?,
            display_name: row.display_name,
            image_url: row.image_url,
            owners,
            created_at: row.created_at,
            is_appropriate: row.is_appropriate,
        })
    }
}

impl From<&PersistedToken> for TokenRow {
    fn from(token: &PersistedToken) -> Self {
        Self {
            contract_address: address_text(&token.contract_address),
            token_id: token.token_id.to_string(),
            token_uri: token.token_uri.clone(),
            supply: token.supply.map(|s| s.to_string()),
            display_name: token.display_name.clone(),
            image_url: token.image_url.clone(),
            owners: Json(
                token
                    .owners
                    .iter()
                    .map(|(holder, balance)| (address_text(holder), balance.to_string()))
                    .collect(),
            ),
            created_at: token.created_at,
            is_appropriate: token.is_appropriate,
        }
    }
}
