//! Pure decoding of raw ERC-1155 logs. No I/O happens here.

use alloy::{
    primitives::{Address, B256, U256},
    sol_types::SolEvent,
};
use tokendist_core::DecodeError;

use crate::{abi::ERC1155, source::RawLog};

/// Size of one ABI word in bytes.
const WORD: usize = 32;

/// Zero address constant for mint/burn detection.
pub const ZERO_ADDRESS: Address = Address::ZERO;

/// A decoded `TransferSingle` or `TransferBatch` event.
///
/// `token_ids[i]` and `amounts[i]` always describe the same transferred pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub token_ids: Vec<U256>,
    pub amounts: Vec<U256>,
    pub sender: Address,
    pub receiver: Address,
    pub block_number: u64,
}

impl TransferEvent {
    /// `(token_id, amount)` pairs by position.
    pub fn pairs(&self) -> impl Iterator<Item = (U256, U256)> + '_ {
        self.token_ids.iter().copied().zip(self.amounts.iter().copied())
    }

    /// A transfer out of the zero address creates supply.
    pub fn is_mint(&self) -> bool {
        self.sender == ZERO_ADDRESS
    }
}

/// A decoded `URI` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriEvent {
    pub token_id: U256,
    pub uri: String,
}

/// Every log of one contract fetch window, decoded per position.
///
/// Failed entries stay in place so that `uris[i]` keeps lining up with `singles[i]`.
#[derive(Debug, Default)]
pub struct DecodedWindow {
    pub singles: Vec<Result<TransferEvent, DecodeError>>,
    pub batches: Vec<Result<TransferEvent, DecodeError>>,
    pub uris: Vec<Result<UriEvent, DecodeError>>,
}

impl DecodedWindow {
    /// The URI event fetched at the same position as single transfer `index`, if it decoded
    /// to something non-empty.
    pub fn uri_at(&self, index: usize) -> Option<&str> {
        match self.uris.get(index) {
            Some(Ok(event)) if !event.uri.is_empty() => Some(event.uri.as_str()),
            _ => None,
        }
    }

    pub fn decode_failures(&self) -> usize {
        self.singles.iter().filter(|r| r.is_err()).count()
            + self.batches.iter().filter(|r| r.is_err()).count()
            + self.uris.iter().filter(|r| r.is_err()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.singles.is_empty() && self.batches.is_empty() && self.uris.is_empty()
    }
}

/// Decode the three log arrays fetched for one contract and block window.
pub fn decode_window(singles: &[RawLog], batches: &[RawLog], uris: &[RawLog]) -> DecodedWindow {
    DecodedWindow {
        singles: singles.iter().map(decode_transfer_single).collect(),
        batches: batches.iter().map(decode_transfer_batch).collect(),
        uris: uris.iter().map(decode_uri).collect(),
    }
}

/// The address held in the low 20 bytes of an indexed topic.
pub fn extract_address(topic: &B256) -> Address {
    Address::from_word(*topic)
}

/// Decode a `TransferSingle` log. Topics are `[sig, operator, from, to]`.
pub fn decode_transfer_single(log: &RawLog) -> Result<TransferEvent, DecodeError> {
    let (sender, receiver) = transfer_parties(log)?;
    let (token_id, amount) = decode_single_data(&log.data)?;

    Ok(TransferEvent {
        token_ids: vec![token_id],
        amounts: vec![amount],
        sender,
        receiver,
        block_number: log.block_number,
    })
}

/// Decode a `TransferBatch` log. Topics are `[sig, operator, from, to]`.
pub fn decode_transfer_batch(log: &RawLog) -> Result<TransferEvent, DecodeError> {
    let (sender, receiver) = transfer_parties(log)?;
    let (token_ids, amounts) = decode_batch_data(&log.data)?;

    Ok(TransferEvent {
        token_ids,
        amounts,
        sender,
        receiver,
        block_number: log.block_number,
    })
}

/// Decode a `URI` log. Topics are `[sig, id]`.
pub fn decode_uri(log: &RawLog) -> Result<UriEvent, DecodeError> {
    let topic = log.topics.get(1).ok_or(DecodeError::MissingTopic {
        expected: 2,
        found: log.topics.len(),
    })?;

    Ok(UriEvent {
        token_id: U256::from_be_bytes(topic.0),
        uri: decode_uri_data(&log.data)?,
    })
}

fn transfer_parties(log: &RawLog) -> Result<(Address, Address), DecodeError> {
    if log.topics.len() < 4 {
        return Err(DecodeError::MissingTopic {
            expected: 4,
            found: log.topics.len(),
        });
    }
    Ok((extract_address(&log.topics[2]), extract_address(&log.topics[3])))
}

/// `TransferSingle` data: exactly `id` then `value`.
pub fn decode_single_data(data: &[u8]) -> Result<(U256, U256), DecodeError> {
    if data.len() != 2 * WORD {
        return Err(DecodeError::MalformedLog(format!(
            "single transfer data must be {} bytes, got {}",
            2 * WORD,
            data.len()
        )));
    }
    ERC1155::TransferSingle::abi_decode_data(data).map_err(malformed)
}

/// `TransferBatch` data: the `ids` and `values` arrays, paired by position.
pub fn decode_batch_data(data: &[u8]) -> Result<(Vec<U256>, Vec<U256>), DecodeError> {
    let (ids, amounts) = ERC1155::TransferBatch::abi_decode_data(data).map_err(malformed)?;

    if ids.len() != amounts.len() {
        return Err(DecodeError::LengthMismatch {
            ids: ids.len(),
            amounts: amounts.len(),
        });
    }
    Ok((ids, amounts))
}

/// `URI` data: a single dynamic `string`. Only ASCII alphanumerics and `/ : . - _` survive.
pub fn decode_uri_data(data: &[u8]) -> Result<String, DecodeError> {
    let (uri,) = ERC1155::URI::abi_decode_data(data).map_err(malformed)?;

    Ok(uri
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '-' | '_'))
        .collect())
}

fn malformed(e: alloy::sol_types::Error) -> DecodeError {
    DecodeError::MalformedLog(e.to_string())
}
