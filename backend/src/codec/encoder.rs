//! Accumulator update encoder and ABI calldata derivation.

use super::{
    ACCUMULATOR_MAGIC, HEADER_LEN, MAJOR_VERSION, MESSAGE_TYPE_PRICE_FEED, MINOR_VERSION,
    PRICE_MESSAGE_LEN, UPDATE_TYPE_PRICE,
};
use crate::{error::EncodeError, types::PriceRecord};
use tracing::{debug, warn};

/// Selector of the single `bytes` price update entry point
pub const SINGLE_BYTES_SELECTOR: [u8; 4] = [0xa9, 0x85, 0x2b, 0xcc];

/// Selector of `updatePriceFeeds(bytes[])`
pub const BYTES_ARRAY_SELECTOR: [u8; 4] = [0xef, 0x9e, 0x5e, 0x28];

const WORD: usize = 32;

/// Output of [`reencode`]: the wire buffer plus the records it carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedUpdate {
    pub buffer: Vec<u8>,

    /// Resolved records, in selection order
    pub selected: Vec<PriceRecord>,
}

/// Select records by index and serialize them into a new accumulator update.
///
/// Selection order is preserved and duplicates are encoded as given.
/// Indices refer to positions in `records` as produced by a single decode.
///
/// # Errors
/// * `IndexNotFound` - any index is out of range; nothing is serialized
/// * `TooManyMessages` - more than 65535 records selected
pub fn reencode(
    records: &[PriceRecord],
    selected_indices: &[usize],
) -> Result<EncodedUpdate, EncodeError> {
    let selected: Vec<PriceRecord> = selected_indices
        .iter()
        .filter_map(|&index| records.get(index).copied())
        .collect();

    if selected.len() != selected_indices.len() {
        let missing = selected_indices.len() - selected.len();
        warn!(
            "{} of {} selected indices have no record (available: {})",
            missing,
            selected_indices.len(),
            records.len()
        );
        return Err(EncodeError::IndexNotFound {
            missing,
            requested: selected_indices.len(),
            available: records.len(),
        });
    }

    let buffer = encode_records(&selected)?;
    debug!(
        "Re-encoded {} of {} records into {} bytes",
        selected.len(),
        records.len(),
        buffer.len()
    );

    Ok(EncodedUpdate { buffer, selected })
}

/// Serialize records into an accumulator update buffer (version 1.0, no
/// header extension).
///
/// `prev_publish_time` is written as `publish_time`.
pub fn encode_records(records: &[PriceRecord]) -> Result<Vec<u8>, EncodeError> {
    let count =
        u16::try_from(records.len()).map_err(|_| EncodeError::TooManyMessages(records.len()))?;

    let mut buffer = Vec::with_capacity(HEADER_LEN + records.len() * (2 + PRICE_MESSAGE_LEN));
    buffer.extend_from_slice(&ACCUMULATOR_MAGIC.to_be_bytes());
    buffer.extend_from_slice(&MAJOR_VERSION.to_be_bytes());
    buffer.extend_from_slice(&MINOR_VERSION.to_be_bytes());
    buffer.extend_from_slice(&0u16.to_be_bytes());
    buffer.push(UPDATE_TYPE_PRICE);
    buffer.extend_from_slice(&count.to_be_bytes());

    for record in records {
        write_price_message(&mut buffer, record);
    }

    Ok(buffer)
}

fn write_price_message(buffer: &mut Vec<u8>, record: &PriceRecord) {
    buffer.extend_from_slice(&(PRICE_MESSAGE_LEN as u16).to_be_bytes());
    let start = buffer.len();

    buffer.push(MESSAGE_TYPE_PRICE_FEED);
    buffer.extend_from_slice(record.feed_id.as_bytes());
    buffer.extend_from_slice(&record.price.to_be_bytes());
    buffer.extend_from_slice(&record.confidence.to_be_bytes());
    buffer.extend_from_slice(&record.exponent.to_be_bytes());
    buffer.extend_from_slice(&record.publish_time.to_be_bytes());
    // TODO: carry the record's own prev_publish_time once consumers need it preserved
    buffer.extend_from_slice(&record.publish_time.to_be_bytes());
    buffer.extend_from_slice(&record.ema_price.to_be_bytes());
    buffer.extend_from_slice(&record.ema_confidence.to_be_bytes());

    debug_assert_eq!(buffer.len() - start, PRICE_MESSAGE_LEN);
}

/// ABI calldata for the single `bytes` entry point, as raw bytes.
///
/// ```text
/// selector (4) | offset = 0x20 (32) | length (32) | payload, zero-padded to 32
/// ```
pub fn calldata_bytes(buffer: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 2 * WORD + padded_len(buffer.len()));
    out.extend_from_slice(&SINGLE_BYTES_SELECTOR);
    out.extend_from_slice(&abi_word(WORD));
    out.extend_from_slice(&abi_word(buffer.len()));
    push_padded(&mut out, buffer);
    out
}

/// `0x`-prefixed ABI calldata for the single `bytes` entry point.
pub fn to_calldata(buffer: &[u8]) -> String {
    format!("0x{}", hex::encode(calldata_bytes(buffer)))
}

/// ABI calldata for `updatePriceFeeds(bytes[])`, as raw bytes.
///
/// Element offsets are relative to the word after the element count.
pub fn array_calldata_bytes<B: AsRef<[u8]>>(buffers: &[B]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&BYTES_ARRAY_SELECTOR);
    out.extend_from_slice(&abi_word(WORD));
    out.extend_from_slice(&abi_word(buffers.len()));

    let mut offset = buffers.len() * WORD;
    for buffer in buffers {
        out.extend_from_slice(&abi_word(offset));
        offset += WORD + padded_len(buffer.as_ref().len());
    }
    for buffer in buffers {
        let data = buffer.as_ref();
        out.extend_from_slice(&abi_word(data.len()));
        push_padded(&mut out, data);
    }
    out
}

/// `0x`-prefixed ABI calldata for `updatePriceFeeds(bytes[])`.
pub fn to_array_calldata<B: AsRef<[u8]>>(buffers: &[B]) -> String {
    format!("0x{}", hex::encode(array_calldata_bytes(buffers)))
}

fn abi_word(value: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

fn push_padded(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(data);
    out.resize(out.len() + padded_len(data.len()) - data.len(), 0);
}
