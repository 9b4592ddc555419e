//! Accumulator update decoder.

use super::{
    ACCUMULATOR_MAGIC, MAJOR_VERSION, MESSAGE_TYPE_PRICE_FEED, PRICE_MESSAGE_LEN,
    UPDATE_TYPE_PRICE,
};
use crate::{
    error::DecodeError,
    types::{AccumulatorUpdate, FeedId, PriceRecord},
};
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, DecodeError>;

/// Decode an accumulator update into its records, in wire order.
///
/// The record order is the index space used for later selection.
pub fn decode(buffer: &[u8]) -> Result<Vec<PriceRecord>> {
    decode_update(buffer).map(|update| update.records)
}

/// Decode an accumulator update, keeping the header fields.
///
/// # Errors
/// * `BadMagic` - buffer does not start with "PNAU"
/// * `UnsupportedType` - update type is not a price update
/// * `UnsupportedMessageType` - a message carries an unknown type tag
/// * `Truncated` - a declared length or count runs past the end of the buffer
///
/// A major version other than 1 is logged but parsing continues.
pub fn decode_update(buffer: &[u8]) -> Result<AccumulatorUpdate> {
    let mut reader = Reader::new(buffer);

    let magic = reader.read_u32()?;
    if magic != ACCUMULATOR_MAGIC {
        return Err(DecodeError::BadMagic(magic));
    }

    let major_version = reader.read_u16()?;
    let minor_version = reader.read_u16()?;
    if major_version != MAJOR_VERSION {
        warn!(
            "Accumulator major version {}.{} differs from supported {}, parsing anyway",
            major_version, minor_version, MAJOR_VERSION
        );
    }

    // Header extension slot, not interpreted
    let trailing_header_len = usize::from(reader.read_u16()?);
    reader.skip(trailing_header_len)?;

    let update_type = reader.read_u8()?;
    if update_type != UPDATE_TYPE_PRICE {
        return Err(DecodeError::UnsupportedType(update_type));
    }

    let declared_count = reader.read_u16()?;
    let capacity = usize::from(declared_count).min(reader.remaining() / PRICE_MESSAGE_LEN);
    let mut records = Vec::with_capacity(capacity);

    for _ in 0..declared_count {
        let message_len = usize::from(reader.read_u16()?);
        let message_offset = reader.offset();
        // Advancing by the declared length tolerates extra trailing fields
        let body = reader.take(message_len)?;
        records.push(decode_price_message(body, message_offset)?);
    }

    if reader.remaining() > 0 {
        debug!(
            "Ignoring {} trailing bytes after {} messages",
            reader.remaining(),
            declared_count
        );
    }

    debug!(
        "Decoded accumulator v{}.{} with {} records ({} bytes)",
        major_version,
        minor_version,
        records.len(),
        buffer.len()
    );

    Ok(AccumulatorUpdate {
        major_version,
        minor_version,
        update_type,
        declared_count,
        records,
    })
}

fn decode_price_message(body: &[u8], base_offset: usize) -> Result<PriceRecord> {
    let mut reader = Reader::at(body, base_offset);

    let message_type = reader.read_u8()?;
    if message_type != MESSAGE_TYPE_PRICE_FEED {
        return Err(DecodeError::UnsupportedMessageType(message_type));
    }
    // Fail on the whole message rather than on whichever field runs out first
    reader.ensure(PRICE_MESSAGE_LEN - 1)?;

    let feed_id = FeedId::new(reader.read_array()?);
    let price = reader.read_i64()?;
    let confidence = reader.read_u64()?;
    let exponent = reader.read_i32()?;
    let publish_time = reader.read_u64()?;
    let prev_publish_time = reader.read_u64()?;
    let ema_price = reader.read_i64()?;
    let ema_confidence = reader.read_u64()?;

    Ok(PriceRecord {
        feed_id,
        price,
        confidence,
        exponent,
        publish_time,
        prev_publish_time,
        ema_price,
        ema_confidence,
    })
}

/// Big-endian cursor over a byte slice
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
    /// Absolute position of `data[0]`, for error reporting
    base: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    fn at(data: &'a [u8], base: usize) -> Self {
        Self {
            data,
            offset: 0,
            base,
        }
    }

    fn offset(&self) -> usize {
        self.base + self.offset
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                offset: self.offset(),
                needed: n,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_be_bytes)
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_be_bytes)
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.read_array().map(i32::from_be_bytes)
    }

    fn read_u64(&mut self) -> Result<u64> {
        self.read_array().map(u64::from_be_bytes)
    }

    fn read_i64(&mut self) -> Result<i64> {
        self.read_array().map(i64::from_be_bytes)
    }
}
