//! Accumulator Update Codec
//!
//! Byte-exact parser and serializer for the price accumulator wire format,
//! plus ABI calldata derivation, validation and gas estimation.
//!
//! # Wire layout (big-endian)
//! ```text
//! magic "PNAU" (4) | major (2) | minor (2) | T (2) | <T bytes skipped>
//! update type (1) | message count N (2) | N x message
//!
//! message: L (2) | type (1) | feed id (32) | price (8) | conf (8) | expo (4)
//!          | publish_time (8) | prev_publish_time (8) | ema_price (8) | ema_conf (8)
//! ```
//!
//! Everything here is synchronous and pure: bytes in, values out.

pub mod decoder;
pub mod encoder;
pub mod estimate;
pub mod validator;

pub use decoder::{decode, decode_update};
pub use encoder::{
    calldata_bytes, encode_records, reencode, to_array_calldata, to_calldata, EncodedUpdate,
};
pub use estimate::{estimate_gas, recommended_gas_limit, EntryPoint, ReencodeSummary};
pub use validator::{validate_records, validate_round_trip, ShapeReport, ValidationResult};

use crate::error::DecodeError;

/// "PNAU"
pub const ACCUMULATOR_MAGIC: u32 = 0x504E_4155;

pub const MAJOR_VERSION: u16 = 1;
pub const MINOR_VERSION: u16 = 0;

/// Update type tag for price updates, the only one supported
pub const UPDATE_TYPE_PRICE: u8 = 0;

/// Message type tag for price feed messages
pub const MESSAGE_TYPE_PRICE_FEED: u8 = 0;

/// Bytes following the length field of a price feed message
pub const PRICE_MESSAGE_LEN: usize = 1 + 32 + 8 + 8 + 4 + 8 + 8 + 8 + 8;

/// Header size when no extension bytes are present
pub const HEADER_LEN: usize = 4 + 2 + 2 + 2 + 1 + 2;

/// Convert a hex transport string (with or without `0x`) into raw bytes.
pub fn bytes_from_hex(text: &str) -> Result<Vec<u8>, DecodeError> {
    let text = text.trim();
    let digits = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(digits).map_err(|e| DecodeError::InvalidHex(e.to_string()))
}
