use thiserror::Error;

/// Structural failures while parsing an accumulator update buffer.
///
/// Any of these aborts the whole decode; no partial record list is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Bad magic: expected 0x504e4155, found {0:#010x}")]
    BadMagic(u32),

    #[error("Unsupported update type: {0}")]
    UnsupportedType(u8),

    #[error("Unsupported message type: {0}")]
    UnsupportedMessageType(u8),

    #[error("Truncated buffer at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("Invalid feed id length: expected 32 bytes, got {actual}")]
    InvalidFeedIdLength { actual: usize },

    #[error("Invalid hex payload: {0}")]
    InvalidHex(String),
}

/// Failures while re-encoding a selection of records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{missing} of {requested} selected indices not found among {available} records")]
    IndexNotFound {
        missing: usize,
        requested: usize,
        available: usize,
    },

    #[error("Too many messages for a single update: {0} (max 65535)")]
    TooManyMessages(usize),

    #[error("Round trip mismatch: missing {missing:?}, unexpected {unexpected:?}, errors {errors:?}")]
    RoundTripMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
        errors: Vec<String>,
    },
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("No price data available: {0}")]
    NoPriceData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Hermes error: {0}")]
    HermesError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    #[error("Encode error: {0}")]
    EncodeError(#[from] EncodeError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, OracleError>;
