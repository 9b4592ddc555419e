use crate::error::DecodeError;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of a feed identifier in bytes
pub const FEED_ID_LEN: usize = 32;

/// 32-byte identifier of a single price stream (e.g. BTC/USD)
///
/// Rendered as `0x` followed by 64 lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FeedId([u8; FEED_ID_LEN]);

impl FeedId {
    pub const fn new(bytes: [u8; FEED_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a feed id from raw bytes, rejecting anything but exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        let array: [u8; FEED_ID_LEN] = bytes
            .try_into()
            .map_err(|_| DecodeError::InvalidFeedIdLength { actual: bytes.len() })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; FEED_ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedId({})", self.to_hex())
    }
}

impl FromStr for FeedId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        let bytes = hex::decode(digits).map_err(|e| DecodeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for FeedId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FeedId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Serde adapter that writes 64-bit integers as decimal strings so that
/// JSON consumers with double-precision numbers never narrow them.
/// Reading accepts either a string or a JSON integer.
mod wide_int {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr + TryFrom<i64> + TryFrom<u64>,
        <T as FromStr>::Err: Display,
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wide {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        match Wide::deserialize(deserializer)? {
            Wide::Text(text) => text.trim().parse().map_err(de::Error::custom),
            Wide::Signed(value) => <T as TryFrom<i64>>::try_from(value)
                .map_err(|_| de::Error::custom(format!("integer {} out of range", value))),
            Wide::Unsigned(value) => <T as TryFrom<u64>>::try_from(value)
                .map_err(|_| de::Error::custom(format!("integer {} out of range", value))),
        }
    }
}

/// One decoded price attestation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub feed_id: FeedId,

    /// Price mantissa
    #[serde(with = "wide_int")]
    pub price: i64,

    /// One-sided error bound on `price`, same scale
    #[serde(with = "wide_int")]
    pub confidence: u64,

    /// Power-of-ten scale: human price = price * 10^exponent
    pub exponent: i32,

    /// Seconds since epoch
    #[serde(with = "wide_int")]
    pub publish_time: u64,

    #[serde(with = "wide_int")]
    pub prev_publish_time: u64,

    #[serde(with = "wide_int")]
    pub ema_price: i64,

    #[serde(with = "wide_int")]
    pub ema_confidence: u64,
}

impl PriceRecord {
    /// Display price, `price * 10^exponent`. `None` if the scale does not fit a `Decimal`.
    pub fn human_price(&self) -> Option<Decimal> {
        scale_mantissa(i128::from(self.price), self.exponent)
    }

    pub fn human_confidence(&self) -> Option<Decimal> {
        scale_mantissa(i128::from(self.confidence), self.exponent)
    }

    pub fn human_ema_price(&self) -> Option<Decimal> {
        scale_mantissa(i128::from(self.ema_price), self.exponent)
    }
}

fn scale_mantissa(mantissa: i128, exponent: i32) -> Option<Decimal> {
    if exponent < 0 {
        // Example: expo=-2 means divide by 100
        Decimal::try_from_i128_with_scale(mantissa, exponent.unsigned_abs()).ok()
    } else {
        let mut value = Decimal::try_from_i128_with_scale(mantissa, 0).ok()?;
        for _ in 0..exponent {
            value = value.checked_mul(Decimal::TEN)?;
        }
        Some(value)
    }
}

/// A decoded accumulator update with its header fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatorUpdate {
    pub major_version: u16,
    pub minor_version: u16,
    pub update_type: u8,

    /// Message count as declared in the header
    pub declared_count: u16,

    /// Records in wire order
    pub records: Vec<PriceRecord>,
}

/// Per-feed metadata returned next to the binary payload by the fetch layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedMetadata {
    pub feed_id: FeedId,
    pub slot: Option<u64>,
    pub proof_available_time: Option<u64>,
    pub prev_publish_time: Option<u64>,
}

/// A record enriched for reporting: slot from the fetch metadata and a
/// human symbol from a [`SymbolResolver`](crate::symbols::SymbolResolver).
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedRecord {
    #[serde(flatten)]
    pub record: PriceRecord,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    pub human_price: Option<Decimal>,

    pub human_ema_price: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BTC_FEED: &str = "0xe62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43";

    fn btc_record() -> PriceRecord {
        PriceRecord {
            feed_id: BTC_FEED.parse().unwrap(),
            price: 6140993501000,
            confidence: 3287868567,
            exponent: -8,
            publish_time: 1714746101,
            prev_publish_time: 1714746101,
            ema_price: 6094004700000,
            ema_confidence: 3792887800,
        }
    }

    #[test]
    fn test_feed_id_parse_and_display() {
        let id: FeedId = BTC_FEED.parse().unwrap();
        assert_eq!(id.to_string(), BTC_FEED);
        assert_eq!(id.as_bytes()[0], 0xe6);
        assert_eq!(id.as_bytes()[31], 0x43);

        // Prefix is optional on input
        let bare: FeedId = BTC_FEED.trim_start_matches("0x").parse().unwrap();
        assert_eq!(bare, id);
    }

    #[test]
    fn test_feed_id_rejects_wrong_length() {
        let short = format!("0x{}", "ab".repeat(31));
        assert_eq!(
            short.parse::<FeedId>(),
            Err(DecodeError::InvalidFeedIdLength { actual: 31 })
        );
        assert_eq!(
            FeedId::from_slice(&[0u8; 33]),
            Err(DecodeError::InvalidFeedIdLength { actual: 33 })
        );
        assert!(matches!("0xzz".parse::<FeedId>(), Err(DecodeError::InvalidHex(_))));
    }

    #[test]
    fn test_human_price_conversion() {
        let record = btc_record();
        assert_eq!(record.human_price().unwrap().to_string(), "61409.93501000");
        assert_eq!(record.human_confidence().unwrap().to_string(), "32.87868567");

        // positive exponent multiplies
        let scaled = PriceRecord { price: 500, exponent: 2, ..record };
        assert_eq!(scaled.human_price().unwrap(), Decimal::from(50000));

        // zero exponent is the mantissa itself
        let plain = PriceRecord { price: 50000, exponent: 0, ..record };
        assert_eq!(plain.human_price().unwrap(), Decimal::from(50000));

        // scale beyond what Decimal can represent
        let huge = PriceRecord { exponent: 40, ..record };
        assert_eq!(huge.human_price(), None);
    }

    #[test]
    fn test_record_json_keeps_wide_integers_as_strings() {
        let record = PriceRecord { price: i64::MIN, confidence: u64::MAX, ..btc_record() };
        let json = serde_json::to_value(record).unwrap();

        assert_eq!(json["feed_id"], BTC_FEED);
        assert_eq!(json["price"], i64::MIN.to_string());
        assert_eq!(json["confidence"], u64::MAX.to_string());
        assert_eq!(json["exponent"], -8);

        let back: PriceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_record_json_accepts_plain_integers() {
        let json = serde_json::json!({
            "feed_id": BTC_FEED,
            "price": 6140993501000i64,
            "confidence": 3287868567u64,
            "exponent": -8,
            "publish_time": 1714746101u64,
            "prev_publish_time": "1714746101",
            "ema_price": 6094004700000i64,
            "ema_confidence": 3792887800u64,
        });
        let record: PriceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record, btc_record());

        let negative_conf = serde_json::json!({
            "feed_id": BTC_FEED,
            "price": 1,
            "confidence": -1,
            "exponent": 0,
            "publish_time": 1,
            "prev_publish_time": 1,
            "ema_price": 1,
            "ema_confidence": 1,
        });
        assert!(serde_json::from_value::<PriceRecord>(negative_conf).is_err());
    }
}
