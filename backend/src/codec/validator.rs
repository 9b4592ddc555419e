//! Record shape checks and the encoder's round-trip validator.

use super::{decoder::decode_update, MAJOR_VERSION, MINOR_VERSION};
use crate::{
    error::EncodeError,
    types::{FeedId, PriceRecord},
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Result of [`validate_records`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShapeReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ShapeReport {
    /// Shape-check in-memory records through their JSON form.
    pub fn for_records(records: &[PriceRecord]) -> Self {
        let values: Result<Vec<Value>, _> = records.iter().map(serde_json::to_value).collect();
        match values {
            Ok(values) => validate_records(&values),
            Err(e) => ShapeReport {
                valid: false,
                errors: vec![format!("records could not be serialized: {}", e)],
            },
        }
    }
}

/// Shape check on records in their JSON form.
///
/// For each record: `feed_id` is `0x` + 64 hex digits, `price` and
/// `confidence` are wide integers (digit strings or JSON integers, never
/// floats), `exponent` and `publish_time` are present. Price sign and
/// freshness are not checked.
pub fn validate_records(records: &[Value]) -> ShapeReport {
    let mut errors = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match record.get("feed_id") {
            Some(Value::String(id)) if is_feed_id_hex(id) => {}
            Some(other) => errors.push(format!(
                "record {}: feed_id {} is not 0x followed by 64 hex digits",
                index, other
            )),
            None => errors.push(format!("record {}: missing feed_id", index)),
        }

        for field in ["price", "confidence"] {
            match record.get(field) {
                Some(value) if is_wide_integer(value) => {}
                Some(value) => errors.push(format!(
                    "record {}: {} {} is not a wide integer",
                    index, field, value
                )),
                None => errors.push(format!("record {}: missing {}", index, field)),
            }
        }

        for field in ["exponent", "publish_time"] {
            if record.get(field).is_none_or(Value::is_null) {
                errors.push(format!("record {}: missing {}", index, field));
            }
        }
    }

    ShapeReport {
        valid: errors.is_empty(),
        errors,
    }
}

fn is_feed_id_hex(id: &str) -> bool {
    id.strip_prefix("0x")
        .is_some_and(|digits| digits.len() == 64 && digits.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn is_wide_integer(value: &Value) -> bool {
    match value {
        Value::String(text) => {
            let digits = text.strip_prefix('-').unwrap_or(text);
            !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
        }
        Value::Number(number) => number.is_i64() || number.is_u64(),
        _ => false,
    }
}

/// Report of [`validate_round_trip`]
///
/// `errors` fail the result; `warnings` do not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub expected_count: usize,
    pub decoded_count: usize,
    pub missing_feed_ids: Vec<FeedId>,
    pub unexpected_feed_ids: Vec<FeedId>,
}

impl ValidationResult {
    /// Turn a failing report into `EncodeError::RoundTripMismatch`.
    pub fn into_result(self) -> Result<Self, EncodeError> {
        if self.valid {
            return Ok(self);
        }
        Err(EncodeError::RoundTripMismatch {
            missing: self.missing_feed_ids.iter().map(FeedId::to_hex).collect(),
            unexpected: self.unexpected_feed_ids.iter().map(FeedId::to_hex).collect(),
            errors: self.errors,
        })
    }

    fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty();
        self
    }
}

/// Re-decode an encoder's output and compare it to the selection it came from.
///
/// Errors: re-decode failure, declared count mismatch, missing feed ids,
/// field differences (other than `prev_publish_time`, which the encoder
/// rewrites), out-of-range indices.
/// Warnings: unexpected extra feed ids, a version other than 1.0.
pub fn validate_round_trip(
    original: &[PriceRecord],
    encoded: &[u8],
    selected_indices: &[usize],
) -> ValidationResult {
    let mut result = ValidationResult {
        expected_count: selected_indices.len(),
        ..Default::default()
    };

    let mut expected = Vec::with_capacity(selected_indices.len());
    for &index in selected_indices {
        match original.get(index) {
            Some(record) => expected.push(record),
            None => result.errors.push(format!(
                "selected index {} out of range ({} records)",
                index,
                original.len()
            )),
        }
    }

    let update = match decode_update(encoded) {
        Ok(update) => update,
        Err(e) => {
            warn!("Round trip decode failed: {}", e);
            result.errors.push(format!("re-decode failed: {}", e));
            result.missing_feed_ids = dedup_ids(expected.iter().map(|r| r.feed_id));
            return result.finish();
        }
    };
    result.decoded_count = update.records.len();

    if (update.major_version, update.minor_version) != (MAJOR_VERSION, MINOR_VERSION) {
        result.warnings.push(format!(
            "encoded version {}.{} differs from {}.{}",
            update.major_version, update.minor_version, MAJOR_VERSION, MINOR_VERSION
        ));
    }

    if usize::from(update.declared_count) != selected_indices.len() {
        result.errors.push(format!(
            "declared count {} does not match {} selected indices",
            update.declared_count,
            selected_indices.len()
        ));
    }

    let decoded_ids: HashSet<FeedId> = update.records.iter().map(|r| r.feed_id).collect();
    let expected_ids: HashSet<FeedId> = expected.iter().map(|r| r.feed_id).collect();

    result.missing_feed_ids = dedup_ids(
        expected
            .iter()
            .map(|r| r.feed_id)
            .filter(|id| !decoded_ids.contains(id)),
    );
    for id in &result.missing_feed_ids {
        result.errors.push(format!("feed {} missing after round trip", id));
    }

    result.unexpected_feed_ids = dedup_ids(
        update
            .records
            .iter()
            .map(|r| r.feed_id)
            .filter(|id| !expected_ids.contains(id)),
    );
    for id in &result.unexpected_feed_ids {
        result.warnings.push(format!("unexpected feed {} after round trip", id));
    }

    // Output order must equal selection order, so compare position by position.
    for (position, (want, got)) in expected.iter().zip(&update.records).enumerate() {
        if want.feed_id != got.feed_id {
            result.errors.push(format!(
                "record {} is {} but {} was selected",
                position, got.feed_id, want.feed_id
            ));
        } else if !same_payload(want, got) {
            result.errors.push(format!(
                "record {} ({}) differs after round trip",
                position, want.feed_id
            ));
        }
    }

    let result = result.finish();
    debug!(
        "Round trip validation: valid={}, {} errors, {} warnings",
        result.valid,
        result.errors.len(),
        result.warnings.len()
    );
    result
}

fn same_payload(a: &PriceRecord, b: &PriceRecord) -> bool {
    a.price == b.price
        && a.confidence == b.confidence
        && a.exponent == b.exponent
        && a.publish_time == b.publish_time
        && a.ema_price == b.ema_price
        && a.ema_confidence == b.ema_confidence
}

fn dedup_ids(ids: impl Iterator<Item = FeedId>) -> Vec<FeedId> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encoder::{encode_records, reencode};
    use serde_json::json;

    fn records() -> Vec<PriceRecord> {
        (1u8..=3)
            .map(|i| PriceRecord {
                feed_id: FeedId::new([i; 32]),
                price: 1_000 * i64::from(i),
                confidence: u64::from(i),
                exponent: -3,
                publish_time: 1_714_746_000 + u64::from(i),
                prev_publish_time: 1_714_745_000,
                ema_price: 999 * i64::from(i),
                ema_confidence: u64::from(i),
            })
            .collect()
    }

    #[test]
    fn test_round_trip_of_own_output_is_valid() {
        let records = records();
        let encoded = reencode(&records, &[2, 0]).unwrap();
        let result = validate_round_trip(&records, &encoded.buffer, &[2, 0]);

        assert!(result.valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
        assert_eq!(result.expected_count, 2);
        assert_eq!(result.decoded_count, 2);
        assert!(result.clone().into_result().is_ok());
    }

    #[test]
    fn test_missing_and_unexpected_feeds() {
        let records = records();
        // buffer carries record 1 but the caller claims it selected record 0
        let buffer = encode_records(&[records[1]]).unwrap();
        let result = validate_round_trip(&records, &buffer, &[0]);

        assert!(!result.valid);
        assert_eq!(result.missing_feed_ids, vec![records[0].feed_id]);
        assert_eq!(result.unexpected_feed_ids, vec![records[1].feed_id]);
        assert_eq!(result.warnings.len(), 1);

        match result.into_result() {
            Err(EncodeError::RoundTripMismatch { missing, unexpected, .. }) => {
                assert_eq!(missing, vec![records[0].feed_id.to_hex()]);
                assert_eq!(unexpected, vec![records[1].feed_id.to_hex()]);
            }
            other => panic!("expected RoundTripMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_count_mismatch_is_an_error() {
        let records = records();
        let buffer = encode_records(&[records[0]]).unwrap();
        let result = validate_round_trip(&records, &buffer, &[0, 0]);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("declared count")));
    }

    #[test]
    fn test_corrupt_buffer_reports_decode_failure() {
        let records = records();
        let mut buffer = encode_records(&[records[0]]).unwrap();
        buffer[0] = 0;
        let result = validate_round_trip(&records, &buffer, &[0]);

        assert!(!result.valid);
        assert!(result.errors[0].starts_with("re-decode failed"));
        assert_eq!(result.missing_feed_ids, vec![records[0].feed_id]);
    }

    #[test]
    fn test_field_difference_is_an_error() {
        let records = records();
        let tampered = PriceRecord { price: 1, ..records[0] };
        let buffer = encode_records(&[tampered]).unwrap();
        let result = validate_round_trip(&records, &buffer, &[0]);
        assert!(!result.valid);
        assert!(result.errors[0].contains("differs"));
    }

    #[test]
    fn test_reordered_output_is_an_error() {
        let records = records();
        let tampered = PriceRecord { price: 999, ..records[0] };
        // same feeds as selection [2, 0], but emitted as [0, 2] with a changed price
        let buffer = encode_records(&[tampered, records[2]]).unwrap();
        let result = validate_round_trip(&records, &buffer, &[2, 0]);

        assert!(!result.valid);
        assert!(result.missing_feed_ids.is_empty());
        assert!(result.unexpected_feed_ids.is_empty());
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].starts_with("record 0 is"));
        assert!(result.errors[1].starts_with("record 1 is"));
    }

    #[test]
    fn test_field_difference_is_found_at_any_position() {
        let records = records();
        let tampered = PriceRecord { ema_confidence: 0, ..records[0] };
        let buffer = encode_records(&[records[2], tampered]).unwrap();
        let result = validate_round_trip(&records, &buffer, &[2, 0]);

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("record 1"));
        assert!(result.errors[0].contains("differs"));
    }

    #[test]
    fn test_other_version_is_only_a_warning() {
        let records = records();
        let mut buffer = encode_records(&[records[0]]).unwrap();
        buffer[7] = 1; // minor version 1
        let result = validate_round_trip(&records, &buffer, &[0]);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_out_of_range_index_is_an_error() {
        let records = records();
        let buffer = encode_records(&[records[0]]).unwrap();
        let result = validate_round_trip(&records, &buffer, &[0, 7]);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("out of range")));
    }

    #[test]
    fn test_shape_of_valid_records() {
        let report = ShapeReport::for_records(&records());
        assert!(report.valid, "{:?}", report.errors);
    }

    #[test]
    fn test_shape_flags_bad_fields() {
        let values = vec![
            json!({
                "feed_id": "0x1234",
                "price": 61409.9,
                "confidence": "32",
                "publish_time": 1714746101,
            }),
            json!({
                "feed_id": format!("0x{}", "ab".repeat(32)),
                "price": "-5",
                "confidence": 3,
                "exponent": -8,
                "publish_time": "1714746101",
            }),
            json!({
                "feed_id": "ab".repeat(32),
                "exponent": null,
            }),
        ];
        let report = validate_records(&values);

        assert!(!report.valid);
        let first: Vec<_> = report.errors.iter().filter(|e| e.starts_with("record 0")).collect();
        assert_eq!(first.len(), 3); // feed id, float price, missing exponent
        assert!(!report.errors.iter().any(|e| e.starts_with("record 1")));
        let third: Vec<_> = report.errors.iter().filter(|e| e.starts_with("record 2")).collect();
        // no 0x prefix, missing price, confidence, exponent, publish_time
        assert_eq!(third.len(), 5);
    }
}
