//! Gas and size estimates for a re-encoded update.
//!
//! The gas model is linear, `base + count * per_feed`, calibrated against
//! historical costs. It is a floor, not a chain-verified figure; submitters
//! should apply [`recommended_gas_limit`] or their own multiplier.

use super::encoder::{self, BYTES_ARRAY_SELECTOR, SINGLE_BYTES_SELECTOR};
use crate::error::OracleError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Safety multiplier applied to gas estimates, in percent
pub const GAS_SAFETY_MULTIPLIER_PCT: u64 = 125;

/// On-chain entry point an update is submitted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPoint {
    /// `updatePriceFeeds(bytes[])`
    AccumulatorArray,

    /// Single `bytes` parameter
    #[default]
    SingleBytes,
}

impl EntryPoint {
    pub fn base_gas(&self) -> u64 {
        match self {
            EntryPoint::AccumulatorArray => 100_000,
            EntryPoint::SingleBytes => 50_000,
        }
    }

    pub fn per_feed_gas(&self) -> u64 {
        match self {
            EntryPoint::AccumulatorArray => 50_000,
            EntryPoint::SingleBytes => 30_000,
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        match self {
            EntryPoint::AccumulatorArray => BYTES_ARRAY_SELECTOR,
            EntryPoint::SingleBytes => SINGLE_BYTES_SELECTOR,
        }
    }

    /// Calldata for one accumulator buffer in this entry point's ABI shape.
    pub fn calldata(&self, buffer: &[u8]) -> String {
        match self {
            EntryPoint::AccumulatorArray => encoder::to_array_calldata(&[buffer]),
            EntryPoint::SingleBytes => encoder::to_calldata(buffer),
        }
    }
}

impl FromStr for EntryPoint {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "single_bytes" | "bytes" => Ok(EntryPoint::SingleBytes),
            "array" | "accumulator_array" | "bytes_array" => Ok(EntryPoint::AccumulatorArray),
            other => Err(OracleError::InvalidInput(format!(
                "Unknown entry point: {}",
                other
            ))),
        }
    }
}

/// Linear gas estimate for submitting `count` feeds.
pub fn estimate_gas(count: usize, entry_point: EntryPoint) -> u64 {
    let count = u64::try_from(count).unwrap_or(u64::MAX);
    entry_point
        .base_gas()
        .saturating_add(count.saturating_mul(entry_point.per_feed_gas()))
}

/// Estimate scaled by [`GAS_SAFETY_MULTIPLIER_PCT`].
///
/// Never below `estimate`; clamps to `u64::MAX`.
pub fn recommended_gas_limit(estimate: u64) -> u64 {
    let scaled = u128::from(estimate) * u128::from(GAS_SAFETY_MULTIPLIER_PCT) / 100;
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Summary of one re-encoding operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReencodeSummary {
    pub entry_point: EntryPoint,
    pub total_records: usize,
    pub selected_records: usize,
    pub original_size: usize,
    pub encoded_size: usize,
    pub calldata_size: usize,
    pub size_reduction_pct: f64,
    pub estimated_gas: u64,
    pub recommended_gas_limit: u64,
}

impl ReencodeSummary {
    /// # Arguments
    /// * `original_size` - byte length of the fetched update
    /// * `encoded` - the re-encoded buffer
    /// * `calldata` - `0x`-prefixed calldata derived from `encoded`
    pub fn new(
        entry_point: EntryPoint,
        total_records: usize,
        selected_records: usize,
        original_size: usize,
        encoded: &[u8],
        calldata: &str,
    ) -> Self {
        let calldata_size = calldata.strip_prefix("0x").unwrap_or(calldata).len() / 2;
        let size_reduction_pct = if original_size == 0 {
            0.0
        } else {
            (1.0 - encoded.len() as f64 / original_size as f64) * 100.0
        };
        let estimated_gas = estimate_gas(selected_records, entry_point);

        Self {
            entry_point,
            total_records,
            selected_records,
            original_size,
            encoded_size: encoded.len(),
            calldata_size,
            size_reduction_pct,
            estimated_gas,
            recommended_gas_limit: recommended_gas_limit(estimated_gas),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_constants() {
        assert_eq!(estimate_gas(0, EntryPoint::SingleBytes), 50_000);
        assert_eq!(estimate_gas(3, EntryPoint::SingleBytes), 140_000);
        assert_eq!(estimate_gas(0, EntryPoint::AccumulatorArray), 100_000);
        assert_eq!(estimate_gas(2, EntryPoint::AccumulatorArray), 200_000);
    }

    #[test]
    fn test_gas_is_linear() {
        for entry_point in [EntryPoint::SingleBytes, EntryPoint::AccumulatorArray] {
            for n in 0..50 {
                assert_eq!(
                    estimate_gas(n + 1, entry_point) - estimate_gas(n, entry_point),
                    entry_point.per_feed_gas()
                );
            }
        }
    }

    #[test]
    fn test_recommended_gas_limit() {
        assert_eq!(recommended_gas_limit(100_000), 125_000);
        assert_eq!(recommended_gas_limit(0), 0);
    }

    #[test]
    fn test_recommended_gas_limit_never_below_estimate() {
        assert_eq!(recommended_gas_limit(u64::MAX), u64::MAX);

        let estimate = estimate_gas(usize::MAX, EntryPoint::SingleBytes);
        assert_eq!(estimate, u64::MAX);
        assert!(recommended_gas_limit(estimate) >= estimate);

        let near_overflow = u64::MAX / 125 + 1;
        assert!(recommended_gas_limit(near_overflow) > near_overflow);
    }

    #[test]
    fn test_entry_point_parsing() {
        assert_eq!("single".parse::<EntryPoint>().unwrap(), EntryPoint::SingleBytes);
        assert_eq!(
            " ARRAY ".parse::<EntryPoint>().unwrap(),
            EntryPoint::AccumulatorArray
        );
        assert!(matches!(
            "multicall".parse::<EntryPoint>(),
            Err(OracleError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_entry_point_calldata_shapes_differ() {
        let buffer = [1u8, 2, 3];
        assert_eq!(EntryPoint::SingleBytes.selector(), [0xa9, 0x85, 0x2b, 0xcc]);
        assert_eq!(EntryPoint::AccumulatorArray.selector(), [0xef, 0x9e, 0x5e, 0x28]);

        for entry_point in [EntryPoint::SingleBytes, EntryPoint::AccumulatorArray] {
            let calldata = entry_point.calldata(&buffer);
            assert_eq!(&calldata[2..10], hex::encode(entry_point.selector()));
        }
        assert_ne!(
            EntryPoint::SingleBytes.calldata(&buffer),
            EntryPoint::AccumulatorArray.calldata(&buffer)
        );
    }

    #[test]
    fn test_summary() {
        let encoded = vec![0u8; 100];
        let calldata = format!("0x{}", "00".repeat(196));
        let summary =
            ReencodeSummary::new(EntryPoint::SingleBytes, 10, 1, 400, &encoded, &calldata);

        assert_eq!(summary.encoded_size, 100);
        assert_eq!(summary.calldata_size, 196);
        assert_eq!(summary.size_reduction_pct, 75.0);
        assert_eq!(summary.estimated_gas, 80_000);
        assert_eq!(summary.recommended_gas_limit, 100_000);
    }
}
