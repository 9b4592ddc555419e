//! Re-encoding Pipeline
//!
//! Glues a price update source to the codec: fetches the latest update,
//! decodes it, keeps a chosen subset of records and re-encodes them into a
//! payload plus calldata for the configured entry point.
//!
//! # Flow
//! ```text
//! Source → bytes → decode → [records] → select(indices) → encode
//!                                                           ↓
//!            report ← summary ← round-trip validation ← calldata
//! ```

use crate::{
    codec::{self, EntryPoint, ReencodeSummary, ShapeReport, ValidationResult},
    config::Config,
    error::{OracleError, Result},
    hermes_client::{FallbackSource, FileSource, HermesClient, PriceUpdateSource, RetryPolicy},
    symbols::{StaticSymbolResolver, SymbolResolver},
    types::{AnnotatedRecord, FeedId, FeedMetadata, PriceRecord},
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything one pipeline run produced
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub source: String,
    pub entry_point: EntryPoint,

    /// All decoded records, in wire order
    pub records: Vec<AnnotatedRecord>,

    pub selected_indices: Vec<usize>,

    /// Records carried by the re-encoded payload, in selection order
    pub selected: Vec<AnnotatedRecord>,

    /// `0x`-prefixed re-encoded accumulator update
    pub encoded_update: String,

    pub calldata: String,
    pub shape: ShapeReport,
    pub validation: ValidationResult,
    pub summary: ReencodeSummary,
}

pub struct Pipeline {
    source: Box<dyn PriceUpdateSource>,
    symbols: Box<dyn SymbolResolver>,
    entry_point: EntryPoint,
    report_path: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn PriceUpdateSource>,
        symbols: Box<dyn SymbolResolver>,
        entry_point: EntryPoint,
    ) -> Self {
        Self {
            source,
            symbols,
            entry_point,
            report_path: None,
        }
    }

    /// Also write each report as JSON to `path`
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    /// Build the source chain from configuration:
    /// update file (if set), primary Hermes, fallback Hermes (if set).
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.fetch_config.request_timeout_secs);
        let retry = RetryPolicy {
            max_retries: config.fetch_config.max_retries,
            initial_delay: Duration::from_millis(config.fetch_config.retry_delay_ms),
        };

        let mut sources: Vec<Box<dyn PriceUpdateSource>> = Vec::new();
        if let Some(path) = &config.update_file {
            sources.push(Box::new(FileSource::new(path)));
        }
        sources.push(Box::new(HermesClient::new(&config.hermes_url, timeout, retry)?));
        if let Some(url) = &config.hermes_fallback_url {
            sources.push(Box::new(HermesClient::new(url, timeout, retry)?));
        }
        debug!("Configured {} update sources", sources.len());

        let mut pipeline = Self::new(
            Box::new(FallbackSource::new(sources)),
            Box::new(StaticSymbolResolver::with_defaults()),
            config.entry_point,
        );
        if let Some(path) = &config.report_path {
            pipeline = pipeline.with_report_path(path);
        }
        Ok(pipeline)
    }

    /// Run one fetch → decode → re-encode → validate cycle.
    ///
    /// # Arguments
    /// * `feed_ids` - feeds to request from the source
    /// * `selected_indices` - positions in the decoded record list to keep;
    ///   `None` keeps every record
    ///
    /// # Errors
    /// * `NoPriceData` - the source returned no payload
    /// * `DecodeError` - the fetched payload is malformed
    /// * `EncodeError` - bad selection, or the output failed round-trip validation
    pub async fn run(
        &self,
        feed_ids: &[FeedId],
        selected_indices: Option<&[usize]>,
    ) -> Result<PipelineReport> {
        if feed_ids.is_empty() {
            return Err(OracleError::InvalidInput("No feed ids requested".to_string()));
        }

        info!("Fetching {} feeds from {}", feed_ids.len(), self.source.name());
        let fetched = self.source.fetch_update(feed_ids).await?;
        if fetched.payloads.len() > 1 {
            warn!("Source returned {} payloads, using the first", fetched.payloads.len());
        }
        let payload = fetched
            .payloads
            .first()
            .ok_or_else(|| OracleError::NoPriceData("Source returned no payload".to_string()))?;

        let records = codec::decode(payload)?;
        info!("Decoded {} records from {} bytes", records.len(), payload.len());

        let shape = ShapeReport::for_records(&records);
        if !shape.valid {
            warn!("Decoded records failed shape check: {:?}", shape.errors);
        }

        let selected_indices: Vec<usize> = match selected_indices {
            Some(indices) => indices.to_vec(),
            None => (0..records.len()).collect(),
        };

        let encoded = codec::reencode(&records, &selected_indices)?;
        let calldata = self.entry_point.calldata(&encoded.buffer);

        let validation =
            codec::validate_round_trip(&records, &encoded.buffer, &selected_indices).into_result()?;
        for warning in &validation.warnings {
            warn!("Round trip: {}", warning);
        }

        let summary = ReencodeSummary::new(
            self.entry_point,
            records.len(),
            encoded.selected.len(),
            payload.len(),
            &encoded.buffer,
            &calldata,
        );
        info!(
            "Re-encoded {}/{} records: {} bytes, calldata {} bytes, est. gas {} (limit {})",
            summary.selected_records,
            summary.total_records,
            summary.encoded_size,
            summary.calldata_size,
            summary.estimated_gas,
            summary.recommended_gas_limit
        );

        let report = PipelineReport {
            source: self.source.name().to_string(),
            entry_point: self.entry_point,
            records: annotate(&records, &fetched.metadata, self.symbols.as_ref()),
            selected_indices,
            selected: annotate(&encoded.selected, &fetched.metadata, self.symbols.as_ref()),
            encoded_update: format!("0x{}", hex::encode(&encoded.buffer)),
            calldata,
            shape,
            validation,
            summary,
        };

        if let Some(path) = &self.report_path {
            write_report(path, &report).await?;
        }

        Ok(report)
    }
}

/// Merge slots (by feed id) and symbols into decoded records.
pub fn annotate(
    records: &[PriceRecord],
    metadata: &[FeedMetadata],
    symbols: &dyn SymbolResolver,
) -> Vec<AnnotatedRecord> {
    let slots: HashMap<FeedId, Option<u64>> =
        metadata.iter().map(|meta| (meta.feed_id, meta.slot)).collect();

    records
        .iter()
        .map(|record| AnnotatedRecord {
            record: *record,
            slot: slots.get(&record.feed_id).copied().flatten(),
            symbol: symbols.resolve(&record.feed_id),
            human_price: record.human_price(),
            human_ema_price: record.human_ema_price(),
        })
        .collect()
}

/// Write a report as pretty JSON, creating parent directories.
pub async fn write_report(path: &Path, report: &PipelineReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;
    info!("Report written to {}", path.display());
    Ok(())
}
