//! CSV ingestion: reads a source file, resolves its headers and hands every
//! row to the `RowNormalizer`.
//!
//! 1. Read the header row and resolve canonical columns (fails on a missing
//!    customer id or timestamp column).
//! 2. Turn each data row into a `RawRecord`. A row the CSV reader rejects is
//!    recorded as `ParseError::Malformed` and skipped.
//! 3. Normalize the batch; rows that fail are dropped and listed, in row
//!    order, in the `LoadReport`.

use crate::{
    config::AnalyticsConfig,
    error::{AnalyticsResult, ParseError},
    normalizer::{NormalizedBatch, RawRecord, RowNormalizer},
    record::Transaction,
};
use serde::Serialize;
use std::{collections::BTreeMap, fs::File, io::Read, path::Path};

/// What happened while loading one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub rows_read:        usize,
    pub rows_kept:        usize,
    #[serde(serialize_with = "serialize_dropped")]
    pub dropped:          Vec<ParseError>,
    /// Canonical field → source header.
    pub resolved_columns: BTreeMap<String, String>,
    pub missing_columns:  Vec<String>,
}

impl LoadReport {
    pub fn rows_dropped(&self) -> usize {
        self.dropped.len()
    }
}

fn serialize_dropped<S>(dropped: &[ParseError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(dropped.iter().map(|e| e.to_string()))
}

/// The canonical dataset plus how it was obtained.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<Transaction>,
    pub report:  LoadReport,
}

/// Load CSV text from any reader.
pub fn read_csv<R: Read>(reader: R, config: &AnalyticsConfig) -> AnalyticsResult<Dataset> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let normalizer = RowNormalizer::for_headers(headers.iter(), config)?;

    let mut report = LoadReport {
        resolved_columns: normalizer
            .resolved_columns()
            .iter()
            .map(|(field, header)| (field.to_string(), header.clone()))
            .collect(),
        missing_columns: normalizer
            .missing_columns()
            .into_iter()
            .map(str::to_string)
            .collect(),
        ..LoadReport::default()
    };

    let mut rows = Vec::new();
    let mut malformed = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let row = i + 1;
        match result {
            Ok(fields) => {
                let raw: RawRecord = headers
                    .iter()
                    .zip(fields.iter())
                    .map(|(h, v)| (h.to_string(), v.to_string()))
                    .collect();
                rows.push((row, raw));
            }
            Err(e) => {
                let e = ParseError::Malformed { row, message: e.to_string() };
                log::warn!("Dropping {e}");
                malformed.push(e);
            }
        }
    }
    report.rows_read = rows.len() + malformed.len();

    let NormalizedBatch { records, mut dropped } = normalizer.normalize_batch(rows);
    dropped.append(&mut malformed);
    dropped.sort_by_key(ParseError::row);
    report.dropped = dropped;

    report.rows_kept = records.len();
    log::info!(
        "Loaded {} of {} rows ({} dropped)",
        report.rows_kept,
        report.rows_read,
        report.rows_dropped()
    );
    if !report.missing_columns.is_empty() {
        log::debug!("Columns not present in source: {:?}", report.missing_columns);
    }

    Ok(Dataset { records, report })
}

pub fn read_csv_path(path: impl AsRef<Path>, config: &AnalyticsConfig) -> AnalyticsResult<Dataset> {
    let path = path.as_ref();
    log::debug!("Reading {}", path.display());
    let file = File::open(path)?;
    read_csv(file, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_row_still_normalizes_with_missing_optionals() {
        let csv = "customer_id,transaction_date,amount\nc1,2024-05-01 10:00:00\n";
        let data = read_csv(csv.as_bytes(), &AnalyticsConfig::default()).unwrap();
        assert_eq!(data.report.rows_kept, 1);
        assert_eq!(data.records[0].amount, None);
    }

    #[test]
    fn missing_timestamp_column_is_fatal() {
        let csv = "customer_id,amount\nc1,10\n";
        assert!(read_csv(csv.as_bytes(), &AnalyticsConfig::default()).is_err());
    }
}
