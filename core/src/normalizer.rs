//! Row normalizer: raw header/value rows to canonical `Transaction`s.
//!
//! Column names are resolved once per batch through the configured aliases.
//! A row that cannot be normalized yields a `ParseError` and is dropped;
//! it never aborts the batch.

use crate::{
    config::{AnalyticsConfig, ColumnAliases},
    error::{AnalyticsError, AnalyticsResult, ParseError},
    record::{ChannelBucket, Transaction, TransactionStatus},
    types::Period,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

/// One source row: header → cell text.
pub type RawRecord = BTreeMap<String, String>;

const REQUIRED_FIELDS: [&str; 2] = ["customer_id", "transaction_timestamp"];

/// Offset-carrying layouts. The offset is discarded, wall time is kept.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub records: Vec<Transaction>,
    pub dropped: Vec<ParseError>,
}

pub struct RowNormalizer<'a> {
    config:  &'a AnalyticsConfig,
    columns: BTreeMap<&'static str, String>,
}

impl<'a> RowNormalizer<'a> {
    /// Resolve the source headers against the configured aliases.
    /// Fails only when a required column (customer id, timestamp) is absent.
    pub fn for_headers<'h, I>(headers: I, config: &'a AnalyticsConfig) -> AnalyticsResult<Self>
    where
        I: IntoIterator<Item = &'h str>,
    {
        let headers: Vec<&str> = headers.into_iter().collect();
        let mut columns = BTreeMap::new();
        for (field, aliases) in config.column_aliases.fields() {
            if let Some(header) = resolve_header(&headers, aliases) {
                columns.insert(field, header.to_string());
            }
        }

        for field in REQUIRED_FIELDS {
            if !columns.contains_key(field) {
                return Err(AnalyticsError::MissingColumn(field));
            }
        }

        log::debug!("Resolved {} of 13 canonical columns", columns.len());
        Ok(Self { config, columns })
    }

    /// Canonical field → source header, for every resolved field.
    pub fn resolved_columns(&self) -> &BTreeMap<&'static str, String> {
        &self.columns
    }

    /// Canonical fields with no matching source header.
    pub fn missing_columns(&self) -> Vec<&'static str> {
        self.config
            .column_aliases
            .fields()
            .iter()
            .map(|(field, _)| *field)
            .filter(|field| !self.columns.contains_key(field))
            .collect()
    }

    /// Normalize one row. `row` is the 1-based data row number used in errors.
    pub fn normalize(&self, row: usize, raw: &RawRecord) -> Result<Transaction, ParseError> {
        let customer_id = self
            .cell(raw, "customer_id")
            .ok_or(ParseError::MissingCustomer { row })?;

        let ts_text = self.cell(raw, "transaction_timestamp").unwrap_or_default();
        let timestamp = parse_timestamp(ts_text, &self.config.timestamp_formats).ok_or_else(|| {
            ParseError::Timestamp { row, value: ts_text.to_string() }
        })?;

        let distribution_channel = self.cell(raw, "distribution_channel").map(str::to_string);
        let channel = distribution_channel
            .as_deref()
            .map(ChannelBucket::classify)
            .unwrap_or(ChannelBucket::Other);

        Ok(Transaction {
            transaction_id: self.owned(raw, "transaction_id"),
            customer_id: customer_id.to_string(),
            period: Period::of(&timestamp),
            timestamp,
            amount: self.cell(raw, "amount").and_then(parse_amount),
            status: self.cell(raw, "status").map(TransactionStatus::parse),
            distribution_channel,
            channel,
            country: self
                .cell(raw, "country")
                .map(|c| self.config.normalize_country(c)),
            governorate: self.owned(raw, "governorate"),
            city: self.owned(raw, "city"),
            network: self.owned(raw, "network"),
            promo_code: self.owned(raw, "promo_code"),
            reason: self.owned(raw, "reason"),
            paid_transaction_count: self.cell(raw, "paid_transaction_count").and_then(parse_count),
        })
    }

    /// Normalize numbered rows. Failures are logged and collected in
    /// `dropped`; the remaining rows are kept in input order.
    pub fn normalize_batch<I>(&self, rows: I) -> NormalizedBatch
    where
        I: IntoIterator<Item = (usize, RawRecord)>,
    {
        let mut batch = NormalizedBatch::default();
        for (row, raw) in rows {
            match self.normalize(row, &raw) {
                Ok(tx) => batch.records.push(tx),
                Err(e) => {
                    log::warn!("Dropping {e}");
                    batch.dropped.push(e);
                }
            }
        }
        batch
    }

    /// Trimmed, non-empty cell text for a canonical field.
    fn cell<'r>(&self, raw: &'r RawRecord, field: &str) -> Option<&'r str> {
        let header = self.columns.get(field)?;
        raw.get(header)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn owned(&self, raw: &RawRecord, field: &str) -> Option<String> {
        self.cell(raw, field).map(str::to_string)
    }
}

/// Exact header match first (in alias order), then case-insensitive.
fn resolve_header<'h>(headers: &[&'h str], aliases: &[String]) -> Option<&'h str> {
    aliases
        .iter()
        .find_map(|alias| headers.iter().find(|h| h.trim() == alias.as_str()))
        .or_else(|| {
            aliases.iter().find_map(|alias| {
                headers.iter().find(|h| h.trim().eq_ignore_ascii_case(alias))
            })
        })
        .copied()
}

// ── Field parsers ────────────────────────────────────────────────────────────

/// Parse a timestamp and strip any timezone, keeping local wall time.
///
/// Tries RFC 3339, the built-in offset and naive layouts, a bare date
/// (midnight), and finally `extra_formats`.
pub fn parse_timestamp(raw: &str, extra_formats: &[String]) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_local());
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    extra_formats
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Non-numeric and non-finite values become `None`; this never fails.
pub fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn parse_count(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().or_else(|| {
        parse_amount(raw)
            .filter(|v| *v >= 0.0 && v.fract() == 0.0 && *v <= u32::MAX as f64)
            .map(|v| v as u32)
    })
}

/// Trim and title-case a network name ("  poste tunisienne" → "Poste Tunisienne").
pub fn normalize_network(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_alpha = false;
    for c in raw.trim().chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

/// Trim and lower-case a promo code; blank codes are not codes.
pub fn normalize_promo_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_lowercase();
    (!code.is_empty()).then_some(code)
}

/// Render a canonical record back into a raw row under the canonical
/// (first-alias) headers. Feeding the result back through the normalizer
/// yields the same record.
pub fn to_raw(tx: &Transaction, aliases: &ColumnAliases) -> RawRecord {
    let mut raw = RawRecord::new();
    let mut put = |names: &[String], value: Option<String>| {
        if let (Some(header), Some(v)) = (names.first(), value) {
            raw.insert(header.clone(), v);
        }
    };

    put(&aliases.customer_id, Some(tx.customer_id.clone()));
    put(
        &aliases.transaction_timestamp,
        Some(tx.timestamp.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
    );
    put(&aliases.transaction_id, tx.transaction_id.clone());
    put(&aliases.amount, tx.amount.map(|a| a.to_string()));
    put(&aliases.status, tx.status.as_ref().map(|s| s.as_str().to_string()));
    put(&aliases.distribution_channel, tx.distribution_channel.clone());
    put(&aliases.country, tx.country.clone());
    put(&aliases.governorate, tx.governorate.clone());
    put(&aliases.city, tx.city.clone());
    put(&aliases.network, tx.network.clone());
    put(&aliases.promo_code, tx.promo_code.clone());
    put(&aliases.reason, tx.reason.clone());
    put(&aliases.paid_transaction_count, tx.paid_transaction_count.map(|n| n.to_string()));
    raw
}
