use crate::error::{AnalyticsError, AnalyticsResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Column aliases ───────────────────────────────────────────────────────────

/// Accepted source header names for each canonical field.
/// The first alias of each field is the canonical header written on export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub customer_id:            Vec<String>,
    pub transaction_timestamp:  Vec<String>,
    pub transaction_id:         Vec<String>,
    pub amount:                 Vec<String>,
    pub status:                 Vec<String>,
    pub distribution_channel:   Vec<String>,
    pub country:                Vec<String>,
    pub governorate:            Vec<String>,
    pub city:                   Vec<String>,
    pub network:                Vec<String>,
    pub promo_code:             Vec<String>,
    pub reason:                 Vec<String>,
    pub paid_transaction_count: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            customer_id:            names(&["customer_id", "id_client"]),
            transaction_timestamp:  names(&["transaction_date", "createdAt", "created_at"]),
            transaction_id:         names(&["transaction_id", "_id"]),
            amount:                 names(&["amount", "amountToSend"]),
            status:                 names(&["status"]),
            distribution_channel:   names(&["distribution_channel", "distributionChannel"]),
            country:                names(&["country"]),
            governorate:            names(&["governorate", "gov"]),
            city:                   names(&["city", "ville"]),
            network:                names(&["network"]),
            promo_code:             names(&["promo_code", "promoCode"]),
            reason:                 names(&["reason"]),
            paid_transaction_count: names(&["paid_transaction_count", "nbTransactionsPaid"]),
        }
    }
}

impl ColumnAliases {
    /// (field name, aliases) for every canonical field, in schema order.
    pub fn fields(&self) -> [(&'static str, &[String]); 13] {
        [
            ("customer_id", self.customer_id.as_slice()),
            ("transaction_timestamp", self.transaction_timestamp.as_slice()),
            ("transaction_id", self.transaction_id.as_slice()),
            ("amount", self.amount.as_slice()),
            ("status", self.status.as_slice()),
            ("distribution_channel", self.distribution_channel.as_slice()),
            ("country", self.country.as_slice()),
            ("governorate", self.governorate.as_slice()),
            ("city", self.city.as_slice()),
            ("network", self.network.as_slice()),
            ("promo_code", self.promo_code.as_slice()),
            ("reason", self.reason.as_slice()),
            ("paid_transaction_count", self.paid_transaction_count.as_slice()),
        ]
    }
}

// ── Policies ─────────────────────────────────────────────────────────────────

/// What the cohort engine does with a cohort whose index-1 count is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateCohortPolicy {
    /// Raise `AnalyticsError::Computation`.
    #[default]
    Fail,
    /// Drop the row, log a warning, and report it in `CohortAnalysis::omitted`.
    Omit,
}

// ── Top-level config ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub column_aliases:           ColumnAliases,
    /// Display name → country code, e.g. "Tunisia" → "TUN".
    pub country_codes:            BTreeMap<String, String>,
    /// Extra naive `strftime` patterns, tried after the built-in formats.
    pub timestamp_formats:        Vec<String>,
    pub top_n:                    usize,
    pub degenerate_cohort_policy: DegenerateCohortPolicy,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        let country_codes = [("Tunisia", "TUN"), ("Morocco", "MAC")]
            .into_iter()
            .map(|(name, code)| (name.to_string(), code.to_string()))
            .collect();

        Self {
            column_aliases: ColumnAliases::default(),
            country_codes,
            timestamp_formats: vec!["%d/%m/%Y %H:%M:%S".into(), "%d/%m/%Y %H:%M".into()],
            top_n: 8,
            degenerate_cohort_policy: DegenerateCohortPolicy::Fail,
        }
    }
}

impl AnalyticsConfig {
    /// Load from a JSON file. Fields absent from the file keep their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: AnalyticsConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        log::debug!("Loaded analytics config from {path}");
        Ok(config)
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.top_n == 0 {
            return Err(AnalyticsError::Config("top_n must be at least 1".into()));
        }
        for (field, aliases) in self.column_aliases.fields() {
            if aliases.iter().all(|a| a.trim().is_empty()) {
                return Err(AnalyticsError::Config(format!(
                    "column_aliases.{field} must list at least one header name"
                )));
            }
        }
        Ok(())
    }

    /// Map a country display name to its code; codes and unknown values
    /// pass through trimmed.
    pub fn normalize_country(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        self.country_codes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
            .map(|(_, code)| code.clone())
            .unwrap_or_else(|| trimmed.to_string())
    }

    /// Resolve a user-facing country selection. "All" (or empty) means no
    /// country filter.
    pub fn resolve_country_filter(&self, selection: &str) -> Option<String> {
        let trimmed = selection.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            None
        } else {
            Some(self.normalize_country(trimmed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AnalyticsConfig = serde_json::from_str(r#"{ "top_n": 5 }"#).unwrap();
        assert_eq!(config.top_n, 5);
        assert_eq!(config.column_aliases.customer_id[1], "id_client");
        assert_eq!(config.degenerate_cohort_policy, DegenerateCohortPolicy::Fail);
    }

    #[test]
    fn zero_top_n_is_rejected() {
        let config = AnalyticsConfig { top_n: 0, ..AnalyticsConfig::default() };
        assert!(matches!(config.validate(), Err(AnalyticsError::Config(_))));
    }

    #[test]
    fn country_selection_resolves_names_and_all() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.resolve_country_filter("All"), None);
        assert_eq!(config.resolve_country_filter("tunisia").as_deref(), Some("TUN"));
        assert_eq!(config.resolve_country_filter("MAC").as_deref(), Some("MAC"));
    }
}
