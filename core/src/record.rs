//! The canonical transaction record.
//!
//! Every downstream engine works only on `Transaction`. Raw rows never leave
//! the normalizer.

use crate::types::{CustomerId, Period};
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;

// ── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransactionStatus {
    Complete,
    InProgress,
    Cancelled,
    /// Any status not recognised above, kept verbatim.
    Other(String),
}

impl TransactionStatus {
    /// The single place where status spellings are reconciled.
    /// Both "cancelled" and "canceled" become `Cancelled`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "complete" | "completed" => TransactionStatus::Complete,
            "in progress" | "in_progress" | "in-progress" => TransactionStatus::InProgress,
            "cancelled" | "canceled" => TransactionStatus::Cancelled,
            _ => TransactionStatus::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::Complete => "complete",
            TransactionStatus::InProgress => "in progress",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TransactionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ── Distribution channel ─────────────────────────────────────────────────────

const CASH_PICKUP_TOKENS: &[&str] = &["cash", "pickup", "pick up"];
const BANK_TRANSFER_TOKENS: &[&str] = &["bank", "transfer", "account"];

/// Coarse payout channel.
///
/// Channel values in the source are free text, not a controlled vocabulary,
/// so this is a substring heuristic: cash-pickup tokens are checked first,
/// then bank-transfer tokens, and anything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelBucket {
    CashPickup,
    BankTransfer,
    Other,
}

impl ChannelBucket {
    pub fn classify(raw: &str) -> Self {
        let lowered = raw.to_lowercase();
        if CASH_PICKUP_TOKENS.iter().any(|t| lowered.contains(t)) {
            ChannelBucket::CashPickup
        } else if BANK_TRANSFER_TOKENS.iter().any(|t| lowered.contains(t)) {
            ChannelBucket::BankTransfer
        } else {
            ChannelBucket::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelBucket::CashPickup => "cash_pickup",
            ChannelBucket::BankTransfer => "bank_transfer",
            ChannelBucket::Other => "other",
        }
    }
}

// ── Transaction ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub transaction_id:         Option<String>,
    pub customer_id:            CustomerId,
    pub timestamp:              NaiveDateTime,
    pub period:                 Period,
    pub amount:                 Option<f64>,
    pub status:                 Option<TransactionStatus>,
    /// Channel text as it appeared in the source.
    pub distribution_channel:   Option<String>,
    pub channel:                ChannelBucket,
    pub country:                Option<String>,
    pub governorate:            Option<String>,
    pub city:                   Option<String>,
    pub network:                Option<String>,
    pub promo_code:             Option<String>,
    pub reason:                 Option<String>,
    pub paid_transaction_count: Option<u32>,
}

impl Transaction {
    /// A bare record; optional fields are filled with the `with_*` builders.
    pub fn new(customer_id: impl Into<CustomerId>, timestamp: NaiveDateTime) -> Self {
        Self {
            transaction_id: None,
            customer_id: customer_id.into(),
            period: Period::of(&timestamp),
            timestamp,
            amount: None,
            status: None,
            distribution_channel: None,
            channel: ChannelBucket::Other,
            country: None,
            governorate: None,
            city: None,
            network: None,
            promo_code: None,
            reason: None,
            paid_transaction_count: None,
        }
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_status(mut self, raw: &str) -> Self {
        self.status = Some(TransactionStatus::parse(raw));
        self
    }

    pub fn with_channel(mut self, raw: &str) -> Self {
        self.channel = ChannelBucket::classify(raw);
        self.distribution_channel = Some(raw.to_string());
        self
    }

    pub fn with_country(mut self, code: &str) -> Self {
        self.country = Some(code.to_string());
        self
    }

    pub fn with_location(mut self, governorate: &str, city: &str) -> Self {
        self.governorate = Some(governorate.to_string());
        self.city = Some(city.to_string());
        self
    }

    pub fn with_network(mut self, network: &str) -> Self {
        self.network = Some(network.to_string());
        self
    }

    pub fn with_promo_code(mut self, code: &str) -> Self {
        self.promo_code = Some(code.to_string());
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    pub fn with_paid_count(mut self, n: u32) -> Self {
        self.paid_transaction_count = Some(n);
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.transaction_id = Some(id.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_cancel_spellings_collapse() {
        assert_eq!(TransactionStatus::parse("canceled"), TransactionStatus::Cancelled);
        assert_eq!(TransactionStatus::parse("Cancelled "), TransactionStatus::Cancelled);
        assert_eq!(TransactionStatus::Cancelled.as_str(), "cancelled");
    }

    #[test]
    fn unknown_status_passes_through_verbatim() {
        let s = TransactionStatus::parse("Refunded");
        assert_eq!(s, TransactionStatus::Other("Refunded".into()));
        assert_eq!(s.as_str(), "Refunded");
    }

    #[test]
    fn channel_heuristic_buckets() {
        assert_eq!(ChannelBucket::classify("Cash Pickup"), ChannelBucket::CashPickup);
        assert_eq!(ChannelBucket::classify("agent pick up point"), ChannelBucket::CashPickup);
        assert_eq!(ChannelBucket::classify("BANK_ACCOUNT"), ChannelBucket::BankTransfer);
        assert_eq!(ChannelBucket::classify("wire transfer"), ChannelBucket::BankTransfer);
        assert_eq!(ChannelBucket::classify("mobile wallet"), ChannelBucket::Other);
        assert_eq!(ChannelBucket::classify(""), ChannelBucket::Other);
    }

    #[test]
    fn bucket_labels_reclassify_to_themselves() {
        for bucket in [ChannelBucket::CashPickup, ChannelBucket::BankTransfer, ChannelBucket::Other] {
            assert_eq!(ChannelBucket::classify(bucket.as_str()), bucket);
        }
    }
}
