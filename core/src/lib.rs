//! Customer-transaction analytics for a money-transfer business.
//!
//! Pipeline:
//!   1. `ingest` reads CSV rows and `normalizer` turns them into canonical
//!      `Transaction`s, dropping rows it cannot parse.
//!   2. `filter` restricts the dataset to a date-time range and a country.
//!   3. `cohort`, `rfm` and `aggregate` compute their views over the
//!      filtered records; `report` bundles them for one request.
//!
//! Every engine is a pure function of its input records.

pub mod aggregate;
pub mod cohort;
pub mod config;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod normalizer;
pub mod record;
pub mod report;
pub mod rfm;
pub mod types;

pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, AnalyticsResult, ParseError};
pub use filter::FilterSpec;
pub use record::Transaction;
