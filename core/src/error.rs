use thiserror::Error;

/// A single source row that could not be normalized. The row is dropped;
/// the rest of the batch continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("row {row}: unparseable timestamp {value:?}")]
    Timestamp { row: usize, value: String },

    #[error("row {row}: missing customer id")]
    MissingCustomer { row: usize },

    #[error("row {row}: malformed record: {message}")]
    Malformed { row: usize, message: String },
}

impl ParseError {
    pub fn row(&self) -> usize {
        match self {
            ParseError::Timestamp { row, .. }
            | ParseError::MissingCustomer { row }
            | ParseError::Malformed { row, .. } => *row,
        }
    }
}

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Cohort {cohort} has no customers at index 1; retention is undefined")]
    Computation { cohort: String },

    #[error("Insufficient data for RFM {axis}: {reason}")]
    InsufficientData { axis: &'static str, reason: String },

    #[error("Required column '{0}' not found")]
    MissingColumn(&'static str),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
