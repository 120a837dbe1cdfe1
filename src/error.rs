use thiserror::Error;

/// Failures reported to the application through the result channel.
///
/// These never escape `pay` or `restore_purchases` as panics or `Err` from the
/// coordinator itself; they travel inside a [`PurchaseResult`](crate::domain::transaction::PurchaseResult)
/// or as the value of the restore future.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PurchaseError {
    #[error("IAP not inited")]
    NotReady,
    #[error("Is paying")]
    Busy,
    #[error("Invalid product: {0}")]
    InvalidProduct(String),
    #[error("{reason}")]
    Failed { reason: String },
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),
    #[error("Timeout")]
    Timeout,
}

impl PurchaseError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
    #[error("Invalid scenario row: {0}")]
    ScenarioError(String),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
