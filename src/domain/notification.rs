use super::product::Product;
use super::transaction::Transaction;

/// Lifecycle events published to the application's notification bus.
#[derive(Debug, PartialEq, Clone)]
pub enum Notification {
    InitSuccess(Vec<Product>),
    InitFailed(String),
    /// A successful purchase that no in-flight `pay` was waiting for.
    LostPayment(Transaction),
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitSuccess(_) => "init_success",
            Self::InitFailed(_) => "init_failed",
            Self::LostPayment(_) => "lost_payment",
        }
    }
}
