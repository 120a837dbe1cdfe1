use super::product::{Product, ProductType};
use crate::error::PurchaseError;
use serde::{Serialize, Serializer};

/// A completed purchase the application has not acknowledged yet.
#[derive(Debug, Serialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub product_id: String,
    pub transaction_id: String,
    pub price: i64,
    pub currency: String,
    pub receipt: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
}

impl Transaction {
    pub fn new(product: &Product, transaction_id: impl Into<String>, receipt: String) -> Self {
        Self {
            product_id: product.product_id.clone(),
            transaction_id: transaction_id.into(),
            price: product.price,
            currency: product.currency.clone(),
            receipt,
            product_type: product.product_type,
        }
    }
}

/// The success result of the in-flight purchase, waiting for the next tick.
#[derive(Debug, PartialEq, Clone, Default)]
pub enum StagedResult {
    #[default]
    Empty,
    Staged(Transaction),
}

impl StagedResult {
    pub fn is_staged(&self) -> bool {
        matches!(self, Self::Staged(_))
    }

    /// Leaves `Empty` behind and returns what was staged.
    pub fn take(&mut self) -> Option<Transaction> {
        match std::mem::take(self) {
            Self::Staged(tx) => Some(tx),
            Self::Empty => None,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum ResultCode {
    Success,
    Fail,
}

/// Payload handed to every purchase callback.
///
/// `data` holds the serialized transaction on success, or `{"productId": ...}` on failure.
#[derive(Debug, Serialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResult {
    pub success: bool,
    pub plugin_name: String,
    pub code: ResultCode,
    pub data: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<PurchaseError>,
}

fn serialize_error<S>(error: &Option<PurchaseError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match error {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

impl PurchaseResult {
    pub fn succeeded(plugin_name: &str, tx: &Transaction) -> Self {
        Self {
            success: true,
            plugin_name: plugin_name.to_string(),
            code: ResultCode::Success,
            data: serde_json::to_string(tx).unwrap_or_default(),
            error: None,
        }
    }

    pub fn failed(plugin_name: &str, product_id: &str, error: PurchaseError) -> Self {
        Self {
            success: false,
            plugin_name: plugin_name.to_string(),
            code: ResultCode::Fail,
            data: serde_json::json!({ "productId": product_id }).to_string(),
            error: Some(error),
        }
    }

    /// Parses `data` back into the transaction fields, if this is a success result.
    pub fn transaction(&self) -> Option<serde_json::Value> {
        if !self.success {
            return None;
        }
        serde_json::from_str(&self.data).ok()
    }

    pub fn transaction_id(&self) -> Option<String> {
        self.transaction()?
            .get("transactionId")?
            .as_str()
            .map(str::to_string)
    }
}
