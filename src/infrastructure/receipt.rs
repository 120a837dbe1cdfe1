//! Receipt normalization strategies, one per storefront.
//!
//! Receipts arrive in the unified envelope
//! `{"Store": ..., "TransactionID": ..., "Payload": ...}` where the payload format
//! depends on the store.

use crate::config::StoreKind;
use crate::domain::ports::{ReceiptValidator, ReceiptValidatorBox};
use serde::Deserialize;

#[derive(Deserialize)]
struct UnifiedReceipt {
    #[serde(rename = "Payload")]
    payload: String,
}

#[derive(Deserialize)]
struct GooglePayload {
    json: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GooglePurchaseData {
    purchase_token: String,
}

/// Null object: never normalizes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughValidator;

impl ReceiptValidator for PassthroughValidator {
    fn normalize(&self, _raw_receipt: &str) -> Option<String> {
        None
    }
}

/// Extracts the purchase token from a Google Play receipt.
#[derive(Debug, Default, Clone, Copy)]
pub struct GooglePlayValidator;

impl ReceiptValidator for GooglePlayValidator {
    fn normalize(&self, raw_receipt: &str) -> Option<String> {
        let envelope: UnifiedReceipt = serde_json::from_str(raw_receipt).ok()?;
        let payload: GooglePayload = serde_json::from_str(&envelope.payload).ok()?;
        let data: GooglePurchaseData = serde_json::from_str(&payload.json).ok()?;
        Some(data.purchase_token).filter(|token| !token.is_empty())
    }
}

/// Extracts the base64 app receipt from an App Store receipt.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppStoreValidator;

impl ReceiptValidator for AppStoreValidator {
    fn normalize(&self, raw_receipt: &str) -> Option<String> {
        let envelope: UnifiedReceipt = serde_json::from_str(raw_receipt).ok()?;
        Some(envelope.payload).filter(|payload| !payload.is_empty())
    }
}

pub fn validator_for(store: StoreKind) -> ReceiptValidatorBox {
    match store {
        StoreKind::GooglePlay => Box::new(GooglePlayValidator),
        StoreKind::AppStore => Box::new(AppStoreValidator),
        StoreKind::Fake => Box::new(PassthroughValidator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google_receipt(token: &str) -> String {
        let purchase = serde_json::json!({
            "orderId": "GPA.1234",
            "packageName": "com.example.game",
            "productId": "gems",
            "purchaseTime": 1700000000000_i64,
            "purchaseState": 0,
            "purchaseToken": token,
            "acknowledged": false,
        });
        let payload = serde_json::json!({
            "json": purchase.to_string(),
            "signature": "c2ln",
        });
        serde_json::json!({
            "Store": "GooglePlay",
            "TransactionID": "GPA.1234",
            "Payload": payload.to_string(),
        })
        .to_string()
    }

    #[test]
    fn test_google_play_extracts_purchase_token() {
        let receipt = google_receipt("tok-abc");
        assert_eq!(
            GooglePlayValidator.normalize(&receipt).as_deref(),
            Some("tok-abc")
        );
    }

    #[test]
    fn test_google_play_rejects_malformed_receipt() {
        assert_eq!(GooglePlayValidator.normalize("not json"), None);
        assert_eq!(GooglePlayValidator.normalize(&google_receipt("")), None);
        let wrong_payload = r#"{"Store":"GooglePlay","Payload":"{}"}"#;
        assert_eq!(GooglePlayValidator.normalize(wrong_payload), None);
    }

    #[test]
    fn test_app_store_extracts_payload() {
        let receipt = r#"{"Store":"AppleAppStore","TransactionID":"1000","Payload":"MIIT"}"#;
        assert_eq!(AppStoreValidator.normalize(receipt).as_deref(), Some("MIIT"));
        assert_eq!(AppStoreValidator.normalize("MIIT"), None);
    }

    #[test]
    fn test_validator_selection_by_store() {
        let receipt = google_receipt("tok");
        assert_eq!(
            validator_for(StoreKind::GooglePlay).normalize(&receipt).as_deref(),
            Some("tok")
        );
        assert_eq!(validator_for(StoreKind::Fake).normalize(&receipt), None);
    }
}
