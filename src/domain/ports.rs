use super::notification::Notification;
use super::product::{Product, ProductDefinition};
use async_trait::async_trait;
use std::sync::Arc;

/// Inbound events raised by the storefront, one handler per event.
///
/// The storefront may call these from any thread.
pub trait StorefrontEvents: Send + Sync {
    fn on_initialize_success(&self, products: Vec<Product>);
    fn on_initialize_failed(&self, reason: String);
    fn on_purchase_success(&self, product: Product, transaction_id: String, raw_receipt: String);
    fn on_purchase_failed(&self, product_id: String, reason: String);
}

/// Facade over the platform storefront.
#[async_trait]
pub trait StorefrontGateway: Send + Sync {
    /// Registers (or, with `None`, removes) the receiver of storefront events.
    fn set_listener(&self, listener: Option<Arc<dyn StorefrontEvents>>);
    fn initialize(&self, definitions: &[ProductDefinition]);
    fn find_product(&self, product_id: &str) -> Option<Product>;
    fn begin_purchase(&self, product: &Product, metadata: Option<&str>);
    /// Confirms delivery. Stores address this by product; `transaction_id` names the
    /// purchase for stores that keep several pending per product.
    fn acknowledge(&self, product_id: &str, transaction_id: &str);
    /// Resolves once the storefront finished restoring; `Err` carries its reason.
    async fn restore(&self) -> Result<(), String>;
}

/// Extracts a normalized receipt token from a raw storefront receipt.
pub trait ReceiptValidator: Send + Sync {
    /// `None` means no normalization is available; callers fall back to the raw receipt.
    fn normalize(&self, raw_receipt: &str) -> Option<String>;
}

/// Receives notifications the application did not request directly.
///
/// The coordinator publishes while holding its state lock, so implementations must
/// not block or call back into the coordinator.
pub trait NotificationSink: Send + Sync {
    /// Returns whether any subscriber accepted the notification.
    fn publish(&self, notification: Notification) -> bool;
}

pub type StorefrontGatewayRef = Arc<dyn StorefrontGateway>;
pub type ReceiptValidatorBox = Box<dyn ReceiptValidator>;
pub type NotificationSinkRef = Arc<dyn NotificationSink>;
