use crate::domain::ports::{StorefrontEvents, StorefrontGateway};
use crate::domain::product::{Product, ProductDefinition, ProductType};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A product as the simulated store lists it, with a localized decimal price.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CatalogEntry {
    pub id: String,
    #[serde(rename = "type", default)]
    pub product_type: ProductType,
    pub price: Decimal,
    pub currency: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, product_type: ProductType, price: Decimal, currency: &str) -> Self {
        Self {
            id: id.into(),
            product_type,
            price,
            currency: currency.to_string(),
            title: String::new(),
            description: String::new(),
            available: true,
        }
    }

    /// Converts to storefront metadata; the price becomes minor units.
    ///
    /// `None` when the price is negative or its minor units overflow `i64`.
    pub fn to_product(&self) -> Option<Product> {
        let minor = self
            .price
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        if minor.is_sign_negative() && !minor.is_zero() {
            return None;
        }
        Some(Product {
            product_id: self.id.clone(),
            available_to_purchase: self.available,
            price: minor.to_i64()?,
            currency: self.currency.clone(),
            price_string: format!("{} {}", self.currency, self.price),
            title: self.title.clone(),
            description: self.description.clone(),
            product_type: self.product_type,
            payload: None,
        })
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct PendingPurchase {
    pub product_id: String,
    pub transaction_id: String,
    pub receipt: String,
}

#[derive(Default)]
struct StorefrontState {
    catalog: HashMap<String, Product>,
    registered: Vec<ProductDefinition>,
    initialized: bool,
    listener: Option<Arc<dyn StorefrontEvents>>,
    begun: Vec<(String, Option<String>)>,
    acknowledged: Vec<String>,
    unacknowledged: Vec<PendingPurchase>,
    restore_failure: Option<String>,
    next_transaction: u64,
}

/// A storefront simulated in memory.
///
/// The gateway side records every command the coordinator issues. The driver side
/// (`complete_*`, `fail_*`) raises storefront events toward the registered listener,
/// the way a platform store would from its own thread.
#[derive(Default, Clone)]
pub struct InMemoryStorefront {
    state: Arc<Mutex<StorefrontState>>,
}

impl InMemoryStorefront {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let storefront = Self::new();
        for entry in entries {
            storefront.add_product(entry);
        }
        storefront
    }

    fn state(&self) -> MutexGuard<'_, StorefrontState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listener(&self) -> Option<Arc<dyn StorefrontEvents>> {
        self.state().listener.clone()
    }

    /// Lists `entry`, unless its price cannot be expressed in minor units.
    pub fn add_product(&self, entry: CatalogEntry) -> bool {
        let Some(product) = entry.to_product() else {
            tracing::warn!(
                product_id = %entry.id,
                price = %entry.price,
                "rejecting catalog entry with invalid price"
            );
            return false;
        };
        self.state().catalog.insert(product.product_id.clone(), product);
        true
    }

    pub fn has_listener(&self) -> bool {
        self.state().listener.is_some()
    }

    /// Products registered by the last `initialize` that the store also lists.
    pub fn registered_products(&self) -> Vec<Product> {
        let state = self.state();
        state
            .registered
            .iter()
            .filter_map(|def| state.catalog.get(&def.id))
            .cloned()
            .collect()
    }

    pub fn complete_initialization(&self) {
        self.state().initialized = true;
        let products = self.registered_products();
        if let Some(listener) = self.listener() {
            listener.on_initialize_success(products);
        }
    }

    pub fn fail_initialization(&self, reason: &str) {
        if let Some(listener) = self.listener() {
            listener.on_initialize_failed(reason.to_string());
        }
    }

    /// Reports a successful purchase. A transaction id is generated when none is given.
    ///
    /// Returns the transaction id, or `None` if the store does not list the product.
    pub fn complete_purchase(
        &self,
        product_id: &str,
        transaction_id: Option<&str>,
        receipt: &str,
    ) -> Option<String> {
        let (product, pending) = {
            let mut state = self.state();
            let product = state.catalog.get(product_id)?.clone();
            state.next_transaction += 1;
            let transaction_id = match transaction_id {
                Some(id) => id.to_string(),
                None => format!("T{:06}", state.next_transaction),
            };
            let pending = PendingPurchase {
                product_id: product_id.to_string(),
                transaction_id,
                receipt: receipt.to_string(),
            };
            state.unacknowledged.push(pending.clone());
            (product, pending)
        };
        if let Some(listener) = self.listener() {
            listener.on_purchase_success(product, pending.transaction_id.clone(), pending.receipt);
        }
        Some(pending.transaction_id)
    }

    pub fn fail_purchase(&self, product_id: &str, reason: &str) {
        if let Some(listener) = self.listener() {
            listener.on_purchase_failed(product_id.to_string(), reason.to_string());
        }
    }

    pub fn set_restore_failure(&self, reason: Option<&str>) {
        self.state().restore_failure = reason.map(str::to_string);
    }

    /// `(product_id, metadata)` for every `begin_purchase` call, in order.
    pub fn begun_purchases(&self) -> Vec<(String, Option<String>)> {
        self.state().begun.clone()
    }

    pub fn acknowledgements(&self) -> Vec<String> {
        self.state().acknowledged.clone()
    }

    pub fn unacknowledged(&self) -> Vec<PendingPurchase> {
        self.state().unacknowledged.clone()
    }
}

#[async_trait]
impl StorefrontGateway for InMemoryStorefront {
    fn set_listener(&self, listener: Option<Arc<dyn StorefrontEvents>>) {
        self.state().listener = listener;
    }

    fn initialize(&self, definitions: &[ProductDefinition]) {
        let mut state = self.state();
        state.initialized = false;
        state.registered = definitions.to_vec();
    }

    fn find_product(&self, product_id: &str) -> Option<Product> {
        let state = self.state();
        if !state.initialized || !state.registered.iter().any(|def| def.id == product_id) {
            return None;
        }
        state.catalog.get(product_id).cloned()
    }

    fn begin_purchase(&self, product: &Product, metadata: Option<&str>) {
        self.state()
            .begun
            .push((product.product_id.clone(), metadata.map(str::to_string)));
    }

    fn acknowledge(&self, product_id: &str, transaction_id: &str) {
        let mut state = self.state();
        state.acknowledged.push(product_id.to_string());
        state
            .unacknowledged
            .retain(|p| p.product_id != product_id || p.transaction_id != transaction_id);
    }

    async fn restore(&self) -> Result<(), String> {
        let pending = {
            let state = self.state();
            if let Some(reason) = &state.restore_failure {
                return Err(reason.clone());
            }
            state.unacknowledged.clone()
        };
        let Some(listener) = self.listener() else {
            return Ok(());
        };
        for purchase in pending {
            let product = self.state().catalog.get(&purchase.product_id).cloned();
            if let Some(product) = product {
                listener.on_purchase_success(product, purchase.transaction_id, purchase.receipt);
            }
        }
        Ok(())
    }
}
