#![allow(dead_code)]

use purchase_coordinator::application::coordinator::{PurchaseCallback, TransactionCoordinator};
use purchase_coordinator::config::CoordinatorConfig;
use purchase_coordinator::domain::notification::Notification;
use purchase_coordinator::domain::product::{ProductDefinition, ProductType};
use purchase_coordinator::domain::transaction::PurchaseResult;
use purchase_coordinator::infrastructure::notifier::BroadcastNotifier;
use purchase_coordinator::infrastructure::storefront::{CatalogEntry, InMemoryStorefront};
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub struct Harness {
    pub coordinator: Arc<TransactionCoordinator>,
    pub storefront: InMemoryStorefront,
    pub notifier: BroadcastNotifier,
}

pub fn catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::new("sku1", ProductType::Consumable, dec!(0.99), "USD"),
        CatalogEntry::new("sku2", ProductType::NonConsumable, dec!(4.99), "USD"),
        CatalogEntry::new("sku3", ProductType::Subscription, dec!(9.99), "USD"),
    ]
}

pub fn definitions() -> Vec<ProductDefinition> {
    catalog()
        .into_iter()
        .map(|entry| ProductDefinition::new(entry.id, entry.product_type))
        .collect()
}

pub fn harness_with(config: CoordinatorConfig) -> Harness {
    let storefront = InMemoryStorefront::with_catalog(catalog());
    let notifier = BroadcastNotifier::default();
    let coordinator = TransactionCoordinator::new(
        config,
        Arc::new(storefront.clone()),
        Arc::new(notifier.clone()),
    );
    Harness {
        coordinator,
        storefront,
        notifier,
    }
}

/// A started coordinator with all catalog products registered, not yet enabled.
pub fn started() -> Harness {
    let harness = harness_with(CoordinatorConfig::default());
    harness.coordinator.start();
    harness.coordinator.initialize_with_products(&definitions());
    harness
}

/// A started coordinator whose storefront reported a successful initialization.
pub fn enabled() -> Harness {
    let harness = started();
    harness.storefront.complete_initialization();
    harness
}

pub type Results = Arc<Mutex<Vec<PurchaseResult>>>;

pub fn recorder() -> (Results, PurchaseCallback) {
    let results: Results = Arc::default();
    let sink = Arc::clone(&results);
    let callback: PurchaseCallback = Box::new(move |result: &PurchaseResult| {
        sink.lock().unwrap().push(result.clone());
    });
    (results, callback)
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut received = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        received.push(notification);
    }
    received
}
