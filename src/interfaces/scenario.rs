//! Replays a scripted sequence of application calls and storefront events against a
//! coordinator backed by the in-memory storefront.

use super::csv::report_writer::{ReportRow, ReportWriter};
use super::csv::scenario_reader::Command;
use crate::application::coordinator::{PurchaseCallback, TransactionCoordinator};
use crate::config::CoordinatorConfig;
use crate::domain::notification::Notification;
use crate::domain::product::ProductDefinition;
use crate::domain::transaction::PurchaseResult;
use crate::error::{CoordinatorError, Result};
use crate::infrastructure::notifier::BroadcastNotifier;
use crate::infrastructure::storefront::{CatalogEntry, InMemoryStorefront};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

type Delivered = Arc<Mutex<Vec<PurchaseResult>>>;

pub struct ScenarioRunner<W: Write> {
    coordinator: Arc<TransactionCoordinator>,
    storefront: InMemoryStorefront,
    notifier: BroadcastNotifier,
    definitions: Vec<ProductDefinition>,
    delivered: Delivered,
    subscription: Option<mpsc::UnboundedReceiver<Notification>>,
    report: ReportWriter<W>,
}

impl<W: Write> ScenarioRunner<W> {
    /// Products registered by `initialize` are the configured ones, or the whole
    /// catalog when the configuration lists none.
    pub fn new(config: CoordinatorConfig, catalog: Vec<CatalogEntry>, output: W) -> Self {
        let definitions = if config.products.is_empty() {
            catalog
                .iter()
                .map(|entry| ProductDefinition::new(entry.id.clone(), entry.product_type))
                .collect()
        } else {
            config.products.clone()
        };
        let storefront = InMemoryStorefront::with_catalog(catalog);
        let notifier = BroadcastNotifier::default();
        let coordinator = TransactionCoordinator::new(
            config,
            Arc::new(storefront.clone()),
            Arc::new(notifier.clone()),
        );

        Self {
            coordinator,
            storefront,
            notifier,
            definitions,
            delivered: Arc::default(),
            subscription: None,
            report: ReportWriter::new(output),
        }
    }

    pub fn coordinator(&self) -> &Arc<TransactionCoordinator> {
        &self.coordinator
    }

    fn recorder(&self) -> PurchaseCallback {
        let delivered = Arc::clone(&self.delivered);
        Box::new(move |result: &PurchaseResult| {
            delivered
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(result.clone());
        })
    }

    /// Runs one command, then reports every callback result and notification it produced.
    pub async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Start => self.coordinator.start(),
            Command::Initialize => self.coordinator.initialize_with_products(&self.definitions),
            Command::InitSuccess => self.storefront.complete_initialization(),
            Command::InitFailed { reason } => self.storefront.fail_initialization(&reason),
            Command::Pay {
                product_id,
                metadata,
            } => {
                let callback = self.recorder();
                self.coordinator
                    .pay(&product_id, Some(callback), metadata.as_deref());
            }
            Command::PurchaseSuccess {
                product_id,
                transaction_id,
                receipt,
            } => {
                self.storefront
                    .complete_purchase(&product_id, transaction_id.as_deref(), &receipt)
                    .ok_or_else(|| {
                        CoordinatorError::ScenarioError(format!(
                            "storefront does not list product {product_id}"
                        ))
                    })?;
            }
            Command::PurchaseFailed { product_id, reason } => {
                self.storefront.fail_purchase(&product_id, &reason)
            }
            Command::Tick => self.coordinator.tick(),
            Command::Complete { transaction_id } => {
                self.coordinator.payment_complete(&transaction_id)
            }
            Command::Restore => {
                let outcome = self.coordinator.restore_purchases().await;
                self.report.write_row(&ReportRow::from_restore(&outcome))?;
            }
            Command::Subscribe => {
                if self.subscription.is_none() {
                    self.subscription = Some(self.notifier.subscribe());
                }
            }
            Command::Dispose => self.coordinator.dispose(),
        }
        self.flush_outputs()
    }

    fn flush_outputs(&mut self) -> Result<()> {
        let delivered: Vec<PurchaseResult> = std::mem::take(
            &mut *self
                .delivered
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for result in &delivered {
            self.report.write_row(&ReportRow::from_result("pay", result))?;
        }

        if let Some(rx) = self.subscription.as_mut() {
            while let Ok(notification) = rx.try_recv() {
                self.report
                    .write_row(&ReportRow::from_notification(&notification))?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.report.flush()?;
        self.report.into_inner()
    }
}
