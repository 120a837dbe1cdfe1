use crate::config::{CoordinatorConfig, InitializationPolicy};
use crate::domain::notification::Notification;
use crate::domain::ports::{
    NotificationSinkRef, ReceiptValidatorBox, StorefrontEvents, StorefrontGatewayRef,
};
use crate::domain::product::{Product, ProductDefinition};
use crate::domain::transaction::{PurchaseResult, StagedResult, Transaction};
use crate::error::PurchaseError;
use crate::infrastructure::receipt::validator_for;
use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::broadcast;

/// Invoked once with the outcome of a `pay` request.
pub type PurchaseCallback = Box<dyn FnOnce(&PurchaseResult) + Send>;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Lifecycle {
    #[default]
    Stopped,
    Starting,
    /// Running, but the storefront has not reported a successful initialization.
    Idle,
    /// Running and accepting purchases.
    Enabled,
}

impl Lifecycle {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Idle | Self::Enabled)
    }
}

struct InFlight {
    product_id: String,
    started_at: Instant,
}

#[derive(Default)]
struct CoordinatorState {
    lifecycle: Lifecycle,
    paying: Option<InFlight>,
    pending_callbacks: Vec<PurchaseCallback>,
    pending_result: StagedResult,
    lost_payments: VecDeque<Transaction>,
    transaction_index: HashMap<String, String>,
}

impl CoordinatorState {
    fn is_paying(&self, product_id: &str) -> bool {
        self.paying
            .as_ref()
            .is_some_and(|in_flight| in_flight.product_id == product_id)
    }

    fn check_ready(&self) -> Result<(), PurchaseError> {
        if self.lifecycle != Lifecycle::Enabled {
            return Err(PurchaseError::NotReady);
        }
        if self.paying.is_some() {
            return Err(PurchaseError::Busy);
        }
        Ok(())
    }

    /// Ends the in-flight purchase, returning its callbacks and any staged success.
    fn finish_in_flight(&mut self) -> (Vec<PurchaseCallback>, Option<Transaction>) {
        self.paying = None;
        let staged = self.pending_result.take();
        (std::mem::take(&mut self.pending_callbacks), staged)
    }
}

/// Owns purchase state and correlates storefront events with `pay` requests.
///
/// One purchase may be in flight at a time. Success results are staged and only handed
/// to callbacks from [`tick`](Self::tick), which the host calls from the application's
/// context; failures are delivered straight from the event handler. Purchases that
/// complete with no matching request are published as lost payments, or queued until
/// the next successful initialization when nobody is listening.
///
/// `start` registers the coordinator with the gateway as its event listener, which
/// keeps both alive until `dispose` deregisters it.
pub struct TransactionCoordinator {
    config: CoordinatorConfig,
    gateway: StorefrontGatewayRef,
    validator: ReceiptValidatorBox,
    notifier: NotificationSinkRef,
    state: Mutex<CoordinatorState>,
    completions: broadcast::Sender<String>,
}

impl TransactionCoordinator {
    /// Creates a stopped coordinator using the receipt validator for `config.store`.
    pub fn new(
        config: CoordinatorConfig,
        gateway: StorefrontGatewayRef,
        notifier: NotificationSinkRef,
    ) -> Arc<Self> {
        let validator = validator_for(config.store);
        Self::with_validator(config, gateway, validator, notifier)
    }

    pub fn with_validator(
        config: CoordinatorConfig,
        gateway: StorefrontGatewayRef,
        validator: ReceiptValidatorBox,
        notifier: NotificationSinkRef,
    ) -> Arc<Self> {
        let (completions, _) = broadcast::channel(config.completion_buffer.max(1));
        Arc::new(Self {
            config,
            gateway,
            validator,
            notifier,
            state: Mutex::new(CoordinatorState::default()),
            completions,
        })
    }

    fn state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn plugin_name(&self) -> &str {
        &self.config.plugin_name
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state().lifecycle
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle().is_running()
    }

    pub fn is_enabled(&self) -> bool {
        self.lifecycle() == Lifecycle::Enabled
    }

    pub fn paying_product_id(&self) -> Option<String> {
        self.state().paying.as_ref().map(|p| p.product_id.clone())
    }

    pub fn pending_callback_count(&self) -> usize {
        self.state().pending_callbacks.len()
    }

    pub fn has_staged_result(&self) -> bool {
        self.state().pending_result.is_staged()
    }

    /// Queued lost payments, oldest first.
    pub fn lost_payments(&self) -> Vec<Transaction> {
        self.state().lost_payments.iter().cloned().collect()
    }

    /// Receives the transaction id of every `payment_complete` that reached the storefront.
    ///
    /// The signal is lossy: a receiver more than `completion_buffer` ids behind misses
    /// the oldest ones and gets `RecvError::Lagged`. Acknowledgement itself is unaffected.
    pub fn subscribe_completions(&self) -> broadcast::Receiver<String> {
        self.completions.subscribe()
    }

    pub fn start(self: &Arc<Self>) {
        {
            let mut state = self.state();
            if state.lifecycle != Lifecycle::Stopped {
                tracing::warn!(lifecycle = ?state.lifecycle, "coordinator already started");
                return;
            }
            state.lifecycle = Lifecycle::Starting;
        }

        let listener: Arc<dyn StorefrontEvents> = self.clone();
        self.gateway.set_listener(Some(listener));
        self.state().lifecycle = Lifecycle::Idle;
        tracing::debug!(plugin = %self.config.plugin_name, "coordinator started");

        if self.config.initialization == InitializationPolicy::Eager {
            self.initialize_with_products(&self.config.products);
        }
    }

    /// (Re)initializes the storefront. Purchases are refused until it reports success.
    pub fn initialize_with_products(&self, definitions: &[ProductDefinition]) {
        {
            let mut state = self.state();
            if state.lifecycle == Lifecycle::Enabled {
                state.lifecycle = Lifecycle::Idle;
            }
        }
        tracing::debug!(products = definitions.len(), "initializing storefront");
        self.gateway.initialize(definitions);
    }

    /// Stops the coordinator. Callbacks of an in-flight purchase are dropped uninvoked.
    pub fn dispose(&self) {
        {
            let mut state = self.state();
            state.lifecycle = Lifecycle::Stopped;
            state.transaction_index.clear();
            let (dropped, staged) = state.finish_in_flight();
            if !dropped.is_empty() || staged.is_some() {
                tracing::warn!(
                    callbacks = dropped.len(),
                    staged = staged.is_some(),
                    "disposing with a purchase in flight"
                );
            }
        }
        self.gateway.set_listener(None);
        tracing::debug!("coordinator disposed");
    }

    /// Starts a purchase. Every outcome, including refusal, arrives through `callback`.
    pub fn pay(&self, product_id: &str, callback: Option<PurchaseCallback>, metadata: Option<&str>) {
        let ready = self.state().check_ready();
        if let Err(err) = ready {
            self.reject(product_id, callback, err);
            return;
        }

        let product = match self.gateway.find_product(product_id) {
            Some(product) if product.available_to_purchase => product,
            _ => {
                self.reject(
                    product_id,
                    callback,
                    PurchaseError::InvalidProduct(product_id.to_string()),
                );
                return;
            }
        };

        {
            let mut state = self.state();
            // The storefront lookup ran unlocked; another pay may have won meanwhile.
            if let Err(err) = state.check_ready() {
                drop(state);
                self.reject(product_id, callback, err);
                return;
            }
            state.paying = Some(InFlight {
                product_id: product_id.to_string(),
                started_at: Instant::now(),
            });
            if let Some(callback) = callback {
                state.pending_callbacks.push(callback);
            }
        }

        tracing::info!(product_id, "purchase started");
        self.gateway.begin_purchase(&product, metadata);
    }

    /// Adds another callback to the purchase in flight.
    ///
    /// Returns `false`, dropping the callback, when no purchase is in flight.
    pub fn watch_in_flight(&self, callback: PurchaseCallback) -> bool {
        let mut state = self.state();
        if state.paying.is_none() {
            return false;
        }
        state.pending_callbacks.push(callback);
        true
    }

    fn reject(&self, product_id: &str, callback: Option<PurchaseCallback>, err: PurchaseError) {
        tracing::warn!(product_id, error = %err, "purchase refused");
        if let Some(callback) = callback {
            let result = PurchaseResult::failed(&self.config.plugin_name, product_id, err);
            deliver(vec![callback], &result);
        }
    }

    /// Delivers a staged success to the waiting callbacks. Call from the application's context.
    ///
    /// Also expires the in-flight purchase once `purchase_timeout_ms` has elapsed.
    pub fn tick(&self) {
        let mut state = self.state();
        if let Some(tx) = state.pending_result.take() {
            state.paying = None;
            let callbacks = std::mem::take(&mut state.pending_callbacks);
            drop(state);

            tracing::info!(
                product_id = %tx.product_id,
                transaction_id = %tx.transaction_id,
                "purchase succeeded"
            );
            let result = PurchaseResult::succeeded(&self.config.plugin_name, &tx);
            deliver(callbacks, &result);
            return;
        }

        let Some(timeout) = self.config.purchase_timeout() else {
            return;
        };
        let expired = state
            .paying
            .as_ref()
            .filter(|in_flight| in_flight.started_at.elapsed() >= timeout)
            .map(|in_flight| in_flight.product_id.clone());
        if let Some(product_id) = expired {
            let (callbacks, _) = state.finish_in_flight();
            drop(state);

            tracing::warn!(%product_id, ?timeout, "purchase timed out");
            let result =
                PurchaseResult::failed(&self.config.plugin_name, &product_id, PurchaseError::Timeout);
            deliver(callbacks, &result);
        }
    }

    /// Tells the storefront the application has delivered the goods for `transaction_id`.
    ///
    /// Unknown ids are logged and ignored. Acknowledging the same id again forwards again.
    pub fn payment_complete(&self, transaction_id: &str) {
        let product_id = self.state().transaction_index.get(transaction_id).cloned();
        let Some(product_id) = product_id else {
            let err = PurchaseError::UnknownTransaction(transaction_id.to_string());
            tracing::warn!(error = %err, "cannot acknowledge transaction");
            return;
        };

        self.gateway.acknowledge(&product_id, transaction_id);
        let _ = self.completions.send(transaction_id.to_string());
        tracing::info!(transaction_id, %product_id, "transaction acknowledged");
    }

    /// Asks the storefront to replay previously bought purchases.
    ///
    /// Restored purchases come back as purchase events and, having no matching `pay`,
    /// surface as lost payments.
    pub async fn restore_purchases(&self) -> Result<(), PurchaseError> {
        if !self.is_running() {
            return Err(PurchaseError::NotReady);
        }
        match self.gateway.restore().await {
            Ok(()) => {
                tracing::info!("purchases restored");
                Ok(())
            }
            Err(reason) => {
                tracing::warn!(%reason, "restore failed");
                Err(PurchaseError::failed(reason))
            }
        }
    }

    fn report_lost_payment(&self, tx: Transaction) {
        tracing::info!(
            product_id = %tx.product_id,
            transaction_id = %tx.transaction_id,
            "unmatched purchase"
        );
        // Atomic with respect to the initialization flush.
        let mut state = self.state();
        if !self.notifier.publish(Notification::LostPayment(tx.clone())) {
            state.lost_payments.push_back(tx);
        }
    }
}

impl StorefrontEvents for TransactionCoordinator {
    fn on_initialize_success(&self, products: Vec<Product>) {
        let mut state = self.state();
        if !state.lifecycle.is_running() {
            tracing::debug!("ignoring initialization while stopped");
            return;
        }
        state.lifecycle = Lifecycle::Enabled;

        tracing::debug!(products = products.len(), "storefront initialized");
        self.notifier.publish(Notification::InitSuccess(products));
        if !state.lost_payments.is_empty() {
            tracing::info!(count = state.lost_payments.len(), "recovering lost payments");
        }
        // An entry leaves the queue only once a subscriber has accepted it.
        while let Some(tx) = state.lost_payments.front() {
            if !self.notifier.publish(Notification::LostPayment(tx.clone())) {
                tracing::warn!(
                    remaining = state.lost_payments.len(),
                    "lost payments kept queued, no subscriber"
                );
                break;
            }
            state.lost_payments.pop_front();
        }
    }

    fn on_initialize_failed(&self, reason: String) {
        tracing::warn!(%reason, "storefront initialization failed");
        self.notifier.publish(Notification::InitFailed(reason));
    }

    fn on_purchase_success(&self, product: Product, transaction_id: String, raw_receipt: String) {
        let receipt = self
            .validator
            .normalize(&raw_receipt)
            .unwrap_or(raw_receipt);
        let tx = Transaction::new(&product, transaction_id, receipt);

        {
            let mut state = self.state();
            state
                .transaction_index
                .insert(tx.transaction_id.clone(), tx.product_id.clone());
            if state.is_paying(&tx.product_id) && !state.pending_result.is_staged() {
                tracing::debug!(transaction_id = %tx.transaction_id, "staging purchase result");
                state.pending_result = StagedResult::Staged(tx);
                return;
            }
        }

        self.report_lost_payment(tx);
    }

    fn on_purchase_failed(&self, product_id: String, reason: String) {
        let (callbacks, staged) = {
            let mut state = self.state();
            if !state.is_paying(&product_id) {
                tracing::debug!(%product_id, %reason, "ignoring failure for a purchase not in flight");
                return;
            }
            state.finish_in_flight()
        };

        tracing::info!(%product_id, %reason, "purchase failed");
        let result = PurchaseResult::failed(
            &self.config.plugin_name,
            &product_id,
            PurchaseError::failed(reason),
        );
        deliver(callbacks, &result);

        if let Some(tx) = staged {
            self.report_lost_payment(tx);
        }
    }
}

/// Runs every callback; a panicking callback is logged and does not stop the rest.
fn deliver(callbacks: Vec<PurchaseCallback>, result: &PurchaseResult) {
    for callback in callbacks {
        if catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
            tracing::error!(success = result.success, "purchase callback panicked");
        }
    }
}
