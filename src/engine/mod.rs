//! Purchase reconciliation engine.
//!
//! The engine consumes storefront transaction batches and keeps the order and
//! transaction ledgers consistent with them:
//! - purchased/restored: resolve the order, promote it to a transaction record,
//!   acknowledge, then hand the record to the verification oracle
//! - failed: drop the pending order and acknowledge
//! - purchasing/deferred: wait for the next event
//!
//! Every local storage fault degrades to "record absent"; the storefront's
//! redelivery is the backstop. Batches are processed one at a time, to
//! completion, so the engine needs no internal locking.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_UNKNOWN_USER;
use crate::delegate::StoreDelegate;
use crate::ledger::{OrderLedger, TransactionLedger};
use crate::model::{OrderRecord, StorefrontTransaction, TransactionRecord, TransactionState};
use crate::oracle::{Verification, VerificationOracle};
use crate::storefront::{PaymentQueue, QueueEvent};
use crate::token;

mod batch;
pub use batch::{FailedPurchase, Resolved, ResolvedBatch};

mod error;
pub use error::SkipReason;

pub const NO_RESTORABLE_PURCHASES: &str = "No restorable purchases. Only previously bought \
     non-consumable products and auto-renewable subscriptions can be restored.";

/// Reconciles storefront transaction events against the local ledgers.
pub struct ReconciliationEngine {
    orders: OrderLedger,
    transactions: TransactionLedger,
    queue: Arc<dyn PaymentQueue>,
    oracle: Arc<dyn VerificationOracle>,
    delegate: Arc<dyn StoreDelegate>,
    /// User id stamped on synthesized orders
    unknown_user_id: String,
    /// Records reconciled this session, one per transaction id
    purchased: Vec<TransactionRecord>,
    restored: Vec<TransactionRecord>,
    has_restorable_purchases: bool,
}

/// Public API
impl ReconciliationEngine {
    pub fn new(
        orders: OrderLedger,
        transactions: TransactionLedger,
        queue: Arc<dyn PaymentQueue>,
        oracle: Arc<dyn VerificationOracle>,
        delegate: Arc<dyn StoreDelegate>,
    ) -> Self {
        Self {
            orders,
            transactions,
            queue,
            oracle,
            delegate,
            unknown_user_id: DEFAULT_UNKNOWN_USER.to_string(),
            purchased: Vec::new(),
            restored: Vec::new(),
            has_restorable_purchases: false,
        }
    }

    /// Set the user id used when an order has to be synthesized.
    pub fn with_unknown_user(mut self, user_id: impl Into<String>) -> Self {
        self.unknown_user_id = user_id.into();
        self
    }

    /// Run the engine over the storefront's event stream until it ends.
    pub async fn run(&mut self, mut events: impl Stream<Item = QueueEvent> + Unpin) {
        while let Some(event) = events.next().await {
            match event {
                QueueEvent::Updated(batch) => {
                    self.handle_batch(batch).await;
                }
                QueueEvent::RestoreFinished => self.restore_finished(),
                QueueEvent::RestoreFailed { error, cancelled } => {
                    self.restore_failed(&error, cancelled)
                }
            }
        }
    }

    /// Reconcile one storefront batch end to end.
    ///
    /// Ledger bookkeeping happens first, then the delegate sees the whole
    /// batch, then every terminal transaction is acknowledged exactly once,
    /// and finally purchased/restored records go to the oracle.
    pub async fn handle_batch(&mut self, batch: Vec<StorefrontTransaction>) -> ResolvedBatch {
        let resolved = self.reconcile(batch);
        if resolved.is_empty() {
            return resolved;
        }

        self.delegate.on_batch_resolved(&resolved);

        for item in resolved.iter() {
            self.queue.finish_transaction(item.transaction_id());
            if let Resolved::Failed(failed) = item {
                let reason = failed
                    .error_description
                    .as_deref()
                    .unwrap_or("Storefront error");
                self.delegate
                    .on_message(&format!("{reason}\nproductId: {}", failed.product_id));
            }
        }

        let mut seen = HashSet::new();
        let records: Vec<TransactionRecord> = resolved
            .records()
            .filter(|record| seen.insert(record.transaction_id.as_str()))
            .cloned()
            .collect();
        if !records.is_empty() {
            let verification = self.oracle.verify(&records).await;
            self.apply_verdicts(verification, &records);
        }

        resolved
    }

    /// Apply a verification outcome to the transaction ledger.
    ///
    /// Verified and rejected records are removed; undetermined ones stay for
    /// the next retry. A verdict for a transaction with no record is logged
    /// and otherwise ignored.
    pub fn apply_verification(&mut self, verification: Verification) {
        self.apply_verdicts(verification, &[]);
    }

    /// Send every transaction record still awaiting a verdict back to the oracle.
    ///
    /// Returns how many records were submitted.
    pub async fn reverify_pending(&mut self) -> usize {
        let records: Vec<TransactionRecord> = self
            .transactions
            .transaction_ids()
            .iter()
            .filter_map(|id| self.transactions.get_transaction(id))
            .collect();
        if records.is_empty() {
            return 0;
        }

        let verification = self.oracle.verify(&records).await;
        self.apply_verdicts(verification, &records);
        records.len()
    }

    /// Ask the storefront to redeliver previously completed transactions.
    pub fn restore(&mut self) {
        self.restored.clear();
        self.has_restorable_purchases = false;
        self.queue.restore_completed_transactions();
    }

    /// The storefront finished redelivering restorable transactions.
    pub fn restore_finished(&self) {
        info!("all restorable transactions processed");
        if !self.has_restorable_purchases {
            self.delegate.on_message(NO_RESTORABLE_PURCHASES);
        }
    }

    /// The storefront could not restore. User cancellation is not reported.
    pub fn restore_failed(&self, error_description: &str, cancelled: bool) {
        if !cancelled {
            self.delegate.on_message(error_description);
        }
    }

    pub fn purchased(&self) -> &[TransactionRecord] {
        &self.purchased
    }

    pub fn restored(&self) -> &[TransactionRecord] {
        &self.restored
    }
}

/// Private API
impl ReconciliationEngine {
    fn log_skip(event: &StorefrontTransaction, reason: SkipReason) {
        debug!(
            transaction = ?event.transaction_id,
            product = %event.product_id,
            reason = %reason,
            "event skipped"
        );
    }

    /// Ledger bookkeeping for a batch; no acknowledgement or notification.
    fn reconcile(&mut self, batch: Vec<StorefrontTransaction>) -> ResolvedBatch {
        let mut resolved = ResolvedBatch::default();

        for event in batch {
            if let TransactionState::Purchasing | TransactionState::Deferred = event.state {
                Self::log_skip(&event, SkipReason::InFlight(event.state));
                continue;
            }
            let Some(transaction_id) = event.transaction_id.clone() else {
                Self::log_skip(&event, SkipReason::MissingTransactionId);
                continue;
            };

            match event.state {
                TransactionState::Purchased => {
                    let record = self.promote(&transaction_id, &event);
                    Self::track(&mut self.purchased, &record);
                    resolved.push(Resolved::Purchased(record));
                }
                TransactionState::Restored => {
                    let record = self.promote(&transaction_id, &event);
                    self.has_restorable_purchases = true;
                    Self::track(&mut self.restored, &record);
                    resolved.push(Resolved::Restored(record));
                }
                TransactionState::Failed => {
                    self.orders.delete_order(&event.product_id);
                    info!(
                        transaction = %transaction_id,
                        product = %event.product_id,
                        reason = event.error_description.as_deref().unwrap_or("unknown"),
                        "purchase failed, pending order dropped"
                    );
                    resolved.push(Resolved::Failed(FailedPurchase {
                        transaction_id,
                        product_id: event.product_id,
                        error_description: event.error_description,
                    }));
                }
                TransactionState::Purchasing | TransactionState::Deferred => {}
            }
        }

        resolved
    }

    /// Turn a purchased/restored event into a persisted transaction record.
    ///
    /// An existing record for the same transaction id wins over re-resolving,
    /// so redelivery never produces a second, different placeholder.
    /// The transaction record is written before the order is deleted.
    fn promote(&self, transaction_id: &str, event: &StorefrontTransaction) -> TransactionRecord {
        if let Some(existing) = self.transactions.get_transaction(transaction_id) {
            info!(transaction = %transaction_id, product = %event.product_id, "redelivered transaction, reusing record");
            // crash between write and delete left the order behind
            if self.orders.get_order(&event.product_id).as_ref() == Some(&existing.order) {
                self.orders.delete_order(&event.product_id);
            }
            return existing;
        }

        let order = self.resolve_order(event);
        let record = TransactionRecord::new(order, transaction_id);
        match self.transactions.put_transaction(transaction_id, &record) {
            Ok(()) => {
                self.orders.delete_order(&event.product_id);
                info!(
                    transaction = %transaction_id,
                    product = %event.product_id,
                    order = %record.order.order_id,
                    "order promoted to transaction"
                );
            }
            Err(e) => {
                warn!(
                    transaction = %transaction_id,
                    product = %event.product_id,
                    reason = %e,
                    "transaction record not persisted, keeping pending order"
                );
            }
        }
        record
    }

    /// Find the order behind an event: token first, then the order ledger,
    /// then a placeholder for server-side matching.
    fn resolve_order(&self, event: &StorefrontTransaction) -> OrderRecord {
        if let Some(raw) = event.correlation_token.as_deref().filter(|t| !t.is_empty()) {
            match token::decode(raw) {
                Ok(order) => {
                    if order.product_id != event.product_id {
                        warn!(
                            token_product = %order.product_id,
                            event_product = %event.product_id,
                            "correlation token names a different product, using token"
                        );
                    }
                    return order;
                }
                Err(e) => {
                    warn!(product = %event.product_id, reason = %e, "ignoring undecodable correlation token");
                }
            }
        }

        if let Some(order) = self.orders.get_order(&event.product_id) {
            return order;
        }

        warn!(
            transaction = ?event.transaction_id,
            product = %event.product_id,
            "no order found, synthesizing placeholder"
        );
        OrderRecord::placeholder(self.unknown_user_id.as_str(), event.product_id.as_str())
    }

    /// Verdicts go to the ledger record first. `submitted` covers records the
    /// oracle saw but the ledger never persisted.
    fn apply_verdicts(&self, verification: Verification, submitted: &[TransactionRecord]) {
        let submitted_product = |transaction_id: &str| {
            submitted
                .iter()
                .find(|record| record.transaction_id == transaction_id)
                .map(|record| record.order.product_id.clone())
        };

        for transaction_id in &verification.verified {
            let Some(product) = self
                .settle(transaction_id)
                .or_else(|| submitted_product(transaction_id.as_str()))
            else {
                continue;
            };
            let label = if self.was_restored(transaction_id) {
                "Restored"
            } else {
                "Verified"
            };
            self.delegate
                .on_message(&format!("{label}\nproductId: {product}"));
        }

        for transaction_id in &verification.rejected {
            let Some(product) = self
                .settle(transaction_id)
                .or_else(|| submitted_product(transaction_id.as_str()))
            else {
                continue;
            };
            self.delegate
                .on_message(&format!("Verification failed\nproductId: {product}"));
        }

        for transaction_id in &verification.undetermined {
            let Some(product) = self
                .transactions
                .get_transaction(transaction_id)
                .map(|record| record.order.product_id)
                .or_else(|| submitted_product(transaction_id.as_str()))
            else {
                debug!(transaction = %transaction_id, "undetermined verdict for unknown transaction");
                continue;
            };
            info!(transaction = %transaction_id, product = %product, "verification undetermined, keeping record");
            self.delegate
                .on_message(&format!("Could not verify\nproductId: {product}"));
        }
    }

    /// Remove a definitively verified record, returning its product id.
    ///
    /// `None` when there is no record, e.g. a repeated verdict.
    fn settle(&self, transaction_id: &str) -> Option<String> {
        let Some(record) = self.transactions.get_transaction(transaction_id) else {
            debug!(transaction = %transaction_id, "no record to settle");
            return None;
        };
        self.transactions.delete_transaction(transaction_id);
        info!(transaction = %transaction_id, product = %record.order.product_id, "transaction settled");
        Some(record.order.product_id)
    }

    fn track(session: &mut Vec<TransactionRecord>, record: &TransactionRecord) {
        if !session
            .iter()
            .any(|seen| seen.transaction_id == record.transaction_id)
        {
            session.push(record.clone());
        }
    }

    /// Only this session's restores count. A restored record verified after
    /// a restart (through [`Self::reverify_pending`]) is labelled "Verified".
    fn was_restored(&self, transaction_id: &str) -> bool {
        self.restored
            .iter()
            .any(|record| record.transaction_id == transaction_id)
    }
}
