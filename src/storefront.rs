//! The storefront payment queue: commands we send and callbacks it delivers.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::model::{PaymentRequest, StorefrontTransaction, TransactionState};

/// Callbacks delivered by the storefront payment queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// Transactions changed state. Delivered in batches.
    Updated(Vec<StorefrontTransaction>),
    /// Every restorable transaction has been redelivered.
    RestoreFinished,
    RestoreFailed { error: String, cancelled: bool },
}

/// Commands accepted by the storefront payment queue.
pub trait PaymentQueue: Send + Sync {
    /// Whether the platform currently allows payments.
    fn can_make_payments(&self) -> bool;

    fn submit(&self, payment: PaymentRequest);

    /// Remove a terminal transaction from the redelivery queue.
    fn finish_transaction(&self, transaction_id: &str);

    fn restore_completed_transactions(&self);
}

#[derive(Debug, Default)]
struct QueueLog {
    submitted: Vec<PaymentRequest>,
    finished: Vec<String>,
    restore_requests: usize,
    /// Token of the latest submission per product, until it settles.
    outstanding: HashMap<String, String>,
}

/// In-process queue that records every command it receives.
///
/// Used by the replay binary and by tests. It also plays the event side:
/// [`SimulatedQueue::event`] builds a storefront event carrying the token
/// submitted for that product, the way the platform round-trips it.
#[derive(Debug)]
pub struct SimulatedQueue {
    authorized: bool,
    log: Mutex<QueueLog>,
}

impl SimulatedQueue {
    pub fn new() -> Self {
        Self::with_authorization(true)
    }

    pub fn with_authorization(authorized: bool) -> Self {
        Self {
            authorized,
            log: Mutex::new(QueueLog::default()),
        }
    }

    /// Build a storefront event for `product_id`.
    ///
    /// Terminal events consume the outstanding token for the product.
    pub fn event(
        &self,
        transaction_id: Option<&str>,
        product_id: &str,
        state: TransactionState,
    ) -> StorefrontTransaction {
        let mut log = self.log.lock();
        let token = if state.is_terminal() {
            log.outstanding.remove(product_id)
        } else {
            log.outstanding.get(product_id).cloned()
        };

        let event = StorefrontTransaction::new(transaction_id, product_id, state);
        match token {
            Some(token) => event.with_token(token),
            None => event,
        }
    }

    pub fn submitted(&self) -> Vec<PaymentRequest> {
        self.log.lock().submitted.clone()
    }

    /// Every `finish_transaction` call, in order, duplicates included.
    pub fn finished(&self) -> Vec<String> {
        self.log.lock().finished.clone()
    }

    pub fn finish_count(&self, transaction_id: &str) -> usize {
        self.log
            .lock()
            .finished
            .iter()
            .filter(|id| *id == transaction_id)
            .count()
    }

    pub fn restore_requests(&self) -> usize {
        self.log.lock().restore_requests
    }
}

impl Default for SimulatedQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentQueue for SimulatedQueue {
    fn can_make_payments(&self) -> bool {
        self.authorized
    }

    fn submit(&self, payment: PaymentRequest) {
        let mut log = self.log.lock();
        log.outstanding
            .insert(payment.product_id.clone(), payment.correlation_token.clone());
        log.submitted.push(payment);
    }

    fn finish_transaction(&self, transaction_id: &str) {
        self.log.lock().finished.push(transaction_id.to_owned());
    }

    fn restore_completed_transactions(&self) {
        self.log.lock().restore_requests += 1;
    }
}
