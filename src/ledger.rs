//! Typed ledgers for pending orders and unverified transactions.
//!
//! Reads fail open: a backend fault or a corrupt payload is logged and
//! reported as "no record", so reconciliation never stalls on storage.
//! The cost is that a transiently unreadable order may be re-synthesized
//! as a placeholder.

use tracing::warn;

use crate::config::Config;
use crate::model::{OrderRecord, TransactionRecord};
use crate::store::{SecureRecordStore, StoreError};

fn read_fail_open<R>(result: Result<R, StoreError>) -> Option<R> {
    match result {
        Ok(record) => Some(record),
        Err(e) if e.is_not_found() => None,
        Err(e) => {
            warn!(reason = %e, "treating unreadable record as absent");
            None
        }
    }
}

fn delete_logged(result: Result<(), StoreError>) {
    if let Err(e) = result {
        warn!(reason = %e, "delete failed");
    }
}

/// Pending orders, keyed by product identifier.
#[derive(Clone)]
pub struct OrderLedger {
    store: SecureRecordStore,
    namespace: String,
}

impl OrderLedger {
    pub fn new(store: SecureRecordStore, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn from_config(store: SecureRecordStore, config: &Config) -> Self {
        Self::new(store, config.order_namespace())
    }

    pub fn get_order(&self, product_id: &str) -> Option<OrderRecord> {
        read_fail_open(self.store.get(&self.namespace, product_id))
    }

    pub fn put_order(&self, product_id: &str, order: &OrderRecord) -> Result<(), StoreError> {
        self.store.set(&self.namespace, product_id, order)
    }

    pub fn delete_order(&self, product_id: &str) {
        delete_logged(self.store.delete(&self.namespace, product_id));
    }

    /// Products with a pending order.
    pub fn product_ids(&self) -> Vec<String> {
        read_fail_open(self.store.accounts(&self.namespace)).unwrap_or_default()
    }
}

/// Settled transactions awaiting verification, keyed by transaction identifier.
#[derive(Clone)]
pub struct TransactionLedger {
    store: SecureRecordStore,
    namespace: String,
}

impl TransactionLedger {
    pub fn new(store: SecureRecordStore, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn from_config(store: SecureRecordStore, config: &Config) -> Self {
        Self::new(store, config.transaction_namespace())
    }

    pub fn get_transaction(&self, transaction_id: &str) -> Option<TransactionRecord> {
        read_fail_open(self.store.get(&self.namespace, transaction_id))
    }

    pub fn put_transaction(
        &self,
        transaction_id: &str,
        record: &TransactionRecord,
    ) -> Result<(), StoreError> {
        self.store.set(&self.namespace, transaction_id, record)
    }

    pub fn delete_transaction(&self, transaction_id: &str) {
        delete_logged(self.store.delete(&self.namespace, transaction_id));
    }

    /// Transactions still awaiting a definitive verification outcome.
    pub fn transaction_ids(&self) -> Vec<String> {
        read_fail_open(self.store.accounts(&self.namespace)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryBackend, StoreBackend};
    use std::sync::Arc;

    fn ledgers() -> (Arc<MemoryBackend>, OrderLedger, TransactionLedger) {
        let backend = Arc::new(MemoryBackend::new());
        let store = SecureRecordStore::new(backend.clone());
        let config = Config::default();
        (
            backend,
            OrderLedger::from_config(store.clone(), &config),
            TransactionLedger::from_config(store, &config),
        )
    }

    #[test]
    fn order_ledger_keys_by_product() {
        let (_, orders, _) = ledgers();
        let order = OrderRecord::new("u1", "o1", "sku1");
        orders.put_order("sku1", &order).unwrap();

        assert_eq!(orders.get_order("sku1"), Some(order));
        assert_eq!(orders.get_order("sku2"), None);
        assert_eq!(orders.product_ids(), vec!["sku1"]);

        orders.delete_order("sku1");
        assert_eq!(orders.get_order("sku1"), None);
    }

    #[test]
    fn ledgers_do_not_share_keys() {
        let (_, orders, transactions) = ledgers();
        orders
            .put_order("k", &OrderRecord::new("u1", "o1", "k"))
            .unwrap();
        assert_eq!(transactions.get_transaction("k"), None);
        assert!(transactions.transaction_ids().is_empty());
    }

    #[test]
    fn corrupt_transaction_reads_as_absent() {
        let (backend, _, transactions) = ledgers();
        backend
            .write(&Config::default().transaction_namespace(), "t1", b"{oops")
            .unwrap();
        assert_eq!(transactions.get_transaction("t1"), None);
    }

    #[test]
    fn deleting_missing_transaction_is_silent() {
        let (_, _, transactions) = ledgers();
        transactions.delete_transaction("t404");
        assert_eq!(transactions.get_transaction("t404"), None);
    }
}
