//! Purchase lifecycle across issuer, engine and ledgers sharing one store.

use std::sync::Arc;

use iap_ledger::delegate::LogDelegate;
use iap_ledger::oracle::{Verdict, VerdictTable, Verification};
use iap_ledger::storefront::SimulatedQueue;
use iap_ledger::{
    Config, OrderLedger, OrderRecord, PaymentRequestIssuer, ReconciliationEngine,
    SecureRecordStore, TransactionLedger, TransactionRecord, TransactionState,
};

struct Shop {
    orders: OrderLedger,
    transactions: TransactionLedger,
    queue: Arc<SimulatedQueue>,
    issuer: PaymentRequestIssuer,
    engine: ReconciliationEngine,
}

fn shop(store: &SecureRecordStore, oracle: VerdictTable) -> Shop {
    let config = Config::default();
    let orders = OrderLedger::from_config(store.clone(), &config);
    let transactions = TransactionLedger::from_config(store.clone(), &config);
    let queue = Arc::new(SimulatedQueue::new());
    let issuer = PaymentRequestIssuer::new(orders.clone(), queue.clone());
    let engine = ReconciliationEngine::new(
        orders.clone(),
        transactions.clone(),
        queue.clone(),
        Arc::new(oracle),
        Arc::new(LogDelegate),
    );
    Shop {
        orders,
        transactions,
        queue,
        issuer,
        engine,
    }
}

#[tokio::test]
async fn buy_then_purchase_then_redelivery_then_rejection() {
    let store = SecureRecordStore::in_memory();
    let mut shop = shop(&store, VerdictTable::new());
    let order = OrderRecord::new("u1", "o1", "sku1");

    // buy records the pending order
    shop.issuer.buy("sku1", &order).unwrap();
    assert_eq!(shop.orders.get_order("sku1"), Some(order.clone()));

    // purchase settles it into a transaction record
    let event = shop
        .queue
        .event(Some("t1"), "sku1", TransactionState::Purchased);
    assert!(event.correlation_token.is_some());
    shop.engine.handle_batch(vec![event]).await;

    assert_eq!(
        shop.transactions.get_transaction("t1"),
        Some(TransactionRecord::new(order.clone(), "t1"))
    );
    assert_eq!(shop.orders.get_order("sku1"), None);
    assert_eq!(shop.queue.finish_count("t1"), 1);

    // redelivery reuses the record instead of synthesizing a new order
    let redelivered = shop
        .queue
        .event(Some("t1"), "sku1", TransactionState::Purchased);
    assert!(redelivered.correlation_token.is_none());
    shop.engine.handle_batch(vec![redelivered]).await;

    assert_eq!(
        shop.transactions.get_transaction("t1").unwrap().order,
        order
    );
    assert_eq!(shop.queue.finish_count("t1"), 2);

    // a later rejection clears it, and repeating that is harmless
    let rejected = Verification {
        rejected: vec!["t1".to_string()],
        ..Verification::default()
    };
    shop.engine.apply_verification(rejected.clone());
    assert_eq!(shop.transactions.get_transaction("t1"), None);
    shop.engine.apply_verification(rejected);
    assert!(shop.transactions.transaction_ids().is_empty());
}

#[tokio::test]
async fn purchase_without_any_order_is_recovered_as_placeholder() {
    let store = SecureRecordStore::in_memory();
    let mut shop = shop(&store, VerdictTable::new());

    let event = shop
        .queue
        .event(Some("t2"), "sku2", TransactionState::Purchased);
    shop.engine.handle_batch(vec![event]).await;

    let record = shop.transactions.get_transaction("t2").unwrap();
    assert_eq!(record.order.order_id, "");
    assert_eq!(record.order.product_id, "sku2");
    assert_eq!(shop.queue.finish_count("t2"), 1);
}

#[tokio::test]
async fn order_survives_a_restart_between_buy_and_purchase() {
    let store = SecureRecordStore::in_memory();
    let order = OrderRecord::new("u7", "o7", "sku7");

    let before = shop(&store, VerdictTable::new());
    before.issuer.buy("sku7", &order).unwrap();
    drop(before);

    // new process, the platform dropped the token
    let mut after = shop(&store, VerdictTable::new().with("t7", Verdict::Verified));
    let event = after
        .queue
        .event(Some("t7"), "sku7", TransactionState::Purchased);
    assert!(event.correlation_token.is_none());
    let resolved = after.engine.handle_batch(vec![event]).await;

    assert_eq!(resolved.purchased().next().unwrap().order, order);
    assert_eq!(after.orders.get_order("sku7"), None);
    assert_eq!(after.transactions.get_transaction("t7"), None);
}
