use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use iap_ledger::delegate::LogDelegate;
use iap_ledger::oracle::{Verdict, VerdictTable};
use iap_ledger::storefront::SimulatedQueue;
use iap_ledger::{
    Config, OrderLedger, OrderRecord, PaymentRequestIssuer, ReconciliationEngine,
    SecureRecordStore, StorefrontTransaction, TransactionLedger, TransactionState,
};
use tokio::runtime::Runtime;

/// Generates storefront batches for benchmarking.
///
/// Pattern per product (repeating):
/// 1. Purchased, with a pending order
/// 2. Purchased, lost order (no order, no token)
/// 3. Failed
pub struct BatchGenerator {
    next_tx_id: u64,
    batch_size: usize,
    batches_left: usize,
}

impl BatchGenerator {
    pub fn new(batches: usize, batch_size: usize) -> Self {
        Self {
            next_tx_id: 1,
            batch_size,
            batches_left: batches,
        }
    }
}

impl Iterator for BatchGenerator {
    type Item = Vec<StorefrontTransaction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.batches_left == 0 {
            return None;
        }
        self.batches_left -= 1;

        let batch = (0..self.batch_size)
            .map(|_| {
                let id = self.next_tx_id;
                self.next_tx_id += 1;
                let tx = format!("t{id}");
                let product = format!("sku{id}");
                let state = if id % 3 == 0 {
                    TransactionState::Failed
                } else {
                    TransactionState::Purchased
                };
                StorefrontTransaction::new(Some(&tx), product, state)
            })
            .collect();
        Some(batch)
    }
}

struct Fixture {
    issuer: PaymentRequestIssuer,
    engine: ReconciliationEngine,
}

fn fixture(oracle: VerdictTable) -> Fixture {
    let store = SecureRecordStore::in_memory();
    let config = Config::default();
    let orders = OrderLedger::from_config(store.clone(), &config);
    let transactions = TransactionLedger::from_config(store, &config);
    let queue = Arc::new(SimulatedQueue::new());
    Fixture {
        issuer: PaymentRequestIssuer::new(orders.clone(), queue.clone()),
        engine: ReconciliationEngine::new(
            orders,
            transactions,
            queue,
            Arc::new(oracle),
            Arc::new(LogDelegate),
        ),
    }
}

/// Pending orders for every product whose id is 1 mod 3.
fn seed_orders(issuer: &PaymentRequestIssuer, count: u64) {
    for id in (1..=count).filter(|id| id % 3 == 1) {
        let product = format!("sku{id}");
        issuer
            .buy(&product, &OrderRecord::new("u", format!("o{id}"), &product))
            .unwrap();
    }
}

fn bench_undetermined(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("undetermined");

    for (batches, size) in [(100usize, 10usize), (10, 100), (1, 1_000)] {
        let label = format!("{batches}b_{size}tx");
        group.bench_with_input(
            BenchmarkId::from_parameter(&label),
            &(batches, size),
            |b, &(batches, size)| {
                b.iter(|| {
                    let mut fx = fixture(VerdictTable::new());
                    seed_orders(&fx.issuer, (batches * size) as u64);
                    runtime.block_on(async {
                        for batch in BatchGenerator::new(batches, size) {
                            black_box(fx.engine.handle_batch(batch).await);
                        }
                    });
                    fx.engine
                });
            },
        );
    }

    group.finish();
}

fn bench_verified(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("verified");

    let count = 1_000u64;
    let oracle: VerdictTable = (1..=count)
        .map(|id| (format!("t{id}"), Verdict::Verified))
        .collect();

    group.bench_function("1k_settled", |b| {
        b.iter(|| {
            let mut fx = fixture(oracle.clone());
            seed_orders(&fx.issuer, count);
            runtime.block_on(async {
                for batch in BatchGenerator::new(10, 100) {
                    black_box(fx.engine.handle_batch(batch).await);
                }
            });
            fx.engine
        });
    });

    group.finish();
}

fn bench_redelivery(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("redelivery");

    // same batch delivered twice; the second pass only hits the reuse path
    group.bench_function("1k_twice", |b| {
        b.iter(|| {
            let mut fx = fixture(VerdictTable::new());
            runtime.block_on(async {
                for _ in 0..2 {
                    for batch in BatchGenerator::new(10, 100) {
                        black_box(fx.engine.handle_batch(batch).await);
                    }
                }
            });
            fx.engine
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_undetermined,
    bench_verified,
    bench_redelivery
);
criterion_main!(benches);
