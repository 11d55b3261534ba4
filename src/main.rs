use std::env;
use std::io;
use std::mem;
use std::process::ExitCode;
use std::sync::Arc;

use iap_ledger::csv::{ScriptStep, read_script, read_verdicts, write_ledger};
use iap_ledger::delegate::{ChannelDelegate, Notification};
use iap_ledger::oracle::VerdictTable;
use iap_ledger::store::FileBackend;
use iap_ledger::storefront::SimulatedQueue;
use iap_ledger::{
    Config, OrderLedger, PaymentRequestIssuer, ReconciliationEngine, SecureRecordStore,
    TransactionLedger,
};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: iap-ledger <store-dir> <script.csv> [verdicts.csv]";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let (Some(store_dir), Some(script_path)) = (args.next(), args.next()) else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };
    let verdicts_path = args.next();

    if !script_path.ends_with(".csv") {
        warn!(path = %script_path, "script file seems to not be a csv file");
    }

    let config = Config::from_env();
    let backend = match FileBackend::open(&store_dir) {
        Ok(backend) => backend,
        Err(e) => {
            error!(path = %store_dir, reason = %e, "cannot open store");
            return ExitCode::FAILURE;
        }
    };
    let store = SecureRecordStore::new(Arc::new(backend));
    let orders = OrderLedger::from_config(store.clone(), &config);
    let transactions = TransactionLedger::from_config(store, &config);

    let mut oracle = VerdictTable::new();
    if let Some(path) = verdicts_path {
        match read_verdicts(&path) {
            Ok(rows) => {
                for row in rows {
                    match row {
                        Ok((transaction_id, verdict)) => oracle.insert(transaction_id, verdict),
                        Err(e) => warn!("{e}"),
                    }
                }
            }
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        }
    }

    let steps = match read_script(&script_path) {
        Ok(steps) => steps,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let queue = Arc::new(SimulatedQueue::new());
    let (delegate, mut notifications) = ChannelDelegate::new();
    let issuer = PaymentRequestIssuer::new(orders.clone(), queue.clone());
    let mut engine = ReconciliationEngine::new(
        orders.clone(),
        transactions.clone(),
        queue.clone(),
        Arc::new(oracle),
        Arc::new(delegate),
    )
    .with_unknown_user(config.unknown_user_id.clone());

    // records left unverified by a previous run get another chance
    engine.reverify_pending().await;

    // consecutive event rows form one storefront batch
    let mut batch = Vec::new();
    for step in steps {
        let step = match step {
            Ok(step) => step,
            Err(e) => {
                warn!("{e}");
                continue;
            }
        };

        if let ScriptStep::Event {
            transaction_id,
            product,
            state,
            error,
        } = step
        {
            let event = queue.event(transaction_id.as_deref(), &product, state);
            batch.push(match error {
                Some(description) => event.with_error(description),
                None => event,
            });
            continue;
        }

        if !batch.is_empty() {
            engine.handle_batch(mem::take(&mut batch)).await;
        }

        match step {
            ScriptStep::Buy { product, order } => {
                if let Err(e) = issuer.buy(&product, &order) {
                    warn!(product = %product, "{e}");
                }
            }
            ScriptStep::Restore => engine.restore(),
            ScriptStep::RestoreFinished => engine.restore_finished(),
            ScriptStep::Event { .. } => {}
        }
    }
    if !batch.is_empty() {
        engine.handle_batch(batch).await;
    }

    drop(engine);
    while let Some(notification) = notifications.recv().await {
        if let Notification::Message(text) = notification {
            eprintln!("store: {}", text.replace('\n', " "));
        }
    }

    if let Err(e) = write_ledger(&orders, &transactions, io::stdout().lock()) {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
