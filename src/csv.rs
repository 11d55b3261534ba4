use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::ledger::{OrderLedger, TransactionLedger};
use crate::model::{OrderRecord, TransactionState};
use crate::oracle::Verdict;

/// Errors that can occur when reading or writing csv files
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized {column} '{value}'")]
    Unrecognized {
        line: usize,
        column: &'static str,
        value: String,
    },

    #[error("line {line}: {row_type} missing {field}")]
    MissingField {
        line: usize,
        row_type: String,
        field: &'static str,
    },

    #[error("failed to write ledger: {0}")]
    Write(#[from] csv::Error),
}

/// One step of a replay script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Call the issuer for `product`.
    Buy { product: String, order: OrderRecord },
    /// A storefront event. The token is attached by the queue.
    Event {
        transaction_id: Option<String>,
        product: String,
        state: TransactionState,
        error: Option<String>,
    },
    Restore,
    RestoreFinished,
}

#[derive(Debug, Deserialize)]
struct ScriptRow {
    r#type: String,
    product: Option<String>,
    tx: Option<String>,
    user: Option<String>,
    order: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerdictRow {
    tx: String,
    verdict: String,
}

const LEDGER_HEADER: [&str; 6] = ["ledger", "key", "user", "order", "product", "transaction"];

#[derive(Debug, Serialize)]
struct LedgerRow<'a> {
    ledger: &'a str,
    key: &'a str,
    user: &'a str,
    order: &'a str,
    product: &'a str,
    transaction: &'a str,
}

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>, CsvError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })
}

fn parse_state(line: usize, value: &str) -> Result<TransactionState, CsvError> {
    match value {
        "purchasing" => Ok(TransactionState::Purchasing),
        "deferred" => Ok(TransactionState::Deferred),
        "purchased" => Ok(TransactionState::Purchased),
        "failed" => Ok(TransactionState::Failed),
        "restored" => Ok(TransactionState::Restored),
        other => Err(CsvError::Unrecognized {
            line,
            column: "type",
            value: other.to_string(),
        }),
    }
}

fn step_from_row(line: usize, row: ScriptRow) -> Result<ScriptStep, CsvError> {
    let missing = |field| CsvError::MissingField {
        line,
        row_type: row.r#type.clone(),
        field,
    };

    match row.r#type.as_str() {
        "restore" => Ok(ScriptStep::Restore),
        "restore-finished" => Ok(ScriptStep::RestoreFinished),
        "buy" => {
            let product = row.product.clone().ok_or_else(|| missing("product"))?;
            let user = row.user.clone().ok_or_else(|| missing("user"))?;
            let order = OrderRecord::new(user, row.order.clone().unwrap_or_default(), &product);
            Ok(ScriptStep::Buy { product, order })
        }
        state => {
            let state = parse_state(line, state)?;
            let product = row.product.clone().ok_or_else(|| missing("product"))?;
            Ok(ScriptStep::Event {
                transaction_id: row.tx,
                product,
                state,
                error: row.error,
            })
        }
    }
}

/// Read a replay script: `type,product,tx,user,order,error`
pub fn read_script(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<ScriptStep, CsvError>>, CsvError> {
    let reader = open(path.as_ref())?;

    Ok(reader
        .into_deserialize::<ScriptRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            step_from_row(line, row)
        }))
}

/// Read oracle verdicts: `tx,verdict`
pub fn read_verdicts(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<(String, Verdict), CsvError>>, CsvError> {
    let reader = open(path.as_ref())?;

    Ok(reader
        .into_deserialize::<VerdictRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2;
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            let verdict = match row.verdict.as_str() {
                "verified" => Verdict::Verified,
                "rejected" => Verdict::Rejected,
                "undetermined" => Verdict::Undetermined,
                other => {
                    return Err(CsvError::Unrecognized {
                        line,
                        column: "verdict",
                        value: other.to_string(),
                    });
                }
            };
            Ok((row.tx, verdict))
        }))
}

/// Write both ledgers in csv format: pending orders first, then transactions
pub fn write_ledger(
    orders: &OrderLedger,
    transactions: &TransactionLedger,
    out: impl io::Write,
) -> Result<(), CsvError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    writer.write_record(LEDGER_HEADER)?;

    for product in orders.product_ids() {
        let Some(order) = orders.get_order(&product) else {
            continue;
        };
        writer.serialize(LedgerRow {
            ledger: "order",
            key: &product,
            user: &order.user_id,
            order: &order.order_id,
            product: &order.product_id,
            transaction: "",
        })?;
    }

    for transaction_id in transactions.transaction_ids() {
        let Some(record) = transactions.get_transaction(&transaction_id) else {
            continue;
        };
        writer.serialize(LedgerRow {
            ledger: "transaction",
            key: &transaction_id,
            user: &record.order.user_id,
            order: &record.order.order_id,
            product: &record.order.product_id,
            transaction: &record.transaction_id,
        })?;
    }

    writer.flush().map_err(|e| CsvError::Write(e.into()))?;
    Ok(())
}
