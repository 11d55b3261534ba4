//! Reasons a storefront event is not reconciled.

use thiserror::Error;

use crate::model::TransactionState;

/// Why [`ReconciliationEngine`](super::ReconciliationEngine) left an event alone.
///
/// None of these are surfaced to the delegate; they only reach the log.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SkipReason {
    #[error("transaction has no identifier yet")]
    MissingTransactionId,

    #[error("transaction is still {0:?}")]
    InFlight(TransactionState),
}
