pub mod config;
pub mod csv;
pub mod delegate;
pub mod engine;
pub mod issuer;
pub mod ledger;
pub mod model;
pub mod oracle;
pub mod store;
pub mod storefront;
pub mod token;

pub use config::Config;
pub use engine::ReconciliationEngine;
pub use issuer::PaymentRequestIssuer;
pub use ledger::{OrderLedger, TransactionLedger};
pub use model::{OrderRecord, StorefrontTransaction, TransactionRecord, TransactionState};
pub use store::SecureRecordStore;
