//! Core domain types for purchase reconciliation.

use serde::{Deserialize, Serialize};

/// A payment request that has been handed to the storefront but not yet settled.
///
/// Field names follow the platform's camelCase so payloads written by other
/// clients of the same ledger stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Identity of the purchasing user at request time.
    #[serde(rename = "uid")]
    pub user_id: String,
    /// Logical order identifier. Empty when the order was synthesized.
    #[serde(rename = "orderId")]
    pub order_id: String,
    /// Catalog identifier being purchased.
    #[serde(rename = "productId")]
    pub product_id: String,
}

impl OrderRecord {
    pub fn new(
        user_id: impl Into<String>,
        order_id: impl Into<String>,
        product_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            order_id: order_id.into(),
            product_id: product_id.into(),
        }
    }

    /// Order synthesized for a transaction whose real order was lost.
    ///
    /// The empty order id flags it for server-side matching by user id.
    pub fn placeholder(user_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self::new(user_id, String::new(), product_id)
    }

    pub fn is_placeholder(&self) -> bool {
        self.order_id.is_empty()
    }
}

/// A settled storefront transaction awaiting server-side verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "orderItem")]
    pub order: OrderRecord,
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
}

impl TransactionRecord {
    pub fn new(order: OrderRecord, transaction_id: impl Into<String>) -> Self {
        Self {
            order,
            transaction_id: transaction_id.into(),
        }
    }

    pub fn product_id(&self) -> &str {
        &self.order.product_id
    }
}

/// Lifecycle state reported by the storefront for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Payment is being negotiated.
    Purchasing,
    /// Awaiting an outside action (e.g. parental approval).
    Deferred,
    Purchased,
    Failed,
    Restored,
}

impl TransactionState {
    /// Terminal states must be acknowledged back to the storefront.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Purchased | Self::Failed | Self::Restored)
    }
}

/// A transaction-state-change event emitted by the storefront queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorefrontTransaction {
    /// Storefront-assigned identifier; absent while still negotiating.
    pub transaction_id: Option<String>,
    pub product_id: String,
    /// Encoded [`OrderRecord`] round-tripped through the payment request.
    pub correlation_token: Option<String>,
    pub state: TransactionState,
    pub error_description: Option<String>,
}

impl StorefrontTransaction {
    pub fn new(
        transaction_id: Option<&str>,
        product_id: impl Into<String>,
        state: TransactionState,
    ) -> Self {
        Self {
            transaction_id: transaction_id.map(str::to_owned),
            product_id: product_id.into(),
            correlation_token: None,
            state,
            error_description: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.correlation_token = Some(token.into());
        self
    }

    pub fn with_error(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }
}

/// A payment submitted to the storefront queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub product_id: String,
    pub correlation_token: String,
}
