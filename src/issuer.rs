//! Submission of payment requests to the storefront.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::ledger::OrderLedger;
use crate::model::{OrderRecord, PaymentRequest};
use crate::storefront::PaymentQueue;
use crate::token::{self, TokenError};

#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("payments are not authorized on this device")]
    PaymentsNotAuthorized,

    #[error("failed to build correlation token: {0}")]
    Token(#[from] TokenError),
}

/// Records the pending order and hands the payment to the storefront.
#[derive(Clone)]
pub struct PaymentRequestIssuer {
    orders: OrderLedger,
    queue: Arc<dyn PaymentQueue>,
}

impl PaymentRequestIssuer {
    pub fn new(orders: OrderLedger, queue: Arc<dyn PaymentQueue>) -> Self {
        Self { orders, queue }
    }

    /// Buy `product_id` on behalf of `order`.
    ///
    /// An already pending order for the product is left untouched; the
    /// storefront will not run two payments for one product at once, so the
    /// pending order is the one its transaction settles. The order also rides
    /// along in the request as a correlation token.
    pub fn buy(&self, product_id: &str, order: &OrderRecord) -> Result<(), PurchaseError> {
        if !self.queue.can_make_payments() {
            return Err(PurchaseError::PaymentsNotAuthorized);
        }

        let correlation_token = token::encode(order)?;

        if self.orders.get_order(product_id).is_some() {
            info!(product = %product_id, "order already pending, not overwriting");
        } else if let Err(e) = self.orders.put_order(product_id, order) {
            // the token still carries the order
            warn!(product = %product_id, reason = %e, "pending order not persisted");
        }

        self.queue.submit(PaymentRequest {
            product_id: product_id.to_owned(),
            correlation_token,
        });
        info!(product = %product_id, order = %order.order_id, "payment submitted");
        Ok(())
    }
}
