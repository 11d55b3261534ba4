//! Correlation tokens: an [`OrderRecord`] smuggled through the payment request.
//!
//! The encoding is JSON wrapped in standard base64.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::model::OrderRecord;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("token does not hold an order: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn encode(order: &OrderRecord) -> Result<String, TokenError> {
    let json = serde_json::to_vec(order)?;
    Ok(STANDARD.encode(json))
}

pub fn decode(token: &str) -> Result<OrderRecord, TokenError> {
    let bytes = STANDARD.decode(token.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}
