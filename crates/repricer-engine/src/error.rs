use thiserror::Error;

use repricer_core::StoreError;
use repricer_shopify::ShopifyError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A running job already occupies the single slot.
    #[error("a price job is already running")]
    AlreadyRunning,

    #[error("invalid {field}: {reason}")]
    InvalidParams {
        field: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("shopify request failed: {0}")]
    Shopify(#[from] ShopifyError),
}

impl EngineError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::InvalidParams {
            field,
            reason: reason.into(),
        }
    }
}
