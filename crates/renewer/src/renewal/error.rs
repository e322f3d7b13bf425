//! Renewal error types.

use thiserror::Error;

use certrenew_common::OrderId;

use super::validation::ValidationError;
use crate::openapi::RemoteError;

/// Errors that end a renewal check for one domain
#[derive(Debug, Error)]
pub enum RenewError {
    #[error("custom domain not found on the gateway: {0}")]
    DomainNotFound(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("order {order_id} was not issued after {attempts} status checks")]
    ValidationTimeout { order_id: OrderId, attempts: u32 },

    #[error("order {order_id} failed domain validation (state {state})")]
    ValidationFailed { order_id: OrderId, state: String },

    #[error("order {order_id} is issued but carries no certificate or private key")]
    IncompleteOrder { order_id: OrderId },

    #[error("domain validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to deploy certificate {cert_name} to {domain}: {source}")]
    DeployFailed {
        domain: String,
        cert_name: String,
        #[source]
        source: RemoteError,
    },

    #[error("certificate {expected} was deployed to {domain} but the gateway reports {actual:?}")]
    DeployNotApplied {
        domain: String,
        expected: String,
        actual: Option<String>,
    },
}

impl RenewError {
    /// Provider diagnostic hint carried by the underlying remote failure
    pub fn recommend(&self) -> Option<&str> {
        match self {
            RenewError::Remote(e) | RenewError::DeployFailed { source: e, .. } => e.recommend(),
            _ => None,
        }
    }
}
