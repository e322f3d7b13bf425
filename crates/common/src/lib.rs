//! Common types shared by the certrenew crates.
//!
//! - [`ids`]: identifier newtypes for orders, certificates and trigger runs
//! - [`types`]: wire-level data model of the gateway and the authority
//! - [`expiry`]: renewal decision and deployment naming

pub mod expiry;
pub mod ids;
pub mod types;

pub use expiry::{
    days_until, decide, deployment_cert_name, RenewalDecision, RenewalReason,
    DEFAULT_RENEW_BEFORE_DAYS,
};
pub use ids::{CertificateId, OrderId, RunId};
pub use types::{
    CertConfig, CertificateDetail, CertificateRecord, DomainBinding, IssuedCertificate,
    OrderState, OrderStatus, ValidationType,
};
