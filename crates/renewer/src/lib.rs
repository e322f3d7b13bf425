//! certrenew library
//!
//! Keeps the TLS certificates of function-compute custom domains renewed.
//!
//! - **Gateway**: reads and updates the certificate bound to a custom domain
//! - **Authority**: orders certificates and reports issuance progress
//! - **Renewal**: the state machine that ties both together
//! - **Trigger**: one sweep over all configured domains
//!
//! # Example
//!
//! ```ignore
//! use certrenew::trigger;
//! use certrenew_config::Config;
//!
//! let config = Config::default_embedded()?;
//! trigger::invoke(&config, std::env::vars()).await?;
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod authority;
pub mod gateway;
pub mod openapi;
pub mod renewal;
pub mod trigger;

#[cfg(test)]
mod testing;

// ============================================================================
// Public API Re-exports
// ============================================================================

// Remote clients
pub use authority::{select_certificate, CasClient, CertificateAuthority};
pub use gateway::{DomainGateway, FcClient};
pub use openapi::{OpenApiClient, RemoteError};

// Renewal
pub use renewal::{
    RenewError, RenewalOrchestrator, RenewalOutcome, RenewalPolicy, RenewalScheduler,
    ValidationOutcome, ValidationStrategy,
};

// Trigger
pub use trigger::{
    build_orchestrator, invoke, run_domains, DomainReport, LiveOrchestrator, RunReport,
    TriggerError,
};
