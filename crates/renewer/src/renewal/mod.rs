//! Certificate renewal
//!
//! # Architecture
//!
//! - [`RenewalOrchestrator`] - Decides whether a domain needs a new
//!   certificate and drives issuance through to deployment
//! - [`ValidationStrategy`] - Demonstrates domain control while an order
//!   waits for validation
//! - [`RenewalScheduler`] - Background loop for daemon mode
//!
//! # Renewal Flow
//!
//! 1. The gateway reports which certificate the custom domain serves
//! 2. The authority reports when that certificate expires
//! 3. Within the renewal window, a new order is created for the domain
//! 4. The order is polled until issued, validating the domain when asked
//! 5. The certificate and key are deployed as `{domain}-{YYYYMMDD}`
//! 6. The binding is read back to confirm the new certificate is live

mod error;
mod orchestrator;
mod scheduler;
mod validation;

pub use error::RenewError;
pub use orchestrator::{reason_label, RenewalOrchestrator, RenewalOutcome, RenewalPolicy};
pub use scheduler::{RenewalScheduler, DEFAULT_CHECK_INTERVAL, MIN_CHECK_INTERVAL};
pub use validation::{resolve_path, ValidationError, ValidationOutcome, ValidationStrategy};
