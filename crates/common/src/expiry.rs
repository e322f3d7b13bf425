//! Renewal decision and deployment naming.
//!
//! Pure functions over a caller-supplied `now`, so the orchestrator and its
//! tests agree on a single clock.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::CertificateRecord;

/// Renew when this many days or fewer remain before expiry
pub const DEFAULT_RENEW_BEFORE_DAYS: f64 = 5.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Why a certificate has to be (re)issued
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RenewalReason {
    /// The authority has no certificate for the deployed name
    NoCertificate,
    /// The certificate expires within the renewal window
    ExpiresSoon { days_remaining: f64 },
    /// The certificate exists but carries no readable expiry
    UnknownExpiry,
}

/// Outcome of comparing a certificate's expiry against the renewal window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RenewalDecision {
    Keep { days_remaining: f64 },
    Renew(RenewalReason),
}

impl RenewalDecision {
    pub fn needs_renewal(&self) -> bool {
        matches!(self, RenewalDecision::Renew(_))
    }
}

/// Days from `now` until `end`, rounded to two decimals.
///
/// Negative once the certificate has expired.
pub fn days_until(end: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (end - now).num_milliseconds() as f64;
    (millis / MILLIS_PER_DAY * 100.0).round() / 100.0
}

/// Decide whether the certificate described by `record` must be renewed.
///
/// Renewal is skipped only when strictly more than `renew_before_days`
/// remain.
pub fn decide(
    record: Option<&CertificateRecord>,
    now: DateTime<Utc>,
    renew_before_days: f64,
) -> RenewalDecision {
    let Some(record) = record else {
        return RenewalDecision::Renew(RenewalReason::NoCertificate);
    };

    match record.expires_at() {
        Some(end) => {
            let days_remaining = days_until(end, now);
            if days_remaining > renew_before_days {
                RenewalDecision::Keep { days_remaining }
            } else {
                RenewalDecision::Renew(RenewalReason::ExpiresSoon { days_remaining })
            }
        }
        None => {
            tracing::warn!(
                certificate_id = ?record.certificate_id,
                end_date = ?record.end_date,
                "Certificate expiry is unreadable, treating as expired"
            );
            RenewalDecision::Renew(RenewalReason::UnknownExpiry)
        }
    }
}

/// Name a freshly issued certificate is deployed under:
/// `{domain}-{YYYY}{MM}{DD}` in UTC.
pub fn deployment_cert_name(domain: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", domain, now.format("%Y%m%d"))
}
