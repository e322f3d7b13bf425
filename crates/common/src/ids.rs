//! Type-safe identifier newtypes for certrenew.
//!
//! The authority hands out numeric identifiers for both orders and issued
//! certificates. Keeping them as distinct types prevents passing an order id
//! where a certificate id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a certificate order on the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(i64);

impl OrderId {
    /// Wrap a raw order id
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of an issued (or uploaded) certificate on the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateId(i64);

impl CertificateId {
    /// Wrap a raw certificate id
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CertificateId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Unique id of one trigger run.
///
/// Attached to every log line emitted while sweeping the configured domains,
/// so concurrent per-domain output can be grouped back together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Create a new random run ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
