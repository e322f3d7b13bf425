//! Data model shared between the gateway client, the authority client and
//! the renewal orchestrator.
//!
//! Field names follow the wire format of each remote API: the gateway speaks
//! camelCase JSON, the authority speaks PascalCase JSON.

use std::fmt;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::CertificateId;

// ============================================================================
// Gateway model
// ============================================================================

/// Certificate configuration attached to a custom domain.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertConfig {
    /// Name the certificate is registered under on the gateway
    #[serde(default)]
    pub cert_name: String,
    /// PEM-encoded certificate chain
    #[serde(default)]
    pub certificate: String,
    /// PEM-encoded private key
    #[serde(default)]
    pub private_key: String,
}

impl CertConfig {
    /// Create a certificate configuration for deployment
    pub fn new(
        cert_name: impl Into<String>,
        certificate: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            cert_name: cert_name.into(),
            certificate: certificate.into(),
            private_key: private_key.into(),
        }
    }
}

impl fmt::Debug for CertConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertConfig")
            .field("cert_name", &self.cert_name)
            .field("certificate_len", &self.certificate.len())
            .field("has_private_key", &!self.private_key.is_empty())
            .finish()
    }
}

/// A custom domain as the gateway reports it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainBinding {
    /// The custom domain name
    pub domain_name: String,
    /// Currently deployed certificate, if any
    #[serde(default)]
    pub cert_config: Option<CertConfig>,
    /// Served protocol (`HTTP`, `HTTPS` or `HTTP,HTTPS`)
    #[serde(default)]
    pub protocol: Option<String>,
    /// Last modification time as reported by the gateway
    #[serde(default)]
    pub last_modified_time: Option<String>,
}

impl DomainBinding {
    /// Name of the currently deployed certificate.
    ///
    /// Returns `None` when no certificate is bound or the name is blank.
    pub fn cert_name(&self) -> Option<&str> {
        self.cert_config
            .as_ref()
            .map(|c| c.cert_name.as_str())
            .filter(|name| !name.is_empty())
    }
}

// ============================================================================
// Authority model
// ============================================================================

/// Method used to prove control of a domain during issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationType {
    /// Place a file under `/.well-known/` on the domain
    File,
    /// Publish a DNS record
    #[default]
    Dns,
}

impl ValidationType {
    /// Wire representation expected by the authority
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationType::File => "FILE",
            ValidationType::Dns => "DNS",
        }
    }
}

impl fmt::Display for ValidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An existing certificate known to the authority.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CertificateRecord {
    #[serde(default)]
    pub certificate_id: Option<CertificateId>,
    #[serde(default)]
    pub common_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Expiry date, `YYYY-MM-DD`
    #[serde(default)]
    pub end_date: Option<String>,
    /// Expiry as epoch milliseconds
    #[serde(default)]
    pub cert_end_time: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl CertificateRecord {
    /// Expiry instant of this certificate.
    ///
    /// Prefers the millisecond timestamp and falls back to parsing the date
    /// string. A bare date is taken as midnight UTC.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if let Some(ms) = self.cert_end_time {
            if let Some(ts) = Utc.timestamp_millis_opt(ms).single() {
                return Some(ts);
            }
        }

        let raw = self.end_date.as_deref()?.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt))
    }
}

/// Lifecycle state of a certificate order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Payed,
    Checking,
    CheckedFail,
    DomainVerify,
    Process,
    VerifyFail,
    /// The certificate has been issued
    Certificate,
    #[serde(other)]
    Unknown,
}

impl OrderState {
    /// The authority has issued the certificate
    pub fn is_issued(&self) -> bool {
        matches!(self, OrderState::Certificate)
    }

    /// The order will never be issued without manual intervention
    pub fn is_failed(&self) -> bool {
        matches!(self, OrderState::VerifyFail | OrderState::CheckedFail)
    }

    /// Domain control has to be demonstrated before issuance continues
    pub fn awaits_validation(&self) -> bool {
        matches!(self, OrderState::DomainVerify)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderState::Payed => "payed",
            OrderState::Checking => "checking",
            OrderState::CheckedFail => "checked_fail",
            OrderState::DomainVerify => "domain_verify",
            OrderState::Process => "process",
            OrderState::VerifyFail => "verify_fail",
            OrderState::Certificate => "certificate",
            OrderState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Status of a certificate order, including validation material and,
/// once issued, the certificate itself.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderStatus {
    #[serde(rename = "Type")]
    pub state: OrderState,
    #[serde(default)]
    pub validate_type: Option<ValidationType>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub record_type: Option<String>,
    #[serde(default)]
    pub record_domain: Option<String>,
    #[serde(default)]
    pub record_value: Option<String>,
    /// Path the validation file must be served under
    #[serde(default)]
    pub uri: Option<String>,
    /// Content of the validation file
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
}

impl OrderStatus {
    /// Status with only a state, as seen while the order is in progress
    pub fn with_state(state: OrderState) -> Self {
        Self {
            state,
            validate_type: None,
            domain: None,
            record_type: None,
            record_domain: None,
            record_value: None,
            uri: None,
            content: None,
            certificate: None,
            private_key: None,
        }
    }

    /// Extract the issued certificate/key pair.
    ///
    /// Returns `None` unless the order is issued and both PEM blobs are
    /// present.
    pub fn issued(&self) -> Option<IssuedCertificate> {
        if !self.state.is_issued() {
            return None;
        }
        let certificate = self.certificate.as_ref().filter(|c| !c.is_empty())?;
        let private_key = self.private_key.as_ref().filter(|k| !k.is_empty())?;
        Some(IssuedCertificate {
            certificate: certificate.clone(),
            private_key: private_key.clone(),
        })
    }
}

impl fmt::Debug for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderStatus")
            .field("state", &self.state)
            .field("validate_type", &self.validate_type)
            .field("domain", &self.domain)
            .field("uri", &self.uri)
            .field("record_domain", &self.record_domain)
            .field("has_certificate", &self.certificate.is_some())
            .field("has_private_key", &self.private_key.is_some())
            .finish()
    }
}

/// Certificate and key returned by an issued order.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub certificate: String,
    pub private_key: String,
}

impl fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("certificate_len", &self.certificate.len())
            .finish_non_exhaustive()
    }
}

/// Full certificate detail, used for diagnostics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CertificateDetail {
    #[serde(default)]
    pub id: Option<CertificateId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub common: Option<String>,
    #[serde(default)]
    pub sans: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub expired: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_binding_from_gateway_json() {
        let json = r#"{
            "domainName": "www.dnote.cn",
            "protocol": "HTTP,HTTPS",
            "certConfig": {
                "certName": "www.dnote.cn-20240305",
                "certificate": "-----BEGIN CERTIFICATE-----"
            },
            "lastModifiedTime": "2024-03-05T08:00:00Z"
        }"#;

        let binding: DomainBinding = serde_json::from_str(json).unwrap();
        assert_eq!(binding.domain_name, "www.dnote.cn");
        assert_eq!(binding.cert_name(), Some("www.dnote.cn-20240305"));
        assert_eq!(binding.protocol.as_deref(), Some("HTTP,HTTPS"));
    }

    #[test]
    fn test_domain_binding_without_certificate() {
        let binding: DomainBinding =
            serde_json::from_str(r#"{"domainName": "api.example.com"}"#).unwrap();
        assert_eq!(binding.cert_name(), None);

        let blank: DomainBinding = serde_json::from_str(
            r#"{"domainName": "api.example.com", "certConfig": {"certName": ""}}"#,
        )
        .unwrap();
        assert_eq!(blank.cert_name(), None);
    }

    #[test]
    fn test_cert_config_serializes_camel_case() {
        let config = CertConfig::new("name", "cert", "key");
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["certName"], "name");
        assert_eq!(value["privateKey"], "key");
    }

    #[test]
    fn test_cert_config_debug_hides_key() {
        let config = CertConfig::new("name", "cert", "super-secret-key");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-key"));
    }

    #[test]
    fn test_record_expiry_prefers_timestamp() {
        let record = CertificateRecord {
            end_date: Some("2030-01-01".to_string()),
            cert_end_time: Some(1_709_596_800_000),
            ..Default::default()
        };
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        assert_eq!(record.expires_at(), Some(expected));
    }

    #[test]
    fn test_record_expiry_from_date_string() {
        let record = CertificateRecord {
            end_date: Some("2024-03-10".to_string()),
            ..Default::default()
        };
        let expected = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        assert_eq!(record.expires_at(), Some(expected));

        let garbage = CertificateRecord {
            end_date: Some("next tuesday".to_string()),
            ..Default::default()
        };
        assert_eq!(garbage.expires_at(), None);
    }

    #[test]
    fn test_order_status_states() {
        let status: OrderStatus =
            serde_json::from_str(r#"{"Type": "domain_verify", "ValidateType": "FILE"}"#).unwrap();
        assert!(status.state.awaits_validation());
        assert_eq!(status.validate_type, Some(ValidationType::File));

        let unknown: OrderStatus = serde_json::from_str(r#"{"Type": "brand_new"}"#).unwrap();
        assert_eq!(unknown.state, OrderState::Unknown);
        assert!(!unknown.state.is_issued());
        assert!(!unknown.state.is_failed());
    }

    #[test]
    fn test_issued_requires_certificate_and_key() {
        let mut status: OrderStatus = serde_json::from_str(
            r#"{"Type": "certificate", "Certificate": "CERT", "PrivateKey": "KEY"}"#,
        )
        .unwrap();
        let issued = status.issued().unwrap();
        assert_eq!(issued.certificate, "CERT");
        assert_eq!(issued.private_key, "KEY");

        status.private_key = Some(String::new());
        assert!(status.issued().is_none());

        let pending = OrderStatus::with_state(OrderState::Process);
        assert!(pending.issued().is_none());
    }
}
