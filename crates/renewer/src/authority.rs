//! Certificate authority client.
//!
//! [`CertificateAuthority`] is the seam the orchestrator drives; [`CasClient`]
//! implements it against the certificate service's RPC API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use certrenew_common::{
    CertificateDetail, CertificateId, CertificateRecord, OrderId, OrderStatus, ValidationType,
};
use certrenew_config::{AuthorityConfig, Credentials};

use crate::openapi::{OpenApiClient, RemoteError};

/// Operations the renewal flow needs from a certificate authority
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Order a new certificate for `domain`
    async fn create_order(
        &self,
        domain: &str,
        validation_type: ValidationType,
    ) -> Result<OrderId, RemoteError>;

    /// Current status of an order
    async fn order_status(&self, order_id: OrderId) -> Result<OrderStatus, RemoteError>;

    /// Certificates whose names match `keyword`, in authority order
    async fn list_certificates(&self, keyword: &str) -> Result<Vec<CertificateRecord>, RemoteError>;

    /// Full detail of one certificate
    async fn certificate_detail(
        &self,
        cert_id: CertificateId,
    ) -> Result<CertificateDetail, RemoteError>;

    /// Find the certificate deployed as `name` among the certificates of
    /// `domain`.
    async fn find_certificate(
        &self,
        domain: &str,
        name: &str,
    ) -> Result<Option<CertificateRecord>, RemoteError> {
        let records = self.list_certificates(domain).await?;
        debug!(domain = %domain, candidates = records.len(), "Listed certificates");
        Ok(select_certificate(records, name))
    }
}

/// Pick the record whose common name equals `name`.
///
/// Falls back to the first record when nothing matches and returns `None`
/// for an empty list.
pub fn select_certificate(records: Vec<CertificateRecord>, name: &str) -> Option<CertificateRecord> {
    let position = records
        .iter()
        .position(|r| r.common_name.as_deref() == Some(name));

    match position {
        Some(index) => records.into_iter().nth(index),
        None => {
            if !records.is_empty() {
                debug!(
                    name = %name,
                    fallback = ?records[0].common_name,
                    "No certificate matches the deployed name, using first record"
                );
            }
            records.into_iter().next()
        }
    }
}

// ============================================================================
// Certificate service client
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateOrderResponse {
    order_id: OrderId,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListCertificatesResponse {
    #[serde(default)]
    certificate_order_list: Vec<CertificateRecord>,
}

/// Client for the certificate service API
#[derive(Debug, Clone)]
pub struct CasClient {
    api: OpenApiClient,
}

impl CasClient {
    pub fn new(
        config: &AuthorityConfig,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let endpoint = config.endpoint_url().map_err(|e| RemoteError::Setup {
            service: "authority",
            reason: e.to_string(),
        })?;
        let api = OpenApiClient::new(
            "authority",
            &endpoint,
            config.api_version.clone(),
            credentials,
            timeout,
        )?;
        Ok(Self { api })
    }
}

#[async_trait]
impl CertificateAuthority for CasClient {
    async fn create_order(
        &self,
        domain: &str,
        validation_type: ValidationType,
    ) -> Result<OrderId, RemoteError> {
        let response: CreateOrderResponse = self
            .api
            .rpc(
                "CreateCertificateForPackageRequest",
                &[
                    ("Domain", domain.to_string()),
                    ("ValidateType", validation_type.as_str().to_string()),
                ],
            )
            .await?;

        info!(
            domain = %domain,
            order_id = %response.order_id,
            validation_type = %validation_type,
            "Created certificate order"
        );
        Ok(response.order_id)
    }

    async fn order_status(&self, order_id: OrderId) -> Result<OrderStatus, RemoteError> {
        self.api
            .rpc("DescribeCertificateState", &[("OrderId", order_id.to_string())])
            .await
    }

    async fn list_certificates(&self, keyword: &str) -> Result<Vec<CertificateRecord>, RemoteError> {
        let response: ListCertificatesResponse = self
            .api
            .rpc(
                "ListUserCertificateOrder",
                &[
                    ("OrderType", "CERT".to_string()),
                    ("Keyword", keyword.to_string()),
                ],
            )
            .await?;
        Ok(response.certificate_order_list)
    }

    async fn certificate_detail(
        &self,
        cert_id: CertificateId,
    ) -> Result<CertificateDetail, RemoteError> {
        self.api
            .rpc("GetUserCertificateDetail", &[("CertId", cert_id.to_string())])
            .await
    }
}
