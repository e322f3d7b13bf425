//! Function-compute gateway client.
//!
//! Reads and updates the certificate bound to a custom domain.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, info};

use certrenew_common::{CertConfig, DomainBinding};
use certrenew_config::{Credentials, GatewayConfig};

use crate::openapi::{OpenApiClient, RemoteError};

/// Error code the gateway returns for an unknown custom domain
const DOMAIN_NOT_FOUND: &str = "DomainNameNotFound";

/// Operations the renewal flow needs from the serving gateway
#[async_trait]
pub trait DomainGateway: Send + Sync {
    /// Look up a custom domain. `Ok(None)` means the domain does not exist.
    async fn get_domain(&self, domain: &str) -> Result<Option<DomainBinding>, RemoteError>;

    /// Replace the certificate bound to `domain`
    async fn deploy_certificate(&self, domain: &str, cert: &CertConfig) -> Result<(), RemoteError>;
}

/// Client for the function-compute custom domain API
#[derive(Debug, Clone)]
pub struct FcClient {
    api: OpenApiClient,
    api_version: String,
}

impl FcClient {
    pub fn new(
        config: &GatewayConfig,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let endpoint = config.endpoint_url().map_err(|e| RemoteError::Setup {
            service: "gateway",
            reason: e.to_string(),
        })?;
        let api = OpenApiClient::new(
            "gateway",
            &endpoint,
            config.api_version.clone(),
            credentials,
            timeout,
        )?;
        Ok(Self {
            api,
            api_version: config.api_version.clone(),
        })
    }

    fn domain_path(&self, domain: &str) -> String {
        format!(
            "/{}/custom-domains/{}",
            self.api_version,
            urlencoding::encode(domain)
        )
    }
}

#[async_trait]
impl DomainGateway for FcClient {
    async fn get_domain(&self, domain: &str) -> Result<Option<DomainBinding>, RemoteError> {
        let result: Result<DomainBinding, RemoteError> = self
            .api
            .roa(Method::GET, "GetCustomDomain", &self.domain_path(domain), None)
            .await;

        match result {
            Ok(binding) => {
                debug!(
                    domain = %domain,
                    cert_name = binding.cert_name().unwrap_or("-"),
                    "Fetched custom domain"
                );
                Ok(Some(binding))
            }
            Err(e) if e.status() == Some(404) || e.code() == Some(DOMAIN_NOT_FOUND) => {
                debug!(domain = %domain, "Custom domain does not exist");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn deploy_certificate(&self, domain: &str, cert: &CertConfig) -> Result<(), RemoteError> {
        let body = serde_json::json!({ "certConfig": cert });
        let _: serde_json::Value = self
            .api
            .roa(
                Method::PUT,
                "UpdateCustomDomain",
                &self.domain_path(domain),
                Some(&body),
            )
            .await?;

        info!(domain = %domain, cert_name = %cert.cert_name, "Updated custom domain certificate");
        Ok(())
    }
}
