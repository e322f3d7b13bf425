//! Signed HTTP transport shared by the gateway and authority clients.
//!
//! Both remote APIs accept ACS3-HMAC-SHA256 signed requests. RPC-style calls
//! (the authority) send their parameters in the query string of a `POST /`.
//! ROA-style calls (the gateway) address a resource path and carry a JSON
//! body.

mod error;
pub mod signer;

pub use error::RemoteError;

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};
use url::Url;
use uuid::Uuid;

use certrenew_config::Credentials;

use error::ErrorBody;
use signer::{canonical_query, sha256_hex, Signer, CONTENT_SHA256_HEADER};

/// A signed client for one remote API
#[derive(Debug, Clone)]
pub struct OpenApiClient {
    http: reqwest::Client,
    base_url: Url,
    service: &'static str,
    version: String,
    signer: Signer,
}

impl OpenApiClient {
    /// Create a client for `service` at `endpoint`
    ///
    /// `service` is only used to label errors and log lines.
    pub fn new(
        service: &'static str,
        endpoint: &str,
        version: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let base_url = Url::parse(endpoint).map_err(|e| RemoteError::Setup {
            service,
            reason: format!("invalid endpoint '{}': {}", endpoint, e),
        })?;
        if base_url.host_str().is_none() {
            return Err(RemoteError::Setup {
                service,
                reason: format!("endpoint '{}' has no host", endpoint),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("certrenew/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Setup {
                service,
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url,
            service,
            version: version.into(),
            signer: Signer::new(credentials),
        })
    }

    /// Service label used in errors
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Invoke an RPC-style action
    pub async fn rpc<T: DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        let params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.send(Method::POST, action, "/", &params, None).await
    }

    /// Invoke a ROA-style action on a resource path
    pub async fn roa<T: DeserializeOwned>(
        &self,
        method: Method,
        action: &str,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, RemoteError> {
        let body = match body {
            Some(value) => Some(serde_json::to_vec(value).map_err(|e| RemoteError::Decode {
                service: self.service,
                action: action.to_string(),
                reason: format!("failed to encode request body: {}", e),
            })?),
            None => None,
        };
        self.send(method, action, path, &[], body).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        action: &str,
        path: &str,
        params: &[(String, String)],
        body: Option<Vec<u8>>,
    ) -> Result<T, RemoteError> {
        let query = canonical_query(params);
        let mut url = self.base_url.clone();
        url.set_path(path);
        url.set_query(if query.is_empty() { None } else { Some(&query) });

        let payload = body.as_deref().unwrap_or_default();
        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), host_header(&self.base_url));
        headers.insert("x-acs-action".to_string(), action.to_string());
        headers.insert("x-acs-version".to_string(), self.version.clone());
        headers.insert(
            "x-acs-date".to_string(),
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        );
        headers.insert(
            "x-acs-signature-nonce".to_string(),
            Uuid::new_v4().simple().to_string(),
        );
        headers.insert(CONTENT_SHA256_HEADER.to_string(), sha256_hex(payload));
        if body.is_some() {
            headers.insert("content-type".to_string(), "application/json".to_string());
        }

        let authorization = self
            .signer
            .authorization(method.as_str(), url.path(), &query, &headers);

        let mut header_map = HeaderMap::new();
        for (name, value) in &headers {
            header_map.insert(
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| self.setup_error(e))?,
                HeaderValue::from_str(value).map_err(|e| self.setup_error(e))?,
            );
        }
        header_map.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&authorization).map_err(|e| self.setup_error(e))?,
        );

        trace!(
            service = self.service,
            action = %action,
            method = %method,
            url = %url,
            "Sending API request"
        );

        let mut request = self.http.request(method, url).headers(header_map);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|source| RemoteError::Transport {
            service: self.service,
            action: action.to_string(),
            source,
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|source| RemoteError::Transport {
            service: self.service,
            action: action.to_string(),
            source,
        })?;

        if !status.is_success() {
            let err = self.api_error(action, status, &bytes);
            warn!(
                service = self.service,
                action = %action,
                status = status.as_u16(),
                error = %err,
                recommend = err.recommend().unwrap_or("-"),
                "API call failed"
            );
            return Err(err);
        }

        debug!(
            service = self.service,
            action = %action,
            status = status.as_u16(),
            bytes = bytes.len(),
            "API call succeeded"
        );

        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode {
            service: self.service,
            action: action.to_string(),
            reason: e.to_string(),
        })
    }

    fn api_error(&self, action: &str, status: StatusCode, bytes: &[u8]) -> RemoteError {
        let body: ErrorBody = serde_json::from_slice(bytes).unwrap_or_default();
        RemoteError::Api {
            service: self.service,
            action: action.to_string(),
            status: status.as_u16(),
            code: body.code.unwrap_or_else(|| status.to_string()),
            message: body
                .message
                .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned()),
            recommend: body.recommend,
            request_id: body.request_id,
        }
    }

    fn setup_error(&self, e: impl std::fmt::Display) -> RemoteError {
        RemoteError::Setup {
            service: self.service,
            reason: e.to_string(),
        }
    }
}

/// `Host` header value for `url`, including a non-default port
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}
