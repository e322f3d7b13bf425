//! Remote API error types.

use serde::Deserialize;
use thiserror::Error;

/// A failed call to the gateway or the authority
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The API answered with an error body
    #[error("{service} {action} failed with HTTP {status}: {code}: {message}")]
    Api {
        service: &'static str,
        action: String,
        status: u16,
        code: String,
        message: String,
        /// Diagnostic link supplied by the provider
        recommend: Option<String>,
        request_id: Option<String>,
    },

    /// The request never produced a response
    #[error("{service} {action} request failed: {source}")]
    Transport {
        service: &'static str,
        action: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body did not match the expected shape
    #[error("{service} {action} returned an unexpected body: {reason}")]
    Decode {
        service: &'static str,
        action: String,
        reason: String,
    },

    /// The client could not be constructed
    #[error("invalid {service} client configuration: {reason}")]
    Setup {
        service: &'static str,
        reason: String,
    },
}

impl RemoteError {
    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Provider error code of an API error
    pub fn code(&self) -> Option<&str> {
        match self {
            RemoteError::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Provider diagnostic hint, when one was returned
    pub fn recommend(&self) -> Option<&str> {
        match self {
            RemoteError::Api { recommend, .. } => recommend.as_deref(),
            _ => None,
        }
    }
}

/// Error body returned by both APIs.
///
/// RPC-style APIs use `Code`/`Message`, the gateway uses
/// `ErrorCode`/`ErrorMessage`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default, rename = "Code", alias = "ErrorCode")]
    pub code: Option<String>,
    #[serde(default, rename = "Message", alias = "ErrorMessage")]
    pub message: Option<String>,
    #[serde(default, rename = "Recommend")]
    pub recommend: Option<String>,
    #[serde(default, rename = "RequestId", alias = "requestId")]
    pub request_id: Option<String>,
}
