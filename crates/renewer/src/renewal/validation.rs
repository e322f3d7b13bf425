//! Domain-control validation strategies.
//!
//! While an order is waiting for validation the authority publishes what it
//! expects to find: a file under the domain's web root, or a DNS record.
//! Only file placement is performed here. The DNS variant reports
//! [`ValidationOutcome::NotImplemented`] so the caller can log it and keep
//! polling in case the authority validates the zone on its own.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use certrenew_common::{OrderStatus, ValidationType};

/// Errors raised while preparing domain validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("file validation requires a webroot")]
    MissingWebroot,

    #[error("authority did not provide {0} for file validation")]
    MissingContent(&'static str),

    #[error("validation path '{0}' escapes the webroot")]
    UnsafePath(String),

    #[error("failed to write validation file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What preparing validation achieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The validation file was written
    Placed { path: PathBuf },
    /// This validation method is not carried out by certrenew
    NotImplemented(ValidationType),
}

/// How domain control is demonstrated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationStrategy {
    /// Write the validation file beneath `webroot`
    File { webroot: PathBuf },
    /// Publish a DNS record
    Dns,
}

impl ValidationStrategy {
    /// Build the strategy for a configured validation type
    pub fn new(validation_type: ValidationType, webroot: Option<&Path>) -> Result<Self, ValidationError> {
        match validation_type {
            ValidationType::File => webroot
                .map(|w| ValidationStrategy::File {
                    webroot: w.to_path_buf(),
                })
                .ok_or(ValidationError::MissingWebroot),
            ValidationType::Dns => Ok(ValidationStrategy::Dns),
        }
    }

    /// Validation type to request from the authority
    pub fn validation_type(&self) -> ValidationType {
        match self {
            ValidationStrategy::File { .. } => ValidationType::File,
            ValidationStrategy::Dns => ValidationType::Dns,
        }
    }

    /// Carry out the validation the authority asks for in `status`
    pub async fn prepare(&self, status: &OrderStatus) -> Result<ValidationOutcome, ValidationError> {
        match self {
            ValidationStrategy::File { webroot } => {
                let uri = status
                    .uri
                    .as_deref()
                    .filter(|u| !u.is_empty())
                    .ok_or(ValidationError::MissingContent("a uri"))?;
                let content = status
                    .content
                    .as_deref()
                    .ok_or(ValidationError::MissingContent("file content"))?;

                let path = resolve_path(webroot, uri)?;
                write_file(&path, content).await?;

                info!(
                    domain = status.domain.as_deref().unwrap_or("-"),
                    path = %path.display(),
                    "Placed domain validation file"
                );
                Ok(ValidationOutcome::Placed { path })
            }
            ValidationStrategy::Dns => {
                warn!(
                    record_type = status.record_type.as_deref().unwrap_or("-"),
                    record_domain = status.record_domain.as_deref().unwrap_or("-"),
                    "DNS validation is not performed, waiting for the authority"
                );
                Ok(ValidationOutcome::NotImplemented(ValidationType::Dns))
            }
        }
    }

    /// Remove anything `prepare` left behind
    pub async fn cleanup(&self, outcome: &ValidationOutcome) {
        if let ValidationOutcome::Placed { path } = outcome {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(path = %path.display(), "Removed domain validation file"),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove domain validation file"
                ),
            }
        }
    }
}

/// Map a validation URI onto a path beneath `webroot`.
///
/// Only plain path segments are accepted; `..`, root or prefix components
/// are rejected.
pub fn resolve_path(webroot: &Path, uri: &str) -> Result<PathBuf, ValidationError> {
    let relative = Path::new(uri.trim_start_matches('/'));

    let mut path = webroot.to_path_buf();
    let mut segments = 0;
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                path.push(segment);
                segments += 1;
            }
            Component::CurDir => {}
            _ => return Err(ValidationError::UnsafePath(uri.to_string())),
        }
    }

    if segments == 0 {
        return Err(ValidationError::UnsafePath(uri.to_string()));
    }
    Ok(path)
}

async fn write_file(path: &Path, content: &str) -> Result<(), ValidationError> {
    let io_err = |source: std::io::Error| ValidationError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, content).await.map_err(io_err)
}
