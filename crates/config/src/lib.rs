//! Configuration for certrenew.
//!
//! Configuration is read from a TOML file with kebab-case keys. Every key has
//! a default, and an embedded default configuration is used when no file is
//! given. Credentials are never read from the file. They come from the
//! environment, see [`Credentials`].
//!
//! ```toml
//! [gateway]
//! account-id = "1715373259194086"
//! region = "cn-hangzhou"
//!
//! [renewal]
//! domains = ["www.dnote.cn"]
//! renew-before-days = 5.0
//! validation-type = "DNS"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use certrenew_common::{ValidationType, DEFAULT_RENEW_BEFORE_DAYS};

mod credentials;
pub mod validate;

pub use credentials::{env_vars, Credentials, CredentialsError, ACCESS_KEY_ID, ACCESS_KEY_SECRET};
pub use validate::{validate_config, ErrorCategory, ValidationError, ValidationResult, ValidationWarning};

/// Embedded default configuration
const DEFAULT_CONFIG: &str = include_str!("../default.toml");

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Top-level configuration
// ============================================================================

/// Complete certrenew configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub authority: AuthorityConfig,
    #[serde(default)]
    pub renewal: RenewalConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        trace!(path = %path.display(), "Reading configuration file");

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml(&content)?;
        debug!(
            path = %path.display(),
            domains = config.renewal.domains.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// The configuration compiled into the binary
    pub fn default_embedded() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Load from `path` when given, otherwise use the embedded default
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::default_embedded(),
        }
    }

    /// Validate the configuration, failing on the first error
    pub fn validate(&self) -> Result<(), ConfigError> {
        let result = validate_config(self);
        match result.errors.first() {
            Some(err) => Err(ConfigError::Invalid(err.to_string())),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Function-compute gateway that serves the custom domains
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GatewayConfig {
    /// Account that owns the custom domains
    #[serde(default)]
    pub account_id: Option<String>,

    /// Region hosting the gateway
    #[serde(default = "default_region")]
    pub region: String,

    /// Explicit endpoint, overrides `account-id`/`region`
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API version of the gateway
    #[serde(default = "default_gateway_api_version")]
    pub api_version: String,
}

fn default_region() -> String {
    "cn-hangzhou".to_string()
}

fn default_gateway_api_version() -> String {
    "2021-04-06".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            region: default_region(),
            endpoint: None,
            api_version: default_gateway_api_version(),
        }
    }
}

impl GatewayConfig {
    /// Base URL of the gateway API
    pub fn endpoint_url(&self) -> Result<String, ConfigError> {
        if let Some(ref endpoint) = self.endpoint {
            return normalize_endpoint(endpoint);
        }

        match self.account_id.as_deref().map(str::trim) {
            Some(account) if !account.is_empty() => {
                normalize_endpoint(&format!("{}.{}.fc.aliyuncs.com", account, self.region))
            }
            _ => Err(ConfigError::Invalid(
                "gateway requires either `endpoint` or `account-id`".to_string(),
            )),
        }
    }
}

// ============================================================================
// Authority
// ============================================================================

/// Certificate authority that issues the certificates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AuthorityConfig {
    #[serde(default = "default_authority_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_authority_api_version")]
    pub api_version: String,
}

fn default_authority_endpoint() -> String {
    "cas.aliyuncs.com".to_string()
}

fn default_authority_api_version() -> String {
    "2020-04-07".to_string()
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            endpoint: default_authority_endpoint(),
            api_version: default_authority_api_version(),
        }
    }
}

impl AuthorityConfig {
    /// Base URL of the authority API
    pub fn endpoint_url(&self) -> Result<String, ConfigError> {
        normalize_endpoint(&self.endpoint)
    }
}

// ============================================================================
// Renewal
// ============================================================================

/// Renewal policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RenewalConfig {
    /// Custom domains to keep renewed
    #[serde(default)]
    pub domains: Vec<String>,

    /// Renew once this many days or fewer remain
    #[serde(default = "default_renew_before_days")]
    pub renew_before_days: f64,

    /// Domain validation method requested from the authority
    #[serde(default)]
    pub validation_type: ValidationType,

    /// Directory served as the domain's web root, for file validation
    #[serde(default)]
    pub webroot: Option<PathBuf>,

    /// Maximum number of order status checks
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// Delay between order status checks
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Interval between sweeps in daemon mode
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

fn default_renew_before_days() -> f64 {
    DEFAULT_RENEW_BEFORE_DAYS
}

fn default_poll_attempts() -> u32 {
    10
}

fn default_poll_interval_ms() -> u64 {
    150
}

fn default_check_interval_secs() -> u64 {
    12 * 3600
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            renew_before_days: default_renew_before_days(),
            validation_type: ValidationType::default(),
            webroot: None,
            poll_attempts: default_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

impl RenewalConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Outbound HTTP settings shared by both API clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct HttpConfig {
    /// Timeout for a single API call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Turn a bare host into an `https://` URL and check that it parses
fn normalize_endpoint(endpoint: &str) -> Result<String, ConfigError> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        return Err(ConfigError::Invalid("endpoint must not be empty".to_string()));
    }

    let candidate = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    };

    let parsed = url::Url::parse(&candidate)
        .map_err(|e| ConfigError::Invalid(format!("invalid endpoint '{}': {}", endpoint, e)))?;
    if parsed.host_str().is_none() {
        return Err(ConfigError::Invalid(format!("endpoint '{}' has no host", endpoint)));
    }

    Ok(candidate)
}
