//! Entry trigger
//!
//! One invocation reads the credentials, builds the clients, checks every
//! configured domain concurrently and reports the combined result. A failure
//! on one domain never hides the results of the others.

use futures::future::join_all;
use thiserror::Error;
use tracing::{error, info, info_span, Instrument};

use certrenew_common::RunId;
use certrenew_config::{Config, ConfigError, Credentials, CredentialsError};

use crate::authority::{CasClient, CertificateAuthority};
use crate::gateway::{DomainGateway, FcClient};
use crate::openapi::RemoteError;
use crate::renewal::{
    RenewError, RenewalOrchestrator, RenewalOutcome, RenewalPolicy, ValidationError,
};

/// Orchestrator wired to the real remote APIs
pub type LiveOrchestrator = RenewalOrchestrator<CasClient, FcClient>;

/// Errors returned by a trigger invocation
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    MissingCredential(#[from] CredentialsError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create API client: {0}")]
    Client(#[from] RemoteError),

    #[error("invalid renewal policy: {0}")]
    Policy(#[from] ValidationError),

    #[error("certificate renewal failed for: {}", failed.join(", "))]
    DomainsFailed { failed: Vec<String> },
}

/// Result of checking one domain
#[derive(Debug)]
pub struct DomainReport {
    pub domain: String,
    pub result: Result<RenewalOutcome, RenewError>,
}

/// Results of one sweep over all configured domains
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub domains: Vec<DomainReport>,
}

impl RunReport {
    /// Domains whose check failed
    pub fn failed(&self) -> Vec<&str> {
        self.domains
            .iter()
            .filter(|d| d.result.is_err())
            .map(|d| d.domain.as_str())
            .collect()
    }

    /// Number of domains that received a new certificate
    pub fn renewed(&self) -> usize {
        self.domains
            .iter()
            .filter(|d| matches!(d.result, Ok(RenewalOutcome::Renewed { .. })))
            .count()
    }

    /// Collapse into the trigger's completion value: the empty string on
    /// success, otherwise the list of failed domains.
    pub fn into_result(self) -> Result<String, TriggerError> {
        let failed: Vec<String> = self.failed().into_iter().map(str::to_string).collect();
        if failed.is_empty() {
            Ok(String::new())
        } else {
            Err(TriggerError::DomainsFailed { failed })
        }
    }
}

/// Build the live orchestrator from configuration and credentials
pub fn build_orchestrator(
    config: &Config,
    credentials: Credentials,
) -> Result<LiveOrchestrator, TriggerError> {
    // Reject unusable endpoints before any client is built
    config.authority.endpoint_url()?;
    config.gateway.endpoint_url()?;

    let timeout = config.http.timeout();
    let authority = CasClient::new(&config.authority, credentials.clone(), timeout)?;
    let gateway = FcClient::new(&config.gateway, credentials, timeout)?;
    let policy = RenewalPolicy::from_config(&config.renewal)?;

    Ok(RenewalOrchestrator::new(authority, gateway, policy))
}

/// Run the trigger against the real APIs
pub async fn invoke<I>(config: &Config, vars: I) -> Result<String, TriggerError>
where
    I: IntoIterator<Item = (String, String)>,
{
    invoke_with(config, vars, build_orchestrator).await
}

/// Run the trigger with a custom orchestrator factory.
///
/// Credentials are checked before `build` is called, so a missing credential
/// never reaches the network.
pub async fn invoke_with<I, F, A, G>(config: &Config, vars: I, build: F) -> Result<String, TriggerError>
where
    I: IntoIterator<Item = (String, String)>,
    F: FnOnce(&Config, Credentials) -> Result<RenewalOrchestrator<A, G>, TriggerError>,
    A: CertificateAuthority,
    G: DomainGateway,
{
    let credentials = Credentials::from_vars(vars)?;
    let orchestrator = build(config, credentials)?;

    run_domains(&orchestrator, &config.renewal.domains)
        .await
        .into_result()
}

/// Check every domain concurrently and collect the per-domain results
pub async fn run_domains<A, G>(
    orchestrator: &RenewalOrchestrator<A, G>,
    domains: &[String],
) -> RunReport
where
    A: CertificateAuthority,
    G: DomainGateway,
{
    let run_id = RunId::new();
    info!(run_id = %run_id, domain_count = domains.len(), "Checking certificates for renewal");

    let checks = domains.iter().map(|domain| {
        let span = info_span!("domain_check", run_id = %run_id, domain = %domain);
        async move {
            let result = orchestrator.check_domain_cert(domain).await;
            if let Err(ref e) = result {
                error!(error = %e, recommend = e.recommend().unwrap_or("-"), "Certificate check failed");
            }
            DomainReport {
                domain: domain.clone(),
                result,
            }
        }
        .instrument(span)
    });

    let domains = join_all(checks).await;
    let report = RunReport { run_id, domains };

    info!(
        run_id = %report.run_id,
        renewed = report.renewed(),
        failed = report.failed().len(),
        "Certificate check finished"
    );
    report
}
