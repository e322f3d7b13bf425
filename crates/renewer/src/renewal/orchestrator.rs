//! Renewal orchestrator
//!
//! Drives one domain through the renewal state machine:
//!
//! ```text
//! lookup binding ─► lookup certificate ─► decide
//!                                           │ renew
//!                                           ▼
//!         create order ─► poll (validate once) ─► deploy ─► verify binding
//! ```
//!
//! The orchestrator holds only immutable client handles and policy, so a
//! single instance can serve concurrent checks of different domains.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use certrenew_common::{
    decide, deployment_cert_name, CertConfig, CertificateRecord, IssuedCertificate, OrderId,
    RenewalDecision, RenewalReason,
};
use certrenew_config::RenewalConfig;

use super::error::RenewError;
use super::validation::{ValidationError, ValidationOutcome, ValidationStrategy};
use crate::authority::CertificateAuthority;
use crate::gateway::DomainGateway;

/// Renewal policy applied to every domain
#[derive(Debug, Clone)]
pub struct RenewalPolicy {
    /// Renew once this many days or fewer remain
    pub renew_before_days: f64,
    /// Domain validation method
    pub strategy: ValidationStrategy,
    /// Maximum number of order status checks
    pub poll_attempts: u32,
    /// Delay between order status checks
    pub poll_interval: Duration,
}

impl RenewalPolicy {
    pub fn from_config(config: &RenewalConfig) -> Result<Self, ValidationError> {
        Ok(Self {
            renew_before_days: config.renew_before_days,
            strategy: ValidationStrategy::new(config.validation_type, config.webroot.as_deref())?,
            poll_attempts: config.poll_attempts,
            poll_interval: config.poll_interval(),
        })
    }
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            renew_before_days: certrenew_common::DEFAULT_RENEW_BEFORE_DAYS,
            strategy: ValidationStrategy::Dns,
            poll_attempts: 10,
            poll_interval: Duration::from_millis(150),
        }
    }
}

/// Result of a successful domain check
#[derive(Debug, Clone, PartialEq)]
pub enum RenewalOutcome {
    /// The current certificate is outside the renewal window
    UpToDate { days_remaining: f64 },
    /// A new certificate was issued and deployed
    Renewed { order_id: OrderId, cert_name: String },
}

/// Coordinates the authority and the gateway for certificate renewal
pub struct RenewalOrchestrator<A, G> {
    authority: A,
    gateway: G,
    policy: RenewalPolicy,
}

impl<A, G> RenewalOrchestrator<A, G>
where
    A: CertificateAuthority,
    G: DomainGateway,
{
    pub fn new(authority: A, gateway: G, policy: RenewalPolicy) -> Self {
        Self {
            authority,
            gateway,
            policy,
        }
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn policy(&self) -> &RenewalPolicy {
        &self.policy
    }

    /// Check `domain` and renew its certificate if it is close to expiry
    pub async fn check_domain_cert(&self, domain: &str) -> Result<RenewalOutcome, RenewError> {
        self.check_domain_cert_at(domain, Utc::now()).await
    }

    /// [`check_domain_cert`](Self::check_domain_cert) against a fixed clock
    pub async fn check_domain_cert_at(
        &self,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<RenewalOutcome, RenewError> {
        match self.inspect(domain, now).await? {
            RenewalDecision::Keep { days_remaining } => {
                info!(
                    domain = %domain,
                    days_remaining,
                    "Certificate is still valid, skipping renewal"
                );
                Ok(RenewalOutcome::UpToDate { days_remaining })
            }
            RenewalDecision::Renew(reason) => {
                info!(domain = %domain, reason = ?reason, "Certificate needs renewal");
                self.refresh_cert(domain, now).await
            }
        }
    }

    /// Decide whether `domain` needs renewal without changing anything
    pub async fn inspect(
        &self,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<RenewalDecision, RenewError> {
        let record = self.current_certificate(domain).await?;

        if let Some(ref record) = record {
            info!(
                domain = %domain,
                certificate_id = ?record.certificate_id,
                end_date = ?record.end_date,
                "Found current certificate"
            );
        }

        Ok(decide(record.as_ref(), now, self.policy.renew_before_days))
    }

    async fn current_certificate(
        &self,
        domain: &str,
    ) -> Result<Option<CertificateRecord>, RenewError> {
        let binding = self
            .gateway
            .get_domain(domain)
            .await?
            .ok_or_else(|| RenewError::DomainNotFound(domain.to_string()))?;

        let Some(cert_name) = binding.cert_name() else {
            info!(domain = %domain, "No certificate bound to the custom domain");
            return Ok(None);
        };

        info!(domain = %domain, cert_name = %cert_name, "Checking deployed certificate");
        Ok(self.authority.find_certificate(domain, cert_name).await?)
    }

    /// Issue a new certificate for `domain` and deploy it
    pub async fn refresh_cert(
        &self,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<RenewalOutcome, RenewError> {
        info!(domain = %domain, "Starting certificate renewal");

        let order_id = self
            .authority
            .create_order(domain, self.policy.strategy.validation_type())
            .await?;

        let issued = self.wait_for_issuance(order_id).await?;
        info!(domain = %domain, order_id = %order_id, "Certificate issued, deploying");

        let cert_name = deployment_cert_name(domain, now);
        self.deploy(domain, &cert_name, issued).await?;

        info!(domain = %domain, cert_name = %cert_name, "Certificate renewed");
        Ok(RenewalOutcome::Renewed { order_id, cert_name })
    }

    /// Poll `order_id` until it is issued, fails, or the attempt budget runs
    /// out. Validation material is placed the first time the authority asks
    /// for it and removed afterwards.
    async fn wait_for_issuance(&self, order_id: OrderId) -> Result<IssuedCertificate, RenewError> {
        let mut placed = None;
        let result = self.poll_order(order_id, &mut placed).await;

        if let Some(ref outcome) = placed {
            self.policy.strategy.cleanup(outcome).await;
        }
        result
    }

    async fn poll_order(
        &self,
        order_id: OrderId,
        placed: &mut Option<ValidationOutcome>,
    ) -> Result<IssuedCertificate, RenewError> {
        let attempts = self.policy.poll_attempts;

        for attempt in 1..=attempts {
            let status = self.authority.order_status(order_id).await?;
            info!(
                order_id = %order_id,
                attempt,
                max_attempts = attempts,
                state = %status.state,
                "Checked certificate order state"
            );

            if status.state.is_issued() {
                return status
                    .issued()
                    .ok_or(RenewError::IncompleteOrder { order_id });
            }

            if status.state.is_failed() {
                return Err(RenewError::ValidationFailed {
                    order_id,
                    state: status.state.to_string(),
                });
            }

            if status.state.awaits_validation() && placed.is_none() {
                let outcome = self.policy.strategy.prepare(&status).await?;
                if let ValidationOutcome::NotImplemented(validation_type) = outcome {
                    debug!(
                        order_id = %order_id,
                        validation_type = %validation_type,
                        "Validation left to the authority"
                    );
                }
                *placed = Some(outcome);
            }

            if attempt < attempts {
                tokio::time::sleep(self.policy.poll_interval).await;
            }
        }

        warn!(order_id = %order_id, attempts, "Certificate order was not issued in time");
        Err(RenewError::ValidationTimeout { order_id, attempts })
    }

    async fn deploy(
        &self,
        domain: &str,
        cert_name: &str,
        issued: IssuedCertificate,
    ) -> Result<(), RenewError> {
        let cert = CertConfig::new(cert_name, issued.certificate, issued.private_key);

        if let Err(source) = self.gateway.deploy_certificate(domain, &cert).await {
            error!(
                domain = %domain,
                cert_name = %cert_name,
                error = %source,
                recommend = source.recommend().unwrap_or("-"),
                "Certificate deployment failed"
            );
            return Err(RenewError::DeployFailed {
                domain: domain.to_string(),
                cert_name: cert_name.to_string(),
                source,
            });
        }

        // Confirm the gateway now serves the new certificate
        let binding = self.gateway.get_domain(domain).await?;
        let actual = binding.as_ref().and_then(|b| b.cert_name()).map(str::to_string);
        if actual.as_deref() != Some(cert_name) {
            return Err(RenewError::DeployNotApplied {
                domain: domain.to_string(),
                expected: cert_name.to_string(),
                actual,
            });
        }

        Ok(())
    }
}

impl<A, G> std::fmt::Debug for RenewalOrchestrator<A, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewalOrchestrator")
            .field("policy", &self.policy)
            .finish()
    }
}

/// Reason a renewal decision gives, as a short label for reports
pub fn reason_label(reason: &RenewalReason) -> &'static str {
    match reason {
        RenewalReason::NoCertificate => "no certificate",
        RenewalReason::ExpiresSoon { .. } => "expires soon",
        RenewalReason::UnknownExpiry => "unknown expiry",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAuthority, FakeGateway};
    use certrenew_common::{OrderState, OrderStatus, ValidationType};
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 8, 30, 0).unwrap()
    }

    fn policy() -> RenewalPolicy {
        RenewalPolicy {
            poll_interval: Duration::ZERO,
            ..Default::default()
        }
    }

    fn record(name: &str, expires: DateTime<Utc>) -> CertificateRecord {
        CertificateRecord {
            certificate_id: Some(certrenew_common::CertificateId::new(1)),
            common_name: Some(name.to_string()),
            cert_end_time: Some(expires.timestamp_millis()),
            ..Default::default()
        }
    }

    fn issued_status() -> OrderStatus {
        let mut status = OrderStatus::with_state(OrderState::Certificate);
        status.certificate = Some("NEW-CERT".to_string());
        status.private_key = Some("NEW-KEY".to_string());
        status
    }

    #[tokio::test]
    async fn test_valid_certificate_is_left_alone() {
        let authority = FakeAuthority::new()
            .with_records(vec![record("www.dnote.cn-20240101", now() + ChronoDuration::days(30))]);
        let gateway = FakeGateway::with_cert("www.dnote.cn", "www.dnote.cn-20240101");
        let orchestrator = RenewalOrchestrator::new(authority, gateway, policy());

        let outcome = orchestrator
            .check_domain_cert_at("www.dnote.cn", now())
            .await
            .unwrap();

        assert_eq!(outcome, RenewalOutcome::UpToDate { days_remaining: 30.0 });
        assert_eq!(orchestrator.authority.create_calls(), 0);
        assert_eq!(orchestrator.gateway.deploy_calls(), 0);
    }

    #[tokio::test]
    async fn test_expiring_certificate_is_renewed() {
        let authority = FakeAuthority::new()
            .with_records(vec![record("www.dnote.cn-20240101", now() + ChronoDuration::days(3))])
            .with_statuses(vec![
                OrderStatus::with_state(OrderState::Process),
                issued_status(),
            ]);
        let gateway = FakeGateway::with_cert("www.dnote.cn", "www.dnote.cn-20240101");
        let orchestrator = RenewalOrchestrator::new(authority, gateway, policy());

        let outcome = orchestrator
            .check_domain_cert_at("www.dnote.cn", now())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RenewalOutcome::Renewed {
                order_id: FakeAuthority::ORDER_ID,
                cert_name: "www.dnote.cn-20240305".to_string(),
            }
        );
        assert_eq!(orchestrator.authority.create_calls(), 1);
        assert_eq!(orchestrator.authority.status_calls(), 2);
        assert_eq!(orchestrator.authority.ordered_domains(), vec!["www.dnote.cn"]);

        let deployed = orchestrator.gateway.deployed();
        assert_eq!(deployed.len(), 1);
        assert_eq!(deployed[0].cert_name, "www.dnote.cn-20240305");
        assert_eq!(deployed[0].certificate, "NEW-CERT");
        assert_eq!(deployed[0].private_key, "NEW-KEY");
    }

    #[tokio::test]
    async fn test_missing_record_triggers_issuance() {
        let authority = FakeAuthority::new().with_statuses(vec![issued_status()]);
        let gateway = FakeGateway::with_cert("api.example.com", "old");
        let orchestrator = RenewalOrchestrator::new(authority, gateway, policy());

        orchestrator
            .check_domain_cert_at("api.example.com", now())
            .await
            .unwrap();

        assert_eq!(orchestrator.authority.create_calls(), 1);
        assert_eq!(orchestrator.authority.ordered_domains(), vec!["api.example.com"]);
        assert_eq!(orchestrator.gateway.deploy_calls(), 1);
    }

    #[tokio::test]
    async fn test_unbound_domain_skips_lookup() {
        let authority = FakeAuthority::new().with_statuses(vec![issued_status()]);
        let gateway = FakeGateway::without_cert("api.example.com");
        let orchestrator = RenewalOrchestrator::new(authority, gateway, policy());

        orchestrator
            .check_domain_cert_at("api.example.com", now())
            .await
            .unwrap();

        assert_eq!(orchestrator.authority.list_calls(), 0);
        assert_eq!(orchestrator.gateway.deploy_calls(), 1);
        // initial lookup plus the post-deploy read back
        assert_eq!(orchestrator.gateway.lookup_calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_domain() {
        let orchestrator =
            RenewalOrchestrator::new(FakeAuthority::new(), FakeGateway::empty(), policy());

        let err = orchestrator
            .check_domain_cert_at("missing.example.com", now())
            .await
            .unwrap_err();

        assert!(matches!(err, RenewError::DomainNotFound(ref d) if d == "missing.example.com"));
        assert_eq!(orchestrator.authority.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_not_absence() {
        let gateway = FakeGateway::with_cert("www.dnote.cn", "x").failing_lookup();
        let orchestrator = RenewalOrchestrator::new(FakeAuthority::new(), gateway, policy());

        let err = orchestrator
            .check_domain_cert_at("www.dnote.cn", now())
            .await
            .unwrap_err();

        assert!(matches!(err, RenewError::Remote(_)));
        assert_eq!(orchestrator.authority.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_authority_failure_is_not_absence() {
        let authority = FakeAuthority::new().failing_list();
        let gateway = FakeGateway::with_cert("www.dnote.cn", "current");
        let orchestrator = RenewalOrchestrator::new(authority, gateway, policy());

        let err = orchestrator
            .check_domain_cert_at("www.dnote.cn", now())
            .await
            .unwrap_err();

        assert!(matches!(err, RenewError::Remote(_)));
        assert_eq!(err.recommend(), Some("https://diagnose.example.com/ServiceUnavailable"));
        assert_eq!(orchestrator.authority.list_calls(), 1);
        assert_eq!(orchestrator.authority.create_calls(), 0);
        assert_eq!(orchestrator.gateway.deploy_calls(), 0);
    }

    #[tokio::test]
    async fn test_poll_budget_is_bounded() {
        let authority = FakeAuthority::new()
            .with_statuses(vec![OrderStatus::with_state(OrderState::Process)]);
        let gateway = FakeGateway::with_cert("www.dnote.cn", "old");
        let orchestrator = RenewalOrchestrator::new(authority, gateway, policy());

        let err = orchestrator
            .check_domain_cert_at("www.dnote.cn", now())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RenewError::ValidationTimeout { attempts: 10, .. }
        ));
        assert_eq!(orchestrator.authority.status_calls(), 10);
        assert_eq!(orchestrator.gateway.deploy_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_validation_stops_polling() {
        let authority = FakeAuthority::new().with_statuses(vec![
            OrderStatus::with_state(OrderState::DomainVerify),
            OrderStatus::with_state(OrderState::VerifyFail),
        ]);
        let gateway = FakeGateway::with_cert("www.dnote.cn", "old");
        let orchestrator = RenewalOrchestrator::new(authority, gateway, policy());

        let err = orchestrator
            .check_domain_cert_at("www.dnote.cn", now())
            .await
            .unwrap_err();

        assert!(matches!(err, RenewError::ValidationFailed { .. }));
        assert_eq!(orchestrator.authority.status_calls(), 2);
    }

    #[tokio::test]
    async fn test_issued_order_without_key() {
        let mut status = issued_status();
        status.private_key = None;
        let authority = FakeAuthority::new().with_statuses(vec![status]);
        let gateway = FakeGateway::with_cert("www.dnote.cn", "old");
        let orchestrator = RenewalOrchestrator::new(authority, gateway, policy());

        let err = orchestrator.refresh_cert("www.dnote.cn", now()).await.unwrap_err();
        assert!(matches!(err, RenewError::IncompleteOrder { .. }));
        assert_eq!(orchestrator.gateway.deploy_calls(), 0);
    }

    #[tokio::test]
    async fn test_deploy_failure_is_surfaced() {
        let authority = FakeAuthority::new().with_statuses(vec![issued_status()]);
        let gateway = FakeGateway::with_cert("www.dnote.cn", "old").failing_deploy();
        let orchestrator = RenewalOrchestrator::new(authority, gateway, policy());

        let err = orchestrator.refresh_cert("www.dnote.cn", now()).await.unwrap_err();

        match err {
            RenewError::DeployFailed { ref cert_name, .. } => {
                assert_eq!(cert_name, "www.dnote.cn-20240305");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.recommend().is_some());
    }

    #[tokio::test]
    async fn test_deploy_not_reflected_by_gateway() {
        let authority = FakeAuthority::new().with_statuses(vec![issued_status()]);
        let gateway = FakeGateway::with_cert("www.dnote.cn", "old").ignoring_deploy();
        let orchestrator = RenewalOrchestrator::new(authority, gateway, policy());

        let err = orchestrator.refresh_cert("www.dnote.cn", now()).await.unwrap_err();
        assert!(matches!(
            err,
            RenewError::DeployNotApplied { ref actual, .. } if actual.as_deref() == Some("old")
        ));
    }

    #[tokio::test]
    async fn test_file_validation_is_placed_once_and_removed() {
        let dir = tempfile::tempdir().unwrap();

        let mut verify = OrderStatus::with_state(OrderState::DomainVerify);
        verify.validate_type = Some(ValidationType::File);
        verify.uri = Some("/.well-known/pki-validation/fileauth.txt".to_string());
        verify.content = Some("proof".to_string());

        let authority = FakeAuthority::new().with_statuses(vec![
            verify.clone(),
            verify,
            issued_status(),
        ]);
        let gateway = FakeGateway::with_cert("www.dnote.cn", "old");
        let policy = RenewalPolicy {
            strategy: ValidationStrategy::new(ValidationType::File, Some(dir.path())).unwrap(),
            ..policy()
        };
        let orchestrator = RenewalOrchestrator::new(authority, gateway, policy);

        orchestrator.refresh_cert("www.dnote.cn", now()).await.unwrap();

        assert_eq!(orchestrator.authority.ordered_types(), vec![ValidationType::File]);
        assert!(!dir
            .path()
            .join(".well-known/pki-validation/fileauth.txt")
            .exists());
    }

    #[tokio::test]
    async fn test_inspect_is_read_only() {
        let authority = FakeAuthority::new()
            .with_records(vec![record("www.dnote.cn-20240101", now() + ChronoDuration::days(1))]);
        let gateway = FakeGateway::with_cert("www.dnote.cn", "www.dnote.cn-20240101");
        let orchestrator = RenewalOrchestrator::new(authority, gateway, policy());

        let decision = orchestrator.inspect("www.dnote.cn", now()).await.unwrap();

        assert_eq!(
            decision,
            RenewalDecision::Renew(RenewalReason::ExpiresSoon { days_remaining: 1.0 })
        );
        assert_eq!(orchestrator.authority.create_calls(), 0);
        assert_eq!(orchestrator.gateway.deploy_calls(), 0);
    }

    #[test]
    fn test_policy_from_config() {
        let config = RenewalConfig {
            poll_attempts: 3,
            poll_interval_ms: 1000,
            ..Default::default()
        };
        let policy = RenewalPolicy::from_config(&config).unwrap();
        assert_eq!(policy.poll_attempts, 3);
        assert_eq!(policy.poll_interval, Duration::from_secs(1));
        assert_eq!(policy.strategy, ValidationStrategy::Dns);
    }
}
