//! Background certificate renewal scheduler
//!
//! Periodically sweeps the configured domains and renews certificates when
//! needed.

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::orchestrator::RenewalOrchestrator;
use crate::authority::CertificateAuthority;
use crate::gateway::DomainGateway;
use crate::trigger::{run_domains, RunReport};

/// Default check interval (12 hours)
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(12 * 3600);

/// Minimum check interval (1 hour)
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(3600);

/// Long-running renewal loop
///
/// Sweeps once immediately, then at every tick of the check interval, until
/// the shutdown future resolves. Failed sweeps are logged and retried on the
/// next tick.
pub struct RenewalScheduler<A, G> {
    orchestrator: RenewalOrchestrator<A, G>,
    domains: Vec<String>,
    check_interval: Duration,
}

impl<A, G> RenewalScheduler<A, G>
where
    A: CertificateAuthority,
    G: DomainGateway,
{
    pub fn new(orchestrator: RenewalOrchestrator<A, G>, domains: Vec<String>) -> Self {
        Self {
            orchestrator,
            domains,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    /// Set the check interval
    ///
    /// The interval is clamped to a minimum of 1 hour to avoid
    /// excessive polling.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval.max(MIN_CHECK_INTERVAL);
        self
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Run one sweep over all domains
    pub async fn run_once(&self) -> RunReport {
        let start = Instant::now();
        let report = run_domains(&self.orchestrator, &self.domains).await;

        let failed = report.failed();
        if failed.is_empty() {
            info!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                renewed = report.renewed(),
                "Scheduled certificate check completed"
            );
        } else {
            warn!(
                failed = ?failed,
                "Scheduled certificate check had failures, retrying next interval"
            );
        }
        report
    }

    /// Run until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            check_interval_hours = self.check_interval.as_secs() / 3600,
            domain_count = self.domains.len(),
            "Starting certificate renewal scheduler"
        );

        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Stopping certificate renewal scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    debug!("Running scheduled certificate renewal check");
                    self.run_once().await;
                }
            }
        }
    }
}

impl<A, G> std::fmt::Debug for RenewalScheduler<A, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewalScheduler")
            .field("check_interval", &self.check_interval)
            .field("domains", &self.domains)
            .finish()
    }
}
