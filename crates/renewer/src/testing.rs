//! In-memory authority and gateway used by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use certrenew_common::{
    CertConfig, CertificateDetail, CertificateId, CertificateRecord, DomainBinding, OrderId,
    OrderState, OrderStatus, ValidationType,
};

use crate::authority::CertificateAuthority;
use crate::gateway::DomainGateway;
use crate::openapi::RemoteError;

fn api_error(service: &'static str, action: &str, status: u16, code: &str) -> RemoteError {
    RemoteError::Api {
        service,
        action: action.to_string(),
        status,
        code: code.to_string(),
        message: format!("{} rejected by fake", action),
        recommend: Some(format!("https://diagnose.example.com/{}", code)),
        request_id: None,
    }
}

/// Authority that replays a fixed sequence of order states
#[derive(Default)]
pub struct FakeAuthority {
    records: Vec<CertificateRecord>,
    statuses: Mutex<VecDeque<OrderStatus>>,
    create_calls: AtomicUsize,
    status_calls: AtomicUsize,
    list_calls: AtomicUsize,
    fail_list: bool,
    orders: Mutex<Vec<(String, ValidationType)>>,
}

impl FakeAuthority {
    pub const ORDER_ID: OrderId = OrderId::new(4242);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, records: Vec<CertificateRecord>) -> Self {
        self.records = records;
        self
    }

    /// States returned by successive status checks; the last one repeats
    pub fn with_statuses(self, statuses: Vec<OrderStatus>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn ordered_domains(&self) -> Vec<String> {
        self.orders.lock().unwrap().iter().map(|(d, _)| d.clone()).collect()
    }

    pub fn ordered_types(&self) -> Vec<ValidationType> {
        self.orders.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl CertificateAuthority for FakeAuthority {
    async fn create_order(
        &self,
        domain: &str,
        validation_type: ValidationType,
    ) -> Result<OrderId, RemoteError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.orders
            .lock()
            .unwrap()
            .push((domain.to_string(), validation_type));
        Ok(Self::ORDER_ID)
    }

    async fn order_status(&self, _order_id: OrderId) -> Result<OrderStatus, RemoteError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        Ok(status.unwrap_or_else(|| OrderStatus::with_state(OrderState::Process)))
    }

    async fn list_certificates(&self, _keyword: &str) -> Result<Vec<CertificateRecord>, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list {
            return Err(api_error("authority", "ListUserCertificateOrder", 503, "ServiceUnavailable"));
        }
        Ok(self.records.clone())
    }

    async fn certificate_detail(
        &self,
        cert_id: CertificateId,
    ) -> Result<CertificateDetail, RemoteError> {
        Ok(CertificateDetail {
            id: Some(cert_id),
            ..Default::default()
        })
    }
}

/// Gateway holding custom domain bindings in memory
#[derive(Default)]
pub struct FakeGateway {
    bindings: Mutex<Vec<DomainBinding>>,
    deployed: Mutex<Vec<CertConfig>>,
    fail_lookup: bool,
    fail_deploy: bool,
    ignore_deploy: bool,
    lookup_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_cert(domain: &str, cert_name: &str) -> Self {
        let gateway = Self::default();
        gateway.add_domain(domain, Some(cert_name));
        gateway
    }

    pub fn without_cert(domain: &str) -> Self {
        let gateway = Self::default();
        gateway.add_domain(domain, None);
        gateway
    }

    pub fn add_domain(&self, domain: &str, cert_name: Option<&str>) {
        self.bindings.lock().unwrap().push(DomainBinding {
            domain_name: domain.to_string(),
            cert_config: cert_name.map(|name| CertConfig::new(name, "OLD-CERT", "")),
            ..Default::default()
        });
    }

    pub fn failing_lookup(mut self) -> Self {
        self.fail_lookup = true;
        self
    }

    pub fn failing_deploy(mut self) -> Self {
        self.fail_deploy = true;
        self
    }

    /// Accept deploys without changing the stored binding
    pub fn ignoring_deploy(mut self) -> Self {
        self.ignore_deploy = true;
        self
    }

    pub fn deployed(&self) -> Vec<CertConfig> {
        self.deployed.lock().unwrap().clone()
    }

    pub fn deploy_calls(&self) -> usize {
        self.deployed.lock().unwrap().len()
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DomainGateway for FakeGateway {
    async fn get_domain(&self, domain: &str) -> Result<Option<DomainBinding>, RemoteError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup {
            return Err(api_error("gateway", "GetCustomDomain", 500, "InternalError"));
        }
        Ok(self
            .bindings
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.domain_name == domain)
            .cloned())
    }

    async fn deploy_certificate(&self, domain: &str, cert: &CertConfig) -> Result<(), RemoteError> {
        self.deployed.lock().unwrap().push(cert.clone());
        if self.fail_deploy {
            return Err(api_error("gateway", "UpdateCustomDomain", 400, "InvalidArgument"));
        }
        if !self.ignore_deploy {
            let mut bindings = self.bindings.lock().unwrap();
            if let Some(binding) = bindings.iter_mut().find(|b| b.domain_name == domain) {
                binding.cert_config = Some(cert.clone());
            }
        }
        Ok(())
    }
}
