//! In-memory adapters shared by the runtime integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use warden_core::{AuditResult, Job, Policy, Rule, RunOptions, ServicePolicy, Session};
use warden_runtime::{
    Auditor, CancelToken, Discoverer, EventSink, JobStream, LookupError, ResultStream, RunEvent,
    Service, ServiceClient,
};

// =============================================================================
// SERVICE
// =============================================================================

pub struct FakeService {
    name: String,
    discoverers: HashMap<String, Arc<dyn Discoverer>>,
    auditors: HashMap<String, Arc<dyn Auditor>>,
    client_fails: bool,
    pub clients_created: AtomicUsize,
}

impl FakeService {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            discoverers: HashMap::new(),
            auditors: HashMap::new(),
            client_fails: false,
            clients_created: AtomicUsize::new(0),
        }
    }

    pub fn with_discoverer(mut self, discoverer: Arc<dyn Discoverer>) -> Self {
        self.discoverers
            .insert(discoverer.resource_type().to_string(), discoverer);
        self
    }

    pub fn with_auditor(mut self, auditor: Arc<dyn Auditor>) -> Self {
        self.auditors
            .insert(auditor.resource_type().to_string(), auditor);
        self
    }

    pub fn with_failing_client(mut self) -> Self {
        self.client_fails = true;
        self
    }
}

#[async_trait]
impl Service for FakeService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_client(&self, session: &Session) -> anyhow::Result<ServiceClient> {
        self.clients_created.fetch_add(1, Ordering::SeqCst);
        if self.client_fails {
            anyhow::bail!("authentication failed for {}", session.cloud);
        }
        Ok(Arc::new(format!("{}-client", self.name)))
    }

    fn resource_auditor(&self, resource_type: &str) -> Result<Arc<dyn Auditor>, LookupError> {
        self.auditors
            .get(resource_type)
            .cloned()
            .ok_or_else(|| LookupError::auditor(&self.name, resource_type))
    }

    fn resource_discoverer(
        &self,
        resource_type: &str,
    ) -> Result<Arc<dyn Discoverer>, LookupError> {
        self.discoverers
            .get(resource_type)
            .cloned()
            .ok_or_else(|| LookupError::discoverer(&self.name, resource_type))
    }
}

// =============================================================================
// DISCOVERERS
// =============================================================================

/// Yields a fixed set of jobs.
pub struct StaticDiscoverer {
    service: String,
    resource_type: String,
    count: usize,
}

impl StaticDiscoverer {
    pub fn new(service: &str, resource_type: &str, count: usize) -> Arc<Self> {
        Arc::new(Self {
            service: service.to_string(),
            resource_type: resource_type.to_string(),
            count,
        })
    }
}

#[async_trait]
impl Discoverer for StaticDiscoverer {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    async fn discover(
        &self,
        _cancel: CancelToken,
        _client: ServiceClient,
        _all_tenants: bool,
    ) -> anyhow::Result<JobStream> {
        let jobs = (0..self.count)
            .map(|i| {
                let id = format!("{}-{}", self.resource_type, i);
                Job::new(
                    &self.service,
                    &self.resource_type,
                    &id,
                    json!({"id": id, "name": format!("res-{}", i)}),
                )
                .with_project("p-1")
            })
            .collect();
        Ok(JobStream::from_jobs(jobs))
    }
}

/// Never yields; its feeding task ends only when the run is cancelled.
pub struct PendingDiscoverer {
    resource_type: String,
    pub feeder_stopped: Arc<AtomicBool>,
}

impl PendingDiscoverer {
    pub fn new(resource_type: &str) -> Arc<Self> {
        Arc::new(Self {
            resource_type: resource_type.to_string(),
            feeder_stopped: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[async_trait]
impl Discoverer for PendingDiscoverer {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    async fn discover(
        &self,
        cancel: CancelToken,
        _client: ServiceClient,
        _all_tenants: bool,
    ) -> anyhow::Result<JobStream> {
        let (tx, rx) = mpsc::channel::<Job>(1);
        let stopped = self.feeder_stopped.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            drop(tx);
            stopped.store(true, Ordering::SeqCst);
        });
        Ok(JobStream::new(rx))
    }
}

/// Fails before producing anything.
pub struct FailingDiscoverer {
    resource_type: String,
}

impl FailingDiscoverer {
    pub fn new(resource_type: &str) -> Arc<Self> {
        Arc::new(Self {
            resource_type: resource_type.to_string(),
        })
    }
}

#[async_trait]
impl Discoverer for FailingDiscoverer {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    async fn discover(
        &self,
        _cancel: CancelToken,
        _client: ServiceClient,
        _all_tenants: bool,
    ) -> anyhow::Result<JobStream> {
        anyhow::bail!("list endpoint returned 500")
    }
}

// =============================================================================
// AUDITOR
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Compliant,
    Violation,
    CheckError,
}

pub struct FakeAuditor {
    resource_type: String,
    verdict: Verdict,
    fix_fails: bool,
    pub checks: AtomicUsize,
    pub fixes: AtomicUsize,
}

impl FakeAuditor {
    pub fn new(resource_type: &str, verdict: Verdict) -> Arc<Self> {
        Arc::new(Self {
            resource_type: resource_type.to_string(),
            verdict,
            fix_fails: false,
            checks: AtomicUsize::new(0),
            fixes: AtomicUsize::new(0),
        })
    }

    pub fn failing_fix(resource_type: &str) -> Arc<Self> {
        Arc::new(Self {
            resource_type: resource_type.to_string(),
            verdict: Verdict::Violation,
            fix_fails: true,
            checks: AtomicUsize::new(0),
            fixes: AtomicUsize::new(0),
        })
    }

    pub fn fix_calls(&self) -> usize {
        self.fixes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Auditor for FakeAuditor {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    async fn check(
        &self,
        _cancel: &CancelToken,
        job: &Job,
        rule: &Rule,
    ) -> anyhow::Result<AuditResult> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let mut result = AuditResult::for_job(job, rule);
        match self.verdict {
            Verdict::Compliant => {}
            Verdict::Violation => result.flag("flagged by fake auditor"),
            Verdict::CheckError => anyhow::bail!("payload missing status"),
        }
        Ok(result)
    }

    async fn fix(
        &self,
        _cancel: &CancelToken,
        client: &ServiceClient,
        _job: &Job,
        _rule: &Rule,
    ) -> anyhow::Result<()> {
        self.fixes.fetch_add(1, Ordering::SeqCst);
        warden_runtime::downcast_client::<String>(client)?;
        if self.fix_fails {
            anyhow::bail!("403 forbidden");
        }
        Ok(())
    }
}

// =============================================================================
// EVENTS
// =============================================================================

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &RunEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// =============================================================================
// POLICY AND RUN HELPERS
// =============================================================================

pub fn rule(name: &str, service: &str, resource: &str, action: &str) -> Rule {
    Rule {
        name: name.to_string(),
        service: service.to_string(),
        resource: resource.to_string(),
        action: action.to_string(),
        tag_name: if action == "tag" {
            "audit".to_string()
        } else {
            String::new()
        },
        severity: "high".to_string(),
        ..Default::default()
    }
}

/// Group rules by service in first-seen order.
pub fn policy(rules: Vec<Rule>) -> Policy {
    let mut policies: Vec<ServicePolicy> = Vec::new();
    for rule in rules {
        match policies.iter_mut().find(|sp| sp.service == rule.service) {
            Some(sp) => sp.rules.push(rule),
            None => policies.push(ServicePolicy {
                service: rule.service.clone(),
                rules: vec![rule],
            }),
        }
    }
    Policy {
        version: "v1".to_string(),
        policies,
        ..Default::default()
    }
}

pub fn options() -> RunOptions {
    RunOptions::default()
        .with_workers(4)
        .with_signal_handling(false)
}

/// Drain a run, failing the test if it does not finish in time.
pub async fn collect(mut stream: ResultStream) -> Vec<AuditResult> {
    let results = tokio::time::timeout(Duration::from_secs(5), async {
        let mut results = Vec::new();
        while let Some(result) = stream.recv().await {
            results.push(result);
        }
        results
    })
    .await
    .expect("result stream did not close");

    tokio::time::timeout(Duration::from_secs(5), stream.join())
        .await
        .expect("run tasks did not finish")
        .expect("run task failed");
    results
}
