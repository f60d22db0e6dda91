//! A whole run consumed into findings, a summary and event counters.

use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use warden_core::{AuditResult, Job, Policy, Rule, RunOptions, ServicePolicy, Session};
use warden_report::{EventCounters, Finding, consume_results, new_writer};
use warden_runtime::{
    Auditor, CancelToken, Discoverer, JobStream, LookupError, Orchestrator, ResourceView, Service,
    ServiceClient, ServiceRegistry, base_result, check_status,
};

// =============================================================================
// ADAPTER
// =============================================================================

struct Volumes;

#[async_trait]
impl Discoverer for Volumes {
    fn resource_type(&self) -> &str {
        "volume"
    }

    async fn discover(
        &self,
        _cancel: CancelToken,
        _client: ServiceClient,
        _all_tenants: bool,
    ) -> anyhow::Result<JobStream> {
        let volumes = [("v-1", "in-use"), ("v-2", "error"), ("v-3", "available"), ("v-4", "error")];
        Ok(JobStream::from_jobs(
            volumes
                .iter()
                .map(|(id, status)| {
                    Job::new(
                        "cinder",
                        "volume",
                        *id,
                        json!({"id": id, "name": format!("vol-{id}"), "status": status, "tenant_id": "p-9"}),
                    )
                })
                .collect(),
        ))
    }
}

struct VolumeAuditor;

#[async_trait]
impl Auditor for VolumeAuditor {
    fn resource_type(&self) -> &str {
        "volume"
    }

    async fn check(
        &self,
        _cancel: &CancelToken,
        job: &Job,
        rule: &Rule,
    ) -> anyhow::Result<AuditResult> {
        let mut result = base_result(job, rule, &job.resource);
        check_status(&job.resource, rule, &mut result);
        Ok(result)
    }

    async fn fix(
        &self,
        _cancel: &CancelToken,
        _client: &ServiceClient,
        job: &Job,
        _rule: &Rule,
    ) -> anyhow::Result<()> {
        if job.resource.status() == "error" && job.resource_id == "v-4" {
            anyhow::bail!("volume is locked");
        }
        Ok(())
    }
}

struct Cinder;

#[async_trait]
impl Service for Cinder {
    fn name(&self) -> &str {
        "cinder"
    }

    async fn get_client(&self, _session: &Session) -> anyhow::Result<ServiceClient> {
        Ok(Arc::new(()))
    }

    fn resource_auditor(&self, resource_type: &str) -> Result<Arc<dyn Auditor>, LookupError> {
        match resource_type {
            "volume" => Ok(Arc::new(VolumeAuditor)),
            other => Err(LookupError::auditor("cinder", other)),
        }
    }

    fn resource_discoverer(
        &self,
        resource_type: &str,
    ) -> Result<Arc<dyn Discoverer>, LookupError> {
        match resource_type {
            "volume" => Ok(Arc::new(Volumes)),
            other => Err(LookupError::discoverer("cinder", other)),
        }
    }
}

fn policy() -> Policy {
    let mut rule = Rule {
        name: "errored-volumes".into(),
        service: "cinder".into(),
        resource: "volume".into(),
        action: "delete".into(),
        severity: "medium".into(),
        ..Default::default()
    };
    rule.check.status = "error".into();
    Policy {
        version: "v1".into(),
        policies: vec![ServicePolicy {
            service: "cinder".into(),
            rules: vec![rule],
        }],
        ..Default::default()
    }
}

// =============================================================================
// END TO END
// =============================================================================

#[tokio::test]
async fn test_run_to_findings_file() {
    let services = ServiceRegistry::new();
    services.register(Arc::new(Cinder)).unwrap();
    let counters = Arc::new(EventCounters::new());

    let orchestrator = Orchestrator::new(
        policy(),
        Session::new("test"),
        Arc::new(services),
        RunOptions::default()
            .with_apply(true)
            .with_workers(2)
            .with_signal_handling(false),
    )
    .with_event_sink(counters.clone());

    let file = tempfile::NamedTempFile::new().unwrap();
    let mut writer = new_writer("jsonl", Box::new(file.reopen().unwrap())).unwrap();

    let mut results = orchestrator.run();
    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        consume_results(&mut results, Some(writer.as_mut())),
    )
    .await
    .unwrap();
    results.join().await.unwrap();

    assert_eq!(summary.scanned, 4);
    assert_eq!(summary.violations, 2);
    assert_eq!(summary.written, 2);
    assert_eq!(summary.remediation_attempted, 2);
    assert_eq!(summary.remediated, 1);
    assert_eq!(summary.errors, 1);

    let snapshot = counters.snapshot();
    assert_eq!(snapshot.scanned, 4);
    assert_eq!(snapshot.violations, 2);
    assert_eq!(snapshot.remediated, 1);
    assert_eq!(snapshot.remediation_failed, 1);

    let mut findings: Vec<Finding> = BufReader::new(file.reopen().unwrap())
        .lines()
        .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
        .collect();
    findings.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));

    assert_eq!(findings.len(), 2);
    assert_eq!(findings[0].resource_id, "v-2");
    assert!(findings[0].remediated);
    assert_eq!(findings[0].project_id, "p-9");
    assert_eq!(findings[0].severity, "medium");
    assert_eq!(findings[1].resource_id, "v-4");
    assert_eq!(findings[1].remediation_error, "volume is locked");
    assert_eq!(findings[1].remediation_error_kind, "remediation");
}
