//! End-to-end orchestrator tests with in-memory adapters.
//!
//! Test areas:
//! - remediation gating: dry-run, allow-list, log rules
//! - phase-tagged errors: check failures vs fix failures
//! - partial failure: missing service / discoverer / auditor / client
//! - scheduling: every (job, rule) pair evaluated exactly once
//! - cancellation: the stream closes and every task ends

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;
use warden_core::{Action, ErrorKind, RemediationOutcome, SkipReason, Session};
use warden_runtime::{Orchestrator, RunEvent, ServiceRegistry};

fn registry(services: Vec<FakeService>) -> Arc<ServiceRegistry> {
    let registry = ServiceRegistry::new();
    for service in services {
        registry.register(Arc::new(service)).unwrap();
    }
    Arc::new(registry)
}

// =============================================================================
// REMEDIATION GATING
// =============================================================================

#[tokio::test]
async fn test_dry_run_skips_fix() {
    let auditor = FakeAuditor::new("instance", Verdict::Violation);
    let services = registry(vec![
        FakeService::new("nova")
            .with_discoverer(StaticDiscoverer::new("nova", "instance", 1))
            .with_auditor(auditor.clone()),
    ]);

    let orch = Orchestrator::new(
        policy(vec![rule("delete-stale", "nova", "instance", "delete")]),
        Session::new("test"),
        services,
        options().with_apply(false),
    );
    let results = collect(orch.run()).await;

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(!result.compliant);
    assert!(!result.remediation_attempted());
    assert_eq!(result.skip_reason(), Some(SkipReason::DryRun));
    assert_eq!(auditor.fix_calls(), 0);
}

#[tokio::test]
async fn test_apply_with_empty_allow_list_fixes() {
    let auditor = FakeAuditor::new("instance", Verdict::Violation);
    let services = registry(vec![
        FakeService::new("nova")
            .with_discoverer(StaticDiscoverer::new("nova", "instance", 1))
            .with_auditor(auditor.clone()),
    ]);

    let orch = Orchestrator::new(
        policy(vec![rule("delete-stale", "nova", "instance", "delete")]),
        Session::new("test"),
        services,
        options().with_apply(true),
    );
    let results = collect(orch.run()).await;

    assert_eq!(results.len(), 1);
    assert!(results[0].remediated());
    assert!(results[0].remediation_attempted());
    assert!(!results[0].compliant);
    assert_eq!(auditor.fix_calls(), 1);
}

#[tokio::test]
async fn test_allow_list_excluding_action_skips_fix() {
    let auditor = FakeAuditor::new("instance", Verdict::Violation);
    let services = registry(vec![
        FakeService::new("nova")
            .with_discoverer(StaticDiscoverer::new("nova", "instance", 1))
            .with_auditor(auditor.clone()),
    ]);

    let orch = Orchestrator::new(
        policy(vec![rule("delete-stale", "nova", "instance", "delete")]),
        Session::new("test"),
        services,
        options()
            .with_apply(true)
            .with_allowed_actions([Action::Tag]),
    );
    let results = collect(orch.run()).await;

    assert_eq!(results.len(), 1);
    assert!(!results[0].remediation_attempted());
    assert_eq!(results[0].skip_reason(), Some(SkipReason::ActionNotAllowed));
    assert_eq!(auditor.fix_calls(), 0);
}

#[tokio::test]
async fn test_log_rule_is_never_remediated() {
    let auditor = FakeAuditor::new("instance", Verdict::Violation);
    let services = registry(vec![
        FakeService::new("nova")
            .with_discoverer(StaticDiscoverer::new("nova", "instance", 2))
            .with_auditor(auditor.clone()),
    ]);

    let orch = Orchestrator::new(
        policy(vec![rule("report-only", "nova", "instance", "log")]),
        Session::new("test"),
        services,
        options().with_apply(true),
    );
    let results = collect(orch.run()).await;

    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(result.is_violation());
        assert_eq!(result.remediation, RemediationOutcome::NotRequired);
    }
    assert_eq!(auditor.fix_calls(), 0);
}

#[tokio::test]
async fn test_compliant_resource_is_not_remediated() {
    let auditor = FakeAuditor::new("instance", Verdict::Compliant);
    let services = registry(vec![
        FakeService::new("nova")
            .with_discoverer(StaticDiscoverer::new("nova", "instance", 3))
            .with_auditor(auditor.clone()),
    ]);

    let orch = Orchestrator::new(
        policy(vec![rule("delete-stale", "nova", "instance", "delete")]),
        Session::new("test"),
        services,
        options().with_apply(true),
    );
    let results = collect(orch.run()).await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.compliant && !r.remediation_attempted()));
    assert_eq!(auditor.fix_calls(), 0);
}

// =============================================================================
// PHASE-TAGGED ERRORS
// =============================================================================

#[tokio::test]
async fn test_check_error_is_audit_error_without_remediation() {
    let auditor = FakeAuditor::new("instance", Verdict::CheckError);
    let services = registry(vec![
        FakeService::new("nova")
            .with_discoverer(StaticDiscoverer::new("nova", "instance", 1))
            .with_auditor(auditor.clone()),
    ]);
    let sink = Arc::new(RecordingSink::default());

    let orch = Orchestrator::new(
        policy(vec![rule("delete-stale", "nova", "instance", "delete")]),
        Session::new("test"),
        services,
        options().with_apply(true),
    )
    .with_event_sink(sink.clone());
    let results = collect(orch.run()).await;

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(!result.compliant);
    let error = result.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::Audit);
    assert!(error.message.contains("payload missing status"));
    assert_eq!(result.remediation, RemediationOutcome::NotRequired);
    assert_eq!(result.severity, "high");
    assert_eq!(auditor.fix_calls(), 0);
    assert_eq!(sink.count("evaluation_error"), 1);
    assert_eq!(sink.count("violation_found"), 0);
}

#[tokio::test]
async fn test_fix_error_keeps_compliance_outcome() {
    let auditor = FakeAuditor::failing_fix("instance");
    let services = registry(vec![
        FakeService::new("nova")
            .with_discoverer(StaticDiscoverer::new("nova", "instance", 1))
            .with_auditor(auditor.clone()),
    ]);
    let sink = Arc::new(RecordingSink::default());

    let orch = Orchestrator::new(
        policy(vec![rule("delete-stale", "nova", "instance", "delete")]),
        Session::new("test"),
        services,
        options().with_apply(true),
    )
    .with_event_sink(sink.clone());
    let results = collect(orch.run()).await;

    let result = &results[0];
    assert!(!result.compliant);
    assert!(result.error.is_none());
    assert!(result.remediation_attempted());
    assert!(!result.remediated());
    let error = result.remediation_error().unwrap();
    assert_eq!(error.kind, ErrorKind::Remediation);
    assert_eq!(error.message, "403 forbidden");
    assert_eq!(auditor.fix_calls(), 1);
    assert_eq!(sink.count("remediation_attempted"), 1);
    assert_eq!(sink.count("remediation_failed"), 1);
}

// =============================================================================
// PARTIAL FAILURE
// =============================================================================

#[tokio::test]
async fn test_lookup_failures_do_not_stop_other_units() {
    let nova_auditor = FakeAuditor::new("instance", Verdict::Violation);
    let services = registry(vec![
        FakeService::new("nova")
            .with_discoverer(StaticDiscoverer::new("nova", "instance", 2))
            .with_auditor(nova_auditor.clone()),
        // cinder discovers volumes but has no auditor for them.
        FakeService::new("cinder").with_discoverer(StaticDiscoverer::new("cinder", "volume", 2)),
        FakeService::new("neutron")
            .with_discoverer(FailingDiscoverer::new("port"))
            .with_auditor(FakeAuditor::new("port", Verdict::Violation)),
        FakeService::new("octavia")
            .with_failing_client()
            .with_discoverer(StaticDiscoverer::new("octavia", "loadbalancer", 1))
            .with_auditor(FakeAuditor::new("loadbalancer", Verdict::Violation)),
    ]);
    let sink = Arc::new(RecordingSink::default());

    let orch = Orchestrator::new(
        policy(vec![
            rule("nova-instances", "nova", "instance", "log"),
            rule("nova-keypairs", "nova", "keypair", "log"),
            rule("cinder-volumes", "cinder", "volume", "log"),
            rule("glance-images", "glance", "image", "log"),
            rule("neutron-ports", "neutron", "port", "log"),
            rule("octavia-lbs", "octavia", "loadbalancer", "log"),
        ]),
        Session::new("test"),
        services,
        options(),
    )
    .with_event_sink(sink.clone());
    let results = collect(orch.run()).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.rule_name == "nova-instances"));

    let events = sink.events();
    assert!(events.contains(&RunEvent::ServiceNotFound {
        service: "glance".into()
    }));
    assert!(events.contains(&RunEvent::DiscovererNotFound {
        service: "nova".into(),
        resource_type: "keypair".into(),
    }));
    assert!(events.contains(&RunEvent::AuditorNotFound {
        service: "cinder".into(),
        resource_type: "volume".into(),
    }));
    assert!(events.contains(&RunEvent::DiscoveryError {
        service: "neutron".into(),
        resource_type: "port".into(),
    }));
    assert!(events.contains(&RunEvent::ClientError {
        service: "octavia".into()
    }));
    assert_eq!(sink.count("resource_scanned"), 4);
}

// =============================================================================
// SCHEDULING
// =============================================================================

#[tokio::test]
async fn test_every_job_and_rule_evaluated_once() {
    let auditor = FakeAuditor::new("instance", Verdict::Compliant);
    let nova = FakeService::new("nova")
        .with_discoverer(StaticDiscoverer::new("nova", "instance", 50))
        .with_auditor(auditor.clone());
    let services = registry(vec![nova]);

    let orch = Orchestrator::new(
        policy(vec![
            rule("first", "nova", "instance", "log"),
            rule("second", "nova", "instance", "log"),
        ]),
        Session::new("test"),
        services.clone(),
        options().with_workers(4).with_buffers(2, 2),
    );
    let results = collect(orch.run()).await;

    assert_eq!(results.len(), 100);
    let pairs: HashSet<_> = results
        .iter()
        .map(|r| (r.rule_name.clone(), r.resource_id.clone()))
        .collect();
    assert_eq!(pairs.len(), 100);
    assert_eq!(auditor.checks.load(Ordering::SeqCst), 100);
    assert!(results.iter().all(|r| r.project_id.as_deref() == Some("p-1")));
}

#[tokio::test]
async fn test_client_created_once_per_service() {
    let nova = Arc::new(
        FakeService::new("nova")
            .with_discoverer(StaticDiscoverer::new("nova", "instance", 5))
            .with_discoverer(StaticDiscoverer::new("nova", "keypair", 5))
            .with_auditor(FakeAuditor::new("instance", Verdict::Violation))
            .with_auditor(FakeAuditor::new("keypair", Verdict::Violation)),
    );
    let services = ServiceRegistry::new();
    services.register(nova.clone()).unwrap();

    let orch = Orchestrator::new(
        policy(vec![
            rule("instances", "nova", "instance", "delete"),
            rule("keypairs", "nova", "keypair", "delete"),
        ]),
        Session::new("test"),
        Arc::new(services),
        options().with_apply(true),
    );
    let results = collect(orch.run()).await;

    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|r| r.remediated()));
    assert_eq!(nova.clients_created.load(Ordering::SeqCst), 1);
}

// =============================================================================
// CANCELLATION
// =============================================================================

#[tokio::test]
async fn test_stop_closes_stream_while_discovery_pending() {
    let discoverer = PendingDiscoverer::new("instance");
    let services = registry(vec![
        FakeService::new("nova")
            .with_discoverer(discoverer.clone())
            .with_auditor(FakeAuditor::new("instance", Verdict::Compliant)),
    ]);

    let orch = Orchestrator::new(
        policy(vec![rule("pending", "nova", "instance", "log")]),
        Session::new("test"),
        services,
        options(),
    );
    let stream = orch.run();

    let cancel = orch.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let results = collect(stream).await;
    assert!(results.is_empty());

    tokio::time::timeout(Duration::from_secs(1), async {
        while !discoverer.feeder_stopped.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("discoverer feed task did not observe cancellation");
}

#[tokio::test]
async fn test_stop_mid_evaluation_unwinds_all_tasks() {
    let services = registry(vec![
        FakeService::new("nova")
            .with_discoverer(StaticDiscoverer::new("nova", "instance", 5_000))
            .with_auditor(FakeAuditor::new("instance", Verdict::Violation)),
    ]);

    let orch = Orchestrator::new(
        policy(vec![rule("busy", "nova", "instance", "log")]),
        Session::new("test"),
        services,
        options().with_buffers(1, 1),
    );
    let mut stream = orch.run();

    let first = stream.recv().await;
    assert!(first.is_some());
    stream.stop();

    let rest = collect(stream).await;
    assert!(rest.len() < 5_000);
}

#[tokio::test]
async fn test_join_without_consuming_finishes() {
    let services = registry(vec![
        FakeService::new("nova")
            .with_discoverer(StaticDiscoverer::new("nova", "instance", 200))
            .with_auditor(FakeAuditor::new("instance", Verdict::Violation)),
    ]);

    let orch = Orchestrator::new(
        policy(vec![rule("unread", "nova", "instance", "log")]),
        Session::new("test"),
        services,
        options().with_buffers(1, 1),
    );
    let stream = orch.run();

    tokio::time::timeout(Duration::from_secs(5), stream.join())
        .await
        .expect("join hung")
        .unwrap();
}
