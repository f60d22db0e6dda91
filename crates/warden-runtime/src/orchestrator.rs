//! The run scheduler.
//!
//! One run:
//!
//! 1. indexes every rule by `(service, resource type)`;
//! 2. resolves each referenced service and, per unit, its discoverer;
//! 3. spawns one producer per unit that feeds discovered jobs into a shared,
//!    bounded job queue;
//! 4. spawns a fixed pool of workers that evaluate every indexed rule against
//!    each job, gate remediation and push results into a bounded result queue;
//! 5. closes the job queue once every producer is done and the result queue
//!    once every worker is done.
//!
//! Lookup failures skip only the affected unit. Cancellation, from
//! [`Orchestrator::stop`], [`ResultStream::stop`] or SIGINT/SIGTERM, is raced
//! against every queue operation.

use std::collections::{BTreeMap, BTreeSet};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;
use warden_core::{
    Action, AuditResult, Job, PhaseError, Policy, RemediationOutcome, Rule, RunOptions, Session,
    SkipReason,
};

use crate::adapter::{Auditor, Discoverer, Service};
use crate::cancel::CancelToken;
use crate::client::ClientCache;
use crate::error::RunError;
use crate::hooks::{EventSink, NoopSink, RunEvent};
use crate::registry::ServiceRegistry;

/// Rules grouped by lowercase `(service, resource type)`.
#[derive(Debug, Default)]
pub struct RuleIndex {
    units: BTreeMap<(String, String), Vec<Rule>>,
}

impl RuleIndex {
    pub fn build(policy: &Policy) -> Self {
        let mut units: BTreeMap<(String, String), Vec<Rule>> = BTreeMap::new();
        for rule in policy.all_rules() {
            let key = (
                rule.service.trim().to_ascii_lowercase(),
                rule.resource.trim().to_ascii_lowercase(),
            );
            units.entry(key).or_default().push(rule);
        }
        Self { units }
    }

    pub fn rules_for(&self, service: &str, resource_type: &str) -> &[Rule] {
        self.units
            .get(&(
                service.to_ascii_lowercase(),
                resource_type.to_ascii_lowercase(),
            ))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Distinct services, sorted.
    pub fn services(&self) -> BTreeSet<&str> {
        self.units.keys().map(|(service, _)| service.as_str()).collect()
    }

    /// `(resource type, rules)` for one service.
    pub fn units_for<'a>(
        &'a self,
        service: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a [Rule])> + 'a {
        self.units
            .iter()
            .filter(move |((s, _), _)| s == service)
            .map(|((_, resource_type), rules)| (resource_type.as_str(), rules.as_slice()))
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn rule_count(&self) -> usize {
        self.units.values().map(Vec::len).sum()
    }
}

/// A rule field the resource's auditor does not declare as implemented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncoveredCheck {
    pub rule: String,
    pub service: String,
    pub resource_type: String,
    pub check: &'static str,
}

/// Rule fields not covered by auditors that declare their implemented checks.
///
/// Auditors with an empty [`Auditor::implemented_checks`] are not reported.
pub fn uncovered_checks(services: &ServiceRegistry, index: &RuleIndex) -> Vec<UncoveredCheck> {
    let mut uncovered = Vec::new();
    for service_name in index.services() {
        let Ok(service) = services.get(service_name) else {
            continue;
        };
        for (resource_type, rules) in index.units_for(service_name) {
            let Ok(auditor) = service.resource_auditor(resource_type) else {
                continue;
            };
            let implemented = auditor.implemented_checks();
            if implemented.is_empty() {
                continue;
            }
            for rule in rules {
                for field in rule.check.set_fields() {
                    if !implemented.contains(&field) {
                        uncovered.push(UncoveredCheck {
                            rule: rule.name.clone(),
                            service: service_name.to_string(),
                            resource_type: resource_type.to_string(),
                            check: field.as_str(),
                        });
                    }
                }
            }
        }
    }
    uncovered
}

/// Schedules discovery, evaluation and remediation for one policy.
pub struct Orchestrator {
    policy: Policy,
    session: Session,
    services: Arc<ServiceRegistry>,
    options: RunOptions,
    events: Arc<dyn EventSink>,
    cancel: CancelToken,
}

impl Orchestrator {
    /// `policy` is expected to be validated already.
    pub fn new(
        policy: Policy,
        session: Session,
        services: Arc<ServiceRegistry>,
        options: RunOptions,
    ) -> Self {
        Self {
            policy,
            session,
            services,
            options,
            events: Arc::new(NoopSink),
            cancel: CancelToken::new(),
        }
    }

    /// Report run events to `sink`.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Cancel every run started by this orchestrator.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Worker pool size: the policy default, then the run options, then 16.
    pub fn worker_count(&self) -> usize {
        self.policy.effective_workers(self.options.workers)
    }

    /// Start a run and return its result stream.
    ///
    /// Must be called from within a Tokio runtime. Results arrive in no
    /// particular order; the stream ends once every worker has finished.
    pub fn run(&self) -> ResultStream {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        let _entered = span.enter();

        let index = RuleIndex::build(&self.policy);
        for gap in uncovered_checks(&self.services, &index) {
            warn!(
                rule = %gap.rule,
                service = %gap.service,
                resource = %gap.resource_type,
                check = gap.check,
                "policy rule uses check not implemented by auditor"
            );
        }

        let workers = self.worker_count();
        info!(
            rules = index.rule_count(),
            units = index.unit_count(),
            workers,
            apply = self.options.apply,
            all_tenants = self.options.all_tenants,
            "starting run"
        );

        let (job_tx, job_rx) = mpsc::channel::<Job>(self.options.jobs_buffer.max(1));
        let (result_tx, result_rx) = mpsc::channel::<AuditResult>(self.options.results_buffer.max(1));

        let units = self.resolve_units(&index);
        let ctx = Arc::new(RunContext {
            services: self.services.clone(),
            session: self.session.clone(),
            options: self.options.clone(),
            rules: index,
            clients: ClientCache::new(),
            events: self.events.clone(),
            cancel: self.cancel.clone(),
        });

        let mut producers = JoinSet::new();
        for (service, discoverer) in units {
            producers.spawn(
                produce(ctx.clone(), service, discoverer, job_tx.clone()).in_current_span(),
            );
        }
        // Producers hold the only senders now; the queue closes when they finish.
        drop(job_tx);

        let job_rx = Arc::new(Mutex::new(job_rx));
        let mut pool = JoinSet::new();
        for id in 0..workers {
            pool.spawn(work(ctx.clone(), id, job_rx.clone(), result_tx.clone()).in_current_span());
        }
        drop(result_tx);

        let signals = self.options.handle_signals.then(|| {
            let cancel = self.cancel.clone();
            tokio::spawn(cancel_on_signal(cancel).in_current_span())
        });

        let supervisor = tokio::spawn(
            async move {
                let mut failure = None;
                while let Some(joined) = producers.join_next().await {
                    if let Err(e) = joined {
                        error!(error = %e, "producer task failed");
                        failure.get_or_insert(e);
                    }
                }
                debug!("discovery finished");
                while let Some(joined) = pool.join_next().await {
                    if let Err(e) = joined {
                        error!(error = %e, "worker task failed");
                        failure.get_or_insert(e);
                    }
                }
                if let Some(signals) = signals {
                    signals.abort();
                }
                info!("run finished");
                match failure {
                    Some(e) => Err(RunError::from(e)),
                    None => Ok(()),
                }
            }
            .in_current_span(),
        );

        ResultStream {
            results: Some(result_rx),
            supervisor,
            cancel: self.cancel.clone(),
        }
    }

    /// Resolve the service and discoverer for every unit. Failures are
    /// reported and skip only the affected units.
    fn resolve_units(&self, index: &RuleIndex) -> Vec<(Arc<dyn Service>, Arc<dyn Discoverer>)> {
        let mut units = Vec::new();
        for service_name in index.services() {
            let service = match self.services.get(service_name) {
                Ok(service) => service,
                Err(e) => {
                    warn!(service = service_name, error = %e, "service not found");
                    self.events.record(&RunEvent::ServiceNotFound {
                        service: service_name.to_string(),
                    });
                    continue;
                }
            };

            for (resource_type, _) in index.units_for(service_name) {
                match service.resource_discoverer(resource_type) {
                    Ok(discoverer) => units.push((service.clone(), discoverer)),
                    Err(e) => {
                        warn!(
                            service = service_name,
                            resource = resource_type,
                            error = %e,
                            "discoverer not found"
                        );
                        self.events.record(&RunEvent::DiscovererNotFound {
                            service: service_name.to_string(),
                            resource_type: resource_type.to_string(),
                        });
                    }
                }
            }
        }
        units
    }
}

/// State shared by every task of one run.
struct RunContext {
    services: Arc<ServiceRegistry>,
    session: Session,
    options: RunOptions,
    rules: RuleIndex,
    clients: ClientCache,
    events: Arc<dyn EventSink>,
    cancel: CancelToken,
}

/// Drain one discoverer into the shared job queue.
async fn produce(
    ctx: Arc<RunContext>,
    service: Arc<dyn Service>,
    discoverer: Arc<dyn Discoverer>,
    jobs: mpsc::Sender<Job>,
) {
    let service_name = service.name().to_string();
    let resource_type = discoverer.resource_type().to_string();

    let client = tokio::select! {
        _ = ctx.cancel.cancelled() => return,
        client = ctx.clients.get_or_create(service.as_ref(), &ctx.session) => client,
    };
    let client = match client {
        Ok(client) => client,
        Err(e) => {
            warn!(
                service = %service_name,
                resource = %resource_type,
                error = %format!("{:#}", e),
                "failed to get client"
            );
            ctx.events.record(&RunEvent::ClientError {
                service: service_name,
            });
            return;
        }
    };

    let discovered = tokio::select! {
        _ = ctx.cancel.cancelled() => return,
        stream = discoverer.discover(ctx.cancel.clone(), client, ctx.options.all_tenants) => stream,
    };
    let mut stream = match discovered {
        Ok(stream) => stream,
        Err(e) => {
            error!(
                service = %service_name,
                resource = %resource_type,
                error = %format!("{:#}", e),
                "discovery error"
            );
            ctx.events.record(&RunEvent::DiscoveryError {
                service: service_name,
                resource_type,
            });
            return;
        }
    };

    let mut forwarded = 0usize;
    loop {
        let job = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            job = stream.recv() => job,
        };
        let Some(job) = job else { break };
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            sent = jobs.send(job) => {
                if sent.is_err() {
                    break;
                }
                forwarded += 1;
            }
        }
    }
    debug!(service = %service_name, resource = %resource_type, jobs = forwarded, "producer done");
}

/// Take jobs from the shared queue until it closes or the run is cancelled.
async fn work(
    ctx: Arc<RunContext>,
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    results: mpsc::Sender<AuditResult>,
) {
    debug!(worker = id, "worker started");
    let mut processed = 0usize;
    loop {
        let next = async { jobs.lock().await.recv().await };
        let job = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            job = next => job,
        };
        let Some(job) = job else { break };
        processed += 1;
        if !process_job(&ctx, id, &job, &results).await {
            break;
        }
    }
    debug!(worker = id, jobs = processed, "worker stopped");
}

/// Evaluate every indexed rule against `job`. Returns `false` when the worker
/// should stop.
async fn process_job(
    ctx: &RunContext,
    worker: usize,
    job: &Job,
    results: &mpsc::Sender<AuditResult>,
) -> bool {
    let rules = ctx.rules.rules_for(&job.service, &job.resource_type);
    if rules.is_empty() {
        debug!(worker, service = %job.service, resource = %job.resource_type, "no rules for job");
        return true;
    }

    let service = match ctx.services.get(&job.service) {
        Ok(service) => service,
        Err(e) => {
            warn!(worker, service = %job.service, error = %e, "service not found");
            ctx.events.record(&RunEvent::ServiceNotFound {
                service: job.service.clone(),
            });
            return true;
        }
    };
    ctx.events.record(&RunEvent::ResourceScanned {
        service: job.service.clone(),
        resource_type: job.resource_type.clone(),
    });

    for rule in rules {
        if ctx.cancel.is_cancelled() {
            return false;
        }

        let auditor = match service.resource_auditor(&job.resource_type) {
            Ok(auditor) => auditor,
            Err(e) => {
                warn!(
                    worker,
                    service = %job.service,
                    resource = %job.resource_type,
                    error = %e,
                    "auditor not found"
                );
                ctx.events.record(&RunEvent::AuditorNotFound {
                    service: job.service.clone(),
                    resource_type: job.resource_type.clone(),
                });
                continue;
            }
        };

        let result = evaluate(ctx, worker, service.as_ref(), auditor.as_ref(), job, rule).await;

        tokio::select! {
            _ = ctx.cancel.cancelled() => return false,
            sent = results.send(result) => {
                if sent.is_err() {
                    return false;
                }
            }
        }
    }
    true
}

/// Check one rule and, for a violation, apply remediation gating.
async fn evaluate(
    ctx: &RunContext,
    worker: usize,
    service: &dyn Service,
    auditor: &dyn Auditor,
    job: &Job,
    rule: &Rule,
) -> AuditResult {
    let mut result = match auditor.check(&ctx.cancel, job, rule).await {
        Ok(result) => result,
        Err(e) => {
            warn!(
                worker,
                rule = %rule.name,
                resource_id = %job.resource_id,
                error = %format!("{:#}", e),
                "check failed"
            );
            AuditResult::audit_failure(job, rule, e)
        }
    };
    result.fill_from(job, rule);

    if result.error.is_some() {
        ctx.events.record(&RunEvent::EvaluationError {
            service: job.service.clone(),
            resource_type: job.resource_type.clone(),
            rule: rule.name.clone(),
        });
        return result;
    }
    if result.compliant {
        return result;
    }

    ctx.events.record(&RunEvent::ViolationFound {
        service: job.service.clone(),
        resource_type: job.resource_type.clone(),
        rule: rule.name.clone(),
    });

    match rule.remediation_action() {
        Some(action) if action != Action::Log => {
            result.remediation = remediate(ctx, worker, service, auditor, job, rule, action).await;
        }
        _ => {}
    }
    result
}

/// Decide whether the rule's action may run, and run it at most once.
async fn remediate(
    ctx: &RunContext,
    worker: usize,
    service: &dyn Service,
    auditor: &dyn Auditor,
    job: &Job,
    rule: &Rule,
    action: Action,
) -> RemediationOutcome {
    let skip = if !ctx.options.apply {
        Some(SkipReason::DryRun)
    } else if !ctx.options.is_action_allowed(action) {
        Some(SkipReason::ActionNotAllowed)
    } else {
        None
    };
    if let Some(reason) = skip {
        ctx.events.record(&RunEvent::RemediationSkipped {
            service: job.service.clone(),
            resource_type: job.resource_type.clone(),
            reason,
        });
        return RemediationOutcome::Skipped { reason };
    }

    let client = match ctx.clients.get_or_create(service, &ctx.session).await {
        Ok(client) => client,
        Err(e) => {
            warn!(worker, service = %job.service, error = %format!("{:#}", e), "failed to get client");
            ctx.events.record(&RunEvent::ClientError {
                service: job.service.clone(),
            });
            return RemediationOutcome::Failed {
                error: PhaseError::remediation(e),
            };
        }
    };

    ctx.events.record(&RunEvent::RemediationAttempted {
        service: job.service.clone(),
        resource_type: job.resource_type.clone(),
        action,
    });
    match auditor.fix(&ctx.cancel, &client, job, rule).await {
        Ok(()) => {
            info!(
                worker,
                rule = %rule.name,
                resource_id = %job.resource_id,
                action = %action,
                "remediated"
            );
            ctx.events.record(&RunEvent::RemediationSucceeded {
                service: job.service.clone(),
                resource_type: job.resource_type.clone(),
                action,
            });
            RemediationOutcome::Succeeded
        }
        Err(e) => {
            warn!(
                worker,
                rule = %rule.name,
                resource_id = %job.resource_id,
                action = %action,
                error = %format!("{:#}", e),
                "remediation failed"
            );
            ctx.events.record(&RunEvent::RemediationFailed {
                service: job.service.clone(),
                resource_type: job.resource_type.clone(),
                action,
            });
            RemediationOutcome::Failed {
                error: PhaseError::remediation(e),
            }
        }
    }
}

/// Cancel the run on SIGINT or SIGTERM. Ends quietly once the run is cancelled
/// by other means.
async fn cancel_on_signal(cancel: CancelToken) {
    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            warn!("shutdown signal received, cancelling run");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "failed to install signal handlers, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Handle to a running orchestration: the result stream plus task control.
pub struct ResultStream {
    results: Option<mpsc::Receiver<AuditResult>>,
    supervisor: JoinHandle<Result<(), RunError>>,
    cancel: CancelToken,
}

impl ResultStream {
    /// Next result, or `None` once every worker has finished.
    pub async fn recv(&mut self) -> Option<AuditResult> {
        match self.results.as_mut() {
            Some(results) => results.recv().await,
            None => None,
        }
    }

    /// Cancel the run.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Stop consuming and wait for every producer and worker task to end.
    ///
    /// Unconsumed results are dropped. Call [`stop`](Self::stop) first to
    /// abandon discovery that would otherwise run to completion.
    pub async fn join(self) -> Result<(), RunError> {
        let Self {
            results,
            supervisor,
            ..
        } = self;
        drop(results);
        supervisor.await?
    }
}

impl Stream for ResultStream {
    type Item = AuditResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<AuditResult>> {
        match self.results.as_mut() {
            Some(results) => results.poll_recv(cx),
            None => Poll::Ready(None),
        }
    }
}

impl std::fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream")
            .field("open", &self.results.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{CheckConditions, ServicePolicy};

    fn policy() -> Policy {
        let rule = |name: &str, resource: &str, check: CheckConditions| Rule {
            name: name.into(),
            resource: resource.into(),
            action: "log".into(),
            check,
            ..Default::default()
        };
        Policy {
            version: "v1".into(),
            policies: vec![
                ServicePolicy {
                    service: "Nova".into(),
                    rules: vec![
                        rule("a", "instance", CheckConditions::default()),
                        rule("b", "Instance", CheckConditions::default()),
                        rule("c", "keypair", CheckConditions::default()),
                    ],
                },
                ServicePolicy {
                    service: "cinder".into(),
                    rules: vec![rule("d", "volume", CheckConditions::default())],
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_rule_index_groups_case_insensitively() {
        let index = RuleIndex::build(&policy());
        assert_eq!(index.unit_count(), 3);
        assert_eq!(index.rule_count(), 4);
        assert_eq!(index.rules_for("nova", "INSTANCE").len(), 2);
        assert_eq!(index.rules_for("cinder", "volume")[0].name, "d");
        assert!(index.rules_for("glance", "image").is_empty());
        assert_eq!(
            index.services().into_iter().collect::<Vec<_>>(),
            vec!["cinder", "nova"]
        );
        let nova: Vec<_> = index.units_for("nova").map(|(r, _)| r).collect();
        assert_eq!(nova, vec!["instance", "keypair"]);
    }

    #[test]
    fn test_worker_count_prefers_policy_default() {
        let mut p = policy();
        let services = Arc::new(ServiceRegistry::new());
        let orch = Orchestrator::new(
            p.clone(),
            Session::default(),
            services.clone(),
            RunOptions::default().with_workers(3),
        );
        assert_eq!(orch.worker_count(), 3);

        p.defaults.workers = 5;
        let orch = Orchestrator::new(p, Session::default(), services, RunOptions::default());
        assert_eq!(orch.worker_count(), 5);
    }
}
