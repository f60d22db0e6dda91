//! Discovery plumbing shared by adapters.
//!
//! [`JobStream`] is the sequence a [`Discoverer`](crate::adapter::Discoverer)
//! hands back. [`discover_paged`] turns any paginated list API into one:
//!
//! | failure                         | scope          | effect                        |
//! |---------------------------------|----------------|-------------------------------|
//! | page fetch or extraction fails  | resource type  | logged, stream closed         |
//! | job construction fails          | one resource   | logged, resource skipped      |
//! | cancellation                    | whole run      | stream closed                 |

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use warden_core::Job;

use crate::cancel::CancelToken;

/// Queue capacity between a discovery task and its consumer.
pub const DEFAULT_DISCOVERY_BUFFER: usize = 100;

/// A finite, non-restartable sequence of discovered jobs.
///
/// The producing task closes the underlying queue when it finishes, so the
/// stream ends exactly once and never yields a job twice.
#[derive(Debug)]
pub struct JobStream {
    rx: mpsc::Receiver<Job>,
}

impl JobStream {
    pub fn new(rx: mpsc::Receiver<Job>) -> Self {
        Self { rx }
    }

    /// A stream over already-materialized jobs.
    pub fn from_jobs(jobs: Vec<Job>) -> Self {
        let (tx, rx) = mpsc::channel(jobs.len().max(1));
        for job in jobs {
            // Capacity covers every job, so this cannot fail.
            let _ = tx.try_send(job);
        }
        Self { rx }
    }

    pub fn empty() -> Self {
        Self::from_jobs(Vec::new())
    }

    pub async fn recv(&mut self) -> Option<Job> {
        self.rx.recv().await
    }
}

impl Stream for JobStream {
    type Item = Job;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Job>> {
        self.rx.poll_recv(cx)
    }
}

/// Drain a paginated list API into a [`JobStream`].
///
/// `pages` yields one page per item. `extract` turns a page into raw resource
/// payloads and `create_job` builds a [`Job`] from one payload and the resource
/// type. Cancellation is checked before each page, before each job and on
/// every send.
pub fn discover_paged<P, S, E, C>(
    cancel: CancelToken,
    service: &str,
    resource_type: &str,
    pages: S,
    extract: E,
    create_job: C,
) -> JobStream
where
    P: Send + 'static,
    S: Stream<Item = anyhow::Result<P>> + Send + 'static,
    E: Fn(P) -> anyhow::Result<Vec<Value>> + Send + 'static,
    C: Fn(Value, &str) -> anyhow::Result<Job> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(DEFAULT_DISCOVERY_BUFFER);
    let service = service.to_string();
    let resource_type = resource_type.to_string();

    tokio::spawn(async move {
        let mut pages = Box::pin(pages);
        let mut page_index = 0usize;
        let mut sent = 0usize;

        'pages: loop {
            if cancel.is_cancelled() {
                break;
            }
            let page = tokio::select! {
                _ = cancel.cancelled() => break,
                page = pages.next() => page,
            };
            let Some(page) = page else { break };
            page_index += 1;

            if cancel.is_cancelled() {
                break;
            }
            let resources = match page.and_then(&extract) {
                Ok(resources) => resources,
                Err(e) => {
                    error!(
                        service = %service,
                        resource = %resource_type,
                        page = page_index,
                        error = %format!("{:#}", e),
                        "discovery page failed, stopping discovery for this resource type"
                    );
                    break;
                }
            };

            for resource in resources {
                if cancel.is_cancelled() {
                    break 'pages;
                }
                let job = match create_job(resource, &resource_type) {
                    Ok(job) => job,
                    Err(e) => {
                        warn!(
                            service = %service,
                            resource = %resource_type,
                            error = %format!("{:#}", e),
                            "skipping resource"
                        );
                        continue;
                    }
                };
                tokio::select! {
                    _ = cancel.cancelled() => break 'pages,
                    result = tx.send(job) => {
                        if result.is_err() {
                            // Consumer dropped the stream.
                            break 'pages;
                        }
                        sent += 1;
                    }
                }
            }
        }

        debug!(
            service = %service,
            resource = %resource_type,
            pages = page_index,
            jobs = sent,
            "discovery finished"
        );
    });

    JobStream::new(rx)
}

/// Build a job constructor from field accessors.
///
/// An empty id is an error, so [`discover_paged`] skips such resources. An empty
/// project id leaves [`Job::project_id`] unset.
pub fn simple_job_creator<I, P>(
    service: impl Into<String>,
    id_fn: I,
    project_fn: P,
) -> impl Fn(Value, &str) -> anyhow::Result<Job> + Send + Sync + 'static
where
    I: Fn(&Value) -> String + Send + Sync + 'static,
    P: Fn(&Value) -> String + Send + Sync + 'static,
{
    let service = service.into();
    move |resource: Value, resource_type: &str| {
        let id = id_fn(&resource);
        if id.is_empty() {
            anyhow::bail!("{} {} has no id", service, resource_type);
        }
        let project = project_fn(&resource);
        Ok(Job::new(service.clone(), resource_type, id, resource).with_project(project))
    }
}
