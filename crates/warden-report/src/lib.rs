//! # warden-report
//!
//! Turns a run's results and events into output.
//!
//! | piece                  | input                | output                               |
//! |------------------------|----------------------|--------------------------------------|
//! | [`consume_results`]    | result stream        | [`Summary`] + findings via a writer  |
//! | [`JsonLinesWriter`]    | reportable results   | one JSON [`Finding`] per line        |
//! | [`ConsoleWriter`]      | reportable results   | one human-readable line per result   |
//! | [`EventCounters`]      | run events           | [`CounterSnapshot`]                  |
//! | [`init_tracing`]       | [`LogConfig`]        | global `tracing` subscriber          |
//!
//! A result is reportable when it is non-compliant or carries an audit or
//! remediation error.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden_core::{LogConfig, Policy, RunOptions, Session};
//! use warden_report::{EventCounters, consume_results, init_tracing, new_writer};
//! use warden_runtime::{Orchestrator, Registries};
//!
//! # async fn example(policy: Policy) -> Result<(), Box<dyn std::error::Error>> {
//! init_tracing(&LogConfig::default())?;
//!
//! let counters = Arc::new(EventCounters::new());
//! let orchestrator = Orchestrator::new(
//!     policy,
//!     Session::new("prod"),
//!     Registries::global().services.clone(),
//!     RunOptions::default(),
//! )
//! .with_event_sink(counters.clone());
//!
//! let mut results = orchestrator.run();
//! let mut writer = new_writer("jsonl", Box::new(std::fs::File::create("findings.jsonl")?))?;
//! let summary = consume_results(&mut results, Some(writer.as_mut())).await;
//! results.join().await?;
//!
//! println!("{summary}");
//! println!("{:?}", counters.snapshot());
//! # Ok(())
//! # }
//! ```
//!
//! [`LogConfig`]: warden_core::LogConfig

pub mod counters;
pub mod error;
pub mod finding;
pub mod summary;
pub mod telemetry;
pub mod writer;

pub use counters::{CounterSnapshot, EventCounters};
pub use error::ReportError;
pub use finding::Finding;
pub use summary::{Summary, consume_results, is_reportable};
pub use telemetry::init_tracing;
pub use writer::{ConsoleWriter, JsonLinesWriter, NullWriter, ResultWriter, new_writer};
