//! Repocheck - static analysis across a multi-repository checkout.
//!
//! Repocheck runs cppcheck over every component (nested git work tree) of a
//! checkout in parallel, attributes findings to commits and authors with
//! git blame, filters and orders them, and writes summary and per-component
//! reports.
//!
//! # Architecture
//!
//! - `components`: discovery of the components under a target directory
//! - `scan`: analysis jobs, the worker pool, output parsing, blame
//!   enrichment and aggregation
//! - `process`: external commands with a hard deadline
//! - `config`: YAML configuration and the frozen per-run snapshot
//! - `report`: record projection and the Markdown, CSV and XML renderers
//!
//! Every external process goes through [`process::CommandRunner`], so the
//! whole pipeline can run against fake analyzers and fake git.

pub mod cli;
pub mod components;
pub mod config;
pub mod error;
pub mod process;
pub mod report;
pub mod scan;

pub use components::Component;
pub use config::{Config, ScanConfig};
pub use error::{Error, Result};
pub use process::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use report::{Format, Projector, Record, SectionSpec};
pub use scan::{
    analyze, Aggregator, AnalysisJob, ComponentResult, Finding, GlobalResultSet, Provenance,
    Scheduler,
};
