//! Analysis pipeline: jobs, the worker pool, parsing, blame and aggregation.

mod aggregate;
mod job;
mod parser;
mod provenance;
mod scheduler;
mod types;
pub mod vcs;

pub use aggregate::{
    author_matches, compare_counts, dedup, is_noise, order_by_location, summarize, Aggregator,
    ComponentSummary, NOISE_RULES, NOISE_SEVERITY,
};
pub use job::{concurrency_for, is_source_file, AnalysisJob, Targets, SOURCE_EXTENSIONS};
pub use parser::{parse_line, parse_output, SEPARATOR, TEMPLATE};
pub use provenance::ProvenanceEnricher;
pub use scheduler::{Job, Scheduler};
pub use types::{
    ComponentResult, Finding, GlobalResultSet, Provenance, SeverityCounts, NO_FILE, SEVERITY_ORDER,
};

use std::sync::Arc;

use crate::components::Component;
use crate::config::ScanConfig;
use crate::error::Result;
use crate::process::CommandRunner;

/// Analyze every component on a pool of `config.jobs` workers and wait for
/// all of them. `on_done` is called once per finished component.
pub fn analyze<F>(
    components: Vec<Component>,
    config: Arc<ScanConfig>,
    runner: Arc<dyn CommandRunner>,
    on_done: F,
) -> Result<GlobalResultSet>
where
    F: Fn(&ComponentResult) + Sync,
{
    let mut scheduler = Scheduler::new(config.jobs)?;
    for component in components {
        scheduler.submit(AnalysisJob::new(component, config.clone(), runner.clone()));
    }
    tracing::info!(jobs = scheduler.pending(), workers = scheduler.workers(), "starting analysis");

    let results = scheduler.run_all_with(on_done);
    scheduler.shutdown();
    Ok(results)
}
