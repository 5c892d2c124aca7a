//! Per-component analysis job.
//!
//! A job selects the files to check, runs the analyzer once over them with a
//! hard deadline, parses its output and, for version-controlled components,
//! attributes findings to commits.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use walkdir::WalkDir;

use crate::components::Component;
use crate::config::ScanConfig;
use crate::error::Error;
use crate::process::{CommandRunner, CommandSpec};

use super::{parser, vcs, ComponentResult, ProvenanceEnricher};

/// Extensions the analyzer is run on.
pub const SOURCE_EXTENSIONS: &[&str] = &[
    "c", "cc", "cpp", "cxx", "c++", "h", "hh", "hpp", "hxx", "inl", "ipp",
];

/// Analyzer parallelism never drops below this for a non-empty file set.
const MIN_CONCURRENCY: usize = 2;

/// Analyzer `-j` value for `file_count` files.
///
/// `floor(ln(n) + 0.9)`, raised to [`MIN_CONCURRENCY`] and capped at
/// `max_threads`. Zero files need no analyzer run and give zero.
pub fn concurrency_for(file_count: usize, max_threads: usize) -> usize {
    if file_count == 0 {
        return 0;
    }
    let heuristic = ((file_count as f64).ln() + 0.9).floor().max(0.0) as usize;
    heuristic.max(MIN_CONCURRENCY).min(max_threads.max(1))
}

pub fn is_source_file(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| SOURCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Count source files below `root`, skipping hidden directories.
fn count_source_files(root: &Path) -> usize {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_source_file(&e.file_name().to_string_lossy()))
        .count()
}

/// What the analyzer is pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// Explicit files, relative to the component root
    Files(Vec<String>),
    /// The whole tree; the analyzer discovers files itself
    WholeTree { source_files: usize },
}

impl Targets {
    pub fn file_count(&self) -> usize {
        match self {
            Targets::Files(files) => files.len(),
            Targets::WholeTree { source_files } => *source_files,
        }
    }

    fn args(&self) -> Vec<String> {
        match self {
            Targets::Files(files) => files.clone(),
            Targets::WholeTree { .. } => vec![".".to_string()],
        }
    }
}

/// Analysis of one component.
pub struct AnalysisJob {
    component: Component,
    config: Arc<ScanConfig>,
    runner: Arc<dyn CommandRunner>,
}

impl AnalysisJob {
    pub fn new(component: Component, config: Arc<ScanConfig>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            component,
            config,
            runner,
        }
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    /// Pick the analyzer targets.
    ///
    /// With a history filter on a version-controlled component, only files
    /// touched by the selected commits are checked.
    pub fn select_targets(&self) -> Targets {
        let root = &self.component.root;
        if self.component.is_version_controlled() && !self.config.history.is_empty() {
            let files = vcs::changed_files(
                self.runner.as_ref(),
                root,
                &self.config.history,
                Some(self.config.timeout),
            );
            Targets::Files(files.into_iter().filter(|f| is_source_file(f)).collect())
        } else {
            Targets::WholeTree {
                source_files: count_source_files(root),
            }
        }
    }

    /// The analyzer command line for `targets`.
    pub fn analyzer_command(&self, concurrency: usize, targets: &Targets) -> CommandSpec {
        let analyzer = &self.config.analyzer;
        let mut cmd = CommandSpec::new(analyzer.program.clone())
            .args(analyzer.args.iter().cloned())
            .arg(format!("-j{}", concurrency))
            .arg("--quiet");
        if !self.config.enable.is_empty() {
            cmd = cmd.arg(format!("--enable={}", self.config.enable.join(",")));
        }
        cmd.arg(format!("--template={}", parser::TEMPLATE))
            .args(targets.args())
    }

    /// Run the job to completion. Failures give an empty result.
    pub fn run(&self) -> ComponentResult {
        let start = Instant::now();
        let name = self.component.relative_path.as_str();

        let targets = self.select_targets();
        let file_count = targets.file_count();
        if file_count == 0 {
            tracing::debug!(component = name, "no source files, skipping analyzer");
            return ComponentResult::empty(self.component.clone());
        }

        let concurrency = concurrency_for(file_count, self.config.max_threads);
        let cmd = self.analyzer_command(concurrency, &targets);
        tracing::debug!(component = name, files = file_count, concurrency, command = %cmd, "running analyzer");

        let output = match self
            .runner
            .run(&cmd, &self.component.root, Some(self.config.timeout))
        {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(component = name, error = %e, "analyzer failed");
                return ComponentResult::empty(self.component.clone());
            }
        };

        if output.timed_out {
            let err = Error::Timeout {
                program: cmd.program.clone(),
                timeout: self.config.timeout,
            };
            tracing::warn!(
                component = name,
                captured_lines = output.lines.len(),
                error = %err,
                "keeping partial analyzer output"
            );
        }

        let mut findings = parser::parse_output(&output.lines, &self.config.ignore);

        if self.component.is_version_controlled()
            && self.config.needs_provenance()
            && !findings.is_empty()
        {
            let mut enricher = ProvenanceEnricher::new(
                self.runner.as_ref(),
                &self.component.root,
                &self.config.ignore_commits,
            );
            if self.config.skip_initial_commit {
                enricher = enricher.ignore_initial_commit(Some(self.config.timeout));
            }
            findings = enricher.enrich(findings);
        }

        tracing::info!(
            component = name,
            findings = findings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "component analyzed"
        );
        ComponentResult::new(self.component.clone(), findings)
    }
}
