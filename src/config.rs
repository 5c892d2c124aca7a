//! Configuration schema for repocheck.
//!
//! A [`Config`] is read from YAML and merged with command-line overrides.
//! It is then frozen into a [`ScanConfig`], the immutable snapshot every
//! analysis job receives.

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::report::{Format, SectionSpec};

/// Config file names searched for when `--config` is not given.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["repocheck.yaml", ".repocheck.yaml"];

pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_MAX_THREADS: usize = 8;
pub const DEFAULT_OUT_DIR: &str = "repocheck-report";

/// Which report views to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Summary,
    Detail,
    #[default]
    Both,
}

impl OutputMode {
    pub fn wants_summary(self) -> bool {
        matches!(self, OutputMode::Summary | OutputMode::Both)
    }

    pub fn wants_detail(self) -> bool {
        matches!(self, OutputMode::Detail | OutputMode::Both)
    }
}

impl std::str::FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputMode::Summary),
            "detail" => Ok(OutputMode::Detail),
            "both" => Ok(OutputMode::Both),
            _ => Err(format!("unknown output mode: {}", s)),
        }
    }
}

/// The analyzer executable and any leading arguments.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_analyzer_program")]
    pub program: String,
    /// Placed before the generated arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            program: default_analyzer_program(),
            args: Vec::new(),
        }
    }
}

fn default_analyzer_program() -> String {
    "cppcheck".to_string()
}

/// Hyperlink generation for detail reports.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LinkConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Number of components analyzed concurrently (default: logical cores)
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Wall-clock limit for one analyzer run, in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Upper bound on the analyzer's own `-j` value
    #[serde(default)]
    pub max_threads: Option<usize>,
    /// Analyzer check categories passed through `--enable`
    #[serde(default)]
    pub enable: Vec<String>,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// Glob patterns for reported files that are dropped
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Full commit ids whose findings are dropped
    #[serde(default)]
    pub ignore_commits: Vec<String>,
    /// Also ignore each component's first non-empty commit
    #[serde(default)]
    pub skip_initial_commit: bool,
    /// Regex an author name or mail must match for a finding to be kept
    #[serde(default)]
    pub author: Option<String>,
    /// Drop line-0 findings, syntax/macro errors and information notes
    #[serde(default)]
    pub suppress_noise: bool,
    /// `git log` arguments selecting the commits whose files are analyzed
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub output: OutputMode,
    #[serde(default)]
    pub format: Option<String>,
    /// Comma-separated field list for the summary view (empty = all)
    #[serde(default)]
    pub summary_sections: Option<String>,
    /// Comma-separated field list for the detail view (empty = all)
    #[serde(default)]
    pub detail_sections: Option<String>,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Analyzer categories, falling back to the usual set.
    pub fn enabled_categories(&self) -> Vec<String> {
        if self.enable.is_empty() {
            ["warning", "performance", "portability", "style"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            self.enable.clone()
        }
    }

    /// Freeze into the snapshot handed to jobs.
    pub fn compile(&self) -> Result<ScanConfig> {
        let ignore = build_globset(&self.ignore)?;

        let author = match &self.author {
            Some(p) if !p.is_empty() => Some(
                Regex::new(p)
                    .map_err(|e| Error::Config(format!("invalid author pattern {:?}: {}", p, e)))?,
            ),
            _ => None,
        };

        let format = match &self.format {
            Some(f) => f.parse::<Format>().map_err(Error::Config)?,
            None => Format::default(),
        };

        let link_base = if self.link.enabled {
            match &self.link.base_url {
                Some(url) if !url.is_empty() => Some(url.trim_end_matches('/').to_string()),
                _ => {
                    return Err(Error::Config(
                        "link generation is enabled but link.base_url is not set".to_string(),
                    ))
                }
            }
        } else {
            None
        };

        Ok(ScanConfig {
            jobs: self.jobs.filter(|&j| j > 0).unwrap_or_else(num_cpus::get),
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            max_threads: self
                .max_threads
                .filter(|&t| t > 0)
                .unwrap_or(DEFAULT_MAX_THREADS),
            enable: self.enabled_categories(),
            analyzer: self.analyzer.clone(),
            ignore,
            ignore_commits: self.ignore_commits.iter().cloned().collect(),
            skip_initial_commit: self.skip_initial_commit,
            author,
            suppress_noise: self.suppress_noise,
            history: self.history.clone(),
            output: self.output,
            format,
            summary_sections: SectionSpec::parse(self.summary_sections.as_deref().unwrap_or("")),
            detail_sections: SectionSpec::parse(self.detail_sections.as_deref().unwrap_or("")),
            link_base,
            out_dir: self
                .out_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR)),
        })
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::Config(format!("invalid ignore pattern {:?}: {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("building ignore patterns: {}", e)))
}

/// Immutable configuration snapshot shared by all jobs.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub jobs: usize,
    pub timeout: Duration,
    pub max_threads: usize,
    pub enable: Vec<String>,
    pub analyzer: AnalyzerConfig,
    pub ignore: GlobSet,
    pub ignore_commits: HashSet<String>,
    pub skip_initial_commit: bool,
    pub author: Option<Regex>,
    pub suppress_noise: bool,
    pub history: Vec<String>,
    pub output: OutputMode,
    pub format: Format,
    pub summary_sections: SectionSpec,
    pub detail_sections: SectionSpec,
    /// Set only when link generation is enabled.
    pub link_base: Option<String>,
    pub out_dir: PathBuf,
}

impl ScanConfig {
    /// Whether findings need blame data for filtering or display.
    pub fn needs_provenance(&self) -> bool {
        let detail_wants_it = self.output.wants_detail()
            && crate::report::PROVENANCE_FIELDS
                .iter()
                .any(|f| self.detail_sections.includes(f));

        detail_wants_it
            || self.author.is_some()
            || self.link_base.is_some()
            || !self.ignore_commits.is_empty()
            || self.skip_initial_commit
    }
}
