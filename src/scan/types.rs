//! Core types for analysis results.

use std::collections::BTreeMap;

use crate::components::Component;

/// Severity labels in report order, most severe first.
pub const SEVERITY_ORDER: &[&str] = &["error", "warning", "performance", "style", "information"];

/// File name the analyzer reports for findings not tied to a file.
pub const NO_FILE: &str = "nofile";

/// Version-control attribution for a finding's line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub commit: String,
    pub author: Option<String>,
    pub author_mail: Option<String>,
    /// The line's text at `commit`
    pub source_line: Option<String>,
}

impl Provenance {
    /// Whether any author metadata is present.
    pub fn has_author(&self) -> bool {
        self.author.is_some() || self.author_mail.is_some()
    }
}

/// A single analyzer-reported issue.
///
/// `line` is kept as reported; it is usually numeric but may be empty for
/// findings without a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub file: String,
    pub line: String,
    pub severity: String,
    pub rule_id: String,
    pub message: String,
    pub provenance: Option<Provenance>,
}

impl Finding {
    pub fn new(
        file: impl Into<String>,
        line: impl Into<String>,
        severity: impl Into<String>,
        rule_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line: line.into(),
            severity: severity.into(),
            rule_id: rule_id.into(),
            message: message.into(),
            provenance: None,
        }
    }

    /// Numeric line for ordering; unparsable lines sort first.
    pub fn line_number(&self) -> u64 {
        self.line.trim().parse().unwrap_or(0)
    }

    /// Whether the finding points at a concrete file line.
    pub fn has_location(&self) -> bool {
        !self.file.is_empty() && !self.line.is_empty() && self.file != NO_FILE
    }

    /// Identity tuple used for de-duplication.
    pub fn key(&self) -> (&str, &str, &str, &str, &str) {
        (
            &self.file,
            &self.line,
            &self.severity,
            &self.rule_id,
            &self.message,
        )
    }

    pub fn commit(&self) -> Option<&str> {
        self.provenance.as_ref().map(|p| p.commit.as_str())
    }
}

/// Findings produced by one analysis job.
#[derive(Debug, Clone)]
pub struct ComponentResult {
    pub component: Component,
    pub findings: Vec<Finding>,
}

impl ComponentResult {
    pub fn new(component: Component, findings: Vec<Finding>) -> Self {
        Self {
            component,
            findings,
        }
    }

    /// A result with no findings, recorded for failed or skipped jobs.
    pub fn empty(component: Component) -> Self {
        Self::new(component, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Count findings per severity label.
    pub fn severity_counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for f in &self.findings {
            counts.add(&f.severity);
        }
        counts
    }
}

/// All component results of a run, in submission order.
pub type GlobalResultSet = Vec<ComponentResult>;

/// Findings per severity label. Derived, recomputed per report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    counts: BTreeMap<String, usize>,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: &str) {
        *self.counts.entry(severity.to_string()).or_insert(0) += 1;
    }

    /// Add every count of `other` into this one.
    pub fn merge(&mut self, other: &SeverityCounts) {
        for (label, n) in &other.counts {
            *self.counts.entry(label.clone()).or_insert(0) += n;
        }
    }

    /// Count for a label, `None` when the label never occurred.
    pub fn get(&self, severity: &str) -> Option<usize> {
        self.counts.get(severity).copied()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Labels in report order: known severities first, then the rest
    /// alphabetically.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = SEVERITY_ORDER
            .iter()
            .copied()
            .filter(|s| self.counts.contains_key(*s))
            .collect();
        labels.extend(
            self.counts
                .keys()
                .map(String::as_str)
                .filter(|s| !SEVERITY_ORDER.contains(s)),
        );
        labels
    }
}

impl<'a> FromIterator<&'a str> for SeverityCounts {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut counts = SeverityCounts::default();
        for s in iter {
            counts.add(s);
        }
        counts
    }
}
