//! Filtering, de-duplication, ordering and summaries over a full run.
//!
//! Runs once, after every job has finished. Steps are applied per component
//! in a fixed order: author filter, noise suppression, de-duplication,
//! location ordering, then removal of components left empty.

use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::components::Component;
use crate::config::ScanConfig;

use super::{ComponentResult, Finding, GlobalResultSet, SeverityCounts, SEVERITY_ORDER};

/// Rule ids treated as analyzer noise.
pub const NOISE_RULES: &[&str] = &["syntaxError", "unknownMacro"];

/// Severity treated as analyzer noise.
pub const NOISE_SEVERITY: &str = "information";

/// Applies the post-run filters.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    author: Option<Regex>,
    suppress_noise: bool,
}

impl Aggregator {
    pub fn new(author: Option<Regex>, suppress_noise: bool) -> Self {
        Self {
            author,
            suppress_noise,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.author.clone(), config.suppress_noise)
    }

    /// Filter and order every component, dropping the ones left empty.
    pub fn aggregate(&self, results: GlobalResultSet) -> GlobalResultSet {
        results
            .into_iter()
            .map(|r| ComponentResult::new(r.component, self.process(r.findings)))
            .filter(|r| !r.is_empty())
            .collect()
    }

    fn process(&self, findings: Vec<Finding>) -> Vec<Finding> {
        let findings = findings
            .into_iter()
            .filter(|f| self.author.as_ref().map_or(true, |re| author_matches(f, re)))
            .filter(|f| !self.suppress_noise || !is_noise(f))
            .collect();
        order_by_location(dedup(findings))
    }
}

/// Findings without author metadata always pass.
pub fn author_matches(finding: &Finding, pattern: &Regex) -> bool {
    match &finding.provenance {
        Some(p) if p.has_author() => {
            p.author.as_deref().is_some_and(|a| pattern.is_match(a))
                || p.author_mail.as_deref().is_some_and(|m| pattern.is_match(m))
        }
        _ => true,
    }
}

/// Line-0 findings, syntax/macro errors and information notes.
pub fn is_noise(finding: &Finding) -> bool {
    let line_zero = finding.line == "0";
    let noisy_rule = NOISE_RULES.contains(&finding.rule_id.as_str());
    let informational = finding.severity == NOISE_SEVERITY;
    line_zero || noisy_rule || informational
}

/// Collapse identical findings, keeping the first occurrence.
pub fn dedup(findings: Vec<Finding>) -> Vec<Finding> {
    let first_seen: Vec<bool> = {
        let mut seen = HashSet::with_capacity(findings.len());
        findings.iter().map(|f| seen.insert(f.key())).collect()
    };
    findings
        .into_iter()
        .zip(first_seen)
        .filter_map(|(f, first)| first.then_some(f))
        .collect()
}

/// Order by file name, then numeric line. Ties keep arrival order.
pub fn order_by_location(mut findings: Vec<Finding>) -> Vec<Finding> {
    findings.sort_by(|a, b| {
        a.file
            .cmp(&b.file)
            .then_with(|| a.line_number().cmp(&b.line_number()))
    });
    findings
}

/// Severity counts for one surviving component.
#[derive(Debug, Clone)]
pub struct ComponentSummary {
    pub component: Component,
    pub counts: SeverityCounts,
}

/// Count severities per component and order components most severe first.
pub fn summarize(results: &[ComponentResult]) -> Vec<ComponentSummary> {
    let mut summaries: Vec<ComponentSummary> = results
        .iter()
        .map(|r| ComponentSummary {
            component: r.component.clone(),
            counts: r.severity_counts(),
        })
        .collect();
    stable_sort_by(&mut summaries, |a, b| compare_counts(&a.counts, &b.counts));
    summaries
}

/// Descending comparison over [`SEVERITY_ORDER`].
///
/// A severity is only compared when both sides have it; otherwise it is
/// skipped for this pair rather than treated as zero.
pub fn compare_counts(a: &SeverityCounts, b: &SeverityCounts) -> Ordering {
    for severity in SEVERITY_ORDER {
        if let (Some(x), Some(y)) = (a.get(severity), b.get(severity)) {
            match y.cmp(&x) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
    }
    Ordering::Equal
}

/// Stable insertion sort.
///
/// Skipping missing severities makes [`compare_counts`] non-transitive, which
/// the standard library sorts are allowed to reject.
fn stable_sort_by<T, F>(items: &mut [T], mut cmp: F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && cmp(&items[j - 1], &items[j]) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}
