//! Attribution of findings to the commits that introduced their lines.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::process::CommandRunner;

use super::{vcs, Finding};

/// Attaches blame data to findings, best-effort.
pub struct ProvenanceEnricher<'a> {
    runner: &'a dyn CommandRunner,
    repo: &'a Path,
    ignore_commits: HashSet<String>,
}

impl<'a> ProvenanceEnricher<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        repo: &'a Path,
        ignore_commits: &HashSet<String>,
    ) -> Self {
        Self {
            runner,
            repo,
            ignore_commits: ignore_commits.clone(),
        }
    }

    /// Also drop findings attributed to the repository's effective initial
    /// commit, typically a bulk import.
    pub fn ignore_initial_commit(mut self, timeout: Option<Duration>) -> Self {
        if let Some(commit) = vcs::effective_initial_commit(self.runner, self.repo, timeout) {
            tracing::debug!(repo = %self.repo.display(), %commit, "ignoring initial commit");
            self.ignore_commits.insert(commit);
        }
        self
    }

    /// Blame every located finding, one query each.
    ///
    /// Findings whose blame fails are kept as they are. Findings owned by an
    /// ignored commit are dropped.
    pub fn enrich(&self, findings: Vec<Finding>) -> Vec<Finding> {
        let mut kept = Vec::with_capacity(findings.len());

        for mut finding in findings {
            if !finding.has_location() {
                kept.push(finding);
                continue;
            }

            match vcs::blame(self.runner, self.repo, &finding.file, &finding.line) {
                Some(p) if self.ignore_commits.contains(&p.commit) => {
                    tracing::trace!(
                        file = %finding.file,
                        line = %finding.line,
                        commit = %p.commit,
                        "dropping finding from ignored commit"
                    );
                }
                Some(p) => {
                    finding.provenance = Some(p);
                    kept.push(finding);
                }
                None => kept.push(finding),
            }
        }

        kept
    }
}
