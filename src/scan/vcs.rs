//! Git history queries.
//!
//! Three query shapes are used: the files touched by a set of commits, a
//! porcelain blame record for one line, and the change list of a commit.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::process::{CommandRunner, CommandSpec};

use super::Provenance;

/// Oldest commits inspected when looking for the effective initial commit.
pub const TAIL_CANDIDATES: usize = 5;

const GIT: &str = "git";

fn git() -> CommandSpec {
    CommandSpec::new(GIT)
}

/// Run a git query and return its lines, or `None` if it failed.
fn query(
    runner: &dyn CommandRunner,
    repo: &Path,
    cmd: &CommandSpec,
    timeout: Option<Duration>,
) -> Option<Vec<String>> {
    match runner.run(cmd, repo, timeout) {
        Ok(output) if output.success() => Some(output.lines),
        Ok(output) => {
            tracing::debug!(
                repo = %repo.display(),
                command = %cmd,
                status = ?output.status,
                timed_out = output.timed_out,
                "git query failed"
            );
            None
        }
        Err(e) => {
            tracing::debug!(repo = %repo.display(), command = %cmd, error = %e, "git query failed");
            None
        }
    }
}

/// Files touched by the commits `git log <filter>` selects, de-duplicated in
/// first-seen order. Files that no longer exist are dropped.
pub fn changed_files(
    runner: &dyn CommandRunner,
    repo: &Path,
    filter: &[String],
    timeout: Option<Duration>,
) -> Vec<String> {
    let cmd = git()
        .args(["log", "--name-only", "--pretty=format:"])
        .args(filter.iter().cloned());

    let Some(lines) = query(runner, repo, &cmd, timeout) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .filter(|l| seen.insert(l.clone()))
        .filter(|l| repo.join(l).is_file())
        .collect()
}

/// Blame query for a single line.
pub fn blame_command(file: &str, line: &str) -> CommandSpec {
    git()
        .args(["blame", "--porcelain", "-L"])
        .arg(format!("{},{}", line, line))
        .args(["--", file])
}

/// Parse a porcelain blame record.
///
/// The header line starts with the commit id; metadata follows as
/// `key value` lines and the source text is the tab-prefixed line.
pub fn parse_blame<S: AsRef<str>>(lines: &[S]) -> Option<Provenance> {
    let header = lines.first()?.as_ref();
    let commit = header.split_whitespace().next()?;
    if commit.len() < 7 || !commit.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let author = field(lines, "author ");
    let author_mail = field(lines, "author-mail ").map(|m| {
        m.trim_start_matches('<')
            .trim_end_matches('>')
            .to_string()
    });
    let source_line = lines
        .iter()
        .find_map(|l| l.as_ref().strip_prefix('\t'))
        .map(str::to_string);

    Some(Provenance {
        commit: commit.to_string(),
        author,
        author_mail,
        source_line,
    })
}

/// Value of the first metadata line starting with `key`.
fn field<S: AsRef<str>>(lines: &[S], key: &str) -> Option<String> {
    lines
        .iter()
        .map(AsRef::as_ref)
        .take_while(|l| !l.starts_with('\t'))
        .find_map(|l| l.strip_prefix(key))
        .map(|v| v.trim().to_string())
}

/// Blame one line. `None` when git fails or prints nothing usable.
///
/// No deadline is applied.
pub fn blame(
    runner: &dyn CommandRunner,
    repo: &Path,
    file: &str,
    line: &str,
) -> Option<Provenance> {
    let lines = query(runner, repo, &blame_command(file, line), None)?;
    parse_blame(&lines)
}

/// The oldest commit that actually changes files.
///
/// Scans the oldest [`TAIL_CANDIDATES`] commits oldest-first and skips
/// leading commits with an empty change list.
pub fn effective_initial_commit(
    runner: &dyn CommandRunner,
    repo: &Path,
    timeout: Option<Duration>,
) -> Option<String> {
    let commits = query(
        runner,
        repo,
        &git().args(["rev-list", "--reverse", "HEAD"]),
        timeout,
    )?;

    commits
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .take(TAIL_CANDIDATES)
        .find(|commit| {
            let cmd = git()
                .args(["diff-tree", "--no-commit-id", "--name-only", "-r", "--root"])
                .arg(*commit);
            query(runner, repo, &cmd, timeout)
                .map(|files| files.iter().any(|f| !f.trim().is_empty()))
                .unwrap_or(false)
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::process::CommandOutput;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Answers commands from a table keyed by the rendered command line.
    struct TableRunner(HashMap<String, Vec<&'static str>>);

    impl CommandRunner for TableRunner {
        fn run(
            &self,
            cmd: &CommandSpec,
            _cwd: &Path,
            _timeout: Option<Duration>,
        ) -> Result<CommandOutput> {
            Ok(match self.0.get(&cmd.to_string()) {
                Some(lines) => CommandOutput {
                    lines: lines.iter().map(|l| l.to_string()).collect(),
                    status: Some(0),
                    timed_out: false,
                },
                None => CommandOutput {
                    lines: vec!["fatal: unexpected".to_string()],
                    status: Some(128),
                    timed_out: false,
                },
            })
        }
    }

    const PORCELAIN: &[&str] = &[
        "3f786850e387550fdab836ed7e6dc881de23001b 12 12 1",
        "author Jane Doe",
        "author-mail <jane@example.org>",
        "author-time 1700000000",
        "author-tz +0000",
        "committer Jane Doe",
        "committer-mail <jane@example.org>",
        "summary Fix the author handling",
        "filename src/a.c",
        "\tint *p = NULL;",
    ];

    #[test]
    fn test_parse_blame() {
        let p = parse_blame(PORCELAIN).unwrap();
        assert_eq!(p.commit, "3f786850e387550fdab836ed7e6dc881de23001b");
        assert_eq!(p.author.as_deref(), Some("Jane Doe"));
        assert_eq!(p.author_mail.as_deref(), Some("jane@example.org"));
        assert_eq!(p.source_line.as_deref(), Some("int *p = NULL;"));
    }

    #[test]
    fn test_parse_blame_rejects_errors() {
        assert!(parse_blame(&["fatal: no such path 'x.c' in HEAD"]).is_none());
        assert!(parse_blame::<&str>(&[]).is_none());
    }

    #[test]
    fn test_blame_command_shape() {
        let cmd = blame_command("src/a.c", "12");
        assert_eq!(cmd.to_string(), "git blame --porcelain -L 12,12 -- src/a.c");
    }

    #[test]
    fn test_changed_files_dedups_and_drops_deleted() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/a.c"), "").unwrap();
        fs::write(temp.path().join("src/b.h"), "").unwrap();

        let mut table = HashMap::new();
        table.insert(
            "git log --name-only --pretty=format: --since=1.week".to_string(),
            vec!["src/a.c", "", "src/b.h", "src/a.c", "", "src/removed.c"],
        );
        let runner = TableRunner(table);

        let files = changed_files(&runner, temp.path(), &["--since=1.week".to_string()], None);
        assert_eq!(files, vec!["src/a.c", "src/b.h"]);
    }

    #[test]
    fn test_effective_initial_commit_skips_empty_roots() {
        let mut table = HashMap::new();
        table.insert(
            "git rev-list --reverse HEAD".to_string(),
            vec!["aaaa111", "bbbb222", "cccc333"],
        );
        table.insert(
            "git diff-tree --no-commit-id --name-only -r --root aaaa111".to_string(),
            vec![],
        );
        table.insert(
            "git diff-tree --no-commit-id --name-only -r --root bbbb222".to_string(),
            vec!["README", "src/a.c"],
        );
        let runner = TableRunner(table);

        let commit = effective_initial_commit(&runner, Path::new("."), None);
        assert_eq!(commit.as_deref(), Some("bbbb222"));
    }

    #[test]
    fn test_effective_initial_commit_limited_to_tail() {
        let mut table = HashMap::new();
        table.insert(
            "git rev-list --reverse HEAD".to_string(),
            vec!["c1", "c2", "c3", "c4", "c5", "c6"],
        );
        table.insert(
            "git diff-tree --no-commit-id --name-only -r --root c6".to_string(),
            vec!["a.c"],
        );
        let runner = TableRunner(table);

        // c1..c5 have no recorded changes and c6 is past the tail.
        assert!(effective_initial_commit(&runner, Path::new("."), None).is_none());
    }
}
