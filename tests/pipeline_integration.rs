//! End-to-end runs of discovery, analysis, aggregation and reporting.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use repocheck::cli::{self, CheckArgs, EXIT_FAILED};
use repocheck::components;
use repocheck::config::{Config, LinkConfig};
use repocheck::process::{CommandOutput, CommandRunner, CommandSpec};
use repocheck::report;
use repocheck::scan::{self, summarize, Aggregator};
use tempfile::TempDir;

const IGNORED_COMMIT: &str = "dddddddddddddddddddddddddddddddddddddddd";

/// Stands in for cppcheck and git, answering per component directory.
#[derive(Default)]
struct FakeTools {
    analyzer_runs: AtomicUsize,
}

impl FakeTools {
    fn analyzer(&self, cwd: &Path) -> Vec<&'static str> {
        self.analyzer_runs.fetch_add(1, Ordering::SeqCst);
        if cwd.ends_with("system/core") {
            vec![
                "Checking init/main.cpp ...",
                "[init/main.cpp],[42],[error],[nullPointer],[Null pointer dereference: p]",
                "[init/main.cpp],[7],[style],[unusedVariable],[Unused variable: x]",
                "[init/main.cpp],[42],[error],[nullPointer],[Null pointer dereference: p]",
                "[nofile],[0],[information],[missingInclude],[Cppcheck cannot find all the include files]",
            ]
        } else if cwd.ends_with("frameworks/core") {
            vec![
                "[a.cpp],[3],[warning],[uninitvar],[Uninitialized variable: y]",
                "[gen/x.pb.cc],[1],[error],[generated],[Generated code]",
            ]
        } else if cwd.ends_with("external/zlib") {
            vec!["[inflate.c],[10],[error],[legacy],[Old code]"]
        } else {
            Vec::new()
        }
    }

    fn blame(&self, file: &str, range: &str) -> Vec<String> {
        let (commit, author, mail, text) = match (file, range) {
            ("init/main.cpp", "42,42") => ("a".repeat(40), "Ann", "ann@example.org", "*p = 0;"),
            ("init/main.cpp", "7,7") => ("b".repeat(40), "Bob", "bob@other.net", "int x;"),
            ("a.cpp", "3,3") => ("c".repeat(40), "Ann", "ann@example.org", "return y;"),
            ("inflate.c", "10,10") => (IGNORED_COMMIT.to_string(), "Old", "old@example.org", "K&R"),
            _ => return Vec::new(),
        };
        let line = range.split(',').next().unwrap_or_default();
        vec![
            format!("{} {} {} 1", commit, line, line),
            format!("author {}", author),
            format!("author-mail <{}>", mail),
            "author-time 1700000000".to_string(),
            format!("filename {}", file),
            format!("\t{}", text),
        ]
    }
}

impl CommandRunner for FakeTools {
    fn run(
        &self,
        cmd: &CommandSpec,
        cwd: &Path,
        _timeout: Option<Duration>,
    ) -> repocheck::Result<CommandOutput> {
        let lines: Option<Vec<String>> = match (cmd.program.as_str(), cmd.args.first().map(String::as_str)) {
            ("cppcheck", _) => Some(self.analyzer(cwd).into_iter().map(str::to_string).collect()),
            ("git", Some("blame")) => {
                // git blame --porcelain -L l,l -- file
                let range = &cmd.args[3];
                let file = &cmd.args[5];
                Some(self.blame(file, range)).filter(|l| !l.is_empty())
            }
            _ => None,
        };

        Ok(match lines {
            Some(lines) => CommandOutput {
                lines,
                status: Some(0),
                timed_out: false,
            },
            None => CommandOutput {
                lines: vec!["fatal: not supported".to_string()],
                status: Some(128),
                timed_out: false,
            },
        })
    }
}

/// A checkout with a `.repo` marker and four repositories.
fn checkout() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join(".repo")).unwrap();
    for (repo, file) in [
        ("system/core", "init/main.cpp"),
        ("frameworks/core", "a.cpp"),
        ("external/zlib", "inflate.c"),
        ("external/docs", "README.md"),
    ] {
        let dir = root.join(repo);
        fs::create_dir_all(dir.join(".git")).unwrap();
        let path = dir.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "int main(void) { return 0; }\n").unwrap();
    }
    temp
}

fn base_config(out_dir: &Path) -> Config {
    Config {
        jobs: Some(2),
        ignore: vec!["gen/**".to_string()],
        ignore_commits: vec![IGNORED_COMMIT.to_string()],
        suppress_noise: true,
        link: LinkConfig {
            enabled: true,
            base_url: Some("https://review.example.org/".to_string()),
        },
        out_dir: Some(out_dir.to_path_buf()),
        ..Default::default()
    }
}

#[test]
fn test_full_pipeline_writes_reports() {
    let temp = checkout();
    let out = temp.path().join("out");
    let config = Arc::new(base_config(&out).compile().unwrap());
    let tools = Arc::new(FakeTools::default());

    let found = components::retain_existing(components::discover(temp.path()).unwrap());
    assert_eq!(found.len(), 4);

    let done = AtomicUsize::new(0);
    let results = scan::analyze(found, config.clone(), tools.clone(), |_| {
        done.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(done.load(Ordering::SeqCst), 4);
    // No source files in external/docs, so no analyzer run there.
    assert_eq!(tools.analyzer_runs.load(Ordering::SeqCst), 3);

    let results = Aggregator::from_config(&config).aggregate(results);
    let paths: Vec<_> = results.iter().map(|r| r.component.relative_path.as_str()).collect();
    // zlib only had a finding from an ignored commit.
    assert_eq!(paths, vec!["frameworks/core", "system/core"]);

    let core = &results[1];
    let lines: Vec<_> = core.findings.iter().map(|f| f.line.as_str()).collect();
    assert_eq!(lines, vec!["7", "42"]);
    assert_eq!(
        core.findings[1].provenance.as_ref().unwrap().author_mail.as_deref(),
        Some("ann@example.org")
    );

    let summaries = summarize(&results);
    let outcome = report::write_reports(&results, &summaries, &config);
    assert!(outcome.failed.is_empty());
    assert_eq!(outcome.written.len(), 3);

    // Both components are named "core"; the second writer is re-keyed.
    let first = fs::read_to_string(out.join("core.md")).unwrap();
    assert!(first.contains("uninitvar"));
    let second = fs::read_to_string(out.join("system_core.md")).unwrap();
    assert!(second.contains(&format!(
        "https://review.example.org/system/core/+/{}/init/main.cpp#42",
        "a".repeat(40)
    )));
    assert!(second.find("unusedVariable").unwrap() < second.find("nullPointer").unwrap());
    assert!(!second.contains("missingInclude"));
    assert!(!out.join("zlib.md").exists());

    let summary = fs::read_to_string(out.join("summary.md")).unwrap();
    assert!(summary.starts_with("| component | path | error | warning |"));
    assert!(summary.contains("| core | system/core | 1 | 0 | 0 | 1 | 0 | 2 |"));
}

#[test]
fn test_ignored_files_never_reach_reports() {
    let temp = checkout();
    let out = temp.path().join("out");
    let config = Arc::new(base_config(&out).compile().unwrap());

    let found = components::discover(temp.path()).unwrap();
    let results = scan::analyze(found, config.clone(), Arc::new(FakeTools::default()), |_| {}).unwrap();
    let results = Aggregator::from_config(&config).aggregate(results);

    assert!(results
        .iter()
        .flat_map(|r| &r.findings)
        .all(|f| !f.file.starts_with("gen/")));

    let outcome = report::write_reports(&results, &summarize(&results), &config);
    assert!(outcome.failed.is_empty());
    let detail = fs::read_to_string(out.join("core.md")).unwrap();
    assert!(detail.contains("a.cpp"));
    assert!(!detail.contains("gen/x.pb.cc"));
    assert!(!detail.contains("Generated code"));
    // Only uninitvar is left for frameworks/core.
    let summary = fs::read_to_string(out.join("summary.md")).unwrap();
    assert!(summary.contains("| core | frameworks/core | 0 | 1 |"));
}

#[test]
fn test_author_filter_and_csv_sections() {
    let temp = checkout();
    let out = temp.path().join("out");
    let config = Config {
        author: Some("@example\\.org$".to_string()),
        format: Some("csv".to_string()),
        detail_sections: Some("line,author_mail".to_string()),
        link: LinkConfig::default(),
        ..base_config(&out)
    };
    let config = Arc::new(config.compile().unwrap());

    let found = components::discover(temp.path()).unwrap();
    let results = scan::analyze(found, config.clone(), Arc::new(FakeTools::default()), |_| {}).unwrap();
    let results = Aggregator::from_config(&config).aggregate(results);
    report::write_reports(&results, &summarize(&results), &config);

    // Bob's finding is filtered out.
    let detail = fs::read_to_string(out.join("system_core.csv")).unwrap();
    assert_eq!(detail, "line,author_mail\n42,ann@example.org\n");
}

#[cfg(unix)]
fn fake_analyzer(dir: &Path, body: &str) -> String {
    let script = dir.join("fake-cppcheck.sh");
    fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
    script.to_string_lossy().to_string()
}

#[cfg(unix)]
fn write_config(dir: &Path, script: &str, extra: &str) -> std::path::PathBuf {
    let path = dir.join("repocheck-test.yaml");
    fs::write(
        &path,
        format!(
            "analyzer:\n  program: sh\n  args: [\"{}\"]\nout_dir: \"{}\"\n{}",
            script,
            dir.join("out").display(),
            extra
        ),
    )
    .unwrap();
    path
}

#[test]
#[cfg(unix)]
fn test_cli_with_real_subprocess() {
    let tools = TempDir::new().unwrap();
    let tree = TempDir::new().unwrap();
    fs::create_dir(tree.path().join("src")).unwrap();
    fs::write(tree.path().join("src/a.c"), "int a[4];\n").unwrap();

    let script = fake_analyzer(
        tools.path(),
        "echo 'Checking src/a.c ...'\n\
         echo \"[./src/a.c],[5],[error],[arrayIndexOutOfBounds],[Array 'buf[4]' accessed at index 4, which is out of bounds.]\" >&2",
    );
    let config = write_config(tools.path(), &script, "format: xml\n");

    let args = CheckArgs {
        path: tree.path().to_path_buf(),
        config: Some(config),
        fail_on_findings: true,
        ..Default::default()
    };
    assert_eq!(cli::run_check(&args).unwrap(), EXIT_FAILED);

    let out = tools.path().join("out");
    let name = tree.path().file_name().unwrap().to_string_lossy().to_string();
    let detail = fs::read_to_string(out.join(format!("{}.xml", name))).unwrap();
    assert!(detail.contains("<file>src/a.c</file>"));
    assert!(detail.contains(
        "<message>Array &apos;buf[4]&apos; accessed at index 4, which is out of bounds.</message>"
    ));
    assert!(out.join("summary.xml").is_file());
}

#[test]
#[cfg(unix)]
fn test_hanging_analyzer_is_killed() {
    let tools = TempDir::new().unwrap();
    let tree = TempDir::new().unwrap();
    fs::write(tree.path().join("a.c"), "int x;\n").unwrap();

    let script = fake_analyzer(
        tools.path(),
        "echo '[a.c],[1],[error],[early],[Reported before hanging]' >&2\nexec sleep 30",
    );
    let config = Config {
        timeout_secs: Some(1),
        analyzer: repocheck::config::AnalyzerConfig {
            program: "sh".to_string(),
            args: vec![script],
        },
        ..Default::default()
    };
    let config = Arc::new(config.compile().unwrap());

    let start = Instant::now();
    let found = components::discover(tree.path()).unwrap();
    let results = scan::analyze(found, config, Arc::new(repocheck::SystemRunner), |_| {}).unwrap();

    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(results.len(), 1);
    // Output captured before the kill is kept.
    assert_eq!(results[0].findings.len(), 1);
    assert_eq!(results[0].findings[0].rule_id, "early");
}
